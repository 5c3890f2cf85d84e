use serde::{Deserialize, Serialize};

use crate::{error::PoseError, keypoints::NUM_KEYPOINTS};

/// Parameters of a single pose decoding call.
///
/// The sizes describe the network output feature map; the thresholds steer the
/// candidate selection and the non-maximum suppression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodePosesConfig {
    /// Height of the feature map in grid cells.
    pub feature_height: usize,
    /// Width of the feature map in grid cells.
    pub feature_width: usize,
    /// Number of keypoints per pose.
    pub num_keypoints: usize,
    /// Pixels per grid cell.
    pub output_stride: usize,
    /// Radius of the window used to find local maxima in the heatmap.
    pub local_max_radius: usize,
    /// Radius in pixels under which two keypoints are considered the same.
    pub nms_radius: f32,
    /// Heatmap scores must be strictly above this value to seed a pose.
    pub heatmap_score_threshold: f32,
    /// Poses must score strictly above this value to be returned.
    pub min_pose_score: f32,
    /// Maximum number of poses returned per frame.
    pub max_pose_detections: usize,
}

impl Default for DecodePosesConfig {
    fn default() -> Self {
        // PoseNet MobileNet, 257x257 input at stride 16
        Self {
            feature_height: 17,
            feature_width: 17,
            num_keypoints: NUM_KEYPOINTS,
            output_stride: 16,
            local_max_radius: 1,
            nms_radius: 20.0,
            heatmap_score_threshold: 0.5,
            min_pose_score: 0.25,
            max_pose_detections: 10,
        }
    }
}

impl DecodePosesConfig {
    /// Creates a config for the given feature map size with default thresholds.
    pub fn new(feature_height: usize, feature_width: usize, output_stride: usize) -> Self {
        Self {
            feature_height,
            feature_width,
            output_stride,
            ..Default::default()
        }
    }

    /// Creates a config from the network input size.
    ///
    /// The feature map size follows the PoseNet convention `(dim - 1) / stride + 1`.
    pub fn from_input_size(
        input_height: usize,
        input_width: usize,
        output_stride: usize,
    ) -> Result<Self, PoseError> {
        if output_stride == 0 {
            return Err(PoseError::InvalidOutputStride);
        }
        if input_height == 0 || input_width == 0 {
            return Err(PoseError::InvalidFeatureSize(input_height, input_width));
        }

        Ok(Self::new(
            (input_height - 1) / output_stride + 1,
            (input_width - 1) / output_stride + 1,
            output_stride,
        ))
    }

    /// Sets the local maximum radius.
    pub fn with_local_max_radius(mut self, radius: usize) -> Self {
        self.local_max_radius = radius;
        self
    }

    /// Sets the NMS radius in pixels.
    pub fn with_nms_radius(mut self, radius: f32) -> Self {
        self.nms_radius = radius;
        self
    }

    /// Sets the heatmap score threshold.
    pub fn with_heatmap_score_threshold(mut self, threshold: f32) -> Self {
        self.heatmap_score_threshold = threshold;
        self
    }

    /// Sets the minimum pose score.
    pub fn with_min_pose_score(mut self, score: f32) -> Self {
        self.min_pose_score = score;
        self
    }

    /// Sets the maximum number of detections.
    pub fn with_max_pose_detections(mut self, max: usize) -> Self {
        self.max_pose_detections = max;
        self
    }

    /// Checks that the config describes a decodable feature map.
    pub fn validate(&self) -> Result<(), PoseError> {
        if self.feature_height == 0 || self.feature_width == 0 {
            return Err(PoseError::InvalidFeatureSize(
                self.feature_height,
                self.feature_width,
            ));
        }

        if self.output_stride == 0 {
            return Err(PoseError::InvalidOutputStride);
        }

        if self.num_keypoints != NUM_KEYPOINTS {
            return Err(PoseError::KeypointCountMismatch(
                NUM_KEYPOINTS,
                self.num_keypoints,
            ));
        }

        // the largest tensor holds 4 * (K - 1) values per cell
        let fits = self
            .feature_height
            .checked_mul(self.feature_width)
            .and_then(|cells| cells.checked_mul(4 * self.num_edges()))
            .is_some();
        if !fits {
            return Err(PoseError::InvalidFeatureSize(
                self.feature_height,
                self.feature_width,
            ));
        }

        if !self.nms_radius.is_finite() || self.nms_radius < 0.0 {
            return Err(PoseError::InvalidNmsRadius(self.nms_radius));
        }

        Ok(())
    }

    /// Number of cells in the feature map.
    #[inline]
    pub fn num_cells(&self) -> usize {
        self.feature_height.saturating_mul(self.feature_width)
    }

    /// Number of edges in the pose chain.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.num_keypoints.saturating_sub(1)
    }

    /// Expected length of the heatmap tensor, `H * W * K`.
    #[inline]
    pub fn heatmap_len(&self) -> usize {
        self.num_cells().saturating_mul(self.num_keypoints)
    }

    /// Expected length of the offsets tensor, `H * W * 2 * K`.
    #[inline]
    pub fn offsets_len(&self) -> usize {
        self.heatmap_len().saturating_mul(2)
    }

    /// Expected length of the displacements tensor, `H * W * 4 * (K - 1)`.
    #[inline]
    pub fn displacements_len(&self) -> usize {
        self.num_cells()
            .saturating_mul(self.num_edges())
            .saturating_mul(4)
    }

    /// Checks the raw tensor lengths against the config.
    pub fn check_tensors(
        &self,
        heatmap: &[f32],
        offsets: &[f32],
        displacements: &[f32],
    ) -> Result<(), PoseError> {
        if heatmap.len() != self.heatmap_len() {
            return Err(PoseError::TensorLengthMismatch(
                "heatmap",
                self.heatmap_len(),
                heatmap.len(),
            ));
        }

        if offsets.len() != self.offsets_len() {
            return Err(PoseError::TensorLengthMismatch(
                "offsets",
                self.offsets_len(),
                offsets.len(),
            ));
        }

        if displacements.len() != self.displacements_len() {
            return Err(PoseError::TensorLengthMismatch(
                "displacements",
                self.displacements_len(),
                displacements.len(),
            ));
        }

        Ok(())
    }
}
