#![deny(missing_docs)]
//! # Kornia PoseNet
//!
//! Multi-person pose decoding from the heatmaps, short-range offsets and
//! mid-range displacements of a PoseNet style network.

/// Greedy assembly of pose instances with non-maximum suppression.
pub mod assembler;

/// Decoding configuration.
pub mod config;

/// Decoding of a single pose from a root keypoint.
pub mod decoder;

/// Error types for pose decoding.
pub mod error;

/// Keypoint taxonomy and pose chain.
pub mod keypoints;

/// Separable local maximum filter.
pub mod local_max;

/// Layout permutations of the raw network tensors.
pub mod reshape;

/// Heatmap normalization and candidate selection.
pub mod score;

/// Output pose types.
pub mod types;

mod utils;

pub use crate::{
    config::DecodePosesConfig,
    error::PoseError,
    keypoints::{KeypointKind, PoseGraph},
    types::{Keypoint, PoseInstance},
};

use crate::{
    assembler::InstanceAssembler,
    decoder::PoseTensors,
    reshape::{reshape_displacements, reshape_offsets},
    score::{normalize, Candidate, ScoreField},
    utils::resize_scratch,
};

/// Pose decoder owning the pose graph and the per-frame scratch buffers.
///
/// Buffers are reused across calls; every call depends only on its inputs.
pub struct PoseNetDecoder {
    config: DecodePosesConfig,
    graph: PoseGraph,
    score_field: ScoreField,
    scores: Vec<f32>,
    offsets: Vec<f32>,
    displacements_fwd: Vec<f32>,
    displacements_bwd: Vec<f32>,
    candidates: Vec<Candidate>,
}

impl PoseNetDecoder {
    /// Creates a new decoder with the standard PoseNet graph.
    ///
    /// # Arguments
    ///
    /// * `config` - The decoding configuration, validated here.
    pub fn new(config: DecodePosesConfig) -> Result<Self, PoseError> {
        Self::with_graph(config, PoseGraph::posenet()?)
    }

    /// Creates a new decoder with a custom pose graph.
    pub fn with_graph(config: DecodePosesConfig, graph: PoseGraph) -> Result<Self, PoseError> {
        config.validate()?;

        if graph.num_keypoints() != config.num_keypoints {
            return Err(PoseError::KeypointCountMismatch(
                graph.num_keypoints(),
                config.num_keypoints,
            ));
        }

        Ok(Self {
            config,
            graph,
            score_field: ScoreField::new(),
            scores: Vec::new(),
            offsets: Vec::new(),
            displacements_fwd: Vec::new(),
            displacements_bwd: Vec::new(),
            candidates: Vec::new(),
        })
    }

    /// Returns a reference to the decoder configuration.
    #[inline]
    pub fn config(&self) -> &DecodePosesConfig {
        &self.config
    }

    /// Returns a reference to the pose graph.
    #[inline]
    pub fn graph(&self) -> &PoseGraph {
        &self.graph
    }

    /// Decodes the poses of one frame.
    ///
    /// # Arguments
    ///
    /// * `heatmap` - Raw heatmap logits with shape (H, W, K).
    /// * `offsets` - Raw short-range offsets with shape (H, W, 2, K).
    /// * `displacements` - Raw mid-range displacements with shape (H, W, 4, K - 1).
    /// * `scale_x` - Horizontal factor from feature map pixels to source frame pixels.
    /// * `scale_y` - Vertical factor from feature map pixels to source frame pixels.
    ///
    /// # Returns
    ///
    /// At most `max_pose_detections` poses, in acceptance order.
    pub fn decode(
        &mut self,
        heatmap: &[f32],
        offsets: &[f32],
        displacements: &[f32],
        scale_x: f32,
        scale_y: f32,
    ) -> Result<Vec<PoseInstance>, PoseError> {
        let config = &self.config;
        config.check_tensors(heatmap, offsets, displacements)?;

        let num_cells = config.num_cells();
        let num_edges = config.num_edges();

        resize_scratch(&mut self.scores, heatmap.len(), 0.0)?;
        self.scores.copy_from_slice(heatmap);
        normalize(&mut self.scores);

        resize_scratch(&mut self.offsets, offsets.len(), 0.0)?;
        reshape_offsets(offsets, &mut self.offsets, num_cells, config.num_keypoints)?;

        resize_scratch(&mut self.displacements_fwd, num_cells * num_edges * 2, 0.0)?;
        resize_scratch(&mut self.displacements_bwd, num_cells * num_edges * 2, 0.0)?;
        reshape_displacements(
            displacements,
            &mut self.displacements_fwd,
            &mut self.displacements_bwd,
            num_cells,
            num_edges,
        )?;

        self.score_field
            .select_candidates(config, &self.scores, &mut self.candidates)?;
        log::debug!("found {} candidate roots", self.candidates.len());

        let tensors = PoseTensors {
            scores: &self.scores,
            offsets: &self.offsets,
            displacements_fwd: &self.displacements_fwd,
            displacements_bwd: &self.displacements_bwd,
        };

        let accepted =
            InstanceAssembler::new(config, &self.graph, tensors, &mut self.candidates)?.run();
        log::debug!("accepted {} poses", accepted.len());

        let mut poses = Vec::new();
        poses.try_reserve_exact(accepted.len())?;
        poses.extend(
            accepted
                .iter()
                .map(|pose| PoseInstance::from_decoded(pose, scale_x, scale_y)),
        );

        Ok(poses)
    }
}

/// Decodes the poses of one frame.
///
/// Builds a fresh [`PoseNetDecoder`] for the call; use the decoder directly to
/// reuse its buffers across frames.
///
/// # Arguments
///
/// * `heatmap` - Raw heatmap logits with shape (H, W, K).
/// * `offsets` - Raw short-range offsets with shape (H, W, 2, K).
/// * `displacements` - Raw mid-range displacements with shape (H, W, 4, K - 1).
/// * `config` - The decoding configuration.
/// * `scale_x` - Horizontal factor from feature map pixels to source frame pixels.
/// * `scale_y` - Vertical factor from feature map pixels to source frame pixels.
///
/// # Example
///
/// ```
/// use kornia_posenet::{decode_poses, DecodePosesConfig};
///
/// let config = DecodePosesConfig::new(9, 9, 16);
/// let heatmap = vec![-10.0; config.heatmap_len()];
/// let offsets = vec![0.0; config.offsets_len()];
/// let displacements = vec![0.0; config.displacements_len()];
///
/// let poses = decode_poses(&heatmap, &offsets, &displacements, &config, 1.0, 1.0).unwrap();
/// assert!(poses.is_empty());
/// ```
pub fn decode_poses(
    heatmap: &[f32],
    offsets: &[f32],
    displacements: &[f32],
    config: &DecodePosesConfig,
    scale_x: f32,
    scale_y: f32,
) -> Result<Vec<PoseInstance>, PoseError> {
    PoseNetDecoder::new(config.clone())?.decode(heatmap, offsets, displacements, scale_x, scale_y)
}
