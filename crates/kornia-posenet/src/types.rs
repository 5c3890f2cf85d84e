use serde::{Deserialize, Serialize};

use crate::{
    decoder::DecodedPose,
    keypoints::{KeypointKind, NUM_KEYPOINTS},
};

/// A keypoint in source frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Keypoint {
    /// Heatmap score of the keypoint, 0 if not decoded.
    pub score: f32,
    /// Horizontal pixel coordinate.
    pub x: i32,
    /// Vertical pixel coordinate.
    pub y: i32,
}

/// A decoded person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseInstance {
    /// Score of the whole instance.
    pub pose_score: f32,
    /// The keypoints indexed by keypoint id.
    pub keypoints: [Keypoint; NUM_KEYPOINTS],
}

impl PoseInstance {
    /// Rescale a decoded pose to the source frame, rounding to the nearest pixel.
    pub fn from_decoded(pose: &DecodedPose, scale_x: f32, scale_y: f32) -> Self {
        let mut keypoints = [Keypoint::default(); NUM_KEYPOINTS];
        for (dst, src) in keypoints.iter_mut().zip(pose.keypoints.iter()) {
            *dst = Keypoint {
                score: src.score,
                x: (src.x * scale_x).round() as i32,
                y: (src.y * scale_y).round() as i32,
            };
        }

        Self {
            pose_score: pose.score,
            keypoints,
        }
    }

    /// Get a keypoint by its semantic kind.
    #[inline]
    pub fn keypoint(&self, kind: KeypointKind) -> &Keypoint {
        &self.keypoints[usize::from(kind)]
    }

    /// The `(min_x, min_y, max_x, max_y)` box around the keypoints with a positive score.
    pub fn bounding_box(&self) -> Option<(i32, i32, i32, i32)> {
        self.keypoints
            .iter()
            .filter(|kp| kp.score > 0.0)
            .fold(None, |acc, kp| match acc {
                None => Some((kp.x, kp.y, kp.x, kp.y)),
                Some((x0, y0, x1, y1)) => {
                    Some((x0.min(kp.x), y0.min(kp.y), x1.max(kp.x), y1.max(kp.y)))
                }
            })
    }
}
