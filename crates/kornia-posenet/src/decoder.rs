use crate::{
    config::DecodePosesConfig,
    keypoints::{PoseGraph, NUM_KEYPOINTS},
    score::Candidate,
};

/// A keypoint in feature map pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DecodedKeypoint {
    /// Heatmap score, 0 while the keypoint is not decoded.
    pub score: f32,
    /// Vertical pixel coordinate.
    pub y: f32,
    /// Horizontal pixel coordinate.
    pub x: f32,
}

impl DecodedKeypoint {
    /// Squared euclidean distance to another keypoint.
    #[inline]
    pub fn squared_distance(&self, other: &DecodedKeypoint) -> f32 {
        let dy = self.y - other.y;
        let dx = self.x - other.x;
        dy * dy + dx * dx
    }
}

/// A pose instance before rescaling to the source frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPose {
    /// The keypoints indexed by keypoint id.
    pub keypoints: [DecodedKeypoint; NUM_KEYPOINTS],
    /// The instance score, set once the pose has been scored.
    pub score: f32,
}

/// Borrowed view over the decoder-layout tensors of one frame.
#[derive(Debug, Clone, Copy)]
pub struct PoseTensors<'a> {
    /// Normalized heatmap with shape (H, W, K).
    pub scores: &'a [f32],
    /// Offsets with shape (H, W, K, 2), `(y, x)` ordered.
    pub offsets: &'a [f32],
    /// Parent to child displacements with shape (H, W, E, 2).
    pub displacements_fwd: &'a [f32],
    /// Child to parent displacements with shape (H, W, E, 2).
    pub displacements_bwd: &'a [f32],
}

/// Map a pixel coordinate to the nearest grid index, clamped to `[0, dim - 1]`.
#[inline]
fn to_grid(coord: f32, output_stride: usize, dim: usize) -> usize {
    let cell = (coord / output_stride as f32).round();
    // NaN casts to 0
    cell.clamp(0.0, (dim - 1) as f32) as usize
}

impl PoseTensors<'_> {
    #[inline]
    fn score(&self, config: &DecodePosesConfig, row: usize, col: usize, keypoint: usize) -> f32 {
        self.scores[(row * config.feature_width + col) * config.num_keypoints + keypoint]
    }

    #[inline]
    fn offset(
        &self,
        config: &DecodePosesConfig,
        row: usize,
        col: usize,
        keypoint: usize,
    ) -> (f32, f32) {
        let idx = ((row * config.feature_width + col) * config.num_keypoints + keypoint) * 2;
        (self.offsets[idx], self.offsets[idx + 1])
    }

    #[inline]
    fn displacement(
        field: &[f32],
        config: &DecodePosesConfig,
        row: usize,
        col: usize,
        edge: usize,
    ) -> (f32, f32) {
        let idx = ((row * config.feature_width + col) * config.num_edges() + edge) * 2;
        (field[idx], field[idx + 1])
    }

    /// The keypoint located at a grid cell, refined by its short-range offset.
    pub fn keypoint_at(
        &self,
        config: &DecodePosesConfig,
        row: usize,
        col: usize,
        keypoint: usize,
        score: f32,
    ) -> DecodedKeypoint {
        let (dy, dx) = self.offset(config, row, col, keypoint);
        DecodedKeypoint {
            score,
            y: (row * config.output_stride) as f32 + dy,
            x: (col * config.output_stride) as f32 + dx,
        }
    }

    /// The pixel position of a root candidate.
    pub fn root_keypoint(&self, config: &DecodePosesConfig, root: &Candidate) -> DecodedKeypoint {
        self.keypoint_at(config, root.row, root.col, root.keypoint, root.score)
    }
}

/// Follow one edge from `source` to `target` using a displacement field.
fn propagate(
    tensors: &PoseTensors<'_>,
    config: &DecodePosesConfig,
    field: &[f32],
    edge: usize,
    source: &DecodedKeypoint,
    target: usize,
) -> DecodedKeypoint {
    let (h, w, stride) = (
        config.feature_height,
        config.feature_width,
        config.output_stride,
    );

    let row = to_grid(source.y, stride, h);
    let col = to_grid(source.x, stride, w);
    let (dy, dx) = PoseTensors::displacement(field, config, row, col, edge);

    let displaced_row = to_grid(source.y + dy, stride, h);
    let displaced_col = to_grid(source.x + dx, stride, w);

    let score = tensors.score(config, displaced_row, displaced_col, target);
    tensors.keypoint_at(config, displaced_row, displaced_col, target, score)
}

/// Reconstruct a full pose starting from a root candidate.
///
/// The backward pass walks the chain from the last edge to the first and
/// decodes parents of decoded children; the forward pass then walks it from the
/// first edge and decodes children of decoded parents. A keypoint counts as
/// decoded once its score is non zero.
///
/// # Arguments
///
/// * `tensors` - The decoder-layout tensors of the frame.
/// * `graph` - The pose chain.
/// * `config` - The decoding configuration.
/// * `root` - The candidate the pose grows from.
///
/// # Returns
///
/// The decoded pose with a zero instance score.
pub fn decode_pose(
    tensors: &PoseTensors<'_>,
    graph: &PoseGraph,
    config: &DecodePosesConfig,
    root: &Candidate,
) -> DecodedPose {
    let mut keypoints = [DecodedKeypoint::default(); NUM_KEYPOINTS];
    keypoints[root.keypoint] = tensors.root_keypoint(config, root);

    for (edge_id, edge) in graph.edges().iter().enumerate().rev() {
        if keypoints[edge.child].score != 0.0 && keypoints[edge.parent].score == 0.0 {
            keypoints[edge.parent] = propagate(
                tensors,
                config,
                tensors.displacements_bwd,
                edge_id,
                &keypoints[edge.child],
                edge.parent,
            );
        }
    }

    for (edge_id, edge) in graph.edges().iter().enumerate() {
        if keypoints[edge.parent].score != 0.0 && keypoints[edge.child].score == 0.0 {
            keypoints[edge.child] = propagate(
                tensors,
                config,
                tensors.displacements_fwd,
                edge_id,
                &keypoints[edge.parent],
                edge.child,
            );
        }
    }

    DecodedPose {
        keypoints,
        score: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::PoseError, keypoints::KeypointKind};

    struct Frame {
        config: DecodePosesConfig,
        scores: Vec<f32>,
        offsets: Vec<f32>,
        fwd: Vec<f32>,
        bwd: Vec<f32>,
    }

    impl Frame {
        fn new(config: DecodePosesConfig, score: f32) -> Self {
            let cells = config.num_cells();
            Self {
                scores: vec![score; config.heatmap_len()],
                offsets: vec![0.0; config.offsets_len()],
                fwd: vec![0.0; cells * config.num_edges() * 2],
                bwd: vec![0.0; cells * config.num_edges() * 2],
                config,
            }
        }

        fn tensors(&self) -> PoseTensors<'_> {
            PoseTensors {
                scores: &self.scores,
                offsets: &self.offsets,
                displacements_fwd: &self.fwd,
                displacements_bwd: &self.bwd,
            }
        }

        fn cell(&self, row: usize, col: usize) -> usize {
            row * self.config.feature_width + col
        }
    }

    #[test]
    fn test_to_grid() {
        assert_eq!(to_grid(0.0, 8, 5), 0);
        assert_eq!(to_grid(11.9, 8, 5), 1);
        assert_eq!(to_grid(12.1, 8, 5), 2);
        assert_eq!(to_grid(-30.0, 8, 5), 0);
        assert_eq!(to_grid(1000.0, 8, 5), 4);
        assert_eq!(to_grid(f32::NAN, 8, 5), 0);
    }

    #[test]
    fn test_decode_pose_zero_displacement() -> Result<(), PoseError> {
        let graph = PoseGraph::posenet()?;
        let frame = Frame::new(DecodePosesConfig::new(5, 5, 8), 0.5);

        let root = Candidate {
            row: 2,
            col: 3,
            keypoint: KeypointKind::LeftWrist as usize,
            score: 0.9,
        };
        let pose = decode_pose(&frame.tensors(), &graph, &frame.config, &root);

        for (id, kp) in pose.keypoints.iter().enumerate() {
            let expected = if id == root.keypoint { 0.9 } else { 0.5 };
            assert_eq!(kp.score, expected);
            assert_eq!((kp.y, kp.x), (16.0, 24.0));
        }
        assert_eq!(pose.score, 0.0);
        Ok(())
    }

    #[test]
    fn test_decode_pose_follows_displacements() -> Result<(), PoseError> {
        let graph = PoseGraph::posenet()?;
        let mut frame = Frame::new(DecodePosesConfig::new(6, 6, 10), 0.3);
        let num_edges = frame.config.num_edges();
        let num_keypoints = frame.config.num_keypoints;

        // root: left eye at (1, 1); the nose sits one cell to the right,
        // the left ear one cell below
        let nose = KeypointKind::Nose as usize;
        let left_ear = KeypointKind::LeftEar as usize;
        let cell = frame.cell(1, 1);
        // edge 0: nose -> leftEye, walked backwards
        frame.bwd[(cell * num_edges) * 2 + 1] = 10.0;
        // edge 1: leftEye -> leftEar, walked forwards
        frame.fwd[(cell * num_edges + 1) * 2] = 10.0;

        let nose_cell = frame.cell(1, 2);
        frame.scores[nose_cell * num_keypoints + nose] = 0.8;
        frame.offsets[(nose_cell * num_keypoints + nose) * 2] = 1.5;
        frame.offsets[(nose_cell * num_keypoints + nose) * 2 + 1] = -2.0;

        let ear_cell = frame.cell(2, 1);
        frame.scores[ear_cell * num_keypoints + left_ear] = 0.7;

        let root = Candidate {
            row: 1,
            col: 1,
            keypoint: KeypointKind::LeftEye as usize,
            score: 0.95,
        };
        let pose = decode_pose(&frame.tensors(), &graph, &frame.config, &root);

        let nose_kp = pose.keypoints[nose];
        assert_eq!(nose_kp.score, 0.8);
        assert_eq!((nose_kp.y, nose_kp.x), (11.5, 18.0));

        let ear_kp = pose.keypoints[left_ear];
        assert_eq!(ear_kp.score, 0.7);
        assert_eq!((ear_kp.y, ear_kp.x), (20.0, 10.0));

        // everything else hangs off the nose, which sits at cell (1, 2)
        let right_eye = pose.keypoints[KeypointKind::RightEye as usize];
        assert_eq!((right_eye.y, right_eye.x), (10.0, 20.0));
        assert!(pose.keypoints.iter().all(|kp| kp.score > 0.0));
        Ok(())
    }

    #[test]
    fn test_decode_pose_every_root_reaches_all_keypoints() -> Result<(), PoseError> {
        let graph = PoseGraph::posenet()?;
        let frame = Frame::new(DecodePosesConfig::new(3, 3, 16), 0.2);

        for keypoint in 0..NUM_KEYPOINTS {
            let root = Candidate {
                row: 1,
                col: 1,
                keypoint,
                score: 0.6,
            };
            let pose = decode_pose(&frame.tensors(), &graph, &frame.config, &root);
            assert!(pose.keypoints.iter().all(|kp| kp.score > 0.0));
        }
        Ok(())
    }

    #[test]
    fn test_decode_pose_reordered_graph_reaches_all_keypoints() -> Result<(), PoseError> {
        use crate::keypoints::{KEYPOINT_NAMES, POSE_CHAIN};

        let mut chain = POSE_CHAIN;
        chain[4..].rotate_left(6);
        let graph = PoseGraph::from_tables(&KEYPOINT_NAMES, &chain)?;
        let frame = Frame::new(DecodePosesConfig::new(3, 3, 16), 0.2);

        for keypoint in 0..NUM_KEYPOINTS {
            let root = Candidate {
                row: 0,
                col: 2,
                keypoint,
                score: 0.6,
            };
            let pose = decode_pose(&frame.tensors(), &graph, &frame.config, &root);
            assert!(pose.keypoints.iter().all(|kp| kp.score > 0.0));
        }
        Ok(())
    }

    #[test]
    fn test_decode_pose_clamps_displacements_off_the_map() -> Result<(), PoseError> {
        let graph = PoseGraph::posenet()?;
        let mut frame = Frame::new(DecodePosesConfig::new(4, 4, 8), 0.3);
        let num_edges = frame.config.num_edges();

        // bottom-left corner, every edge points far above and right of the map
        let cell = frame.cell(3, 0);
        for edge in 0..num_edges {
            frame.fwd[(cell * num_edges + edge) * 2] = -1000.0;
            frame.fwd[(cell * num_edges + edge) * 2 + 1] = 1000.0;
        }

        let root = Candidate {
            row: 3,
            col: 0,
            keypoint: KeypointKind::Nose as usize,
            score: 0.9,
        };
        let pose = decode_pose(&frame.tensors(), &graph, &frame.config, &root);

        let nose = pose.keypoints[root.keypoint];
        assert_eq!((nose.y, nose.x), (24.0, 0.0));

        // everything lands on the top-right corner cell
        for (id, kp) in pose.keypoints.iter().enumerate() {
            if id != root.keypoint {
                assert_eq!(kp.score, 0.3);
                assert_eq!((kp.y, kp.x), (0.0, 24.0));
            }
        }
        Ok(())
    }

    #[test]
    fn test_squared_distance() {
        let a = DecodedKeypoint {
            score: 1.0,
            y: 1.0,
            x: 2.0,
        };
        let b = DecodedKeypoint {
            score: 0.0,
            y: 4.0,
            x: 6.0,
        };
        assert_eq!(a.squared_distance(&b), 25.0);
    }
}
