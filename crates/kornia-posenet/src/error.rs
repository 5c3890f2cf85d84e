use std::collections::TryReserveError;

/// Errors that can occur while decoding poses.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PoseError {
    /// The feature map must have at least one row and one column.
    #[error("Invalid feature map size ({0}x{1}), both dimensions must be > 0")]
    InvalidFeatureSize(usize, usize),

    /// The output stride must be greater than zero.
    #[error("Output stride must be > 0")]
    InvalidOutputStride,

    /// The configured number of keypoints does not match the pose graph.
    #[error("Number of keypoints ({1}) does not match the pose graph ({0})")]
    KeypointCountMismatch(usize, usize),

    /// The NMS radius must be finite and non-negative.
    #[error("Invalid NMS radius {0}, must be finite and >= 0")]
    InvalidNmsRadius(f32),

    /// A raw tensor does not have the length implied by the configuration.
    #[error("The {0} tensor length ({2}) does not match the expected length ({1})")]
    TensorLengthMismatch(&'static str, usize, usize),

    /// The keypoint table does not have the expected number of entries.
    #[error("Keypoint table has {1} entries, expected {0}")]
    InvalidKeypointTable(usize, usize),

    /// The same keypoint name appears twice in the keypoint table.
    #[error("Duplicate keypoint name `{0}`")]
    DuplicateKeypoint(String),

    /// An edge references a keypoint name missing from the keypoint table.
    #[error("Unknown keypoint name `{0}` in pose chain")]
    UnknownKeypoint(String),

    /// The pose chain does not have `num_keypoints - 1` edges.
    #[error("Pose chain has {1} edges, expected {0}")]
    InvalidEdgeCount(usize, usize),

    /// An edge of the pose chain is listed before its parent keypoint is reached.
    #[error("Edge `{0}` -> `{1}` is listed before `{0}` is reached by the pose chain")]
    UnorderedEdge(String, String),

    /// A keypoint cannot be reached from the rest of the pose chain.
    #[error("Keypoint `{0}` is not connected to the pose chain")]
    DisconnectedKeypoint(String),

    /// A scratch buffer could not be allocated.
    #[error("Failed to allocate scratch buffer")]
    OutOfMemory(#[from] TryReserveError),
}
