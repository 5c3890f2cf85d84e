use std::str::FromStr;

use crate::error::PoseError;

/// Number of keypoints in a PoseNet skeleton.
pub const NUM_KEYPOINTS: usize = 17;

/// Number of edges in the pose chain.
pub const NUM_EDGES: usize = NUM_KEYPOINTS - 1;

/// Keypoint names, indexed by keypoint id.
pub const KEYPOINT_NAMES: [&str; NUM_KEYPOINTS] = [
    "nose",
    "leftEye",
    "rightEye",
    "leftEar",
    "rightEar",
    "leftShoulder",
    "rightShoulder",
    "leftElbow",
    "rightElbow",
    "leftWrist",
    "rightWrist",
    "leftHip",
    "rightHip",
    "leftKnee",
    "rightKnee",
    "leftAnkle",
    "rightAnkle",
];

/// The (parent, child) pairs of the pose chain, in displacement channel order.
pub const POSE_CHAIN: [(&str, &str); NUM_EDGES] = [
    ("nose", "leftEye"),
    ("leftEye", "leftEar"),
    ("nose", "rightEye"),
    ("rightEye", "rightEar"),
    ("nose", "leftShoulder"),
    ("leftShoulder", "leftElbow"),
    ("leftElbow", "leftWrist"),
    ("leftShoulder", "leftHip"),
    ("leftHip", "leftKnee"),
    ("leftKnee", "leftAnkle"),
    ("nose", "rightShoulder"),
    ("rightShoulder", "rightElbow"),
    ("rightElbow", "rightWrist"),
    ("rightShoulder", "rightHip"),
    ("rightHip", "rightKnee"),
    ("rightKnee", "rightAnkle"),
];

/// The keypoints of a PoseNet skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeypointKind {
    /// Nose
    Nose = 0,
    /// Left eye
    LeftEye = 1,
    /// Right eye
    RightEye = 2,
    /// Left ear
    LeftEar = 3,
    /// Right ear
    RightEar = 4,
    /// Left shoulder
    LeftShoulder = 5,
    /// Right shoulder
    RightShoulder = 6,
    /// Left elbow
    LeftElbow = 7,
    /// Right elbow
    RightElbow = 8,
    /// Left wrist
    LeftWrist = 9,
    /// Right wrist
    RightWrist = 10,
    /// Left hip
    LeftHip = 11,
    /// Right hip
    RightHip = 12,
    /// Left knee
    LeftKnee = 13,
    /// Right knee
    RightKnee = 14,
    /// Left ankle
    LeftAnkle = 15,
    /// Right ankle
    RightAnkle = 16,
}

impl KeypointKind {
    /// All keypoints, ordered by id.
    pub const ALL: [KeypointKind; NUM_KEYPOINTS] = [
        KeypointKind::Nose,
        KeypointKind::LeftEye,
        KeypointKind::RightEye,
        KeypointKind::LeftEar,
        KeypointKind::RightEar,
        KeypointKind::LeftShoulder,
        KeypointKind::RightShoulder,
        KeypointKind::LeftElbow,
        KeypointKind::RightElbow,
        KeypointKind::LeftWrist,
        KeypointKind::RightWrist,
        KeypointKind::LeftHip,
        KeypointKind::RightHip,
        KeypointKind::LeftKnee,
        KeypointKind::RightKnee,
        KeypointKind::LeftAnkle,
        KeypointKind::RightAnkle,
    ];

    /// Returns the PoseNet name of the keypoint, e.g. `leftShoulder`.
    #[inline]
    pub fn name(self) -> &'static str {
        KEYPOINT_NAMES[self as usize]
    }
}

impl From<KeypointKind> for usize {
    fn from(kind: KeypointKind) -> usize {
        kind as usize
    }
}

impl TryFrom<usize> for KeypointKind {
    type Error = PoseError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        KeypointKind::ALL
            .get(value)
            .copied()
            .ok_or_else(|| PoseError::UnknownKeypoint(value.to_string()))
    }
}

impl FromStr for KeypointKind {
    type Err = PoseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KEYPOINT_NAMES
            .iter()
            .position(|name| *name == s)
            .map(|id| KeypointKind::ALL[id])
            .ok_or_else(|| PoseError::UnknownKeypoint(s.to_string()))
    }
}

/// A directed edge of the pose chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Keypoint id of the parent.
    pub parent: usize,
    /// Keypoint id of the child.
    pub child: usize,
}

/// The keypoint taxonomy and the tree connecting the keypoints.
///
/// The graph is validated once on construction: every name in the chain must
/// exist in the keypoint table, the edges must span all keypoints and each
/// edge must start from a keypoint reached by the edges before it.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseGraph {
    names: Vec<&'static str>,
    edges: Vec<Edge>,
}

impl PoseGraph {
    /// Creates the standard PoseNet graph from [`KEYPOINT_NAMES`] and [`POSE_CHAIN`].
    pub fn posenet() -> Result<Self, PoseError> {
        Self::from_tables(&KEYPOINT_NAMES, &POSE_CHAIN)
    }

    /// Creates a pose graph from a keypoint table and a chain of named edges.
    ///
    /// # Arguments
    ///
    /// * `names` - The keypoint names, indexed by keypoint id.
    /// * `chain` - The (parent, child) name pairs of the pose chain.
    ///
    /// # Errors
    ///
    /// Fails if the table does not hold [`NUM_KEYPOINTS`] unique names, if an edge
    /// references an unknown name, if an edge is listed before its parent is
    /// reached, or if the edges do not form a spanning tree.
    pub fn from_tables(
        names: &[&'static str],
        chain: &[(&'static str, &'static str)],
    ) -> Result<Self, PoseError> {
        if names.len() != NUM_KEYPOINTS {
            return Err(PoseError::InvalidKeypointTable(NUM_KEYPOINTS, names.len()));
        }

        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(PoseError::DuplicateKeypoint(name.to_string()));
            }
        }

        if chain.len() != names.len() - 1 {
            return Err(PoseError::InvalidEdgeCount(names.len() - 1, chain.len()));
        }

        let lookup = |name: &str| {
            names
                .iter()
                .position(|n| *n == name)
                .ok_or_else(|| PoseError::UnknownKeypoint(name.to_string()))
        };

        let edges = chain
            .iter()
            .map(|&(parent, child)| {
                Ok(Edge {
                    parent: lookup(parent)?,
                    child: lookup(child)?,
                })
            })
            .collect::<Result<Vec<_>, PoseError>>()?;

        // decoding walks the edges once in each direction, so every parent
        // must be reached before its children are listed
        let mut reached = vec![false; names.len()];
        if let Some(root) = edges.first() {
            reached[root.parent] = true;
        }
        for edge in &edges {
            if !reached[edge.parent] {
                return Err(PoseError::UnorderedEdge(
                    names[edge.parent].to_string(),
                    names[edge.child].to_string(),
                ));
            }
            reached[edge.child] = true;
        }

        if let Some(id) = reached.iter().position(|r| !r) {
            return Err(PoseError::DisconnectedKeypoint(names[id].to_string()));
        }

        Ok(Self {
            names: names.to_vec(),
            edges,
        })
    }

    /// Returns the id of the keypoint with the given name.
    pub fn keypoint_id(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| *n == name)
    }

    /// Returns the name of the keypoint with the given id.
    pub fn keypoint_name(&self, id: usize) -> Option<&'static str> {
        self.names.get(id).copied()
    }

    /// Returns the edges of the pose chain.
    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Returns the number of keypoints in the graph.
    #[inline]
    pub fn num_keypoints(&self) -> usize {
        self.names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posenet_graph() -> Result<(), PoseError> {
        let graph = PoseGraph::posenet()?;
        assert_eq!(graph.num_keypoints(), 17);
        assert_eq!(graph.edges().len(), 16);
        assert_eq!(graph.keypoint_id("nose"), Some(0));
        assert_eq!(graph.keypoint_id("rightAnkle"), Some(16));
        assert_eq!(graph.keypoint_id("tail"), None);
        assert_eq!(graph.keypoint_name(7), Some("leftElbow"));
        assert_eq!(
            graph.edges()[1],
            Edge {
                parent: KeypointKind::LeftEye as usize,
                child: KeypointKind::LeftEar as usize,
            }
        );
        Ok(())
    }

    #[test]
    fn test_keypoint_kind_names() -> Result<(), PoseError> {
        for (id, kind) in KeypointKind::ALL.iter().enumerate() {
            assert_eq!(usize::from(*kind), id);
            assert_eq!(KeypointKind::try_from(id)?, *kind);
            assert_eq!(kind.name().parse::<KeypointKind>()?, *kind);
        }
        assert!(KeypointKind::try_from(17).is_err());
        assert!("leftFoot".parse::<KeypointKind>().is_err());
        Ok(())
    }

    #[test]
    fn test_unknown_keypoint_in_chain() {
        let mut chain = POSE_CHAIN;
        chain[3] = ("rightEye", "rightEarlobe");
        let res = PoseGraph::from_tables(&KEYPOINT_NAMES, &chain);
        assert_eq!(
            res,
            Err(PoseError::UnknownKeypoint("rightEarlobe".to_string()))
        );
    }

    #[test]
    fn test_duplicate_keypoint() {
        let mut names = KEYPOINT_NAMES;
        names[2] = "leftEye";
        let res = PoseGraph::from_tables(&names, &POSE_CHAIN);
        assert_eq!(res, Err(PoseError::DuplicateKeypoint("leftEye".to_string())));
    }

    #[test]
    fn test_wrong_edge_count() {
        let res = PoseGraph::from_tables(&KEYPOINT_NAMES, &POSE_CHAIN[..15]);
        assert_eq!(res, Err(PoseError::InvalidEdgeCount(16, 15)));
    }

    #[test]
    fn test_disconnected_keypoint() {
        // a cycle between the ears leaves the right ankle unreachable
        let mut chain = POSE_CHAIN;
        chain[15] = ("leftEar", "rightEar");
        let res = PoseGraph::from_tables(&KEYPOINT_NAMES, &chain);
        assert_eq!(
            res,
            Err(PoseError::DisconnectedKeypoint("rightAnkle".to_string()))
        );
    }

    #[test]
    fn test_edge_listed_before_its_parent() {
        // nose -> leftEye now comes after leftEye -> leftEar
        let mut chain = POSE_CHAIN;
        chain.swap(0, 1);
        let res = PoseGraph::from_tables(&KEYPOINT_NAMES, &chain);
        assert_eq!(
            res,
            Err(PoseError::UnorderedEdge(
                "nose".to_string(),
                "leftEye".to_string()
            ))
        );
    }

    #[test]
    fn test_reordered_branches_are_accepted() -> Result<(), PoseError> {
        // right limbs before left limbs, parents still come first
        let mut chain = POSE_CHAIN;
        chain[4..].rotate_left(6);
        let graph = PoseGraph::from_tables(&KEYPOINT_NAMES, &chain)?;
        assert_eq!(
            graph.edges()[4],
            Edge {
                parent: KeypointKind::Nose as usize,
                child: KeypointKind::RightShoulder as usize,
            }
        );
        Ok(())
    }

    #[test]
    fn test_wrong_table_size() {
        let res = PoseGraph::from_tables(&KEYPOINT_NAMES[..5], &POSE_CHAIN[..4]);
        assert_eq!(res, Err(PoseError::InvalidKeypointTable(17, 5)));
    }
}
