use crate::{
    config::DecodePosesConfig,
    decoder::{decode_pose, DecodedPose, PoseTensors},
    error::PoseError,
    keypoints::PoseGraph,
    score::Candidate,
};

/// The states of the instance assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// Pick the next root candidate and run the NMS pre-filter on it.
    Scanning,
    /// Decode a full pose from the current root.
    Decoding,
    /// Score the decoded pose against the accepted ones.
    Scoring,
    /// Keep the current pose.
    Accept,
    /// Drop the current root or pose.
    Reject,
    /// No candidates left or the detection limit is reached.
    Done,
}

/// Greedy assembly of pose instances from root candidates.
///
/// Candidates are visited by descending score. A root is dropped without
/// decoding when it lies within the NMS radius of the same keypoint of an
/// accepted pose; otherwise the pose is decoded and kept if its score, counting
/// only the keypoints that do not overlap any accepted pose, is strictly above
/// `min_pose_score`.
pub struct InstanceAssembler<'a> {
    config: &'a DecodePosesConfig,
    graph: &'a PoseGraph,
    tensors: PoseTensors<'a>,
    candidates: &'a [Candidate],
    cursor: usize,
    state: AssemblerState,
    root: Option<Candidate>,
    pose: Option<DecodedPose>,
    accepted: Vec<DecodedPose>,
}

impl<'a> InstanceAssembler<'a> {
    /// Creates an assembler over the given candidates, sorting them in place.
    ///
    /// Ties in score keep the emission order (keypoint, row, column).
    pub fn new(
        config: &'a DecodePosesConfig,
        graph: &'a PoseGraph,
        tensors: PoseTensors<'a>,
        candidates: &'a mut [Candidate],
    ) -> Result<Self, PoseError> {
        candidates.sort_unstable_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| (a.keypoint, a.row, a.col).cmp(&(b.keypoint, b.row, b.col)))
        });

        let mut accepted = Vec::new();
        accepted.try_reserve_exact(config.max_pose_detections.min(candidates.len()))?;

        Ok(Self {
            config,
            graph,
            tensors,
            candidates,
            cursor: 0,
            state: AssemblerState::Scanning,
            root: None,
            pose: None,
            accepted,
        })
    }

    /// Returns the current state.
    #[inline]
    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Returns the poses accepted so far.
    #[inline]
    pub fn accepted(&self) -> &[DecodedPose] {
        &self.accepted
    }

    fn squared_nms_radius(&self) -> f32 {
        self.config.nms_radius * self.config.nms_radius
    }

    /// Whether the root lies within the NMS radius of an accepted pose.
    ///
    /// The distance is squared once more before the comparison, which widens
    /// the suppression area compared with the scoring step.
    fn root_suppressed(&self, root: &Candidate) -> bool {
        let root_kp = self.tensors.root_keypoint(self.config, root);
        let radius_sq = self.squared_nms_radius();

        self.accepted.iter().any(|pose| {
            let d = root_kp.squared_distance(&pose.keypoints[root.keypoint]);
            d * d < radius_sq
        })
    }

    /// Mean score of the keypoints that do not overlap any accepted pose.
    ///
    /// The sum is always divided by the total number of keypoints.
    fn instance_score(&self, pose: &DecodedPose) -> f32 {
        let radius_sq = self.squared_nms_radius();

        let total: f32 = pose
            .keypoints
            .iter()
            .enumerate()
            .filter(|(k, kp)| {
                self.accepted
                    .iter()
                    .all(|other| kp.squared_distance(&other.keypoints[*k]) > radius_sq)
            })
            .map(|(_, kp)| kp.score)
            .sum();

        total / self.config.num_keypoints as f32
    }

    /// Run one transition of the state machine and return the new state.
    pub fn step(&mut self) -> AssemblerState {
        self.state = match self.state {
            AssemblerState::Scanning => {
                if self.accepted.len() >= self.config.max_pose_detections
                    || self.cursor >= self.candidates.len()
                {
                    AssemblerState::Done
                } else {
                    let root = self.candidates[self.cursor];
                    self.cursor += 1;
                    self.root = Some(root);

                    if self.root_suppressed(&root) {
                        log::trace!(
                            "root {} at ({}, {}) suppressed by an accepted pose",
                            root.keypoint,
                            root.row,
                            root.col
                        );
                        AssemblerState::Reject
                    } else {
                        AssemblerState::Decoding
                    }
                }
            }
            AssemblerState::Decoding => match self.root {
                Some(root) => {
                    self.pose = Some(decode_pose(&self.tensors, self.graph, self.config, &root));
                    AssemblerState::Scoring
                }
                None => AssemblerState::Scanning,
            },
            AssemblerState::Scoring => match self.pose.take() {
                Some(mut pose) => {
                    pose.score = self.instance_score(&pose);
                    let accept = pose.score > self.config.min_pose_score;
                    if !accept {
                        log::trace!(
                            "pose scored {} <= {}, rejected",
                            pose.score,
                            self.config.min_pose_score
                        );
                    }
                    self.pose = Some(pose);

                    if accept {
                        AssemblerState::Accept
                    } else {
                        AssemblerState::Reject
                    }
                }
                None => AssemblerState::Scanning,
            },
            AssemblerState::Accept => {
                if let Some(pose) = self.pose.take() {
                    self.accepted.push(pose);
                }
                self.root = None;
                AssemblerState::Scanning
            }
            AssemblerState::Reject => {
                self.pose = None;
                self.root = None;
                AssemblerState::Scanning
            }
            AssemblerState::Done => AssemblerState::Done,
        };

        self.state
    }

    /// Run the state machine to completion and return the accepted poses.
    pub fn run(mut self) -> Vec<DecodedPose> {
        while self.step() != AssemblerState::Done {}
        self.accepted
    }
}
