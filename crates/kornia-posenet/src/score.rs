use num_traits::Float;

use crate::{
    config::DecodePosesConfig, error::PoseError, local_max::local_max_filter,
    utils::resize_scratch,
};

/// The logistic function `1 / (1 + exp(-x))`.
#[inline]
pub fn sigmoid<T: Float>(x: T) -> T {
    T::one() / (T::one() + (-x).exp())
}

/// Convert raw heatmap logits into probabilities in place.
///
/// NaN inputs stay NaN; they never pass a score threshold downstream.
pub fn normalize<T: Float>(raw_scores: &mut [T]) {
    raw_scores.iter_mut().for_each(|x| *x = sigmoid(*x));
}

/// A heatmap cell that is a local maximum for one keypoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Row of the cell in the feature map.
    pub row: usize,
    /// Column of the cell in the feature map.
    pub col: usize,
    /// Keypoint id of the heatmap channel.
    pub keypoint: usize,
    /// Sigmoid-normalized heatmap score.
    pub score: f32,
}

/// Scratch space for extracting candidates from a normalized heatmap.
#[derive(Debug, Default, Clone)]
pub struct ScoreField {
    channel: Vec<f32>,
    filtered: Vec<f32>,
    transposed: Vec<f32>,
}

impl ScoreField {
    /// Creates an empty score field; buffers grow on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the local maxima of every keypoint channel of the heatmap.
    ///
    /// A cell is a candidate when its score is strictly above the heatmap
    /// threshold and equals the maximum of its `local_max_radius` window.
    /// Candidates are appended keypoint first, then row, then column.
    ///
    /// # Arguments
    ///
    /// * `config` - The decoding configuration.
    /// * `scores` - The normalized heatmap with shape (H, W, K).
    /// * `candidates` - The output list, cleared before use.
    pub fn select_candidates(
        &mut self,
        config: &DecodePosesConfig,
        scores: &[f32],
        candidates: &mut Vec<Candidate>,
    ) -> Result<(), PoseError> {
        if scores.len() != config.heatmap_len() {
            return Err(PoseError::TensorLengthMismatch(
                "heatmap",
                config.heatmap_len(),
                scores.len(),
            ));
        }

        let (rows, cols) = (config.feature_height, config.feature_width);
        let num_keypoints = config.num_keypoints;
        let threshold = config.heatmap_score_threshold;

        resize_scratch(&mut self.channel, rows * cols, 0.0)?;
        resize_scratch(&mut self.filtered, rows * cols, 0.0)?;
        resize_scratch(&mut self.transposed, rows * cols, 0.0)?;
        candidates.clear();

        for keypoint in 0..num_keypoints {
            self.channel
                .iter_mut()
                .zip(scores.iter().skip(keypoint).step_by(num_keypoints))
                .for_each(|(dst, &score)| {
                    *dst = if score > threshold { score } else { 0.0 };
                });

            local_max_filter(
                &self.channel,
                &mut self.filtered,
                &mut self.transposed,
                rows,
                cols,
                config.local_max_radius,
            )?;

            for (idx, (&score, &max)) in self.channel.iter().zip(self.filtered.iter()).enumerate()
            {
                if score > 0.0 && score == max {
                    candidates.try_reserve(1)?;
                    candidates.push(Candidate {
                        row: idx / cols,
                        col: idx % cols,
                        keypoint,
                        score,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Find the local maxima of every keypoint channel of a normalized heatmap.
///
/// See [`ScoreField::select_candidates`].
pub fn select_candidates(
    config: &DecodePosesConfig,
    scores: &[f32],
) -> Result<Vec<Candidate>, PoseError> {
    let mut candidates = Vec::new();
    ScoreField::new().select_candidates(config, scores, &mut candidates)?;
    Ok(candidates)
}
