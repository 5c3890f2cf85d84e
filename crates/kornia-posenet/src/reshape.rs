//! Index permutations between the raw network layouts and the decoder layouts.
//!
//! The network emits offsets as `[H, W, 2, K]` and displacements as
//! `[H, W, 4, E]` with the channel blocks ordered forward y, forward x,
//! backward y, backward x. The decoder reads both per keypoint/edge as
//! contiguous `(y, x)` pairs, i.e. `[H, W, K, 2]` and `[H, W, E, 2]`.

use crate::error::PoseError;

/// Transposes a `rows x cols` row-major block into a `cols x rows` one.
#[inline]
fn transpose_block<T: Copy>(src: &[T], dst: &mut [T], rows: usize, cols: usize) {
    for r in 0..rows {
        for c in 0..cols {
            dst[c * rows + r] = src[r * cols + c];
        }
    }
}

fn check_len(name: &'static str, len: usize, expected: usize) -> Result<(), PoseError> {
    if len != expected {
        return Err(PoseError::TensorLengthMismatch(name, expected, len));
    }
    Ok(())
}

/// Reshape the offsets from `[H, W, 2, K]` into `[H, W, K, 2]`.
///
/// # Arguments
///
/// * `src` - The raw offsets with `num_cells * 2 * num_keypoints` elements.
/// * `dst` - The reshaped offsets, same length as `src`.
/// * `num_cells` - The number of cells of the feature map, `H * W`.
/// * `num_keypoints` - The number of keypoints `K`.
pub fn reshape_offsets(
    src: &[f32],
    dst: &mut [f32],
    num_cells: usize,
    num_keypoints: usize,
) -> Result<(), PoseError> {
    let block = 2 * num_keypoints;
    check_len("offsets", src.len(), num_cells * block)?;
    check_len("offsets", dst.len(), num_cells * block)?;

    if block == 0 {
        return Ok(());
    }

    src.chunks_exact(block)
        .zip(dst.chunks_exact_mut(block))
        .for_each(|(s, d)| transpose_block(s, d, 2, num_keypoints));

    Ok(())
}

/// Inverse of [`reshape_offsets`], from `[H, W, K, 2]` back into `[H, W, 2, K]`.
pub fn inverse_reshape_offsets(
    src: &[f32],
    dst: &mut [f32],
    num_cells: usize,
    num_keypoints: usize,
) -> Result<(), PoseError> {
    let block = 2 * num_keypoints;
    check_len("offsets", src.len(), num_cells * block)?;
    check_len("offsets", dst.len(), num_cells * block)?;

    if block == 0 {
        return Ok(());
    }

    src.chunks_exact(block)
        .zip(dst.chunks_exact_mut(block))
        .for_each(|(s, d)| transpose_block(s, d, num_keypoints, 2));

    Ok(())
}

/// Split the displacements from `[H, W, 4, E]` into forward and backward `[H, W, E, 2]`.
///
/// Channels 0-1 hold the forward (parent to child) vectors and channels 2-3 the
/// backward (child to parent) vectors.
///
/// # Arguments
///
/// * `src` - The raw displacements with `num_cells * 4 * num_edges` elements.
/// * `forward` - The forward displacements with `num_cells * 2 * num_edges` elements.
/// * `backward` - The backward displacements with `num_cells * 2 * num_edges` elements.
/// * `num_cells` - The number of cells of the feature map, `H * W`.
/// * `num_edges` - The number of edges `E` of the pose chain.
pub fn reshape_displacements(
    src: &[f32],
    forward: &mut [f32],
    backward: &mut [f32],
    num_cells: usize,
    num_edges: usize,
) -> Result<(), PoseError> {
    let half = 2 * num_edges;
    check_len("displacements", src.len(), num_cells * 2 * half)?;
    check_len("forward displacements", forward.len(), num_cells * half)?;
    check_len("backward displacements", backward.len(), num_cells * half)?;

    if half == 0 {
        return Ok(());
    }

    src.chunks_exact(2 * half)
        .zip(forward.chunks_exact_mut(half))
        .zip(backward.chunks_exact_mut(half))
        .for_each(|((s, fwd), bwd)| {
            let (s_fwd, s_bwd) = s.split_at(half);
            transpose_block(s_fwd, fwd, 2, num_edges);
            transpose_block(s_bwd, bwd, 2, num_edges);
        });

    Ok(())
}

/// Inverse of [`reshape_displacements`], merging both fields back into `[H, W, 4, E]`.
pub fn inverse_reshape_displacements(
    forward: &[f32],
    backward: &[f32],
    dst: &mut [f32],
    num_cells: usize,
    num_edges: usize,
) -> Result<(), PoseError> {
    let half = 2 * num_edges;
    check_len("forward displacements", forward.len(), num_cells * half)?;
    check_len("backward displacements", backward.len(), num_cells * half)?;
    check_len("displacements", dst.len(), num_cells * 2 * half)?;

    if half == 0 {
        return Ok(());
    }

    dst.chunks_exact_mut(2 * half)
        .zip(forward.chunks_exact(half))
        .zip(backward.chunks_exact(half))
        .for_each(|((d, fwd), bwd)| {
            let (d_fwd, d_bwd) = d.split_at_mut(half);
            transpose_block(fwd, d_fwd, num_edges, 2);
            transpose_block(bwd, d_bwd, num_edges, 2);
        });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reshape_offsets() -> Result<(), PoseError> {
        // two cells, three keypoints: [y0 y1 y2 x0 x1 x2] per cell
        #[rustfmt::skip]
        let src = [
            0.0, 1.0, 2.0, 10.0, 11.0, 12.0,
            3.0, 4.0, 5.0, 13.0, 14.0, 15.0,
        ];
        let mut dst = [0.0; 12];
        reshape_offsets(&src, &mut dst, 2, 3)?;

        #[rustfmt::skip]
        assert_eq!(
            dst,
            [
                0.0, 10.0, 1.0, 11.0, 2.0, 12.0,
                3.0, 13.0, 4.0, 14.0, 5.0, 15.0,
            ]
        );

        let mut back = [0.0; 12];
        inverse_reshape_offsets(&dst, &mut back, 2, 3)?;
        assert_eq!(back, src);
        Ok(())
    }

    #[test]
    fn test_reshape_displacements() -> Result<(), PoseError> {
        // one cell, two edges: [fy0 fy1 fx0 fx1 by0 by1 bx0 bx1]
        let src = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let mut fwd = [0.0; 4];
        let mut bwd = [0.0; 4];
        reshape_displacements(&src, &mut fwd, &mut bwd, 1, 2)?;
        assert_eq!(fwd, [1.0, 3.0, 2.0, 4.0]);
        assert_eq!(bwd, [5.0, 7.0, 6.0, 8.0]);

        let mut back = [0.0; 8];
        inverse_reshape_displacements(&fwd, &bwd, &mut back, 1, 2)?;
        assert_eq!(back, src);
        Ok(())
    }

    #[test]
    fn test_reshape_length_mismatch() {
        let src = [0.0; 12];
        let mut dst = [0.0; 10];
        assert_eq!(
            reshape_offsets(&src, &mut dst, 2, 3),
            Err(PoseError::TensorLengthMismatch("offsets", 12, 10))
        );

        let mut fwd = [0.0; 4];
        let mut bwd = [0.0; 3];
        assert_eq!(
            reshape_displacements(&[0.0; 8], &mut fwd, &mut bwd, 1, 2),
            Err(PoseError::TensorLengthMismatch("backward displacements", 4, 3))
        );
    }
}
