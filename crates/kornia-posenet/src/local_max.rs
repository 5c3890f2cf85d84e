use crate::error::PoseError;

/// Running maximum over a window of `2 * radius + 1` elements, clamped at the borders.
///
/// The current maximum is carried over while it stays inside the window; the
/// window is only rescanned when the maximum slides out of it.
fn sliding_max<T, F>(line: &[T], radius: usize, mut emit: F)
where
    T: Copy + PartialOrd,
    F: FnMut(usize, T),
{
    let len = line.len();
    if len == 0 {
        return;
    }

    // wider windows cover the whole line
    let radius = radius.min(len - 1);

    let rescan = |lo: usize, hi: usize| {
        let mut idx = lo;
        for i in lo + 1..=hi {
            if line[i] >= line[idx] {
                idx = i;
            }
        }
        idx
    };

    let mut max_idx = rescan(0, radius);
    emit(0, line[max_idx]);

    for i in 1..len {
        let lo = i.saturating_sub(radius);
        let hi = i.saturating_add(radius).min(len - 1);

        if max_idx < lo {
            max_idx = rescan(lo, hi);
        } else if i.saturating_add(radius) < len && line[hi] >= line[max_idx] {
            max_idx = hi;
        }

        emit(i, line[max_idx]);
    }
}

/// Compute the maximum of every element over a 1D window of radius `radius`.
///
/// Windows are clamped to the slice, elements outside are not considered.
///
/// # Arguments
///
/// * `src` - The input values.
/// * `dst` - The output values, same length as `src`.
/// * `radius` - The half size of the window.
pub fn max_filter_1d<T>(src: &[T], dst: &mut [T], radius: usize) -> Result<(), PoseError>
where
    T: Copy + PartialOrd,
{
    if src.len() != dst.len() {
        return Err(PoseError::TensorLengthMismatch(
            "max filter output",
            src.len(),
            dst.len(),
        ));
    }

    sliding_max(src, radius, |i, v| dst[i] = v);

    Ok(())
}

/// Apply the 1D max filter on every row of `src` and write the result transposed.
///
/// `src` is `rows x cols` and `dst` is `cols x rows`, so running this twice
/// filters both axes and restores the original layout.
fn max_filter_rows_transposed<T>(src: &[T], dst: &mut [T], rows: usize, cols: usize, radius: usize)
where
    T: Copy + PartialOrd,
{
    for (r, line) in src.chunks_exact(cols).enumerate().take(rows) {
        sliding_max(line, radius, |c, v| dst[c * rows + r] = v);
    }
}

/// Compute the maximum of every cell over a square window of side `2 * radius + 1`.
///
/// The filter is separable: rows are filtered into a transposed scratch buffer
/// which is filtered again back into `dst`.
///
/// # Arguments
///
/// * `src` - The input field with shape (rows, cols).
/// * `dst` - The output field with shape (rows, cols).
/// * `transposed` - Scratch buffer with shape (cols, rows).
/// * `rows` - The number of rows.
/// * `cols` - The number of columns.
/// * `radius` - The half size of the window.
pub fn local_max_filter<T>(
    src: &[T],
    dst: &mut [T],
    transposed: &mut [T],
    rows: usize,
    cols: usize,
    radius: usize,
) -> Result<(), PoseError>
where
    T: Copy + PartialOrd,
{
    let len = rows
        .checked_mul(cols)
        .ok_or(PoseError::InvalidFeatureSize(rows, cols))?;
    if src.len() != len {
        return Err(PoseError::TensorLengthMismatch("score field", len, src.len()));
    }
    if dst.len() != len {
        return Err(PoseError::TensorLengthMismatch("max filter output", len, dst.len()));
    }
    if transposed.len() != len {
        return Err(PoseError::TensorLengthMismatch(
            "max filter scratch",
            len,
            transposed.len(),
        ));
    }

    if len == 0 {
        return Ok(());
    }

    max_filter_rows_transposed(src, transposed, rows, cols, radius);
    max_filter_rows_transposed(transposed, dst, cols, rows, radius);

    Ok(())
}
