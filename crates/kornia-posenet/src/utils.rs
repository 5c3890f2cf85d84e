use crate::error::PoseError;

/// Resize a scratch buffer to `len` elements filled with `value`.
///
/// The allocation goes through `try_reserve_exact` so that a failing allocator
/// surfaces as [`PoseError::OutOfMemory`] instead of aborting.
pub(crate) fn resize_scratch<T: Clone>(
    buf: &mut Vec<T>,
    len: usize,
    value: T,
) -> Result<(), PoseError> {
    buf.clear();
    buf.try_reserve_exact(len)?;
    buf.resize(len, value);
    Ok(())
}
