use crate::{
    Result,
    layout::{BitLayout, Parts},
};

/// Recovers the machine id embedded in `id`.
///
/// This is the exact inverse of the packing done by a [`Worker`] using the
/// same `layout`. It does not touch any worker state.
///
/// # Errors
///
/// Returns [`Error::BitsSum`] if `layout` is invalid.
///
/// # Example
///
/// ```
/// use flurry::{BitLayout, extract_machine_id};
///
/// let layout = BitLayout::new(0, 41, 10, 12).unwrap();
/// let id = (1_000 << 22) | (5 << 12) | 7;
/// assert_eq!(extract_machine_id(&layout, id).unwrap(), 5);
/// ```
///
/// [`Worker`]: crate::Worker
/// [`Error::BitsSum`]: crate::Error::BitsSum
pub fn extract_machine_id(layout: &BitLayout, id: i64) -> Result<i64> {
    Ok(layout.packing()?.machine_id().extract(id))
}

/// Splits `id` into all of its fields.
///
/// # Errors
///
/// Returns [`Error::BitsSum`] if `layout` is invalid.
///
/// [`Error::BitsSum`]: crate::Error::BitsSum
pub fn decompose(layout: &BitLayout, id: i64) -> Result<Parts> {
    Ok(layout.packing()?.unpack(id))
}
