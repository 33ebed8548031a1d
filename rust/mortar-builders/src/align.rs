//! Alignment arithmetic shared by the variable-size builder and the stack
//! allocator.

/// The conservative default alignment boundary: the largest alignment
/// requirement among the target's fundamental scalar and pointer types.
/// Every variable-size append or stack allocation is rounded up to a
/// multiple of this value unless the caller overrides the boundary.
pub const MAX_ALIGN: usize = max_align();

const fn max_align() -> usize {
    let mut align = std::mem::align_of::<u128>();
    align = max2(align, std::mem::align_of::<f64>());
    align = max2(align, std::mem::align_of::<usize>());
    align = max2(align, std::mem::align_of::<*const ()>());
    align = max2(align, std::mem::align_of::<fn()>());
    align
}

const fn max2(a: usize, b: usize) -> usize {
    if a > b { a } else { b }
}

/// Aligns `n` up to the next multiple of `alignment`, or returns `None`
/// when the rounding would exceed `usize::MAX`. The check happens before
/// any arithmetic that could wrap.
///
/// `alignment` must be a nonzero power of two.
///
/// ```
/// use mortar_builders::align::checked_align_up;
///
/// assert_eq!(checked_align_up(0, 8), Some(0));
/// assert_eq!(checked_align_up(1, 8), Some(8));
/// assert_eq!(checked_align_up(8, 8), Some(8));
/// assert_eq!(checked_align_up(9, 8), Some(16));
/// assert_eq!(checked_align_up(usize::MAX, 8), None);
/// ```
#[inline]
pub fn checked_align_up(n: usize, alignment: usize) -> Option<usize> {
    debug_assert!(alignment != 0 && alignment.is_power_of_two());
    Some(n.checked_add(alignment - 1)? & !(alignment - 1))
}

/// Aligns `n` up to the next multiple of `alignment`.
///
/// `alignment` must be a nonzero power of two and the result must be
/// representable; use [`checked_align_up`] for caller-supplied sizes.
#[inline]
pub fn align_up(n: usize, alignment: usize) -> usize {
    debug_assert!(alignment != 0 && alignment.is_power_of_two());
    (n + alignment - 1) & !(alignment - 1)
}
