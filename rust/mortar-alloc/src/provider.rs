//! The allocation provider: the allocate/reallocate/release triple that the
//! builders delegate all real memory acquisition to.

use std::cell::Cell;
use std::ptr::NonNull;

/// Source of raw backing storage for the builders.
///
/// A provider hands out uninitialized byte regions and takes them back.
/// "No memory" is signaled by returning `None`; callers never retry a
/// failed request.
pub trait AllocationProvider {
    /// Allocates a region of at least `size` bytes.
    ///
    /// Returns `None` when the provider cannot satisfy the request.
    fn allocate(&self, size: usize) -> Option<NonNull<u8>>;

    /// Resizes a previously allocated region, preserving the first
    /// `old_size.min(new_size)` bytes of its contents. On success the old
    /// pointer must no longer be used. On failure (`None`) the old region
    /// remains valid and untouched.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` or `reallocate` of this
    /// provider, and `old_size` must be the size it was last allocated
    /// with.
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>>;

    /// Returns a region to the provider.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` or `reallocate` of this
    /// provider, with `size` being the size it was last allocated with,
    /// and must not be used afterwards.
    unsafe fn release(&self, ptr: NonNull<u8>, size: usize);
}

/// The default provider, bound to the host's standard heap
/// (`malloc`/`realloc`/`free`).
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapProvider;

impl AllocationProvider for HeapProvider {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        // malloc(0) is allowed to return null; a one-byte region keeps the
        // "valid non-null base" invariant for degenerate capacities.
        let ptr = unsafe { libc::malloc(size.max(1)) };
        NonNull::new(ptr as *mut u8)
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        _old_size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        let ptr = unsafe { libc::realloc(ptr.as_ptr() as *mut libc::c_void, new_size.max(1)) };
        NonNull::new(ptr as *mut u8)
    }

    unsafe fn release(&self, ptr: NonNull<u8>, _size: usize) {
        unsafe { libc::free(ptr.as_ptr() as *mut libc::c_void) }
    }
}

/// A provider that serves a fixed number of requests and then reports
/// "no memory" forever after. Releases always succeed.
///
/// Intended for failure-injection tests; uses interior mutability and is
/// therefore not `Sync`.
#[derive(Debug)]
pub struct FailingProvider {
    inner: HeapProvider,
    remaining: Cell<usize>,
}

impl FailingProvider {
    /// Creates a provider that satisfies the next `successes`
    /// allocate/reallocate requests.
    pub fn after(successes: usize) -> FailingProvider {
        FailingProvider {
            inner: HeapProvider,
            remaining: Cell::new(successes),
        }
    }

    /// Number of requests this provider will still satisfy.
    pub fn remaining(&self) -> usize {
        self.remaining.get()
    }

    fn take_budget(&self) -> bool {
        let remaining = self.remaining.get();
        if remaining == 0 {
            return false;
        }
        self.remaining.set(remaining - 1);
        true
    }
}

impl AllocationProvider for FailingProvider {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        if !self.take_budget() {
            return None;
        }
        self.inner.allocate(size)
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        if !self.take_budget() {
            return None;
        }
        unsafe { self.inner.reallocate(ptr, old_size, new_size) }
    }

    unsafe fn release(&self, ptr: NonNull<u8>, size: usize) {
        unsafe { self.inner.release(ptr, size) }
    }
}
