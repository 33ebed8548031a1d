//! The growable raw-byte region that the rest of the builder family is
//! layered on.

use std::ptr::NonNull;

use mortar_alloc::provider::{AllocationProvider, HeapProvider};
use mortar_alloc::sink::{DiagnosticSink, Fault, LogSink};
use mortar_common::Result;
use mortar_common::error::Error;

/// A growable region of raw bytes with a monotonically advancing "used"
/// cursor and a capacity ceiling.
///
/// Appends are contiguous: every append starts right where the previous
/// one ended, and the returned *offset* stays valid for the lifetime of
/// the builder. Views obtained through [`as_slice`](Self::as_slice) are
/// borrows and end at the next mutating call; growth relocates the
/// buffer, which is why only offsets may be held across calls.
///
/// Growth doubles the capacity (saturating at the addressable maximum, or
/// further if a single request needs more), so the total reallocation
/// cost stays amortized O(1) per appended byte. On any failure the
/// builder state is byte-for-byte unchanged.
///
/// The backing storage comes from an injected [`AllocationProvider`];
/// failures are reported to the injected [`DiagnosticSink`] before the
/// error is returned.
pub struct ByteBuilder<P: AllocationProvider = HeapProvider> {
    mem: NonNull<u8>,
    used: usize,
    capacity: usize,
    provider: P,
    sink: Box<dyn DiagnosticSink + Send + Sync>,
}

impl ByteBuilder {
    /// Creates a builder with exactly `capacity` bytes of backing storage
    /// from the standard heap, reporting faults through [`LogSink`].
    ///
    /// Precondition (debug-checked): `capacity > 0`.
    pub fn with_capacity(capacity: usize) -> Result<ByteBuilder> {
        Self::with_provider(capacity, HeapProvider)
    }
}

impl<P: AllocationProvider> ByteBuilder<P> {
    /// Creates a builder backed by the given provider.
    pub fn with_provider(capacity: usize, provider: P) -> Result<ByteBuilder<P>> {
        Self::with_provider_and_sink(capacity, provider, LogSink)
    }

    /// Creates a builder backed by the given provider, reporting faults to
    /// the given sink.
    pub fn with_provider_and_sink(
        capacity: usize,
        provider: P,
        sink: impl DiagnosticSink + Send + Sync + 'static,
    ) -> Result<ByteBuilder<P>> {
        debug_assert!(capacity > 0, "builder capacity must be positive");
        let Some(mem) = provider.allocate(capacity) else {
            sink.report(Fault::AllocationFailure, capacity);
            return Err(Error::allocation_failure(capacity));
        };
        Ok(ByteBuilder {
            mem,
            used: 0,
            capacity,
            provider,
            sink: Box::new(sink),
        })
    }

    /// Number of bytes appended so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.used
    }

    /// Returns `true` if nothing has been appended.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Number of bytes the builder can hold before the next growth.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copies `bytes` to the end of the region, growing if necessary, and
    /// returns the offset the copy starts at.
    pub fn append(&mut self, bytes: &[u8]) -> Result<usize> {
        let offset = self.used;
        self.reserve(bytes.len())?;
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.mem.as_ptr().add(offset),
                bytes.len(),
            );
        }
        self.used = offset + bytes.len();
        Ok(offset)
    }

    /// Sets aside `size` zero-filled bytes at the end of the region,
    /// growing if necessary, and returns the offset of the fresh span
    /// together with a mutable view of it for the caller to fill in.
    ///
    /// The view ends with this borrow; re-derive it from the offset via
    /// [`as_mut_slice`](Self::as_mut_slice) after any later append.
    /// `size == 0` is a valid no-op yielding an empty view.
    pub fn append_zeroed(&mut self, size: usize) -> Result<(usize, &mut [u8])> {
        let offset = self.used;
        self.reserve(size)?;
        self.used = offset + size;
        unsafe {
            let start = self.mem.as_ptr().add(offset);
            start.write_bytes(0, size);
            Ok((offset, std::slice::from_raw_parts_mut(start, size)))
        }
    }

    /// The appended content, starting at the current base address.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.mem.as_ptr(), self.used) }
    }

    /// Mutable view of the appended content.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.mem.as_ptr(), self.used) }
    }

    /// The current base address. Invalidated by any later call that can
    /// grow the buffer.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.mem.as_ptr()
    }

    /// Discards all appends. Capacity and backing storage are retained
    /// and recycled by future appends.
    pub fn clear(&mut self) {
        self.used = 0;
    }

    /// Shortens the appended content to `new_len` bytes. Does nothing
    /// when `new_len` is not below the current length.
    pub fn truncate(&mut self, new_len: usize) {
        if new_len < self.used {
            self.used = new_len;
        }
    }

    /// Discards the last `n` appended bytes.
    ///
    /// Precondition (debug-checked): `n <= len()`. A release build clamps
    /// instead of wrapping, leaving the builder empty.
    pub fn discard_last(&mut self, n: usize) {
        debug_assert!(
            n <= self.used,
            "discard count {n} exceeds {} used bytes",
            self.used
        );
        self.used = self.used.saturating_sub(n);
    }

    /// Relinquishes ownership of the backing storage without releasing
    /// it, returning `(base, used, capacity)`.
    ///
    /// The caller becomes responsible for releasing the region through
    /// the same provider, with `capacity` as the allocated size.
    pub fn into_raw_parts(self) -> (NonNull<u8>, usize, usize) {
        let mut this = std::mem::ManuallyDrop::new(self);
        let parts = (this.mem, this.used, this.capacity);
        unsafe {
            std::ptr::drop_in_place(&mut this.provider);
            std::ptr::drop_in_place(&mut this.sink);
        }
        parts
    }

    /// Guarantees `len() + additional <= capacity()` on return, growing
    /// if necessary. No state changes on failure.
    fn reserve(&mut self, additional: usize) -> Result<()> {
        let Some(required) = self.used.checked_add(additional) else {
            self.sink.report(Fault::CapacityOverflow, additional);
            return Err(Error::capacity_overflow(
                "append size exceeds the addressable range",
            ));
        };
        if required <= self.capacity {
            return Ok(());
        }
        self.grow(required)
    }

    /// Grows to `max(capacity * 2, required)` with a single reallocation
    /// attempt.
    #[cold]
    fn grow(&mut self, required: usize) -> Result<()> {
        let new_capacity = std::cmp::max(self.capacity.saturating_mul(2), required);
        match unsafe {
            self.provider
                .reallocate(self.mem, self.capacity, new_capacity)
        } {
            Some(mem) => {
                self.mem = mem;
                self.capacity = new_capacity;
                Ok(())
            }
            None => {
                self.sink.report(Fault::AllocationFailure, new_capacity);
                Err(Error::allocation_failure(new_capacity))
            }
        }
    }

    pub(crate) fn report(&self, fault: Fault, requested: usize) {
        self.sink.report(fault, requested);
    }
}

impl<P: AllocationProvider> Drop for ByteBuilder<P> {
    fn drop(&mut self) {
        unsafe { self.provider.release(self.mem, self.capacity) };
    }
}

// SAFETY: the builder exclusively owns the region behind `mem`; moving the
// builder to another thread moves that exclusive ownership with it. The
// provider and sink travel along and carry their own Send bounds.
unsafe impl<P: AllocationProvider + Send> Send for ByteBuilder<P> {}

// SAFETY: shared references permit only reads of the initialized prefix;
// all mutation goes through `&mut self`.
unsafe impl<P: AllocationProvider + Sync> Sync for ByteBuilder<P> {}

impl<P: AllocationProvider> std::fmt::Debug for ByteBuilder<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteBuilder")
            .field("len", &self.used)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mortar_alloc::provider::FailingProvider;
    use mortar_alloc::sink::CountingSink;
    use mortar_common::error::ErrorKind;

    use super::*;

    #[test]
    fn test_append_is_contiguous() {
        let mut b = ByteBuilder::with_capacity(32).unwrap();
        assert_eq!(b.append(b"abc").unwrap(), 0);
        assert_eq!(b.append(b"defg").unwrap(), 3);
        assert_eq!(b.append(b"").unwrap(), 7);
        assert_eq!(b.append(b"h").unwrap(), 7);
        assert_eq!(b.as_slice(), b"abcdefgh");
    }

    #[test]
    fn test_growth_doubles_and_preserves_content() {
        // 5 + 10 > 8, so the capacity doubles to 16 and the new span
        // starts at offset 5.
        let mut b = ByteBuilder::with_capacity(8).unwrap();
        assert_eq!(b.append(b"hello").unwrap(), 0);
        let (offset, span) = b.append_zeroed(10).unwrap();
        assert_eq!(offset, 5);
        assert_eq!(span.len(), 10);
        assert!(span.iter().all(|&x| x == 0));
        assert_eq!(b.capacity(), 16);
        assert_eq!(&b.as_slice()[..5], b"hello");
    }

    #[test]
    fn test_growth_covers_oversized_request() {
        let mut b = ByteBuilder::with_capacity(4).unwrap();
        b.append(b"xy").unwrap();
        let (offset, _) = b.append_zeroed(100).unwrap();
        assert_eq!(offset, 2);
        assert!(b.capacity() >= 102);
        assert_eq!(&b.as_slice()[..2], b"xy");
    }

    #[test]
    fn test_overflow_rejected_before_mutation() {
        let mut b = ByteBuilder::with_capacity(8).unwrap();
        b.append(b"abcde").unwrap();
        let err = b.append_zeroed(usize::MAX).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CapacityOverflow { .. }));
        assert_eq!(b.len(), 5);
        assert_eq!(b.capacity(), 8);
        assert_eq!(b.as_slice(), b"abcde");
    }

    #[test]
    fn test_clear_reuses_storage() {
        let mut b = ByteBuilder::with_capacity(8).unwrap();
        b.append_zeroed(30).unwrap();
        let capacity = b.capacity();
        b.clear();
        assert!(b.is_empty());
        assert_eq!(b.append(&[7u8; 30]).unwrap(), 0);
        assert_eq!(b.capacity(), capacity);
    }

    #[test]
    fn test_truncate_and_discard_last() {
        let mut b = ByteBuilder::with_capacity(16).unwrap();
        b.append(b"0123456789").unwrap();
        b.truncate(12);
        assert_eq!(b.len(), 10);
        b.truncate(6);
        assert_eq!(b.as_slice(), b"012345");
        b.discard_last(2);
        assert_eq!(b.as_slice(), b"0123");
        b.discard_last(0);
        assert_eq!(b.as_slice(), b"0123");
    }

    #[test]
    fn test_allocation_failure_leaves_state_unchanged() {
        let sink = Arc::new(CountingSink::new());
        let mut b =
            ByteBuilder::with_provider_and_sink(8, FailingProvider::after(1), sink.clone())
                .unwrap();
        b.append(b"abcd").unwrap();
        let err = b.append(&[0u8; 32]).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::AllocationFailure { requested: 36 }
        ));
        assert_eq!(b.len(), 4);
        assert_eq!(b.capacity(), 8);
        assert_eq!(b.as_slice(), b"abcd");
        assert_eq!(sink.allocation_failures(), 1);
        assert_eq!(sink.capacity_overflows(), 0);
    }

    #[test]
    fn test_failed_setup_reports_to_sink() {
        let sink = Arc::new(CountingSink::new());
        let err = ByteBuilder::with_provider_and_sink(64, FailingProvider::after(0), sink.clone())
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::AllocationFailure { requested: 64 }
        ));
        assert_eq!(sink.allocation_failures(), 1);
    }

    #[test]
    fn test_into_raw_parts_transfers_ownership() {
        let b = ByteBuilder::with_capacity(16).unwrap();
        let provider = HeapProvider;
        let (mem, used, capacity) = b.into_raw_parts();
        assert_eq!(used, 0);
        assert_eq!(capacity, 16);
        unsafe { provider.release(mem, capacity) };
    }

    #[test]
    fn test_offsets_survive_many_growths() {
        let mut b = ByteBuilder::with_capacity(1).unwrap();
        let mut offsets = Vec::new();
        for i in 0..64u8 {
            let chunk = [i; 7];
            offsets.push((b.append(&chunk).unwrap(), chunk));
        }
        let content = b.as_slice();
        for (offset, chunk) in offsets {
            assert_eq!(&content[offset..offset + 7], &chunk);
        }
    }
}
