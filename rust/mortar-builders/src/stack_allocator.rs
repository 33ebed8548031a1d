//! A LIFO allocator whose release history is embedded in the buffer
//! itself.

use mortar_alloc::provider::{AllocationProvider, HeapProvider};
use mortar_alloc::sink::{DiagnosticSink, Fault, LogSink};
use mortar_common::Result;
use mortar_common::error::Error;

use crate::align::{MAX_ALIGN, align_up};
use crate::var_builder::VarSizeBuilder;

const WORD: usize = std::mem::size_of::<usize>();

/// A stack (LIFO) allocator built on a [`VarSizeBuilder`].
///
/// Each allocation reserves an aligned payload span followed by a
/// fixed-size header slot holding the cursor value that existed just
/// before the allocation. Releasing the most recent `n` allocations is
/// therefore a walk over those stored offsets: O(1) per popped frame,
/// with no bookkeeping outside the buffer. Offsets survive buffer
/// relocation; this is why the history stores offsets and never
/// addresses.
///
/// Only suffix (LIFO) release is possible. The allocator does not track
/// how many allocations are live, so a [`free`](Self::free) count larger
/// than the number of live allocations is a caller-contract violation:
/// a checked build aborts mid-walk, a release build walks garbage
/// offsets and leaves the content unusable (though never unsafe).
pub struct StackAllocator<P: AllocationProvider = HeapProvider> {
    inner: VarSizeBuilder<P>,
    header: usize,
}

impl StackAllocator {
    /// Creates an allocator with the default [`MAX_ALIGN`] boundary,
    /// backed by the standard heap.
    pub fn with_capacity(capacity: usize) -> Result<StackAllocator> {
        Self::with_provider(capacity, MAX_ALIGN, HeapProvider)
    }

    /// Creates an allocator with a caller-chosen boundary.
    ///
    /// Precondition (debug-checked): `boundary` is a nonzero power of
    /// two.
    pub fn with_boundary(capacity: usize, boundary: usize) -> Result<StackAllocator> {
        Self::with_provider(capacity, boundary, HeapProvider)
    }
}

impl<P: AllocationProvider> StackAllocator<P> {
    /// Creates an allocator backed by the given provider.
    pub fn with_provider(
        capacity: usize,
        boundary: usize,
        provider: P,
    ) -> Result<StackAllocator<P>> {
        Self::with_provider_and_sink(capacity, boundary, provider, LogSink)
    }

    /// Creates an allocator backed by the given provider, reporting
    /// faults to the given sink.
    pub fn with_provider_and_sink(
        capacity: usize,
        boundary: usize,
        provider: P,
        sink: impl DiagnosticSink + Send + Sync + 'static,
    ) -> Result<StackAllocator<P>> {
        let inner = VarSizeBuilder::with_provider_and_sink(capacity, boundary, provider, sink)?;
        let header = align_up(WORD, inner.boundary());
        Ok(StackAllocator { inner, header })
    }

    /// The alignment boundary of payload offsets.
    #[inline]
    pub fn boundary(&self) -> usize {
        self.inner.boundary()
    }

    /// Size in bytes of the per-allocation header slot.
    #[inline]
    pub fn header_size(&self) -> usize {
        self.header
    }

    /// The current cursor: total bytes consumed by live allocations,
    /// headers and padding included.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if no allocations are live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Current byte capacity of the backing buffer.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Allocates `n` bytes and returns the payload offset together with
    /// a zero-filled mutable view of the payload.
    ///
    /// The payload span is rounded up to the boundary and followed by
    /// the header slot; the whole frame is reserved in one underlying
    /// reservation, so a failure commits nothing. `n == 0` is valid and
    /// yields an empty view. The view ends with this borrow; re-derive
    /// it from the offset via [`as_mut_slice`](Self::as_mut_slice).
    pub fn alloc(&mut self, n: usize) -> Result<(usize, &mut [u8])> {
        let before = self.inner.len();
        let padded = self.inner.aligned_size(n)?;
        let Some(frame) = padded.checked_add(self.header) else {
            self.inner.report(Fault::CapacityOverflow, n);
            return Err(Error::capacity_overflow(
                "allocation frame exceeds the addressable range",
            ));
        };
        let (offset, span) = self.inner.append_zeroed(frame)?;
        span[padded..padded + WORD].copy_from_slice(&before.to_ne_bytes());
        Ok((offset, &mut span[..n]))
    }

    /// Releases the `count` most recently made allocations, in reverse
    /// allocation order.
    ///
    /// Walks backward through the in-band history: the header slot
    /// ending at the cursor holds the cursor value from just before the
    /// corresponding allocation. `free(0)` is a no-op.
    ///
    /// Precondition (debug-checked): `count` does not exceed the number
    /// of live allocations.
    pub fn free(&mut self, count: usize) {
        let mut cursor = self.inner.len();
        let content = self.inner.as_slice();
        for _ in 0..count {
            debug_assert!(
                cursor >= self.header,
                "free count exceeds the number of live allocations"
            );
            let slot = cursor - self.header;
            let mut word = [0u8; WORD];
            word.copy_from_slice(&content[slot..slot + WORD]);
            let previous = usize::from_ne_bytes(word);
            debug_assert!(
                previous < cursor && previous.is_multiple_of(self.boundary()),
                "stack history is corrupted at offset {slot}"
            );
            cursor = previous;
        }
        self.inner.truncate(cursor);
    }

    /// Releases every live allocation at once, retaining capacity.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// The buffer content up to the cursor: payloads, padding, and
    /// headers.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        self.inner.as_slice()
    }

    /// Mutable view of the buffer content up to the cursor. Live payload
    /// spans may be re-derived from their offsets.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.inner.as_mut_slice()
    }

    /// Re-fetches a view of a live payload from its stable offset.
    ///
    /// Preconditions (debug-checked): `offset` is boundary-aligned and
    /// `offset + len` does not pass the cursor. A release build falls
    /// back on the bounds check of the slice index.
    #[inline]
    pub fn payload(&self, offset: usize, len: usize) -> &[u8] {
        self.check_payload(offset, len);
        &self.inner.as_slice()[offset..offset + len]
    }

    /// Re-fetches a mutable view of a live payload from its stable
    /// offset. Same preconditions as [`payload`](Self::payload).
    #[inline]
    pub fn payload_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        self.check_payload(offset, len);
        &mut self.inner.as_mut_slice()[offset..offset + len]
    }

    fn check_payload(&self, offset: usize, len: usize) {
        debug_assert!(
            offset.is_multiple_of(self.boundary()),
            "payload offset {offset} is not a boundary multiple"
        );
        debug_assert!(
            offset.checked_add(len).is_some_and(|end| end <= self.len()),
            "payload span {offset}+{len} passes the cursor at {}",
            self.len()
        );
    }
}

impl<P: AllocationProvider> std::fmt::Debug for StackAllocator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackAllocator")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("boundary", &self.boundary())
            .field("header_size", &self.header)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use mortar_common::error::ErrorKind;

    use super::*;

    #[test]
    fn test_frame_layout() {
        // Boundary 8 gives an 8-byte header: alloc(10) reserves a
        // 16-byte payload plus the header (24 total), alloc(20) reserves
        // 24 + 8 = 32 more.
        let mut sa = StackAllocator::with_boundary(64, 8).unwrap();
        assert_eq!(sa.header_size(), 8);
        let (first, _) = sa.alloc(10).unwrap();
        assert_eq!(first, 0);
        assert_eq!(sa.len(), 24);
        let (second, _) = sa.alloc(20).unwrap();
        assert_eq!(second, 24);
        assert_eq!(sa.len(), 56);
    }

    #[test]
    fn test_free_restores_cursor_and_reuses_span() {
        let mut sa = StackAllocator::with_boundary(64, 8).unwrap();
        sa.alloc(10).unwrap();
        let after_first = sa.len();
        sa.alloc(20).unwrap();
        let capacity = sa.capacity();

        sa.free(1);
        assert_eq!(sa.len(), after_first);

        let (offset, _) = sa.alloc(5).unwrap();
        assert_eq!(offset, after_first);
        assert_eq!(sa.capacity(), capacity);
    }

    #[test]
    fn test_lifo_law() {
        let mut sa = StackAllocator::with_boundary(32, 16).unwrap();
        let start = sa.len();
        for _ in 0..5 {
            sa.alloc(13).unwrap();
        }
        sa.free(5);
        assert_eq!(sa.len(), start);
        assert!(sa.is_empty());
    }

    #[test]
    fn test_partial_free_keeps_earlier_content() {
        let mut sa = StackAllocator::with_boundary(32, 8).unwrap();
        let (first, span) = sa.alloc(4).unwrap();
        span.copy_from_slice(b"keep");
        let (second, span) = sa.alloc(4).unwrap();
        span.copy_from_slice(b"temp");
        sa.alloc(8).unwrap();

        sa.free(2);
        assert_eq!(&sa.as_slice()[first..first + 4], b"keep");
        assert!(sa.len() <= second);

        let (offset, span) = sa.alloc(4).unwrap();
        assert_eq!(offset, second);
        span.copy_from_slice(b"next");
        assert_eq!(&sa.as_slice()[first..first + 4], b"keep");
        assert_eq!(&sa.as_slice()[offset..offset + 4], b"next");
    }

    #[test]
    fn test_zero_size_alloc_and_free() {
        let mut sa = StackAllocator::with_boundary(32, 8).unwrap();
        let (offset, span) = sa.alloc(0).unwrap();
        assert_eq!(offset, 0);
        assert!(span.is_empty());
        // A zero-byte payload still carries its header.
        assert_eq!(sa.len(), sa.header_size());
        sa.free(1);
        assert!(sa.is_empty());
        sa.free(0);
        assert!(sa.is_empty());
    }

    #[test]
    fn test_alloc_offsets_respect_boundary() {
        for boundary in [1usize, 2, 4, 8, 16, 32] {
            let mut sa = StackAllocator::with_boundary(16, boundary).unwrap();
            for n in [0usize, 1, 5, 9, 31] {
                let (offset, _) = sa.alloc(n).unwrap();
                assert_eq!(offset % boundary, 0, "boundary {boundary} size {n}");
            }
        }
    }

    #[test]
    fn test_failed_alloc_commits_nothing() {
        let mut sa = StackAllocator::with_boundary(32, 8).unwrap();
        sa.alloc(8).unwrap();
        let len = sa.len();
        let err = sa.alloc(usize::MAX - 16).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CapacityOverflow { .. }));
        assert_eq!(sa.len(), len);
        sa.free(1);
        assert!(sa.is_empty());
    }

    #[test]
    fn test_growth_keeps_history_walkable() {
        let mut sa = StackAllocator::with_boundary(16, 8).unwrap();
        let mut cursors = vec![sa.len()];
        for i in 0..12 {
            sa.alloc(i * 3).unwrap();
            cursors.push(sa.len());
        }
        for expected in cursors.into_iter().rev().skip(1) {
            sa.free(1);
            assert_eq!(sa.len(), expected);
        }
    }

    #[test]
    fn test_payload_refetch_by_offset() {
        let mut sa = StackAllocator::with_boundary(16, 8).unwrap();
        let (first, span) = sa.alloc(4).unwrap();
        span.copy_from_slice(b"abcd");
        let (second, _) = sa.alloc(6).unwrap();

        sa.payload_mut(second, 6).copy_from_slice(b"qrstuv");
        // Force a relocation; offsets stay valid.
        sa.alloc(200).unwrap();
        assert_eq!(sa.payload(first, 4), b"abcd");
        assert_eq!(sa.payload(second, 6), b"qrstuv");

        sa.payload_mut(first, 4)[0] = b'z';
        assert_eq!(sa.payload(first, 4), b"zbcd");
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut sa = StackAllocator::with_boundary(64, 8).unwrap();
        sa.alloc(10).unwrap();
        sa.alloc(20).unwrap();
        let capacity = sa.capacity();
        sa.clear();
        assert!(sa.is_empty());
        assert_eq!(sa.capacity(), capacity);
        let (offset, _) = sa.alloc(4).unwrap();
        assert_eq!(offset, 0);
    }
}
