//! A builder whose counts and offsets are expressed in fixed-stride
//! elements rather than bytes.

use mortar_alloc::provider::{AllocationProvider, HeapProvider};
use mortar_alloc::sink::{DiagnosticSink, Fault, LogSink};
use mortar_common::Result;
use mortar_common::error::Error;

use crate::byte_builder::ByteBuilder;

/// A growable buffer of fixed-size elements.
///
/// The element stride is fixed at construction; every count or offset in
/// the public surface is denominated in elements, with the byte
/// arithmetic (including its overflow checks) kept internal. The
/// underlying byte capacity is always an exact multiple of the stride,
/// and every reported offset is an exact element index.
///
/// The typed accessors ([`append_typed`](Self::append_typed),
/// [`typed_data`](Self::typed_data)) are convenience views for the common
/// case where the stride is `size_of::<T>()` of a single plain-data type.
pub struct FixedSizeBuilder<P: AllocationProvider = HeapProvider> {
    inner: ByteBuilder<P>,
    element_size: usize,
}

impl FixedSizeBuilder {
    /// Creates a builder for `capacity` elements of `element_size` bytes
    /// each, backed by the standard heap.
    ///
    /// Preconditions (debug-checked): `element_size > 0`, `capacity > 0`.
    pub fn new(element_size: usize, capacity: usize) -> Result<FixedSizeBuilder> {
        Self::with_provider(element_size, capacity, HeapProvider)
    }
}

impl<P: AllocationProvider> FixedSizeBuilder<P> {
    /// Creates a builder backed by the given provider.
    pub fn with_provider(
        element_size: usize,
        capacity: usize,
        provider: P,
    ) -> Result<FixedSizeBuilder<P>> {
        Self::with_provider_and_sink(element_size, capacity, provider, LogSink)
    }

    /// Creates a builder backed by the given provider, reporting faults
    /// to the given sink.
    pub fn with_provider_and_sink(
        element_size: usize,
        capacity: usize,
        provider: P,
        sink: impl DiagnosticSink + Send + Sync + 'static,
    ) -> Result<FixedSizeBuilder<P>> {
        debug_assert!(element_size > 0, "element size must be positive");
        debug_assert!(capacity > 0, "element capacity must be positive");
        let Some(capacity_bytes) = element_size.checked_mul(capacity) else {
            sink.report(Fault::CapacityOverflow, capacity);
            return Err(Error::capacity_overflow(
                "element capacity in bytes exceeds the addressable range",
            ));
        };
        Ok(FixedSizeBuilder {
            inner: ByteBuilder::with_provider_and_sink(capacity_bytes, provider, sink)?,
            element_size,
        })
    }

    /// The element stride in bytes.
    #[inline]
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Number of elements appended so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len() / self.element_size
    }

    /// Returns `true` if nothing has been appended.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Number of elements the builder can hold before the next growth.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.capacity() / self.element_size
    }

    /// Appends the elements contained in `bytes` and returns the element
    /// offset the run starts at.
    ///
    /// Precondition (debug-checked): `bytes.len()` is a multiple of the
    /// stride.
    pub fn append(&mut self, bytes: &[u8]) -> Result<usize> {
        debug_assert!(
            bytes.len().is_multiple_of(self.element_size),
            "byte length {} is not a multiple of the {} byte stride",
            bytes.len(),
            self.element_size
        );
        let offset = self.inner.append(bytes)?;
        Ok(offset / self.element_size)
    }

    /// Sets aside `count` zero-filled elements and returns the element
    /// offset of the fresh run together with a mutable byte view of it.
    pub fn append_zeroed(&mut self, count: usize) -> Result<(usize, &mut [u8])> {
        let size = self.byte_count(count)?;
        let (offset, span) = self.inner.append_zeroed(size)?;
        Ok((offset / self.element_size, span))
    }

    /// Appends a slice of plain-data values whose size matches the
    /// stride, returning the element offset of the run.
    ///
    /// Precondition (debug-checked): `size_of::<T>()` equals the stride.
    pub fn append_typed<T>(&mut self, values: &[T]) -> Result<usize>
    where
        T: bytemuck::NoUninit,
    {
        debug_assert_eq!(
            std::mem::size_of::<T>(),
            self.element_size,
            "value size does not match the element stride"
        );
        self.append(bytemuck::cast_slice(values))
    }

    /// The appended content viewed as a slice of `T`.
    #[inline]
    pub fn typed_data<T>(&self) -> &[T]
    where
        T: bytemuck::AnyBitPattern,
    {
        bytemuck::cast_slice(self.inner.as_slice())
    }

    /// The appended content viewed as a mutable slice of `T`.
    #[inline]
    pub fn typed_data_mut<T>(&mut self) -> &mut [T]
    where
        T: bytemuck::AnyBitPattern + bytemuck::NoUninit,
    {
        bytemuck::cast_slice_mut(self.inner.as_mut_slice())
    }

    /// The appended content as raw bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        self.inner.as_slice()
    }

    /// Mutable view of the appended content as raw bytes.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.inner.as_mut_slice()
    }

    /// Discards all appends, retaining capacity.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Discards the last `count` appended elements.
    ///
    /// Precondition (debug-checked): `count <= len()`. A release build
    /// clamps instead of wrapping, leaving the builder empty.
    pub fn discard_last(&mut self, count: usize) {
        debug_assert!(
            count <= self.len(),
            "discard count {count} exceeds {} appended elements",
            self.len()
        );
        self.inner
            .discard_last(count.saturating_mul(self.element_size));
    }

    /// Converts an element count to bytes, rejecting unrepresentable
    /// requests before delegating.
    fn byte_count(&self, count: usize) -> Result<usize> {
        count.checked_mul(self.element_size).ok_or_else(|| {
            self.inner.report(Fault::CapacityOverflow, count);
            Error::capacity_overflow("element count in bytes exceeds the addressable range")
        })
    }
}

impl<P: AllocationProvider> std::fmt::Debug for FixedSizeBuilder<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedSizeBuilder")
            .field("element_size", &self.element_size)
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use mortar_common::error::ErrorKind;

    use super::*;

    #[test]
    fn test_growth_in_element_units() {
        // element_size 4 with capacity 2 gives 8 bytes; appending 3
        // elements needs 12, so the byte capacity doubles to 16.
        let mut b = FixedSizeBuilder::new(4, 2).unwrap();
        let (offset, span) = b.append_zeroed(3).unwrap();
        assert_eq!(offset, 0);
        assert_eq!(span.len(), 12);
        assert_eq!(b.capacity(), 4);
        assert_eq!(b.len(), 3);
    }

    #[test]
    fn test_append_returns_element_offsets() {
        let mut b = FixedSizeBuilder::new(2, 4).unwrap();
        assert_eq!(b.append(&[1, 2, 3, 4]).unwrap(), 0);
        assert_eq!(b.append(&[5, 6]).unwrap(), 2);
        assert_eq!(b.len(), 3);
        assert_eq!(b.as_slice(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_typed_round_trip() {
        let mut b = FixedSizeBuilder::new(std::mem::size_of::<u32>(), 2).unwrap();
        assert_eq!(b.append_typed::<u32>(&[10, 20, 30]).unwrap(), 0);
        assert_eq!(b.append_typed::<u32>(&[40]).unwrap(), 3);
        assert_eq!(b.typed_data::<u32>(), &[10, 20, 30, 40]);

        b.typed_data_mut::<u32>()[1] = 99;
        assert_eq!(b.typed_data::<u32>(), &[10, 99, 30, 40]);
    }

    #[test]
    fn test_setup_capacity_overflow() {
        let err = FixedSizeBuilder::new(8, usize::MAX / 4).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CapacityOverflow { .. }));
    }

    #[test]
    fn test_append_count_overflow_checked_before_delegating() {
        let mut b = FixedSizeBuilder::new(8, 4).unwrap();
        b.append_typed::<u64>(&[1]).unwrap();
        let err = b.append_zeroed(usize::MAX / 4).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CapacityOverflow { .. }));
        assert_eq!(b.len(), 1);
        assert_eq!(b.capacity(), 4);
    }

    #[test]
    fn test_discard_last_and_clear() {
        let mut b = FixedSizeBuilder::new(4, 4).unwrap();
        b.append_typed::<u32>(&[1, 2, 3]).unwrap();
        b.discard_last(2);
        assert_eq!(b.typed_data::<u32>(), &[1]);
        let capacity = b.capacity();
        b.clear();
        assert!(b.is_empty());
        assert_eq!(b.capacity(), capacity);
        assert_eq!(b.append_typed::<u32>(&[7]).unwrap(), 0);
    }
}
