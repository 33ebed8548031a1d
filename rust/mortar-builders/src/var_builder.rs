//! A byte builder that rounds every append up to an alignment boundary.

use mortar_alloc::provider::{AllocationProvider, HeapProvider};
use mortar_alloc::sink::{DiagnosticSink, Fault, LogSink};
use mortar_common::Result;
use mortar_common::error::Error;

use crate::align::{MAX_ALIGN, checked_align_up};
use crate::byte_builder::ByteBuilder;

/// A growable byte buffer whose used length and capacity stay multiples
/// of an alignment boundary.
///
/// Every requested size is rounded up to the boundary before delegating,
/// so each returned offset is suitably aligned for any payload whose
/// alignment requirement does not exceed the boundary. The default
/// boundary, [`MAX_ALIGN`], satisfies every fundamental scalar and
/// pointer type of the target.
///
/// Consecutive appends of sizes that are not boundary multiples leave
/// padding between logical elements; this builder trades byte-level
/// density for alignment and is not meant for dense byte-string packing.
pub struct VarSizeBuilder<P: AllocationProvider = HeapProvider> {
    inner: ByteBuilder<P>,
    boundary: usize,
}

impl VarSizeBuilder {
    /// Creates a builder with the default [`MAX_ALIGN`] boundary, backed
    /// by the standard heap. The capacity is rounded up to the boundary.
    pub fn with_capacity(capacity: usize) -> Result<VarSizeBuilder> {
        Self::with_provider(capacity, MAX_ALIGN, HeapProvider)
    }

    /// Creates a builder with a caller-chosen boundary.
    ///
    /// Precondition (debug-checked): `boundary` is a nonzero power of
    /// two.
    pub fn with_boundary(capacity: usize, boundary: usize) -> Result<VarSizeBuilder> {
        Self::with_provider(capacity, boundary, HeapProvider)
    }
}

impl<P: AllocationProvider> VarSizeBuilder<P> {
    /// Creates a builder backed by the given provider.
    pub fn with_provider(
        capacity: usize,
        boundary: usize,
        provider: P,
    ) -> Result<VarSizeBuilder<P>> {
        Self::with_provider_and_sink(capacity, boundary, provider, LogSink)
    }

    /// Creates a builder backed by the given provider, reporting faults
    /// to the given sink.
    pub fn with_provider_and_sink(
        capacity: usize,
        boundary: usize,
        provider: P,
        sink: impl DiagnosticSink + Send + Sync + 'static,
    ) -> Result<VarSizeBuilder<P>> {
        debug_assert!(
            boundary != 0 && boundary.is_power_of_two(),
            "alignment boundary must be a nonzero power of two"
        );
        let Some(capacity) = checked_align_up(capacity, boundary) else {
            sink.report(Fault::CapacityOverflow, capacity);
            return Err(Error::capacity_overflow(
                "aligned capacity exceeds the addressable range",
            ));
        };
        Ok(VarSizeBuilder {
            inner: ByteBuilder::with_provider_and_sink(capacity, provider, sink)?,
            boundary,
        })
    }

    /// The alignment boundary every append is rounded up to.
    #[inline]
    pub fn boundary(&self) -> usize {
        self.boundary
    }

    /// Number of bytes appended so far, padding included. Always a
    /// multiple of the boundary.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if nothing has been appended.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Current byte capacity. Always a multiple of the boundary.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Appends `bytes` at the next boundary-aligned offset and returns
    /// that offset. The padding up to the next boundary is zero-filled.
    pub fn append(&mut self, bytes: &[u8]) -> Result<usize> {
        let padded = self.aligned_size(bytes.len())?;
        let (offset, span) = self.inner.append_zeroed(padded)?;
        span[..bytes.len()].copy_from_slice(bytes);
        Ok(offset)
    }

    /// Sets aside `size` zero-filled bytes at the next boundary-aligned
    /// offset, returning the offset and a mutable view of the requested
    /// span (padding excluded).
    pub fn append_zeroed(&mut self, size: usize) -> Result<(usize, &mut [u8])> {
        let padded = self.aligned_size(size)?;
        let (offset, span) = self.inner.append_zeroed(padded)?;
        Ok((offset, &mut span[..size]))
    }

    /// The appended content, padding included.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        self.inner.as_slice()
    }

    /// Mutable view of the appended content, padding included.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.inner.as_mut_slice()
    }

    /// Discards all appends, retaining capacity.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Rounds `size` up to the boundary, rejecting unrepresentable
    /// requests before any arithmetic that could wrap.
    pub(crate) fn aligned_size(&self, size: usize) -> Result<usize> {
        checked_align_up(size, self.boundary).ok_or_else(|| {
            self.inner.report(Fault::CapacityOverflow, size);
            Error::capacity_overflow("aligned size exceeds the addressable range")
        })
    }

    pub(crate) fn truncate(&mut self, new_len: usize) {
        self.inner.truncate(new_len);
    }

    pub(crate) fn report(&self, fault: Fault, requested: usize) {
        self.inner.report(fault, requested);
    }
}

impl<P: AllocationProvider> std::fmt::Debug for VarSizeBuilder<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VarSizeBuilder")
            .field("boundary", &self.boundary)
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}
