//! # Mortar: composable memory-growth primitives
//!
//! Mortar replaces ad-hoc "grow a buffer as you append" code with a small
//! family of layered, single-threaded building blocks:
//!
//! * [`ByteBuilder`] - a growable raw-byte region with a used/capacity
//!   cursor pair and amortized-doubling growth.
//! * [`FixedSizeBuilder`] - element counts and offsets at a fixed stride.
//! * [`VarSizeBuilder`] - every append rounded up to an alignment
//!   boundary.
//! * [`StackAllocator`] - LIFO allocate/release with the history encoded
//!   in the buffer itself.
//!
//! The contract shared by the whole family: *offsets* are stable across
//! growth and may be held indefinitely, while *addresses* (slices) are
//! borrows that end at the next mutating call. Backing storage comes from
//! an injectable [`AllocationProvider`]; failures are observable through
//! an injectable [`DiagnosticSink`], with the returned [`Result`] as the
//! authoritative signal.
//!
//! This crate is a facade re-exporting the member crates:
//!
//! * [`common`] - shared error and result types
//! * [`alloc`] - allocation providers and diagnostic sinks
//! * [`builders`] - the builder/allocator family

pub use mortar_alloc as alloc;
pub use mortar_builders as builders;
pub use mortar_common as common;

pub use mortar_alloc::provider::{AllocationProvider, HeapProvider};
pub use mortar_alloc::sink::{DiagnosticSink, Fault, LogSink, NullSink};
pub use mortar_builders::align::MAX_ALIGN;
pub use mortar_builders::{ByteBuilder, FixedSizeBuilder, StackAllocator, VarSizeBuilder};
pub use mortar_common::Result;
pub use mortar_common::error::{Error, ErrorKind};
