//! Growable builders and a LIFO stack allocator, layered leaf-first:
//!
//! 1. [`ByteBuilder`] - a growable raw-byte region with a used/capacity
//!    cursor pair; the sole owner of the growth logic.
//! 2. [`FixedSizeBuilder`] - counts and offsets in fixed-stride elements,
//!    delegating byte arithmetic to an owned `ByteBuilder`.
//! 3. [`VarSizeBuilder`] - rounds every append up to an alignment
//!    boundary before delegating.
//! 4. [`StackAllocator`] - LIFO allocate/release on top of a
//!    `VarSizeBuilder`, with the release history embedded in the buffer
//!    itself.
//!
//! Throughout the crate, *offsets* are relocation-stable and may be held
//! across calls, while *addresses* are only ever exposed as borrows tied
//! to the current call: any call that can grow the buffer requires `&mut
//! self` and therefore forces re-acquisition of prior views.
//!
//! All types are single-threaded per instance. Independent instances may
//! live on different threads whenever the allocation provider allows it.

pub mod align;
pub mod byte_builder;
pub mod fixed_builder;
pub mod stack_allocator;
pub mod var_builder;

pub use byte_builder::ByteBuilder;
pub use fixed_builder::FixedSizeBuilder;
pub use stack_allocator::StackAllocator;
pub use var_builder::VarSizeBuilder;
