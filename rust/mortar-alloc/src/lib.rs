//! Pluggable allocation providers and diagnostic sinks for the mortar
//! builders.
//!
//! Every builder acquires its backing storage through an
//! [`AllocationProvider`](provider::AllocationProvider) and reports its
//! failures through a [`DiagnosticSink`](sink::DiagnosticSink). Both are
//! injected at construction time, never read from global configuration, so
//! instances remain independently testable and thread-isolated.

pub mod provider;
pub mod sink;

pub use provider::{AllocationProvider, FailingProvider, HeapProvider};
pub use sink::{CountingSink, DiagnosticSink, Fault, LogSink, NullSink};
