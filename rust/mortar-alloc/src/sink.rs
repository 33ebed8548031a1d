//! The diagnostic sink: an injectable hook invoked whenever a builder
//! operation fails.
//!
//! Sinks exist for observability only. The authoritative failure signal is
//! the `Result` returned by the operation; a sink must never be used to
//! drive control flow.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Classifies a reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The allocation provider returned "no memory".
    AllocationFailure,
    /// A size computation left the addressable range.
    CapacityOverflow,
}

/// Receiver of failure reports.
///
/// `report` is invoked exactly once per failed operation, immediately
/// before the error is returned, with the offending request size.
pub trait DiagnosticSink {
    fn report(&self, fault: Fault, requested: usize);
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for Arc<S> {
    fn report(&self, fault: Fault, requested: usize) {
        (**self).report(fault, requested)
    }
}

/// The default sink: one `log::error!` line per fault.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, fault: Fault, requested: usize) {
        match fault {
            Fault::AllocationFailure => {
                log::error!("allocation provider returned no memory ({requested} bytes requested)")
            }
            Fault::CapacityOverflow => {
                log::error!("size computation exceeds the addressable range (requested {requested})")
            }
        }
    }
}

/// A sink that discards all reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn report(&self, _fault: Fault, _requested: usize) {}
}

/// A sink that counts reports per fault kind. Share it with a builder via
/// `Arc` to observe the counts afterwards.
#[derive(Debug, Default)]
pub struct CountingSink {
    allocation_failures: AtomicUsize,
    capacity_overflows: AtomicUsize,
}

impl CountingSink {
    pub fn new() -> CountingSink {
        CountingSink::default()
    }

    pub fn allocation_failures(&self) -> usize {
        self.allocation_failures.load(Ordering::Relaxed)
    }

    pub fn capacity_overflows(&self) -> usize {
        self.capacity_overflows.load(Ordering::Relaxed)
    }
}

impl DiagnosticSink for CountingSink {
    fn report(&self, fault: Fault, _requested: usize) {
        let counter = match fault {
            Fault::AllocationFailure => &self.allocation_failures,
            Fault::CapacityOverflow => &self.capacity_overflows,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
