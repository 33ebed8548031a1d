use thiserror::Error;

/// The error type returned by every fallible mortar operation.
///
/// The payload is boxed to keep the `Err` variant a single pointer wide:
/// builder operations sit on hot append paths and return `Result` values
/// by the thousands.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// The allocation provider reported "no memory" for a request of
    /// `requested` bytes.
    pub fn allocation_failure(requested: usize) -> Error {
        Error(ErrorKind::AllocationFailure { requested }.into())
    }

    /// A size, stride, or alignment computation left the representable
    /// range before any mutation took place.
    pub fn capacity_overflow(context: impl Into<String>) -> Error {
        Error(
            ErrorKind::CapacityOverflow {
                context: context.into(),
            }
            .into(),
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("allocation provider returned no memory for {requested} bytes")]
    AllocationFailure { requested: usize },

    #[error("size computation exceeds the addressable range: {context}")]
    CapacityOverflow { context: String },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}
