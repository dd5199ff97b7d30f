//! Store error types.

use derive_more::{Display, Error};
use tracing::{instrument, warn};

/// Classification of store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum StoreErrorKind {
    /// Network or permission failure. Transient; the caller decides whether
    /// to retry.
    #[display("unavailable")]
    Unavailable,
    /// A transaction kept losing to concurrent writers.
    #[display("contention")]
    Contention,
    /// A malformed path.
    #[display("invalid path")]
    InvalidPath,
}

/// Store error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Store error ({}): {} at {}:{}", kind, message, file, line)]
pub struct StoreError {
    /// Failure class.
    pub kind: StoreErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl StoreError {
    /// Creates a new store error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        let message = message.into();
        warn!(%kind, error_message = %message, "Store error created");
        Self {
            kind,
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Shorthand for [`StoreErrorKind::Unavailable`].
    #[track_caller]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Unavailable, message)
    }

    /// True for failures the caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            StoreErrorKind::Unavailable | StoreErrorKind::Contention
        )
    }
}
