//! Batch State Definitions
//!
//! Every coordinator call starts in `Opened` (or is `Rejected` before a scope
//! exists) and ends in exactly one terminal state.
//!
//! ```text
//!            ┌──────────────▶ COMMITTED
//!            ├──────────────▶ ABORTED_INSUFFICIENT_FUNDS
//! OPENED ────┼──────────────▶ ABORTED_NOT_FOUND
//!            ├──────────────▶ ABORTED_STORAGE_ERROR
//!            └──────────────▶ ABORTED_CANCELLED
//!
//! REJECTED   (validation failed, no scope opened)
//! ```

use std::fmt;

use super::error::{ErrorKind, TransferError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchState {
    /// Transactional scope is open
    Opened,

    /// Terminal: balance debited and all entries appended
    Committed,

    /// Terminal: balance below batch total, nothing written
    AbortedInsufficientFunds,

    /// Terminal: originating IBAN did not resolve
    AbortedNotFound,

    /// Terminal: storage failed, scope rolled back
    AbortedStorageError,

    /// Terminal: caller cancelled or deadline passed, scope rolled back
    AbortedCancelled,

    /// Terminal: validation failed before any scope was opened
    Rejected,
}

impl BatchState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BatchState::Opened)
    }

    /// Whether the batch left any trace in storage
    #[inline]
    pub fn is_committed(&self) -> bool {
        matches!(self, BatchState::Committed)
    }

    /// Terminal state for a finished call
    pub fn from_outcome<T>(outcome: &Result<T, TransferError>) -> Self {
        match outcome {
            Ok(_) => BatchState::Committed,
            Err(e) => match e.kind() {
                ErrorKind::Validation => BatchState::Rejected,
                ErrorKind::BusinessRule => BatchState::AbortedInsufficientFunds,
                ErrorKind::NotFound => BatchState::AbortedNotFound,
                ErrorKind::Storage => BatchState::AbortedStorageError,
                ErrorKind::Cancelled => BatchState::AbortedCancelled,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchState::Opened => "OPENED",
            BatchState::Committed => "COMMITTED",
            BatchState::AbortedInsufficientFunds => "ABORTED_INSUFFICIENT_FUNDS",
            BatchState::AbortedNotFound => "ABORTED_NOT_FOUND",
            BatchState::AbortedStorageError => "ABORTED_STORAGE_ERROR",
            BatchState::AbortedCancelled => "ABORTED_CANCELLED",
            BatchState::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
