//! Transfer Error Types
//!
//! Closed set of failure kinds a batch can end in. The transport switches on
//! [`TransferError::kind`] (or `code()` / `http_status()`), never on message
//! text.

use std::fmt;

use thiserror::Error;

use crate::money::{Amount, MoneyError};
use crate::storage::StorageError;

/// Why a caller-supplied context stopped the call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => f.write_str("cancelled by caller"),
            CancelReason::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// Coarse error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Detected before any transactional scope opens
    Validation,
    /// Insufficient funds; a normal outcome, not a fault
    BusinessRule,
    NotFound,
    /// Infrastructure failure; always rolled back
    Storage,
    Cancelled,
}

#[derive(Error, Debug)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("invalid amount format: {0}")]
    InvalidAmountFormat(String),

    #[error("amount must contain at most {max} decimals after period, got {provided}")]
    PrecisionExceeded { provided: usize, max: usize },

    #[error("provided currency is not valid: {0}")]
    InvalidCurrency(String),

    #[error("transfer #{index} amount must be greater than zero")]
    InvalidAmount { index: usize },

    #[error("transfer batch is empty")]
    EmptyBatch,

    #[error("invalid party: {0}")]
    InvalidParty(String),

    #[error("batch total overflows")]
    AmountOverflow,

    // === Business Errors ===
    #[error("not enough funds: balance {balance}, requested {requested}")]
    NotEnoughFunds { balance: Amount, requested: Amount },

    #[error("account not found: {iban}")]
    AccountNotFound { iban: String },

    // === System Errors ===
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{cause}; rollback failed: {rollback}")]
    RollbackFailed {
        cause: Box<TransferError>,
        rollback: StorageError,
    },

    #[error("transfer aborted: {0}")]
    Cancelled(CancelReason),
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::InvalidAmountFormat(_)
            | TransferError::PrecisionExceeded { .. }
            | TransferError::InvalidCurrency(_)
            | TransferError::InvalidAmount { .. }
            | TransferError::EmptyBatch
            | TransferError::InvalidParty(_)
            | TransferError::AmountOverflow => ErrorKind::Validation,
            TransferError::NotEnoughFunds { .. } => ErrorKind::BusinessRule,
            TransferError::AccountNotFound { .. } => ErrorKind::NotFound,
            TransferError::Storage(_) | TransferError::RollbackFailed { .. } => ErrorKind::Storage,
            TransferError::Cancelled(_) => ErrorKind::Cancelled,
        }
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidAmountFormat(_) => "INVALID_AMOUNT_FORMAT",
            TransferError::PrecisionExceeded { .. } => "PRECISION_EXCEEDED",
            TransferError::InvalidCurrency(_) => "INVALID_CURRENCY",
            TransferError::InvalidAmount { .. } => "INVALID_AMOUNT",
            TransferError::EmptyBatch => "EMPTY_BATCH",
            TransferError::InvalidParty(_) => "INVALID_PARTY",
            TransferError::AmountOverflow => "AMOUNT_OVERFLOW",
            TransferError::NotEnoughFunds { .. } => "NOT_ENOUGH_FUNDS",
            TransferError::AccountNotFound { .. } => "ACCOUNT_NOT_FOUND",
            TransferError::Storage(e) if e.is_retryable() => "CONFLICT",
            TransferError::Storage(_) => "STORAGE_ERROR",
            TransferError::RollbackFailed { .. } => "STORAGE_ERROR",
            TransferError::Cancelled(CancelReason::Cancelled) => "CANCELLED",
            TransferError::Cancelled(CancelReason::DeadlineExceeded) => "DEADLINE_EXCEEDED",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::BusinessRule | ErrorKind::NotFound => 422,
            ErrorKind::Storage if self.is_retryable() => 409,
            ErrorKind::Storage => 500,
            ErrorKind::Cancelled => 504,
        }
    }

    /// Whether the caller may re-run the whole batch from scratch
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransferError::Storage(e) if e.is_retryable())
    }

    /// Message safe to show an external caller
    ///
    /// Infrastructure failures are reduced to a generic text; the detail
    /// belongs in the logs only.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Storage if self.is_retryable() => {
                "concurrent update, retry the whole batch".to_string()
            }
            ErrorKind::Storage => "internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<MoneyError> for TransferError {
    fn from(e: MoneyError) -> Self {
        match e {
            MoneyError::PrecisionExceeded { provided, max } => {
                TransferError::PrecisionExceeded { provided, max }
            }
            MoneyError::InvalidFormat(msg) => TransferError::InvalidAmountFormat(msg),
            MoneyError::Overflow => TransferError::InvalidAmountFormat(e.to_string()),
        }
    }
}
