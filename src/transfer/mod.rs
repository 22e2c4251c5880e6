//! Bulk Credit Transfers
//!
//! Debits one originating account by the total of a batch and records one
//! ledger entry per transfer, all inside a single transactional scope.
//!
//! # Flow
//!
//! ```text
//! TransferBatchRequest ──▶ validate_request ──▶ with_transaction(DebitBatch)
//!                                │                      │
//!                             REJECTED        COMMITTED / ABORTED_*
//! ```
//!
//! # Invariants
//!
//! 1. **All or nothing**: balance update and entry appends commit together
//! 2. **No overdraft**: a batch whose total exceeds the balance writes nothing
//! 3. **Order preserved**: entries follow the input order of the transfers
//! 4. **Cancellation is a rollback**: a fired [`TransferContext`] drops the
//!    open scope

pub mod context;
pub mod coordinator;
pub mod error;
pub mod state;
pub mod types;
pub mod validation;

#[cfg(test)]
mod integration_tests;

pub use context::{CancelHandle, TransferContext};
pub use coordinator::{TransferCoordinator, TransferProcessor};
pub use error::{CancelReason, ErrorKind, TransferError};
pub use state::BatchState;
pub use types::{BatchId, BatchReceipt, Currency, Party, Transfer, TransferBatchRequest};
pub use validation::{validate_currency, validate_request};
