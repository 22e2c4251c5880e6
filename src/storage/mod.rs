//! Ledger Storage Port
//!
//! The transactional persistence capability the transfer coordinator depends
//! on. The coordinator only ever sees these traits; concrete engines live in
//! the adapter submodules.
//!
//! # Adapters
//!
//! - [`postgres::PgLedgerStore`] - PostgreSQL via sqlx, row lock on the account
//! - [`memory::MemoryLedgerStore`] - in-process store, one writer at a time
//!
//! # Transactional Scope
//!
//! A scope is a `Box<dyn LedgerTx>` obtained from [`LedgerStore::begin`].
//! Writes made through it are invisible to other readers until
//! [`LedgerTx::commit`]. Dropping a scope without committing rolls it back,
//! so early returns, `?` and cancelled futures never leave half-applied state.
//! [`with_transaction`] wraps the commit-or-rollback decision around a body.

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod schema;

pub use error::StorageError;
pub use memory::MemoryLedgerStore;
pub use models::{Account, AccountId, LedgerEntry, NewAccount, NewLedgerEntry};
pub use postgres::PgLedgerStore;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::money::Amount;
use crate::transfer::context::TransferContext;
use crate::transfer::error::TransferError;

/// Storage capability consumed by the coordinator
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Adapter name for logging
    fn name(&self) -> &'static str;

    /// Open a transactional scope
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StorageError>;

    /// Create an account outside of any batch (fails on duplicate IBAN)
    async fn create_account(&self, account: NewAccount) -> Result<AccountId, StorageError>;

    /// Committed state of an account
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, StorageError>;

    /// Committed ledger entries of an account, in insertion order
    async fn list_ledger_entries(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<LedgerEntry>, StorageError>;
}

/// Transaction-scoped handle
///
/// Dropping the handle without calling [`commit`](LedgerTx::commit) MUST
/// discard every write made through it.
#[async_trait]
pub trait LedgerTx: Send {
    /// Read the account and hold it against concurrent writers until the
    /// scope ends
    async fn find_account_by_iban(&mut self, iban: &str) -> Result<Option<Account>, StorageError>;

    async fn update_account_balance(
        &mut self,
        id: AccountId,
        balance: Amount,
    ) -> Result<(), StorageError>;

    /// Append all entries as one batch write
    async fn append_ledger_entries(&mut self, entries: &[NewLedgerEntry])
    -> Result<(), StorageError>;

    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}

/// Work executed inside one transactional scope
#[async_trait]
pub trait TransactionBody: Send {
    type Output: Send;

    async fn run(self, tx: &mut dyn LedgerTx) -> Result<Self::Output, TransferError>;
}

/// Run `body` inside a fresh scope of `store`
///
/// Commits iff the body succeeds. Otherwise the scope is rolled back and the
/// body's error is returned unchanged; a failing rollback is reported as
/// [`TransferError::RollbackFailed`] carrying the original cause.
///
/// `ctx` may interrupt opening the scope and running the body, which then
/// rolls back with [`TransferError::Cancelled`]. Once the body has succeeded
/// the commit runs to completion and its result is the outcome.
pub async fn with_transaction<B>(
    store: &dyn LedgerStore,
    ctx: &TransferContext,
    body: B,
) -> Result<B::Output, TransferError>
where
    B: TransactionBody,
{
    let mut tx = tokio::select! {
        biased;
        reason = ctx.done() => return Err(TransferError::Cancelled(reason)),
        tx = store.begin() => tx?,
    };
    debug!(store = store.name(), "transaction opened");

    let outcome = tokio::select! {
        biased;
        reason = ctx.done() => Err(TransferError::Cancelled(reason)),
        result = body.run(tx.as_mut()) => result,
    };

    match outcome {
        Ok(output) => {
            tx.commit().await?;
            debug!(store = store.name(), "transaction committed");
            Ok(output)
        }
        Err(cause) => match tx.rollback().await {
            Ok(()) => {
                debug!(store = store.name(), error = %cause, "transaction rolled back");
                Err(cause)
            }
            Err(rollback) => {
                error!(store = store.name(), error = %cause, rollback_error = %rollback, "rollback failed");
                Err(TransferError::RollbackFailed {
                    cause: Box::new(cause),
                    rollback,
                })
            }
        },
    }
}
