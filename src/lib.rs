//! Bulk Transfer - atomic batch credit transfers over a ledger
//!
//! A batch of outgoing transfers is checked against the originating
//! account's balance and then either applied completely (balance debited,
//! one ledger entry per transfer) or not at all.
//!
//! # Modules
//!
//! - [`money`] - Exact amount codec (decimal string <-> cents)
//! - [`transfer`] - Batch types, validation, coordinator, error taxonomy
//! - [`storage`] - Transactional ledger port plus PostgreSQL and in-memory adapters
//! - [`gateway`] - HTTP transport (`POST /v1/transfers`)
//! - [`db`] - PostgreSQL pool bootstrap
//! - [`config`] - YAML + environment configuration
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod money;
pub mod storage;
pub mod transfer;

// Convenient re-exports at crate root
pub use money::{Amount, MoneyError, format_amount, parse_amount};
pub use storage::{LedgerStore, LedgerTx, MemoryLedgerStore, PgLedgerStore, StorageError};
pub use transfer::{
    BatchReceipt, BatchState, Currency, Party, Transfer, TransferBatchRequest, TransferContext,
    TransferCoordinator, TransferError, TransferProcessor,
};
