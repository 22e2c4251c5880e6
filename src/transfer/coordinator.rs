//! Transfer Coordinator
//!
//! Applies one batch of credit transfers atomically: the originating balance
//! is debited by the batch total and one ledger entry is appended per
//! transfer, or nothing changes at all.
//!
//! Each call runs inside exactly one transactional scope of the
//! [`LedgerStore`] and ends in exactly one terminal [`BatchState`]. There are
//! no retries here; a retryable conflict is surfaced to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, error, info, warn};

use super::context::TransferContext;
use super::error::{ErrorKind, TransferError};
use super::state::BatchState;
use super::types::{BatchId, BatchReceipt, Transfer, TransferBatchRequest};
use super::validation::validate_request;
use crate::storage::{
    AccountId, LedgerStore, LedgerTx, NewLedgerEntry, TransactionBody, with_transaction,
};

/// Entry point consumed by the transport layer
#[async_trait]
pub trait TransferProcessor: Send + Sync {
    async fn process_transfers(
        &self,
        ctx: &TransferContext,
        request: &TransferBatchRequest,
    ) -> Result<BatchReceipt, TransferError>;
}

/// Transfer Coordinator - one transactional scope per batch
pub struct TransferCoordinator {
    store: Arc<dyn LedgerStore>,
}

impl TransferCoordinator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Validate, then debit and record the whole batch or nothing
    ///
    /// If `ctx` fires before the batch body has finished, the scope rolls back
    /// and the call fails with [`TransferError::Cancelled`]. A commit that has
    /// started is never interrupted.
    pub async fn process_transfers(
        &self,
        ctx: &TransferContext,
        request: &TransferBatchRequest,
    ) -> Result<BatchReceipt, TransferError> {
        let batch_id = BatchId::new();
        let result = self.run_batch(batch_id, ctx, request).await;

        let state = BatchState::from_outcome(&result);
        match &result {
            Ok(receipt) => info!(
                batch_id = %batch_id,
                state = %state,
                account_id = %receipt.account_id,
                debited = %receipt.debited,
                new_balance = %receipt.new_balance,
                entries = receipt.entries,
                "Batch committed"
            ),
            Err(e) => match e.kind() {
                ErrorKind::Storage => error!(
                    batch_id = %batch_id,
                    state = %state,
                    code = e.code(),
                    error = %e,
                    "Batch aborted"
                ),
                _ => warn!(
                    batch_id = %batch_id,
                    state = %state,
                    code = e.code(),
                    error = %e,
                    "Batch aborted"
                ),
            },
        }

        result
    }

    async fn run_batch(
        &self,
        batch_id: BatchId,
        ctx: &TransferContext,
        request: &TransferBatchRequest,
    ) -> Result<BatchReceipt, TransferError> {
        validate_request(request)?;

        if let Some(reason) = ctx.check() {
            return Err(TransferError::Cancelled(reason));
        }

        let body = DebitBatch {
            batch_id,
            processed_at: Utc::now(),
            request,
        };

        debug!(
            batch_id = %batch_id,
            state = %BatchState::Opened,
            store = self.store.name(),
            iban = %request.originating_party.iban,
            transfers = request.transfers.len(),
            "Opening batch scope"
        );

        with_transaction(self.store.as_ref(), ctx, body).await
    }
}

#[async_trait]
impl TransferProcessor for TransferCoordinator {
    async fn process_transfers(
        &self,
        ctx: &TransferContext,
        request: &TransferBatchRequest,
    ) -> Result<BatchReceipt, TransferError> {
        TransferCoordinator::process_transfers(self, ctx, request).await
    }
}

/// Body of the batch scope
struct DebitBatch<'a> {
    batch_id: BatchId,
    processed_at: DateTime<Utc>,
    request: &'a TransferBatchRequest,
}

#[async_trait]
impl<'a> TransactionBody for DebitBatch<'a> {
    type Output = BatchReceipt;

    async fn run(self, tx: &mut dyn LedgerTx) -> Result<BatchReceipt, TransferError> {
        let iban = &self.request.originating_party.iban;
        let account = tx
            .find_account_by_iban(iban)
            .await?
            .ok_or_else(|| TransferError::AccountNotFound { iban: iban.clone() })?;

        let total = self.request.total().ok_or(TransferError::AmountOverflow)?;
        let new_balance = account
            .balance
            .checked_sub(total)
            .ok_or(TransferError::NotEnoughFunds {
                balance: account.balance,
                requested: total,
            })?;

        tx.update_account_balance(account.id, new_balance).await?;

        let entries: Vec<NewLedgerEntry> = self
            .request
            .transfers
            .iter()
            .map(|t| ledger_entry(account.id, t, self.processed_at))
            .collect();
        tx.append_ledger_entries(&entries).await?;

        Ok(BatchReceipt {
            batch_id: self.batch_id,
            account_id: account.id,
            debited: total,
            new_balance,
            entries: entries.len(),
            processed_at: self.processed_at,
        })
    }
}

/// `[<RFC 3339>] Transfer to <name>`, with `: <description>` when one was given
pub fn entry_description(transfer: &Transfer, processed_at: DateTime<Utc>) -> String {
    let mut text = format!(
        "[{}] Transfer to {}",
        processed_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        transfer.counter_party.name
    );
    let extra = transfer.description.trim();
    if !extra.is_empty() {
        text.push_str(": ");
        text.push_str(extra);
    }
    text
}

fn ledger_entry(
    account_id: AccountId,
    transfer: &Transfer,
    processed_at: DateTime<Utc>,
) -> NewLedgerEntry {
    NewLedgerEntry {
        account_id,
        counterparty_name: transfer.counter_party.name.clone(),
        counterparty_iban: transfer.counter_party.iban.clone(),
        counterparty_bic: transfer.counter_party.bic.clone(),
        amount: transfer.amount,
        currency: transfer.currency,
        description: entry_description(transfer, processed_at),
        created_at: processed_at,
    }
}
