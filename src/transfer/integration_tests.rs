//! Integration Tests for the batch coordinator
//!
//! Full coordinator flows against the in-memory store. Fault switches on the
//! store drive the rollback paths without a live database.

use std::sync::Arc;
use std::time::Duration;

use crate::money::Amount;
use crate::storage::{AccountId, LedgerEntry, LedgerStore, MemoryLedgerStore, NewAccount};
use crate::transfer::context::TransferContext;
use crate::transfer::coordinator::TransferCoordinator;
use crate::transfer::error::{CancelReason, TransferError};
use crate::transfer::state::BatchState;
use crate::transfer::types::{BatchReceipt, Party, Transfer, TransferBatchRequest};

const ORG_IBAN: &str = "FR10474608000002006107XXXXX";
const ORG_BIC: &str = "OIVUSCLQXXX";

/// Coordinator wired to a seeded memory store
struct TestHarness {
    coordinator: TransferCoordinator,
    store: MemoryLedgerStore,
    account_id: AccountId,
}

impl TestHarness {
    async fn with_balance(cents: u64) -> Self {
        let store = MemoryLedgerStore::new();
        let account_id = store
            .create_account(NewAccount::new(
                "ACME Corp",
                ORG_IBAN,
                ORG_BIC,
                Amount::from_cents(cents),
            ))
            .await
            .expect("seed account");

        Self {
            coordinator: TransferCoordinator::new(Arc::new(store.clone())),
            store,
            account_id,
        }
    }

    async fn balance(&self) -> Amount {
        self.store
            .find_account(self.account_id)
            .await
            .unwrap()
            .expect("account exists")
            .balance
    }

    async fn entries(&self) -> Vec<LedgerEntry> {
        self.store
            .list_ledger_entries(self.account_id)
            .await
            .unwrap()
    }

    async fn run(&self, request: &TransferBatchRequest) -> Result<BatchReceipt, TransferError> {
        self.coordinator
            .process_transfers(&TransferContext::background(), request)
            .await
    }
}

fn batch(amounts: &[u64]) -> TransferBatchRequest {
    TransferBatchRequest::new(
        Party::new("ACME Corp", ORG_BIC, ORG_IBAN),
        amounts
            .iter()
            .enumerate()
            .map(|(i, cents)| {
                Transfer::eur(
                    Amount::from_cents(*cents),
                    Party::new(
                        format!("Counterparty {i}"),
                        "CRLYFRPPTOU",
                        format!("EE38368098102124568{i}"),
                    ),
                )
            })
            .collect(),
    )
}

// ========================================================================
// Happy Path Tests
// ========================================================================

/// Balance 200.00, batch 80+50+30+10 → 30.00 left, 4 entries worth 170.00
#[tokio::test]
async fn test_partial_debit_commits_every_entry() {
    let h = TestHarness::with_balance(20_000).await;

    let receipt = h.run(&batch(&[8_000, 5_000, 3_000, 1_000])).await.unwrap();

    assert_eq!(receipt.account_id, h.account_id);
    assert_eq!(receipt.debited, Amount::from_cents(17_000));
    assert_eq!(receipt.new_balance, Amount::from_cents(3_000));
    assert_eq!(receipt.entries, 4);
    assert_eq!(
        BatchState::from_outcome(&Ok::<_, TransferError>(receipt)),
        BatchState::Committed
    );

    assert_eq!(h.balance().await, Amount::from_cents(3_000));
    let entries = h.entries().await;
    assert_eq!(entries.len(), 4);
    let sum: Amount = entries.iter().map(|e| e.amount).sum();
    assert_eq!(sum, Amount::from_cents(17_000));
}

/// Balance 100.00, batch 20+50+30 → exactly zero
#[tokio::test]
async fn test_batch_draining_balance_to_zero() {
    let h = TestHarness::with_balance(10_000).await;

    let receipt = h.run(&batch(&[2_000, 5_000, 3_000])).await.unwrap();

    assert_eq!(receipt.new_balance, Amount::ZERO);
    assert_eq!(h.balance().await, Amount::ZERO);
    assert_eq!(h.entries().await.len(), 3);
}

#[tokio::test]
async fn test_entries_follow_input_order_and_are_tagged() {
    let h = TestHarness::with_balance(10_000).await;
    let mut request = batch(&[300, 100, 200]);
    request.transfers[1].description = "Invoice 42".into();

    let receipt = h.run(&request).await.unwrap();

    let entries = h.entries().await;
    let amounts: Vec<u64> = entries.iter().map(|e| e.amount.cents()).collect();
    assert_eq!(amounts, vec![300, 100, 200]);

    let stamp = receipt
        .processed_at
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.counterparty_name, format!("Counterparty {i}"));
        let expected = format!("[{stamp}] Transfer to Counterparty {i}");
        assert!(entry.description.starts_with(&expected));
        assert_eq!(entry.created_at, receipt.processed_at);
    }
    assert!(entries[1].description.ends_with(": Invoice 42"));
}

#[tokio::test]
async fn test_sequential_batches_accumulate() {
    let h = TestHarness::with_balance(1_000).await;

    h.run(&batch(&[400])).await.unwrap();
    h.run(&batch(&[350, 250])).await.unwrap();

    assert_eq!(h.balance().await, Amount::ZERO);
    assert_eq!(h.entries().await.len(), 3);
    assert!(matches!(
        h.run(&batch(&[1])).await,
        Err(TransferError::NotEnoughFunds { .. })
    ));
}

// ========================================================================
// Business Aborts
// ========================================================================

/// Balance 200.00, batch 90+80+30.01 → rejected, nothing written
#[tokio::test]
async fn test_insufficient_funds_writes_nothing() {
    let h = TestHarness::with_balance(20_000).await;

    let err = h.run(&batch(&[9_000, 8_000, 3_001])).await.unwrap_err();

    match err {
        TransferError::NotEnoughFunds { balance, requested } => {
            assert_eq!(balance, Amount::from_cents(20_000));
            assert_eq!(requested, Amount::from_cents(20_001));
        }
        other => panic!("expected NotEnoughFunds, got {other:?}"),
    }
    assert_eq!(h.balance().await, Amount::from_cents(20_000));
    assert!(h.entries().await.is_empty());
}

#[tokio::test]
async fn test_unknown_originating_account() {
    let h = TestHarness::with_balance(20_000).await;
    let mut request = batch(&[100]);
    request.originating_party.iban = "DE00000000000000000000".into();

    let result = h.run(&request).await;

    assert_eq!(BatchState::from_outcome(&result), BatchState::AbortedNotFound);
    assert!(matches!(
        result,
        Err(TransferError::AccountNotFound { ref iban }) if iban == "DE00000000000000000000"
    ));
    assert_eq!(h.store.entry_count().await, 0);
}

// ========================================================================
// Validation (no scope is opened)
// ========================================================================

#[tokio::test]
async fn test_validation_runs_before_any_scope() {
    let h = TestHarness::with_balance(20_000).await;

    // Holding a scope would block any begin() issued by the coordinator
    let open_scope = h.store.begin().await.unwrap();

    let empty = tokio::time::timeout(Duration::from_secs(1), h.run(&batch(&[]))).await;
    assert!(matches!(empty, Ok(Err(TransferError::EmptyBatch))));

    let zero = tokio::time::timeout(Duration::from_secs(1), h.run(&batch(&[100, 0]))).await;
    assert!(matches!(zero, Ok(Err(TransferError::InvalidAmount { index: 1 }))));

    drop(open_scope);
    assert_eq!(h.balance().await, Amount::from_cents(20_000));
}

#[tokio::test]
async fn test_overflowing_total_is_rejected() {
    let h = TestHarness::with_balance(20_000).await;

    let result = h.run(&batch(&[u64::MAX, 1])).await;

    assert_eq!(BatchState::from_outcome(&result), BatchState::Rejected);
    assert!(matches!(result, Err(TransferError::AmountOverflow)));
}

// ========================================================================
// Storage Failures
// ========================================================================

#[tokio::test]
async fn test_append_failure_leaves_no_partial_write() {
    let h = TestHarness::with_balance(20_000).await;
    h.store.set_fail_append(true);

    let result = h.run(&batch(&[8_000, 5_000])).await;

    assert_eq!(BatchState::from_outcome(&result), BatchState::AbortedStorageError);
    let err = result.unwrap_err();
    assert!(matches!(err, TransferError::Storage(_)));
    assert_eq!(err.http_status(), 500);

    // Balance update was staged in the same scope and must be gone too
    assert_eq!(h.balance().await, Amount::from_cents(20_000));
    assert!(h.entries().await.is_empty());

    h.store.set_fail_append(false);
    h.run(&batch(&[8_000, 5_000])).await.unwrap();
    assert_eq!(h.balance().await, Amount::from_cents(7_000));
}

#[tokio::test]
async fn test_commit_failure_discards_scope() {
    let h = TestHarness::with_balance(20_000).await;
    h.store.set_fail_commit(true);

    let result = h.run(&batch(&[1_000])).await;

    assert!(matches!(result, Err(TransferError::Storage(_))));
    assert_eq!(h.balance().await, Amount::from_cents(20_000));
    assert!(h.entries().await.is_empty());
}

#[tokio::test]
async fn test_rollback_failure_keeps_original_cause() {
    let h = TestHarness::with_balance(20_000).await;
    h.store.set_fail_append(true);
    h.store.set_fail_rollback(true);

    let err = h.run(&batch(&[1_000])).await.unwrap_err();

    match &err {
        TransferError::RollbackFailed { cause, .. } => {
            assert!(matches!(**cause, TransferError::Storage(_)));
        }
        other => panic!("expected RollbackFailed, got {other:?}"),
    }
    let text = err.to_string();
    assert!(text.contains("injected append failure"));
    assert!(text.contains("injected rollback failure"));
    assert_eq!(h.balance().await, Amount::from_cents(20_000));
}

// ========================================================================
// Cancellation
// ========================================================================

#[tokio::test]
async fn test_cancel_mid_scope_rolls_back_and_releases_account() {
    let h = TestHarness::with_balance(20_000).await;
    h.store.set_stall_append(true);
    let (ctx, handle) = TransferContext::background().cancellable();

    let request = batch(&[5_000]);
    let (result, ()) = tokio::join!(
        h.coordinator.process_transfers(&ctx, &request),
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        }
    );

    assert!(matches!(
        result,
        Err(TransferError::Cancelled(CancelReason::Cancelled))
    ));
    assert_eq!(BatchState::from_outcome(&result), BatchState::AbortedCancelled);

    // Scope was dropped: the account is readable again and untouched
    let balance = tokio::time::timeout(Duration::from_secs(1), h.balance())
        .await
        .expect("account lock released");
    assert_eq!(balance, Amount::from_cents(20_000));

    h.store.set_stall_append(false);
    h.run(&batch(&[5_000])).await.unwrap();
    assert_eq!(h.balance().await, Amount::from_cents(15_000));
}

#[tokio::test]
async fn test_deadline_mid_scope() {
    let h = TestHarness::with_balance(20_000).await;
    h.store.set_stall_append(true);
    let ctx = TransferContext::with_timeout(Duration::from_millis(30));

    let result = h.coordinator.process_transfers(&ctx, &batch(&[5_000])).await;

    let err = result.unwrap_err();
    assert!(matches!(err, TransferError::Cancelled(CancelReason::DeadlineExceeded)));
    assert_eq!(err.http_status(), 504);
    assert_eq!(h.balance().await, Amount::from_cents(20_000));
    assert_eq!(h.store.entry_count().await, 0);
}

#[tokio::test]
async fn test_deadline_during_commit_ack_reports_committed() {
    let h = TestHarness::with_balance(20_000).await;
    h.store.set_commit_ack_delay(Duration::from_millis(100));
    let ctx = TransferContext::with_timeout(Duration::from_millis(30));

    let result = h.coordinator.process_transfers(&ctx, &batch(&[5_000])).await;

    // The commit already reached the store, so the caller must see it
    assert_eq!(BatchState::from_outcome(&result), BatchState::Committed);
    let receipt = result.unwrap();
    assert_eq!(receipt.new_balance, Amount::from_cents(15_000));
    assert_eq!(h.balance().await, Amount::from_cents(15_000));
    assert_eq!(h.entries().await.len(), 1);
}

#[tokio::test]
async fn test_cancel_while_waiting_for_scope() {
    let h = TestHarness::with_balance(20_000).await;
    let held = h.store.begin().await.unwrap();
    let ctx = TransferContext::with_timeout(Duration::from_millis(30));

    let result = h.coordinator.process_transfers(&ctx, &batch(&[5_000])).await;

    assert!(matches!(
        result,
        Err(TransferError::Cancelled(CancelReason::DeadlineExceeded))
    ));
    drop(held);
    assert_eq!(h.balance().await, Amount::from_cents(20_000));
}

#[tokio::test]
async fn test_already_cancelled_context_never_opens_scope() {
    let h = TestHarness::with_balance(20_000).await;
    let (ctx, handle) = TransferContext::background().cancellable();
    handle.cancel();

    let result = h.coordinator.process_transfers(&ctx, &batch(&[100])).await;

    assert!(matches!(
        result,
        Err(TransferError::Cancelled(CancelReason::Cancelled))
    ));
    assert_eq!(h.balance().await, Amount::from_cents(20_000));
}

// ========================================================================
// Concurrency
// ========================================================================

/// Two batches that jointly exceed the balance: exactly one commits
#[tokio::test]
async fn test_concurrent_batches_never_overdraw() {
    let h = TestHarness::with_balance(10_000).await;
    let first = batch(&[4_000, 2_000]);
    let second = batch(&[3_000, 3_000]);
    let ctx = TransferContext::background();

    let (a, b) = tokio::join!(
        h.coordinator.process_transfers(&ctx, &first),
        h.coordinator.process_transfers(&ctx, &second),
    );

    let committed = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(committed, 1);
    let rejected = [a, b]
        .into_iter()
        .filter_map(Result::err)
        .next()
        .expect("one batch aborted");
    match rejected {
        TransferError::NotEnoughFunds { balance, requested } => {
            assert_eq!(balance, Amount::from_cents(4_000));
            assert_eq!(requested, Amount::from_cents(6_000));
        }
        other => panic!("expected NotEnoughFunds, got {other:?}"),
    }

    assert_eq!(h.balance().await, Amount::from_cents(4_000));
    assert_eq!(h.entries().await.len(), 2);
}

#[tokio::test]
async fn test_many_concurrent_batches_keep_books_balanced() {
    let h = Arc::new(TestHarness::with_balance(10_000).await);

    let mut handles = Vec::new();
    for _ in 0..25 {
        let h = h.clone();
        handles.push(tokio::spawn(async move { h.run(&batch(&[300, 200])).await }));
    }

    let mut committed = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            committed += 1;
        }
    }

    // 10_000 / 500 = 20 batches fit
    assert_eq!(committed, 20);
    assert_eq!(h.balance().await, Amount::ZERO);
    let entries = h.entries().await;
    assert_eq!(entries.len(), 40);
    let sum: Amount = entries.iter().map(|e| e.amount).sum();
    assert_eq!(sum, Amount::from_cents(10_000));
}
