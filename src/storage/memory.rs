//! In-memory ledger store
//!
//! Holds accounts and ledger entries behind one async mutex. A scope owns the
//! mutex guard from `begin` until commit/rollback/drop, so scopes execute one
//! at a time (serializable by construction). Writes are staged inside the
//! scope and only applied to the book on commit.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    Account, AccountId, LedgerEntry, LedgerStore, LedgerTx, NewAccount, NewLedgerEntry,
    StorageError,
};
use crate::money::Amount;

#[derive(Debug, Default)]
struct LedgerBook {
    accounts: BTreeMap<AccountId, Account>,
    by_iban: HashMap<String, AccountId>,
    entries: Vec<LedgerEntry>,
    next_account_id: i64,
    next_entry_id: i64,
}

/// Fault switches, flipped by tests to exercise rollback paths
#[derive(Debug, Default)]
struct Faults {
    fail_append: AtomicBool,
    stall_append: AtomicBool,
    fail_commit: AtomicBool,
    fail_rollback: AtomicBool,
    commit_ack_delay_ms: AtomicU64,
}

/// In-process [`LedgerStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    book: Arc<Mutex<LedgerBook>>,
    faults: Arc<Faults>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `append_ledger_entries` call fail
    pub fn set_fail_append(&self, fail: bool) {
        self.faults.fail_append.store(fail, Ordering::SeqCst);
    }

    /// Make `append_ledger_entries` never complete (the scope stays open)
    pub fn set_stall_append(&self, stall: bool) {
        self.faults.stall_append.store(stall, Ordering::SeqCst);
    }

    pub fn set_fail_commit(&self, fail: bool) {
        self.faults.fail_commit.store(fail, Ordering::SeqCst);
    }

    /// Apply commits immediately but hold back the acknowledgement
    pub fn set_commit_ack_delay(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.faults.commit_ack_delay_ms.store(ms, Ordering::SeqCst);
    }

    /// Make explicit rollbacks report an error (staged writes are still discarded)
    pub fn set_fail_rollback(&self, fail: bool) {
        self.faults.fail_rollback.store(fail, Ordering::SeqCst);
    }

    /// Number of committed ledger entries across all accounts
    pub async fn entry_count(&self) -> usize {
        self.book.lock().await.entries.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StorageError> {
        let book = self.book.clone().lock_owned().await;
        Ok(Box::new(MemoryLedgerTx {
            book,
            faults: self.faults.clone(),
            balances: HashMap::new(),
            entries: Vec::new(),
        }))
    }

    async fn create_account(&self, account: NewAccount) -> Result<AccountId, StorageError> {
        let mut book = self.book.lock().await;
        if book.by_iban.contains_key(&account.iban) {
            return Err(StorageError::Constraint(format!(
                "duplicate iban: {}",
                account.iban
            )));
        }

        book.next_account_id += 1;
        let id = AccountId(book.next_account_id);
        book.by_iban.insert(account.iban.clone(), id);
        book.accounts.insert(
            id,
            Account {
                id,
                organization_name: account.organization_name,
                balance: account.initial_balance,
                iban: account.iban,
                bic: account.bic,
            },
        );
        Ok(id)
    }

    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, StorageError> {
        Ok(self.book.lock().await.accounts.get(&id).cloned())
    }

    async fn list_ledger_entries(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<LedgerEntry>, StorageError> {
        let book = self.book.lock().await;
        Ok(book
            .entries
            .iter()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect())
    }
}

/// Scope over the locked book; staged writes die with it unless committed
struct MemoryLedgerTx {
    book: OwnedMutexGuard<LedgerBook>,
    faults: Arc<Faults>,
    balances: HashMap<AccountId, Amount>,
    entries: Vec<NewLedgerEntry>,
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn find_account_by_iban(&mut self, iban: &str) -> Result<Option<Account>, StorageError> {
        let Some(id) = self.book.by_iban.get(iban) else {
            return Ok(None);
        };
        Ok(self.book.accounts.get(id).map(|account| {
            let mut snapshot = account.clone();
            // Read-your-writes inside the scope
            if let Some(staged) = self.balances.get(id) {
                snapshot.balance = *staged;
            }
            snapshot
        }))
    }

    async fn update_account_balance(
        &mut self,
        id: AccountId,
        balance: Amount,
    ) -> Result<(), StorageError> {
        if !self.book.accounts.contains_key(&id) {
            return Err(StorageError::MissingRow(format!("account {id}")));
        }
        self.balances.insert(id, balance);
        Ok(())
    }

    async fn append_ledger_entries(
        &mut self,
        entries: &[NewLedgerEntry],
    ) -> Result<(), StorageError> {
        if self.faults.stall_append.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.faults.fail_append.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected append failure".into()));
        }
        if let Some(orphan) = entries
            .iter()
            .find(|e| !self.book.accounts.contains_key(&e.account_id))
        {
            return Err(StorageError::Constraint(format!(
                "ledger entry references unknown account {}",
                orphan.account_id
            )));
        }
        self.entries.extend_from_slice(entries);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        if self.faults.fail_commit.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected commit failure".into()));
        }

        let MemoryLedgerTx {
            mut book,
            faults,
            balances,
            entries,
        } = *self;

        for (id, balance) in balances {
            if let Some(account) = book.accounts.get_mut(&id) {
                account.balance = balance;
            }
        }
        for entry in entries {
            book.next_entry_id += 1;
            let id = book.next_entry_id;
            book.entries.push(LedgerEntry::from_new(id, entry));
        }
        drop(book);

        let ack_delay = faults.commit_ack_delay_ms.load(Ordering::SeqCst);
        if ack_delay > 0 {
            tokio::time::sleep(Duration::from_millis(ack_delay)).await;
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        // Staged writes are dropped together with the guard
        if self.faults.fail_rollback.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected rollback failure".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::types::Currency;
    use chrono::Utc;

    fn entry(account_id: AccountId, cents: u64) -> NewLedgerEntry {
        NewLedgerEntry {
            account_id,
            counterparty_name: "Bip Bip".into(),
            counterparty_iban: "EE383680981021245685".into(),
            counterparty_bic: "CRLYFRPPTOU".into(),
            amount: Amount::from_cents(cents),
            currency: Currency::Eur,
            description: "test".into(),
            created_at: Utc::now(),
        }
    }

    async fn seeded(balance: u64) -> (MemoryLedgerStore, AccountId) {
        let store = MemoryLedgerStore::new();
        let id = store
            .create_account(NewAccount::new(
                "ACME Corp",
                "FR10474608000002006107XXXXX",
                "OIVUSCLQXXX",
                Amount::from_cents(balance),
            ))
            .await
            .unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn test_duplicate_iban_rejected() {
        let (store, _) = seeded(100).await;
        let err = store
            .create_account(NewAccount::new(
                "Other",
                "FR10474608000002006107XXXXX",
                "BIC",
                Amount::ZERO,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_commit_applies_staged_writes() {
        let (store, id) = seeded(10_000).await;

        let mut tx = store.begin().await.unwrap();
        tx.update_account_balance(id, Amount::from_cents(7_000))
            .await
            .unwrap();
        tx.append_ledger_entries(&[entry(id, 1_000), entry(id, 2_000)])
            .await
            .unwrap();

        // Read-your-writes inside the scope
        let inside = tx
            .find_account_by_iban("FR10474608000002006107XXXXX")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inside.balance, Amount::from_cents(7_000));

        tx.commit().await.unwrap();

        let account = store.find_account(id).await.unwrap().unwrap();
        assert_eq!(account.balance, Amount::from_cents(7_000));
        let entries = store.list_ledger_entries(id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 1);
        assert_eq!(entries[1].amount, Amount::from_cents(2_000));
    }

    #[tokio::test]
    async fn test_drop_discards_staged_writes() {
        let (store, id) = seeded(10_000).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.update_account_balance(id, Amount::ZERO).await.unwrap();
            tx.append_ledger_entries(&[entry(id, 10_000)]).await.unwrap();
        }

        let account = store.find_account(id).await.unwrap().unwrap();
        assert_eq!(account.balance, Amount::from_cents(10_000));
        assert_eq!(store.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_rollback_discards_even_when_reported_failed() {
        let (store, id) = seeded(500).await;
        store.set_fail_rollback(true);

        let mut tx = store.begin().await.unwrap();
        tx.update_account_balance(id, Amount::ZERO).await.unwrap();
        assert!(tx.rollback().await.is_err());

        let account = store.find_account(id).await.unwrap().unwrap();
        assert_eq!(account.balance, Amount::from_cents(500));
    }

    #[tokio::test]
    async fn test_unknown_iban_and_account() {
        let (store, _) = seeded(0).await;
        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_account_by_iban("nope").await.unwrap().is_none());
        let err = tx
            .update_account_balance(AccountId(999), Amount::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::MissingRow(_)));
        let err = tx
            .append_ledger_entries(&[entry(AccountId(999), 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Constraint(_)));
    }
}
