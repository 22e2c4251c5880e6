//! PostgreSQL ledger store
//!
//! The account row is read with `SELECT ... FOR UPDATE`, so concurrent
//! batches against the same originating account serialise on that row lock
//! for the whole check-then-update. Under `serializable` isolation the
//! database may instead abort one of them (`40001`), which surfaces as
//! [`StorageError::Conflict`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};

use super::{
    Account, AccountId, LedgerEntry, LedgerStore, LedgerTx, NewAccount, NewLedgerEntry,
    StorageError,
};
use crate::money::Amount;
use crate::transfer::types::Currency;

/// Bind parameters per ledger entry row
const ENTRY_BINDS: usize = 8;

/// Postgres caps one statement at `u16::MAX` bind parameters
const MAX_ROWS_PER_INSERT: usize = u16::MAX as usize / ENTRY_BINDS;

/// Isolation level used for every ledger scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Row lock on the account provides the required isolation
    #[default]
    ReadCommitted,
    Serializable,
}

impl IsolationLevel {
    fn set_statement(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "SET TRANSACTION ISOLATION LEVEL READ COMMITTED",
            IsolationLevel::Serializable => "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
        }
    }
}

/// sqlx-backed [`LedgerStore`]
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
    isolation: IsolationLevel,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool, isolation: IsolationLevel) -> Self {
        Self { pool, isolation }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StorageError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(self.isolation.set_statement())
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn create_account(&self, account: NewAccount) -> Result<AccountId, StorageError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO bank_accounts (organization_name, balance_cents, iban, bic)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&account.organization_name)
        .bind(to_db_cents(account.initial_balance)?)
        .bind(&account.iban)
        .bind(&account.bic)
        .fetch_one(&self.pool)
        .await?;

        Ok(AccountId(id))
    }

    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT id, organization_name, balance_cents, iban, bic
            FROM bank_accounts
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn list_ledger_entries(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<LedgerEntry>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, bank_account_id,
                   counterparty_name, counterparty_iban, counterparty_bic,
                   amount_cents, amount_currency, description, created_at
            FROM ledger_entries
            WHERE bank_account_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(account_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }
}

/// One open sqlx transaction; sqlx rolls it back when dropped uncommitted
struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn find_account_by_iban(&mut self, iban: &str) -> Result<Option<Account>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT id, organization_name, balance_cents, iban, bic
            FROM bank_accounts
            WHERE iban = $1
            FOR UPDATE
            "#,
        )
        .bind(iban)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn update_account_balance(
        &mut self,
        id: AccountId,
        balance: Amount,
    ) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE bank_accounts SET balance_cents = $1 WHERE id = $2")
            .bind(to_db_cents(balance)?)
            .bind(id.0)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() != 1 {
            return Err(StorageError::MissingRow(format!("account {id}")));
        }
        Ok(())
    }

    async fn append_ledger_entries(
        &mut self,
        entries: &[NewLedgerEntry],
    ) -> Result<(), StorageError> {
        if entries.is_empty() {
            return Ok(());
        }

        let cents = entries
            .iter()
            .map(|e| to_db_cents(e.amount))
            .collect::<Result<Vec<_>, _>>()?;

        // One INSERT per chunk, all inside this scope
        let mut inserted = 0u64;
        for (rows, amounts) in entries
            .chunks(MAX_ROWS_PER_INSERT)
            .zip(cents.chunks(MAX_ROWS_PER_INSERT))
        {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO ledger_entries \
                 (bank_account_id, counterparty_name, counterparty_iban, counterparty_bic, \
                  amount_cents, amount_currency, description, created_at) ",
            );
            builder.push_values(rows.iter().zip(amounts), |mut row, (entry, amount)| {
                row.push_bind(entry.account_id.0)
                    .push_bind(entry.counterparty_name.as_str())
                    .push_bind(entry.counterparty_iban.as_str())
                    .push_bind(entry.counterparty_bic.as_str())
                    .push_bind(*amount)
                    .push_bind(entry.currency.code())
                    .push_bind(entry.description.as_str())
                    .push_bind(entry.created_at);
            });
            inserted += builder.build().execute(&mut *self.tx).await?.rows_affected();
        }

        if inserted != entries.len() as u64 {
            return Err(StorageError::CorruptRow(format!(
                "inserted {} of {} ledger entries",
                inserted,
                entries.len()
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn to_db_cents(amount: Amount) -> Result<i64, StorageError> {
    i64::try_from(amount.cents())
        .map_err(|_| StorageError::OutOfRange(format!("{amount} exceeds BIGINT cents")))
}

fn from_db_cents(cents: i64, column: &str) -> Result<Amount, StorageError> {
    u64::try_from(cents)
        .map(Amount::from_cents)
        .map_err(|_| StorageError::CorruptRow(format!("negative {column}: {cents}")))
}

fn row_to_account(row: &PgRow) -> Result<Account, StorageError> {
    Ok(Account {
        id: AccountId(row.try_get("id")?),
        organization_name: row.try_get("organization_name")?,
        balance: from_db_cents(row.try_get("balance_cents")?, "balance_cents")?,
        iban: row.try_get("iban")?,
        bic: row.try_get("bic")?,
    })
}

fn row_to_entry(row: &PgRow) -> Result<LedgerEntry, StorageError> {
    let currency: String = row.try_get("amount_currency")?;
    let currency = Currency::from_code(&currency)
        .ok_or_else(|| StorageError::CorruptRow(format!("unknown currency: {currency}")))?;

    Ok(LedgerEntry {
        id: row.try_get("id")?,
        account_id: AccountId(row.try_get("bank_account_id")?),
        counterparty_name: row.try_get("counterparty_name")?,
        counterparty_iban: row.try_get("counterparty_iban")?,
        counterparty_bic: row.try_get("counterparty_bic")?,
        amount: from_db_cents(row.try_get("amount_cents")?, "amount_cents")?,
        currency,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
    })
}
