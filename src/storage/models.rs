//! Persistent ledger models

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::money::Amount;
use crate::transfer::types::Currency;

/// Primary key of `bank_accounts`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Originating bank account, owned by the storage layer
///
/// The coordinator only ever holds a transaction-scoped snapshot of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub organization_name: String,
    pub balance: Amount,
    pub iban: String,
    pub bic: String,
}

/// Account creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub organization_name: String,
    pub iban: String,
    pub bic: String,
    pub initial_balance: Amount,
}

impl NewAccount {
    pub fn new(
        organization_name: impl Into<String>,
        iban: impl Into<String>,
        bic: impl Into<String>,
        initial_balance: Amount,
    ) -> Self {
        Self {
            organization_name: organization_name.into(),
            iban: iban.into(),
            bic: bic.into(),
            initial_balance,
        }
    }
}

/// Ledger entry about to be appended; the store assigns the id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub account_id: AccountId,
    pub counterparty_name: String,
    pub counterparty_iban: String,
    pub counterparty_bic: String,
    pub amount: Amount,
    pub currency: Currency,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Committed, immutable ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub account_id: AccountId,
    pub counterparty_name: String,
    pub counterparty_iban: String,
    pub counterparty_bic: String,
    pub amount: Amount,
    pub currency: Currency,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub(crate) fn from_new(id: i64, entry: NewLedgerEntry) -> Self {
        Self {
            id,
            account_id: entry.account_id,
            counterparty_name: entry.counterparty_name,
            counterparty_iban: entry.counterparty_iban,
            counterparty_bic: entry.counterparty_bic,
            amount: entry.amount,
            currency: entry.currency,
            description: entry.description,
            created_at: entry.created_at,
        }
    }
}
