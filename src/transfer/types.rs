//! Transfer Core Types
//!
//! Type definitions for one batch of outgoing credit transfers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Amount;
use crate::storage::AccountId;

/// Batch ID type - ULID-based unique identifier
///
/// Sortable by creation time, no coordination needed. Used to correlate
/// log lines and receipts of one coordinator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(ulid::Ulid);

impl BatchId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BatchId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

impl Serialize for BatchId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Supported currencies
///
/// Closed set: adding a code is a new variant, never a free-form string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "EUR")]
    Eur,
}

impl Currency {
    const ALL: [Currency; 1] = [Currency::Eur];

    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Descriptive reference to a bank account holder
///
/// BIC and IBAN are opaque strings; they are not validated beyond presence.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub bic: String,
    pub iban: String,
}

impl Party {
    pub fn new(name: impl Into<String>, bic: impl Into<String>, iban: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bic: bic.into(),
            iban: iban.into(),
        }
    }
}

/// One requested movement of money to a counter-party
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub amount: Amount,
    pub currency: Currency,
    pub description: String,
    pub counter_party: Party,
}

impl Transfer {
    /// EUR transfer with an empty description
    pub fn eur(amount: Amount, counter_party: Party) -> Self {
        Self {
            amount,
            currency: Currency::Eur,
            description: String::new(),
            counter_party,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A batch of transfers issued by one originating account
///
/// Transient: lives for the duration of one coordinator call. Transfer order
/// is preserved in the resulting ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferBatchRequest {
    pub originating_party: Party,
    pub transfers: Vec<Transfer>,
}

impl TransferBatchRequest {
    pub fn new(originating_party: Party, transfers: Vec<Transfer>) -> Self {
        Self {
            originating_party,
            transfers,
        }
    }

    /// Sum of all transfer amounts, `None` on overflow
    pub fn total(&self) -> Option<Amount> {
        Amount::checked_sum(self.transfers.iter().map(|t| t.amount))
    }
}

/// Result of a committed batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReceipt {
    pub batch_id: BatchId,
    pub account_id: AccountId,
    pub debited: Amount,
    pub new_balance: Amount,
    pub entries: usize,
    pub processed_at: DateTime<Utc>,
}
