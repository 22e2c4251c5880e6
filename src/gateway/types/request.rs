//! Inbound JSON payloads
//!
//! Wire shape of `POST /v1/transfers`. Amounts arrive as decimal strings and
//! are converted to [`Amount`](crate::money::Amount) here; nothing past this
//! module sees the raw text.

use serde::Deserialize;

use crate::money::parse_amount;
use crate::transfer::{Party, Transfer, TransferBatchRequest, TransferError, validate_currency};

/// Request body of `POST /v1/transfers`
#[derive(Debug, Clone, Deserialize)]
pub struct TransferBatchPayload {
    pub organization_name: String,
    pub organization_bic: String,
    pub organization_iban: String,
    pub credit_transfers: Vec<CreditTransferPayload>,
}

/// One element of `credit_transfers`
#[derive(Debug, Clone, Deserialize)]
pub struct CreditTransferPayload {
    /// Decimal string, at most two fractional digits (`"14.5"`)
    pub amount: String,
    pub currency: String,
    pub counterparty_name: String,
    pub counterparty_bic: String,
    pub counterparty_iban: String,
    #[serde(default)]
    pub description: String,
}

impl TransferBatchPayload {
    /// Convert to the core request
    ///
    /// Fails on the first transfer with a malformed amount or an unsupported
    /// currency. Batch-level rules (emptiness, zero amounts) are left to the
    /// coordinator's validation.
    pub fn into_request(self) -> Result<TransferBatchRequest, TransferError> {
        let transfers = self
            .credit_transfers
            .into_iter()
            .map(CreditTransferPayload::into_transfer)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TransferBatchRequest::new(
            Party::new(
                self.organization_name,
                self.organization_bic,
                self.organization_iban,
            ),
            transfers,
        ))
    }
}

impl CreditTransferPayload {
    fn into_transfer(self) -> Result<Transfer, TransferError> {
        let amount = parse_amount(&self.amount)?;
        let currency = validate_currency(&self.currency)?;

        Ok(Transfer {
            amount,
            currency,
            description: self.description,
            counter_party: Party::new(
                self.counterparty_name,
                self.counterparty_bic,
                self.counterparty_iban,
            ),
        })
    }
}
