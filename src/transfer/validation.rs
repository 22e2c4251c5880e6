//! Transfer Validation
//!
//! Pure checks that run before any storage interaction, so a rejected batch
//! can never create partial state.

use super::error::TransferError;
use super::types::{Currency, TransferBatchRequest};

/// Resolve a currency code against the supported set
pub fn validate_currency(code: &str) -> Result<Currency, TransferError> {
    Currency::from_code(code).ok_or_else(|| TransferError::InvalidCurrency(code.to_string()))
}

/// Check a whole batch before the coordinator opens a scope
///
/// Currencies are already typed on [`TransferBatchRequest`], so this covers
/// what the type cannot: emptiness, zero amounts, a missing originating IBAN
/// and a total that overflows.
pub fn validate_request(request: &TransferBatchRequest) -> Result<(), TransferError> {
    if request.originating_party.iban.trim().is_empty() {
        return Err(TransferError::InvalidParty(
            "originating IBAN is required".to_string(),
        ));
    }

    if request.transfers.is_empty() {
        return Err(TransferError::EmptyBatch);
    }

    if let Some(index) = request.transfers.iter().position(|t| t.amount.is_zero()) {
        return Err(TransferError::InvalidAmount { index });
    }

    request.total().ok_or(TransferError::AmountOverflow)?;
    Ok(())
}
