//! Bulk transfer handler

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, TransferBatchPayload, created};
use crate::transfer::{BatchReceipt, ErrorKind, TransferContext};

/// Submit a batch of credit transfers
///
/// POST /v1/transfers
///
/// - 201: batch committed, `data` is the receipt
/// - 400: malformed JSON, bad amount, unsupported currency, invalid batch
/// - 422: not enough funds, or unknown originating account
/// - 409: concurrent update, the whole batch may be retried
/// - 504: batch exceeded the request deadline (nothing was written)
/// - 500: infrastructure failure (generic message)
pub async fn create_transfers(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TransferBatchPayload>, JsonRejection>,
) -> ApiResult<BatchReceipt> {
    let Json(payload) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Rejected transfer payload");
        ApiError::bad_request(format!("malformed input: {}", rejection.body_text()))
    })?;

    let request = payload.into_request()?;
    let ctx = TransferContext::with_timeout(state.request_timeout);

    match state.processor.process_transfers(&ctx, &request).await {
        Ok(receipt) => created(receipt),
        Err(e) => {
            if e.kind() == ErrorKind::Storage {
                // Full detail stays server-side
                tracing::error!(code = e.code(), error = %e, "Transfer batch failed");
            }
            Err(ApiError::from(e))
        }
    }
}
