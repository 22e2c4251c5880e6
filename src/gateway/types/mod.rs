//! Gateway types module
//!
//! ## Input Types
//! - [`TransferBatchPayload`]: JSON body of `POST /v1/transfers`
//!
//! ## Output Types
//! - [`ApiResponse<T>`]: Unified API response wrapper
//! - [`ApiError`]: Handler error with HTTP status

pub mod request;
pub mod response;

pub use request::{CreditTransferPayload, TransferBatchPayload};
pub use response::{ApiError, ApiResponse, ApiResult, created, error_codes, ok};
