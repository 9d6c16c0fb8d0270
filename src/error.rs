use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::domain::amount::AmountError;
use crate::platform::PlatformError;
use crate::ports::RepositoryError;
use crate::stellar::{FederationError, HorizonError, TransactionError};
use crate::utils::sanitize::sanitize_json;

/// Failures of the payment interface core.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unsupported memo type: {0}")]
    UnsupportedMemo(String),

    #[error("Asset {code} issued by {issuer} not found")]
    AssetNotFound { code: String, issuer: String },

    #[error("Destination {0} does not exist and cannot receive non-native assets")]
    UnfundedDestination(String),

    #[error("No user registered for {0}")]
    UnknownRecipient(String),

    #[error("Ledger rejected transaction: {code}")]
    Submission {
        code: String,
        payload: serde_json::Value,
    },

    #[error("Platform request failed: {0}")]
    PlatformRequest(#[from] PlatformError),

    #[error("Account {0} has no signing credential")]
    MissingCredential(String),

    #[error("Cursor for {0} was advanced concurrently")]
    CursorConflict(String),

    #[error("No default account for network {0}")]
    NoDefaultAccount(String),

    #[error("Job queue is closed")]
    QueueClosed,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Federation(#[from] FederationError),

    #[error(transparent)]
    Ledger(HorizonError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Amount(#[from] AmountError),
}

impl From<HorizonError> for BridgeError {
    fn from(err: HorizonError) -> Self {
        match err {
            HorizonError::SubmissionFailed { code, payload } => {
                BridgeError::Submission { code, payload }
            }
            other => BridgeError::Ledger(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "status": "error",
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

impl From<BridgeError> for AppError {
    /// Logs the full cause and keeps the response generic.
    fn from(err: BridgeError) -> Self {
        match &err {
            BridgeError::Submission { code, payload } => {
                tracing::error!(code = %code, payload = %sanitize_json(payload), "Ledger submission failed");
            }
            other => tracing::error!(error = %other, "Request failed"),
        }

        match err {
            BridgeError::InvalidAddress(_) => AppError::BadRequest("invalid recipient address".to_string()),
            BridgeError::UnsupportedMemo(_) => AppError::BadRequest("unsupported memo type".to_string()),
            BridgeError::AssetNotFound { code, .. } => AppError::NotFound(format!("asset {}", code)),
            BridgeError::UnfundedDestination(_) => {
                AppError::BadRequest("destination account is not funded".to_string())
            }
            BridgeError::UnknownRecipient(_) => AppError::NotFound("recipient".to_string()),
            BridgeError::Validation(msg) => AppError::Validation(msg),
            BridgeError::NoDefaultAccount(network) => {
                AppError::NotFound(format!("operating account for {}", network))
            }
            BridgeError::Submission { code, .. } => {
                AppError::Upstream(format!("ledger rejected transaction ({})", code))
            }
            BridgeError::Ledger(_) | BridgeError::Federation(_) | BridgeError::PlatformRequest(_) => {
                AppError::Upstream("upstream service unavailable".to_string())
            }
            BridgeError::MissingCredential(_)
            | BridgeError::CursorConflict(_)
            | BridgeError::QueueClosed
            | BridgeError::Transaction(_)
            | BridgeError::Repository(_)
            | BridgeError::Amount(_) => AppError::Internal("internal error".to_string()),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::from(BridgeError::Repository(err))
    }
}
