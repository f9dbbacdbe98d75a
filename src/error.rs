use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Blockchain RPC error: {0}")]
    BlockchainRPC(String),

    #[error("Wallet not ready: {0}")]
    WalletNotReady(String),

    #[error("Please switch to the required network (chain id {expected}, active {active})")]
    WrongNetwork { expected: u64, active: u64 },

    // Revert reasons and wallet rejections are carried verbatim.
    #[error("{0}")]
    Transaction(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Win signer is not configured")]
    SignerNotConfigured,

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidSignature => StatusCode::UNAUTHORIZED,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::Backend(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::BlockchainRPC(_) => "BLOCKCHAIN_RPC_ERROR",
            AppError::WalletNotReady(_) => "WALLET_NOT_READY",
            AppError::WrongNetwork { .. } => "WRONG_NETWORK",
            AppError::Transaction(_) => "TRANSACTION_FAILED",
            AppError::Backend(_) => "BACKEND_ERROR",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::InvalidSignature => "INVALID_SIGNATURE",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::SignerNotConfigured => "SERVER_CONFIGURATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            AppError::BadRequest(ref msg) | AppError::Forbidden(ref msg) => msg.clone(),
            AppError::SignerNotConfigured => "Server configuration error".to_string(),
            _ => self.to_string(),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
                details: None,
            },
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
