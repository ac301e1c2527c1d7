//! Error taxonomy shared by the storefront services and its HTTP surface.
//!
//! Every variant renders as `{"ok": false, "message": ..., "detail": ...}`. Messages are safe
//! to show to a shopper; database and pool failures are logged and replaced by a generic text.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

/// Longest gateway diagnostic echoed back to a client.
pub const MAX_DETAIL_LEN: usize = 200;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("payment gateway is not configured")]
    GatewayNotConfigured,

    #[error("payment gateway rejected the request: {detail}")]
    GatewayBadRequest { detail: String },

    #[error("payment gateway unavailable: {detail}")]
    GatewayUnavailable { detail: String },

    #[error("signature verification failed")]
    SignatureMismatch,

    #[error("login required")]
    Unauthenticated,

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("blocking task failed: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound(what.into())
    }

    pub fn gateway_bad_request(detail: impl ToString) -> Self {
        ServiceError::GatewayBadRequest {
            detail: truncate_detail(&detail.to_string()),
        }
    }

    pub fn gateway_unavailable(detail: impl ToString) -> Self {
        ServiceError::GatewayUnavailable {
            detail: truncate_detail(&detail.to_string()),
        }
    }

    /// Message shown to the shopper. Gateway internals never appear here.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::GatewayNotConfigured
            | ServiceError::GatewayBadRequest { .. }
            | ServiceError::GatewayUnavailable { .. } => {
                "Payment gateway initialization failed. Please check API keys or network."
                    .to_string()
            }
            ServiceError::SignatureMismatch => "Verification failed".to_string(),
            ServiceError::Database(_) | ServiceError::Pool(_) | ServiceError::Blocking(_) => {
                "Something went wrong, please try again".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn detail(&self) -> Option<String> {
        match self {
            ServiceError::GatewayBadRequest { detail }
            | ServiceError::GatewayUnavailable { detail } => Some(detail.clone()),
            ServiceError::GatewayNotConfigured => Some("missing gateway credentials".to_string()),
            _ => None,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            ok: false,
            message: self.public_message(),
            detail: self.detail(),
        }
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) | ServiceError::SignatureMismatch => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidTransition(_) => StatusCode::CONFLICT,
            ServiceError::GatewayBadRequest { .. } => StatusCode::BAD_GATEWAY,
            ServiceError::GatewayNotConfigured | ServiceError::GatewayUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServiceError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ServiceError::Database(_) | ServiceError::Pool(_) | ServiceError::Blocking(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        HttpResponse::build(self.status_code()).json(self.body())
    }
}

/// Cuts a diagnostic down to [`MAX_DETAIL_LEN`] characters on a char boundary.
pub fn truncate_detail(detail: &str) -> String {
    detail.chars().take(MAX_DETAIL_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_detail_is_truncated() {
        let err = ServiceError::gateway_unavailable("x".repeat(500));
        assert_eq!(err.detail().unwrap().len(), MAX_DETAIL_LEN);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn gateway_message_does_not_leak_detail() {
        let err = ServiceError::gateway_bad_request("The api key provided is invalid");
        assert!(!err.public_message().contains("api key provided"));
        let body = err.body();
        assert!(!body.ok);
        assert_eq!(body.detail.as_deref(), Some("The api key provided is invalid"));
    }

    #[test]
    fn not_found_names_the_missing_thing() {
        let err = ServiceError::not_found("Payment");
        assert_eq!(err.public_message(), "Payment not found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
