//! Outbound calls to the payment gateway's REST API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::config::{Credentials, GatewayConfig};
use crate::errors::ServiceError;

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct CreateOrderRequest {
    /// Minor units.
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub payment_capture: u8,
    pub notes: BTreeMap<String, String>,
}

/// The gateway's view of an order.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct RemoteOrder {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("gateway unreachable: {0}")]
    Unreachable(String),
}

impl From<GatewayError> for ServiceError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected { .. } => ServiceError::gateway_bad_request(&err),
            GatewayError::Unreachable(_) => ServiceError::gateway_unavailable(&err),
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDescription,
}

#[derive(Deserialize)]
struct ErrorDescription {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

fn rejection_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope
            .error
            .description
            .or(envelope.error.code)
            .unwrap_or_else(|| "request rejected".to_string()),
        Err(_) => body.trim().to_string(),
    }
}

/// Transport to the gateway. Credentials are passed per call so a client never holds secrets
/// it was not configured with.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn create_order(
        &self,
        credentials: Credentials<'_>,
        request: &CreateOrderRequest,
    ) -> Result<RemoteOrder, GatewayError>;
}

pub struct RazorpayClient {
    http: reqwest::Client,
    api_base: String,
}

impl RazorpayClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(RazorpayClient {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl GatewayClient for RazorpayClient {
    async fn create_order(
        &self,
        credentials: Credentials<'_>,
        request: &CreateOrderRequest,
    ) -> Result<RemoteOrder, GatewayError> {
        let response = self
            .http
            .post(format!("{}/orders", self.api_base))
            .basic_auth(credentials.key_id, Some(credentials.key_secret))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Unreachable("request timed out".to_string())
                } else {
                    GatewayError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: rejection_message(&body),
            });
        }
        if !status.is_success() {
            return Err(GatewayError::Unreachable(format!(
                "gateway responded with {status}"
            )));
        }
        response
            .json::<RemoteOrder>()
            .await
            .map_err(|e| GatewayError::Unreachable(format!("unreadable gateway response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_message_prefers_description() {
        let body = r#"{"error":{"code":"BAD_REQUEST_ERROR","description":"Authentication failed"}}"#;
        assert_eq!(rejection_message(body), "Authentication failed");
        let body = r#"{"error":{"code":"BAD_REQUEST_ERROR"}}"#;
        assert_eq!(rejection_message(body), "BAD_REQUEST_ERROR");
        assert_eq!(rejection_message(" plain text "), "plain text");
    }

    #[test]
    fn gateway_errors_map_onto_the_taxonomy() {
        let rejected: ServiceError = GatewayError::Rejected {
            status: 401,
            message: "Authentication failed".to_string(),
        }
        .into();
        assert!(matches!(rejected, ServiceError::GatewayBadRequest { .. }));

        let down: ServiceError = GatewayError::Unreachable("request timed out".to_string()).into();
        assert!(matches!(down, ServiceError::GatewayUnavailable { .. }));
    }

    #[test]
    fn remote_order_tolerates_extra_fields() {
        let order: RemoteOrder = serde_json::from_str(
            r#"{"id":"order_EKwxwAgItmmXdp","entity":"order","amount":126500,
                "currency":"INR","status":"created","attempts":0}"#,
        )
        .unwrap();
        assert_eq!(order.id, "order_EKwxwAgItmmXdp");
        assert_eq!(order.status.as_deref(), Some("created"));
        assert_eq!(order.amount, Some(126_500));
    }
}
