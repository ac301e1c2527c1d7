//! Server-to-server notifications from the gateway.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ServiceError};

/// Events meaning the funds are confirmed.
pub const FUNDS_CONFIRMED_EVENTS: [&str; 2] = ["payment.captured", "order.paid"];

#[derive(Deserialize, Debug)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Deserialize, Debug, Default)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<Entity<PaymentEntity>>,
    #[serde(default)]
    pub order: Option<Entity<OrderEntity>>,
}

#[derive(Deserialize, Debug)]
pub struct Entity<T> {
    pub entity: T,
}

#[derive(Deserialize, Debug)]
pub struct PaymentEntity {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct OrderEntity {
    pub id: String,
}

/// Gateway references pulled out of a funds-confirmed event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedPayment {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
}

/// Acknowledgement body sent back to the gateway.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct WebhookAck {
    pub status: &'static str,
}

impl WebhookAck {
    pub const OK: WebhookAck = WebhookAck { status: "ok" };
    pub const IGNORED: WebhookAck = WebhookAck { status: "ignored" };
    pub const ALREADY_PROCESSED: WebhookAck = WebhookAck {
        status: "already_processed",
    };
}

pub fn parse_event(body: &[u8]) -> Result<WebhookEvent> {
    serde_json::from_slice(body)
        .map_err(|e| ServiceError::Validation(format!("invalid webhook payload: {e}")))
}

impl WebhookEvent {
    pub fn confirms_funds(&self) -> bool {
        FUNDS_CONFIRMED_EVENTS.contains(&self.event.as_str())
    }

    /// `Ok(None)` for events that carry no state change. A funds event without the references
    /// it needs is malformed.
    pub fn captured_payment(&self) -> Result<Option<CapturedPayment>> {
        if !self.confirms_funds() {
            return Ok(None);
        }
        let payment = self.payload.payment.as_ref().map(|p| &p.entity).ok_or_else(|| {
            ServiceError::Validation(format!("{} event without payment entity", self.event))
        })?;
        let gateway_order_id = payment
            .order_id
            .clone()
            .or_else(|| self.payload.order.as_ref().map(|o| o.entity.id.clone()))
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ServiceError::Validation(format!("{} event without order id", self.event))
            })?;
        if payment.id.is_empty() {
            return Err(ServiceError::Validation(format!(
                "{} event without payment id",
                self.event
            )));
        }
        Ok(Some(CapturedPayment {
            gateway_order_id,
            gateway_payment_id: payment.id.clone(),
        }))
    }
}
