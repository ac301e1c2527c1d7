//! Payment gateway adapter: remote order creation, checkout callback verification and webhook
//! reconciliation.

pub mod gateway;
pub mod reconcile;
pub mod signature;
pub mod webhook;

use actix_web::web;
use bigdecimal::Zero;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::accounts::get_user_by_id;
use crate::billing::to_minor_units;
use crate::config::GatewayConfig;
use crate::errors::{Result, ServiceError};
use crate::insertables::NewPayment;
use crate::models::{OrderStatus, Payment, PaymentAttemptStatus, PaymentStatus};
use crate::orders::{detail_from_lines, get_order_for_user, get_order_lines, hydrate_items_from_cart};
use crate::schema::{orders, payments};
use crate::DbPool;

use self::gateway::{CreateOrderRequest, GatewayClient, RazorpayClient, RemoteOrder};
use self::reconcile::{settle_payment, mark_attempt_failed, PaymentConfirmation, Settlement};
use self::webhook::{parse_event, CapturedPayment, WebhookAck};

const THEME_COLOR: &str = "#b57a50";

/// Local order data needed to open a gateway order.
#[derive(Clone, Debug, PartialEq)]
pub struct PaymentIntent {
    pub order_id: i32,
    /// Minor units.
    pub amount: i64,
    pub description: String,
    pub customer_name: String,
    pub customer_email: String,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct Prefill {
    pub name: String,
    pub email: String,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct Theme {
    pub color: &'static str,
}

/// Everything the client-side checkout widget needs.
#[derive(Serialize, Debug, PartialEq)]
pub struct CheckoutOptions {
    pub ok: bool,
    pub key: String,
    pub amount: i64,
    pub currency: String,
    pub name: String,
    pub description: String,
    pub order_id: String,
    pub prefill: Prefill,
    pub notes: BTreeMap<String, String>,
    pub theme: Theme,
}

/// Fields posted by the checkout widget once the shopper completes payment.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct CallbackForm {
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
}

impl CallbackForm {
    /// Order reference, payment reference and signature, all non-blank.
    pub fn fields(&self) -> Result<(&str, &str, &str)> {
        Ok((
            required(&self.razorpay_order_id)?,
            required(&self.razorpay_payment_id)?,
            required(&self.razorpay_signature)?,
        ))
    }
}

fn required(value: &Option<String>) -> Result<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ServiceError::Validation("Missing payment details".to_string()))
}

#[derive(Serialize, Debug, PartialEq)]
pub struct CallbackResponse {
    pub ok: bool,
    pub message: String,
}

fn notes_for(order_id: i32) -> BTreeMap<String, String> {
    BTreeMap::from([("order_id".to_string(), order_id.to_string())])
}

/// Gateway adapter. Configuration is fixed at construction; nothing is read from the
/// environment per call.
#[derive(Clone)]
pub struct PaymentGateway {
    config: Arc<GatewayConfig>,
    client: Arc<dyn GatewayClient>,
}

impl PaymentGateway {
    pub fn new(config: GatewayConfig, client: Arc<dyn GatewayClient>) -> Self {
        PaymentGateway {
            config: Arc::new(config),
            client,
        }
    }

    /// Adapter backed by the gateway's REST API.
    pub fn from_config(config: GatewayConfig) -> std::result::Result<Self, reqwest::Error> {
        let client = RazorpayClient::new(&config)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.config.credentials().is_some()
    }

    /// Opens an order at the gateway. Fails closed without a network call when credentials are
    /// missing.
    pub async fn create_remote_order(&self, intent: &PaymentIntent) -> Result<RemoteOrder> {
        let credentials = self
            .config
            .credentials()
            .ok_or(ServiceError::GatewayNotConfigured)?;
        let request = CreateOrderRequest {
            amount: intent.amount,
            currency: self.config.currency.clone(),
            receipt: format!("order_{}", intent.order_id),
            payment_capture: 1,
            notes: notes_for(intent.order_id),
        };
        match self.client.create_order(credentials, &request).await {
            Ok(remote) => {
                tracing::info!(
                    order_id = intent.order_id,
                    gateway_order_id = %remote.id,
                    amount = intent.amount,
                    "gateway order created"
                );
                Ok(remote)
            }
            Err(err) => {
                tracing::error!(order_id = intent.order_id, error = %err, "gateway order failed");
                Err(err.into())
            }
        }
    }

    pub fn checkout_options(&self, intent: &PaymentIntent, remote: &RemoteOrder) -> CheckoutOptions {
        CheckoutOptions {
            ok: true,
            key: self.config.key_id.clone().unwrap_or_default(),
            amount: intent.amount,
            currency: self.config.currency.clone(),
            name: self.config.merchant_name.clone(),
            description: intent.description.clone(),
            order_id: remote.id.clone(),
            prefill: Prefill {
                name: intent.customer_name.clone(),
                email: intent.customer_email.clone(),
            },
            notes: notes_for(intent.order_id),
            theme: Theme { color: THEME_COLOR },
        }
    }

    /// Checks `HMAC(order_ref|payment_ref, key_secret)`.
    pub fn verify_payment_signature(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> Result<()> {
        let secret = self
            .config
            .key_secret
            .as_deref()
            .ok_or(ServiceError::GatewayNotConfigured)?;
        let message = signature::checkout_message(gateway_order_id, gateway_payment_id);
        if signature::verify(secret, message.as_bytes(), signature) {
            Ok(())
        } else {
            Err(ServiceError::SignatureMismatch)
        }
    }

    /// Checks `HMAC(raw_body, webhook_secret)` against the signature header.
    pub fn verify_webhook_signature(&self, body: &[u8], signature: Option<&str>) -> Result<()> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ServiceError::Validation("missing webhook signature".to_string()))?;
        if body.is_empty() {
            return Err(ServiceError::Validation("empty webhook body".to_string()));
        }
        let secret = self
            .config
            .webhook_secret
            .as_deref()
            .ok_or_else(|| ServiceError::Validation("webhook secret not configured".to_string()))?;
        if signature::verify(secret, body, signature) {
            Ok(())
        } else {
            Err(ServiceError::SignatureMismatch)
        }
    }
}

/// Loads the order for payment, recovering its lines from the cart when it has none.
pub fn prepare_intent(conn: &mut PgConnection, user_id: i32, order_id: i32) -> Result<PaymentIntent> {
    let order = get_order_for_user(conn, user_id, order_id)?;
    if order.payment_status == PaymentStatus::Paid {
        return Err(ServiceError::InvalidTransition(format!(
            "Order #{} is already paid",
            order.id
        )));
    }
    if order.status == OrderStatus::Cancelled {
        return Err(ServiceError::InvalidTransition(format!(
            "Order #{} is cancelled",
            order.id
        )));
    }

    let mut total = order.total_amount.clone();
    if hydrate_items_from_cart(conn, &order)? > 0 && total.is_zero() {
        let detail = detail_from_lines(order.clone(), get_order_lines(conn, order.id)?);
        total = detail.billing.grand_total;
        diesel::update(orders::table.find(order.id))
            .set(orders::total_amount.eq(&total))
            .execute(conn)?;
    }

    let user = get_user_by_id(conn, user_id)?;
    Ok(PaymentIntent {
        order_id: order.id,
        amount: to_minor_units(&total),
        description: format!("Order #{}", order.id),
        customer_name: user.display_name(),
        customer_email: user.email.clone(),
    })
}

/// Stores the attempt opened at the gateway, mirroring the gateway's status.
pub fn record_payment(
    conn: &mut PgConnection,
    intent: &PaymentIntent,
    remote: &RemoteOrder,
) -> Result<Payment> {
    let status = remote
        .status
        .as_deref()
        .and_then(|s| s.parse().ok())
        .unwrap_or(PaymentAttemptStatus::Created);
    let payment = diesel::insert_into(payments::table)
        .values(&NewPayment {
            order_id: intent.order_id,
            gateway_order_id: remote.id.clone(),
            amount: intent.amount,
            status,
        })
        .returning(Payment::as_returning())
        .get_result(conn)?;
    Ok(payment)
}

/// Full `createRemoteOrder` flow: prepare locally, call the gateway, record the attempt.
pub async fn start_payment(
    pool: &DbPool,
    gateway: &PaymentGateway,
    user_id: i32,
    order_id: i32,
) -> Result<CheckoutOptions> {
    if !gateway.is_configured() {
        tracing::warn!(order_id, "payment requested but gateway is not configured");
        return Err(ServiceError::GatewayNotConfigured);
    }

    let prepare_pool = pool.clone();
    let intent = web::block(move || {
        let mut conn = prepare_pool.get()?;
        prepare_intent(&mut conn, user_id, order_id)
    })
    .await??;

    let remote = gateway.create_remote_order(&intent).await?;

    let record_pool = pool.clone();
    let record_intent = intent.clone();
    let record_remote = remote.clone();
    web::block(move || {
        let mut conn = record_pool.get()?;
        record_payment(&mut conn, &record_intent, &record_remote)
    })
    .await??;

    Ok(gateway.checkout_options(&intent, &remote))
}

/// Callback fields that passed the local preconditions.
#[derive(Clone, Debug)]
pub struct CheckedCallback {
    gateway_order_id: String,
    gateway_payment_id: String,
    signature: String,
}

/// Preconditions that need neither the database nor the signature: every field present and a
/// configured gateway.
pub fn check_callback(gateway: &PaymentGateway, form: &CallbackForm) -> Result<CheckedCallback> {
    let (gateway_order_id, gateway_payment_id, signature) = form.fields()?;
    if !gateway.is_configured() {
        return Err(ServiceError::GatewayNotConfigured);
    }
    Ok(CheckedCallback {
        gateway_order_id: gateway_order_id.to_owned(),
        gateway_payment_id: gateway_payment_id.to_owned(),
        signature: signature.to_owned(),
    })
}

/// Verifies the checkout signature and settles. A bad signature is recorded against the
/// attempt before the request is rejected.
fn settle_callback(
    conn: &mut PgConnection,
    gateway: &PaymentGateway,
    callback: &CheckedCallback,
) -> Result<Settlement> {
    let gateway_order_id = callback.gateway_order_id.as_str();
    let gateway_payment_id = callback.gateway_payment_id.as_str();
    let confirmation = PaymentConfirmation {
        gateway_order_id,
        gateway_payment_id,
        signature: Some(callback.signature.as_str()),
    };
    if let Err(err) =
        gateway.verify_payment_signature(gateway_order_id, gateway_payment_id, &callback.signature)
    {
        if matches!(err, ServiceError::SignatureMismatch) {
            let marked = mark_attempt_failed(conn, &confirmation)?;
            tracing::warn!(
                gateway_order_id,
                gateway_payment_id,
                marked,
                "checkout signature mismatch"
            );
        }
        return Err(err);
    }

    match settle_payment(conn, &confirmation)? {
        Some((_, settlement)) => Ok(settlement),
        None => {
            tracing::error!(gateway_order_id, "verified payment has no local payment row");
            Err(ServiceError::not_found("Payment"))
        }
    }
}

/// Synchronous checkout callback on an open connection.
pub fn verify_callback(
    conn: &mut PgConnection,
    gateway: &PaymentGateway,
    form: &CallbackForm,
) -> Result<Settlement> {
    let callback = check_callback(gateway, form)?;
    settle_callback(conn, gateway, &callback)
}

/// Checkout callback as served over HTTP: malformed or unconfigured requests are refused
/// before a connection is taken from the pool.
pub async fn confirm_payment(
    pool: &DbPool,
    gateway: &PaymentGateway,
    form: &CallbackForm,
) -> Result<Settlement> {
    let callback = check_callback(gateway, form)?;
    let pool = pool.clone();
    let gateway = gateway.clone();
    web::block(move || {
        let mut conn = pool.get()?;
        settle_callback(&mut conn, &gateway, &callback)
    })
    .await?
}

/// Signature and payload checks. `Ok(None)` for authentic events that change nothing.
pub fn authenticate_webhook(
    gateway: &PaymentGateway,
    body: &[u8],
    signature: Option<&str>,
) -> Result<Option<CapturedPayment>> {
    if let Err(err) = gateway.verify_webhook_signature(body, signature) {
        tracing::warn!(error = %err, "webhook rejected");
        return Err(err);
    }
    let event = parse_event(body)?;
    let captured = event.captured_payment()?;
    if captured.is_none() {
        tracing::debug!(event = %event.event, "webhook event ignored");
    }
    Ok(captured)
}

fn settle_webhook(conn: &mut PgConnection, captured: &CapturedPayment) -> Result<WebhookAck> {
    let confirmation = PaymentConfirmation {
        gateway_order_id: &captured.gateway_order_id,
        gateway_payment_id: &captured.gateway_payment_id,
        signature: None,
    };
    match settle_payment(conn, &confirmation)? {
        None => {
            tracing::info!(
                gateway_order_id = %captured.gateway_order_id,
                "webhook for unknown gateway order ignored"
            );
            Ok(WebhookAck::IGNORED)
        }
        Some((_, Settlement::AlreadySettled)) => Ok(WebhookAck::ALREADY_PROCESSED),
        Some(_) => Ok(WebhookAck::OK),
    }
}

/// Webhook reconciliation on an open connection. Signature and payload are checked before any
/// row is touched.
pub fn handle_webhook(
    conn: &mut PgConnection,
    gateway: &PaymentGateway,
    body: &[u8],
    signature: Option<&str>,
) -> Result<WebhookAck> {
    match authenticate_webhook(gateway, body, signature)? {
        Some(captured) => settle_webhook(conn, &captured),
        None => Ok(WebhookAck::IGNORED),
    }
}

/// Webhook as served over HTTP; only authentic funds events reach the pool.
pub async fn receive_webhook(
    pool: &DbPool,
    gateway: &PaymentGateway,
    body: &[u8],
    signature: Option<&str>,
) -> Result<WebhookAck> {
    let Some(captured) = authenticate_webhook(gateway, body, signature)? else {
        return Ok(WebhookAck::IGNORED);
    };
    let pool = pool.clone();
    web::block(move || {
        let mut conn = pool.get()?;
        settle_webhook(&mut conn, &captured)
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::gateway::GatewayError;
    use super::*;
    use crate::config::Credentials;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingClient {
        calls: AtomicUsize,
        reply: std::result::Result<RemoteOrder, GatewayError>,
    }

    impl RecordingClient {
        fn replying(reply: std::result::Result<RemoteOrder, GatewayError>) -> Arc<Self> {
            Arc::new(RecordingClient {
                calls: AtomicUsize::new(0),
                reply,
            })
        }
    }

    #[async_trait]
    impl GatewayClient for RecordingClient {
        async fn create_order(
            &self,
            credentials: Credentials<'_>,
            request: &CreateOrderRequest,
        ) -> std::result::Result<RemoteOrder, GatewayError> {
            assert_eq!(credentials.key_id, "rzp_test_key");
            assert_eq!(request.payment_capture, 1);
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    fn configured() -> GatewayConfig {
        GatewayConfig {
            key_id: Some("rzp_test_key".to_string()),
            key_secret: Some("key_secret".to_string()),
            webhook_secret: Some("webhook_secret".to_string()),
            ..GatewayConfig::default()
        }
    }

    fn intent() -> PaymentIntent {
        PaymentIntent {
            order_id: 7,
            amount: 126_500,
            description: "Order #7".to_string(),
            customer_name: "Asha Rao".to_string(),
            customer_email: "asha@example.com".to_string(),
        }
    }

    fn remote() -> RemoteOrder {
        RemoteOrder {
            id: "order_EKwxwAgItmmXdp".to_string(),
            status: Some("created".to_string()),
            amount: Some(126_500),
            currency: Some("INR".to_string()),
        }
    }

    #[actix_web::test]
    async fn missing_credentials_never_call_the_gateway() {
        let client = RecordingClient::replying(Ok(remote()));
        let gateway = PaymentGateway::new(GatewayConfig::default(), client.clone());

        let err = gateway.create_remote_order(&intent()).await.unwrap_err();
        assert!(matches!(err, ServiceError::GatewayNotConfigured));
        assert!(!err.body().ok);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn configured_gateway_returns_widget_options() {
        let client = RecordingClient::replying(Ok(remote()));
        let gateway = PaymentGateway::new(configured(), client.clone());

        let created = gateway.create_remote_order(&intent()).await.unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);

        let options = gateway.checkout_options(&intent(), &created);
        assert!(options.ok);
        assert_eq!(options.key, "rzp_test_key");
        assert_eq!(options.amount, 126_500);
        assert_eq!(options.currency, "INR");
        assert_eq!(options.order_id, "order_EKwxwAgItmmXdp");
        assert_eq!(options.notes.get("order_id").map(String::as_str), Some("7"));
        assert_eq!(options.prefill.email, "asha@example.com");
    }

    #[actix_web::test]
    async fn gateway_failures_are_classified() {
        let rejected = RecordingClient::replying(Err(GatewayError::Rejected {
            status: 401,
            message: "Authentication failed".to_string(),
        }));
        let err = PaymentGateway::new(configured(), rejected)
            .create_remote_order(&intent())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::GatewayBadRequest { .. }));

        let timed_out =
            RecordingClient::replying(Err(GatewayError::Unreachable("request timed out".into())));
        let err = PaymentGateway::new(configured(), timed_out)
            .create_remote_order(&intent())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::GatewayUnavailable { .. }));
    }

    #[test]
    fn payment_signature_uses_key_secret() {
        let gateway = PaymentGateway::new(configured(), RecordingClient::replying(Ok(remote())));
        let good = signature::sign("key_secret", b"order_1|pay_1");
        assert!(gateway.verify_payment_signature("order_1", "pay_1", &good).is_ok());
        assert!(matches!(
            gateway.verify_payment_signature("order_1", "pay_2", &good),
            Err(ServiceError::SignatureMismatch)
        ));
    }

    #[test]
    fn webhook_signature_preconditions() {
        let body = br#"{"event":"payment.captured"}"#;
        let good = signature::sign("webhook_secret", body);
        let gateway = PaymentGateway::new(configured(), RecordingClient::replying(Ok(remote())));

        assert!(gateway.verify_webhook_signature(body, Some(&good)).is_ok());
        assert!(matches!(
            gateway.verify_webhook_signature(body, None),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            gateway.verify_webhook_signature(b"", Some(&good)),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            gateway.verify_webhook_signature(body, Some("deadbeef")),
            Err(ServiceError::SignatureMismatch)
        ));

        let unconfigured =
            PaymentGateway::new(GatewayConfig::default(), RecordingClient::replying(Ok(remote())));
        assert!(matches!(
            unconfigured.verify_webhook_signature(body, Some(&good)),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn callback_preconditions_are_checked_without_a_connection() {
        let gateway = PaymentGateway::new(configured(), RecordingClient::replying(Ok(remote())));
        let form = CallbackForm {
            razorpay_order_id: Some("order_1".to_string()),
            razorpay_payment_id: Some(" ".to_string()),
            razorpay_signature: Some("ab".to_string()),
        };
        assert!(matches!(
            check_callback(&gateway, &form),
            Err(ServiceError::Validation(_))
        ));

        let form = CallbackForm {
            razorpay_payment_id: Some("pay_1".to_string()),
            ..form
        };
        let checked = check_callback(&gateway, &form).unwrap();
        assert_eq!(checked.gateway_payment_id, "pay_1");

        let unconfigured =
            PaymentGateway::new(GatewayConfig::default(), RecordingClient::replying(Ok(remote())));
        assert!(matches!(
            check_callback(&unconfigured, &form),
            Err(ServiceError::GatewayNotConfigured)
        ));
    }

    #[test]
    fn only_authentic_funds_events_need_settling() {
        let gateway = PaymentGateway::new(configured(), RecordingClient::replying(Ok(remote())));
        let captured = br#"{"event":"payment.captured","payload":{"payment":{"entity":{"id":"pay_1","order_id":"order_1"}}}}"#;
        let authorized = br#"{"event":"payment.authorized","payload":{}}"#;

        let settled = authenticate_webhook(
            &gateway,
            captured,
            Some(&signature::sign("webhook_secret", captured)),
        )
        .unwrap();
        assert_eq!(
            settled.map(|c| c.gateway_payment_id),
            Some("pay_1".to_string())
        );
        assert_eq!(
            authenticate_webhook(
                &gateway,
                authorized,
                Some(&signature::sign("webhook_secret", authorized)),
            )
            .unwrap(),
            None
        );
        assert!(matches!(
            authenticate_webhook(&gateway, captured, Some(&signature::sign("other", captured))),
            Err(ServiceError::SignatureMismatch)
        ));
    }
}
