use actix_web::{post, web, HttpRequest, HttpResponse, Responder};

use crate::errors::Result;
use crate::identity::CurrentUser;
use crate::payments::reconcile::Settlement;
use crate::payments::{
    confirm_payment, receive_webhook, start_payment, CallbackForm, CallbackResponse,
    PaymentGateway,
};
use crate::DbPool;

pub const SIGNATURE_HEADER: &str = "X-Razorpay-Signature";

#[post("/payment/create/{order_id}")]
pub async fn create_payment(
    pool: web::Data<DbPool>,
    gateway: web::Data<PaymentGateway>,
    user: CurrentUser,
    order_id: web::Path<i32>,
) -> Result<impl Responder> {
    let options = start_payment(&pool, &gateway, user.id, order_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(options))
}

#[post("/payment/verify")]
pub async fn verify_payment(
    pool: web::Data<DbPool>,
    gateway: web::Data<PaymentGateway>,
    form: web::Form<CallbackForm>,
) -> Result<impl Responder> {
    let settlement = confirm_payment(&pool, &gateway, &form).await?;
    let message = match settlement {
        Settlement::Applied => "Payment successful",
        Settlement::AlreadySettled => "Payment already recorded",
        Settlement::SettledByOtherAttempt => "Order was already paid",
    };
    Ok(HttpResponse::Ok().json(CallbackResponse {
        ok: true,
        message: message.to_string(),
    }))
}

/// Authenticated by the body signature alone.
#[post("/webhook/razorpay")]
pub async fn razorpay_webhook(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    gateway: web::Data<PaymentGateway>,
    body: web::Bytes,
) -> Result<impl Responder> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let ack = receive_webhook(&pool, &gateway, &body, signature).await?;
    Ok(HttpResponse::Ok().json(ack))
}
