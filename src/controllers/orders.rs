use actix_web::http::header::{self, ContentDisposition, DispositionParam, DispositionType};
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use super::redirect_with_flash;
use crate::cache::CartCountCache;
use crate::errors::{Result, ServiceError};
use crate::identity::{wants_json, CurrentUser};
use crate::lifecycle::{cancel_order, invoice, track_order};
use crate::models::Order;
use crate::orders::{
    get_orders_for_user, order_detail, place_order, preview, validate_quantity, CheckoutForm,
    NextStep, PlacedOrder, PurchaseSource,
};
use crate::DbPool;

#[derive(Deserialize)]
struct QuantityQuery {
    quantity: Option<i32>,
}

#[derive(Deserialize)]
struct TrackQuery {
    order_id: Option<i32>,
}

#[derive(Serialize)]
struct Placement {
    ok: bool,
    redirect: String,
    #[serde(flatten)]
    placed: PlacedOrder,
}

#[derive(Serialize)]
struct Cancellation {
    ok: bool,
    message: String,
    order: Order,
}

fn placement_response(placed: PlacedOrder) -> HttpResponse {
    let redirect = match placed.next {
        NextStep::Payment => format!("/payment/create/{}", placed.order.id),
        NextStep::OrderSuccess => format!("/order/success/{}", placed.order.id),
    };
    HttpResponse::Created()
        .insert_header((header::LOCATION, redirect.clone()))
        .json(Placement {
            ok: true,
            redirect,
            placed,
        })
}

#[get("/buy/{product_id}")]
pub async fn buy_preview(
    pool: web::Data<DbPool>,
    user: CurrentUser,
    product_id: web::Path<i32>,
    query: web::Query<QuantityQuery>,
) -> Result<impl Responder> {
    let source = PurchaseSource::Product {
        product_id: product_id.into_inner(),
        quantity: validate_quantity(query.quantity)?,
    };
    let billing = web::block(move || {
        let mut conn = pool.get()?;
        preview(&mut conn, user.id, source)
    })
    .await??;
    Ok(HttpResponse::Ok().json(billing))
}

#[post("/buy/{product_id}")]
pub async fn buy_now(
    pool: web::Data<DbPool>,
    user: CurrentUser,
    product_id: web::Path<i32>,
    form: web::Form<CheckoutForm>,
) -> Result<impl Responder> {
    let form = form.into_inner();
    let source = PurchaseSource::Product {
        product_id: product_id.into_inner(),
        quantity: validate_quantity(form.quantity)?,
    };
    let placed = web::block(move || {
        let mut conn = pool.get()?;
        place_order(&mut conn, user.id, source, &form)
    })
    .await??;
    Ok(placement_response(placed))
}

#[get("/checkout")]
pub async fn checkout_preview(pool: web::Data<DbPool>, user: CurrentUser) -> Result<impl Responder> {
    let billing = web::block(move || {
        let mut conn = pool.get()?;
        preview(&mut conn, user.id, PurchaseSource::Cart)
    })
    .await??;
    Ok(HttpResponse::Ok().json(billing))
}

#[post("/checkout")]
pub async fn checkout(
    pool: web::Data<DbPool>,
    cache: web::Data<CartCountCache>,
    user: CurrentUser,
    form: web::Form<CheckoutForm>,
) -> Result<impl Responder> {
    let form = form.into_inner();
    let placed = web::block(move || {
        let mut conn = pool.get()?;
        place_order(&mut conn, user.id, PurchaseSource::Cart, &form)
    })
    .await??;
    cache.invalidate(user.id);
    Ok(placement_response(placed))
}

#[get("/orders")]
pub async fn list_orders(pool: web::Data<DbPool>, user: CurrentUser) -> Result<impl Responder> {
    let user_orders = web::block(move || {
        let mut conn = pool.get()?;
        get_orders_for_user(&mut conn, user.id)
    })
    .await??;
    Ok(HttpResponse::Ok().json(user_orders))
}

#[get("/order/success/{order_id}")]
pub async fn order_success(
    pool: web::Data<DbPool>,
    user: CurrentUser,
    order_id: web::Path<i32>,
) -> Result<impl Responder> {
    let detail = web::block(move || {
        let mut conn = pool.get()?;
        order_detail(&mut conn, user.id, *order_id)
    })
    .await??;
    Ok(HttpResponse::Ok().json(detail))
}

#[post("/order/cancel/{order_id}")]
pub async fn cancel(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    user: CurrentUser,
    order_id: web::Path<i32>,
) -> Result<impl Responder> {
    let order = web::block(move || {
        let mut conn = pool.get()?;
        cancel_order(&mut conn, user.id, *order_id)
    })
    .await??;
    let message = format!("Order #{} cancelled", order.id);
    if wants_json(&req) {
        return Ok(HttpResponse::Ok().json(Cancellation {
            ok: true,
            message,
            order,
        }));
    }
    Ok(redirect_with_flash("/orders", &message))
}

#[get("/order/track")]
pub async fn track(
    pool: web::Data<DbPool>,
    user: CurrentUser,
    query: web::Query<TrackQuery>,
) -> Result<impl Responder> {
    let order_id = query
        .order_id
        .ok_or_else(|| ServiceError::Validation("order_id is required".to_string()))?;
    let tracking = web::block(move || {
        let mut conn = pool.get()?;
        track_order(&mut conn, user.id, order_id)
    })
    .await??;
    Ok(HttpResponse::Ok().json(tracking))
}

#[get("/order/invoice/{order_id}")]
pub async fn download_invoice(
    pool: web::Data<DbPool>,
    user: CurrentUser,
    order_id: web::Path<i32>,
) -> Result<impl Responder> {
    let order_id = order_id.into_inner();
    let text = web::block(move || {
        let mut conn = pool.get()?;
        invoice(&mut conn, user.id, order_id)
    })
    .await??;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(format!("invoice_{order_id}.txt"))],
        })
        .body(text))
}
