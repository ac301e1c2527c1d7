use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use serde::Serialize;

use super::{back_or, redirect_with_flash};
use crate::cache::CartCountCache;
use crate::cart::{
    add_to_cart, cart_summary, cart_view, get_cart_lines, get_wishlist, remove_from_cart,
    toggle_wishlist, CartSummary,
};
use crate::catalog::ProductView;
use crate::errors::Result;
use crate::identity::{wants_json, CurrentUser};
use crate::DbPool;

#[derive(Serialize)]
struct CartMutation {
    ok: bool,
    message: &'static str,
    cart: CartSummary,
}

#[derive(Serialize)]
struct CartCount {
    count: i64,
}

fn cart_response(req: &HttpRequest, message: &'static str, cart: CartSummary) -> HttpResponse {
    if wants_json(req) {
        HttpResponse::Ok().json(CartMutation {
            ok: true,
            message,
            cart,
        })
    } else {
        redirect_with_flash(&back_or(req, "/cart"), message)
    }
}

#[post("/cart/add/{product_id}")]
pub async fn add_item(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    cache: web::Data<CartCountCache>,
    user: CurrentUser,
    product_id: web::Path<i32>,
) -> Result<impl Responder> {
    let product_id = product_id.into_inner();
    let summary = web::block(move || {
        let mut conn = pool.get()?;
        add_to_cart(&mut conn, user.id, product_id)?;
        cart_summary(&mut conn, user.id)
    })
    .await??;
    cache.invalidate(user.id);
    Ok(cart_response(&req, "Added to cart", summary))
}

#[post("/cart/remove/{product_id}")]
pub async fn remove_item(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    cache: web::Data<CartCountCache>,
    user: CurrentUser,
    product_id: web::Path<i32>,
) -> Result<impl Responder> {
    let product_id = product_id.into_inner();
    let summary = web::block(move || {
        let mut conn = pool.get()?;
        remove_from_cart(&mut conn, user.id, product_id)?;
        cart_summary(&mut conn, user.id)
    })
    .await??;
    cache.invalidate(user.id);
    Ok(cart_response(&req, "Removed from cart", summary))
}

#[get("/cart")]
pub async fn show_cart(pool: web::Data<DbPool>, user: CurrentUser) -> Result<impl Responder> {
    let lines = web::block(move || {
        let mut conn = pool.get()?;
        get_cart_lines(&mut conn, user.id)
    })
    .await??;
    Ok(HttpResponse::Ok().json(cart_view(lines)))
}

/// Header badge. Served from the cache when present, recomputed from the database otherwise.
#[get("/cart/count")]
pub async fn cart_count(
    pool: web::Data<DbPool>,
    cache: web::Data<CartCountCache>,
    user: CurrentUser,
) -> Result<impl Responder> {
    if let Some(count) = cache.fetch(user.id) {
        return Ok(HttpResponse::Ok().json(CartCount { count }));
    }
    let summary = web::block(move || {
        let mut conn = pool.get()?;
        cart_summary(&mut conn, user.id)
    })
    .await??;
    cache.store(user.id, summary.count);
    Ok(HttpResponse::Ok().json(CartCount {
        count: summary.count,
    }))
}

#[derive(Serialize)]
struct ToggleResponse {
    status: &'static str,
}

#[post("/wishlist/toggle/{product_id}")]
pub async fn toggle_wishlist_item(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    user: CurrentUser,
    product_id: web::Path<i32>,
) -> Result<impl Responder> {
    let product_id = product_id.into_inner();
    let toggled = web::block(move || {
        let mut conn = pool.get()?;
        toggle_wishlist(&mut conn, user.id, product_id)
    })
    .await??;
    if wants_json(&req) {
        return Ok(HttpResponse::Ok().json(ToggleResponse {
            status: toggled.as_str(),
        }));
    }
    let message = match toggled {
        crate::cart::WishlistToggle::Added => "Added to wishlist",
        crate::cart::WishlistToggle::Removed => "Removed from wishlist",
    };
    Ok(redirect_with_flash(&back_or(&req, "/wishlist"), message))
}

#[get("/wishlist")]
pub async fn show_wishlist(pool: web::Data<DbPool>, user: CurrentUser) -> Result<impl Responder> {
    let wishlisted = web::block(move || {
        let mut conn = pool.get()?;
        get_wishlist(&mut conn, user.id)
    })
    .await??;
    let wishlisted: Vec<ProductView> = wishlisted.into_iter().map(ProductView::from).collect();
    Ok(HttpResponse::Ok().json(wishlisted))
}
