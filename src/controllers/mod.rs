pub mod cart;
pub mod catalog;
pub mod orders;
pub mod payments;
pub mod profile;

use actix_web::cookie::Cookie;
use actix_web::http::header;
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use serde_json::json;

pub const FLASH_COOKIE: &str = "flash";

/// Registers every storefront route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(catalog::list_categories)
        .service(catalog::list_products)
        .service(catalog::show_product)
        .service(catalog::list_offers)
        .service(cart::add_item)
        .service(cart::remove_item)
        .service(cart::cart_count)
        .service(cart::show_cart)
        .service(cart::toggle_wishlist_item)
        .service(cart::show_wishlist)
        .service(orders::buy_preview)
        .service(orders::buy_now)
        .service(orders::checkout_preview)
        .service(orders::checkout)
        .service(orders::list_orders)
        .service(orders::order_success)
        .service(orders::cancel)
        .service(orders::track)
        .service(orders::download_invoice)
        .service(payments::create_payment)
        .service(payments::verify_payment)
        .service(payments::razorpay_webhook)
        .service(profile::show_profile)
        .service(profile::edit_profile);
}

#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// 303 back to a page, carrying a one-shot message for it to display.
pub fn redirect_with_flash(location: &str, message: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location.to_owned()))
        .cookie(Cookie::build(FLASH_COOKIE, message.replace(' ', "+")).path("/").finish())
        .finish()
}

/// The page the request came from, if it was one of ours.
pub fn back_or(req: &HttpRequest, fallback: &str) -> String {
    req.headers()
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .filter(|referer| {
            referer.starts_with('/') && !referer.starts_with("//") && !referer.starts_with("/\\")
        })
        .unwrap_or(fallback)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn flash_redirect_is_see_other() {
        let response = redirect_with_flash("/cart", "Added to cart");
        assert_eq!(response.status(), actix_web::http::StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/cart");
        let flash = response.cookies().find(|c| c.name() == FLASH_COOKIE).unwrap();
        assert_eq!(flash.value(), "Added+to+cart");
    }

    #[test]
    fn only_relative_referers_are_followed() {
        let req = TestRequest::default()
            .insert_header((header::REFERER, "/products/3"))
            .to_http_request();
        assert_eq!(back_or(&req, "/cart"), "/products/3");

        let req = TestRequest::default()
            .insert_header((header::REFERER, "https://evil.example/"))
            .to_http_request();
        assert_eq!(back_or(&req, "/cart"), "/cart");
    }

    #[test]
    fn protocol_relative_referers_are_not_followed() {
        for referer in ["//evil.example/", "//evil.example/cart", "/\\evil.example"] {
            let req = TestRequest::default()
                .insert_header((header::REFERER, referer))
                .to_http_request();
            assert_eq!(back_or(&req, "/wishlist"), "/wishlist");
        }
    }
}
