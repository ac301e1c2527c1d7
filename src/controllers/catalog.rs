use actix_web::{get, web, HttpResponse, Responder};
use serde::Deserialize;

use crate::catalog::{get_all_categories, get_offers, get_product_by_id, get_products, ProductView};
use crate::errors::Result;
use crate::DbPool;

#[derive(Deserialize)]
struct ProductFilter {
    category: Option<String>,
}

fn views(products: Vec<crate::models::Product>) -> Vec<ProductView> {
    products.into_iter().map(ProductView::from).collect()
}

#[get("/categories")]
pub async fn list_categories(pool: web::Data<DbPool>) -> Result<impl Responder> {
    let all_categories = web::block(move || {
        let mut conn = pool.get()?;
        get_all_categories(&mut conn)
    })
    .await??;
    Ok(HttpResponse::Ok().json(all_categories))
}

#[get("/products")]
pub async fn list_products(
    pool: web::Data<DbPool>,
    filter: web::Query<ProductFilter>,
) -> Result<impl Responder> {
    let category = filter.into_inner().category.filter(|slug| !slug.is_empty());
    let found = web::block(move || {
        let mut conn = pool.get()?;
        get_products(&mut conn, category.as_deref())
    })
    .await??;
    Ok(HttpResponse::Ok().json(views(found)))
}

#[get("/products/{product_id}")]
pub async fn show_product(pool: web::Data<DbPool>, product_id: web::Path<i32>) -> Result<impl Responder> {
    let product = web::block(move || {
        let mut conn = pool.get()?;
        get_product_by_id(&mut conn, *product_id)
    })
    .await??;
    Ok(HttpResponse::Ok().json(ProductView::from(product)))
}

#[get("/offers")]
pub async fn list_offers(pool: web::Data<DbPool>) -> Result<impl Responder> {
    let offers = web::block(move || {
        let mut conn = pool.get()?;
        get_offers(&mut conn)
    })
    .await??;
    Ok(HttpResponse::Ok().json(views(offers)))
}
