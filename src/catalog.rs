use bigdecimal::{BigDecimal, Zero};
use diesel::prelude::*;
use serde::Serialize;

use crate::errors::{Result, ServiceError};
use crate::models::{Category, Product};
use crate::schema::{categories, products};

const OFFERS_LIMIT: i64 = 24;

/// `price * (100 - discount) / 100`, never negative. Discounts outside 0..=100 are clamped.
pub fn discounted_price(price: &BigDecimal, discount: i32) -> BigDecimal {
    let discount = discount.clamp(0, 100);
    if discount == 0 {
        return price.clone();
    }
    let reduced = price * BigDecimal::from(100 - discount) / BigDecimal::from(100);
    if reduced < BigDecimal::zero() {
        BigDecimal::zero()
    } else {
        reduced
    }
}

impl Product {
    pub fn discounted_price(&self) -> BigDecimal {
        discounted_price(&self.price, self.discount)
    }
}

pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Product as shown to shoppers, with the discount already applied.
#[derive(Serialize, Debug)]
pub struct ProductView {
    pub id: i32,
    pub category_id: i32,
    pub name: String,
    pub slug: String,
    pub price: BigDecimal,
    pub discount: i32,
    pub discounted_price: BigDecimal,
    pub rating: BigDecimal,
    pub description: Option<String>,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        let discounted = product.discounted_price().with_scale(2);
        ProductView {
            id: product.id,
            category_id: product.category_id,
            name: product.name,
            slug: product.slug,
            price: product.price,
            discount: product.discount,
            discounted_price: discounted,
            rating: product.rating,
            description: product.description,
        }
    }
}

pub fn get_all_categories(conn: &mut PgConnection) -> Result<Vec<Category>> {
    let all_categories = categories::table
        .order(categories::name.asc())
        .select(Category::as_select())
        .load(conn)?;
    Ok(all_categories)
}

pub fn get_products(conn: &mut PgConnection, category_slug: Option<&str>) -> Result<Vec<Product>> {
    let mut query = products::table
        .inner_join(categories::table)
        .select(Product::as_select())
        .order(products::created_at.desc())
        .into_boxed();
    if let Some(slug) = category_slug {
        query = query.filter(categories::slug.eq(slug.to_owned()));
    }
    Ok(query.load(conn)?)
}

pub fn get_product_by_id(conn: &mut PgConnection, product_id: i32) -> Result<Product> {
    products::table
        .find(product_id)
        .select(Product::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ServiceError::not_found("Product"))
}

/// Highest discounts first.
pub fn get_offers(conn: &mut PgConnection) -> Result<Vec<Product>> {
    let offers = products::table
        .order((products::discount.desc(), products::id.asc()))
        .limit(OFFERS_LIMIT)
        .select(Product::as_select())
        .load(conn)?;
    Ok(offers)
}
