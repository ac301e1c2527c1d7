use bigdecimal::BigDecimal;
use diesel::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::catalog::get_product_by_id;
use crate::errors::{Result, ServiceError};
use crate::models::{Cart, CartItem, Product};
use crate::schema::{cart_items, carts, products, wishlist_items};

/// Product id → quantity, derived from the stored cart after every mutation.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct CartSummary {
    pub items: BTreeMap<i32, i32>,
    pub count: i64,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WishlistToggle {
    Added,
    Removed,
}

impl WishlistToggle {
    pub fn as_str(self) -> &'static str {
        match self {
            WishlistToggle::Added => "added",
            WishlistToggle::Removed => "removed",
        }
    }
}

#[derive(Serialize, Debug)]
pub struct CartLineView {
    pub product_id: i32,
    pub name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub line_total: BigDecimal,
}

#[derive(Serialize, Debug)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub total: BigDecimal,
    pub count: i64,
}

/// The unique key on `carts.user_id` decides which of two racing requests creates the cart.
pub fn get_or_create_cart(conn: &mut PgConnection, user_id: i32) -> Result<Cart> {
    diesel::insert_into(carts::table)
        .values(carts::user_id.eq(user_id))
        .on_conflict(carts::user_id)
        .do_nothing()
        .execute(conn)?;
    let cart = carts::table
        .filter(carts::user_id.eq(user_id))
        .select(Cart::as_select())
        .first(conn)?;
    Ok(cart)
}

pub fn find_cart(conn: &mut PgConnection, user_id: i32) -> Result<Option<Cart>> {
    let cart = carts::table
        .filter(carts::user_id.eq(user_id))
        .select(Cart::as_select())
        .first(conn)
        .optional()?;
    Ok(cart)
}

/// Adds one unit of a product. An existing line is incremented in the same statement, so two
/// concurrent adds end as one line with quantity 2.
pub fn add_to_cart(conn: &mut PgConnection, user_id: i32, product_id: i32) -> Result<CartItem> {
    get_product_by_id(conn, product_id)?;
    conn.transaction(|conn| {
        let cart = get_or_create_cart(conn, user_id)?;
        let item = diesel::insert_into(cart_items::table)
            .values((
                cart_items::cart_id.eq(cart.id),
                cart_items::product_id.eq(product_id),
                cart_items::quantity.eq(1),
            ))
            .on_conflict((cart_items::cart_id, cart_items::product_id))
            .do_update()
            .set(cart_items::quantity.eq(cart_items::quantity + 1))
            .returning(CartItem::as_returning())
            .get_result(conn)?;
        touch_cart(conn, cart.id)?;
        tracing::debug!(user_id, product_id, quantity = item.quantity, "cart line updated");
        Ok(item)
    })
}

/// Deletes the whole line, not one unit.
pub fn remove_from_cart(conn: &mut PgConnection, user_id: i32, product_id: i32) -> Result<()> {
    let cart = find_cart(conn, user_id)?.ok_or_else(|| ServiceError::not_found("Cart item"))?;
    let removed = diesel::delete(
        cart_items::table
            .filter(cart_items::cart_id.eq(cart.id))
            .filter(cart_items::product_id.eq(product_id)),
    )
    .execute(conn)?;
    if removed == 0 {
        return Err(ServiceError::not_found("Cart item"));
    }
    touch_cart(conn, cart.id)?;
    Ok(())
}

pub fn clear_cart(conn: &mut PgConnection, cart_id: i32) -> Result<usize> {
    let removed =
        diesel::delete(cart_items::table.filter(cart_items::cart_id.eq(cart_id))).execute(conn)?;
    Ok(removed)
}

fn touch_cart(conn: &mut PgConnection, cart_id: i32) -> Result<()> {
    diesel::update(carts::table.find(cart_id))
        .set(carts::updated_at.eq(diesel::dsl::now))
        .execute(conn)?;
    Ok(())
}

/// Cart lines joined with their products, oldest line first.
pub fn get_cart_lines(conn: &mut PgConnection, user_id: i32) -> Result<Vec<(CartItem, Product)>> {
    let lines = cart_items::table
        .inner_join(carts::table)
        .inner_join(products::table)
        .filter(carts::user_id.eq(user_id))
        .order(cart_items::added_at.asc())
        .select((CartItem::as_select(), Product::as_select()))
        .load(conn)?;
    Ok(lines)
}

pub fn cart_summary(conn: &mut PgConnection, user_id: i32) -> Result<CartSummary> {
    let rows: Vec<(i32, i32)> = cart_items::table
        .inner_join(carts::table)
        .filter(carts::user_id.eq(user_id))
        .select((cart_items::product_id, cart_items::quantity))
        .load(conn)?;
    Ok(summarize(rows))
}

fn summarize(rows: impl IntoIterator<Item = (i32, i32)>) -> CartSummary {
    let items: BTreeMap<i32, i32> = rows.into_iter().collect();
    let count = items.values().map(|quantity| i64::from(*quantity)).sum();
    CartSummary { items, count }
}

/// Display totals at the current catalog (discounted) price. Nothing here is persisted.
pub fn cart_view(lines: Vec<(CartItem, Product)>) -> CartView {
    let mut total = BigDecimal::from(0);
    let mut count = 0i64;
    let lines = lines
        .into_iter()
        .map(|(item, product)| {
            let unit_price = product.discounted_price().with_scale(2);
            let line_total = (&unit_price * BigDecimal::from(item.quantity)).with_scale(2);
            total += &line_total;
            count += i64::from(item.quantity);
            CartLineView {
                product_id: product.id,
                name: product.name,
                quantity: item.quantity,
                unit_price,
                line_total,
            }
        })
        .collect();
    CartView {
        lines,
        total: total.with_scale(2),
        count,
    }
}

/// Removes the pair when present, otherwise inserts it. A concurrent toggle that already
/// inserted the pair is treated as having won: the caller still sees `Added`.
pub fn toggle_wishlist(
    conn: &mut PgConnection,
    user_id: i32,
    product_id: i32,
) -> Result<WishlistToggle> {
    get_product_by_id(conn, product_id)?;
    conn.transaction(|conn| {
        let removed = diesel::delete(
            wishlist_items::table
                .filter(wishlist_items::user_id.eq(user_id))
                .filter(wishlist_items::product_id.eq(product_id)),
        )
        .execute(conn)?;
        if removed > 0 {
            return Ok(WishlistToggle::Removed);
        }
        let inserted = diesel::insert_into(wishlist_items::table)
            .values((
                wishlist_items::user_id.eq(user_id),
                wishlist_items::product_id.eq(product_id),
            ))
            .on_conflict((wishlist_items::user_id, wishlist_items::product_id))
            .do_nothing()
            .execute(conn)?;
        if inserted == 0 {
            tracing::debug!(user_id, product_id, "wishlist insert lost a race");
        }
        Ok(WishlistToggle::Added)
    })
}

/// Wishlisted products, newest first.
pub fn get_wishlist(conn: &mut PgConnection, user_id: i32) -> Result<Vec<Product>> {
    let wishlisted = wishlist_items::table
        .inner_join(products::table)
        .filter(wishlist_items::user_id.eq(user_id))
        .order(wishlist_items::created_at.desc())
        .select(Product::as_select())
        .load(conn)?;
    Ok(wishlisted)
}
