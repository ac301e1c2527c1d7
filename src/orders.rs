//! Order aggregation: turns a product or a cart into an immutable order snapshot.

use bigdecimal::BigDecimal;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::accounts::{get_or_create_profile, update_contact};
use crate::billing::{BillingBreakdown, BillingLine};
use crate::cart::{clear_cart, find_cart, get_cart_lines};
use crate::catalog::get_product_by_id;
use crate::errors::{Result, ServiceError};
use crate::insertables::{NewOrder, NewOrderItem};
use crate::models::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, Product};
use crate::schema::{cart_items, order_items, orders, products};

/// What is being bought.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PurchaseSource {
    Product { product_id: i32, quantity: i32 },
    Cart,
}

/// Checkout form as submitted by the buyer.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct CheckoutForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub quantity: Option<i32>,
}

impl CheckoutForm {
    pub fn payment_method(&self) -> Result<PaymentMethod> {
        match self.payment_method.as_deref().map(str::trim) {
            None | Some("") => Ok(PaymentMethod::Cod),
            Some(raw) => raw
                .parse()
                .map_err(|_| ServiceError::Validation(format!("Unknown payment method {raw:?}"))),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Shipping address is required".to_string(),
            ));
        }
        let phone = self.phone.trim();
        let digits = phone.chars().filter(char::is_ascii_digit).count();
        if !(7..=15).contains(&digits)
            || !phone
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' '))
        {
            return Err(ServiceError::Validation(
                "Enter a valid phone number".to_string(),
            ));
        }
        self.payment_method()?;
        Ok(())
    }
}

/// Most units of one product a single order line may carry.
pub const MAX_QUANTITY: i32 = 999;

pub fn validate_quantity(quantity: Option<i32>) -> Result<i32> {
    match quantity.unwrap_or(1) {
        q if q < 1 => Err(ServiceError::Validation(
            "Quantity must be at least 1".to_string(),
        )),
        q if q > MAX_QUANTITY => Err(ServiceError::Validation(format!(
            "Quantity cannot exceed {MAX_QUANTITY}"
        ))),
        q => Ok(q),
    }
}

/// `orders.total_amount` is `NUMERIC(10, 2)`.
fn max_order_total() -> BigDecimal {
    BigDecimal::from(100_000_000)
}

/// Rejects a bill the orders table cannot hold.
pub fn ensure_storable(billing: &BillingBreakdown) -> Result<()> {
    if billing.grand_total >= max_order_total() {
        return Err(ServiceError::Validation(
            "Order total is too large, please reduce the quantity".to_string(),
        ));
    }
    Ok(())
}

/// A line about to be written, priced from the catalog at this moment.
#[derive(Serialize, Clone, Debug)]
pub struct PricedLine {
    pub product_id: i32,
    pub name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

impl PricedLine {
    fn from_product(product: &Product, quantity: i32) -> Self {
        PricedLine {
            product_id: product.id,
            name: product.name.clone(),
            quantity,
            unit_price: product.discounted_price().with_scale(2),
        }
    }

    fn billing_line(&self) -> BillingLine {
        BillingLine {
            unit_price: self.unit_price.clone(),
            quantity: self.quantity,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct BillingPreview {
    pub lines: Vec<PricedLine>,
    pub billing: BillingBreakdown,
}

/// Where the buyer goes after placing an order.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    Payment,
    OrderSuccess,
}

#[derive(Serialize, Debug)]
pub struct PlacedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub billing: BillingBreakdown,
    pub next: NextStep,
}

#[derive(Serialize, Debug)]
pub struct OrderLineView {
    pub product_id: i32,
    pub name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub line_total: BigDecimal,
}

#[derive(Serialize, Debug)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderLineView>,
    pub billing: BillingBreakdown,
}

fn price_lines(
    conn: &mut PgConnection,
    user_id: i32,
    source: PurchaseSource,
) -> Result<Vec<PricedLine>> {
    match source {
        PurchaseSource::Product {
            product_id,
            quantity,
        } => {
            let quantity = validate_quantity(Some(quantity))?;
            let product = get_product_by_id(conn, product_id)?;
            Ok(vec![PricedLine::from_product(&product, quantity)])
        }
        PurchaseSource::Cart => {
            let lines = get_cart_lines(conn, user_id)?;
            if lines.is_empty() {
                return Err(ServiceError::Validation("Your cart is empty".to_string()));
            }
            Ok(lines
                .iter()
                .map(|(item, product)| PricedLine::from_product(product, item.quantity))
                .collect())
        }
    }
}

pub fn billing_for(lines: &[PricedLine]) -> BillingBreakdown {
    let billing_lines: Vec<BillingLine> = lines.iter().map(PricedLine::billing_line).collect();
    BillingBreakdown::for_lines(&billing_lines)
}

pub fn preview(
    conn: &mut PgConnection,
    user_id: i32,
    source: PurchaseSource,
) -> Result<BillingPreview> {
    let lines = price_lines(conn, user_id, source)?;
    let billing = billing_for(&lines);
    ensure_storable(&billing)?;
    Ok(BillingPreview { lines, billing })
}

/// Writes the profile update, the order and its lines in one transaction.
///
/// Cash on delivery is confirmed immediately; online methods stay `Pending` until the gateway
/// settles them. Cart purchases empty the cart in the same transaction.
pub fn place_order(
    conn: &mut PgConnection,
    user_id: i32,
    source: PurchaseSource,
    form: &CheckoutForm,
) -> Result<PlacedOrder> {
    form.validate()?;
    let payment_method = form.payment_method()?;

    conn.transaction(|conn| {
        let profile = get_or_create_profile(conn, user_id)?;
        let profile = update_contact(conn, &profile, &form.phone, &form.address)?;
        let lines = price_lines(conn, user_id, source)?;
        let billing = billing_for(&lines);
        ensure_storable(&billing)?;

        let payment_status = if payment_method.is_online() {
            PaymentStatus::Pending
        } else {
            PaymentStatus::Confirmed
        };
        let new_order = NewOrder {
            customer_id: profile.id,
            user_id,
            status: OrderStatus::Pending,
            payment_status,
            total_amount: billing.grand_total.clone(),
            shipping_address: profile.address.clone(),
            payment_method,
        };
        let order: Order = diesel::insert_into(orders::table)
            .values(&new_order)
            .returning(Order::as_returning())
            .get_result(conn)?;

        let new_items: Vec<NewOrderItem> = lines
            .iter()
            .map(|line| NewOrderItem {
                order_id: order.id,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price.clone(),
            })
            .collect();
        let items = diesel::insert_into(order_items::table)
            .values(&new_items)
            .returning(OrderItem::as_returning())
            .get_results(conn)?;

        if source == PurchaseSource::Cart {
            if let Some(cart) = find_cart(conn, user_id)? {
                clear_cart(conn, cart.id)?;
            }
        }

        tracing::info!(
            order_id = order.id,
            user_id,
            total = %order.total_amount,
            method = %payment_method,
            "order placed"
        );
        let next = if payment_method.is_online() {
            NextStep::Payment
        } else {
            NextStep::OrderSuccess
        };
        Ok(PlacedOrder {
            order,
            items,
            billing,
            next,
        })
    })
}

/// Orders are only visible to the user who placed them.
pub fn get_order_for_user(conn: &mut PgConnection, user_id: i32, order_id: i32) -> Result<Order> {
    orders::table
        .find(order_id)
        .filter(orders::user_id.eq(user_id))
        .select(Order::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ServiceError::not_found("Order"))
}

pub fn get_orders_for_user(conn: &mut PgConnection, user_id: i32) -> Result<Vec<Order>> {
    let user_orders = orders::table
        .filter(orders::user_id.eq(user_id))
        .order((orders::created_at.desc(), orders::id.desc()))
        .select(Order::as_select())
        .load(conn)?;
    Ok(user_orders)
}

pub fn get_order_lines(conn: &mut PgConnection, order_id: i32) -> Result<Vec<(OrderItem, Product)>> {
    let lines = order_items::table
        .inner_join(products::table)
        .filter(order_items::order_id.eq(order_id))
        .order(order_items::id.asc())
        .select((OrderItem::as_select(), Product::as_select()))
        .load(conn)?;
    Ok(lines)
}

pub fn order_detail(conn: &mut PgConnection, user_id: i32, order_id: i32) -> Result<OrderDetail> {
    let order = get_order_for_user(conn, user_id, order_id)?;
    let lines = get_order_lines(conn, order.id)?;
    Ok(detail_from_lines(order, lines))
}

pub fn detail_from_lines(order: Order, lines: Vec<(OrderItem, Product)>) -> OrderDetail {
    let billing_lines: Vec<BillingLine> = lines
        .iter()
        .map(|(item, _)| BillingLine {
            unit_price: item.unit_price.clone(),
            quantity: item.quantity,
        })
        .collect();
    let billing = BillingBreakdown::for_lines(&billing_lines);
    let items = lines
        .into_iter()
        .map(|(item, product)| OrderLineView {
            product_id: product.id,
            name: product.name,
            quantity: item.quantity,
            line_total: item.line_total().with_scale(2),
            unit_price: item.unit_price,
        })
        .collect();
    OrderDetail {
        order,
        items,
        billing,
    }
}

pub fn count_order_items(conn: &mut PgConnection, order_id: i32) -> Result<i64> {
    let count = order_items::table
        .filter(order_items::order_id.eq(order_id))
        .count()
        .get_result(conn)?;
    Ok(count)
}

/// Recovers an order that was written without lines by copying the owner's current cart into
/// it. Returns the number of lines added; orders that already have lines are left alone.
pub fn hydrate_items_from_cart(conn: &mut PgConnection, order: &Order) -> Result<usize> {
    conn.transaction(|conn| {
        if count_order_items(conn, order.id)? > 0 {
            return Ok(0);
        }
        let Some(cart) = find_cart(conn, order.user_id)? else {
            return Ok(0);
        };
        let cart_lines: Vec<(i32, i32, Product)> = cart_items::table
            .inner_join(products::table)
            .filter(cart_items::cart_id.eq(cart.id))
            .select((
                cart_items::product_id,
                cart_items::quantity,
                Product::as_select(),
            ))
            .load(conn)?;
        let new_items: Vec<NewOrderItem> = cart_lines
            .iter()
            .map(|(product_id, quantity, product)| NewOrderItem {
                order_id: order.id,
                product_id: *product_id,
                quantity: *quantity,
                unit_price: product.discounted_price().with_scale(2),
            })
            .collect();
        if new_items.is_empty() {
            return Ok(0);
        }
        let added = diesel::insert_into(order_items::table)
            .values(&new_items)
            .on_conflict((order_items::order_id, order_items::product_id))
            .do_nothing()
            .execute(conn)?;
        tracing::warn!(order_id = order.id, added, "order had no lines, hydrated from cart");
        Ok(added)
    })
}
