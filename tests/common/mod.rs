#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use furniture_shop::catalog::slugify;
use furniture_shop::config::{Credentials, GatewayConfig};
use furniture_shop::insertables::{NewCategory, NewProduct, NewUser};
use furniture_shop::models::{Category, Order, Payment, Product, User};
use furniture_shop::orders::{place_order, CheckoutForm, PurchaseSource};
use furniture_shop::payments::gateway::{CreateOrderRequest, GatewayClient, GatewayError, RemoteOrder};
use furniture_shop::payments::{record_payment, PaymentGateway, PaymentIntent};
use furniture_shop::schema::{categories, products, users};

const MIGRATION: &str =
    include_str!("../../migrations/2024-05-01-000000_create_storefront/up.sql");

pub const KEY_SECRET: &str = "test_key_secret";
pub const WEBHOOK_SECRET: &str = "test_webhook_secret";

static SCHEMA_SEQ: AtomicUsize = AtomicUsize::new(0);

/// A connection inside a never-committed transaction with the storefront tables in a private
/// schema. `None` when no database is configured, in which case the test should return early.
pub fn test_connection() -> Option<PgConnection> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let mut conn = PgConnection::establish(&url).expect("DATABASE_URL is set but unreachable");
    conn.begin_test_transaction().unwrap();
    let schema = format!(
        "shop_test_{}_{}",
        std::process::id(),
        SCHEMA_SEQ.fetch_add(1, Ordering::SeqCst)
    );
    conn.batch_execute(&format!(
        "CREATE SCHEMA {schema}; SET LOCAL search_path TO {schema};"
    ))
    .unwrap();
    conn.batch_execute(MIGRATION).unwrap();
    Some(conn)
}

/// A committed private schema that several connections can share, dropped when this goes out
/// of scope. Concurrent tests need it because a test transaction is invisible to other
/// connections.
pub struct SharedSchema {
    url: String,
    name: String,
}

impl SharedSchema {
    pub fn create() -> Option<SharedSchema> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let name = format!(
            "shop_shared_{}_{}",
            std::process::id(),
            SCHEMA_SEQ.fetch_add(1, Ordering::SeqCst)
        );
        let schema = SharedSchema { url, name };
        let mut conn = PgConnection::establish(&schema.url)
            .expect("DATABASE_URL is set but unreachable");
        conn.batch_execute(&format!(
            "CREATE SCHEMA {0}; SET search_path TO {0};",
            schema.name
        ))
        .unwrap();
        conn.batch_execute(MIGRATION).unwrap();
        Some(schema)
    }

    /// A fresh autocommit connection scoped to this schema.
    pub fn connect(&self) -> PgConnection {
        let mut conn = PgConnection::establish(&self.url).unwrap();
        conn.batch_execute(&format!("SET search_path TO {};", self.name))
            .unwrap();
        conn
    }
}

impl Drop for SharedSchema {
    fn drop(&mut self) {
        if let Ok(mut conn) = PgConnection::establish(&self.url) {
            let _ = conn.batch_execute(&format!("DROP SCHEMA IF EXISTS {} CASCADE;", self.name));
        }
    }
}

/// Runs `first` and `second` on their own connections, released together by a barrier.
pub fn race<A, B, RA, RB>(schema: &SharedSchema, first: A, second: B) -> (RA, RB)
where
    A: FnOnce(&mut PgConnection) -> RA + Send,
    B: FnOnce(&mut PgConnection) -> RB + Send,
    RA: Send,
    RB: Send,
{
    let barrier = Barrier::new(2);
    let mut first_conn = schema.connect();
    let mut second_conn = schema.connect();
    std::thread::scope(|scope| {
        let a = scope.spawn(|| {
            barrier.wait();
            first(&mut first_conn)
        });
        let b = scope.spawn(|| {
            barrier.wait();
            second(&mut second_conn)
        });
        (a.join().unwrap(), b.join().unwrap())
    })
}

pub fn dec(raw: &str) -> BigDecimal {
    BigDecimal::from_str(raw).unwrap()
}

pub fn create_user(conn: &mut PgConnection, username: &str) -> User {
    diesel::insert_into(users::table)
        .values(&NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            first_name: username.to_string(),
            last_name: "Tester".to_string(),
        })
        .returning(User::as_returning())
        .get_result(conn)
        .unwrap()
}

fn test_category(conn: &mut PgConnection) -> Category {
    diesel::insert_into(categories::table)
        .values(&NewCategory {
            name: "Living Room".to_string(),
            slug: "living-room".to_string(),
        })
        .on_conflict(categories::slug)
        .do_nothing()
        .execute(conn)
        .unwrap();
    categories::table
        .filter(categories::slug.eq("living-room"))
        .select(Category::as_select())
        .first(conn)
        .unwrap()
}

pub fn create_product(conn: &mut PgConnection, name: &str, price: &str, discount: i32) -> Product {
    let category = test_category(conn);
    diesel::insert_into(products::table)
        .values(&NewProduct {
            category_id: category.id,
            name: name.to_string(),
            slug: slugify(name),
            price: dec(price),
            discount,
            rating: dec("4.5"),
            description: None,
        })
        .returning(Product::as_returning())
        .get_result(conn)
        .unwrap()
}

pub fn checkout_form(method: &str) -> CheckoutForm {
    CheckoutForm {
        name: "Asha Rao".to_string(),
        phone: "9876543210".to_string(),
        address: "12 MG Road, Bengaluru".to_string(),
        payment_method: Some(method.to_string()),
        quantity: None,
    }
}

/// An online order for one unit of `product`, awaiting payment.
pub fn online_order(conn: &mut PgConnection, user: &User, product: &Product) -> Order {
    place_order(
        conn,
        user.id,
        PurchaseSource::Product {
            product_id: product.id,
            quantity: 1,
        },
        &checkout_form("upi"),
    )
    .unwrap()
    .order
}

/// Records a gateway attempt for `order` as if `createRemoteOrder` had succeeded.
pub fn open_attempt(conn: &mut PgConnection, order: &Order, gateway_order_id: &str) -> Payment {
    let intent = PaymentIntent {
        order_id: order.id,
        amount: 100_000,
        description: format!("Order #{}", order.id),
        customer_name: "Asha Rao".to_string(),
        customer_email: "asha@example.com".to_string(),
    };
    let remote = RemoteOrder {
        id: gateway_order_id.to_string(),
        status: Some("created".to_string()),
        amount: Some(intent.amount),
        currency: Some("INR".to_string()),
    };
    record_payment(conn, &intent, &remote).unwrap()
}

/// Gateway client double that counts calls and hands out sequential order ids.
#[derive(Default)]
pub struct FakeGatewayClient {
    pub calls: AtomicUsize,
}

#[async_trait]
impl GatewayClient for FakeGatewayClient {
    async fn create_order(
        &self,
        _credentials: Credentials<'_>,
        request: &CreateOrderRequest,
    ) -> Result<RemoteOrder, GatewayError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RemoteOrder {
            id: format!("order_fake{n}"),
            status: Some("created".to_string()),
            amount: Some(request.amount),
            currency: Some(request.currency.clone()),
        })
    }
}

pub fn gateway_config() -> GatewayConfig {
    GatewayConfig {
        key_id: Some("rzp_test_key".to_string()),
        key_secret: Some(KEY_SECRET.to_string()),
        webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        ..GatewayConfig::default()
    }
}

pub fn configured_gateway() -> (PaymentGateway, Arc<FakeGatewayClient>) {
    let client = Arc::new(FakeGatewayClient::default());
    (PaymentGateway::new(gateway_config(), client.clone()), client)
}

pub fn unconfigured_gateway() -> (PaymentGateway, Arc<FakeGatewayClient>) {
    let client = Arc::new(FakeGatewayClient::default());
    (
        PaymentGateway::new(GatewayConfig::default(), client.clone()),
        client,
    )
}

pub fn captured_event(gateway_order_id: &str, gateway_payment_id: &str) -> Vec<u8> {
    serde_json::json!({
        "entity": "event",
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": gateway_payment_id,
                    "order_id": gateway_order_id,
                    "amount": 100000,
                    "status": "captured"
                }
            }
        }
    })
    .to_string()
    .into_bytes()
}
