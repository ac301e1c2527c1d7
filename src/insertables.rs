use crate::models::{OrderStatus, PaymentAttemptStatus, PaymentMethod, PaymentStatus};
use crate::schema::{categories, order_items, orders, payments, products, users};
use bigdecimal::BigDecimal;
use diesel::Insertable;
use serde::{Deserialize, Serialize};

#[derive(Insertable, Serialize, Deserialize, Clone)]
#[diesel(table_name=users)]
pub struct NewUser {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Insertable, Serialize, Deserialize, Clone)]
#[diesel(table_name=categories)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
}

#[derive(Insertable, Serialize, Deserialize, Clone)]
#[diesel(table_name=products)]
pub struct NewProduct {
    pub category_id: i32,
    pub name: String,
    pub slug: String,
    pub price: BigDecimal,
    pub discount: i32,
    pub rating: BigDecimal,
    pub description: Option<String>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name=orders)]
pub struct NewOrder {
    pub customer_id: i32,
    pub user_id: i32,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total_amount: BigDecimal,
    pub shipping_address: Option<String>,
    pub payment_method: PaymentMethod,
}

#[derive(Insertable, Debug)]
#[diesel(table_name=order_items)]
pub struct NewOrderItem {
    pub order_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Insertable, Debug)]
#[diesel(table_name=payments)]
pub struct NewPayment {
    pub order_id: i32,
    pub gateway_order_id: String,
    pub amount: i64,
    pub status: PaymentAttemptStatus,
}
