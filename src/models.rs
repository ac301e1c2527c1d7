use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use std::io::Write;
use strum::{AsRefStr, Display, EnumString};

use crate::schema::{
    cart_items, carts, categories, order_items, orders, payments, products, profiles, users,
    wishlist_items,
};

#[derive(Queryable, Selectable, Identifiable, Serialize, Clone, Debug, PartialEq)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl User {
    /// "First Last", or the username when no name has been given.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        match full.trim() {
            "" => self.username.clone(),
            name => name.to_string(),
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Clone, Debug, PartialEq)]
#[diesel(belongs_to(User))]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: i32,
    pub user_id: i32,
    pub mobile_number: Option<String>,
    pub address: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Clone, Debug, PartialEq)]
#[diesel(table_name = categories)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Clone, Debug, PartialEq)]
#[diesel(belongs_to(Category))]
#[diesel(table_name = products)]
pub struct Product {
    pub id: i32,
    pub category_id: i32,
    pub name: String,
    pub slug: String,
    pub price: BigDecimal,
    pub discount: i32,
    pub rating: BigDecimal,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Clone, Debug, PartialEq)]
#[diesel(belongs_to(User))]
#[diesel(table_name = carts)]
pub struct Cart {
    pub id: i32,
    pub user_id: i32,
    pub updated_at: NaiveDateTime,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Clone, Debug, PartialEq)]
#[diesel(belongs_to(Cart))]
#[diesel(belongs_to(Product))]
#[diesel(table_name = cart_items)]
pub struct CartItem {
    pub id: i32,
    pub cart_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub added_at: NaiveDateTime,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Clone, Debug, PartialEq)]
#[diesel(belongs_to(User))]
#[diesel(belongs_to(Product))]
#[diesel(table_name = wishlist_items)]
pub struct WishlistItem {
    pub id: i32,
    pub user_id: i32,
    pub product_id: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Clone, Debug, PartialEq)]
#[diesel(belongs_to(Profile, foreign_key = customer_id))]
#[diesel(table_name = orders)]
pub struct Order {
    pub id: i32,
    pub customer_id: i32,
    pub user_id: i32,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total_amount: BigDecimal,
    pub shipping_address: Option<String>,
    pub payment_method: PaymentMethod,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Clone, Debug, PartialEq)]
#[diesel(belongs_to(Order))]
#[diesel(belongs_to(Product))]
#[diesel(table_name = order_items)]
pub struct OrderItem {
    pub id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

impl OrderItem {
    pub fn line_total(&self) -> BigDecimal {
        &self.unit_price * BigDecimal::from(self.quantity)
    }
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Clone, Debug, PartialEq)]
#[diesel(belongs_to(Order))]
#[diesel(table_name = payments)]
pub struct Payment {
    pub id: i32,
    pub order_id: i32,
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub gateway_signature: Option<String>,
    /// Minor currency units (paise).
    pub amount: i64,
    pub status: PaymentAttemptStatus,
    pub created_at: NaiveDateTime,
}

/// Fulfilment axis of an order.
#[derive(
    AsExpression, FromSqlRow, EnumString, AsRefStr, Display, Serialize, Deserialize,
    Clone, Copy, Debug, PartialEq, Eq, Hash,
)]
#[diesel(sql_type = Text)]
pub enum OrderStatus {
    Pending,
    Shipped,
    Delivered,
    Cancelled,
}

/// Money axis of an order. The source of truth for "is this order paid".
#[derive(
    AsExpression, FromSqlRow, EnumString, AsRefStr, Display, Serialize, Deserialize,
    Clone, Copy, Debug, PartialEq, Eq, Hash,
)]
#[diesel(sql_type = Text)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Confirmed,
    Failed,
}

/// Status of one gateway payment attempt.
#[derive(
    AsExpression, FromSqlRow, EnumString, AsRefStr, Display, Serialize, Deserialize,
    Clone, Copy, Debug, PartialEq, Eq, Hash,
)]
#[diesel(sql_type = Text)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentAttemptStatus {
    Created,
    Attempted,
    Paid,
    Failed,
}

#[derive(
    AsExpression, FromSqlRow, EnumString, AsRefStr, Display, Serialize, Deserialize,
    Clone, Copy, Debug, PartialEq, Eq, Hash,
)]
#[diesel(sql_type = Text)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cod,
    Upi,
    Card,
}

impl PaymentMethod {
    /// Online methods settle through the payment gateway.
    pub fn is_online(self) -> bool {
        matches!(self, PaymentMethod::Upi | PaymentMethod::Card)
    }
}

macro_rules! text_enum_sql {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ToSql<Text, Pg> for $ty {
                fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                    out.write_all(self.as_ref().as_bytes())?;
                    Ok(IsNull::No)
                }
            }

            impl FromSql<Text, Pg> for $ty {
                fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                    let raw = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
                    raw.parse()
                        .map_err(|_| format!("unrecognized {} value {:?}", stringify!($ty), raw).into())
                }
            }
        )+
    };
}

text_enum_sql!(OrderStatus, PaymentStatus, PaymentAttemptStatus, PaymentMethod);
