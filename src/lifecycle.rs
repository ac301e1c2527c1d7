//! Order status transitions plus the read-only views derived from them.

use diesel::prelude::*;
use serde::Serialize;
use std::fmt;

use crate::errors::{Result, ServiceError};
use crate::models::{Order, OrderStatus, Payment, PaymentAttemptStatus};
use crate::orders::{get_order_for_user, get_order_lines, OrderDetail};
use crate::schema::{orders, payments};

pub const TIMELINE_STEPS: [&str; 5] = [
    "Order Placed",
    "Order Confirmed",
    "Shipped",
    "Out for Delivery",
    "Delivered",
];

impl OrderStatus {
    /// Whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Shipped) | (Pending, Cancelled) | (Shipped, Delivered)
        )
    }
}

/// Cancels a pending order. Anything else is rejected with a message the shopper can read.
pub fn cancel_order(conn: &mut PgConnection, user_id: i32, order_id: i32) -> Result<Order> {
    let updated = diesel::update(
        orders::table
            .find(order_id)
            .filter(orders::user_id.eq(user_id))
            .filter(orders::status.eq(OrderStatus::Pending)),
    )
    .set(orders::status.eq(OrderStatus::Cancelled))
    .returning(Order::as_returning())
    .get_result(conn)
    .optional()?;

    match updated {
        Some(order) => {
            tracing::info!(order_id, user_id, "order cancelled");
            Ok(order)
        }
        None => {
            let order = get_order_for_user(conn, user_id, order_id)?;
            Err(ServiceError::InvalidTransition(format!(
                "Order #{} cannot be cancelled because it is {}",
                order.id,
                order.status.as_ref().to_lowercase()
            )))
        }
    }
}

/// Moves an order forward along the fulfilment axis (back-office use).
pub fn advance_status(conn: &mut PgConnection, order_id: i32, next: OrderStatus) -> Result<Order> {
    conn.transaction(|conn| {
        let order: Order = orders::table
            .find(order_id)
            .select(Order::as_select())
            .for_update()
            .first(conn)
            .optional()?
            .ok_or_else(|| ServiceError::not_found("Order"))?;
        if !order.status.can_transition_to(next) {
            return Err(ServiceError::InvalidTransition(format!(
                "Order #{} cannot move from {} to {}",
                order.id, order.status, next
            )));
        }
        let order = diesel::update(orders::table.find(order_id))
            .set(orders::status.eq(next))
            .returning(Order::as_returning())
            .get_result(conn)?;
        tracing::info!(order_id, status = %next, "order status advanced");
        Ok(order)
    })
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct TimelineStep {
    pub label: &'static str,
    pub completed: bool,
}

#[derive(Serialize, Debug)]
pub struct TrackingInfo {
    pub order_id: i32,
    pub status: OrderStatus,
    pub payment_status: crate::models::PaymentStatus,
    pub timeline: Vec<TimelineStep>,
}

/// Display-only timeline derived from the current status. No event history is stored.
pub fn timeline(status: OrderStatus) -> Vec<TimelineStep> {
    let completed = match status {
        OrderStatus::Pending | OrderStatus::Cancelled => 1,
        OrderStatus::Shipped => 3,
        OrderStatus::Delivered => TIMELINE_STEPS.len(),
    };
    let mut steps: Vec<TimelineStep> = TIMELINE_STEPS
        .into_iter()
        .enumerate()
        .map(|(index, label)| TimelineStep {
            label,
            completed: index < completed,
        })
        .collect();
    if status == OrderStatus::Cancelled {
        steps.truncate(1);
        steps.push(TimelineStep {
            label: "Cancelled",
            completed: true,
        });
    }
    steps
}

pub fn track_order(conn: &mut PgConnection, user_id: i32, order_id: i32) -> Result<TrackingInfo> {
    let order = get_order_for_user(conn, user_id, order_id)?;
    Ok(TrackingInfo {
        order_id: order.id,
        status: order.status,
        payment_status: order.payment_status,
        timeline: timeline(order.status),
    })
}

/// The payment attempt that settled the order, if any.
pub fn settled_payment(conn: &mut PgConnection, order_id: i32) -> Result<Option<Payment>> {
    let payment = payments::table
        .filter(payments::order_id.eq(order_id))
        .filter(payments::status.eq(PaymentAttemptStatus::Paid))
        .order(payments::id.desc())
        .select(Payment::as_select())
        .first(conn)
        .optional()?;
    Ok(payment)
}

pub fn invoice(conn: &mut PgConnection, user_id: i32, order_id: i32) -> Result<String> {
    let order = get_order_for_user(conn, user_id, order_id)?;
    let lines = get_order_lines(conn, order.id)?;
    let payment = settled_payment(conn, order.id)?;
    let detail = crate::orders::detail_from_lines(order, lines);
    Ok(render_invoice(&detail, payment.as_ref()))
}

/// Plain-text invoice. Line prices are the ones captured when the order was placed.
pub fn render_invoice(detail: &OrderDetail, payment: Option<&Payment>) -> String {
    Invoice { detail, payment }.to_string()
}

struct Invoice<'a> {
    detail: &'a OrderDetail,
    payment: Option<&'a Payment>,
}

impl fmt::Display for Invoice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = &self.detail.order;
        let billing = &self.detail.billing;
        writeln!(f, "INVOICE")?;
        writeln!(f, "Order #{}", order.id)?;
        writeln!(f, "Date: {}", order.created_at.format("%Y-%m-%d %H:%M"))?;
        writeln!(f, "Status: {}", order.status)?;
        writeln!(
            f,
            "Ship to: {}",
            order.shipping_address.as_deref().unwrap_or("-")
        )?;
        writeln!(f)?;
        writeln!(f, "Items:")?;
        for item in &self.detail.items {
            writeln!(
                f,
                "- {} x {} @ Rs.{} = Rs.{}",
                item.name,
                item.quantity,
                item.unit_price.with_scale(2),
                item.line_total.with_scale(2)
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Subtotal: Rs.{}", billing.subtotal)?;
        writeln!(f, "CGST (9%): Rs.{}", billing.cgst)?;
        writeln!(f, "SGST (9%): Rs.{}", billing.sgst)?;
        writeln!(f, "Delivery: Rs.{}", billing.delivery_charge)?;
        writeln!(f, "Packaging: Rs.{}", billing.packaging_charge)?;
        writeln!(f, "Handling: Rs.{}", billing.handling_charge)?;
        writeln!(f, "Total: Rs.{}", order.total_amount.with_scale(2))?;
        writeln!(f)?;
        writeln!(f, "Payment method: {}", order.payment_method.as_ref().to_uppercase())?;
        writeln!(f, "Payment status: {}", order.payment_status)?;
        if let Some(payment) = self.payment {
            writeln!(
                f,
                "Payment reference: {}",
                payment.gateway_payment_id.as_deref().unwrap_or("-")
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::BillingBreakdown;
    use crate::models::{PaymentMethod, PaymentStatus};
    use crate::orders::OrderLineView;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn completed(steps: &[TimelineStep]) -> Vec<&'static str> {
        steps.iter().filter(|s| s.completed).map(|s| s.label).collect()
    }

    #[test]
    fn pending_orders_only_show_placed() {
        assert_eq!(completed(&timeline(OrderStatus::Pending)), vec!["Order Placed"]);
        assert_eq!(timeline(OrderStatus::Pending).len(), 5);
    }

    #[test]
    fn shipped_completes_first_three_steps() {
        assert_eq!(
            completed(&timeline(OrderStatus::Shipped)),
            vec!["Order Placed", "Order Confirmed", "Shipped"]
        );
    }

    #[test]
    fn delivered_backfills_everything() {
        assert!(timeline(OrderStatus::Delivered).iter().all(|s| s.completed));
    }

    #[test]
    fn cancelled_ends_the_timeline() {
        let steps = timeline(OrderStatus::Cancelled);
        assert_eq!(completed(&steps), vec!["Order Placed", "Cancelled"]);
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn only_pending_orders_can_be_cancelled() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Shipped));
    }

    fn sample_detail() -> OrderDetail {
        let unit = BigDecimal::from_str("500.00").unwrap();
        let order = Order {
            id: 7,
            customer_id: 1,
            user_id: 1,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Paid,
            total_amount: BigDecimal::from_str("1265.00").unwrap(),
            shipping_address: Some("12 MG Road, Bengaluru".to_string()),
            payment_method: PaymentMethod::Upi,
            created_at: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap(),
        };
        OrderDetail {
            order,
            items: vec![OrderLineView {
                product_id: 3,
                name: "Oak Bookshelf".to_string(),
                quantity: 2,
                line_total: BigDecimal::from_str("1000.00").unwrap(),
                unit_price: unit,
            }],
            billing: BillingBreakdown::from_subtotal(BigDecimal::from(1000)),
        }
    }

    #[test]
    fn invoice_lists_lines_and_totals() {
        let text = render_invoice(&sample_detail(), None);
        assert!(text.starts_with("INVOICE\nOrder #7\n"));
        assert!(text.contains("Date: 2024-05-01 10:30"));
        assert!(text.contains("- Oak Bookshelf x 2 @ Rs.500.00 = Rs.1000.00"));
        assert!(text.contains("CGST (9%): Rs.90.00"));
        assert!(text.contains("Total: Rs.1265.00"));
        assert!(text.contains("Payment method: UPI"));
        assert!(text.contains("Payment status: Paid"));
        assert!(!text.contains("Payment reference"));
    }

    #[test]
    fn invoice_ends_with_the_settling_payment() {
        let detail = sample_detail();
        let payment = Payment {
            id: 1,
            order_id: 7,
            gateway_order_id: "order_A".to_string(),
            gateway_payment_id: Some("pay_A".to_string()),
            gateway_signature: None,
            amount: 126_500,
            status: PaymentAttemptStatus::Paid,
            created_at: detail.order.created_at,
        };
        let text = render_invoice(&detail, Some(&payment));
        assert!(text.ends_with("Payment status: Paid\nPayment reference: pay_A\n"));
    }

    #[test]
    fn invoice_is_deterministic() {
        let detail = sample_detail();
        assert_eq!(render_invoice(&detail, None), render_invoice(&detail, None));
    }
}
