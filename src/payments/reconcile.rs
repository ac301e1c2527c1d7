//! Applying a "payment succeeded" signal to the Payment and Order rows.
//!
//! The client callback and the gateway webhook both end up here, in either order and possibly
//! more than once. The Payment row is locked first, then its Order, so both paths serialize on
//! the same row and the second arrival observes the first one's writes.

use diesel::prelude::*;
use serde::Serialize;

use crate::errors::Result;
use crate::models::{Order, Payment, PaymentAttemptStatus, PaymentStatus};
use crate::schema::{orders, payments};

/// What a settlement attempt did.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Settlement {
    /// Payment and order were marked paid by this call.
    Applied,
    /// This payment was already paid; nothing was written.
    AlreadySettled,
    /// A different attempt already paid the order; this one is left unpaid for refund review.
    SettledByOtherAttempt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SettleAction {
    Skip,
    RecordOnly,
    MarkPaid,
}

fn settle_action(attempt: PaymentAttemptStatus, order: PaymentStatus) -> SettleAction {
    if attempt == PaymentAttemptStatus::Paid {
        SettleAction::Skip
    } else if order == PaymentStatus::Paid {
        SettleAction::RecordOnly
    } else {
        SettleAction::MarkPaid
    }
}

/// Gateway references reported with a successful payment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentConfirmation<'a> {
    pub gateway_order_id: &'a str,
    pub gateway_payment_id: &'a str,
    /// Present on the client callback path only.
    pub signature: Option<&'a str>,
}

pub fn find_payment_by_gateway_order(
    conn: &mut PgConnection,
    gateway_order_id: &str,
) -> Result<Option<Payment>> {
    let payment = payments::table
        .filter(payments::gateway_order_id.eq(gateway_order_id))
        .select(Payment::as_select())
        .first(conn)
        .optional()?;
    Ok(payment)
}

/// Marks the payment and its order paid in one transaction. Returns `None` when no payment
/// with that gateway order id exists.
pub fn settle_payment(
    conn: &mut PgConnection,
    confirmation: &PaymentConfirmation<'_>,
) -> Result<Option<(Payment, Settlement)>> {
    conn.transaction(|conn| {
        let Some(payment) = payments::table
            .filter(payments::gateway_order_id.eq(confirmation.gateway_order_id))
            .select(Payment::as_select())
            .for_update()
            .first(conn)
            .optional()?
        else {
            return Ok(None);
        };

        let order: Order = orders::table
            .find(payment.order_id)
            .select(Order::as_select())
            .for_update()
            .first(conn)?;

        match settle_action(payment.status, order.payment_status) {
            SettleAction::Skip => {
                tracing::info!(
                    gateway_order_id = confirmation.gateway_order_id,
                    "payment already settled"
                );
                Ok(Some((payment, Settlement::AlreadySettled)))
            }
            SettleAction::RecordOnly => {
                let payment = diesel::update(payments::table.find(payment.id))
                    .set((
                        payments::gateway_payment_id.eq(confirmation.gateway_payment_id),
                        payments::gateway_signature
                            .eq(confirmation.signature.or(payment.gateway_signature.as_deref())),
                    ))
                    .returning(Payment::as_returning())
                    .get_result(conn)?;
                tracing::warn!(
                    order_id = order.id,
                    gateway_order_id = confirmation.gateway_order_id,
                    gateway_payment_id = confirmation.gateway_payment_id,
                    "order already paid by another attempt, payment needs refund review"
                );
                Ok(Some((payment, Settlement::SettledByOtherAttempt)))
            }
            SettleAction::MarkPaid => {
                let payment = diesel::update(payments::table.find(payment.id))
                    .set((
                        payments::gateway_payment_id.eq(confirmation.gateway_payment_id),
                        payments::gateway_signature
                            .eq(confirmation.signature.or(payment.gateway_signature.as_deref())),
                        payments::status.eq(PaymentAttemptStatus::Paid),
                    ))
                    .returning(Payment::as_returning())
                    .get_result(conn)?;
                diesel::update(orders::table.find(order.id))
                    .set(orders::payment_status.eq(PaymentStatus::Paid))
                    .execute(conn)?;
                tracing::info!(
                    order_id = order.id,
                    gateway_order_id = confirmation.gateway_order_id,
                    gateway_payment_id = confirmation.gateway_payment_id,
                    "payment settled"
                );
                Ok(Some((payment, Settlement::Applied)))
            }
        }
    })
}

/// Records a failed checkout attempt for audit. A payment that is already paid is left alone.
pub fn mark_attempt_failed(
    conn: &mut PgConnection,
    confirmation: &PaymentConfirmation<'_>,
) -> Result<usize> {
    let updated = diesel::update(
        payments::table
            .filter(payments::gateway_order_id.eq(confirmation.gateway_order_id))
            .filter(payments::status.ne(PaymentAttemptStatus::Paid)),
    )
    .set((
        payments::gateway_payment_id.eq(confirmation.gateway_payment_id),
        payments::gateway_signature.eq(confirmation.signature),
        payments::status.eq(PaymentAttemptStatus::Failed),
    ))
    .execute(conn)?;
    Ok(updated)
}
