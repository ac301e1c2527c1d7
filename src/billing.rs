//! The single billing formula used by every purchase path.
//!
//! ```text
//! subtotal    = Σ discounted_unit_price × quantity
//! cgst = sgst = round(subtotal × 9%, 2)
//! grand_total = subtotal + cgst + sgst + delivery + packaging + handling
//! ```

use bigdecimal::{BigDecimal, ToPrimitive};
use serde::Serialize;

pub const TAX_PERCENT: i32 = 9;
pub const DELIVERY_CHARGE: i32 = 50;
pub const PACKAGING_CHARGE: i32 = 20;
pub const HANDLING_CHARGE: i32 = 15;

/// One priced line entering the calculation.
#[derive(Clone, Debug)]
pub struct BillingLine {
    pub unit_price: BigDecimal,
    pub quantity: i32,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct BillingBreakdown {
    pub subtotal: BigDecimal,
    pub cgst: BigDecimal,
    pub sgst: BigDecimal,
    pub delivery_charge: BigDecimal,
    pub packaging_charge: BigDecimal,
    pub handling_charge: BigDecimal,
    pub grand_total: BigDecimal,
}

impl BillingBreakdown {
    pub fn for_lines<'a>(lines: impl IntoIterator<Item = &'a BillingLine>) -> Self {
        let subtotal = lines
            .into_iter()
            .map(|line| &line.unit_price * BigDecimal::from(line.quantity))
            .fold(BigDecimal::from(0), |acc, amount| acc + amount);
        Self::from_subtotal(subtotal)
    }

    pub fn from_subtotal(subtotal: BigDecimal) -> Self {
        let subtotal = subtotal.round(2);
        let cgst = percent_of(&subtotal, TAX_PERCENT);
        let sgst = percent_of(&subtotal, TAX_PERCENT);
        let delivery_charge = money(DELIVERY_CHARGE);
        let packaging_charge = money(PACKAGING_CHARGE);
        let handling_charge = money(HANDLING_CHARGE);
        let grand_total = (&subtotal
            + &cgst
            + &sgst
            + &delivery_charge
            + &packaging_charge
            + &handling_charge)
            .with_scale(2);
        BillingBreakdown {
            subtotal: subtotal.with_scale(2),
            cgst,
            sgst,
            delivery_charge,
            packaging_charge,
            handling_charge,
            grand_total,
        }
    }
}

fn money(amount: i32) -> BigDecimal {
    BigDecimal::from(amount).with_scale(2)
}

fn percent_of(amount: &BigDecimal, percent: i32) -> BigDecimal {
    (amount * BigDecimal::from(percent) / BigDecimal::from(100))
        .round(2)
        .with_scale(2)
}

/// Amount in minor units (paise) the gateway is asked to collect. Never below one major unit.
pub fn to_minor_units(amount: &BigDecimal) -> i64 {
    let floor = BigDecimal::from(1);
    let amount = if *amount < floor { &floor } else { amount };
    (amount * BigDecimal::from(100))
        .round(0)
        .to_i64()
        .unwrap_or(i64::MAX)
}
