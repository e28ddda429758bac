use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::quote::LineItem;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountMode {
    Percent,
    Amount,
}

/// Derived aggregate over a quote's line items plus its discount and
/// profit-sharing parameters. Never stored as independent truth; callers
/// recompute it from the items whenever it is needed, and recomputation is
/// bit-identical for identical inputs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTotals {
    pub subtotal: Decimal,
    pub business_total_cost: Decimal,
    pub total_vat: Decimal,
    pub discount_amount: Decimal,
    pub net_after_discount: Decimal,
    pub grand_total: Decimal,
    pub gross_profit: Decimal,
    pub profit_percent: Decimal,
    pub shared_profit: Decimal,
}

impl QuoteTotals {
    /// Presentation copy with every money value at 2 decimal places.
    /// Intermediate accumulation stays at full precision.
    pub fn rounded(&self) -> Self {
        Self {
            subtotal: self.subtotal.round_dp(2),
            business_total_cost: self.business_total_cost.round_dp(2),
            total_vat: self.total_vat.round_dp(2),
            discount_amount: self.discount_amount.round_dp(2),
            net_after_discount: self.net_after_discount.round_dp(2),
            grand_total: self.grand_total.round_dp(2),
            gross_profit: self.gross_profit.round_dp(2),
            profit_percent: self.profit_percent.round_dp(2),
            shared_profit: self.shared_profit.round_dp(2),
        }
    }
}

/// Price a line-item list. Total function over all numeric inputs: negative
/// quantities or costs flow through arithmetically, positivity is enforced by
/// the lifecycle validation, not here.
///
/// VAT is summed from the pre-discount line totals; the discount reduces only
/// the net subtotal in the grand total. That ordering is the documented
/// behavior of the books this service replaces.
pub fn compute_totals(
    items: &[LineItem],
    discount_mode: DiscountMode,
    discount_value: Decimal,
    share_percent: Decimal,
    lead_is_shared: bool,
) -> QuoteTotals {
    let mut subtotal = Decimal::ZERO;
    let mut business_total_cost = Decimal::ZERO;
    let mut total_vat = Decimal::ZERO;

    for item in items {
        subtotal += item.total_price();
        business_total_cost += item.total_cost();
        total_vat += item.line_vat();
    }

    let discount_amount = match discount_mode {
        DiscountMode::Percent => subtotal * discount_value / Decimal::ONE_HUNDRED,
        // A flat discount can never exceed what is on the table.
        DiscountMode::Amount => discount_value.min(subtotal),
    };

    let net_after_discount = subtotal - discount_amount;
    let grand_total = net_after_discount + total_vat;
    let gross_profit = net_after_discount - business_total_cost;

    let profit_percent = if net_after_discount > Decimal::ZERO {
        gross_profit / net_after_discount * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };

    let shared_profit = if lead_is_shared {
        grand_total * share_percent / Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };

    QuoteTotals {
        subtotal,
        business_total_cost,
        total_vat,
        discount_amount,
        net_after_discount,
        grand_total,
        gross_profit,
        profit_percent,
        shared_profit,
    }
}
