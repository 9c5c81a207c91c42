//! Pure money math for orders. All amounts are integer cents.

use crate::error::PivotError;
use crate::invariant::invariant;
use crate::order::state::OrderItem;

/// Sum of `price_cents * quantity` across items.
pub fn calculate_total(items: &[OrderItem]) -> i64 {
    items
        .iter()
        .map(|item| item.price_cents * i64::from(item.quantity))
        .sum()
}

/// A discount applied to an order total.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscountRule {
    /// Fixed `amount_cents` off once the total reaches `threshold_cents`.
    Threshold {
        threshold_cents: i64,
        amount_cents: i64,
    },
    /// Percentage off, `0..=100`.
    Percent { percent: u8 },
}

/// Discount for `total_cents` under `rule`.
///
/// A threshold discount never exceeds the total; a percent discount
/// rounds down. Negative totals and percentages above 100 are validation
/// errors.
pub fn calculate_discount(total_cents: i64, rule: DiscountRule) -> Result<i64, PivotError> {
    invariant(total_cents >= 0, "total must be non-negative")?;
    match rule {
        DiscountRule::Threshold {
            threshold_cents,
            amount_cents,
        } => {
            if total_cents >= threshold_cents {
                Ok(amount_cents.min(total_cents))
            } else {
                Ok(0)
            }
        }
        DiscountRule::Percent { percent } => {
            invariant(percent <= 100, "percent must be between 0 and 100")?;
            Ok(total_cents * i64::from(percent) / 100)
        }
    }
}

/// Total after applying `rule`.
pub fn calculate_final_amount(total_cents: i64, rule: DiscountRule) -> Result<i64, PivotError> {
    Ok(total_cents - calculate_discount(total_cents, rule)?)
}

/// Render cents as a currency string, e.g. `format_amount(10000, "$")`
/// gives `"$100.00"`.
pub fn format_amount(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{currency}{}.{:02}", abs / 100, abs % 100)
}
