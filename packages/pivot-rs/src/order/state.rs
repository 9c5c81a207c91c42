//! Order workflow state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discrete step of the order lifecycle.
///
/// ```text
/// draft → validating → confirmed → paid → shipped → completed
///             ↓            ↓
///           draft       cancelled
///          (on fail)
/// ```
///
/// `Completed` and `Cancelled` are terminal: the transition table has no
/// entries for them, so every action fails there.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStep {
    Draft,
    Validating,
    Confirmed,
    Paid,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStep {
    /// True for steps with no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStep::Completed | OrderStep::Cancelled)
    }
}

impl fmt::Display for OrderStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStep::Draft => "draft",
            OrderStep::Validating => "validating",
            OrderStep::Confirmed => "confirmed",
            OrderStep::Paid => "paid",
            OrderStep::Shipped => "shipped",
            OrderStep::Completed => "completed",
            OrderStep::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}

/// One line of an order. Money is integer cents.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub price_cents: i64,
    pub quantity: u32,
    pub unit: String,
}

impl OrderItem {
    /// Default unit applied when the host does not specify one.
    pub const DEFAULT_UNIT: &'static str = "each";

    /// Item with the default unit.
    pub fn new(
        product_id: impl Into<String>,
        name: impl Into<String>,
        price_cents: i64,
        quantity: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            price_cents,
            quantity,
            unit: Self::DEFAULT_UNIT.to_string(),
        }
    }

    /// Same item with an explicit unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }
}

/// Complete order-machine state; replaced wholesale on every transition.
///
/// Each lifecycle move stamps its own timestamp, so the state doubles as a
/// coarse audit trail of the run.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct OrderState {
    pub step: OrderStep,
    pub items: Vec<OrderItem>,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub error: Option<String>,
    pub order_id: Option<String>,
    pub tracking_number: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub saved_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl OrderState {
    /// Empty draft created now.
    pub fn initial() -> Self {
        Self::with_items(Vec::new())
    }

    /// Draft seeded with items; the total is derived from them.
    pub fn with_items(items: Vec<OrderItem>) -> Self {
        let total_cents = crate::order::pricing::calculate_total(&items);
        Self {
            step: OrderStep::Draft,
            items,
            total_cents,
            created_at: Utc::now(),
            error: None,
            order_id: None,
            tracking_number: None,
            submitted_at: None,
            saved_at: None,
            failed_at: None,
            confirmed_at: None,
            paid_at: None,
            cancelled_at: None,
            shipped_at: None,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_an_empty_draft() {
        let state = OrderState::initial();
        assert_eq!(state.step, OrderStep::Draft);
        assert!(state.items.is_empty());
        assert_eq!(state.total_cents, 0);
        assert!(state.error.is_none());
        assert!(state.order_id.is_none());
    }

    #[test]
    fn with_items_derives_the_total() {
        let state = OrderState::with_items(vec![
            OrderItem::new("p1", "Coffee", 450, 2),
            OrderItem::new("p2", "Beans", 1200, 1),
        ]);
        assert_eq!(state.total_cents, 2100);
    }

    #[test]
    fn step_display_matches_wire_form() {
        assert_eq!(OrderStep::Draft.to_string(), "draft");
        assert_eq!(OrderStep::Validating.to_string(), "validating");
        assert_eq!(
            serde_json::to_string(&OrderStep::Confirmed).unwrap(),
            "\"confirmed\""
        );
    }

    #[test]
    fn terminal_steps() {
        assert!(OrderStep::Completed.is_terminal());
        assert!(OrderStep::Cancelled.is_terminal());
        assert!(!OrderStep::Paid.is_terminal());
    }
}
