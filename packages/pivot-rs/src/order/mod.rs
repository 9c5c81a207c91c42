//! Order engine - the transition-table engine for a multi-step order
//! lifecycle, plus the cart (command/rule) engine and pricing services.
//!
//! The lifecycle engine is an instantiation of the generic
//! [`StatefulEngine`]: state moves only through table lookups, and the
//! async flow methods drive the injected capabilities between moves. The
//! cart engine in [`cart`] covers the editing phase before a lifecycle
//! run starts.

pub mod cart;
mod context;
pub mod guard;
pub mod pricing;
mod state;
mod transitions;

pub use context::{OrderContext, OrderContextBuilder, OrderSubmission};
pub use state::{OrderItem, OrderState, OrderStep};
pub use transitions::{order_transitions, ERROR_KEY, ORDER_ID_KEY, TRACKING_NUMBER_KEY};

use anyhow::anyhow;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::container::Subscription;
use crate::engine::Engine;
use crate::error::PivotError;
use crate::invariant::invariant;
use crate::machine::StatefulEngine;

/// Message recorded when stock validation turns the order down.
const INVENTORY_UNAVAILABLE: &str = "inventory unavailable";

/// One order lifecycle instance.
///
/// Starts as an empty `draft`; every move goes through
/// [`OrderActions::transition`] or one of its typed shorthands.
#[derive(Clone)]
pub struct OrderEngine {
    inner: StatefulEngine<OrderStep, OrderState>,
    ctx: OrderContext,
}

impl OrderEngine {
    /// Build an engine over an empty draft.
    ///
    /// `ctx` has already passed aggregated validation in
    /// [`OrderContext::builder`]; its plain values are merged under every
    /// action's data.
    pub fn new(ctx: OrderContext) -> Self {
        Self::with_initial(ctx, OrderState::initial())
    }

    /// Build an engine over a draft seeded with items.
    pub fn with_items(ctx: OrderContext, items: Vec<OrderItem>) -> Self {
        Self::with_initial(ctx, OrderState::with_items(items))
    }

    fn with_initial(ctx: OrderContext, initial: OrderState) -> Self {
        let inner = StatefulEngine::new(
            initial,
            order_transitions(),
            ctx.values.clone(),
            |state| state.step,
        );
        Self { inner, ctx }
    }

    /// Engine instance id, carried in tracing fields.
    pub fn id(&self) -> Uuid {
        self.inner.id()
    }

    /// The action surface.
    pub fn actions(&self) -> OrderActions {
        OrderActions {
            inner: self.inner.clone(),
            ctx: self.ctx.clone(),
        }
    }

    /// Actions the current step accepts, sorted.
    pub fn valid_actions(&self) -> Vec<&'static str> {
        self.inner.valid_actions()
    }
}

impl Engine for OrderEngine {
    type State = OrderState;

    fn state(&self) -> OrderState {
        self.inner.state()
    }

    fn subscribe(
        &self,
        listener: impl Fn(&OrderState) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.subscribe(listener)
    }
}

impl std::fmt::Debug for OrderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderEngine").field("id", &self.id()).finish()
    }
}

/// Action surface of one order engine.
///
/// `transition` is the raw table lookup; the typed shorthands cover each
/// lifecycle action; the async flow methods drive injected capabilities
/// and apply the resulting moves.
#[derive(Clone)]
pub struct OrderActions {
    inner: StatefulEngine<OrderStep, OrderState>,
    ctx: OrderContext,
}

impl OrderActions {
    /// Apply `action` with `data` against the transition table.
    pub fn transition(&self, action: &str, data: Value) -> Result<OrderState, PivotError> {
        self.inner.transition(action, data)
    }

    /// `draft --submit--> validating`
    pub fn submit(&self) -> Result<OrderState, PivotError> {
        self.transition("submit", Value::Null)
    }

    /// `draft --save--> draft` (stamps `saved_at`)
    pub fn save(&self) -> Result<OrderState, PivotError> {
        self.transition("save", Value::Null)
    }

    /// `validating --success--> confirmed`
    pub fn succeed(&self, order_id: &str) -> Result<OrderState, PivotError> {
        self.transition("success", json!({ ORDER_ID_KEY: order_id }))
    }

    /// `validating --fail--> draft` (carries the error)
    pub fn fail(&self, error: &str) -> Result<OrderState, PivotError> {
        self.transition("fail", json!({ ERROR_KEY: error }))
    }

    /// `confirmed --pay--> paid`
    pub fn pay(&self) -> Result<OrderState, PivotError> {
        self.transition("pay", Value::Null)
    }

    /// `confirmed --cancel--> cancelled`
    pub fn cancel(&self) -> Result<OrderState, PivotError> {
        self.transition("cancel", Value::Null)
    }

    /// `paid --ship--> shipped` (carries the tracking number)
    pub fn ship(&self, tracking_number: &str) -> Result<OrderState, PivotError> {
        self.transition("ship", json!({ TRACKING_NUMBER_KEY: tracking_number }))
    }

    /// `shipped --complete--> completed`
    pub fn complete(&self) -> Result<OrderState, PivotError> {
        self.transition("complete", Value::Null)
    }

    /// Drive the draft through validation: submit, check stock, create the
    /// order, and land in `confirmed` (or back in `draft` on rejection).
    ///
    /// Returns the state after the final move. Capability failures apply
    /// the `fail` move first, then surface the original error; a stock
    /// rejection is a domain outcome, not an error, and lands back in
    /// `draft` with the rejection message recorded.
    pub async fn submit_and_validate(&self) -> Result<OrderState, PivotError> {
        let state = self.submit()?;
        info!(engine_id = %self.inner.id(), "order submitted for validation");

        let available = match (self.ctx.validate_inventory)(state.items.clone()).await {
            Ok(available) => available,
            Err(err) => {
                warn!(engine_id = %self.inner.id(), error = %err, "inventory check failed");
                self.fail(&err.to_string())?;
                return Err(PivotError::Dependency(err));
            }
        };
        if !available {
            return self.fail(INVENTORY_UNAVAILABLE);
        }

        let submission = OrderSubmission {
            items: state.items.clone(),
            total_cents: state.total_cents,
        };
        match (self.ctx.create_order)(submission).await {
            Ok(order_id) => {
                info!(engine_id = %self.inner.id(), %order_id, "order confirmed");
                self.succeed(&order_id)
            }
            Err(err) => {
                warn!(engine_id = %self.inner.id(), error = %err, "order creation failed");
                self.fail(&err.to_string())?;
                Err(PivotError::Dependency(err))
            }
        }
    }

    /// Charge a confirmed order and apply the `pay` move.
    ///
    /// The order must be `confirmed` with an id. A declined charge leaves
    /// the state in `confirmed` and surfaces an error; nothing about the
    /// order is lost.
    pub async fn settle_payment(&self) -> Result<OrderState, PivotError> {
        let state = self.inner.state();
        invariant(
            state.step == OrderStep::Confirmed,
            format!("cannot pay order in step {}", state.step),
        )?;
        let order_id = state
            .order_id
            .clone()
            .ok_or_else(|| PivotError::validation("confirmed order has no order id"))?;

        let charged = (self.ctx.pay_order)(order_id.clone()).await?;
        if !charged {
            warn!(engine_id = %self.inner.id(), %order_id, "payment declined");
            return Err(PivotError::Dependency(anyhow!(
                "payment declined for order {order_id}"
            )));
        }
        info!(engine_id = %self.inner.id(), %order_id, "payment settled");
        self.pay()
    }
}

impl std::fmt::Debug for OrderActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderActions").finish_non_exhaustive()
    }
}
