//! Cart engine - the command/rule engine for the order editing phase.
//!
//! Covers everything before a lifecycle run: line items in, line items
//! out, quantity edits, derived totals, and a guarded submit through the
//! injected `submit_order` capability. Commands batch their writes so each
//! mutation notifies subscribers exactly once, with the recalculated
//! derived fields already in place.

use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::container::{StateContainer, Subscription};
use crate::deps::Checklist;
use crate::engine::Engine;
use crate::error::PivotError;
use crate::order::guard;
use crate::order::pricing::calculate_total;
use crate::order::state::OrderItem;

/// Cart submit status, the cart's implicit status machine:
/// `idle → editing → submitting → {completed | failed}`, with edits
/// returning a failed cart to `editing`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartStatus {
    Idle,
    Editing,
    Submitting,
    Completed,
    Failed,
}

/// Complete cart state; `total_cents` and `can_submit` are derived and
/// recomputed on every mutation.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct CartState {
    pub items: Vec<OrderItem>,
    pub status: CartStatus,
    pub can_submit: bool,
    pub total_cents: i64,
    pub error: Option<String>,
    pub order_id: Option<String>,
}

impl CartState {
    /// Empty idle cart.
    pub fn initial() -> Self {
        Self {
            items: Vec::new(),
            status: CartStatus::Idle,
            can_submit: false,
            total_cents: 0,
            error: None,
            order_id: None,
        }
    }

    /// Recompute the derived fields from items and status.
    fn recalculated(mut self) -> Self {
        self.total_cents = calculate_total(&self.items);
        self.can_submit = guard::assert_can_submit(&self).is_ok();
        self
    }
}

impl Default for CartState {
    fn default() -> Self {
        Self::initial()
    }
}

/// One line of the payload posted to `submit_order`.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: u32,
}

/// Payload posted to the injected `submit_order` capability.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CartSubmission {
    pub items: Vec<CartLine>,
    pub total_cents: i64,
}

/// Backend acknowledgement of a submitted cart.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub id: String,
}

pub(crate) type SubmitOrderFn =
    Arc<dyn Fn(CartSubmission) -> BoxFuture<'static, Result<OrderReceipt>> + Send + Sync>;

/// Validated capability set for one cart engine.
#[derive(Clone)]
pub struct CartDeps {
    pub(crate) submit_order: SubmitOrderFn,
}

impl CartDeps {
    /// Start assembling the capability set.
    pub fn builder() -> CartDepsBuilder {
        CartDepsBuilder::default()
    }
}

impl std::fmt::Debug for CartDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartDeps").finish_non_exhaustive()
    }
}

/// Collects cart capabilities; `build()` validates them.
#[derive(Default)]
pub struct CartDepsBuilder {
    submit_order: Option<SubmitOrderFn>,
}

impl CartDepsBuilder {
    /// Post the cart to the backing system, returning a receipt.
    pub fn submit_order<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(CartSubmission) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<OrderReceipt>> + Send + 'static,
    {
        self.submit_order = Some(Arc::new(move |submission| f(submission).boxed()));
        self
    }

    /// Validate the capability set.
    pub fn build(self) -> Result<CartDeps, PivotError> {
        let mut check = Checklist::new("cart engine");
        check.require("submit_order", &self.submit_order);
        check.finish()?;

        let Some(submit_order) = self.submit_order else {
            unreachable!("checklist verified submit_order above");
        };
        Ok(CartDeps { submit_order })
    }
}

/// One cart instance.
#[derive(Clone)]
pub struct CartEngine {
    id: Uuid,
    container: Arc<StateContainer<CartState>>,
    commands: CartCommands,
    rules: CartRules,
}

impl CartEngine {
    /// Build an engine over an empty idle cart.
    pub fn new(deps: CartDeps) -> Self {
        let id = Uuid::new_v4();
        let container = Arc::new(StateContainer::new(CartState::initial()));
        let commands = CartCommands {
            engine_id: id,
            container: container.clone(),
            deps,
        };
        let rules = CartRules {
            container: container.clone(),
        };
        debug!(engine_id = %id, "cart engine constructed");
        Self {
            id,
            container,
            commands,
            rules,
        }
    }

    /// Engine instance id, carried in tracing fields.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The validated mutation surface.
    pub fn commands(&self) -> &CartCommands {
        &self.commands
    }

    /// The pure predicate surface.
    pub fn rules(&self) -> &CartRules {
        &self.rules
    }
}

impl Engine for CartEngine {
    type State = CartState;

    fn state(&self) -> CartState {
        self.container.state()
    }

    fn subscribe(
        &self,
        listener: impl Fn(&CartState) + Send + Sync + 'static,
    ) -> Subscription {
        self.container.subscribe(listener)
    }
}

impl std::fmt::Debug for CartEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartEngine").field("id", &self.id).finish()
    }
}

/// Command surface of one cart engine.
#[derive(Clone)]
pub struct CartCommands {
    engine_id: Uuid,
    container: Arc<StateContainer<CartState>>,
    deps: CartDeps,
}

impl CartCommands {
    /// Add a line item. An empty unit gets the default.
    pub fn add_item(&self, item: OrderItem) -> Result<(), PivotError> {
        guard::assert_valid_item(&item)?;
        let item = if item.unit.is_empty() {
            item.with_unit(OrderItem::DEFAULT_UNIT)
        } else {
            item
        };
        self.container.batch(|c| {
            c.update(move |state| {
                let mut items = state.items.clone();
                items.push(item.clone());
                CartState {
                    items,
                    status: CartStatus::Editing,
                    error: None,
                    ..state.clone()
                }
            });
            c.update(|state| state.clone().recalculated());
        });
        Ok(())
    }

    /// Remove the line for `product_id`.
    pub fn remove_item(&self, product_id: &str) -> Result<(), PivotError> {
        let state = self.container.state();
        guard::assert_product_exists(&state, product_id)?;
        let product_id = product_id.to_string();
        self.container.batch(|c| {
            c.update(move |state| {
                let mut items = state.items.clone();
                items.retain(|item| item.product_id != product_id);
                let status = if items.is_empty() {
                    CartStatus::Idle
                } else {
                    CartStatus::Editing
                };
                CartState {
                    items,
                    status,
                    error: None,
                    ..state.clone()
                }
            });
            c.update(|state| state.clone().recalculated());
        });
        Ok(())
    }

    /// Change the quantity on the line for `product_id`.
    pub fn update_qty(&self, product_id: &str, quantity: u32) -> Result<(), PivotError> {
        guard::assert_valid_quantity(quantity)?;
        let state = self.container.state();
        guard::assert_product_exists(&state, product_id)?;
        let product_id = product_id.to_string();
        self.container.batch(|c| {
            c.update(move |state| {
                let items = state
                    .items
                    .iter()
                    .map(|item| {
                        if item.product_id == product_id {
                            OrderItem {
                                quantity,
                                ..item.clone()
                            }
                        } else {
                            item.clone()
                        }
                    })
                    .collect();
                CartState {
                    items,
                    status: CartStatus::Editing,
                    error: None,
                    ..state.clone()
                }
            });
            c.update(|state| state.clone().recalculated());
        });
        Ok(())
    }

    /// Submit the cart through the injected `submit_order`.
    ///
    /// Guarded by [`guard::assert_can_submit`]: a failed cart must be
    /// edited before it can go again. On success the receipt id lands in
    /// state under `Completed`; on capability failure the message lands
    /// under `Failed` and the original error is returned.
    pub async fn submit(&self) -> Result<(), PivotError> {
        let state = self.container.state();
        guard::assert_can_submit(&state)?;

        self.container.update(|s| {
            CartState {
                status: CartStatus::Submitting,
                error: None,
                ..s.clone()
            }
            .recalculated()
        });
        debug!(engine_id = %self.engine_id, "cart submit started");

        let submission = CartSubmission {
            items: state
                .items
                .iter()
                .map(|item| CartLine {
                    product_id: item.product_id.clone(),
                    quantity: item.quantity,
                })
                .collect(),
            total_cents: state.total_cents,
        };
        match (self.deps.submit_order)(submission).await {
            Ok(receipt) => {
                self.container.update(move |s| {
                    CartState {
                        status: CartStatus::Completed,
                        order_id: Some(receipt.id.clone()),
                        ..s.clone()
                    }
                    .recalculated()
                });
                info!(engine_id = %self.engine_id, "cart submitted");
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                self.container.update(move |s| {
                    CartState {
                        status: CartStatus::Failed,
                        error: Some(message.clone()),
                        ..s.clone()
                    }
                    .recalculated()
                });
                warn!(engine_id = %self.engine_id, error = %err, "cart submit failed");
                Err(PivotError::Dependency(err))
            }
        }
    }

    /// Empty the cart back to its initial state.
    pub fn reset(&self) {
        self.container.replace(CartState::initial());
        debug!(engine_id = %self.engine_id, "cart reset");
    }
}

impl std::fmt::Debug for CartCommands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartCommands")
            .field("engine_id", &self.engine_id)
            .finish()
    }
}

/// Rule surface of one cart engine.
#[derive(Clone)]
pub struct CartRules {
    container: Arc<StateContainer<CartState>>,
}

impl CartRules {
    /// The cart is submittable right now.
    pub fn can_submit(&self) -> bool {
        self.container.state().can_submit
    }

    /// A submit is in flight.
    pub fn is_submitting(&self) -> bool {
        self.container.state().status == CartStatus::Submitting
    }

    /// The last submit succeeded.
    pub fn is_completed(&self) -> bool {
        self.container.state().status == CartStatus::Completed
    }

    /// The last submit failed.
    pub fn has_error(&self) -> bool {
        self.container.state().status == CartStatus::Failed
    }

    /// Current derived total in cents.
    pub fn total_cents(&self) -> i64 {
        self.container.state().total_cents
    }
}

impl std::fmt::Debug for CartRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartRules").finish_non_exhaustive()
    }
}
