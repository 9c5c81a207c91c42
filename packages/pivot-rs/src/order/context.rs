//! Injected capabilities and context values for the order engine.
//!
//! The order machine's transition functions are pure; IO lives in the
//! capabilities the host injects here and is driven by the engine's async
//! flow methods. Context *values* (plain data merged under every action's
//! data) ride along in the same contract, mirroring how hosts thread
//! request-scoped facts into transitions.

use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};

use crate::deps::Checklist;
use crate::error::PivotError;
use crate::order::state::OrderItem;

/// Payload for the injected `create_order` capability.
#[derive(Clone, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub struct OrderSubmission {
    pub items: Vec<OrderItem>,
    pub total_cents: i64,
}

pub(crate) type CreateOrderFn =
    Arc<dyn Fn(OrderSubmission) -> BoxFuture<'static, Result<String>> + Send + Sync>;
pub(crate) type ValidateInventoryFn =
    Arc<dyn Fn(Vec<OrderItem>) -> BoxFuture<'static, Result<bool>> + Send + Sync>;
pub(crate) type PayOrderFn =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<bool>> + Send + Sync>;

/// Validated capability set (plus context values) for one order engine.
#[derive(Clone)]
pub struct OrderContext {
    pub(crate) create_order: CreateOrderFn,
    pub(crate) validate_inventory: ValidateInventoryFn,
    pub(crate) pay_order: PayOrderFn,
    pub(crate) values: Map<String, Value>,
}

impl OrderContext {
    /// Start assembling the contract.
    pub fn builder() -> OrderContextBuilder {
        OrderContextBuilder::default()
    }
}

impl std::fmt::Debug for OrderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderContext")
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

/// Collects order capabilities; `build()` validates them all at once.
#[derive(Default)]
pub struct OrderContextBuilder {
    create_order: Option<CreateOrderFn>,
    validate_inventory: Option<ValidateInventoryFn>,
    pay_order: Option<PayOrderFn>,
    values: Map<String, Value>,
}

impl OrderContextBuilder {
    /// Create the order in the backing system, returning its id.
    pub fn create_order<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(OrderSubmission) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<String>> + Send + 'static,
    {
        self.create_order = Some(Arc::new(move |submission| f(submission).boxed()));
        self
    }

    /// Check stock for the given items.
    pub fn validate_inventory<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Vec<OrderItem>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<bool>> + Send + 'static,
    {
        self.validate_inventory = Some(Arc::new(move |items| f(items).boxed()));
        self
    }

    /// Charge the confirmed order.
    pub fn pay_order<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<bool>> + Send + 'static,
    {
        self.pay_order = Some(Arc::new(move |order_id| f(order_id).boxed()));
        self
    }

    /// Add a plain context value, merged under every action's data.
    pub fn value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Validate the whole contract; every missing capability is reported.
    pub fn build(self) -> Result<OrderContext, PivotError> {
        let mut check = Checklist::new("order engine");
        check.require("create_order", &self.create_order);
        check.require("validate_inventory", &self.validate_inventory);
        check.require("pay_order", &self.pay_order);
        check.finish()?;

        let (Some(create_order), Some(validate_inventory), Some(pay_order)) =
            (self.create_order, self.validate_inventory, self.pay_order)
        else {
            unreachable!("checklist verified every capability above");
        };
        Ok(OrderContext {
            create_order,
            validate_inventory,
            pay_order,
            values: self.values,
        })
    }
}
