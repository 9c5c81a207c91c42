//! Scripted fake dependencies for tests and host development.
//!
//! Each helper returns a fully-built capability set plus a [`CallLog`]
//! recording every capability invocation in order, so tests can assert
//! both state outcomes and side-effect sequencing.
//!
//! Available under `#[cfg(test)]` and behind the `testing` feature for
//! downstream crates.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::anyhow;

use crate::login::{LoginDeps, LoginSession, UserProfile};
use crate::order::cart::{CartDeps, OrderReceipt};
use crate::order::OrderContext;

/// Shared, ordered record of capability calls.
#[derive(Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Append one call record.
    pub fn record(&self, entry: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// The canned session every scripted login resolves with.
pub fn scripted_session() -> LoginSession {
    LoginSession {
        token: "scripted-token".to_string(),
        user: UserProfile {
            id: "1".to_string(),
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            avatar: None,
        },
    }
}

/// Login capabilities that always succeed, recording every call.
pub fn scripted_login_deps() -> (LoginDeps, CallLog) {
    let log = CallLog::default();

    let request_log = log.clone();
    let save_log = log.clone();
    let clear_log = log.clone();
    let navigate_log = log.clone();

    let deps = LoginDeps::builder()
        .login_request(move |payload| {
            request_log.record(format!("login_request:{}", payload.username));
            async { Ok(scripted_session()) }
        })
        .save_token(move |token| {
            save_log.record(format!("save_token:{token}"));
            Ok(())
        })
        .clear_token(move || {
            clear_log.record("clear_token");
            Ok(())
        })
        .navigate(move |path| {
            navigate_log.record(format!("navigate:{path}"));
            Ok(())
        })
        .build()
        .expect("scripted login deps are complete");

    (deps, log)
}

/// Login capabilities whose request always rejects with `message`.
pub fn failing_login_deps(message: &str) -> LoginDeps {
    let message = message.to_string();
    LoginDeps::builder()
        .login_request(move |_payload| {
            let message = message.clone();
            async move { Err(anyhow!(message)) }
        })
        .save_token(|_token| Ok(()))
        .clear_token(|| Ok(()))
        .navigate(|_path| Ok(()))
        .build()
        .expect("failing login deps are complete")
}

/// Order capabilities that always succeed, recording every call.
///
/// `create_order` resolves with the id `scripted-order`.
pub fn scripted_order_context() -> (OrderContext, CallLog) {
    let log = CallLog::default();

    let inventory_log = log.clone();
    let create_log = log.clone();
    let pay_log = log.clone();

    let ctx = OrderContext::builder()
        .validate_inventory(move |items| {
            inventory_log.record(format!("validate_inventory:{}", items.len()));
            async { Ok(true) }
        })
        .create_order(move |submission| {
            create_log.record(format!("create_order:{}", submission.total_cents));
            async { Ok("scripted-order".to_string()) }
        })
        .pay_order(move |order_id| {
            pay_log.record(format!("pay_order:{order_id}"));
            async { Ok(true) }
        })
        .build()
        .expect("scripted order context is complete");

    (ctx, log)
}

/// Order capabilities whose stock check always turns the order down.
pub fn out_of_stock_order_context() -> (OrderContext, CallLog) {
    let log = CallLog::default();

    let inventory_log = log.clone();
    let create_log = log.clone();
    let pay_log = log.clone();

    let ctx = OrderContext::builder()
        .validate_inventory(move |items| {
            inventory_log.record(format!("validate_inventory:{}", items.len()));
            async { Ok(false) }
        })
        .create_order(move |submission| {
            create_log.record(format!("create_order:{}", submission.total_cents));
            async { Ok("scripted-order".to_string()) }
        })
        .pay_order(move |order_id| {
            pay_log.record(format!("pay_order:{order_id}"));
            async { Ok(true) }
        })
        .build()
        .expect("out-of-stock order context is complete");

    (ctx, log)
}

/// Cart capabilities that always succeed, recording each submission as
/// `submit_order:<id>x<qty>,...:<total>`.
///
/// `submit_order` resolves with the receipt id `scripted-receipt`.
pub fn scripted_cart_deps() -> (CartDeps, CallLog) {
    let log = CallLog::default();

    let submit_log = log.clone();
    let deps = CartDeps::builder()
        .submit_order(move |submission| {
            let lines: Vec<String> = submission
                .items
                .iter()
                .map(|line| format!("{}x{}", line.product_id, line.quantity))
                .collect();
            submit_log.record(format!(
                "submit_order:{}:{}",
                lines.join(","),
                submission.total_cents
            ));
            async {
                Ok(OrderReceipt {
                    id: "scripted-receipt".to_string(),
                })
            }
        })
        .build()
        .expect("scripted cart deps are complete");

    (deps, log)
}

/// Cart capabilities whose submission always rejects with `message`.
pub fn failing_cart_deps(message: &str) -> CartDeps {
    let message = message.to_string();
    CartDeps::builder()
        .submit_order(move |_submission| {
            let message = message.clone();
            async move { Err(anyhow!(message)) }
        })
        .build()
        .expect("failing cart deps are complete")
}
