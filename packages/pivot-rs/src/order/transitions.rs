//! Order lifecycle transition table.
//!
//! Static data consulted on every `transition` call. Each entry is a pure
//! function returning a complete new state; timestamps come from the
//! [`TransitionInput`] so the functions stay replayable.
//!
//! ```text
//! draft:      submit → validating        save → draft (stamps saved_at)
//! validating: success → confirmed        fail → draft (carries error)
//! confirmed:  pay → paid                 cancel → cancelled
//! paid:       ship → shipped
//! shipped:    complete → completed
//! ```

use crate::machine::{TransitionInput, TransitionTable};
use crate::order::state::{OrderState, OrderStep};

/// Action data key carrying the confirmed order id.
pub const ORDER_ID_KEY: &str = "order_id";
/// Action data key carrying the shipment tracking number.
pub const TRACKING_NUMBER_KEY: &str = "tracking_number";
/// Action data key carrying the validation failure message.
pub const ERROR_KEY: &str = "error";

/// Build the order transition table.
pub fn order_transitions() -> TransitionTable<OrderStep, OrderState> {
    TransitionTable::new()
        .on(OrderStep::Draft, "submit", submit)
        .on(OrderStep::Draft, "save", save)
        .on(OrderStep::Validating, "success", success)
        .on(OrderStep::Validating, "fail", fail)
        .on(OrderStep::Confirmed, "pay", pay)
        .on(OrderStep::Confirmed, "cancel", cancel)
        .on(OrderStep::Paid, "ship", ship)
        .on(OrderStep::Shipped, "complete", complete)
}

fn submit(state: &OrderState, input: &TransitionInput) -> OrderState {
    OrderState {
        step: OrderStep::Validating,
        submitted_at: Some(input.at),
        ..state.clone()
    }
}

fn save(state: &OrderState, input: &TransitionInput) -> OrderState {
    OrderState {
        saved_at: Some(input.at),
        ..state.clone()
    }
}

fn success(state: &OrderState, input: &TransitionInput) -> OrderState {
    OrderState {
        step: OrderStep::Confirmed,
        order_id: input.str_value(ORDER_ID_KEY).map(str::to_string),
        confirmed_at: Some(input.at),
        ..state.clone()
    }
}

fn fail(state: &OrderState, input: &TransitionInput) -> OrderState {
    OrderState {
        step: OrderStep::Draft,
        error: input.str_value(ERROR_KEY).map(str::to_string),
        failed_at: Some(input.at),
        ..state.clone()
    }
}

fn pay(state: &OrderState, input: &TransitionInput) -> OrderState {
    OrderState {
        step: OrderStep::Paid,
        paid_at: Some(input.at),
        ..state.clone()
    }
}

fn cancel(state: &OrderState, input: &TransitionInput) -> OrderState {
    OrderState {
        step: OrderStep::Cancelled,
        cancelled_at: Some(input.at),
        ..state.clone()
    }
}

fn ship(state: &OrderState, input: &TransitionInput) -> OrderState {
    OrderState {
        step: OrderStep::Shipped,
        tracking_number: input.str_value(TRACKING_NUMBER_KEY).map(str::to_string),
        shipped_at: Some(input.at),
        ..state.clone()
    }
}

fn complete(state: &OrderState, input: &TransitionInput) -> OrderState {
    OrderState {
        step: OrderStep::Completed,
        completed_at: Some(input.at),
        ..state.clone()
    }
}
