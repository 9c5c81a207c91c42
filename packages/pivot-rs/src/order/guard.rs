//! Order guards - pure legality checks for cart mutations.
//!
//! Guards validate a requested change against the current state and fail
//! with a validation error before anything mutates. No side effects.

use crate::error::PivotError;
use crate::invariant::{invariant, invariant_present};
use crate::order::cart::{CartState, CartStatus};
use crate::order::state::OrderItem;

/// The cart can be submitted: not mid-submit, not empty, not carrying a
/// stale error.
pub fn assert_can_submit(state: &CartState) -> Result<(), PivotError> {
    invariant(
        matches!(state.status, CartStatus::Editing | CartStatus::Idle),
        format!("cannot submit order with status {:?}", state.status),
    )?;
    invariant(!state.items.is_empty(), "cannot submit empty order")?;
    if let Some(error) = &state.error {
        return Err(PivotError::validation(format!(
            "cannot submit order with error: {error}"
        )));
    }
    Ok(())
}

/// The item is well-formed: identified, named, positively priced, with a
/// positive whole quantity.
pub fn assert_valid_item(item: &OrderItem) -> Result<(), PivotError> {
    invariant_present(&item.product_id, "product_id")?;
    invariant_present(&item.name, "item name")?;
    invariant(item.price_cents > 0, "price must be positive")?;
    assert_valid_quantity(item.quantity)
}

/// Quantities are positive whole numbers.
pub fn assert_valid_quantity(quantity: u32) -> Result<(), PivotError> {
    invariant(quantity > 0, "quantity must be positive")
}

/// The product is present in the cart.
pub fn assert_product_exists(state: &CartState, product_id: &str) -> Result<(), PivotError> {
    invariant_present(product_id, "product_id")?;
    invariant(
        state.items.iter().any(|item| item.product_id == product_id),
        format!("product {product_id} not found in order"),
    )
}
