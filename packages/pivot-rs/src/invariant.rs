//! Fail-fast precondition helpers.
//!
//! Commands check their arguments through these before touching any state,
//! so a failed check leaves the container exactly as it was.
//!
//! ```
//! use pivot::invariant::invariant;
//!
//! fn set_quantity(quantity: u32) -> Result<(), pivot::PivotError> {
//!     invariant(quantity > 0, "quantity must be positive")?;
//!     Ok(())
//! }
//! ```

use crate::error::PivotError;

/// Require `condition` to hold, failing with a [`PivotError::Validation`]
/// carrying `message` otherwise.
pub fn invariant(condition: bool, message: impl Into<String>) -> Result<(), PivotError> {
    if condition {
        Ok(())
    } else {
        Err(PivotError::validation(message))
    }
}

/// Require a string field to contain non-whitespace content.
pub fn invariant_present(value: &str, field: &str) -> Result<(), PivotError> {
    invariant(
        !value.trim().is_empty(),
        format!("{field} must not be empty"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passing_condition_is_ok() {
        assert!(invariant(true, "unused").is_ok());
    }

    #[test]
    fn failing_condition_carries_message() {
        let err = invariant(false, "quantity must be positive").unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "invariant failed: quantity must be positive");
    }

    #[test]
    fn present_rejects_whitespace() {
        assert!(invariant_present("user", "username").is_ok());
        let err = invariant_present("   ", "username").unwrap_err();
        assert!(err.to_string().contains("username must not be empty"));
    }
}
