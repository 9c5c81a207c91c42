//! Structured error types for pivot engines.
//!
//! `PivotError` provides pattern-matchable errors instead of generic
//! `anyhow::Error`.
//!
//! # The Error Boundary Rule
//!
//! > **`anyhow` is internal transport; `PivotError` is the public surface.**
//!
//! Injected capabilities fail with `anyhow::Error` (ergonomic for host
//! applications). Engines wrap those failures in [`PivotError::Dependency`],
//! which is `transparent` - the caller sees the original message unchanged.
//!
//! # Taxonomy
//!
//! | Variant | Raised | Fatal to |
//! |---|---|---|
//! | `Configuration` | engine construction | construction |
//! | `Validation` | before any state mutation | the command call |
//! | `UnknownState` | transition lookup | the transition call |
//! | `InvalidAction` | transition lookup | the transition call |
//! | `Dependency` | after state records the failure | the command call |
//!
//! Listener failures are not represented here: a panicking subscriber is
//! caught and logged inside the container, never surfaced to the mutator.

use thiserror::Error;

/// Structured error type for pivot operations.
///
/// Each variant includes the context a caller needs to react without
/// parsing message strings.
#[derive(Debug, Error)]
pub enum PivotError {
    /// Dependency injection failed validation at engine construction.
    ///
    /// Carries every problem found, not just the first, so a misconfigured
    /// host sees the full repair list in one round.
    #[error("invalid dependencies:\n{}", .problems.join("\n"))]
    Configuration {
        /// One human-readable message per missing or unusable capability.
        problems: Vec<String>,
    },

    /// A command precondition or argument check failed.
    ///
    /// Raised synchronously before any state mutation; the container is
    /// untouched when this error reaches the caller.
    #[error("invariant failed: {message}")]
    Validation {
        /// What was violated.
        message: String,
    },

    /// The transition table has no entries for the current state tag.
    ///
    /// Terminal states hit this for every action.
    #[error("no transitions defined for state {state}")]
    UnknownState {
        /// Display form of the state tag.
        state: String,
    },

    /// The current state tag does not accept the requested action.
    ///
    /// Carries the full set of actions the state does accept, sorted, so
    /// tests and debugging sessions see the legal moves at a glance.
    #[error("invalid action {action} for state {state}; valid actions: {}", .valid.join(", "))]
    InvalidAction {
        /// Display form of the state tag.
        state: String,
        /// The action that was requested.
        action: String,
        /// Actions the state accepts, sorted.
        valid: Vec<String>,
    },

    /// An injected capability call failed.
    ///
    /// The owning command records the failure in state *before* returning
    /// this, so readers are never inconsistent with the last known outcome.
    /// Transparent: the caller sees the capability's original message.
    #[error(transparent)]
    Dependency(#[from] anyhow::Error),
}

impl PivotError {
    /// Build a `Configuration` error from collected problem messages.
    pub fn configuration(problems: Vec<String>) -> Self {
        PivotError::Configuration { problems }
    }

    /// Build a `Validation` error.
    pub fn validation(message: impl Into<String>) -> Self {
        PivotError::Validation {
            message: message.into(),
        }
    }

    /// Returns true for the pre-mutation validation variant.
    pub fn is_validation(&self) -> bool {
        matches!(self, PivotError::Validation { .. })
    }

    /// Returns true for either transition-lookup variant.
    pub fn is_transition(&self) -> bool {
        matches!(
            self,
            PivotError::UnknownState { .. } | PivotError::InvalidAction { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_lists_every_problem() {
        let err = PivotError::configuration(vec![
            "missing required dependency: login_request".to_string(),
            "missing required dependency: navigate".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("login_request"));
        assert!(msg.contains("navigate"));
    }

    #[test]
    fn validation_display_carries_message() {
        let err = PivotError::validation("password must be at least 6 characters");
        assert_eq!(
            err.to_string(),
            "invariant failed: password must be at least 6 characters"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn invalid_action_lists_valid_actions() {
        let err = PivotError::InvalidAction {
            state: "draft".to_string(),
            action: "pay".to_string(),
            valid: vec!["save".to_string(), "submit".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("invalid action pay for state draft"));
        assert!(msg.contains("valid actions: save, submit"));
        assert!(err.is_transition());
    }

    #[test]
    fn dependency_is_transparent() {
        let err: PivotError = anyhow::anyhow!("bad creds").into();
        assert_eq!(err.to_string(), "bad creds");
    }

    #[test]
    fn error_is_pattern_matchable() {
        let err = PivotError::UnknownState {
            state: "completed".to_string(),
        };
        match &err {
            PivotError::UnknownState { state } => assert_eq!(state, "completed"),
            _ => panic!("expected UnknownState"),
        }
    }
}
