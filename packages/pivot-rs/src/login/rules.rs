//! Login rules - pure, read-only business predicates.
//!
//! Rules answer questions about the live state and never call
//! dependencies or mutate. UIs render from these instead of catching
//! command errors.

use std::sync::Arc;

use crate::container::StateContainer;
use crate::login::commands::MIN_PASSWORD_LEN;
use crate::login::state::{LoginState, LoginStatus};

/// Rule surface of one login engine.
#[derive(Clone)]
pub struct LoginRules {
    pub(crate) container: Arc<StateContainer<LoginState>>,
}

impl LoginRules {
    /// All required fields are well-formed and no submit is in flight.
    pub fn can_submit(&self) -> bool {
        let state = self.container.state();
        !state.username.trim().is_empty()
            && state.password.len() >= MIN_PASSWORD_LEN
            && state.status != LoginStatus::Submitting
    }

    /// A login request is currently in flight.
    pub fn is_submitting(&self) -> bool {
        self.container.state().status == LoginStatus::Submitting
    }

    /// The last submit failed.
    pub fn has_error(&self) -> bool {
        self.container.state().status == LoginStatus::Error
    }

    /// The last submit succeeded.
    pub fn is_authenticated(&self) -> bool {
        self.container.state().status == LoginStatus::Success
    }

    /// The latest error message, or empty when there is none.
    pub fn error_message(&self) -> String {
        self.container.state().error.unwrap_or_default()
    }
}

impl std::fmt::Debug for LoginRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRules").finish_non_exhaustive()
    }
}
