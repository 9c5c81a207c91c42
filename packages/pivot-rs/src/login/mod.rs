//! Login engine - the command/rule engine for an authentication workflow.
//!
//! Composition: a [`StateContainer`] holding [`LoginState`], a command
//! surface for validated (possibly asynchronous) mutations, a rule surface
//! for pure predicates, and an injected [`LoginDeps`] capability set.
//!
//! The implicit status machine:
//!
//! ```text
//! idle → editing → submitting → success
//!                      │
//!                      └──────→ error
//! (reset returns to idle from any status)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let deps = LoginDeps::builder()
//!     .login_request(|payload| async move { api.login(payload).await })
//!     .save_token(|token| vault.store(token))
//!     .clear_token(|| vault.clear())
//!     .navigate(|path| router.push(path))
//!     .build()?;
//!
//! let engine = LoginEngine::new(deps);
//! engine.commands().set_username("a@b.com");
//! engine.commands().set_password("hunter22")?;
//! if engine.rules().can_submit() {
//!     engine.commands().submit().await?;
//! }
//! ```

mod commands;
mod deps;
mod rules;
mod state;

pub use commands::{LoginCommands, MIN_PASSWORD_LEN};
pub use deps::{LoginDeps, LoginDepsBuilder};
pub use rules::LoginRules;
pub use state::{LoginPayload, LoginSession, LoginState, LoginStatus, UserProfile};

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::container::{StateContainer, Subscription};
use crate::engine::Engine;

/// One login workflow instance.
///
/// Constructed by whoever owns the session and passed around as a cheap
/// clonable handle; never a module-level singleton.
#[derive(Clone)]
pub struct LoginEngine {
    id: Uuid,
    container: Arc<StateContainer<LoginState>>,
    commands: LoginCommands,
    rules: LoginRules,
}

impl LoginEngine {
    /// Build an engine over the initial state.
    ///
    /// `deps` has already passed aggregated validation in
    /// [`LoginDeps::builder`]; no state exists before that validation ran.
    pub fn new(deps: LoginDeps) -> Self {
        let id = Uuid::new_v4();
        let container = Arc::new(StateContainer::new(LoginState::initial()));
        let commands = LoginCommands {
            engine_id: id,
            container: container.clone(),
            deps,
        };
        let rules = LoginRules {
            container: container.clone(),
        };
        debug!(engine_id = %id, "login engine constructed");
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
    pub fn commands(&self) -> &LoginCommands {
        &self.commands
    }

    /// The pure predicate surface.
    pub fn rules(&self) -> &LoginRules {
        &self.rules
    }
}

impl Engine for LoginEngine {
    type State = LoginState;

    fn state(&self) -> LoginState {
        self.container.state()
    }

    fn subscribe(
        &self,
        listener: impl Fn(&LoginState) + Send + Sync + 'static,
    ) -> Subscription {
        self.container.subscribe(listener)
    }
}

impl std::fmt::Debug for LoginEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginEngine").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PivotError;
    use crate::testing::{failing_login_deps, scripted_login_deps, CallLog};
    use std::sync::Mutex;

    #[test]
    fn editing_fields_moves_status_to_editing() {
        let (deps, _log) = scripted_login_deps();
        let engine = LoginEngine::new(deps);

        engine.commands().set_username("a@b.com");
        assert_eq!(engine.state().status, LoginStatus::Editing);
        assert_eq!(engine.state().username, "a@b.com");
    }

    #[test]
    fn short_password_rejected_before_any_mutation() {
        let (deps, _log) = scripted_login_deps();
        let engine = LoginEngine::new(deps);
        engine.commands().set_username("a@b.com");
        let before = engine.state();

        let err = engine.commands().set_password("short").unwrap_err();
        assert!(err.is_validation());

        let after = engine.state();
        assert_eq!(after.password, "");
        assert_eq!(after.status, before.status);
    }

    #[tokio::test]
    async fn submit_with_empty_username_never_reaches_dependency() {
        let (deps, log) = scripted_login_deps();
        let engine = LoginEngine::new(deps);
        engine.commands().set_password("longenough").unwrap();
        // set_username was never called; username is empty.

        let err = engine.commands().submit().await.unwrap_err();
        assert!(err.is_validation());
        assert!(log.calls().is_empty());
        assert_eq!(engine.state().status, LoginStatus::Editing);
    }

    #[tokio::test]
    async fn successful_submit_caches_session_then_runs_post_effects() {
        let (deps, log) = scripted_login_deps();
        let engine = LoginEngine::new(deps);

        engine.commands().set_username("a@b.com");
        engine.commands().set_password("hunter22").unwrap();
        engine.commands().submit().await.unwrap();

        let state = engine.state();
        assert_eq!(state.status, LoginStatus::Success);
        assert_eq!(state.token.as_deref(), Some("scripted-token"));
        assert_eq!(
            state.user.as_ref().map(|u| u.email.as_str()),
            Some("test@example.com")
        );
        // Post-success order: request, then persist, then navigate.
        assert_eq!(
            log.calls(),
            vec![
                "login_request:a@b.com".to_string(),
                "save_token:scripted-token".to_string(),
                "navigate:/dashboard".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn failed_request_records_error_and_rethrows() {
        let deps = failing_login_deps("bad creds");
        let engine = LoginEngine::new(deps);

        engine.commands().set_username("a@b.com");
        engine.commands().set_password("hunter22").unwrap();
        let err = engine.commands().submit().await.unwrap_err();

        assert_eq!(err.to_string(), "bad creds");
        let state = engine.state();
        assert_eq!(state.status, LoginStatus::Error);
        assert_eq!(state.error.as_deref(), Some("bad creds"));
        assert!(engine.rules().has_error());
        assert_eq!(engine.rules().error_message(), "bad creds");
    }

    #[tokio::test]
    async fn duplicate_submit_is_rejected_by_precondition() {
        let (deps, _log) = scripted_login_deps();
        let engine = LoginEngine::new(deps);
        engine.commands().set_username("a@b.com");
        engine.commands().set_password("hunter22").unwrap();

        // Force the submitting status the way an in-flight request would.
        engine.commands().container.update(|s| LoginState {
            status: LoginStatus::Submitting,
            ..s.clone()
        });

        let err = engine.commands().submit().await.unwrap_err();
        match err {
            PivotError::Validation { message } => {
                assert!(message.contains("already submitting"));
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn can_submit_combines_fields_and_status() {
        let (deps, _log) = scripted_login_deps();
        let engine = LoginEngine::new(deps);
        assert!(!engine.rules().can_submit());

        engine.commands().set_username("a@b.com");
        assert!(!engine.rules().can_submit());

        engine.commands().set_password("hunter22").unwrap();
        assert!(engine.rules().can_submit());

        engine.commands().container.update(|s| LoginState {
            status: LoginStatus::Submitting,
            ..s.clone()
        });
        assert!(!engine.rules().can_submit());
    }

    #[test]
    fn reset_restores_initial_state_and_clears_token() {
        let (deps, log) = scripted_login_deps();
        let engine = LoginEngine::new(deps);
        engine.commands().set_username("a@b.com");
        engine.commands().set_password("hunter22").unwrap();

        engine.commands().reset().unwrap();

        assert_eq!(engine.state(), LoginState::initial());
        assert_eq!(log.calls(), vec!["clear_token".to_string()]);
    }

    #[test]
    fn subscribers_observe_command_mutations() {
        let (deps, _log) = scripted_login_deps();
        let engine = LoginEngine::new(deps);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _sub = engine.subscribe(move |state: &LoginState| {
            seen_clone.lock().unwrap().push(state.status);
        });

        engine.commands().set_username("a@b.com");
        engine.commands().set_password("hunter22").unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![LoginStatus::Editing, LoginStatus::Editing]
        );
    }

    #[test]
    fn call_log_helper_reports_empty() {
        let log = CallLog::default();
        assert!(log.calls().is_empty());
    }
}
