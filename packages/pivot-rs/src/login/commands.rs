//! Login commands - the only mutation path for login state.
//!
//! Every command validates its arguments before touching state, so a
//! validation failure leaves the container exactly as it was and no
//! dependency is ever invoked for a rejected call.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::container::StateContainer;
use crate::error::PivotError;
use crate::invariant::{invariant, invariant_present};
use crate::login::deps::LoginDeps;
use crate::login::state::{LoginPayload, LoginState, LoginStatus};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Where a successful login routes to.
const POST_LOGIN_PATH: &str = "/dashboard";

/// Command surface of one login engine. Cheap to clone; all clones drive
/// the same workflow instance.
#[derive(Clone)]
pub struct LoginCommands {
    pub(crate) engine_id: Uuid,
    pub(crate) container: Arc<StateContainer<LoginState>>,
    pub(crate) deps: LoginDeps,
}

impl LoginCommands {
    /// Set the username field and move to `Editing`.
    pub fn set_username(&self, value: &str) {
        let value = value.to_string();
        self.container.update(move |state| LoginState {
            username: value,
            status: LoginStatus::Editing,
            ..state.clone()
        });
    }

    /// Set the password field and move to `Editing`.
    ///
    /// Rejects passwords shorter than [`MIN_PASSWORD_LEN`] before any
    /// mutation: on error the stored password and status are unchanged.
    pub fn set_password(&self, value: &str) -> Result<(), PivotError> {
        invariant(
            value.len() >= MIN_PASSWORD_LEN,
            format!("password must be at least {MIN_PASSWORD_LEN} characters"),
        )?;
        let value = value.to_string();
        self.container.update(move |state| LoginState {
            password: value,
            status: LoginStatus::Editing,
            ..state.clone()
        });
        Ok(())
    }

    /// Submit the credentials through the injected `login_request`.
    ///
    /// Sequence: validate (username present, password long enough, not
    /// already submitting) → status `Submitting` → await the request →
    /// on success cache `token`/`user` under status `Success`, then run
    /// the post-success capabilities (`save_token`, then `navigate`) whose
    /// failures are *not* caught → on request failure record the message
    /// under status `Error` and return the original error.
    ///
    /// The duplicate-submission guard is this command's own precondition:
    /// the container does not serialize concurrent commands.
    pub async fn submit(&self) -> Result<(), PivotError> {
        let state = self.container.state();
        invariant_present(&state.username, "username")?;
        invariant(
            state.password.len() >= MIN_PASSWORD_LEN,
            format!("password must be at least {MIN_PASSWORD_LEN} characters"),
        )?;
        invariant(
            state.status != LoginStatus::Submitting,
            "login is already submitting",
        )?;

        self.container.update(|s| LoginState {
            status: LoginStatus::Submitting,
            error: None,
            ..s.clone()
        });
        debug!(engine_id = %self.engine_id, "login submit started");

        let payload = LoginPayload {
            username: state.username.clone(),
            password: state.password.clone(),
        };
        match (self.deps.login_request)(payload).await {
            Ok(session) => {
                let token = session.token.clone();
                self.container.update(move |s| LoginState {
                    status: LoginStatus::Success,
                    token: Some(session.token.clone()),
                    user: Some(session.user.clone()),
                    ..s.clone()
                });
                info!(engine_id = %self.engine_id, "login succeeded");

                // Post-success effects run after state already reflects
                // success; their failures belong to the caller.
                (self.deps.save_token)(&token)?;
                (self.deps.navigate)(POST_LOGIN_PATH)?;
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                self.container.update(move |s| LoginState {
                    status: LoginStatus::Error,
                    error: Some(message.clone()),
                    ..s.clone()
                });
                warn!(engine_id = %self.engine_id, error = %err, "login request failed");
                Err(PivotError::Dependency(err))
            }
        }
    }

    /// Return to the initial state and drop any persisted credential.
    pub fn reset(&self) -> Result<(), PivotError> {
        self.container.replace(LoginState::initial());
        debug!(engine_id = %self.engine_id, "login state reset");
        (self.deps.clear_token)()?;
        Ok(())
    }
}

impl std::fmt::Debug for LoginCommands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCommands")
            .field("engine_id", &self.engine_id)
            .finish()
    }
}
