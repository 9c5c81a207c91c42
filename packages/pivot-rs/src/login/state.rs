//! Login workflow state.

use serde::{Deserialize, Serialize};

/// Where the login workflow currently sits.
///
/// `reset` returns to `Idle` from anywhere; every other move is driven by
/// the commands in [`crate::login::LoginCommands`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginStatus {
    /// Untouched form.
    Idle,
    /// At least one field has been edited since the last submit/reset.
    Editing,
    /// A login request is in flight.
    Submitting,
    /// The last submit succeeded; `token`/`user` are cached in state.
    Success,
    /// The last submit failed; `error` carries the message.
    Error,
}

/// The authenticated account returned by a successful login request.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Credentials handed to the injected login request.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct LoginPayload {
    pub username: String,
    pub password: String,
}

/// Token + profile produced by a successful login request.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct LoginSession {
    pub token: String,
    pub user: UserProfile,
}

/// Complete login state; replaced wholesale on every mutation.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct LoginState {
    pub username: String,
    pub password: String,
    pub status: LoginStatus,
    pub error: Option<String>,
    pub token: Option<String>,
    pub user: Option<UserProfile>,
}

impl LoginState {
    /// The well-defined initial value: empty form, `Idle`.
    pub fn initial() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            status: LoginStatus::Idle,
            error: None,
            token: None,
            user: None,
        }
    }
}

impl Default for LoginState {
    fn default() -> Self {
        Self::initial()
    }
}
