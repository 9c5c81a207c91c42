//! Injected capabilities for the login engine.
//!
//! The engine performs no IO of its own; the host supplies every side
//! effect as a named capability. `login_request` is the one asynchronous
//! call; the rest are synchronous but fallible - their failures surface to
//! the submit caller uncaught, after state already reflects the outcome.
//!
//! Capabilities are assembled through [`LoginDepsBuilder`], whose
//! `build()` validates the full set at once: every missing capability is
//! reported in a single aggregated configuration error, before any engine
//! state exists.

use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::deps::Checklist;
use crate::error::PivotError;
use crate::login::state::{LoginPayload, LoginSession};

pub(crate) type LoginRequestFn =
    Arc<dyn Fn(LoginPayload) -> BoxFuture<'static, Result<LoginSession>> + Send + Sync>;
pub(crate) type TokenFn = Arc<dyn Fn(&str) -> Result<()> + Send + Sync>;
pub(crate) type ClearTokenFn = Arc<dyn Fn() -> Result<()> + Send + Sync>;
pub(crate) type NavigateFn = Arc<dyn Fn(&str) -> Result<()> + Send + Sync>;

/// Validated capability set for one login engine.
///
/// Only obtainable through [`LoginDeps::builder`], so holding a value is
/// proof the full contract was satisfied.
#[derive(Clone)]
pub struct LoginDeps {
    pub(crate) login_request: LoginRequestFn,
    pub(crate) save_token: TokenFn,
    pub(crate) clear_token: ClearTokenFn,
    pub(crate) navigate: NavigateFn,
}

impl LoginDeps {
    /// Start assembling the capability set.
    pub fn builder() -> LoginDepsBuilder {
        LoginDepsBuilder::default()
    }
}

impl std::fmt::Debug for LoginDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginDeps").finish_non_exhaustive()
    }
}

/// Collects login capabilities; `build()` validates them all at once.
#[derive(Default)]
pub struct LoginDepsBuilder {
    login_request: Option<LoginRequestFn>,
    save_token: Option<TokenFn>,
    clear_token: Option<ClearTokenFn>,
    navigate: Option<NavigateFn>,
}

impl LoginDepsBuilder {
    /// The asynchronous authentication call.
    pub fn login_request<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(LoginPayload) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<LoginSession>> + Send + 'static,
    {
        self.login_request = Some(Arc::new(move |payload| f(payload).boxed()));
        self
    }

    /// Persist a credential after a successful login.
    pub fn save_token<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<()> + Send + Sync + 'static,
    {
        self.save_token = Some(Arc::new(f));
        self
    }

    /// Drop any persisted credential (used by `reset`).
    pub fn clear_token<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.clear_token = Some(Arc::new(f));
        self
    }

    /// Route the user after a successful login.
    pub fn navigate<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<()> + Send + Sync + 'static,
    {
        self.navigate = Some(Arc::new(f));
        self
    }

    /// Validate the whole set; every missing capability is reported.
    pub fn build(self) -> Result<LoginDeps, PivotError> {
        let mut check = Checklist::new("login engine");
        check.require("login_request", &self.login_request);
        check.require("save_token", &self.save_token);
        check.require("clear_token", &self.clear_token);
        check.require("navigate", &self.navigate);
        check.finish()?;

        let (Some(login_request), Some(save_token), Some(clear_token), Some(navigate)) =
            (self.login_request, self.save_token, self.clear_token, self.navigate)
        else {
            unreachable!("checklist verified every capability above");
        };
        Ok(LoginDeps {
            login_request,
            save_token,
            clear_token,
            navigate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::login::state::UserProfile;

    fn session() -> LoginSession {
        LoginSession {
            token: "tok".to_string(),
            user: UserProfile {
                id: "1".to_string(),
                name: "Test User".to_string(),
                email: "test@example.com".to_string(),
                avatar: None,
            },
        }
    }

    #[test]
    fn complete_builder_passes() {
        let deps = LoginDeps::builder()
            .login_request(|_payload| async { Ok(session()) })
            .save_token(|_token| Ok(()))
            .clear_token(|| Ok(()))
            .navigate(|_path| Ok(()))
            .build();
        assert!(deps.is_ok());
    }

    #[test]
    fn missing_capabilities_are_all_reported() {
        let err = LoginDeps::builder()
            .save_token(|_token| Ok(()))
            .build()
            .unwrap_err();

        match err {
            PivotError::Configuration { problems } => {
                assert_eq!(problems.len(), 3);
                assert!(problems.iter().any(|p| p.contains("login_request")));
                assert!(problems.iter().any(|p| p.contains("clear_token")));
                assert!(problems.iter().any(|p| p.contains("navigate")));
                assert!(!problems.iter().any(|p| p.contains("save_token")));
            }
            other => panic!("expected Configuration, got {other:?}"),
        }
    }
}
