//! Aggregated validation for injected dependencies.
//!
//! Engines receive their side-effect capabilities from the host through a
//! per-engine builder. `Checklist` is the shared validation core those
//! builders use: it records *every* missing or unusable capability and
//! fails once with the full list, so a misconfigured host never has to fix
//! problems one construction attempt at a time.
//!
//! Validation runs inside `build()`, before any engine state exists; an
//! engine can only be constructed from a deps value that already passed.
//!
//! ```
//! use pivot::deps::Checklist;
//!
//! let mut check = Checklist::new("login engine");
//! check.require("login_request", &None::<()>);
//! check.require("navigate", &Some(()));
//! let err = check.finish().unwrap_err();
//! assert!(err.to_string().contains("login_request"));
//! ```

use crate::error::PivotError;

/// Collects dependency problems for one engine's construction.
pub struct Checklist {
    subject: &'static str,
    problems: Vec<String>,
}

impl Checklist {
    /// Start a checklist for the named engine (used in log output).
    pub fn new(subject: &'static str) -> Self {
        Self {
            subject,
            problems: Vec::new(),
        }
    }

    /// Record a problem if the capability slot is empty.
    pub fn require<T>(&mut self, name: &'static str, slot: &Option<T>) {
        if slot.is_none() {
            self.problems
                .push(format!("missing required dependency: {name}"));
        }
    }

    /// Record an arbitrary configuration problem.
    pub fn problem(&mut self, message: impl Into<String>) {
        self.problems.push(message.into());
    }

    /// Fail with every collected problem, or pass.
    pub fn finish(self) -> Result<(), PivotError> {
        if self.problems.is_empty() {
            return Ok(());
        }
        tracing::error!(
            engine = self.subject,
            problem_count = self.problems.len(),
            "dependency validation failed"
        );
        Err(PivotError::configuration(self.problems))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PivotError;

    #[test]
    fn all_present_passes() {
        let mut check = Checklist::new("test engine");
        check.require("a", &Some(1));
        check.require("b", &Some(2));
        assert!(check.finish().is_ok());
    }

    #[test]
    fn collects_every_missing_capability() {
        let mut check = Checklist::new("test engine");
        check.require("login_request", &None::<()>);
        check.require("save_token", &Some(()));
        check.require("clear_token", &None::<()>);
        check.require("navigate", &None::<()>);

        let err = check.finish().unwrap_err();
        match &err {
            PivotError::Configuration { problems } => {
                assert_eq!(problems.len(), 3);
                assert!(problems[0].contains("login_request"));
                assert!(problems[1].contains("clear_token"));
                assert!(problems[2].contains("navigate"));
            }
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn custom_problems_are_aggregated_too() {
        let mut check = Checklist::new("test engine");
        check.require("pay_order", &None::<()>);
        check.problem("context value error must be a string");

        let err = check.finish().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("pay_order"));
        assert!(msg.contains("context value error"));
    }
}
