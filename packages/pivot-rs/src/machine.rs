//! Declarative transition-table state machine.
//!
//! Multi-step workflows replace ad hoc commands with a lookup table:
//! state tag → action name → pure transition function. The mechanism is
//! generic over any finite tag set; the order workflow in
//! [`crate::order`] is one instantiation.
//!
//! # Key Properties
//!
//! - **Transitions are pure**: a transition function reads the current
//!   state plus a [`TransitionInput`] (injected context merged with action
//!   data, and the timestamp the engine stamped when the action arrived)
//!   and returns a *complete* new state. Patch semantics are not permitted
//!   at this layer.
//! - **Unknown is an error**: an unknown state tag or an action the
//!   current tag does not accept fails loudly; there are no silent no-ops.
//!   The invalid-action error carries the sorted list of actions the state
//!   does accept.
//! - **Synchronous notify**: a hit replaces the engine's state through its
//!   container, which notifies subscribers before `transition` returns.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::container::{StateContainer, Subscription};
use crate::engine::Engine;
use crate::error::PivotError;

/// Input handed to every transition function: the engine's injected
/// context values merged with the per-action data (action data wins on key
/// collisions), plus the instant the action was accepted.
///
/// The timestamp is stamped by the engine so transition functions stay
/// pure and replayable.
pub struct TransitionInput {
    merged: Map<String, Value>,
    /// When the engine accepted the action.
    pub at: DateTime<Utc>,
}

impl TransitionInput {
    fn new(context: &Map<String, Value>, data: Map<String, Value>, at: DateTime<Utc>) -> Self {
        let mut merged = context.clone();
        for (key, value) in data {
            merged.insert(key, value);
        }
        Self { merged, at }
    }

    /// Raw value for `key`, from action data or injected context.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.merged.get(key)
    }

    /// String value for `key`, if present and a string.
    pub fn str_value(&self, key: &str) -> Option<&str> {
        self.merged.get(key).and_then(Value::as_str)
    }
}

type TransitionFn<S> = Box<dyn Fn(&S, &TransitionInput) -> S + Send + Sync>;

/// Static mapping from (state tag, action name) to a pure next-state
/// function. Built once at engine construction and consulted on every
/// `transition` call.
pub struct TransitionTable<T, S> {
    states: HashMap<T, BTreeMap<&'static str, TransitionFn<S>>>,
}

impl<T, S> TransitionTable<T, S>
where
    T: Copy + Eq + Hash + fmt::Display,
{
    /// Empty table.
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
        }
    }

    /// Register the transition for `action` while in `tag`.
    ///
    /// Builder-style so tables read as declarative data.
    pub fn on(
        mut self,
        tag: T,
        action: &'static str,
        f: impl Fn(&S, &TransitionInput) -> S + Send + Sync + 'static,
    ) -> Self {
        self.states
            .entry(tag)
            .or_default()
            .insert(action, Box::new(f));
        self
    }

    /// Actions accepted while in `tag`, sorted. Empty for unknown tags.
    pub fn valid_actions(&self, tag: T) -> Vec<&'static str> {
        self.states
            .get(&tag)
            .map(|actions| actions.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Look up the transition function for (tag, action).
    fn resolve(&self, tag: T, action: &str) -> Result<&TransitionFn<S>, PivotError> {
        let actions = self.states.get(&tag).ok_or_else(|| PivotError::UnknownState {
            state: tag.to_string(),
        })?;
        actions.get(action).ok_or_else(|| PivotError::InvalidAction {
            state: tag.to_string(),
            action: action.to_string(),
            valid: actions.keys().map(|a| (*a).to_string()).collect(),
        })
    }
}

impl<T, S> Default for TransitionTable<T, S>
where
    T: Copy + Eq + Hash + fmt::Display,
{
    fn default() -> Self {
        Self::new()
    }
}

/// State-machine variant of the engine: a [`StateContainer`] plus a
/// [`TransitionTable`] and an injected context map.
///
/// One instance per workflow run. Clones are handles onto the same
/// container and table.
pub struct StatefulEngine<T, S> {
    id: Uuid,
    container: Arc<StateContainer<S>>,
    table: Arc<TransitionTable<T, S>>,
    context: Map<String, Value>,
    tag_of: fn(&S) -> T,
}

impl<T, S> Clone for StatefulEngine<T, S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            container: self.container.clone(),
            table: self.table.clone(),
            context: self.context.clone(),
            tag_of: self.tag_of,
        }
    }
}

impl<T, S> StatefulEngine<T, S>
where
    T: Copy + Eq + Hash + fmt::Display + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
    /// Construct a machine over `initial`, driven by `table`.
    ///
    /// `context` is merged under every action's data; `tag_of` projects
    /// the discrete tag out of a state value.
    pub fn new(
        initial: S,
        table: TransitionTable<T, S>,
        context: Map<String, Value>,
        tag_of: fn(&S) -> T,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            container: Arc::new(StateContainer::new(initial)),
            table: Arc::new(table),
            context,
            tag_of,
        }
    }

    /// Engine instance id, carried in tracing fields.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Actions the current state accepts, sorted.
    pub fn valid_actions(&self) -> Vec<&'static str> {
        let state = self.container.state();
        self.table.valid_actions((self.tag_of)(&state))
    }

    /// Apply `action` with `data` (`Value::Null` for none, otherwise an
    /// object), replace the state with the transition's result, and notify
    /// subscribers synchronously.
    ///
    /// Returns the new state on a hit. Fails without touching state when
    /// the current tag has no transitions, when the action is not valid
    /// for the current tag, or when `data` is neither null nor an object.
    pub fn transition(&self, action: &str, data: Value) -> Result<S, PivotError> {
        let data = match data {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(PivotError::validation(format!(
                    "action data must be an object, got {other}"
                )))
            }
        };

        let current = self.container.state();
        let tag = (self.tag_of)(&current);
        let transition = self.table.resolve(tag, action)?;

        let input = TransitionInput::new(&self.context, data, Utc::now());
        let next = transition(&current, &input);
        let next_tag = (self.tag_of)(&next);
        self.container.replace(next.clone());

        debug!(
            engine_id = %self.id,
            %action,
            from = %tag,
            to = %next_tag,
            "transition applied"
        );
        Ok(next)
    }
}

impl<T, S> Engine for StatefulEngine<T, S>
where
    T: Copy + Eq + Hash + fmt::Display + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
    type State = S;

    fn state(&self) -> S {
        self.container.state()
    }

    fn subscribe(&self, listener: impl Fn(&S) + Send + Sync + 'static) -> Subscription {
        self.container.subscribe(listener)
    }
}

impl<T, S> fmt::Debug for StatefulEngine<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatefulEngine").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    enum Phase {
        Open,
        Closed,
    }

    impl fmt::Display for Phase {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Phase::Open => write!(f, "open"),
                Phase::Closed => write!(f, "closed"),
            }
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Door {
        phase: Phase,
        closed_by: Option<String>,
        closed_at: Option<DateTime<Utc>>,
    }

    fn door_table() -> TransitionTable<Phase, Door> {
        TransitionTable::new()
            .on(Phase::Open, "close", |_door: &Door, input| Door {
                phase: Phase::Closed,
                closed_by: input.str_value("who").map(str::to_string),
                closed_at: Some(input.at),
            })
            .on(Phase::Open, "knock", |door: &Door, _| door.clone())
    }

    fn door_engine() -> StatefulEngine<Phase, Door> {
        StatefulEngine::new(
            Door {
                phase: Phase::Open,
                closed_by: None,
                closed_at: None,
            },
            door_table(),
            Map::new(),
            |door| door.phase,
        )
    }

    #[test]
    fn transition_replaces_state_and_returns_it() {
        let engine = door_engine();
        let next = engine
            .transition("close", json!({ "who": "porter" }))
            .unwrap();

        assert_eq!(next.phase, Phase::Closed);
        assert_eq!(next.closed_by.as_deref(), Some("porter"));
        assert!(next.closed_at.is_some());
        assert_eq!(engine.state(), next);
    }

    #[test]
    fn unknown_action_for_tag_lists_valid_actions() {
        let engine = door_engine();
        let err = engine.transition("lock", Value::Null).unwrap_err();
        match err {
            PivotError::InvalidAction {
                state,
                action,
                valid,
            } => {
                assert_eq!(state, "open");
                assert_eq!(action, "lock");
                assert_eq!(valid, vec!["close".to_string(), "knock".to_string()]);
            }
            other => panic!("expected InvalidAction, got {other:?}"),
        }
        // And the failed lookup left state untouched.
        assert_eq!(engine.state().phase, Phase::Open);
    }

    #[test]
    fn tag_without_transitions_is_unknown_state() {
        let engine = door_engine();
        engine.transition("close", Value::Null).unwrap();

        let err = engine.transition("close", Value::Null).unwrap_err();
        match err {
            PivotError::UnknownState { state } => assert_eq!(state, "closed"),
            other => panic!("expected UnknownState, got {other:?}"),
        }
    }

    #[test]
    fn action_valid_for_a_different_tag_fails() {
        let engine = door_engine();
        engine.transition("close", Value::Null).unwrap();

        // "knock" exists in the table, but only for open doors.
        let err = engine.transition("knock", Value::Null).unwrap_err();
        assert!(err.is_transition());
        assert_eq!(engine.state().phase, Phase::Closed);
    }

    #[test]
    fn action_data_overrides_injected_context() {
        let mut context = Map::new();
        context.insert("who".to_string(), json!("default-closer"));
        let engine = StatefulEngine::new(
            Door {
                phase: Phase::Open,
                closed_by: None,
                closed_at: None,
            },
            door_table(),
            context,
            |door| door.phase,
        );

        // Context alone supplies the value...
        let next = engine.transition("close", Value::Null).unwrap();
        assert_eq!(next.closed_by.as_deref(), Some("default-closer"));
    }

    #[test]
    fn non_object_action_data_is_rejected() {
        let engine = door_engine();
        let err = engine.transition("close", json!(42)).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(engine.state().phase, Phase::Open);
    }

    #[test]
    fn subscribers_hear_each_transition() {
        let engine = door_engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _sub = engine.subscribe(move |door: &Door| {
            seen_clone.lock().unwrap().push(door.phase);
        });

        engine.transition("knock", Value::Null).unwrap();
        engine.transition("close", Value::Null).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![Phase::Open, Phase::Closed]);
    }

    #[test]
    fn valid_actions_reports_current_tag() {
        let engine = door_engine();
        assert_eq!(engine.valid_actions(), vec!["close", "knock"]);
        engine.transition("close", Value::Null).unwrap();
        assert!(engine.valid_actions().is_empty());
    }
}
