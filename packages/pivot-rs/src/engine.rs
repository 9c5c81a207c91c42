//! The shared engine shape.
//!
//! Every engine - command/rule style or transition-table style - exposes
//! the same observation surface: an owned state snapshot and a pub/sub
//! subscription. Domain-specific command, rule, and action surfaces hang
//! off the concrete engine types; polymorphism across engines is this
//! shared shape, never a base type.
//!
//! Engines are explicit values owned by whoever constructs them (one per
//! logical workflow instance), passed around as cheap clonable handles.
//! There is no teardown call: drop the handles and unsubscribe.

use crate::container::Subscription;

/// Common observation surface of an engine.
///
/// Mutation never goes through this trait; it flows through each engine's
/// command or action surface, which is where validation lives.
pub trait Engine: Send + Sync {
    /// The plain, serializable state value this engine manages.
    type State: Clone + Send + 'static;

    /// Owned snapshot of the current state.
    fn state(&self) -> Self::State;

    /// Register a listener for post-mutation snapshots.
    fn subscribe(&self, listener: impl Fn(&Self::State) + Send + Sync + 'static) -> Subscription;
}
