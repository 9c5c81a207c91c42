//! # Pivot
//!
//! A rendering-agnostic business-logic runtime where containers hold
//! state, commands mutate, and rules answer.
//!
//! ## Core Concepts
//!
//! Pivot separates **state** from **side effects**:
//! - [`StateContainer`] = one workflow's state, replaced wholesale, never
//!   mutated in place
//! - Commands/actions = the only mutation paths, validated before they
//!   touch anything
//! - Rules = pure predicates over the live state
//! - Dependencies = injected capabilities, validated in aggregate at
//!   construction
//!
//! The key principle: **engines own logic, hosts own IO and pixels**.
//!
//! ## Architecture
//!
//! ```text
//! Host (UI / API edge)
//!     │ construct(deps) ── aggregated validation, before any state
//!     ▼
//! Engine ──────────────┬──────────────────────────────┐
//!     │                │                              │
//!     │          Commands / Actions              Rules (pure)
//!     │                │                              │
//!     │   validate → await dependency → write         │ read
//!     ▼                ▼                              ▼
//! StateContainer ── replace / update / batch ── snapshot
//!     │
//!     ▼ notify (synchronous, panic-isolated)
//! Adapter ── selector slots ── watch channels ── consumers
//! ```
//!
//! Two engine shapes share the [`Engine`] surface:
//! - **Command/rule engines** ([`login`], [`order::cart`]) expose named,
//!   validated operations; asynchronous ones await one injected
//!   capability between two well-defined states.
//! - **Transition-table engines** ([`order`]) replace ad hoc commands
//!   with a lookup table of pure `(state, input) -> state` functions;
//!   unknown moves fail listing the legal ones.
//!
//! ## Key Invariants
//!
//! 1. **Snapshots are owned** - mutating one never affects the container
//! 2. **Validation precedes mutation** - a rejected command changes nothing
//!    and invokes no dependency
//! 3. **State reflects outcomes first** - a failing dependency is recorded
//!    in state before the error surfaces to the caller
//! 4. **One notify per batch** - nested batches flush once, at the
//!    outermost exit, with the final state
//! 5. **Listeners cannot break writers** - subscriber panics are caught,
//!    logged, and isolated
//!
//! ## Example
//!
//! ```ignore
//! use pivot::{Adapter, Engine, LoginDeps, LoginEngine};
//!
//! let deps = LoginDeps::builder()
//!     .login_request(|payload| async move { api.login(payload).await })
//!     .save_token(|token| vault.store(token))
//!     .clear_token(|| vault.clear())
//!     .navigate(|path| router.push(path))
//!     .build()?;
//!
//! let engine = LoginEngine::new(deps);
//! let adapter = Adapter::new(engine);
//! let view = adapter.use_engine(|state| state.status);
//!
//! let commands = view.engine().commands().clone();
//! commands.set_username("a@b.com");
//! commands.set_password("hunter22")?;
//! if view.engine().rules().can_submit() {
//!     commands.submit().await?;
//! }
//! ```
//!
//! ## What This Is Not
//!
//! Pivot is **not**:
//! - A rendering layer (hosts bring their own)
//! - A router or navigator (injected as a capability)
//! - An HTTP or storage client (injected as capabilities)
//! - A multi-writer concurrency primitive (one workflow, one writer;
//!   duplicate submission is guarded by preconditions, not locks)

// Core modules
pub mod adapter;
pub mod container;
pub mod deps;
pub mod engine;
pub mod error;
pub mod invariant;
pub mod machine;

// Domain engines
pub mod login;
pub mod order;

// Scripted fakes (feature-gated)
#[cfg(any(test, feature = "testing"))]
pub mod testing;


// Re-export the core surface
pub use adapter::{Adapter, EngineView};
pub use container::{StateContainer, Subscription};
pub use engine::Engine;
pub use error::PivotError;
pub use machine::{StatefulEngine, TransitionInput, TransitionTable};

// Re-export the domain entry points
pub use login::{LoginDeps, LoginEngine};
pub use order::cart::{CartDeps, CartEngine};
pub use order::{OrderContext, OrderEngine};
