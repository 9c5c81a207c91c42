//! External-store bridge between engines and reactive hosts.
//!
//! An [`Adapter`] wraps one engine and hands out selector-scoped views.
//! The host-facing primitive is a `tokio::sync::watch` channel: the
//! adapter owns the senders, consumers hold receivers, and a receiver only
//! wakes when its *selected slice* actually changed value - an engine
//! update that leaves the slice equal is invisible to that consumer.
//!
//! # Guarantees
//!
//! - **One engine subscription per adapter**: however many views are
//!   taken, the adapter registers exactly one listener with the engine.
//! - **One slot per distinct selector**: non-capturing selectors are
//!   cached by their type, so repeated `use_engine(sel)` calls share a
//!   snapshot slot instead of fanning out duplicates. Capturing selectors
//!   cannot be keyed by type (two instances may disagree) and get a
//!   private slot each.
//! - **No empty first paint**: a view's channel is seeded synchronously
//!   with `selector(engine.state())` at creation.
//! - **Mutation stays gated**: a view exposes the engine handle, whose
//!   only mutation paths are its command/action surfaces; the container
//!   itself is unreachable.
//!
//! # Example
//!
//! ```ignore
//! let adapter = Adapter::new(engine);
//! let mut status = adapter.use_engine(|s: &LoginState| s.status);
//!
//! assert_eq!(status.get(), LoginStatus::Idle);
//! status.changed().await?;           // woken only on status changes
//! ```

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;

use crate::container::Subscription;
use crate::engine::Engine;

/// Cache key for snapshot slots.
///
/// Zero-sized selector types (plain `fn` items, non-capturing closures)
/// are keyed by `TypeId`: one type, one behavior, one slot. Capturing
/// selectors get a fresh anonymous key per call.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum SlotKey {
    Selector(TypeId),
    Anonymous(u64),
}

/// Type-erased snapshot slot: re-selects on every engine notification and
/// forwards only value changes into its watch channel.
trait SlotSink<S>: Send + Sync {
    fn push(&self, state: &S);
    fn closed(&self) -> bool;
    fn as_any(&self) -> &dyn Any;
}

struct Slot<S, V, Sel> {
    selector: Sel,
    tx: watch::Sender<V>,
    _state: PhantomData<fn(&S) -> V>,
}

impl<S, V, Sel> SlotSink<S> for Slot<S, V, Sel>
where
    S: Send + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
    Sel: Fn(&S) -> V + Send + Sync + 'static,
{
    fn push(&self, state: &S) {
        let next = (self.selector)(state);
        self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct AdapterShared<S> {
    slots: DashMap<SlotKey, Arc<dyn SlotSink<S>>>,
    subscription: Mutex<Option<Subscription>>,
    next_anonymous: AtomicU64,
}

/// Bridge from one engine to any number of selector-scoped views.
pub struct Adapter<E: Engine> {
    engine: E,
    shared: Arc<AdapterShared<E::State>>,
}

impl<E: Engine> Clone for Adapter<E>
where
    E: Clone,
{
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<E> Adapter<E>
where
    E: Engine + Clone,
    E::State: Sync,
{
    /// Wrap `engine`. The engine subscription is taken lazily on the first
    /// view, and dropped with the adapter.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            shared: Arc::new(AdapterShared {
                slots: DashMap::new(),
                subscription: Mutex::new(None),
                next_anonymous: AtomicU64::new(0),
            }),
        }
    }

    /// Take a view of the slice `selector` picks out of the engine state.
    ///
    /// The view's channel is seeded with `selector(engine.state())`
    /// synchronously, and subsequently receives a new value only when the
    /// selected slice changes between notifications.
    pub fn use_engine<V, Sel>(&self, selector: Sel) -> EngineView<E, V>
    where
        V: Clone + PartialEq + Send + Sync + 'static,
        Sel: Fn(&E::State) -> V + Send + Sync + 'static,
    {
        self.ensure_subscribed();

        if std::mem::size_of::<Sel>() == 0 {
            let key = SlotKey::Selector(TypeId::of::<Sel>());
            if let Some(sink) = self.shared.slots.get(&key) {
                if let Some(slot) = sink.as_any().downcast_ref::<Slot<E::State, V, Sel>>() {
                    return EngineView {
                        engine: self.engine.clone(),
                        rx: slot.tx.subscribe(),
                    };
                }
            }
            return self.open_slot(key, selector);
        }

        let key = SlotKey::Anonymous(self.shared.next_anonymous.fetch_add(1, Ordering::Relaxed));
        self.open_slot(key, selector)
    }

    /// Identity view over the whole state.
    pub fn use_state(&self) -> EngineView<E, E::State>
    where
        E::State: PartialEq,
    {
        self.use_engine(|state: &E::State| state.clone())
    }

    /// Borrow the wrapped engine handle.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Number of live snapshot slots (one per distinct selector).
    pub fn slot_count(&self) -> usize {
        self.shared.slots.len()
    }

    fn open_slot<V, Sel>(&self, key: SlotKey, selector: Sel) -> EngineView<E, V>
    where
        V: Clone + PartialEq + Send + Sync + 'static,
        Sel: Fn(&E::State) -> V + Send + Sync + 'static,
    {
        let initial = selector(&self.engine.state());
        let (tx, rx) = watch::channel(initial);
        let slot: Arc<dyn SlotSink<E::State>> = Arc::new(Slot {
            selector,
            tx,
            _state: PhantomData,
        });
        self.shared.slots.insert(key, slot);
        debug!(slots = self.shared.slots.len(), "adapter slot opened");
        EngineView {
            engine: self.engine.clone(),
            rx,
        }
    }

    /// Register the single engine listener, once.
    fn ensure_subscribed(&self) {
        let mut guard = self
            .shared
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return;
        }
        let shared = Arc::downgrade(&self.shared);
        *guard = Some(self.engine.subscribe(move |state| {
            if let Some(shared) = shared.upgrade() {
                fan_out(&shared, state);
            }
        }));
    }
}

/// Push one snapshot through every live slot, pruning anonymous slots
/// whose consumers are gone. Cached (type-keyed) slots are kept alive so a
/// later `use_engine` with the same selector can reattach.
fn fan_out<S>(shared: &AdapterShared<S>, state: &S) {
    shared.slots.retain(|key, sink| match key {
        SlotKey::Anonymous(_) => !sink.closed(),
        SlotKey::Selector(_) => true,
    });
    for entry in shared.slots.iter() {
        entry.value().push(state);
    }
}

/// One consumer's handle: the selected slice plus the engine surface.
pub struct EngineView<E, V> {
    engine: E,
    rx: watch::Receiver<V>,
}

impl<E, V> EngineView<E, V>
where
    V: Clone,
{
    /// Current value of the selected slice.
    pub fn get(&self) -> V {
        self.rx.borrow().clone()
    }

    /// The engine handle, for commands, actions, and rules.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Wait until the selected slice changes value.
    ///
    /// Fails only when the adapter (and with it the channel sender) has
    /// been dropped.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.rx.changed().await
    }

    /// True when a change has been observed but not yet read with `get`.
    pub fn has_changed(&self) -> Result<bool, watch::error::RecvError> {
        self.rx.has_changed()
    }

    /// A raw receiver for hosts that integrate watch channels directly.
    pub fn receiver(&self) -> watch::Receiver<V> {
        self.rx.clone()
    }
}
