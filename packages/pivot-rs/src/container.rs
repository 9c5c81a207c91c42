//! Pub/sub state container with immutable snapshots and batched updates.
//!
//! The container owns exactly one state value. Every write replaces it
//! wholesale; readers get owned snapshots, so a reader holding an older
//! snapshot is never affected by later writes.
//!
//! # Guarantees
//!
//! - **Snapshot reads**: `state()` returns an owned clone with no side
//!   effects; mutating a snapshot cannot touch the container.
//! - **Synchronous notify**: outside a batch, every applied update notifies
//!   all listeners before the write call returns, and every listener
//!   observes the same post-update snapshot.
//! - **One notify per batch**: however many updates a batch queues (and
//!   however deeply batches nest), listeners hear exactly once, with the
//!   state after the last queued update. A batch that queues nothing stays
//!   silent.
//! - **Panic isolation**: a panicking listener is caught and logged; it
//!   never stops later listeners and never reaches the mutator.
//!
//! # Example
//!
//! ```
//! use pivot::container::StateContainer;
//!
//! let container = StateContainer::new(0u32);
//! let sub = container.subscribe(|n: &u32| {
//!     let _ = n;
//! });
//!
//! container.batch(|c| {
//!     c.update(|n| n + 1);
//!     c.update(|n| n + 1);
//! });
//! assert_eq!(container.state(), 2);
//! sub.unsubscribe();
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use tracing::{error, warn};

/// Updates slower than this log a warning with the measured duration.
const SLOW_UPDATE_WARN: Duration = Duration::from_millis(1);

type Listener<S> = Arc<dyn Fn(&S) + Send + Sync>;
type UpdateThunk<S> = Box<dyn FnOnce(&S) -> S + Send>;

/// Lock a std mutex, recovering the guard if a previous holder panicked.
///
/// A poisoned container lock only means a listener-side panic unwound
/// through a write; the state value itself is always a complete snapshot.
fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("container mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Listener registry shared between the container and its subscriptions.
///
/// Ids are allocated from a monotonically increasing counter and never
/// reused, which is what makes `Subscription::unsubscribe` idempotent:
/// removing an id twice cannot strip a later listener.
struct Registry<S> {
    entries: Mutex<Vec<(u64, Listener<S>)>>,
    next_id: AtomicU64,
}

impl<S> Registry<S> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    fn add(&self, listener: Listener<S>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock_recover(&self.entries).push((id, listener));
        id
    }

    /// Snapshot the current listeners so notification runs lock-free,
    /// letting listeners subscribe or unsubscribe re-entrantly.
    fn current(&self) -> Vec<(u64, Listener<S>)> {
        lock_recover(&self.entries).clone()
    }
}

/// Type-erased detach hook so [`Subscription`] stays non-generic.
trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

impl<S: Send + 'static> Detach for Registry<S> {
    fn detach(&self, id: u64) {
        lock_recover(&self.entries).retain(|(entry_id, _)| *entry_id != id);
    }
}

/// Handle for one registered listener.
///
/// `unsubscribe` is idempotent; dropping the handle unsubscribes too.
/// Outliving the container is harmless - the registry reference is weak.
#[must_use = "dropping a Subscription detaches its listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<dyn Detach>,
}

impl Subscription {
    /// Remove the listener. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.detach(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

struct BatchState<S> {
    depth: usize,
    queue: Vec<UpdateThunk<S>>,
}

/// Engine-agnostic pub/sub state store.
///
/// One container owns one state value for one workflow instance. The
/// container is not a multi-writer concurrency primitive: commands on a
/// single workflow are expected to run one at a time (engines enforce this
/// with preconditions such as an "already submitting" guard).
pub struct StateContainer<S> {
    state: Mutex<S>,
    registry: Arc<Registry<S>>,
    batch: Mutex<BatchState<S>>,
}

impl<S> StateContainer<S>
where
    S: Clone + Send + 'static,
{
    /// Create a container owning `initial`.
    pub fn new(initial: S) -> Self {
        Self {
            state: Mutex::new(initial),
            registry: Arc::new(Registry::new()),
            batch: Mutex::new(BatchState {
                depth: 0,
                queue: Vec::new(),
            }),
        }
    }

    /// Owned snapshot of the current state. No side effects.
    ///
    /// Two consecutive calls return value-equal but independently owned
    /// values; mutating one affects neither the other nor the container.
    pub fn state(&self) -> S {
        lock_recover(&self.state).clone()
    }

    /// Replace the state wholesale.
    ///
    /// Queued while a batch is open on this thread of control, otherwise
    /// applied immediately with a synchronous notify.
    pub fn replace(&self, next: S) {
        self.update(move |_| next);
    }

    /// Compute the next state from the previous one.
    ///
    /// Inside a batch the thunk itself is queued, so queued updates compose:
    /// two queued increments really do add two. Outside a batch the update
    /// applies immediately and listeners are notified before this returns.
    pub fn update(&self, f: impl FnOnce(&S) -> S + Send + 'static) {
        {
            let mut batch = lock_recover(&self.batch);
            if batch.depth > 0 {
                batch.queue.push(Box::new(f));
                return;
            }
        }
        self.apply(vec![Box::new(f)]);
    }

    /// Run `f`, coalescing every `update`/`replace` it performs into a
    /// single application pass with exactly one listener notification.
    ///
    /// Batches nest; only the outermost batch flushes. The notification
    /// carries the state after the last queued update. If `f` queues
    /// nothing, listeners are not notified at all. Updates queued before
    /// a panic in `f` are still flushed on unwind.
    pub fn batch(&self, f: impl FnOnce(&Self)) {
        lock_recover(&self.batch).depth += 1;
        let _flush = BatchFlush { container: self };
        f(self);
    }

    /// Register a listener called with a snapshot after every applied
    /// update (once per batch). Notification order is subscription order.
    pub fn subscribe(&self, listener: impl Fn(&S) + Send + Sync + 'static) -> Subscription {
        let id = self.registry.add(Arc::new(listener));
        let registry: Arc<dyn Detach> = self.registry.clone();
        Subscription {
            id,
            registry: Arc::downgrade(&registry),
        }
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        lock_recover(&self.registry.entries).len()
    }

    /// Apply queued thunks in call order, then notify once.
    fn apply(&self, thunks: Vec<UpdateThunk<S>>) {
        let start = Instant::now();
        let snapshot = {
            let mut state = lock_recover(&self.state);
            for thunk in thunks {
                let next = thunk(&state);
                *state = next;
            }
            state.clone()
        };
        self.notify(&snapshot);

        let elapsed = start.elapsed();
        if elapsed > SLOW_UPDATE_WARN {
            warn!(elapsed_us = elapsed.as_micros() as u64, "slow state update");
        }
    }

    /// Deliver one snapshot to every listener, isolating panics.
    fn notify(&self, snapshot: &S) {
        for (id, listener) in self.registry.current() {
            let result = catch_unwind(AssertUnwindSafe(|| listener(snapshot)));
            if let Err(panic_info) = result {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                error!(listener_id = id, panic = %panic_msg, "listener panicked during notification");
            }
        }
    }
}

/// Closes one batch level on drop, flushing at the outermost exit even
/// when the batch body unwinds.
struct BatchFlush<'a, S>
where
    S: Clone + Send + 'static,
{
    container: &'a StateContainer<S>,
}

impl<S> Drop for BatchFlush<'_, S>
where
    S: Clone + Send + 'static,
{
    fn drop(&mut self) {
        let drained = {
            let mut batch = lock_recover(&self.container.batch);
            batch.depth -= 1;
            if batch.depth == 0 {
                std::mem::take(&mut batch.queue)
            } else {
                return;
            }
        };
        if !drained.is_empty() {
            self.container.apply(drained);
        }
    }
}

impl<S> std::fmt::Debug for StateContainer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateContainer")
            .field("listener_count", &lock_recover(&self.registry.entries).len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Debug, PartialEq)]
    struct Counter {
        count: i32,
        label: String,
    }

    fn counter() -> Counter {
        Counter {
            count: 0,
            label: "start".to_string(),
        }
    }

    fn collect(seen: &Arc<Mutex<Vec<i32>>>) -> impl Fn(&Counter) + Send + Sync + 'static {
        let seen = seen.clone();
        move |state: &Counter| seen.lock().unwrap().push(state.count)
    }

    #[test]
    fn snapshots_are_independent() {
        let container = StateContainer::new(counter());
        let a = container.state();
        let mut b = container.state();
        assert_eq!(a, b);

        b.count = 99;
        b.label = "mutated".to_string();
        assert_eq!(container.state().count, 0);
        assert_eq!(container.state().label, "start");
        assert_eq!(a.count, 0);
    }

    #[test]
    fn update_notifies_synchronously() {
        let container = StateContainer::new(counter());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = container.subscribe(collect(&seen));

        container.update(|s| Counter {
            count: s.count + 1,
            ..s.clone()
        });

        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn replace_swaps_wholesale() {
        let container = StateContainer::new(counter());
        container.replace(Counter {
            count: 7,
            label: "replaced".to_string(),
        });
        assert_eq!(container.state().count, 7);
        assert_eq!(container.state().label, "replaced");
    }

    #[test]
    fn batch_notifies_exactly_once_with_final_state() {
        let container = StateContainer::new(counter());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = container.subscribe(collect(&seen));

        container.batch(|c| {
            c.update(|s| Counter {
                count: s.count + 1,
                ..s.clone()
            });
            c.update(|s| Counter {
                count: s.count + 1,
                ..s.clone()
            });
            c.update(|s| Counter {
                count: s.count + 1,
                ..s.clone()
            });
        });

        assert_eq!(container.state().count, 3);
        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }

    #[test]
    fn nested_batches_flush_only_at_outermost() {
        let container = StateContainer::new(counter());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = container.subscribe(collect(&seen));

        container.batch(|c| {
            c.update(|s| Counter {
                count: s.count + 1,
                ..s.clone()
            });
            c.batch(|inner| {
                inner.update(|s| Counter {
                    count: s.count + 10,
                    ..s.clone()
                });
            });
            // Inner batch exit must not have notified yet.
            assert!(seen.lock().unwrap().is_empty());
            c.update(|s| Counter {
                count: s.count + 100,
                ..s.clone()
            });
        });

        assert_eq!(container.state().count, 111);
        assert_eq!(*seen.lock().unwrap(), vec![111]);
    }

    #[test]
    fn empty_batch_stays_silent() {
        let container = StateContainer::new(counter());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = container.subscribe(collect(&seen));

        container.batch(|_| {});

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn listeners_notified_in_subscription_order() {
        let container = StateContainer::new(counter());
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_a = order.clone();
        let _a = container.subscribe(move |_: &Counter| order_a.lock().unwrap().push("a"));
        let order_b = order.clone();
        let _b = container.subscribe(move |_: &Counter| order_b.lock().unwrap().push("b"));

        container.replace(counter());
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let container = StateContainer::new(counter());
        let seen_a = Arc::new(Mutex::new(Vec::new()));
        let seen_b = Arc::new(Mutex::new(Vec::new()));
        let sub_a = container.subscribe(collect(&seen_a));
        let _sub_b = container.subscribe(collect(&seen_b));

        sub_a.unsubscribe();
        sub_a.unsubscribe();
        assert_eq!(container.listener_count(), 1);

        container.update(|s| Counter {
            count: s.count + 1,
            ..s.clone()
        });

        assert!(seen_a.lock().unwrap().is_empty());
        assert_eq!(*seen_b.lock().unwrap(), vec![1]);
    }

    #[test]
    fn dropping_subscription_detaches() {
        let container = StateContainer::new(counter());
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let _sub = container.subscribe(collect(&seen));
            assert_eq!(container.listener_count(), 1);
        }
        assert_eq!(container.listener_count(), 0);

        container.replace(counter());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn panicking_listener_does_not_stop_others() {
        let container = StateContainer::new(counter());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let _bad = container.subscribe(|_: &Counter| panic!("intentional panic"));
        let _good = container.subscribe(collect(&seen));

        // Must not propagate to the mutator either.
        container.update(|s| Counter {
            count: s.count + 1,
            ..s.clone()
        });

        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert_eq!(container.state().count, 1);
    }

    #[test]
    fn all_listeners_observe_the_same_snapshot() {
        let container = StateContainer::new(counter());
        let seen_a = Arc::new(Mutex::new(Vec::new()));
        let seen_b = Arc::new(Mutex::new(Vec::new()));
        let _a = container.subscribe(collect(&seen_a));
        let _b = container.subscribe(collect(&seen_b));

        container.batch(|c| {
            c.update(|s| Counter {
                count: s.count + 1,
                ..s.clone()
            });
            c.update(|s| Counter {
                count: s.count + 1,
                ..s.clone()
            });
        });

        assert_eq!(*seen_a.lock().unwrap(), vec![2]);
        assert_eq!(*seen_b.lock().unwrap(), vec![2]);
    }

    #[test]
    fn panicking_batch_body_still_flushes_queued_updates() {
        let container = StateContainer::new(counter());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = container.subscribe(collect(&seen));

        let result = catch_unwind(AssertUnwindSafe(|| {
            container.batch(|c| {
                c.update(|s| Counter {
                    count: s.count + 1,
                    ..s.clone()
                });
                panic!("batch body failed");
            });
        }));

        assert!(result.is_err());
        assert_eq!(container.state().count, 1);
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn listener_can_resubscribe_reentrantly() {
        let container = Arc::new(StateContainer::new(counter()));
        let spawned = Arc::new(Mutex::new(Vec::new()));

        let inner = container.clone();
        let spawned_clone = spawned.clone();
        let _sub = container.subscribe(move |_: &Counter| {
            // Subscribing from inside a notification must not deadlock.
            let sub = inner.subscribe(|_: &Counter| {});
            spawned_clone.lock().unwrap().push(sub);
        });

        container.replace(counter());
        assert_eq!(spawned.lock().unwrap().len(), 1);
    }
}
