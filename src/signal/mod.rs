//! Observer plumbing shared by every component
//!
//! A [`Signal`] is a named, insertion-ordered set of callbacks. Firing takes a
//! snapshot of the set and releases the lock before any callback runs, so
//! observers are free to connect, disconnect or call back into the emitter.
//!
//! # Isolation
//!
//! Each callback runs inside `catch_unwind`. A panicking observer is logged and
//! skipped; the remaining observers of the same round still run.
//!
//! ```text
//! Signal::fire ──► snapshot ──► observer 1 ──► observer 2 ──► ...
//!                               (panics are caught per observer)
//! ```

pub mod subscriptions;

pub use subscriptions::SubscriptionSet;

use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

struct Observer<T> {
    id: u64,
    live: Arc<AtomicBool>,
    callback: Callback<T>,
}

struct Registry<T> {
    next_id: u64,
    observers: Vec<Arc<Observer<T>>>,
}

// Type-erased view of a registry so a Connection does not carry T
trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

impl<T> Detach for Mutex<Registry<T>> {
    fn detach(&self, id: u64) {
        let mut registry = self.lock();
        if let Some(index) = registry.observers.iter().position(|o| o.id == id) {
            // Order among the remaining observers is not preserved
            registry.observers.swap_remove(index);
        }
    }
}

/// Named multi-observer event channel
pub struct Signal<T> {
    name: &'static str,
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T: 'static> Signal<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                observers: Vec::new(),
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Registers `callback`; it stays registered until the returned
    /// [`Connection`] is disconnected or dropped.
    pub fn connect<F>(&self, callback: F) -> Connection
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let live = Arc::new(AtomicBool::new(true));
        let id = {
            let mut registry = self.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.observers.push(Arc::new(Observer {
                id,
                live: Arc::clone(&live),
                callback: Box::new(callback),
            }));
            id
        };
        debug!("Observer {} connected to '{}'", id, self.name);

        let registry: Weak<dyn Detach> = Arc::downgrade(&self.registry) as Weak<dyn Detach>;
        Connection { id, live, registry }
    }

    /// Delivers `value` to every observer connected at the time of the call.
    ///
    /// Observers disconnected while the round is in progress are skipped.
    /// Returns the number of observers that completed without panicking.
    pub fn fire(&self, value: &T) -> usize {
        let snapshot: Vec<Arc<Observer<T>>> = self.registry.lock().observers.clone();

        let mut delivered = 0;
        for observer in snapshot {
            if !observer.live.load(Ordering::Acquire) {
                continue;
            }
            if isolate(self.name, || (observer.callback)(value)) {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn observer_count(&self) -> usize {
        self.registry.lock().observers.len()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("observers", &self.registry.lock().observers.len())
            .finish()
    }
}

/// Runs `callback`, containing a panic instead of unwinding into the caller.
///
/// Returns `false` if the callback panicked.
pub(crate) fn isolate<F: FnOnce()>(signal: &str, callback: F) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(()) => true,
        Err(_) => {
            error!("Observer of '{}' panicked, continuing fan-out", signal);
            false
        }
    }
}

/// Handle to one registered observer
///
/// Dropping the handle disconnects the observer.
#[must_use = "dropping a Connection disconnects its observer"]
pub struct Connection {
    id: u64,
    live: Arc<AtomicBool>,
    registry: Weak<dyn Detach>,
}

impl Connection {
    /// Removes the observer. Safe to call more than once, including from
    /// inside the observer's own callback.
    pub fn disconnect(&self) {
        if self.live.swap(false, Ordering::AcqRel) {
            if let Some(registry) = self.registry.upgrade() {
                registry.detach(self.id);
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn fires_in_insertion_order() {
        let signal = Signal::<u32>::new("test.order");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let seen = Arc::clone(&seen);
            signal.connect(move |v| seen.lock().push(("first", *v)))
        };
        let second = {
            let seen = Arc::clone(&seen);
            signal.connect(move |v| seen.lock().push(("second", *v)))
        };

        assert_eq!(signal.fire(&7), 2);
        assert_eq!(*seen.lock(), vec![("first", 7), ("second", 7)]);
        drop((first, second));
    }

    #[test]
    fn dropping_connection_detaches() {
        let signal = Signal::<()>::new("test.drop");
        let hits = Arc::new(AtomicUsize::new(0));

        let connection = {
            let hits = Arc::clone(&hits);
            signal.connect(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        signal.fire(&());
        drop(connection);
        signal.fire(&());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(signal.observer_count(), 0);
    }

    #[test]
    fn panicking_observer_does_not_block_siblings() {
        let signal = Signal::<u8>::new("test.panic");
        let hits = Arc::new(AtomicUsize::new(0));

        let _bad = signal.connect(|_| panic!("observer failure"));
        let _good = {
            let hits = Arc::clone(&hits);
            signal.connect(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };

        assert_eq!(signal.fire(&1), 1);
        assert_eq!(signal.fire(&2), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn self_disconnect_keeps_round_for_others() {
        let signal = Signal::<u8>::new("test.self_disconnect");
        let own_hits = Arc::new(AtomicUsize::new(0));
        let other_hits = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Connection>>> = Arc::new(Mutex::new(None));

        let connection = {
            let own_hits = Arc::clone(&own_hits);
            let slot = Arc::clone(&slot);
            signal.connect(move |_| {
                own_hits.fetch_add(1, Ordering::SeqCst);
                if let Some(connection) = slot.lock().as_ref() {
                    connection.disconnect();
                }
            })
        };
        *slot.lock() = Some(connection);

        let _other = {
            let other_hits = Arc::clone(&other_hits);
            signal.connect(move |_| {
                other_hits.fetch_add(1, Ordering::SeqCst);
            })
        };

        signal.fire(&1);
        signal.fire(&2);

        assert_eq!(own_hits.load(Ordering::SeqCst), 1);
        assert_eq!(other_hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn disconnect_is_idempotent_after_signal_dropped() {
        let signal = Signal::<()>::new("test.gone");
        let connection = signal.connect(|_| {});
        drop(signal);
        connection.disconnect();
        connection.disconnect();
        assert!(!connection.is_connected());
    }
}
