use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::classify::{classify, infer_from_capabilities};
use super::{InputModality, PreferenceError};
use crate::device::{DeviceClass, DeviceEventSource};
use crate::signal::{self, Connection, Signal, SubscriptionSet};

#[derive(Debug, Default)]
struct TrackerState {
    current: Option<InputModality>,
    subscriptions: SubscriptionSet,
    destroyed: bool,
}

struct TrackerCore {
    source: Arc<dyn DeviceEventSource>,
    state: Mutex<TrackerState>,
    changed: Signal<InputModality>,
    current_tx: watch::Sender<Option<InputModality>>,
    shutdown: CancellationToken,
}

/// Tracks which input modality the user prefers right now
///
/// Independent instances can share one source. Dropping the tracker
/// destroys it.
pub struct PreferenceTracker {
    core: Arc<TrackerCore>,
}

impl PreferenceTracker {
    /// Subscribes to the source and classifies its current last-used device
    pub fn new(source: Arc<dyn DeviceEventSource>) -> Self {
        let (current_tx, _) = watch::channel(None);
        let core = Arc::new(TrackerCore {
            source,
            state: Mutex::new(TrackerState::default()),
            changed: Signal::new("preference.changed"),
            current_tx,
            shutdown: CancellationToken::new(),
        });

        {
            let weak = Arc::downgrade(&core);
            let connection = core.source.signals().last_input_changed.connect(move |class| {
                if let Some(core) = weak.upgrade() {
                    core.apply(*class);
                }
            });
            core.state.lock().subscriptions.add(connection);
        }

        let initial = core.source.last_input_class();
        debug!("Initial last input class: {}", initial);
        core.apply(initial);

        Self { core }
    }

    /// Current preference
    ///
    /// # Errors
    ///
    /// [`PreferenceError::NotYetKnown`] before the first classification.
    pub fn preferred(&self) -> Result<InputModality, PreferenceError> {
        self.core
            .state
            .lock()
            .current
            .ok_or(PreferenceError::NotYetKnown)
    }

    /// Waits until a preference is known
    ///
    /// # Errors
    ///
    /// [`PreferenceError::Destroyed`] if the tracker is destroyed first.
    pub async fn wait_preferred(&self) -> Result<InputModality, PreferenceError> {
        let mut rx = self.core.current_tx.subscribe();
        let token = self.core.shutdown.clone();
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(PreferenceError::Destroyed),
            known = rx.wait_for(Option::is_some) => known
                .ok()
                .and_then(|value| *value)
                .ok_or(PreferenceError::Destroyed),
        }
    }

    /// Watch channel mirroring the current preference
    pub fn watch(&self) -> watch::Receiver<Option<InputModality>> {
        self.core.current_tx.subscribe()
    }

    /// Calls `callback` now with the current preference (if known) and
    /// afterwards on every change, until the connection is dropped.
    pub fn observe<F>(&self, callback: F) -> Connection
    where
        F: Fn(InputModality) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        let forward = Arc::clone(&callback);
        let connection = self
            .core
            .changed
            .connect(move |modality| forward(*modality));

        let current = self.core.state.lock().current;
        if let Some(modality) = current {
            signal::isolate(self.core.changed.name(), || callback(modality));
        }
        connection
    }

    /// Releases the source subscription. Calling it again does nothing.
    pub fn destroy(&self) {
        let mut state = self.core.state.lock();
        if state.destroyed {
            return;
        }
        state.destroyed = true;
        state.subscriptions.clear();
        self.core.shutdown.cancel();
        debug!("Preference tracker destroyed");
    }
}

impl Drop for PreferenceTracker {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl TrackerCore {
    fn apply(&self, class: DeviceClass) {
        let next = {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            let next = match (classify(class), state.current) {
                (Some(modality), _) => modality,
                (None, None) => {
                    let guess = infer_from_capabilities(&self.source.capabilities());
                    debug!("{} says nothing about preference, guessed {}", class, guess);
                    guess
                }
                (None, Some(_)) => {
                    debug!("Ignoring {} for preference", class);
                    return;
                }
            };
            if state.current == Some(next) {
                return;
            }
            info!(
                "Preferred input: {} -> {}",
                state
                    .current
                    .map_or_else(|| "unknown".to_string(), |m| m.to_string()),
                next
            );
            state.current = Some(next);
            next
        };

        if self.state.lock().destroyed {
            return;
        }
        self.current_tx.send_replace(Some(next));
        self.changed.fire(&next);
    }
}
