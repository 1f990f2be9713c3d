use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::device::{
    connect_phases, DeviceClass, DeviceEventSource, InputElement, InputEvent, InputPhase, KeyCode,
};
use crate::signal::{Signal, SubscriptionSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: KeyCode,
    pub consumed: bool,
}

#[derive(Debug)]
pub struct KeyboardEvents {
    pub key_down: Signal<KeyEvent>,
    pub key_up: Signal<KeyEvent>,
}

#[derive(Debug, Default)]
struct KeyboardState {
    held: HashSet<KeyCode>,
    subscriptions: SubscriptionSet,
    destroyed: bool,
}

struct KeyboardCore {
    events: KeyboardEvents,
    state: Mutex<KeyboardState>,
}

/// Keyboard fan-out with a set of held keys
pub struct KeyboardTracker {
    core: Arc<KeyboardCore>,
}

impl KeyboardTracker {
    pub fn new(source: &dyn DeviceEventSource) -> Self {
        let core = Arc::new(KeyboardCore {
            events: KeyboardEvents {
                key_down: Signal::new("keyboard.key_down"),
                key_up: Signal::new("keyboard.key_up"),
            },
            state: Mutex::new(KeyboardState::default()),
        });

        let connections = connect_phases(
            source.signals(),
            &core,
            |core: &KeyboardCore, phase, event| {
                if event.class == DeviceClass::Keyboard {
                    core.handle(phase, event);
                }
            },
        );
        core.state.lock().subscriptions.extend(connections);

        Self { core }
    }

    pub fn events(&self) -> &KeyboardEvents {
        &self.core.events
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.core.state.lock().held.contains(&key)
    }

    pub fn held_keys(&self) -> Vec<KeyCode> {
        self.core.state.lock().held.iter().copied().collect()
    }

    pub fn destroy(&self) {
        let mut state = self.core.state.lock();
        if !state.destroyed {
            state.destroyed = true;
            state.subscriptions.clear();
            state.held.clear();
        }
    }
}

impl Drop for KeyboardTracker {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl KeyboardCore {
    fn handle(&self, phase: InputPhase, event: &InputEvent) {
        let InputElement::Key(key) = event.element else {
            return;
        };
        let key_event = KeyEvent {
            key,
            consumed: event.consumed,
        };

        {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            match phase {
                InputPhase::Began => {
                    state.held.insert(key);
                }
                InputPhase::Ended => {
                    state.held.remove(&key);
                }
                InputPhase::Changed => return,
            }
        }

        debug!("{} {:?} (consumed: {})", key, phase, event.consumed);
        match phase {
            InputPhase::Began => self.events.key_down.fire(&key_event),
            _ => self.events.key_up.fire(&key_event),
        };
    }
}
