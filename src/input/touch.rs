use glam::Vec2;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::device::{
    connect_phases, DeviceClass, DeviceEventSource, InputElement, InputEvent, InputPhase,
};
use crate::signal::{Signal, SubscriptionSet};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub id: u32,
    pub position: Vec2,
    pub delta: Vec2,
    pub consumed: bool,
}

#[derive(Debug)]
pub struct TouchEvents {
    pub started: Signal<TouchEvent>,
    pub moved: Signal<TouchEvent>,
    pub ended: Signal<TouchEvent>,
}

#[derive(Debug, Default)]
struct TouchState {
    active: HashMap<u32, Vec2>,
    subscriptions: SubscriptionSet,
    destroyed: bool,
}

struct TouchCore {
    events: TouchEvents,
    state: Mutex<TouchState>,
}

/// Touch fan-out with the set of fingers currently down
pub struct TouchTracker {
    core: Arc<TouchCore>,
}

impl TouchTracker {
    pub fn new(source: &dyn DeviceEventSource) -> Self {
        let core = Arc::new(TouchCore {
            events: TouchEvents {
                started: Signal::new("touch.started"),
                moved: Signal::new("touch.moved"),
                ended: Signal::new("touch.ended"),
            },
            state: Mutex::new(TouchState::default()),
        });

        let connections =
            connect_phases(source.signals(), &core, |core: &TouchCore, phase, event| {
                if event.class == DeviceClass::Touch {
                    core.handle(phase, event);
                }
            });
        core.state.lock().subscriptions.extend(connections);

        Self { core }
    }

    pub fn events(&self) -> &TouchEvents {
        &self.core.events
    }

    /// Ids of touches that began and have not ended, in no particular order
    pub fn active_touches(&self) -> Vec<u32> {
        self.core.state.lock().active.keys().copied().collect()
    }

    pub fn touch_position(&self, id: u32) -> Option<Vec2> {
        self.core.state.lock().active.get(&id).copied()
    }

    pub fn destroy(&self) {
        let mut state = self.core.state.lock();
        if !state.destroyed {
            state.destroyed = true;
            state.subscriptions.clear();
            state.active.clear();
        }
    }
}

impl Drop for TouchTracker {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl TouchCore {
    fn handle(&self, phase: InputPhase, event: &InputEvent) {
        let InputElement::Touch(id) = event.element else {
            return;
        };
        let touch = TouchEvent {
            id,
            position: event.position.truncate(),
            delta: event.delta.truncate(),
            consumed: event.consumed,
        };

        {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            match phase {
                InputPhase::Began | InputPhase::Changed => {
                    state.active.insert(id, touch.position);
                }
                InputPhase::Ended => {
                    state.active.remove(&id);
                }
            }
        }

        match phase {
            InputPhase::Began => {
                debug!("Touch {} started at {}", id, touch.position);
                self.events.started.fire(&touch);
            }
            InputPhase::Changed => {
                self.events.moved.fire(&touch);
            }
            InputPhase::Ended => {
                debug!("Touch {} ended at {}", id, touch.position);
                self.events.ended.fire(&touch);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ScriptedDevices;

    #[test]
    fn follows_multiple_fingers() {
        let devices = ScriptedDevices::new();
        let touch = TouchTracker::new(&devices);

        devices.touch_begin(1, Vec2::new(1.0, 1.0), false);
        devices.touch_begin(2, Vec2::new(2.0, 2.0), false);
        devices.touch_move(1, Vec2::new(4.0, 1.0), Vec2::new(3.0, 0.0), false);
        assert_eq!(touch.touch_position(1), Some(Vec2::new(4.0, 1.0)));

        let mut active = touch.active_touches();
        active.sort_unstable();
        assert_eq!(active, vec![1, 2]);

        devices.touch_end(1, Vec2::new(4.0, 1.0), false);
        assert_eq!(touch.active_touches(), vec![2]);
        assert_eq!(touch.touch_position(1), None);
    }
}
