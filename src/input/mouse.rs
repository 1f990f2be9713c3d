use glam::Vec2;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::device::{
    connect_phases, DeviceClass, DeviceEventSource, InputEvent, InputPhase, MouseInput,
};
use crate::signal::{Signal, SubscriptionSet};

// Physical mouse button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    fn from_input(input: MouseInput) -> Option<Self> {
        match input {
            MouseInput::Button1 => Some(MouseButton::Left),
            MouseInput::Button2 => Some(MouseButton::Right),
            MouseInput::Button3 => Some(MouseButton::Middle),
            MouseInput::Wheel | MouseInput::Movement => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseButtonEvent {
    pub button: MouseButton,
    pub position: Vec2,
    pub consumed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseMotion {
    pub position: Vec2,
    pub delta: Vec2,
    pub consumed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelEvent {
    /// Positive scrolls away from the user
    pub delta: f32,
    pub position: Vec2,
    pub consumed: bool,
}

#[derive(Debug)]
pub struct MouseEvents {
    pub button_down: Signal<MouseButtonEvent>,
    pub button_up: Signal<MouseButtonEvent>,
    pub moved: Signal<MouseMotion>,
    pub wheel: Signal<WheelEvent>,
}

#[derive(Debug, Default)]
struct MouseState {
    position: Vec2,
    held: HashSet<MouseButton>,
    subscriptions: SubscriptionSet,
    destroyed: bool,
}

enum MouseOutput {
    Down(MouseButtonEvent),
    Up(MouseButtonEvent),
    Moved(MouseMotion),
    Wheel(WheelEvent),
}

struct MouseCore {
    events: MouseEvents,
    state: Mutex<MouseState>,
}

/// Mouse fan-out with pointer position and held buttons
pub struct MouseTracker {
    core: Arc<MouseCore>,
}

impl MouseTracker {
    pub fn new(source: &dyn DeviceEventSource) -> Self {
        let core = Arc::new(MouseCore {
            events: MouseEvents {
                button_down: Signal::new("mouse.button_down"),
                button_up: Signal::new("mouse.button_up"),
                moved: Signal::new("mouse.moved"),
                wheel: Signal::new("mouse.wheel"),
            },
            state: Mutex::new(MouseState::default()),
        });

        let connections =
            connect_phases(source.signals(), &core, |core: &MouseCore, phase, event| {
                if let DeviceClass::Mouse(input) = event.class {
                    core.handle(input, phase, event);
                }
            });
        core.state.lock().subscriptions.extend(connections);

        Self { core }
    }

    pub fn events(&self) -> &MouseEvents {
        &self.core.events
    }

    /// Last reported pointer position
    pub fn position(&self) -> Vec2 {
        self.core.state.lock().position
    }

    pub fn is_button_down(&self, button: MouseButton) -> bool {
        self.core.state.lock().held.contains(&button)
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

impl Drop for MouseTracker {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl MouseCore {
    fn handle(&self, input: MouseInput, phase: InputPhase, event: &InputEvent) {
        let position = event.position.truncate();
        let output = {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            state.position = position;

            match (input, phase) {
                (MouseInput::Movement, _) => MouseOutput::Moved(MouseMotion {
                    position,
                    delta: event.delta.truncate(),
                    consumed: event.consumed,
                }),
                (MouseInput::Wheel, _) => MouseOutput::Wheel(WheelEvent {
                    delta: event.position.z,
                    position,
                    consumed: event.consumed,
                }),
                (button, InputPhase::Began) | (button, InputPhase::Ended) => {
                    let Some(button) = MouseButton::from_input(button) else {
                        return;
                    };
                    let button_event = MouseButtonEvent {
                        button,
                        position,
                        consumed: event.consumed,
                    };
                    if phase == InputPhase::Began {
                        state.held.insert(button);
                        MouseOutput::Down(button_event)
                    } else {
                        state.held.remove(&button);
                        MouseOutput::Up(button_event)
                    }
                }
                (_, InputPhase::Changed) => return,
            }
        };

        match output {
            MouseOutput::Down(e) => {
                debug!("Mouse {:?} down at {}", e.button, e.position);
                self.events.button_down.fire(&e);
            }
            MouseOutput::Up(e) => {
                debug!("Mouse {:?} up at {}", e.button, e.position);
                self.events.button_up.fire(&e);
            }
            MouseOutput::Moved(e) => {
                self.events.moved.fire(&e);
            }
            MouseOutput::Wheel(e) => {
                debug!("Wheel {:.2} at {}", e.delta, e.position);
                self.events.wheel.fire(&e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ScriptedDevices;
    use parking_lot::Mutex;

    #[test]
    fn buttons_motion_and_wheel() {
        let devices = ScriptedDevices::new();
        let mouse = MouseTracker::new(&devices);
        let wheel = Arc::new(Mutex::new(Vec::new()));
        let _connection = {
            let wheel = Arc::clone(&wheel);
            mouse.events().wheel.connect(move |e| wheel.lock().push(e.delta))
        };

        devices.mouse_button_down(MouseInput::Button2, Vec2::new(5.0, 6.0), false);
        assert!(mouse.is_button_down(MouseButton::Right));
        assert_eq!(mouse.position(), Vec2::new(5.0, 6.0));

        devices.mouse_move(Vec2::new(8.0, 9.0), Vec2::new(3.0, 3.0));
        assert_eq!(mouse.position(), Vec2::new(8.0, 9.0));

        devices.mouse_button_up(MouseInput::Button2, Vec2::new(8.0, 9.0), false);
        assert!(!mouse.is_button_down(MouseButton::Right));

        devices.scroll(Vec2::new(8.0, 9.0), -1.0, true);
        assert_eq!(*wheel.lock(), vec![-1.0]);
    }

    #[test]
    fn ignores_other_devices() {
        let devices = ScriptedDevices::new();
        let mouse = MouseTracker::new(&devices);
        devices.touch_begin(1, Vec2::new(100.0, 100.0), false);
        assert_eq!(mouse.position(), Vec2::ZERO);
    }
}
