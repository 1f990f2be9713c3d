//! Host device boundary
//!
//! The crate never talks to an input API directly. Everything arrives through a
//! [`DeviceEventSource`] and every haptic command leaves through a
//! [`VibrationActuator`]:
//!
//! ```text
//! Host ──► DeviceEventSource ──► PreferenceTracker
//!                            ├─► GamepadBinding ──► VibrationActuator
//!                            └─► Keyboard / Mouse / Touch trackers
//! ```
//!
//! Two hosts ship with the crate:
//!
//! 1. [`scripted`] - in-memory host driven by explicit calls
//! 2. [`gilrs_backend`] - real gamepads through gilrs, polled on a blocking task

pub mod gilrs_backend;
pub mod scripted;
pub mod types;

pub use gilrs_backend::{GilrsDevices, PumpHandle, PumpSettings};
pub use scripted::{MotorCommand, ScriptedDevices};
pub use types::{
    AxisElement, DeviceCapabilities, DeviceClass, GamepadButton, GamepadSlot, InputElement,
    InputEvent, InputPhase, KeyCode, Motor, MouseInput, UnknownDeviceClass, SLOT_COUNT,
};

use crate::signal::{Connection, Signal};
use glam::Vec3;
use std::sync::Arc;

/// Notifications a host emits
#[derive(Debug)]
pub struct SourceSignals {
    pub input_began: Signal<InputEvent>,
    pub input_changed: Signal<InputEvent>,
    pub input_ended: Signal<InputEvent>,
    pub gamepad_connected: Signal<GamepadSlot>,
    pub gamepad_disconnected: Signal<GamepadSlot>,
    /// The set of navigation-capable gamepads changed
    pub navigation_changed: Signal<()>,
    pub last_input_changed: Signal<DeviceClass>,
}

impl SourceSignals {
    pub fn new() -> Self {
        Self {
            input_began: Signal::new("source.input_began"),
            input_changed: Signal::new("source.input_changed"),
            input_ended: Signal::new("source.input_ended"),
            gamepad_connected: Signal::new("source.gamepad_connected"),
            gamepad_disconnected: Signal::new("source.gamepad_disconnected"),
            navigation_changed: Signal::new("source.navigation_changed"),
            last_input_changed: Signal::new("source.last_input_changed"),
        }
    }

    pub fn for_phase(&self, phase: InputPhase) -> &Signal<InputEvent> {
        match phase {
            InputPhase::Began => &self.input_began,
            InputPhase::Changed => &self.input_changed,
            InputPhase::Ended => &self.input_ended,
        }
    }
}

impl Default for SourceSignals {
    fn default() -> Self {
        Self::new()
    }
}

/// Connects `handler` to the began, changed and ended signals.
///
/// The handler only holds `owner` weakly and stops running once the owner is
/// gone.
pub(crate) fn connect_phases<O, F>(
    signals: &SourceSignals,
    owner: &Arc<O>,
    handler: F,
) -> [Connection; 3]
where
    O: Send + Sync + 'static,
    F: Fn(&O, InputPhase, &InputEvent) + Clone + Send + Sync + 'static,
{
    [InputPhase::Began, InputPhase::Changed, InputPhase::Ended].map(|phase| {
        let owner = Arc::downgrade(owner);
        let handler = handler.clone();
        signals.for_phase(phase).connect(move |event| {
            if let Some(owner) = owner.upgrade() {
                handler(&*owner, phase, event);
            }
        })
    })
}

/// Event-driven input service of the host
pub trait DeviceEventSource: Send + Sync {
    fn signals(&self) -> &SourceSignals;

    /// Connected gamepads, lowest slot first
    fn connected_gamepads(&self) -> Vec<GamepadSlot>;

    /// Gamepads the host allows to drive UI navigation, lowest slot first
    fn navigation_gamepads(&self) -> Vec<GamepadSlot>;

    fn is_gamepad_connected(&self, slot: GamepadSlot) -> bool {
        self.connected_gamepads().contains(&slot)
    }

    fn is_button_down(&self, slot: GamepadSlot, button: GamepadButton) -> bool;

    /// Current raw samples of every analog element on `slot`
    fn axis_samples(&self, slot: GamepadSlot) -> Vec<(AxisElement, Vec3)>;

    fn last_input_class(&self) -> DeviceClass;

    fn capabilities(&self) -> DeviceCapabilities;
}

/// Haptic output of the host
pub trait VibrationActuator: Send + Sync {
    fn is_vibration_supported(&self, slot: GamepadSlot) -> bool;

    fn is_motor_supported(&self, slot: GamepadSlot, motor: Motor) -> bool;

    /// `intensity` is already clamped to `[0, 1]`
    fn set_motor(&self, slot: GamepadSlot, motor: Motor, intensity: f32);
}

// Device errors
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Failed to initialize input backend: {0}")]
    InitializationError(String),

    #[error("Backend task failed: {0}")]
    TaskError(String),
}
