//! Input abstraction over a host's devices
//!
//! [`GamepadBinding`] follows one gamepad (pinned to a slot or tracking the
//! primary navigation pad) and exposes its buttons, deadzoned axes and motors.
//! [`PreferenceTracker`] infers whether the user is on mouse and keyboard,
//! touch or gamepad from the most recent input. Both sit on a
//! [`DeviceEventSource`], either [`ScriptedDevices`] or the gilrs backed
//! [`GilrsDevices`].

pub mod config;
pub mod device;
pub mod gamepad;
pub mod input;
pub mod preference;
pub mod signal;

pub use config::InputSettings;
pub use device::{
    DeviceEventSource, GilrsDevices, PumpHandle, ScriptedDevices, VibrationActuator,
};
pub use gamepad::{AxisValue, BindingError, BindingSettings, GamepadBinding};
pub use preference::{InputModality, PreferenceError, PreferenceTracker};
pub use signal::{Connection, Signal};
