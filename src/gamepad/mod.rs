//! Gamepad subsystem
//!
//! 1. [`selection`] - which slot a binding follows
//! 2. [`binding`] - active gamepad, axis state, button events and motors
//! 3. [`deadzone`] - analog remapping
//! 4. [`vibration`] - motor epochs guarding timed pulses

pub mod binding;
pub mod deadzone;
pub mod selection;
pub mod vibration;

pub use binding::{BindingEvents, BindingSettings, ButtonEvent, GamepadBinding};
pub use deadzone::{apply_deadzone, apply_stick_deadzone, AxisValue};
pub use selection::{select_primary, BindingMode};
pub use vibration::CommandId;

// Binding errors
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("No tokio runtime available to schedule the pulse stop")]
    NoRuntime,
}
