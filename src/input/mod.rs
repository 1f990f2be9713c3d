//! Per-device fan-out
//!
//! Thin trackers that re-emit the host's began / changed / ended events for
//! one device class as typed signals, keeping only the "currently held" state
//! callers usually ask for.

pub mod keyboard;
pub mod mouse;
pub mod touch;

pub use keyboard::{KeyEvent, KeyboardEvents, KeyboardTracker};
pub use mouse::{MouseButton, MouseButtonEvent, MouseEvents, MouseMotion, MouseTracker, WheelEvent};
pub use touch::{TouchEvent, TouchEvents, TouchTracker};
