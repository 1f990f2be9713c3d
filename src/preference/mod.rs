//! Preferred input modality
//!
//! [`PreferenceTracker`] infers whether the user is currently driving the
//! client with mouse and keyboard, touch, or a gamepad from the host's
//! "last input device changed" notifications.

pub mod classify;
pub mod tracker;

pub use classify::{classify, infer_from_capabilities};
pub use tracker::PreferenceTracker;

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputModality {
    MouseKeyboard,
    Touch,
    Gamepad,
}

impl fmt::Display for InputModality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputModality::MouseKeyboard => f.write_str("mouse & keyboard"),
            InputModality::Touch => f.write_str("touch"),
            InputModality::Gamepad => f.write_str("gamepad"),
        }
    }
}

// Preference errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreferenceError {
    #[error("Preferred input is not known yet")]
    NotYetKnown,

    #[error("Preference tracker was destroyed")]
    Destroyed,
}
