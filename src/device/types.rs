use chrono::{DateTime, Local};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of physical gamepad ports a host exposes
pub const SLOT_COUNT: u8 = 8;

/// One of the host's gamepad ports
///
/// Slots are totally ordered; "lowest-ordered" always means the smallest port
/// number. Displayed 1-based (`Gamepad1` .. `Gamepad8`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GamepadSlot(u8);

impl GamepadSlot {
    /// Slot from a zero-based port index
    pub fn new(index: u8) -> Option<Self> {
        (index < SLOT_COUNT).then_some(Self(index))
    }

    /// Slot from the 1-based port number hosts show to users
    pub fn from_number(number: u8) -> Option<Self> {
        number.checked_sub(1).and_then(Self::new)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn number(self) -> u8 {
        self.0 + 1
    }

    pub fn all() -> impl Iterator<Item = GamepadSlot> {
        (0..SLOT_COUNT).map(GamepadSlot)
    }
}

impl fmt::Display for GamepadSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gamepad{}", self.number())
    }
}

// Mouse sub-classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseInput {
    Button1,
    Button2,
    Button3,
    Wheel,
    Movement,
}

/// Device class of an input event
///
/// Decided once where the host hands the event over; nothing downstream
/// re-parses tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Keyboard,
    Mouse(MouseInput),
    Touch,
    Gamepad(GamepadSlot),
    TextInput,
    Focus,
    Accelerometer,
    Gyro,
    None,
}

impl DeviceClass {
    pub fn gamepad_slot(self) -> Option<GamepadSlot> {
        match self {
            DeviceClass::Gamepad(slot) => Some(slot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown device class tag: {0}")]
pub struct UnknownDeviceClass(pub String);

impl FromStr for DeviceClass {
    type Err = UnknownDeviceClass;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let class = match tag {
            "Keyboard" => DeviceClass::Keyboard,
            "MouseButton1" => DeviceClass::Mouse(MouseInput::Button1),
            "MouseButton2" => DeviceClass::Mouse(MouseInput::Button2),
            "MouseButton3" => DeviceClass::Mouse(MouseInput::Button3),
            "MouseWheel" => DeviceClass::Mouse(MouseInput::Wheel),
            "MouseMovement" => DeviceClass::Mouse(MouseInput::Movement),
            "Touch" => DeviceClass::Touch,
            "TextInput" => DeviceClass::TextInput,
            "Focus" => DeviceClass::Focus,
            "Accelerometer" => DeviceClass::Accelerometer,
            "Gyro" => DeviceClass::Gyro,
            "None" => DeviceClass::None,
            other => {
                return other
                    .strip_prefix("Gamepad")
                    .and_then(|n| n.parse::<u8>().ok())
                    .and_then(GamepadSlot::from_number)
                    .map(DeviceClass::Gamepad)
                    .ok_or_else(|| UnknownDeviceClass(other.to_string()));
            }
        };
        Ok(class)
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceClass::Keyboard => f.write_str("Keyboard"),
            DeviceClass::Mouse(MouseInput::Button1) => f.write_str("MouseButton1"),
            DeviceClass::Mouse(MouseInput::Button2) => f.write_str("MouseButton2"),
            DeviceClass::Mouse(MouseInput::Button3) => f.write_str("MouseButton3"),
            DeviceClass::Mouse(MouseInput::Wheel) => f.write_str("MouseWheel"),
            DeviceClass::Mouse(MouseInput::Movement) => f.write_str("MouseMovement"),
            DeviceClass::Touch => f.write_str("Touch"),
            DeviceClass::Gamepad(slot) => write!(f, "{}", slot),
            DeviceClass::TextInput => f.write_str("TextInput"),
            DeviceClass::Focus => f.write_str("Focus"),
            DeviceClass::Accelerometer => f.write_str("Accelerometer"),
            DeviceClass::Gyro => f.write_str("Gyro"),
            DeviceClass::None => f.write_str("None"),
        }
    }
}

// Gamepad button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GamepadButton {
    South,
    East,
    West,
    North,
    Start,
    Select,
    LeftBumper,
    RightBumper,
    LeftTrigger,
    RightTrigger,
    LeftStick,
    RightStick,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
    Guide,
}

/// Analog element of a gamepad
///
/// Sticks report on x/y of the raw sample, triggers on z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisElement {
    LeftStick,
    RightStick,
    LeftTrigger,
    RightTrigger,
}

impl AxisElement {
    pub const ALL: [AxisElement; 4] = [
        AxisElement::LeftStick,
        AxisElement::RightStick,
        AxisElement::LeftTrigger,
        AxisElement::RightTrigger,
    ];

    pub fn is_stick(self) -> bool {
        matches!(self, AxisElement::LeftStick | AxisElement::RightStick)
    }
}

// Vibration motor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Motor {
    Large,
    Small,
    LeftTrigger,
    RightTrigger,
}

impl Motor {
    pub const ALL: [Motor; 4] = [
        Motor::Large,
        Motor::Small,
        Motor::LeftTrigger,
        Motor::RightTrigger,
    ];
}

/// Host key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCode(pub u32);

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

// What inside the device produced the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputElement {
    None,
    Key(KeyCode),
    Button(GamepadButton),
    Axis(AxisElement),
    Touch(u32),
}

// Lifecycle phase of an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputPhase {
    Began,
    Changed,
    Ended,
}

/// One discrete input notification from the host
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    pub class: DeviceClass,
    pub element: InputElement,
    pub position: Vec3,
    pub delta: Vec3,
    /// Already handled by the UI layer
    pub consumed: bool,
    pub timestamp: DateTime<Local>,
}

impl InputEvent {
    pub fn new(class: DeviceClass, element: InputElement) -> Self {
        Self {
            class,
            element,
            position: Vec3::ZERO,
            delta: Vec3::ZERO,
            consumed: false,
            timestamp: Local::now(),
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_delta(mut self, delta: Vec3) -> Self {
        self.delta = delta;
        self
    }

    pub fn with_consumed(mut self, consumed: bool) -> Self {
        self.consumed = consumed;
        self
    }
}

/// What the host platform offers, used when the last input says nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub ten_foot_interface: bool,
    pub keyboard_enabled: bool,
    pub mouse_enabled: bool,
    pub touch_enabled: bool,
    pub gamepad_enabled: bool,
}
