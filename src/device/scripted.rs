//! In-memory host
//!
//! Every input is injected by an explicit call; state changes are applied
//! before the matching signal fires, so observers see a consistent host when
//! they query back. Motor commands are recorded rather than played.

use glam::{Vec2, Vec3};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

use super::{
    AxisElement, DeviceCapabilities, DeviceClass, DeviceEventSource, GamepadButton, GamepadSlot,
    InputElement, InputEvent, InputPhase, KeyCode, Motor, MouseInput, SourceSignals,
    VibrationActuator,
};

/// A motor command as received by the actuator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorCommand {
    pub slot: GamepadSlot,
    pub motor: Motor,
    pub intensity: f32,
}

#[derive(Debug, Default)]
struct ScriptedPad {
    buttons: HashSet<GamepadButton>,
    axes: HashMap<AxisElement, Vec3>,
}

#[derive(Debug)]
struct ScriptedState {
    pads: BTreeMap<GamepadSlot, ScriptedPad>,
    navigation: BTreeSet<GamepadSlot>,
    last_input: DeviceClass,
    capabilities: DeviceCapabilities,
    unsupported_motors: HashSet<(GamepadSlot, Motor)>,
    no_vibration: HashSet<GamepadSlot>,
    motor_log: Vec<MotorCommand>,
    intensities: HashMap<(GamepadSlot, Motor), f32>,
}

/// Scripted [`DeviceEventSource`] and [`VibrationActuator`]
#[derive(Debug)]
pub struct ScriptedDevices {
    signals: SourceSignals,
    state: Mutex<ScriptedState>,
}

impl ScriptedDevices {
    pub fn new() -> Self {
        Self::with_capabilities(DeviceCapabilities {
            keyboard_enabled: true,
            mouse_enabled: true,
            ..Default::default()
        })
    }

    pub fn with_capabilities(capabilities: DeviceCapabilities) -> Self {
        Self {
            signals: SourceSignals::new(),
            state: Mutex::new(ScriptedState {
                pads: BTreeMap::new(),
                navigation: BTreeSet::new(),
                last_input: DeviceClass::None,
                capabilities,
                unsupported_motors: HashSet::new(),
                no_vibration: HashSet::new(),
                motor_log: Vec::new(),
                intensities: HashMap::new(),
            }),
        }
    }

    pub fn set_capabilities(&self, capabilities: DeviceCapabilities) {
        self.state.lock().capabilities = capabilities;
    }

    // -- gamepads ---------------------------------------------------------

    pub fn connect_gamepad(&self, slot: GamepadSlot) {
        let inserted = {
            let mut state = self.state.lock();
            let inserted = !state.pads.contains_key(&slot);
            state.pads.entry(slot).or_default();
            state.capabilities.gamepad_enabled = true;
            inserted
        };
        if inserted {
            debug!("Scripted {} connected", slot);
            self.signals.gamepad_connected.fire(&slot);
        }
    }

    pub fn disconnect_gamepad(&self, slot: GamepadSlot) {
        let removed = {
            let mut state = self.state.lock();
            let removed = state.pads.remove(&slot).is_some();
            state.capabilities.gamepad_enabled = !state.pads.is_empty();
            removed
        };
        if removed {
            debug!("Scripted {} disconnected", slot);
            self.signals.gamepad_disconnected.fire(&slot);
        }
    }

    /// Marks `slot` as able (or not) to drive UI navigation
    pub fn set_navigation(&self, slot: GamepadSlot, enabled: bool) {
        let changed = {
            let mut state = self.state.lock();
            if enabled {
                state.navigation.insert(slot)
            } else {
                state.navigation.remove(&slot)
            }
        };
        if changed {
            self.signals.navigation_changed.fire(&());
        }
    }

    pub fn press_button(&self, slot: GamepadSlot, button: GamepadButton, consumed: bool) {
        if let Some(pad) = self.state.lock().pads.get_mut(&slot) {
            pad.buttons.insert(button);
        }
        let class = DeviceClass::Gamepad(slot);
        self.note_last_input(class);
        let event = InputEvent::new(class, InputElement::Button(button))
            .with_position(Vec3::new(0.0, 0.0, 1.0))
            .with_consumed(consumed);
        self.signals.input_began.fire(&event);
    }

    pub fn release_button(&self, slot: GamepadSlot, button: GamepadButton, consumed: bool) {
        if let Some(pad) = self.state.lock().pads.get_mut(&slot) {
            pad.buttons.remove(&button);
        }
        let class = DeviceClass::Gamepad(slot);
        self.note_last_input(class);
        let event =
            InputEvent::new(class, InputElement::Button(button)).with_consumed(consumed);
        self.signals.input_ended.fire(&event);
    }

    /// Stores a raw sample for `axis` and emits an input-changed event
    pub fn move_axis(&self, slot: GamepadSlot, axis: AxisElement, sample: Vec3) {
        let previous = {
            let mut state = self.state.lock();
            state
                .pads
                .get_mut(&slot)
                .and_then(|pad| pad.axes.insert(axis, sample))
                .unwrap_or(Vec3::ZERO)
        };
        let class = DeviceClass::Gamepad(slot);
        self.note_last_input(class);
        let event = InputEvent::new(class, InputElement::Axis(axis))
            .with_position(sample)
            .with_delta(sample - previous);
        self.signals.input_changed.fire(&event);
    }

    // -- keyboard, mouse, touch -------------------------------------------

    pub fn key_down(&self, key: KeyCode, consumed: bool) {
        self.note_last_input(DeviceClass::Keyboard);
        let event =
            InputEvent::new(DeviceClass::Keyboard, InputElement::Key(key)).with_consumed(consumed);
        self.signals.input_began.fire(&event);
    }

    pub fn key_up(&self, key: KeyCode, consumed: bool) {
        self.note_last_input(DeviceClass::Keyboard);
        let event =
            InputEvent::new(DeviceClass::Keyboard, InputElement::Key(key)).with_consumed(consumed);
        self.signals.input_ended.fire(&event);
    }

    pub fn mouse_button_down(&self, button: MouseInput, position: Vec2, consumed: bool) {
        let class = DeviceClass::Mouse(button);
        self.note_last_input(class);
        let event = InputEvent::new(class, InputElement::None)
            .with_position(position.extend(0.0))
            .with_consumed(consumed);
        self.signals.input_began.fire(&event);
    }

    pub fn mouse_button_up(&self, button: MouseInput, position: Vec2, consumed: bool) {
        let class = DeviceClass::Mouse(button);
        self.note_last_input(class);
        let event = InputEvent::new(class, InputElement::None)
            .with_position(position.extend(0.0))
            .with_consumed(consumed);
        self.signals.input_ended.fire(&event);
    }

    pub fn mouse_move(&self, position: Vec2, delta: Vec2) {
        let class = DeviceClass::Mouse(MouseInput::Movement);
        self.note_last_input(class);
        let event = InputEvent::new(class, InputElement::None)
            .with_position(position.extend(0.0))
            .with_delta(delta.extend(0.0));
        self.signals.input_changed.fire(&event);
    }

    /// Wheel travel is carried on z, like the host reports it
    pub fn scroll(&self, position: Vec2, wheel: f32, consumed: bool) {
        let class = DeviceClass::Mouse(MouseInput::Wheel);
        self.note_last_input(class);
        let event = InputEvent::new(class, InputElement::None)
            .with_position(position.extend(wheel))
            .with_delta(Vec3::new(0.0, 0.0, wheel))
            .with_consumed(consumed);
        self.signals.input_changed.fire(&event);
    }

    pub fn touch_begin(&self, id: u32, position: Vec2, consumed: bool) {
        self.touch(InputPhase::Began, id, position, Vec2::ZERO, consumed);
    }

    pub fn touch_move(&self, id: u32, position: Vec2, delta: Vec2, consumed: bool) {
        self.touch(InputPhase::Changed, id, position, delta, consumed);
    }

    pub fn touch_end(&self, id: u32, position: Vec2, consumed: bool) {
        self.touch(InputPhase::Ended, id, position, Vec2::ZERO, consumed);
    }

    fn touch(&self, phase: InputPhase, id: u32, position: Vec2, delta: Vec2, consumed: bool) {
        self.note_last_input(DeviceClass::Touch);
        let event = InputEvent::new(DeviceClass::Touch, InputElement::Touch(id))
            .with_position(position.extend(0.0))
            .with_delta(delta.extend(0.0))
            .with_consumed(consumed);
        self.signals.for_phase(phase).fire(&event);
    }

    /// Reports `class` as the last used device, firing only on change
    pub fn set_last_input(&self, class: DeviceClass) {
        self.note_last_input(class);
    }

    fn note_last_input(&self, class: DeviceClass) {
        let changed = {
            let mut state = self.state.lock();
            let changed = state.last_input != class;
            state.last_input = class;
            changed
        };
        if changed {
            self.signals.last_input_changed.fire(&class);
        }
    }

    // -- vibration --------------------------------------------------------

    pub fn set_motor_supported(&self, slot: GamepadSlot, motor: Motor, supported: bool) {
        let mut state = self.state.lock();
        if supported {
            state.unsupported_motors.remove(&(slot, motor));
        } else {
            state.unsupported_motors.insert((slot, motor));
        }
    }

    pub fn set_vibration_supported(&self, slot: GamepadSlot, supported: bool) {
        let mut state = self.state.lock();
        if supported {
            state.no_vibration.remove(&slot);
        } else {
            state.no_vibration.insert(slot);
        }
    }

    /// Every command received so far, oldest first
    pub fn motor_log(&self) -> Vec<MotorCommand> {
        self.state.lock().motor_log.clone()
    }

    pub fn motor_intensity(&self, slot: GamepadSlot, motor: Motor) -> f32 {
        self.state
            .lock()
            .intensities
            .get(&(slot, motor))
            .copied()
            .unwrap_or(0.0)
    }
}

impl Default for ScriptedDevices {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceEventSource for ScriptedDevices {
    fn signals(&self) -> &SourceSignals {
        &self.signals
    }

    fn connected_gamepads(&self) -> Vec<GamepadSlot> {
        self.state.lock().pads.keys().copied().collect()
    }

    fn navigation_gamepads(&self) -> Vec<GamepadSlot> {
        self.state.lock().navigation.iter().copied().collect()
    }

    fn is_gamepad_connected(&self, slot: GamepadSlot) -> bool {
        self.state.lock().pads.contains_key(&slot)
    }

    fn is_button_down(&self, slot: GamepadSlot, button: GamepadButton) -> bool {
        self.state
            .lock()
            .pads
            .get(&slot)
            .is_some_and(|pad| pad.buttons.contains(&button))
    }

    fn axis_samples(&self, slot: GamepadSlot) -> Vec<(AxisElement, Vec3)> {
        self.state
            .lock()
            .pads
            .get(&slot)
            .map(|pad| pad.axes.iter().map(|(axis, sample)| (*axis, *sample)).collect())
            .unwrap_or_default()
    }

    fn last_input_class(&self) -> DeviceClass {
        self.state.lock().last_input
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.state.lock().capabilities
    }
}

impl VibrationActuator for ScriptedDevices {
    fn is_vibration_supported(&self, slot: GamepadSlot) -> bool {
        let state = self.state.lock();
        state.pads.contains_key(&slot) && !state.no_vibration.contains(&slot)
    }

    fn is_motor_supported(&self, slot: GamepadSlot, motor: Motor) -> bool {
        let state = self.state.lock();
        state.pads.contains_key(&slot)
            && !state.no_vibration.contains(&slot)
            && !state.unsupported_motors.contains(&(slot, motor))
    }

    fn set_motor(&self, slot: GamepadSlot, motor: Motor, intensity: f32) {
        let mut state = self.state.lock();
        state.motor_log.push(MotorCommand {
            slot,
            motor,
            intensity,
        });
        state.intensities.insert((slot, motor), intensity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn slot(number: u8) -> GamepadSlot {
        GamepadSlot::from_number(number).unwrap()
    }

    #[test]
    fn state_is_visible_from_inside_handlers() {
        let devices = Arc::new(ScriptedDevices::new());
        devices.connect_gamepad(slot(1));

        let observed = Arc::new(AtomicUsize::new(0));
        let _connection = {
            let probe = Arc::clone(&devices);
            let observed = Arc::clone(&observed);
            devices.signals().input_began.connect(move |_| {
                if probe.is_button_down(slot(1), GamepadButton::South) {
                    observed.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        devices.press_button(slot(1), GamepadButton::South, false);
        assert_eq!(observed.load(Ordering::SeqCst), 1);
        assert_eq!(devices.last_input_class(), DeviceClass::Gamepad(slot(1)));
    }

    #[test]
    fn last_input_fires_only_on_change() {
        let devices = ScriptedDevices::new();
        let changes = Arc::new(AtomicUsize::new(0));
        let _connection = {
            let changes = Arc::clone(&changes);
            devices.signals().last_input_changed.connect(move |_| {
                changes.fetch_add(1, Ordering::SeqCst);
            })
        };

        devices.key_down(KeyCode(4), false);
        devices.key_up(KeyCode(4), false);
        devices.touch_begin(1, Vec2::new(10.0, 10.0), false);

        assert_eq!(changes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn disconnected_pad_reports_nothing() {
        let devices = ScriptedDevices::new();
        devices.connect_gamepad(slot(2));
        devices.move_axis(slot(2), AxisElement::LeftStick, Vec3::new(0.5, 0.0, 0.0));
        devices.disconnect_gamepad(slot(2));

        assert!(devices.axis_samples(slot(2)).is_empty());
        assert!(!devices.is_motor_supported(slot(2), Motor::Large));
        assert!(!devices.capabilities().gamepad_enabled);
    }
}
