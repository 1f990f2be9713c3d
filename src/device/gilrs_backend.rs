//! gilrs host - real gamepads
//!
//! A typestate pump owns the `gilrs` context and runs on a blocking task:
//!
//! ```text
//! DevicePump<Initializing> ──initialize()──► DevicePump<Pumping> ──run_loop()
//!        (enumerate pads)                      (poll events, apply rumble)
//! ```
//!
//! Gamepads are given the lowest free slot when they connect. The pump keeps a
//! snapshot in [`GilrsDevices`] that queries read from, and fires the source
//! signals after each snapshot update. Motor commands travel back to the pump
//! over an unbounded channel and become gilrs force-feedback effects.

use gilrs::ff::{BaseEffect, BaseEffectType, Effect, EffectBuilder, Repeat, Replay, Ticks};
use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs, MappingSource};
use glam::Vec3;
use parking_lot::Mutex;
use statum::{machine, state};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    AxisElement, DeviceCapabilities, DeviceClass, DeviceError, DeviceEventSource, GamepadButton,
    GamepadSlot, InputElement, InputEvent, InputPhase, Motor, SourceSignals, VibrationActuator,
};

// Length of one rumble chunk; effects repeat until replaced or stopped
const RUMBLE_CHUNK_MS: u32 = 100;

// Pump settings
#[derive(Clone, Debug)]
pub struct PumpSettings {
    pub poll_interval_ms: u64,

    /// What the host offers besides gamepads; `gamepad_enabled` is derived
    /// from the connected pads
    pub capabilities: DeviceCapabilities,
}

impl Default for PumpSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2,
            capabilities: DeviceCapabilities {
                keyboard_enabled: true,
                mouse_enabled: true,
                ..Default::default()
            },
        }
    }
}

/// Motor command on its way to the pump
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RumbleCommand {
    pub slot: GamepadSlot,
    pub motor: Motor,
    pub intensity: f32,
}

#[derive(Debug, Default)]
struct PadSnapshot {
    navigation: bool,
    force_feedback: bool,
    buttons: HashSet<GamepadButton>,
    axes: HashMap<AxisElement, Vec3>,
}

#[derive(Debug)]
struct Snapshot {
    pads: BTreeMap<GamepadSlot, PadSnapshot>,
    last_input: DeviceClass,
}

/// [`DeviceEventSource`] and [`VibrationActuator`] backed by gilrs
#[derive(Debug)]
pub struct GilrsDevices {
    signals: SourceSignals,
    snapshot: Mutex<Snapshot>,
    capabilities: DeviceCapabilities,
    commands: mpsc::UnboundedSender<RumbleCommand>,
}

impl GilrsDevices {
    fn new(
        capabilities: DeviceCapabilities,
        commands: mpsc::UnboundedSender<RumbleCommand>,
    ) -> Self {
        Self {
            signals: SourceSignals::new(),
            snapshot: Mutex::new(Snapshot {
                pads: BTreeMap::new(),
                last_input: DeviceClass::None,
            }),
            capabilities,
            commands,
        }
    }

    /// Starts the pump on a blocking tokio task
    ///
    /// Gamepads already plugged in are in the snapshot when this returns.
    pub fn spawn(settings: Option<PumpSettings>) -> Result<(Arc<Self>, PumpHandle), DeviceError> {
        let runtime = Handle::try_current()
            .map_err(|e| DeviceError::InitializationError(format!("No tokio runtime: {}", e)))?;
        let settings = settings.unwrap_or_default();
        info!("Spawning gilrs device pump with settings: {:?}", settings);

        let (pump, devices) = DevicePump::<Initializing>::create(settings)?;
        let pump = pump.initialize();

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let task = runtime.spawn_blocking(move || pump.run_loop(token));
        debug!("Device pump task spawned");

        Ok((devices, PumpHandle { shutdown, task }))
    }

    fn pad_connected(&self, slot: GamepadSlot, navigation: bool, force_feedback: bool) {
        self.snapshot.lock().pads.insert(
            slot,
            PadSnapshot {
                navigation,
                force_feedback,
                ..Default::default()
            },
        );
        self.signals.gamepad_connected.fire(&slot);
        if navigation {
            self.signals.navigation_changed.fire(&());
        }
    }

    fn pad_disconnected(&self, slot: GamepadSlot) {
        let removed = self.snapshot.lock().pads.remove(&slot);
        let Some(pad) = removed else {
            return;
        };
        self.signals.gamepad_disconnected.fire(&slot);
        if pad.navigation {
            self.signals.navigation_changed.fire(&());
        }
    }

    fn button(&self, slot: GamepadSlot, button: GamepadButton, phase: InputPhase) {
        {
            let mut snapshot = self.snapshot.lock();
            if let Some(pad) = snapshot.pads.get_mut(&slot) {
                if phase == InputPhase::Began {
                    pad.buttons.insert(button);
                } else {
                    pad.buttons.remove(&button);
                }
            }
        }

        let class = DeviceClass::Gamepad(slot);
        self.note_last_input(class);
        let pressed = if phase == InputPhase::Began { 1.0 } else { 0.0 };
        let event = InputEvent::new(class, InputElement::Button(button))
            .with_position(Vec3::new(0.0, 0.0, pressed));
        self.signals.for_phase(phase).fire(&event);
    }

    fn axis(&self, slot: GamepadSlot, element: AxisElement, update: impl FnOnce(&mut Vec3)) {
        let (sample, delta) = {
            let mut snapshot = self.snapshot.lock();
            let Some(pad) = snapshot.pads.get_mut(&slot) else {
                return;
            };
            let entry = pad.axes.entry(element).or_insert(Vec3::ZERO);
            let before = *entry;
            update(entry);
            (*entry, *entry - before)
        };

        let class = DeviceClass::Gamepad(slot);
        self.note_last_input(class);
        let event = InputEvent::new(class, InputElement::Axis(element))
            .with_position(sample)
            .with_delta(delta);
        self.signals.input_changed.fire(&event);
    }

    fn note_last_input(&self, class: DeviceClass) {
        let changed = {
            let mut snapshot = self.snapshot.lock();
            let changed = snapshot.last_input != class;
            snapshot.last_input = class;
            changed
        };
        if changed {
            self.signals.last_input_changed.fire(&class);
        }
    }
}

impl DeviceEventSource for GilrsDevices {
    fn signals(&self) -> &SourceSignals {
        &self.signals
    }

    fn connected_gamepads(&self) -> Vec<GamepadSlot> {
        self.snapshot.lock().pads.keys().copied().collect()
    }

    fn navigation_gamepads(&self) -> Vec<GamepadSlot> {
        self.snapshot
            .lock()
            .pads
            .iter()
            .filter(|(_, pad)| pad.navigation)
            .map(|(slot, _)| *slot)
            .collect()
    }

    fn is_gamepad_connected(&self, slot: GamepadSlot) -> bool {
        self.snapshot.lock().pads.contains_key(&slot)
    }

    fn is_button_down(&self, slot: GamepadSlot, button: GamepadButton) -> bool {
        self.snapshot
            .lock()
            .pads
            .get(&slot)
            .is_some_and(|pad| pad.buttons.contains(&button))
    }

    fn axis_samples(&self, slot: GamepadSlot) -> Vec<(AxisElement, Vec3)> {
        self.snapshot
            .lock()
            .pads
            .get(&slot)
            .map(|pad| pad.axes.iter().map(|(axis, sample)| (*axis, *sample)).collect())
            .unwrap_or_default()
    }

    fn last_input_class(&self) -> DeviceClass {
        self.snapshot.lock().last_input
    }

    fn capabilities(&self) -> DeviceCapabilities {
        DeviceCapabilities {
            gamepad_enabled: !self.snapshot.lock().pads.is_empty(),
            ..self.capabilities
        }
    }
}

impl VibrationActuator for GilrsDevices {
    fn is_vibration_supported(&self, slot: GamepadSlot) -> bool {
        self.snapshot
            .lock()
            .pads
            .get(&slot)
            .is_some_and(|pad| pad.force_feedback)
    }

    fn is_motor_supported(&self, slot: GamepadSlot, motor: Motor) -> bool {
        matches!(motor, Motor::Large | Motor::Small) && self.is_vibration_supported(slot)
    }

    fn set_motor(&self, slot: GamepadSlot, motor: Motor, intensity: f32) {
        let command = RumbleCommand {
            slot,
            motor,
            intensity,
        };
        if self.commands.send(command).is_err() {
            warn!("Device pump is gone, dropping {:?}", command);
        }
    }
}

/// Handle to the running pump
#[derive(Debug)]
pub struct PumpHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl PumpHandle {
    /// Stops the pump and waits for it to silence all rumble effects
    pub async fn shutdown(self) -> Result<(), DeviceError> {
        info!("Stopping device pump");
        self.shutdown.cancel();
        self.task
            .await
            .map_err(|e| DeviceError::TaskError(e.to_string()))
    }
}

/// Slot assignment of gilrs gamepad ids
#[derive(Debug, Default)]
pub struct SlotTable {
    by_id: HashMap<GamepadId, GamepadSlot>,
}

impl SlotTable {
    /// Lowest free slot for `id`, or the slot it already holds
    fn assign(&mut self, id: GamepadId) -> Option<GamepadSlot> {
        if let Some(slot) = self.by_id.get(&id) {
            return Some(*slot);
        }
        let slot = GamepadSlot::all().find(|slot| !self.by_id.values().any(|s| s == slot))?;
        self.by_id.insert(id, slot);
        Some(slot)
    }

    fn release(&mut self, id: GamepadId) -> Option<GamepadSlot> {
        self.by_id.remove(&id)
    }

    fn slot_of(&self, id: GamepadId) -> Option<GamepadSlot> {
        self.by_id.get(&id).copied()
    }

    fn id_of(&self, slot: GamepadSlot) -> Option<GamepadId> {
        self.by_id
            .iter()
            .find(|(_, s)| **s == slot)
            .map(|(id, _)| *id)
    }
}

/// Force-feedback effects currently playing, one per (slot, motor)
#[derive(Default)]
pub struct RumbleBank {
    effects: HashMap<(GamepadSlot, Motor), Effect>,
}

impl fmt::Debug for RumbleBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RumbleBank")
            .field("playing", &self.effects.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RumbleBank {
    fn apply(
        &mut self,
        gilrs: &mut Gilrs,
        id: GamepadId,
        command: RumbleCommand,
    ) -> Result<(), gilrs::ff::Error> {
        let key = (command.slot, command.motor);
        if let Some(effect) = self.effects.remove(&key) {
            effect.stop()?;
        }
        if command.intensity <= 0.0 {
            return Ok(());
        }

        let magnitude = (command.intensity * f32::from(u16::MAX)) as u16;
        let kind = match command.motor {
            Motor::Large => BaseEffectType::Strong { magnitude },
            Motor::Small => BaseEffectType::Weak { magnitude },
            Motor::LeftTrigger | Motor::RightTrigger => return Ok(()),
        };

        let effect = EffectBuilder::new()
            .add_effect(BaseEffect {
                kind,
                scheduling: Replay {
                    play_for: Ticks::from_ms(RUMBLE_CHUNK_MS),
                    ..Default::default()
                },
                ..Default::default()
            })
            .repeat(Repeat::Infinitely)
            .gamepads(&[id])
            .finish(gilrs)?;
        effect.play()?;
        self.effects.insert(key, effect);
        Ok(())
    }

    fn forget(&mut self, slot: GamepadSlot) {
        self.effects.retain(|(s, _), _| *s != slot);
    }

    fn stop_all(&mut self) {
        for ((slot, motor), effect) in self.effects.drain() {
            if let Err(e) = effect.stop() {
                warn!("Failed to stop {:?} on {}: {}", motor, slot, e);
            }
        }
    }
}

// Pump states
#[state]
#[derive(Debug, Clone)]
pub enum PumpState {
    Initializing,
    Pumping,
}

#[machine]
#[derive(Debug)]
pub struct DevicePump<S: PumpState> {
    // Gilrs context
    gilrs: Gilrs,

    // Shared snapshot and signals
    devices: Arc<GilrsDevices>,

    // Motor commands from the actuator side
    commands: mpsc::UnboundedReceiver<RumbleCommand>,

    slots: SlotTable,

    rumble: RumbleBank,

    settings: PumpSettings,
}

// Methods available in all states
impl<S: PumpState> DevicePump<S> {
    fn attach(&mut self, id: GamepadId) {
        let gamepad = self.gilrs.gamepad(id);
        if !gamepad.is_connected() {
            return;
        }
        let Some(slot) = self.slots.assign(id) else {
            warn!("Gamepad {} connected but all slots are taken", gamepad.name());
            return;
        };
        let navigation = !matches!(gamepad.mapping_source(), MappingSource::None);
        let force_feedback = gamepad.is_ff_supported();
        info!(
            "Gamepad '{}' ({}) on {} [navigation: {}, force feedback: {}]",
            gamepad.name(),
            id,
            slot,
            navigation,
            force_feedback
        );
        self.devices.pad_connected(slot, navigation, force_feedback);
    }

    fn detach(&mut self, id: GamepadId) {
        let Some(slot) = self.slots.release(id) else {
            return;
        };
        warn!("Gamepad {} left {}", id, slot);
        self.rumble.forget(slot);
        self.devices.pad_disconnected(slot);
    }
}

// Implementation for Initializing state
impl DevicePump<Initializing> {
    pub fn create(settings: PumpSettings) -> Result<(Self, Arc<GilrsDevices>), DeviceError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(DeviceError::InitializationError(e.to_string()));
            }
        };

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let devices = Arc::new(GilrsDevices::new(settings.capabilities, command_tx));

        let pump = Self::new(
            gilrs,
            Arc::clone(&devices),
            command_rx,
            SlotTable::default(),
            RumbleBank::default(),
            settings,
        );
        Ok((pump, devices))
    }

    // Pick up gamepads that were plugged in before we started
    pub fn initialize(mut self) -> DevicePump<Pumping> {
        let ids: Vec<GamepadId> = self.gilrs.gamepads().map(|(id, _)| id).collect();
        if ids.is_empty() {
            warn!("No gamepad connected, waiting for one");
        } else {
            info!("Found {} gamepads", ids.len());
        }
        for id in ids {
            self.attach(id);
        }

        info!("Device pump initialized, transitioning to Pumping state");
        self.transition()
    }
}

// Implementation for Pumping state
impl DevicePump<Pumping> {
    /// Applies queued motor commands and dispatches every pending gilrs event
    pub fn pump_once(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            let Some(id) = self.slots.id_of(command.slot) else {
                debug!("Dropping {:?}, slot is empty", command);
                continue;
            };
            if let Err(e) = self.rumble.apply(&mut self.gilrs, id, command) {
                warn!("Failed to apply {:?}: {}", command, e);
            }
        }

        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            self.dispatch(id, event);
        }
    }

    // Runs until `shutdown` is cancelled
    pub fn run_loop(mut self, shutdown: CancellationToken) {
        let interval = Duration::from_millis(self.settings.poll_interval_ms.max(1));
        info!("Starting device pump loop ({:?} interval)", interval);

        while !shutdown.is_cancelled() {
            self.pump_once();
            std::thread::sleep(interval);
        }

        self.rumble.stop_all();
        info!("Device pump loop finished");
    }

    fn dispatch(&mut self, id: GamepadId, event: EventType) {
        match event {
            EventType::Connected => self.attach(id),
            EventType::Disconnected => self.detach(id),
            _ => {
                let Some(slot) = self.slots.slot_of(id) else {
                    debug!("Event from unassigned gamepad {}: {:?}", id, event);
                    return;
                };
                self.dispatch_input(slot, event);
            }
        }
    }

    fn dispatch_input(&self, slot: GamepadSlot, event: EventType) {
        match event {
            EventType::ButtonPressed(button, _) => {
                if let Some(button) = map_button(button) {
                    self.devices.button(slot, button, InputPhase::Began);
                }
            }
            EventType::ButtonReleased(button, _) => {
                if let Some(button) = map_button(button) {
                    self.devices.button(slot, button, InputPhase::Ended);
                }
            }
            EventType::ButtonChanged(Button::LeftTrigger2, value, _) => {
                self.devices
                    .axis(slot, AxisElement::LeftTrigger, |s| s.z = value);
            }
            EventType::ButtonChanged(Button::RightTrigger2, value, _) => {
                self.devices
                    .axis(slot, AxisElement::RightTrigger, |s| s.z = value);
            }
            EventType::AxisChanged(axis, value, _) => match axis {
                Axis::LeftStickX => {
                    self.devices.axis(slot, AxisElement::LeftStick, |s| s.x = value)
                }
                Axis::LeftStickY => {
                    self.devices.axis(slot, AxisElement::LeftStick, |s| s.y = value)
                }
                Axis::RightStickX => {
                    self.devices.axis(slot, AxisElement::RightStick, |s| s.x = value)
                }
                Axis::RightStickY => {
                    self.devices.axis(slot, AxisElement::RightStick, |s| s.y = value)
                }
                Axis::LeftZ => self.devices.axis(slot, AxisElement::LeftTrigger, |s| s.z = value),
                Axis::RightZ => {
                    self.devices.axis(slot, AxisElement::RightTrigger, |s| s.z = value)
                }
                _ => debug!("Ignoring unsupported axis: {:?}", axis),
            },
            EventType::ButtonRepeated(button, _) => {
                debug!("Button repeat ignored: {:?}", button);
            }
            _ => debug!("Unhandled event type: {:?}", event),
        }
    }
}

// Helper function to map gilrs Button to our GamepadButton
fn map_button(button: Button) -> Option<GamepadButton> {
    match button {
        Button::South => Some(GamepadButton::South),
        Button::East => Some(GamepadButton::East),
        Button::West => Some(GamepadButton::West),
        Button::North => Some(GamepadButton::North),
        Button::Start => Some(GamepadButton::Start),
        Button::Select => Some(GamepadButton::Select),
        Button::LeftTrigger => Some(GamepadButton::LeftBumper),
        Button::RightTrigger => Some(GamepadButton::RightBumper),
        Button::LeftTrigger2 => Some(GamepadButton::LeftTrigger),
        Button::RightTrigger2 => Some(GamepadButton::RightTrigger),
        Button::LeftThumb => Some(GamepadButton::LeftStick),
        Button::RightThumb => Some(GamepadButton::RightStick),
        Button::DPadUp => Some(GamepadButton::DPadUp),
        Button::DPadDown => Some(GamepadButton::DPadDown),
        Button::DPadLeft => Some(GamepadButton::DPadLeft),
        Button::DPadRight => Some(GamepadButton::DPadRight),
        Button::Mode => Some(GamepadButton::Guide),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_outside_runtime_is_an_error() {
        let result = GilrsDevices::spawn(None);
        assert!(matches!(result, Err(DeviceError::InitializationError(_))));
    }

    #[test]
    fn maps_face_and_shoulder_buttons() {
        assert_eq!(map_button(Button::South), Some(GamepadButton::South));
        assert_eq!(map_button(Button::LeftTrigger), Some(GamepadButton::LeftBumper));
        assert_eq!(map_button(Button::RightTrigger2), Some(GamepadButton::RightTrigger));
        assert_eq!(map_button(Button::C), None);
    }
}
