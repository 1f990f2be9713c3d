//! Gamepad Binding - one logical gamepad on top of the host's slots
//!
//! A binding owns "the" gamepad an application talks to. In pinned mode that
//! is a fixed slot; in dynamic mode it follows the primary gamepad reported by
//! the host. Whenever the effective slot changes the binding drops every
//! slot-scoped subscription, forgets the axis samples of the old slot and
//! re-subscribes to the new one.
//!
//! # Vibration
//!
//! Every intensity command bumps a per-motor epoch. A timed pulse remembers the
//! epoch of its own command and only switches the motor off if no newer command
//! has been issued in the meantime:
//!
//! ```text
//! t=0.0  pulse(Large, 1.0, 0.2s)   epoch 1, timer armed
//! t=0.1  set(Large, 0.5)           epoch 2
//! t=0.2  timer fires               epoch 1 != 2 -> skipped, motor stays at 0.5
//! ```

use glam::Vec3;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::deadzone::AxisValue;
use super::selection::BindingMode;
use super::vibration::{clamp_intensity, CommandId, MotorBank};
use super::BindingError;
use crate::device::{
    connect_phases, AxisElement, DeviceClass, DeviceEventSource, GamepadButton, GamepadSlot,
    InputElement, InputEvent, InputPhase, Motor, VibrationActuator,
};
use crate::signal::{Connection, Signal, SubscriptionSet};

/// Configuration for a [`GamepadBinding`]
#[derive(Clone, Debug)]
pub struct BindingSettings {
    /// Pin the binding to one slot; `None` follows the primary gamepad
    pub pinned_slot: Option<GamepadSlot>,

    /// Default deadzone for thumbsticks when a query passes no threshold
    pub stick_deadzone: f32,

    /// Default deadzone for triggers when a query passes no threshold
    pub trigger_deadzone: f32,
}

impl Default for BindingSettings {
    fn default() -> Self {
        Self {
            pinned_slot: None,
            stick_deadzone: 0.2,
            trigger_deadzone: 0.05,
        }
    }
}

/// Button edge on the active gamepad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button: GamepadButton,
    /// Already handled by the UI layer
    pub consumed: bool,
}

/// Signals a binding emits
#[derive(Debug)]
pub struct BindingEvents {
    pub button_down: Signal<ButtonEvent>,
    pub button_up: Signal<ButtonEvent>,
    /// Left the unset state
    pub connected: Signal<()>,
    /// Entered the unset state
    pub disconnected: Signal<()>,
    pub active_changed: Signal<Option<GamepadSlot>>,
}

impl BindingEvents {
    fn new() -> Self {
        Self {
            button_down: Signal::new("gamepad.button_down"),
            button_up: Signal::new("gamepad.button_up"),
            connected: Signal::new("gamepad.connected"),
            disconnected: Signal::new("gamepad.disconnected"),
            active_changed: Signal::new("gamepad.active_changed"),
        }
    }
}

#[derive(Debug, Default)]
struct BindingState {
    active: Option<GamepadSlot>,

    // Raw samples of the active gamepad, rebuilt on every slot change
    axes: HashMap<AxisElement, Vec3>,

    motors: MotorBank,

    // Torn down whenever the active slot changes
    slot_subscriptions: SubscriptionSet,

    // Connect / disconnect / navigation notifications, live until destroy
    source_subscriptions: SubscriptionSet,

    destroyed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Connected,
    Disconnected,
    ActiveChanged(Option<GamepadSlot>),
}

fn transitions(previous: Option<GamepadSlot>, next: Option<GamepadSlot>) -> Vec<Transition> {
    match (previous, next) {
        (None, Some(_)) => vec![Transition::Connected, Transition::ActiveChanged(next)],
        (Some(_), None) => vec![Transition::Disconnected, Transition::ActiveChanged(None)],
        _ => vec![Transition::ActiveChanged(next)],
    }
}

struct BindingCore {
    source: Arc<dyn DeviceEventSource>,
    actuator: Arc<dyn VibrationActuator>,
    settings: BindingSettings,
    mode: BindingMode,
    events: BindingEvents,
    state: Mutex<BindingState>,
    shutdown: CancellationToken,
}

/// The application's view of one gamepad
///
/// Dropping the binding destroys it.
pub struct GamepadBinding {
    core: Arc<BindingCore>,
}

impl GamepadBinding {
    pub fn new(
        source: Arc<dyn DeviceEventSource>,
        actuator: Arc<dyn VibrationActuator>,
        settings: Option<BindingSettings>,
    ) -> Self {
        let settings = settings.unwrap_or_default();
        let mode = BindingMode::from_pinned(settings.pinned_slot);
        info!("Creating gamepad binding in {:?} mode", mode);
        debug!("Binding settings: {:?}", settings);

        let core = Arc::new(BindingCore {
            source,
            actuator,
            settings,
            mode,
            events: BindingEvents::new(),
            state: Mutex::new(BindingState::default()),
            shutdown: CancellationToken::new(),
        });
        core.attach();
        core.reevaluate();

        Self { core }
    }

    /// Binding over a host that is both event source and actuator
    pub fn for_devices<D>(devices: Arc<D>, settings: Option<BindingSettings>) -> Self
    where
        D: DeviceEventSource + VibrationActuator + 'static,
    {
        let source: Arc<dyn DeviceEventSource> = devices.clone();
        let actuator: Arc<dyn VibrationActuator> = devices;
        Self::new(source, actuator, settings)
    }

    pub fn mode(&self) -> BindingMode {
        self.core.mode
    }

    pub fn events(&self) -> &BindingEvents {
        &self.core.events
    }

    pub fn active_slot(&self) -> Option<GamepadSlot> {
        self.core.state.lock().active
    }

    pub fn is_connected(&self) -> bool {
        self.active_slot()
            .is_some_and(|slot| self.core.source.is_gamepad_connected(slot))
    }

    /// Deadzone-remapped reading of `element`
    ///
    /// `threshold` overrides the configured default. Reads zero while no
    /// gamepad is active.
    pub fn axis(&self, element: AxisElement, threshold: Option<f32>) -> AxisValue {
        let sample = {
            let state = self.core.state.lock();
            match state.active {
                Some(_) => state.axes.get(&element).copied().unwrap_or(Vec3::ZERO),
                None => return AxisValue::zero(element),
            }
        };
        let threshold = threshold.unwrap_or(if element.is_stick() {
            self.core.settings.stick_deadzone
        } else {
            self.core.settings.trigger_deadzone
        });
        AxisValue::from_sample(element, sample, threshold)
    }

    pub fn is_button_down(&self, button: GamepadButton) -> bool {
        self.active_slot()
            .is_some_and(|slot| self.core.source.is_button_down(slot, button))
    }

    pub fn is_vibration_supported(&self) -> bool {
        self.active_slot()
            .is_some_and(|slot| self.core.actuator.is_vibration_supported(slot))
    }

    pub fn is_motor_supported(&self, motor: Motor) -> bool {
        self.active_slot()
            .is_some_and(|slot| self.core.actuator.is_motor_supported(slot, motor))
    }

    /// Last intensity commanded for `motor`
    pub fn motor_intensity(&self, motor: Motor) -> f32 {
        self.core.state.lock().motors.intensity(motor)
    }

    /// Sets `motor` to `value` (clamped to `[0, 1]`)
    ///
    /// The motor's epoch advances even when nothing is issued. Returns `None`
    /// when there is no active gamepad or the binding is destroyed; check
    /// [`is_connected`](Self::is_connected) to tell the two apart from an
    /// issued command.
    pub fn set_motor_intensity(&self, motor: Motor, value: f32) -> Option<CommandId> {
        let mut state = self.core.state.lock();
        if state.destroyed {
            return None;
        }
        self.core.command_motor(&mut state, motor, value)
    }

    /// Runs `motor` at `value` for `duration`, then stops it unless a newer
    /// command for the same motor was issued meanwhile.
    ///
    /// # Errors
    ///
    /// [`BindingError::NoRuntime`] when called outside a tokio runtime; the
    /// motor is left untouched in that case.
    pub fn pulse_motor(
        &self,
        motor: Motor,
        value: f32,
        duration: Duration,
    ) -> Result<Option<CommandId>, BindingError> {
        let runtime = Handle::try_current().map_err(|_| BindingError::NoRuntime)?;

        let Some(id) = self.set_motor_intensity(motor, value) else {
            return Ok(None);
        };
        debug!(
            "Pulse {:?} at {:.2} for {:?} (epoch {})",
            motor,
            value,
            duration,
            id.epoch()
        );

        let core = Arc::downgrade(&self.core);
        let token = self.core.shutdown.clone();
        runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(duration) => {
                    if let Some(core) = core.upgrade() {
                        core.finish_pulse(motor, id);
                    }
                }
            }
        });

        Ok(Some(id))
    }

    /// Sets every supported motor to 0
    pub fn stop_all_motors(&self) {
        let mut state = self.core.state.lock();
        if state.destroyed {
            return;
        }
        self.core.stop_motors(&mut state);
    }

    /// Observe button presses on the active gamepad
    pub fn on_button_down<F>(&self, callback: F) -> Connection
    where
        F: Fn(&ButtonEvent) + Send + Sync + 'static,
    {
        self.core.events.button_down.connect(callback)
    }

    /// Observe button releases on the active gamepad
    pub fn on_button_up<F>(&self, callback: F) -> Connection
    where
        F: Fn(&ButtonEvent) + Send + Sync + 'static,
    {
        self.core.events.button_up.connect(callback)
    }

    /// Stops all motors, releases every subscription and cancels pending
    /// pulse timers. Calling it again does nothing.
    pub fn destroy(&self) {
        let mut state = self.core.state.lock();
        if state.destroyed {
            return;
        }
        self.core.stop_motors(&mut state);
        state.destroyed = true;
        state.slot_subscriptions.clear();
        state.source_subscriptions.clear();
        state.axes.clear();
        state.active = None;
        self.core.shutdown.cancel();
        info!("Gamepad binding destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.core.state.lock().destroyed
    }
}

impl Drop for GamepadBinding {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl BindingCore {
    // Subscriptions that live for the whole binding
    fn attach(self: &Arc<Self>) {
        let signals = self.source.signals();
        let mut state = self.state.lock();

        let core = Arc::downgrade(self);
        state
            .source_subscriptions
            .add(signals.gamepad_connected.connect(move |slot| {
                debug!("Host reports {} connected", slot);
                if let Some(core) = core.upgrade() {
                    core.reevaluate();
                }
            }));

        let core = Arc::downgrade(self);
        state
            .source_subscriptions
            .add(signals.gamepad_disconnected.connect(move |slot| {
                debug!("Host reports {} disconnected", slot);
                if let Some(core) = core.upgrade() {
                    core.reevaluate();
                }
            }));

        if self.mode == BindingMode::Dynamic {
            let core = Arc::downgrade(self);
            state
                .source_subscriptions
                .add(signals.navigation_changed.connect(move |_| {
                    if let Some(core) = core.upgrade() {
                        core.reevaluate();
                    }
                }));
        }
    }

    // Recompute the effective slot and rebind if it moved
    fn reevaluate(self: &Arc<Self>) {
        let (previous, next) = {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            let next = self.mode.resolve(self.source.as_ref());
            let previous = state.active;
            if next == previous {
                return;
            }
            self.rebind(&mut state, next);
            (previous, next)
        };

        match next {
            Some(slot) => info!("Active gamepad is now {} (was {:?})", slot, previous),
            None => warn!("No active gamepad (was {:?})", previous),
        }

        for transition in transitions(previous, next) {
            // An observer may have destroyed us during the previous transition
            if self.state.lock().destroyed {
                debug!("Binding destroyed mid-transition, dropping {:?}", transition);
                return;
            }
            match transition {
                Transition::Connected => {
                    self.events.connected.fire(&());
                }
                Transition::Disconnected => {
                    self.events.disconnected.fire(&());
                }
                Transition::ActiveChanged(slot) => {
                    self.events.active_changed.fire(&slot);
                }
            }
        }
    }

    fn rebind(self: &Arc<Self>, state: &mut BindingState, next: Option<GamepadSlot>) {
        state.slot_subscriptions.clear();
        if let Some(previous) = state.active {
            self.silence(state, previous);
        }
        state.axes.clear();
        state.active = next;

        let Some(slot) = next else {
            return;
        };

        state.axes.extend(self.source.axis_samples(slot));
        debug!("Snapshot of {} axes: {:?}", slot, state.axes);

        let connections = connect_phases(
            self.source.signals(),
            self,
            move |core: &BindingCore, phase, event| {
                if event.class == DeviceClass::Gamepad(slot) {
                    core.handle_input(slot, phase, event);
                }
            },
        );
        state.slot_subscriptions.extend(connections);
    }

    // Motors still running on a slot we are leaving
    fn silence(&self, state: &mut BindingState, slot: GamepadSlot) {
        for motor in state.motors.running() {
            if self.actuator.is_motor_supported(slot, motor) {
                self.actuator.set_motor(slot, motor, 0.0);
            }
            state.motors.invalidate(motor);
            debug!("Silenced {:?} on {}", motor, slot);
        }
    }

    fn handle_input(&self, slot: GamepadSlot, phase: InputPhase, event: &InputEvent) {
        let button_event = {
            let mut state = self.state.lock();
            if state.destroyed || state.active != Some(slot) {
                return;
            }
            match event.element {
                InputElement::Axis(axis) => {
                    state.axes.insert(axis, event.position);
                    None
                }
                InputElement::Button(button) => Some(ButtonEvent {
                    button,
                    consumed: event.consumed,
                }),
                _ => None,
            }
        };

        let Some(button_event) = button_event else {
            return;
        };
        match phase {
            InputPhase::Began => {
                debug!(
                    "{:?} down on {} (consumed: {})",
                    button_event.button, slot, button_event.consumed
                );
                self.events.button_down.fire(&button_event);
            }
            InputPhase::Ended => {
                debug!(
                    "{:?} up on {} (consumed: {})",
                    button_event.button, slot, button_event.consumed
                );
                self.events.button_up.fire(&button_event);
            }
            InputPhase::Changed => {}
        }
    }

    fn command_motor(
        &self,
        state: &mut BindingState,
        motor: Motor,
        value: f32,
    ) -> Option<CommandId> {
        let intensity = clamp_intensity(value);
        let Some(slot) = state.active else {
            state.motors.invalidate(motor);
            debug!("No active gamepad, ignoring {:?} -> {:.2}", motor, intensity);
            return None;
        };

        let id = state.motors.issue(motor, intensity);
        if self.actuator.is_motor_supported(slot, motor) {
            self.actuator.set_motor(slot, motor, intensity);
        } else {
            debug!("{:?} not supported on {}, command has no effect", motor, slot);
        }
        Some(id)
    }

    fn stop_motors(&self, state: &mut BindingState) {
        for motor in Motor::ALL {
            self.command_motor(state, motor, 0.0);
        }
    }

    fn finish_pulse(&self, motor: Motor, id: CommandId) {
        let mut state = self.state.lock();
        if state.destroyed {
            return;
        }
        if !state.motors.is_current(motor, id) {
            debug!(
                "Pulse stop for {:?} (epoch {}) superseded, skipping",
                motor,
                id.epoch()
            );
            return;
        }
        self.command_motor(&mut state, motor, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firing_order_per_transition() {
        let slot = GamepadSlot::new(0);
        let other = GamepadSlot::new(1);

        assert_eq!(
            transitions(None, slot),
            vec![Transition::Connected, Transition::ActiveChanged(slot)]
        );
        assert_eq!(
            transitions(slot, None),
            vec![Transition::Disconnected, Transition::ActiveChanged(None)]
        );
        assert_eq!(
            transitions(slot, other),
            vec![Transition::ActiveChanged(other)]
        );
    }

    #[test]
    fn default_settings_follow_primary() {
        let settings = BindingSettings::default();
        assert_eq!(BindingMode::from_pinned(settings.pinned_slot), BindingMode::Dynamic);
        assert!(settings.stick_deadzone > settings.trigger_deadzone);
    }
}
