use glam::Vec2;
use inputbridge::device::{
    DeviceCapabilities, DeviceClass, GamepadButton, GamepadSlot, KeyCode, MouseInput,
    ScriptedDevices,
};
use inputbridge::{Connection, InputModality, PreferenceError, PreferenceTracker};
use parking_lot::Mutex;
use std::sync::Arc;

fn pad() -> GamepadSlot {
    GamepadSlot::from_number(1).unwrap()
}

fn recorder(tracker: &PreferenceTracker) -> (Arc<Mutex<Vec<InputModality>>>, Connection) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let connection = {
        let calls = Arc::clone(&calls);
        tracker.observe(move |modality| calls.lock().push(modality))
    };
    (calls, connection)
}

#[test]
fn startup_guess_follows_capabilities() {
    let desktop = Arc::new(ScriptedDevices::new());
    assert_eq!(
        PreferenceTracker::new(desktop).preferred(),
        Ok(InputModality::MouseKeyboard)
    );

    let console = Arc::new(ScriptedDevices::with_capabilities(DeviceCapabilities {
        ten_foot_interface: true,
        keyboard_enabled: true,
        mouse_enabled: true,
        ..Default::default()
    }));
    assert_eq!(
        PreferenceTracker::new(console).preferred(),
        Ok(InputModality::Gamepad)
    );

    let phone = Arc::new(ScriptedDevices::with_capabilities(DeviceCapabilities {
        touch_enabled: true,
        ..Default::default()
    }));
    assert_eq!(
        PreferenceTracker::new(phone).preferred(),
        Ok(InputModality::Touch)
    );
}

#[test]
fn last_input_at_startup_beats_heuristic() {
    let devices = Arc::new(ScriptedDevices::new());
    devices.connect_gamepad(pad());
    devices.press_button(pad(), GamepadButton::South, false);

    let tracker = PreferenceTracker::new(devices);
    assert_eq!(tracker.preferred(), Ok(InputModality::Gamepad));
}

#[test]
fn observe_after_touch_calls_exactly_once() {
    let devices = Arc::new(ScriptedDevices::new());
    let tracker = PreferenceTracker::new(devices.clone());
    devices.touch_begin(7, Vec2::new(3.0, 4.0), false);

    let (calls, _connection) = recorder(&tracker);
    assert_eq!(*calls.lock(), vec![InputModality::Touch]);

    devices.touch_move(7, Vec2::new(5.0, 4.0), Vec2::new(2.0, 0.0), false);
    devices.touch_end(7, Vec2::new(5.0, 4.0), false);
    assert_eq!(*calls.lock(), vec![InputModality::Touch]);

    devices.key_down(KeyCode(13), false);
    assert_eq!(
        *calls.lock(),
        vec![InputModality::Touch, InputModality::MouseKeyboard]
    );
}

#[test]
fn keyboard_and_mouse_are_one_modality() {
    let devices = Arc::new(ScriptedDevices::new());
    let tracker = PreferenceTracker::new(devices.clone());
    let (calls, _connection) = recorder(&tracker);

    devices.key_down(KeyCode(1), false);
    devices.mouse_move(Vec2::new(1.0, 1.0), Vec2::new(1.0, 1.0));
    devices.mouse_button_down(MouseInput::Button1, Vec2::new(1.0, 1.0), false);
    assert_eq!(*calls.lock(), vec![InputModality::MouseKeyboard]);
}

#[test]
fn unclassified_input_keeps_preference() {
    let devices = Arc::new(ScriptedDevices::new());
    let tracker = PreferenceTracker::new(devices.clone());
    devices.touch_begin(1, Vec2::ZERO, false);
    let (calls, _connection) = recorder(&tracker);

    devices.set_last_input(DeviceClass::Gyro);
    devices.set_last_input(DeviceClass::TextInput);
    devices.set_last_input(DeviceClass::None);

    assert_eq!(tracker.preferred(), Ok(InputModality::Touch));
    assert_eq!(*calls.lock(), vec![InputModality::Touch]);
}

#[test]
fn observer_can_unsubscribe_during_fan_out() {
    let devices = Arc::new(ScriptedDevices::new());
    let tracker = PreferenceTracker::new(devices.clone());

    let (first, _first) = recorder(&tracker);

    let middle = Arc::new(Mutex::new(Vec::new()));
    let holder: Arc<Mutex<Option<Connection>>> = Arc::new(Mutex::new(None));
    let connection = {
        let middle = Arc::clone(&middle);
        let holder = Arc::clone(&holder);
        tracker.observe(move |modality| {
            middle.lock().push(modality);
            if modality == InputModality::Touch {
                let own = holder.lock().take();
                if let Some(own) = own {
                    own.disconnect();
                }
            }
        })
    };
    *holder.lock() = Some(connection);

    let (last, _last) = recorder(&tracker);

    devices.touch_begin(1, Vec2::ZERO, false);
    devices.press_button(pad(), GamepadButton::East, false);

    assert_eq!(
        *first.lock(),
        vec![
            InputModality::MouseKeyboard,
            InputModality::Touch,
            InputModality::Gamepad
        ]
    );
    assert_eq!(
        *middle.lock(),
        vec![InputModality::MouseKeyboard, InputModality::Touch]
    );
    assert_eq!(
        *last.lock(),
        vec![
            InputModality::MouseKeyboard,
            InputModality::Touch,
            InputModality::Gamepad
        ]
    );
}

#[test]
fn panicking_observer_does_not_starve_others() {
    let devices = Arc::new(ScriptedDevices::new());
    let tracker = PreferenceTracker::new(devices.clone());

    let _bad = tracker.observe(|_| panic!("observer failure"));
    let (calls, _good) = recorder(&tracker);

    devices.touch_begin(2, Vec2::ZERO, false);
    assert_eq!(
        *calls.lock(),
        vec![InputModality::MouseKeyboard, InputModality::Touch]
    );
    assert_eq!(tracker.preferred(), Ok(InputModality::Touch));
}

#[test]
fn dropped_connection_stops_delivery() {
    let devices = Arc::new(ScriptedDevices::new());
    let tracker = PreferenceTracker::new(devices.clone());
    let (calls, connection) = recorder(&tracker);
    drop(connection);

    devices.touch_begin(1, Vec2::ZERO, false);
    assert_eq!(*calls.lock(), vec![InputModality::MouseKeyboard]);
}

#[test]
fn trackers_are_independent() {
    let devices = Arc::new(ScriptedDevices::new());
    let first = PreferenceTracker::new(devices.clone());
    let second = PreferenceTracker::new(devices.clone());

    first.destroy();
    first.destroy();
    devices.touch_begin(1, Vec2::ZERO, false);

    assert_eq!(first.preferred(), Ok(InputModality::MouseKeyboard));
    assert_eq!(second.preferred(), Ok(InputModality::Touch));
}

#[tokio::test]
async fn wait_and_watch_follow_preference() {
    let devices = Arc::new(ScriptedDevices::new());
    let tracker = PreferenceTracker::new(devices.clone());
    assert_eq!(
        tracker.wait_preferred().await,
        Ok(InputModality::MouseKeyboard)
    );

    let mut watch = tracker.watch();
    devices.connect_gamepad(pad());
    devices.press_button(pad(), GamepadButton::South, false);

    watch.changed().await.unwrap();
    assert_eq!(*watch.borrow_and_update(), Some(InputModality::Gamepad));
}

#[tokio::test]
async fn wait_after_destroy_reports_destroyed() {
    let devices = Arc::new(ScriptedDevices::new());
    for _ in 0..50 {
        let tracker = PreferenceTracker::new(devices.clone());
        tracker.destroy();
        assert_eq!(
            tracker.wait_preferred().await,
            Err(PreferenceError::Destroyed)
        );
    }
}

#[test]
fn observer_destroying_tracker_stops_later_changes() {
    let devices = Arc::new(ScriptedDevices::new());
    let tracker = Arc::new(PreferenceTracker::new(devices.clone()));
    let (calls, _connection) = recorder(&tracker);

    let _destroyer = {
        let weak = Arc::downgrade(&tracker);
        tracker.observe(move |modality| {
            if modality == InputModality::Touch {
                if let Some(tracker) = weak.upgrade() {
                    tracker.destroy();
                }
            }
        })
    };

    devices.touch_begin(1, Vec2::ZERO, false);
    devices.connect_gamepad(pad());
    devices.press_button(pad(), GamepadButton::South, false);

    assert_eq!(
        *calls.lock(),
        vec![InputModality::MouseKeyboard, InputModality::Touch]
    );
    assert_eq!(tracker.preferred(), Ok(InputModality::Touch));
}
