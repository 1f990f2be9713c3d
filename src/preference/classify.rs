use crate::device::{DeviceCapabilities, DeviceClass};

use super::InputModality;

/// Modality implied by a device class, if any
pub fn classify(class: DeviceClass) -> Option<InputModality> {
    match class {
        DeviceClass::Touch => Some(InputModality::Touch),
        DeviceClass::Keyboard | DeviceClass::Mouse(_) => Some(InputModality::MouseKeyboard),
        DeviceClass::Gamepad(_) => Some(InputModality::Gamepad),
        DeviceClass::TextInput
        | DeviceClass::Focus
        | DeviceClass::Accelerometer
        | DeviceClass::Gyro
        | DeviceClass::None => None,
    }
}

/// Best guess from what the platform offers, used before any input
/// has told us anything
pub fn infer_from_capabilities(capabilities: &DeviceCapabilities) -> InputModality {
    if capabilities.ten_foot_interface {
        InputModality::Gamepad
    } else if capabilities.keyboard_enabled && capabilities.mouse_enabled {
        InputModality::MouseKeyboard
    } else if capabilities.touch_enabled {
        InputModality::Touch
    } else if capabilities.gamepad_enabled {
        InputModality::Gamepad
    } else {
        InputModality::MouseKeyboard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{GamepadSlot, MouseInput};

    #[test]
    fn classes_map_to_modalities() {
        assert_eq!(classify(DeviceClass::Touch), Some(InputModality::Touch));
        assert_eq!(classify(DeviceClass::Keyboard), Some(InputModality::MouseKeyboard));
        assert_eq!(
            classify(DeviceClass::Mouse(MouseInput::Wheel)),
            Some(InputModality::MouseKeyboard)
        );
        assert_eq!(
            classify(DeviceClass::Gamepad(GamepadSlot::new(7).unwrap())),
            Some(InputModality::Gamepad)
        );
        assert_eq!(classify(DeviceClass::Gyro), None);
        assert_eq!(classify(DeviceClass::None), None);
    }

    #[test]
    fn heuristic_priority() {
        let console = DeviceCapabilities {
            ten_foot_interface: true,
            keyboard_enabled: true,
            mouse_enabled: true,
            ..Default::default()
        };
        assert_eq!(infer_from_capabilities(&console), InputModality::Gamepad);

        let desktop = DeviceCapabilities {
            keyboard_enabled: true,
            mouse_enabled: true,
            touch_enabled: true,
            ..Default::default()
        };
        assert_eq!(infer_from_capabilities(&desktop), InputModality::MouseKeyboard);

        let tablet = DeviceCapabilities {
            keyboard_enabled: true,
            touch_enabled: true,
            gamepad_enabled: true,
            ..Default::default()
        };
        assert_eq!(infer_from_capabilities(&tablet), InputModality::Touch);

        let pad_only = DeviceCapabilities {
            gamepad_enabled: true,
            ..Default::default()
        };
        assert_eq!(infer_from_capabilities(&pad_only), InputModality::Gamepad);

        assert_eq!(
            infer_from_capabilities(&DeviceCapabilities::default()),
            InputModality::MouseKeyboard
        );
    }
}
