use crate::device::{DeviceEventSource, GamepadSlot};

/// How a binding picks its gamepad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingMode {
    /// Only ever consider this slot
    Pinned(GamepadSlot),
    /// Follow whichever gamepad is primary
    Dynamic,
}

impl BindingMode {
    pub fn from_pinned(pinned: Option<GamepadSlot>) -> Self {
        pinned.map_or(BindingMode::Dynamic, BindingMode::Pinned)
    }

    /// Slot this mode selects given the host's current state
    pub fn resolve(self, source: &dyn DeviceEventSource) -> Option<GamepadSlot> {
        match self {
            BindingMode::Pinned(slot) => source.is_gamepad_connected(slot).then_some(slot),
            BindingMode::Dynamic => select_primary(
                &source.connected_gamepads(),
                &source.navigation_gamepads(),
            ),
        }
    }
}

/// Primary gamepad: the lowest navigation-capable slot, or the lowest
/// connected slot when none is navigation-capable. A pick that is not
/// connected yields no gamepad.
pub fn select_primary(
    connected: &[GamepadSlot],
    navigation: &[GamepadSlot],
) -> Option<GamepadSlot> {
    let candidate = navigation
        .iter()
        .min()
        .or_else(|| connected.iter().min())
        .copied()?;
    connected.contains(&candidate).then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(numbers: &[u8]) -> Vec<GamepadSlot> {
        numbers
            .iter()
            .map(|n| GamepadSlot::from_number(*n).unwrap())
            .collect()
    }

    #[test]
    fn nothing_connected() {
        assert_eq!(select_primary(&[], &[]), None);
    }

    #[test]
    fn lowest_connected_without_navigation() {
        assert_eq!(select_primary(&slots(&[3, 2, 5]), &[]), slots(&[2]).pop());
    }

    #[test]
    fn navigation_beats_lower_slot() {
        assert_eq!(select_primary(&slots(&[1, 2]), &slots(&[2])), slots(&[2]).pop());
        assert_eq!(
            select_primary(&slots(&[1, 2]), &slots(&[2, 1])),
            slots(&[1]).pop()
        );
    }

    #[test]
    fn disconnected_navigation_pick_is_unset() {
        assert_eq!(select_primary(&slots(&[2]), &slots(&[1])), None);
    }
}
