use std::collections::HashMap;

use crate::device::Motor;

/// Epoch of one motor command
///
/// Epochs only grow; a command is current while no newer command for the same
/// motor has been issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommandId(u64);

impl CommandId {
    pub fn epoch(self) -> u64 {
        self.0
    }
}

/// Per-motor epochs and last commanded intensities
#[derive(Debug, Default)]
pub struct MotorBank {
    epochs: HashMap<Motor, u64>,
    intensities: HashMap<Motor, f32>,
}

impl MotorBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumps the epoch and records `intensity` as the live value
    pub fn issue(&mut self, motor: Motor, intensity: f32) -> CommandId {
        self.intensities.insert(motor, intensity);
        self.bump(motor)
    }

    /// Bumps the epoch without a physical command; the motor is idle
    pub fn invalidate(&mut self, motor: Motor) -> CommandId {
        self.intensities.insert(motor, 0.0);
        self.bump(motor)
    }

    pub fn is_current(&self, motor: Motor, id: CommandId) -> bool {
        self.epochs.get(&motor).copied().unwrap_or(0) == id.0
    }

    pub fn intensity(&self, motor: Motor) -> f32 {
        self.intensities.get(&motor).copied().unwrap_or(0.0)
    }

    /// Motors last commanded to a non-zero intensity
    pub fn running(&self) -> Vec<Motor> {
        Motor::ALL
            .into_iter()
            .filter(|m| self.intensity(*m) > 0.0)
            .collect()
    }

    fn bump(&mut self, motor: Motor) -> CommandId {
        let epoch = self.epochs.entry(motor).or_insert(0);
        *epoch += 1;
        CommandId(*epoch)
    }
}

/// Clamps a requested intensity into `[0, 1]`; NaN counts as off
pub fn clamp_intensity(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_command_supersedes() {
        let mut bank = MotorBank::new();
        let pulse = bank.issue(Motor::Large, 1.0);
        assert!(bank.is_current(Motor::Large, pulse));

        let newer = bank.issue(Motor::Large, 0.5);
        assert!(!bank.is_current(Motor::Large, pulse));
        assert!(bank.is_current(Motor::Large, newer));
        assert!(newer > pulse);
    }

    #[test]
    fn epochs_are_per_motor() {
        let mut bank = MotorBank::new();
        let large = bank.issue(Motor::Large, 1.0);
        bank.issue(Motor::Small, 1.0);
        assert!(bank.is_current(Motor::Large, large));
        assert_eq!(bank.running(), vec![Motor::Large, Motor::Small]);

        bank.invalidate(Motor::Small);
        assert_eq!(bank.running(), vec![Motor::Large]);
    }

    #[test]
    fn clamps_intensity() {
        assert_eq!(clamp_intensity(1.5), 1.0);
        assert_eq!(clamp_intensity(-0.2), 0.0);
        assert_eq!(clamp_intensity(f32::NAN), 0.0);
        assert_eq!(clamp_intensity(0.25), 0.25);
    }
}
