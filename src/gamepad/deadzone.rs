use glam::{Vec2, Vec3};

use crate::device::AxisElement;

/// Deadzone-remapped reading of one analog element
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisValue {
    Stick(Vec2),
    Trigger(f32),
}

impl AxisValue {
    pub fn zero(element: AxisElement) -> Self {
        if element.is_stick() {
            AxisValue::Stick(Vec2::ZERO)
        } else {
            AxisValue::Trigger(0.0)
        }
    }

    /// Remaps a raw sample; sticks read x/y, triggers read z
    pub fn from_sample(element: AxisElement, sample: Vec3, threshold: f32) -> Self {
        if element.is_stick() {
            AxisValue::Stick(apply_stick_deadzone(sample.truncate(), threshold))
        } else {
            AxisValue::Trigger(apply_deadzone(sample.z, threshold))
        }
    }

    pub fn as_vec2(self) -> Vec2 {
        match self {
            AxisValue::Stick(v) => v,
            AxisValue::Trigger(t) => Vec2::new(t, 0.0),
        }
    }

    pub fn as_scalar(self) -> f32 {
        match self {
            AxisValue::Stick(v) => v.length().min(1.0),
            AxisValue::Trigger(t) => t,
        }
    }
}

// Helper function to apply deadzone to analog values
pub fn apply_deadzone(value: f32, threshold: f32) -> f32 {
    // also rejects NaN thresholds
    if !(threshold < 1.0) {
        return 0.0;
    }
    let threshold = threshold.max(0.0);
    let value = value.clamp(-1.0, 1.0);
    if value.abs() < threshold {
        0.0
    } else {
        // Rescale the value to the range outside the deadzone
        let sign = if value < 0.0 { -1.0 } else { 1.0 };
        sign * (value.abs() - threshold) / (1.0 - threshold)
    }
}

/// Per-component deadzone for a 2D stick
pub fn apply_stick_deadzone(value: Vec2, threshold: f32) -> Vec2 {
    Vec2::new(
        apply_deadzone(value.x, threshold),
        apply_deadzone(value.y, threshold),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn suppresses_inside_threshold() {
        assert_eq!(apply_deadzone(0.1, 0.2), 0.0);
        assert_eq!(apply_deadzone(-0.19, 0.2), 0.0);
    }

    #[test]
    fn rescales_outside_threshold() {
        assert!((apply_deadzone(0.6, 0.2) - 0.5).abs() < 1e-6);
        assert!((apply_deadzone(-0.6, 0.2) + 0.5).abs() < 1e-6);
        assert_eq!(apply_deadzone(1.0, 0.2), 1.0);
        assert_eq!(apply_deadzone(-1.0, 0.2), -1.0);
    }

    #[test]
    fn degenerate_thresholds() {
        assert_eq!(apply_deadzone(0.7, 0.0), 0.7);
        assert_eq!(apply_deadzone(0.7, -0.5), 0.7);
        assert_eq!(apply_deadzone(1.0, 1.0), 0.0);
        assert_eq!(apply_deadzone(0.5, f32::NAN), 0.0);
    }

    #[test]
    fn stick_components_are_independent() {
        let out = apply_stick_deadzone(Vec2::new(0.1, -1.0), 0.2);
        assert_eq!(out, Vec2::new(0.0, -1.0));
    }

    #[test]
    fn trigger_reads_z() {
        let value =
            AxisValue::from_sample(AxisElement::RightTrigger, Vec3::new(0.9, 0.9, 1.0), 0.1);
        assert_eq!(value, AxisValue::Trigger(1.0));
        assert_eq!(AxisValue::zero(AxisElement::LeftStick), AxisValue::Stick(Vec2::ZERO));
    }

    proptest! {
        #[test]
        fn zero_below_threshold(t in 0.0f32..0.99, frac in 0.0f32..1.0, negative: bool) {
            let v = t * frac * if negative { -1.0 } else { 1.0 };
            prop_assume!(v.abs() < t);
            prop_assert_eq!(apply_deadzone(v, t), 0.0);
        }

        #[test]
        fn monotone_above_threshold(t in 0.0f32..0.99, a in 0.0f32..=1.0, b in 0.0f32..=1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assume!(lo >= t);
            prop_assert!(apply_deadzone(lo, t).abs() <= apply_deadzone(hi, t).abs());
            prop_assert!(apply_deadzone(-lo, t).abs() <= apply_deadzone(-hi, t).abs());
        }

        #[test]
        fn full_deflection_is_exact(t in 0.0f32..0.99) {
            prop_assert_eq!(apply_deadzone(1.0, t), 1.0);
            prop_assert_eq!(apply_deadzone(-1.0, t), -1.0);
        }
    }
}
