//! Settings file
//!
//! `settings.toml` lives in the user config directory:
//!
//! ```text
//! [gamepad]
//! pinned_slot = 1          # optional, 1..=8
//! stick_deadzone = 0.2
//! trigger_deadzone = 0.05
//!
//! [vibration]
//! enabled = true
//! pulse_intensity = 1.0
//! pulse_ms = 150
//!
//! [host]
//! poll_interval_ms = 2
//! ten_foot_interface = false
//! keyboard_enabled = true
//! mouse_enabled = true
//! touch_enabled = false
//! ```

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::device::{DeviceCapabilities, GamepadSlot, PumpSettings, SLOT_COUNT};
use crate::gamepad::BindingSettings;

const CONFIG_DIR: &str = "inputbridge";
const SETTINGS_FILE: &str = "settings.toml";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct InputSettings {
    pub gamepad: GamepadSection,
    pub vibration: VibrationSection,
    pub host: HostSection,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GamepadSection {
    /// 1-based slot number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned_slot: Option<u8>,
    pub stick_deadzone: f32,
    pub trigger_deadzone: f32,
}

impl Default for GamepadSection {
    fn default() -> Self {
        let binding = BindingSettings::default();
        Self {
            pinned_slot: None,
            stick_deadzone: binding.stick_deadzone,
            trigger_deadzone: binding.trigger_deadzone,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct VibrationSection {
    pub enabled: bool,
    pub pulse_intensity: f32,
    pub pulse_ms: u64,
}

impl Default for VibrationSection {
    fn default() -> Self {
        Self {
            enabled: true,
            pulse_intensity: 1.0,
            pulse_ms: 150,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct HostSection {
    pub poll_interval_ms: u64,
    pub ten_foot_interface: bool,
    pub keyboard_enabled: bool,
    pub mouse_enabled: bool,
    pub touch_enabled: bool,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: PumpSettings::default().poll_interval_ms,
            ten_foot_interface: false,
            keyboard_enabled: true,
            mouse_enabled: true,
            touch_enabled: false,
        }
    }
}

impl InputSettings {
    /// `<config dir>/inputbridge/settings.toml`
    pub fn default_path() -> Result<PathBuf> {
        let mut path =
            dirs::config_dir().ok_or_else(|| eyre!("Could not determine the config directory"))?;
        path.push(CONFIG_DIR);
        path.push(SETTINGS_FILE);
        Ok(path)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Self =
            toml::from_str(content).map_err(|e| eyre!("Failed to parse settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| eyre!("Failed to serialize settings: {}", e))
    }

    /// Loads `path`, writing the defaults there first if it does not exist
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if {} exists: {}", path.display(), e))?;

        if !exists {
            warn!("No settings at {}, writing defaults", path.display());
            let settings = Self::default();
            settings.save(path).await?;
            return Ok(settings);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
        let settings = Self::from_toml_str(&content)?;
        info!("Loaded settings from {}", path.display());
        debug!("Settings: {:?}", settings);
        Ok(settings)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create settings directory: {}", e))?;
        }
        let content = self.to_toml_string()?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write settings file: {}", e))?;
        debug!("Settings written to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(slot) = self.gamepad.pinned_slot {
            if !(1..=SLOT_COUNT).contains(&slot) {
                return Err(eyre!(
                    "gamepad.pinned_slot must be between 1 and {}, got {}",
                    SLOT_COUNT,
                    slot
                ));
            }
        }
        check_deadzone("gamepad.stick_deadzone", self.gamepad.stick_deadzone)?;
        check_deadzone("gamepad.trigger_deadzone", self.gamepad.trigger_deadzone)?;

        let intensity = self.vibration.pulse_intensity;
        if !(0.0..=1.0).contains(&intensity) {
            return Err(eyre!(
                "vibration.pulse_intensity must be within [0, 1], got {}",
                intensity
            ));
        }
        if self.host.poll_interval_ms == 0 {
            return Err(eyre!("host.poll_interval_ms must be positive"));
        }
        Ok(())
    }

    pub fn binding_settings(&self) -> BindingSettings {
        BindingSettings {
            pinned_slot: self.gamepad.pinned_slot.and_then(GamepadSlot::from_number),
            stick_deadzone: self.gamepad.stick_deadzone,
            trigger_deadzone: self.gamepad.trigger_deadzone,
        }
    }

    pub fn pump_settings(&self) -> PumpSettings {
        PumpSettings {
            poll_interval_ms: self.host.poll_interval_ms,
            capabilities: DeviceCapabilities {
                ten_foot_interface: self.host.ten_foot_interface,
                keyboard_enabled: self.host.keyboard_enabled,
                mouse_enabled: self.host.mouse_enabled,
                touch_enabled: self.host.touch_enabled,
                gamepad_enabled: false,
            },
        }
    }

    pub fn pulse_duration(&self) -> Duration {
        Duration::from_millis(self.vibration.pulse_ms)
    }
}

fn check_deadzone(name: &str, value: f32) -> Result<()> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(eyre!("{} must be within [0, 1), got {}", name, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let settings = InputSettings::from_toml_str(
            r#"
            [gamepad]
            pinned_slot = 2

            [host]
            touch_enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(settings.gamepad.pinned_slot, Some(2));
        assert_eq!(settings.gamepad.stick_deadzone, 0.2);
        assert!(settings.vibration.enabled);
        assert!(settings.host.touch_enabled);
        assert!(settings.host.keyboard_enabled);

        let binding = settings.binding_settings();
        assert_eq!(binding.pinned_slot, GamepadSlot::new(1));
        assert!(settings.pump_settings().capabilities.touch_enabled);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(InputSettings::from_toml_str("[gamepad]\npinned_slot = 9").is_err());
        assert!(InputSettings::from_toml_str("[gamepad]\npinned_slot = 0").is_err());
        assert!(InputSettings::from_toml_str("[gamepad]\nstick_deadzone = 1.0").is_err());
        assert!(InputSettings::from_toml_str("[gamepad]\ntrigger_deadzone = -0.1").is_err());
        assert!(InputSettings::from_toml_str("[vibration]\npulse_intensity = 2.0").is_err());
        assert!(InputSettings::from_toml_str("[host]\npoll_interval_ms = 0").is_err());
        assert!(InputSettings::from_toml_str("not toml at all [").is_err());
    }

    #[test]
    fn defaults_survive_serialization() {
        let settings = InputSettings::default();
        let content = settings.to_toml_string().unwrap();
        assert_eq!(InputSettings::from_toml_str(&content).unwrap(), settings);
    }

    #[tokio::test]
    async fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);

        let settings = InputSettings::load_or_default(&path).await.unwrap();
        assert_eq!(settings, InputSettings::default());
        assert!(path.exists());

        let mut changed = settings.clone();
        changed.vibration.pulse_ms = 400;
        changed.save(&path).await.unwrap();
        let reloaded = InputSettings::load_or_default(&path).await.unwrap();
        assert_eq!(reloaded.pulse_duration(), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        tokio::fs::write(&path, "[gamepad]\nstick_deadzone = 3.0\n")
            .await
            .unwrap();
        assert!(InputSettings::load_or_default(&path).await.is_err());
    }
}
