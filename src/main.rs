use color_eyre::{eyre::eyre, Result};
use inputbridge::device::{DeviceEventSource, GamepadButton, Motor};
use inputbridge::input::{KeyboardTracker, MouseTracker, TouchTracker};
use inputbridge::{GamepadBinding, GilrsDevices, InputSettings, PreferenceTracker};
use std::sync::Arc;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let settings_path = InputSettings::default_path()?;
    let settings = InputSettings::load_or_default(&settings_path).await?;

    info!("Starting gilrs device pump");
    let (devices, pump) = GilrsDevices::spawn(Some(settings.pump_settings()))
        .map_err(|e| eyre!("Failed to spawn device pump: {}", e))?;
    let source: Arc<dyn DeviceEventSource> = devices.clone();

    let tracker = PreferenceTracker::new(Arc::clone(&source));
    let _preference_log = tracker.observe(|modality| info!("Preferred input: {}", modality));

    let binding = Arc::new(GamepadBinding::for_devices(
        Arc::clone(&devices),
        Some(settings.binding_settings()),
    ));
    let _active_log = binding.events().active_changed.connect(|slot| match slot {
        Some(slot) => info!("Binding follows {}", slot),
        None => warn!("Binding has no gamepad"),
    });
    let _up_log = binding.on_button_up(|event| debug!("{:?} released", event.button));

    let _pulse_on_south = {
        let weak = Arc::downgrade(&binding);
        let vibration = settings.vibration.clone();
        let duration = settings.pulse_duration();
        binding.on_button_down(move |event| {
            debug!("{:?} pressed (consumed: {})", event.button, event.consumed);
            if event.button != GamepadButton::South || !vibration.enabled {
                return;
            }
            let Some(binding) = weak.upgrade() else {
                return;
            };
            if let Err(e) = binding.pulse_motor(Motor::Large, vibration.pulse_intensity, duration) {
                warn!("Pulse failed: {}", e);
            }
        })
    };

    let keyboard = KeyboardTracker::new(source.as_ref());
    let mouse = MouseTracker::new(source.as_ref());
    let touch = TouchTracker::new(source.as_ref());

    info!("Running, press Ctrl-C to quit");
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| eyre!("Failed to listen for Ctrl-C: {}", e))?;

    info!("Shutting down");
    touch.destroy();
    mouse.destroy();
    keyboard.destroy();
    binding.destroy();
    tracker.destroy();
    pump.shutdown()
        .await
        .map_err(|e| eyre!("Device pump did not stop cleanly: {}", e))?;

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
