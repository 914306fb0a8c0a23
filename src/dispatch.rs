use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;

use crate::bridge::HueBridge;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::registry::{Backend, DeviceRegistry, OnOff};
use crate::relay::{RelayBackend, RelayController};

/// Only a case-insensitive "on" turns a device on. Any other command,
/// typos included, turns it off.
pub fn parse_command(command: &str) -> bool {
    command.eq_ignore_ascii_case("on")
}

pub struct Dispatcher<B: RelayBackend> {
    registry: DeviceRegistry,
    bridge: HueBridge,
    relays: RelayController<B>,
    device_locks: FxHashMap<String, Mutex<()>>,
}

impl<B: RelayBackend> Dispatcher<B> {
    pub fn new(registry: DeviceRegistry, bridge: HueBridge, backend: Arc<B>) -> Self {
        let relays = RelayController::new(backend, registry.relay_devices().map(|(name, _)| name));
        let device_locks = registry
            .iter()
            .map(|d| (d.name.clone(), Mutex::new(())))
            .collect();

        Self {
            registry,
            bridge,
            relays,
            device_locks,
        }
    }

    pub fn from_config(config: &AppConfig, backend: Arc<B>) -> Result<Self, AppError> {
        let registry = DeviceRegistry::from_config(config)?;
        let bridge = HueBridge::new(Duration::from_millis(config.bridge.timeout_ms));
        Ok(Self::new(registry, bridge, backend))
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub async fn toggle_device(&self, name: &str, command: &str) -> Result<(), AppError> {
        info!("device control received, device: {name} -> command: {command}");
        let turn_on = parse_command(command);

        let Some(device) = self.registry.lookup(name) else {
            warn!("unable to control device {name}, it is not in the device registry");
            return Ok(());
        };
        let _guard = self.lock_device(name).await;

        match &device.backend {
            Backend::HttpBridge { endpoint } => {
                let ack = self
                    .bridge
                    .write_state(endpoint, turn_on)
                    .await
                    .inspect_err(|e| error!("toggle {name} -> {command} failed: {e}"))?;
                info!(
                    "device {name} is turned {}, message: {ack}",
                    OnOff::from(turn_on)
                );
            }
            Backend::GpioRelay { pin } => {
                self.relays
                    .toggle(name, *pin, turn_on)
                    .inspect_err(|e| error!("toggle {name} -> {command} failed: {e}"))?;
            }
        }

        Ok(())
    }

    pub async fn get_status(&self, name: &str) -> Result<Option<OnOff>, AppError> {
        let Some(device) = self.registry.lookup(name) else {
            return Ok(None);
        };
        let _guard = self.lock_device(name).await;

        let state = match &device.backend {
            Backend::HttpBridge { endpoint } => self
                .bridge
                .read_state(endpoint)
                .await
                .inspect_err(|e| error!("status of {name} failed: {e}"))?,
            Backend::GpioRelay { .. } => self.relays.read_state(name),
        };
        Ok(Some(state))
    }

    async fn lock_device(&self, name: &str) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        match self.device_locks.get(name) {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }
}
