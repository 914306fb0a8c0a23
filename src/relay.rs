use std::sync::Arc;

use log::info;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::AppError;
use crate::registry::OnOff;

/// Pin-control facility the relays are wired to. Pins are addressed by line
/// number on a single chip.
pub trait RelayBackend: Send + Sync {
    /// Must be idempotent: called before every write.
    fn set_output_mode(&self, pin: u32) -> Result<(), AppError>;
    fn write_level(&self, pin: u32, high: bool) -> Result<(), AppError>;
}

pub struct RelayController<B: RelayBackend> {
    backend: Arc<B>,
    states: RwLock<FxHashMap<String, bool>>, // keyed by device name, memory only
}

impl<B: RelayBackend> RelayController<B> {
    pub fn new<'a>(backend: Arc<B>, devices: impl IntoIterator<Item = &'a str>) -> Self {
        let states = devices
            .into_iter()
            .map(|name| (name.to_string(), false))
            .collect();

        Self {
            backend,
            states: RwLock::new(states),
        }
    }

    pub fn set_pin_mode(&self, pin: u32) -> Result<(), AppError> {
        self.backend.set_output_mode(pin)
    }

    pub fn write_pin(&self, pin: u32, high: bool) -> Result<(), AppError> {
        self.backend.write_level(pin, high)
    }

    pub fn toggle(&self, device_name: &str, pin: u32, turn_on: bool) -> Result<OnOff, AppError> {
        self.set_pin_mode(pin)?;
        self.write_pin(pin, turn_on)?;

        self.states.write().insert(device_name.to_string(), turn_on);
        let state = OnOff::from(turn_on);
        info!("device {device_name} is turned {state}");

        Ok(state)
    }

    /// Last recorded state; Off until the first successful toggle.
    pub fn read_state(&self, device_name: &str) -> OnOff {
        let on = self.states.read().get(device_name).copied().unwrap_or(false);
        OnOff::from(on)
    }
}
