use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::error::AppError;
use crate::relay::RelayBackend;

/// In-memory pin facility. Pins can be marked unavailable to simulate a
/// missing or already claimed line.
#[derive(Default)]
pub struct MockRelayBackend {
    pins: RwLock<HashMap<u32, MockPinState>>, // keyed by pin
    unavailable: RwLock<HashSet<u32>>,
}

#[derive(Clone, Copy, Default)]
struct MockPinState {
    level: bool,
    mode_calls: usize,
}

impl MockRelayBackend {
    pub fn set_unavailable(&self, pin: u32, unavailable: bool) {
        if let Ok(mut set) = self.unavailable.write() {
            if unavailable {
                set.insert(pin);
            } else {
                set.remove(&pin);
            }
        }
    }

    /// Current level, `None` while the pin was never configured.
    pub fn level(&self, pin: u32) -> Option<bool> {
        self.pins.read().ok()?.get(&pin).map(|p| p.level)
    }

    pub fn mode_calls(&self, pin: u32) -> usize {
        self.pins
            .read()
            .ok()
            .and_then(|pins| pins.get(&pin).map(|p| p.mode_calls))
            .unwrap_or(0)
    }

    fn check_available(&self, pin: u32) -> Result<(), AppError> {
        let unavailable = self
            .unavailable
            .read()
            .map_err(|e| AppError::HardwareUnavailable(format!("lock poisoned: {e}")))?;
        if unavailable.contains(&pin) {
            return Err(AppError::HardwareUnavailable(format!(
                "pin {pin} cannot be claimed"
            )));
        }
        Ok(())
    }
}

impl RelayBackend for MockRelayBackend {
    fn set_output_mode(&self, pin: u32) -> Result<(), AppError> {
        self.check_available(pin)?;

        let mut pins = self
            .pins
            .write()
            .map_err(|e| AppError::HardwareUnavailable(format!("lock poisoned: {e}")))?;
        pins.entry(pin).or_default().mode_calls += 1;

        Ok(())
    }

    fn write_level(&self, pin: u32, high: bool) -> Result<(), AppError> {
        self.check_available(pin)?;

        let mut pins = self
            .pins
            .write()
            .map_err(|e| AppError::HardwareUnavailable(format!("lock poisoned: {e}")))?;
        let pin_state = pins.get_mut(&pin).ok_or_else(|| {
            AppError::HardwareUnavailable(format!("pin {pin} not configured for output"))
        })?;
        pin_state.level = high;

        Ok(())
    }
}
