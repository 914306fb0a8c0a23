use log::{debug, warn};
use std::path::{Path, PathBuf};

use libgpiod::{chip::Chip, line, request};
use parking_lot::{FairMutex, RwLock, RwLockUpgradableReadGuard};
use rustc_hash::FxHashMap;

use crate::error::AppError;
use crate::relay::RelayBackend;

pub struct LibgpiodBackend {
    chip: String,
    pins: RwLock<FxHashMap<u32, FairMutex<GpiodHandle>>>, // keyed by line offset
}

struct GpiodHandle {
    request: request::Request,
}

impl GpiodHandle {
    fn new(chip: &str, line_cfg: &line::Config) -> Result<Self, AppError> {
        let chip = Self::open_chip(chip)?;
        let request = Self::request_lines(&chip, line_cfg)?;
        Ok(Self { request })
    }

    fn open_chip(path: &str) -> Result<Chip, AppError> {
        let p = PathBuf::from(path);
        Chip::open(&p).map_err(|e| AppError::HardwareUnavailable(format!("open chip {path}: {e}")))
    }

    fn request_lines(chip: &Chip, line_cfg: &line::Config) -> Result<request::Request, AppError> {
        let mut req_cfg = request::Config::new()
            .map_err(|e| AppError::HardwareUnavailable(format!("request config: {e}")))?;
        req_cfg
            .set_consumer(env!("CARGO_PKG_NAME"))
            .map_err(|e| AppError::HardwareUnavailable(format!("request consumer: {e}")))?;
        chip.request_lines(Some(&req_cfg), line_cfg)
            .map_err(|e| AppError::HardwareUnavailable(format!("request lines: {e}")))
    }
}

impl LibgpiodBackend {
    /// The chip is opened lazily on the first relay toggle, so a missing chip
    /// only fails relay operations.
    pub fn new(chip: impl Into<String>) -> Self {
        let chip = chip.into();
        if !Path::new(&chip).exists() {
            warn!("gpio chip {chip} does not exist, relay toggles will fail");
        }

        Self {
            chip,
            pins: RwLock::new(FxHashMap::default()),
        }
    }

    fn make_output_settings() -> Result<line::Settings, AppError> {
        let mut ls = line::Settings::new()
            .map_err(|e| AppError::HardwareUnavailable(format!("libgpiod settings: {e}")))?;
        ls.set_direction(line::Direction::Output)
            .map_err(|e| AppError::HardwareUnavailable(format!("set direction: {e}")))?;
        ls.set_drive(line::Drive::PushPull)
            .map_err(|e| AppError::HardwareUnavailable(format!("set drive: {e}")))?;
        ls.set_output_value(line::Value::InActive)
            .map_err(|e| AppError::HardwareUnavailable(format!("set output value: {e}")))?;
        Ok(ls)
    }

    fn make_line_config(offset: u32, settings: line::Settings) -> Result<line::Config, AppError> {
        let mut cfg = line::Config::new()
            .map_err(|e| AppError::HardwareUnavailable(format!("line config: {e}")))?;
        cfg.add_line_settings(&[offset], settings)
            .map_err(|e| AppError::HardwareUnavailable(format!("line config add settings: {e}")))?;
        Ok(cfg)
    }
}

impl RelayBackend for LibgpiodBackend {
    fn set_output_mode(&self, pin: u32) -> Result<(), AppError> {
        let pins = self.pins.upgradable_read();

        // already requested as output, the request stays valid
        if pins.contains_key(&pin) {
            return Ok(());
        }

        let line_cfg = Self::make_line_config(pin, Self::make_output_settings()?)?;
        let handle = GpiodHandle::new(&self.chip, &line_cfg)?;
        debug!("requested line {pin} on {} as output", self.chip);

        let mut pins = RwLockUpgradableReadGuard::upgrade(pins);
        pins.insert(pin, FairMutex::new(handle));

        Ok(())
    }

    fn write_level(&self, pin: u32, high: bool) -> Result<(), AppError> {
        let pins = self.pins.read();
        let handle = pins.get(&pin).ok_or_else(|| {
            AppError::HardwareUnavailable(format!("line {pin} not configured for output"))
        })?;

        let value = if high {
            line::Value::Active
        } else {
            line::Value::InActive
        };

        handle
            .lock()
            .request
            .set_value(pin, value)
            .map_err(|e| AppError::HardwareUnavailable(format!("set value: {e}")))?;
        Ok(())
    }
}
