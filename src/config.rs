use std::{env, fs, path::Path};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const API_KEY_ENV: &str = "HOMECTL_BRIDGE_API_KEY";

const DEFAULT_BRIDGE_TIMEOUT_MS: u64 = 5000;
const DEFAULT_GPIO_CHIP: &str = "/dev/gpiochip0";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub unix_socket: Option<String>,
    pub host: Option<String>,
    pub path: String,
    pub timeout: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BridgeConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_bridge_timeout_ms")]
    pub timeout_ms: u64,
}

impl BridgeConfig {
    /// Key from the config file, falling back to `HOMECTL_BRIDGE_API_KEY`.
    /// An empty key counts as absent in both places.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key_or(env::var(API_KEY_ENV).ok())
    }

    fn api_key_or(&self, fallback: Option<String>) -> Option<String> {
        let non_empty = |key: &String| !key.is_empty();
        self.api_key
            .clone()
            .filter(non_empty)
            .or_else(|| fallback.filter(non_empty))
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            timeout_ms: DEFAULT_BRIDGE_TIMEOUT_MS,
        }
    }
}

fn default_bridge_timeout_ms() -> u64 {
    DEFAULT_BRIDGE_TIMEOUT_MS
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GpioConfig {
    #[serde(default = "default_gpio_chip")]
    pub chip: String,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            chip: default_gpio_chip(),
        }
    }
}

fn default_gpio_chip() -> String {
    DEFAULT_GPIO_CHIP.to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum DeviceConfig {
    HttpBridge { endpoint: String },
    GpioRelay { pin: u32 },
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub http: HttpConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub gpio: GpioConfig,
    pub devices: FxHashMap<String, DeviceConfig>,
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, AppError> {
        serde_json::from_str(contents)
            .map_err(|e| AppError::Config(format!("Invalid config json: {e}")))
    }
}
