use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::config::{AppConfig, DeviceConfig};
use crate::error::AppError;

const API_KEY_PLACEHOLDER: &str = "{api_key}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OnOff {
    On,
    Off,
}

impl From<bool> for OnOff {
    fn from(on: bool) -> Self {
        if on { OnOff::On } else { OnOff::Off }
    }
}

impl fmt::Display for OnOff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OnOff::On => "on",
            OnOff::Off => "off",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Per-device resource on the bridge, always ending with `/`.
    HttpBridge { endpoint: String },
    GpioRelay { pin: u32 },
}

impl Backend {
    pub fn kind(&self) -> &'static str {
        match self {
            Backend::HttpBridge { .. } => "http-bridge",
            Backend::GpioRelay { .. } => "gpio-relay",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub name: String,
    pub backend: Backend,
}

/// Device table built once at startup. Entries are never added or removed.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: FxHashMap<String, DeviceDescriptor>,
}

impl DeviceRegistry {
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let api_key = config.bridge.resolve_api_key();
        let mut claimed_pins = FxHashSet::default();
        let mut devices = FxHashMap::default();

        for (name, device) in &config.devices {
            let backend = match device {
                DeviceConfig::HttpBridge { endpoint } => Backend::HttpBridge {
                    endpoint: expand_endpoint(name, endpoint, api_key.as_deref())?,
                },
                DeviceConfig::GpioRelay { pin } => {
                    if !claimed_pins.insert(*pin) {
                        return Err(AppError::Config(format!(
                            "pin {pin} of device {name} is already used by another relay"
                        )));
                    }
                    Backend::GpioRelay { pin: *pin }
                }
            };
            devices.insert(
                name.clone(),
                DeviceDescriptor {
                    name: name.clone(),
                    backend,
                },
            );
        }

        Ok(Self { devices })
    }

    pub fn lookup(&self, name: &str) -> Option<&DeviceDescriptor> {
        self.devices.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceDescriptor> {
        self.devices.values()
    }

    pub fn relay_devices(&self) -> impl Iterator<Item = (&str, u32)> {
        self.devices.values().filter_map(|d| match d.backend {
            Backend::GpioRelay { pin } => Some((d.name.as_str(), pin)),
            Backend::HttpBridge { .. } => None,
        })
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

fn expand_endpoint(name: &str, template: &str, api_key: Option<&str>) -> Result<String, AppError> {
    let mut endpoint = if template.contains(API_KEY_PLACEHOLDER) {
        let key = api_key.ok_or_else(|| {
            AppError::Config(format!("device {name} needs a bridge api key but none is set"))
        })?;
        template.replace(API_KEY_PLACEHOLDER, key)
    } else {
        template.to_string()
    };

    if !endpoint.ends_with('/') {
        endpoint.push('/');
    }
    Ok(endpoint)
}
