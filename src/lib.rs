mod backend;
mod bridge;
mod config;
mod dispatch;
mod error;
mod registry;
mod relay;
mod routes;

pub use bridge::HueBridge;
pub use config::{API_KEY_ENV, AppConfig, BridgeConfig, DeviceConfig, GpioConfig, HttpConfig};
pub use dispatch::{Dispatcher, parse_command};
pub use error::AppError;
pub use registry::{Backend, DeviceDescriptor, DeviceRegistry, OnOff};
pub use relay::{RelayBackend, RelayController};
pub use routes::AppState;

#[cfg(feature = "hardware-gpio")]
pub use backend::LibgpiodBackend;
pub use backend::MockRelayBackend;
