use std::time::Duration;

use awc::Client;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::registry::OnOff;

#[derive(Deserialize)]
struct LightResponse {
    state: LightState,
}

#[derive(Deserialize)]
struct LightState {
    on: bool,
}

#[derive(Serialize)]
struct StateRequest {
    on: bool,
}

/// Client for the lights resources of a Hue-style bridge.
///
/// The bridge is the source of truth for these devices: nothing is cached,
/// every status query goes over the network.
#[derive(Debug, Clone)]
pub struct HueBridge {
    timeout: Duration,
}

impl HueBridge {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    // awc clients are !Send, so one is built per call to keep the bridge shareable across workers.
    fn client(&self) -> Client {
        Client::builder().timeout(self.timeout).finish()
    }

    pub async fn read_state(&self, endpoint: &str) -> Result<OnOff, AppError> {
        let mut resp = self
            .client()
            .get(endpoint)
            .send()
            .await
            .map_err(|e| AppError::RemoteUnavailable(format!("GET {endpoint}: {e}")))?;
        let body = resp
            .body()
            .await
            .map_err(|e| AppError::RemoteUnavailable(format!("GET {endpoint} body: {e}")))?;

        debug!("bridge GET {endpoint} -> {}", resp.status());

        let light: LightResponse = serde_json::from_slice(&body)
            .map_err(|e| AppError::MalformedResponse(format!("GET {endpoint}: {e}")))?;
        Ok(OnOff::from(light.state.on))
    }

    /// Returns the bridge's raw acknowledgment. The requested state is not
    /// checked against it.
    pub async fn write_state(&self, endpoint: &str, turn_on: bool) -> Result<String, AppError> {
        let url = format!("{endpoint}state");
        let mut resp = self
            .client()
            .put(url.as_str())
            .send_json(&StateRequest { on: turn_on })
            .await
            .map_err(|e| AppError::RemoteUnavailable(format!("PUT {url}: {e}")))?;
        let body = resp
            .body()
            .await
            .map_err(|e| AppError::RemoteUnavailable(format!("PUT {url} body: {e}")))?;

        if !resp.status().is_success() {
            warn!("bridge PUT {url} answered {}", resp.status());
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
