#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use actix_web::dev::ServerHandle;
use actix_web::{App, HttpResponse, HttpServer, web};
use homectl::{AppConfig, Dispatcher, MockRelayBackend};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;

pub const API_KEY: &str = "testkey";

pub const GROW_LIGHT: u32 = 5;
pub const AIR_PUMP: u32 = 3;
/// Accepts writes but never changes state.
pub const STUCK_LIGHT: u32 = 6;
/// `state.on` is a string.
pub const WRONG_TYPE_LIGHT: u32 = 7;
/// Body has no `state` object.
pub const ERROR_LIGHT: u32 = 8;
/// Answers after `SLOW_DELAY`.
pub const SLOW_LIGHT: u32 = 9;
/// Same as `SLOW_LIGHT`, registered as a separate device.
pub const SLOW_LIGHT_2: u32 = 10;

pub const SLOW_DELAY: Duration = Duration::from_millis(800);

#[derive(Default)]
struct InFlight {
    per_light: HashMap<u32, usize>,
    peak_per_light: HashMap<u32, usize>,
    total: usize,
    peak_total: usize,
}

/// Decrements the in-flight counters when the handler returns.
struct InFlightGuard {
    in_flight: Arc<Mutex<InFlight>>,
    light: u32,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut guard = self.in_flight.lock();
        let in_flight = &mut *guard;
        in_flight.total -= 1;
        if let Some(count) = in_flight.per_light.get_mut(&self.light) {
            *count -= 1;
        }
    }
}

#[derive(Clone)]
struct FakeBridgeState {
    lights: Arc<Mutex<HashMap<u32, bool>>>,
    in_flight: Arc<Mutex<InFlight>>,
}

impl FakeBridgeState {
    fn enter(&self, light: u32) -> InFlightGuard {
        let mut guard = self.in_flight.lock();
        let in_flight = &mut *guard;
        in_flight.total += 1;
        in_flight.peak_total = in_flight.peak_total.max(in_flight.total);

        let count = in_flight.per_light.entry(light).or_default();
        *count += 1;
        let peak = in_flight.peak_per_light.entry(light).or_default();
        *peak = (*peak).max(*count);
        drop(guard);

        InFlightGuard {
            in_flight: self.in_flight.clone(),
            light,
        }
    }
}

#[derive(Deserialize)]
struct StateBody {
    on: bool,
}

/// Local HTTP server answering like a Hue bridge's lights resources.
pub struct FakeBridge {
    pub addr: String,
    pub lights: Arc<Mutex<HashMap<u32, bool>>>,
    in_flight: Arc<Mutex<InFlight>>,
    handle: ServerHandle,
}

impl FakeBridge {
    pub async fn start() -> Self {
        let lights = Arc::new(Mutex::new(HashMap::from([
            (GROW_LIGHT, false),
            (AIR_PUMP, true),
            (STUCK_LIGHT, false),
        ])));
        let in_flight = Arc::new(Mutex::new(InFlight::default()));
        let state = FakeBridgeState {
            lights: lights.clone(),
            in_flight: in_flight.clone(),
        };

        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(state.clone()))
                .route("/api/{key}/lights/{id}/", web::get().to(get_light))
                .route("/api/{key}/lights/{id}/state", web::put().to(put_state))
        })
        .workers(1)
        .disable_signals()
        .bind(("127.0.0.1", 0))
        .expect("bind fake bridge");

        let addr = format!("http://{}", server.addrs()[0]);
        let server = server.run();
        let handle = server.handle();
        actix_rt::spawn(server);

        Self {
            addr,
            lights,
            in_flight,
            handle,
        }
    }

    pub fn endpoint(&self, light: u32) -> String {
        format!("{}/api/{API_KEY}/lights/{light}/", self.addr)
    }

    pub fn is_on(&self, light: u32) -> bool {
        self.lights.lock().get(&light).copied().unwrap_or(false)
    }

    /// Highest number of requests for `light` handled at the same time.
    pub fn peak_in_flight(&self, light: u32) -> usize {
        self.in_flight
            .lock()
            .peak_per_light
            .get(&light)
            .copied()
            .unwrap_or(0)
    }

    /// Highest number of requests handled at the same time, all lights.
    pub fn peak_total_in_flight(&self) -> usize {
        self.in_flight.lock().peak_total
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

async fn get_light(
    path: web::Path<(String, u32)>,
    state: web::Data<FakeBridgeState>,
) -> HttpResponse {
    let (key, id) = path.into_inner();
    let _in_flight = state.enter(id);
    if key != API_KEY {
        return HttpResponse::Ok().json(json!([{ "error": { "type": 1, "description": "unauthorized user" } }]));
    }

    match id {
        WRONG_TYPE_LIGHT => HttpResponse::Ok().json(json!({ "state": { "on": "yes" } })),
        ERROR_LIGHT => HttpResponse::Ok().json(json!({ "name": "broken" })),
        SLOW_LIGHT | SLOW_LIGHT_2 => {
            actix_rt::time::sleep(SLOW_DELAY).await;
            HttpResponse::Ok().json(json!({ "state": { "on": true } }))
        }
        _ => match state.lights.lock().get(&id).copied() {
            Some(on) => HttpResponse::Ok().json(json!({
                "state": { "on": on, "bri": 254, "reachable": true },
                "type": "Extended color light",
                "name": format!("light {id}"),
            })),
            None => HttpResponse::NotFound().finish(),
        },
    }
}

async fn put_state(
    path: web::Path<(String, u32)>,
    body: web::Json<StateBody>,
    state: web::Data<FakeBridgeState>,
) -> HttpResponse {
    let (_, id) = path.into_inner();
    let _in_flight = state.enter(id);
    if id == STUCK_LIGHT {
        return HttpResponse::Ok().json(json!([{ "error": { "type": 201, "description": "device is off" } }]));
    }
    if id == SLOW_LIGHT || id == SLOW_LIGHT_2 {
        actix_rt::time::sleep(SLOW_DELAY).await;
    }

    state.lights.lock().insert(id, body.on);

    let mut success = serde_json::Map::new();
    success.insert(format!("/lights/{id}/state/on"), json!(body.on));
    HttpResponse::Ok().json(json!([{ "success": success }]))
}

/// Registry with the relay scenario devices plus the fake bridge lights.
pub fn sample_config(bridge_addr: &str) -> AppConfig {
    sample_config_with_timeout(bridge_addr, 300)
}

pub fn sample_config_with_timeout(bridge_addr: &str, timeout_ms: u64) -> AppConfig {
    AppConfig::from_json(&format!(
        r#"
        {{
            "http": {{
                "host": "localhost:8080",
                "path": "/api/v1",
                "timeout": 30
            }},
            "bridge": {{
                "api_key": "{API_KEY}",
                "timeout_ms": {timeout_ms}
            }},
            "gpio": {{
                "chip": "/dev/gpiochip0"
            }},
            "devices": {{
                "water_pump_1": {{ "backend": "gpio-relay", "pin": 17 }},
                "water_pump_2": {{ "backend": "gpio-relay", "pin": 27 }},
                "grow_light": {{ "backend": "http-bridge", "endpoint": "{bridge_addr}/api/{{api_key}}/lights/{GROW_LIGHT}" }},
                "air_pump": {{ "backend": "http-bridge", "endpoint": "{bridge_addr}/api/{{api_key}}/lights/{AIR_PUMP}/" }},
                "stuck_light": {{ "backend": "http-bridge", "endpoint": "{bridge_addr}/api/{{api_key}}/lights/{STUCK_LIGHT}/" }},
                "wrong_type_light": {{ "backend": "http-bridge", "endpoint": "{bridge_addr}/api/{{api_key}}/lights/{WRONG_TYPE_LIGHT}/" }},
                "error_light": {{ "backend": "http-bridge", "endpoint": "{bridge_addr}/api/{{api_key}}/lights/{ERROR_LIGHT}/" }},
                "slow_light": {{ "backend": "http-bridge", "endpoint": "{bridge_addr}/api/{{api_key}}/lights/{SLOW_LIGHT}/" }},
                "slow_light_2": {{ "backend": "http-bridge", "endpoint": "{bridge_addr}/api/{{api_key}}/lights/{SLOW_LIGHT_2}/" }}
            }}
        }}
        "#
    ))
    .expect("valid sample config")
}

pub fn sample_dispatcher(bridge_addr: &str) -> (Arc<Dispatcher<MockRelayBackend>>, Arc<MockRelayBackend>) {
    dispatcher_for(sample_config(bridge_addr))
}

pub fn dispatcher_for(config: AppConfig) -> (Arc<Dispatcher<MockRelayBackend>>, Arc<MockRelayBackend>) {
    let backend = Arc::new(MockRelayBackend::default());
    let dispatcher = Dispatcher::from_config(&config, backend.clone()).expect("valid registry");
    (Arc::new(dispatcher), backend)
}
