use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse, Responder, guard, http::Method, web};
use serde::Serialize;

use crate::dispatch::Dispatcher;
use crate::error::AppError;
use crate::registry::OnOff;
use crate::relay::RelayBackend;

pub struct AppState<B: RelayBackend> {
    pub dispatcher: Arc<Dispatcher<B>>,
}

impl<B: RelayBackend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

#[derive(Serialize)]
struct DeviceEntry<'a> {
    name: &'a str,
    backend: &'static str,
}

#[derive(Serialize)]
struct StatusResponse<'a> {
    device: &'a str,
    state: OnOff,
}

impl<B: RelayBackend + 'static> AppState<B> {
    pub fn api_scope(&self, base_path: &str) -> actix_web::Scope {
        web::scope(base_path)
            .service(
                web::resource("/devices")
                    .route(web::get().to(list_devices::<B>))
                    .route(
                        web::route()
                            .guard(guard_not_methods(&[Method::GET]))
                            .to(method_not_allowed),
                    ),
            )
            .service(
                web::resource("/devices/{name}/status")
                    .route(web::get().to(get_status::<B>))
                    .route(
                        web::route()
                            .guard(guard_not_methods(&[Method::GET]))
                            .to(method_not_allowed),
                    ),
            )
            .service(
                web::resource("/devices/{name}/toggle")
                    .route(web::post().to(toggle_device::<B>))
                    .route(
                        web::route()
                            .guard(guard_not_methods(&[Method::POST]))
                            .to(method_not_allowed),
                    ),
            )
    }
}

async fn list_devices<B: RelayBackend + 'static>(
    state: web::Data<AppState<B>>,
) -> Result<impl Responder, AppError> {
    let mut devices: Vec<DeviceEntry<'_>> = state
        .dispatcher
        .registry()
        .iter()
        .map(|d| DeviceEntry {
            name: &d.name,
            backend: d.backend.kind(),
        })
        .collect();
    devices.sort_by(|a, b| a.name.cmp(b.name));

    Ok(HttpResponse::Ok().json(devices))
}

async fn get_status<B: RelayBackend + 'static>(
    req: HttpRequest,
    state: web::Data<AppState<B>>,
) -> Result<impl Responder, AppError> {
    let name = parse_device_name(&req)?;
    let on_off = state
        .dispatcher
        .get_status(name)
        .await?
        .ok_or_else(|| AppError::UnknownDevice(name.to_string()))?;

    Ok(HttpResponse::Ok().json(StatusResponse {
        device: name,
        state: on_off,
    }))
}

async fn toggle_device<B: RelayBackend + 'static>(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState<B>>,
) -> Result<impl Responder, AppError> {
    let name = parse_device_name(&req)?;
    let command = parse_command_payload(&body)?;

    state.dispatcher.toggle_device(name, command).await?;

    Ok(HttpResponse::NoContent())
}

fn parse_command_payload(body: &[u8]) -> Result<&str, AppError> {
    std::str::from_utf8(body)
        .map(str::trim)
        .map_err(|_| AppError::InvalidValue("Command payload must be valid UTF-8".into()))
}

fn parse_device_name(req: &HttpRequest) -> Result<&str, AppError> {
    req.match_info()
        .get("name")
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::InvalidValue("Missing device name".into()))
}

async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().finish()
}

fn guard_not_methods(methods: &[Method]) -> impl guard::Guard {
    let allowed: Vec<Method> = methods.to_vec();
    guard::fn_guard(move |ctx| !allowed.iter().any(|m| m == ctx.head().method))
}
