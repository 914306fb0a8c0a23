use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bridge unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("Malformed bridge response: {0}")]
    MalformedResponse(String),
    #[error("GPIO unavailable: {0}")]
    HardwareUnavailable(String),
    #[error("Device not found: {0}")]
    UnknownDevice(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::RemoteUnavailable(_) | AppError::MalformedResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::HardwareUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::UnknownDevice(_) => StatusCode::NOT_FOUND,
            AppError::InvalidValue(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
