use log::info;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, web};

use homectl::{AppConfig, AppState, Dispatcher, RelayBackend};

#[cfg(feature = "hardware-gpio")]
use homectl::LibgpiodBackend;
#[cfg(not(feature = "hardware-gpio"))]
use homectl::MockRelayBackend;

enum Command {
    Serve,
    Toggle { device: String, command: String },
    Status { device: String },
}

fn parse_args(mut args: Vec<String>) -> io::Result<(String, Command)> {
    let config_path = match args.first().map(String::as_str) {
        None | Some("toggle") | Some("status") => std::env::var("HOMECTL_CONFIG")
            .unwrap_or_else(|_| "config.json".to_string()),
        Some(_) => args.remove(0),
    };

    let command = match args.as_slice() {
        [] => Command::Serve,
        [op, device, command] if op == "toggle" => Command::Toggle {
            device: device.clone(),
            command: command.clone(),
        },
        [op, device] if op == "status" => Command::Status {
            device: device.clone(),
        },
        _ => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "usage: homectl [config] [toggle <device> <command> | status <device>]",
            ));
        }
    };

    Ok((config_path, command))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let (config_path, command) = parse_args(std::env::args().skip(1).collect())?;
    let config = AppConfig::load_from_file(&config_path).map_err(io::Error::other)?;

    #[cfg(feature = "hardware-gpio")]
    let backend = Arc::new(LibgpiodBackend::new(config.gpio.chip.clone()));
    #[cfg(not(feature = "hardware-gpio"))]
    let backend = Arc::new(MockRelayBackend::default());

    let dispatcher =
        Arc::new(Dispatcher::from_config(&config, backend).map_err(io::Error::other)?);
    info!(
        "Loaded {} devices from {config_path}",
        dispatcher.registry().len()
    );

    match command {
        Command::Serve => serve(config, dispatcher).await,
        Command::Toggle { device, command } => dispatcher
            .toggle_device(&device, &command)
            .await
            .map_err(io::Error::other),
        Command::Status { device } => {
            match dispatcher
                .get_status(&device)
                .await
                .map_err(io::Error::other)?
            {
                Some(state) => println!("{state}"),
                None => println!("device {device} not found"),
            }
            Ok(())
        }
    }
}

async fn serve<B: RelayBackend + 'static>(
    config: AppConfig,
    dispatcher: Arc<Dispatcher<B>>,
) -> io::Result<()> {
    let app_state = AppState { dispatcher };

    let http_cfg = config.http.clone();
    let mut server = HttpServer::new(move || {
        let scope_path = http_cfg.path.clone();
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .service(app_state.api_scope(&scope_path))
    })
    .client_request_timeout(Duration::from_secs(config.http.timeout));

    let mut bound = Vec::new();
    if let Some(socket_path) = &config.http.unix_socket {
        clear_stale_socket(socket_path)?;
        server = server.bind_uds(socket_path)?;
        bound.push(socket_path.as_str());
    }
    if let Some(host) = &config.http.host {
        server = server.bind_auto_h2c(host)?;
        bound.push(host.as_str());
    }
    if bound.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Config error: either 'unix_socket' or 'host' must be specified",
        ));
    }

    info!("Starting server on {}...", bound.join(" and "));

    server.run().await
}

fn clear_stale_socket(socket_path: &str) -> io::Result<()> {
    if Path::new(socket_path).exists() {
        fs::remove_file(socket_path)?;
    }
    Ok(())
}
