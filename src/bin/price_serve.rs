//! Price prediction server.
//!
//! Configuration comes from the environment (see `ServeConfig`):
//!
//! `MODEL_PATH=model.json META_PATH=model_meta.json PORT=5000 price-serve`
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::process::ExitCode;

use log::{error, info, warn};

use price_serve::config::ServeConfig;
use price_serve::http::{self, ApiState};
use price_serve::service::PredictionService;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServeConfig::from_env();
    info!("starting with {config:?}");

    let service = match PredictionService::from_config(&config) {
        Ok(service) => service,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let addr = match config.bind_addr() {
        Ok(addr) => addr,
        Err(err) => {
            error!("cannot bind HOST {:?}: {err}", config.host);
            return ExitCode::FAILURE;
        }
    };

    let app = http::app(
        ApiState::new(service),
        &config.cors_origin,
        &config.frontend_dir,
    );

    match http::serve(addr, app, shutdown_signal()).await {
        Ok(()) => {
            info!("shut down");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("server error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
    info!("ctrl-c received, draining connections");
}
