// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;

use portal_access_gate::{
    api::router,
    config::{log_format, LogFormat, ServerSettings},
    secrets::SecretsBootstrapper,
    state::AppState,
    telemetry,
};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let bootstrapper = SecretsBootstrapper::from_process();

    // Logging must be up before bootstrap so store failures are visible;
    // the format comes from the local layers only.
    let format = bootstrapper
        .load_local()
        .map(|config| log_format(&config))
        .unwrap_or(LogFormat::Pretty);
    if let Err(e) = telemetry::init_tracing(format) {
        eprintln!("failed to initialise tracing: {e}");
    }

    let config = match bootstrapper.bootstrap().await {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuration bootstrap failed");
            return ExitCode::FAILURE;
        }
    };

    let settings = match ServerSettings::from_config(&config) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid server settings");
            return ExitCode::FAILURE;
        }
    };

    let app = router(AppState::new(config));

    let listener = match TcpListener::bind(settings.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, addr = %settings.bind_addr, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };
    info!(addr = %settings.bind_addr, "Portal access gate listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server failed");
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
