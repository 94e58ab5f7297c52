//! Main entry point for the Roomlog server.
//!
//! Starts the export gRPC server and the ingest/read HTTP server side by side.
//! Both share one shutdown signal; when either stops the other is asked to
//! stop too, and the process exits once both are down.

use clap::Parser;
use tracing::{error, info};

use roomlog_server::{
    model::{AppState, Cli, load_configuration},
    startup::{self, LoggingConfig},
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let configuration = load_configuration(&cli, |name| std::env::var(name).ok())?;

    let logging_config =
        LoggingConfig::from_configuration(&configuration, |name| std::env::var(name).ok());
    let _logging_guard = startup::init_logging(&logging_config)?;

    let server_address = configuration.server_address();
    let http_port = configuration.http_port()?;
    let grpc_port = configuration.grpc_port()?;
    let shutdown_timeout_secs = configuration.shutdown_timeout_ms().div_ceil(1000);

    let shutdown = startup::wait_for_shutdown_signal();
    let app_state = AppState::from_configuration(configuration.clone(), shutdown.clone())?;

    info!(
        discovery = %app_state.aggregator.discovery().describe(),
        capacity = ?app_state.message_log.capacity(),
        "Node configured"
    );

    let export_server = startup::start_export_server(
        app_state.message_log.clone(),
        configuration.export_channel_capacity(),
        &server_address,
        grpc_port,
        shutdown.cancelled(),
    )
    .await?;

    info!("Starting HTTP server on {}:{}", server_address, http_port);
    let http_server = match startup::main_server(
        app_state,
        server_address.clone(),
        http_port,
        shutdown_timeout_secs,
    ) {
        Ok(server) => server,
        Err(e) => {
            shutdown.shutdown();
            export_server.abort();
            return Err(e.into());
        }
    };

    let http_handle = http_server.handle();
    let stop_http = shutdown.cancelled();
    actix_rt::spawn(async move {
        stop_http.await;
        info!("Stopping HTTP server");
        http_handle.stop(true).await;
    });

    let http_supervised = async {
        let result = http_server.await;
        if let Err(e) = &result {
            error!("HTTP server error: {}", e);
        }
        shutdown.shutdown();
        result
    };
    let export_supervised = async {
        let result = export_server.wait().await;
        shutdown.shutdown();
        result
    };

    let (http_result, export_result) = tokio::join!(http_supervised, export_supervised);
    http_result?;
    export_result?;

    info!("Shutdown complete");
    Ok(())
}
