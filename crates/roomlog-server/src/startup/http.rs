//! HTTP server setup module.

use actix_web::{App, HttpServer, dev::Server, middleware::Logger, web};

use crate::{api::route::routes, model::AppState};

/// Creates and binds the ingest/read HTTP server.
///
/// OS signal handling is disabled; the caller stops the server through its
/// handle when the shared shutdown signal fires.
pub fn main_server(
    app_state: AppState,
    address: String,
    port: u16,
    shutdown_timeout_secs: u64,
) -> Result<Server, std::io::Error> {
    Ok(HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(app_state.clone()))
            .service(routes())
    })
    .disable_signals()
    .shutdown_timeout(shutdown_timeout_secs)
    .bind((address, port))?
    .run())
}
