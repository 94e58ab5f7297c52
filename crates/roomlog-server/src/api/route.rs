//! HTTP routing configuration

use actix_web::{Scope, web};

use super::{health, messages};

/// Create the node's HTTP routes
///
/// Routes:
/// - POST /add - Append a message to the local log
/// - GET /messages - Merged log across all peers
/// - GET /health - Node status
///
/// Any other method on a known path answers 405.
pub fn routes() -> Scope {
    web::scope("")
        .service(
            web::resource("/add")
                .route(web::post().to(messages::add_message))
                .default_service(web::route().to(messages::method_not_allowed)),
        )
        .service(
            web::resource("/messages")
                .route(web::get().to(messages::list_messages))
                .default_service(web::route().to(messages::method_not_allowed)),
        )
        .service(
            web::resource("/health")
                .route(web::get().to(health::health))
                .default_service(web::route().to(messages::method_not_allowed)),
        )
}
