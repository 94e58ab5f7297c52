//! Ingest and read handlers
//!
//! - POST /add - Append one message to the local log
//! - GET /messages - Merged log of every discovered peer

use actix_web::{HttpResponse, web};
use tracing::{debug, warn};
use validator::Validate;

use roomlog_api::{AddMessageForm, StatusResponse, validation::describe_errors};
use roomlog_common::RoomlogError;

use crate::model::AppState;

/// Terminal status of the aggregation behind a `GET /messages` response
pub const AGGREGATION_HEADER: &str = "x-roomlog-aggregation";
/// `<completed>/<discovered>` peer counts behind a `GET /messages` response
pub const PEERS_HEADER: &str = "x-roomlog-peers";

/// HTTP status for an ingest failure
fn error_response(error: &RoomlogError) -> HttpResponse {
    let body = StatusResponse::error(error.to_string());
    match error {
        RoomlogError::IllegalArgument(_) => HttpResponse::BadRequest().json(body),
        RoomlogError::CapacityExceeded { .. } => HttpResponse::InsufficientStorage().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}

/// Decode and validate an `/add` body
fn parse_form(body: &[u8]) -> Result<AddMessageForm, RoomlogError> {
    let form: AddMessageForm = serde_json::from_slice(body)
        .map_err(|e| RoomlogError::IllegalArgument(format!("invalid body: {}", e)))?;
    form.validate()
        .map_err(|errors| RoomlogError::IllegalArgument(describe_errors(&errors)))?;
    Ok(form)
}

/// Append a message
///
/// POST /add
///
/// The body is decoded by hand so malformed JSON gets the same 400 status
/// body as a failed validation.
pub async fn add_message(data: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let result = parse_form(&body).and_then(|form| {
        let room = form.room.clone();
        data.message_log.append(form.into())?;
        Ok(room)
    });

    match result {
        Ok(room) => {
            debug!(room = %room, "Message accepted");
            HttpResponse::Created().json(StatusResponse::success())
        }
        Err(e) => {
            warn!(error = %e, "Message rejected");
            error_response(&e)
        }
    }
}

/// Read the merged log
///
/// GET /messages
///
/// Always answers 200: unreachable peers are left out and reported through
/// the peers header. Process shutdown cancels the collection and returns what
/// was gathered so far. A disconnecting client drops the collection outright.
pub async fn list_messages(data: web::Data<AppState>) -> HttpResponse {
    let result = data
        .aggregator
        .collect_all_until(data.shutdown.cancelled())
        .await;

    HttpResponse::Ok()
        .insert_header((AGGREGATION_HEADER, result.status.as_str()))
        .insert_header((
            PEERS_HEADER,
            format!("{}/{}", result.completed_peers(), result.peers.len()),
        ))
        .json(result.messages)
}

pub async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().json(StatusResponse::error("method not allowed"))
}
