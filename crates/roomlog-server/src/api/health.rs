use actix_web::{HttpResponse, web};

use roomlog_api::HealthResponse;

use crate::model::AppState;

/// GET /health
pub async fn health(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "UP".to_string(),
        local_messages: data.message_log.len(),
        discovery: data.aggregator.discovery().describe(),
        started_at: data.started_at,
    })
}
