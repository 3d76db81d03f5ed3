//! Router and axum adapters for the intake handler

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use contact_relay::{InboundRequest, IntakeHandler};
use serde::Serialize;
use tower_http::trace::TraceLayer;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "contact-relay-server",
        version: contact_relay::VERSION,
    })
}

/// Handler: any method on any other path
///
/// The body is read whole; the intake handler decides what the method allows.
pub async fn handle_intake(
    State(handler): State<Arc<IntakeHandler>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let response = handler
        .handle(InboundRequest::new(method, headers, body.to_vec()))
        .await;

    (response.status, response.headers, response.body).into_response()
}

/// Build the application router
pub fn router(handler: Arc<IntakeHandler>) -> Router {
    Router::new()
        // Non-GET methods on /health still reach the intake handler
        .route("/health", get(handle_health).fallback(handle_intake))
        .fallback(handle_intake)
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}
