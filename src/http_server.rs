//! HTTP control endpoint
//!
//! A single form-encoded `POST /api` route translating `id`/`valve`/
//! `position` fields into dispatcher commands. Every response is the
//! envelope `{"success":1,"data":...}` or `{"success":0,"message":...}`,
//! never a half-populated success. Device failures surface as failure
//! envelopes, not HTTP error codes, so a dead valve cannot take the
//! endpoint down.

use crate::dispatcher::{self, CommandId, CommandRequest, DispatchOutcome};
use crate::error::Result;
use crate::registry::ValveRegistry;
use axum::{
    extract::{Form, State},
    response::Json,
    routing::post,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};

/// Raw form fields of one API request
#[derive(Debug, Deserialize)]
pub struct ApiForm {
    id: Option<String>,
    valve: Option<String>,
    position: Option<String>,
}

/// Build the application router around a shared registry
pub fn router(registry: Arc<ValveRegistry>) -> Router {
    Router::new()
        .route("/api", post(api_post).get(api_get))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(registry)
}

/// Bind and serve until the process is stopped
pub async fn serve(registry: Arc<ValveRegistry>, port: u16) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("valve server listening on port {port}");
    axum::serve(listener, router(registry))
        .await
        .map_err(crate::error::ValveError::Io)
}

/// GET stub kept for compatibility; the API is POST-only
async fn api_get() -> &'static str {
    debug!("api get, not supported");
    ""
}

async fn api_post(
    State(registry): State<Arc<ValveRegistry>>,
    Form(form): Form<ApiForm>,
) -> Json<Value> {
    debug!(?form, "api post");

    let Some(id) = form.id.as_deref().and_then(CommandId::parse) else {
        return failure("invalid command");
    };

    if id.needs_valve() && form.valve.is_none() {
        return failure("missing valve argument");
    }
    if id == CommandId::SetValvePosition && form.position.is_none() {
        return failure("missing position argument");
    }

    let request = CommandRequest {
        id,
        valve: form.valve,
        position: form.position,
    };

    match dispatcher::dispatch(&registry, &request).await {
        DispatchOutcome::Success(data) => Json(json!({ "success": 1, "data": data })),
        DispatchOutcome::UnknownValve => failure("valve name not found"),
        DispatchOutcome::Failure(message) => failure(&message),
    }
}

fn failure(message: &str) -> Json<Value> {
    Json(json!({ "success": 0, "message": message }))
}
