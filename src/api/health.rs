use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::app_state::AppState;

pub async fn root() -> &'static str {
    "Web3D Token Distribution API"
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let allocations = match state.store.len() {
        Ok(n) => json!(n),
        Err(e) => {
            tracing::warn!(error = %e, "health: failed to count allocations");
            Value::Null
        }
    };
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "store": state.store.kind(),
        "allocations": allocations,
        "claim_mode": state.settings.mode.as_str(),
    }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let headers = [(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    )];
    (headers, state.metrics.render())
}
