// handlers/public/service.rs - GET / and GET /health

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;

pub async fn root(State(state): State<AppState>) -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "MeriLearn Peer Groups API",
            "version": version,
            "description": "Peer-group formation and lifecycle for enrolled students",
            "environment": state.config.environment,
            "default_group_size": state.groups.settings().default_group_size,
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "peer_groups": "/api/peer-groups[/:id] (protected)",
                "my_group": "/api/peer-groups/me (protected, GET and DELETE)",
                "root": "/api/root/peer-groups[/:id] (admin)",
            }
        }
    }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.groups.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "store": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "store unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
