//! Diagnostics

use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/debug/health", get(debug_health))
}

/// Database, Redis and socket summary
pub async fn debug_health(State(state): State<AppState>) -> Json<Value> {
    let database = common::database::health_check(&state.db_pool)
        .await
        .unwrap_or(false);
    let redis = state.redis_pool.health_check().await.unwrap_or(false);
    let online_users = state.hub.online_users().await.len();
    let connections = state.hub.connection_count().await;

    Json(json!({
        "status": if database && redis { "ok" } else { "degraded" },
        "database": database,
        "redis": redis,
        "sockets": {
            "connections": connections,
            "online_users": online_users,
        },
    }))
}
