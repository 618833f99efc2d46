//! API service routes
//!
//! The whole API is served under `/api/v1` and again under the legacy `/api`
//! prefix from one router.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, Method, header},
    middleware,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::warn;

use crate::{middleware::auth_middleware, state::AppState};

pub mod borrow_requests;
pub mod debug;
pub mod events;
pub mod help_requests;
pub mod messages;
pub mod notifications;
pub mod resources;
pub mod reviews;
pub mod skill_requests;
pub mod skill_reviews;
pub mod skills;
pub mod socket;
pub mod uploads;
pub mod user_status;
pub mod users;

/// Router layer that requires a valid access token
pub(crate) fn require_auth(state: &AppState, router: Router<AppState>) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Every versioned endpoint, relative to the API prefix
fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(users::router(state))
        .merge(resources::router(state))
        .merge(borrow_requests::router(state))
        .merge(reviews::router(state))
        .merge(skills::router(state))
        .merge(skill_requests::router(state))
        .merge(skill_reviews::router(state))
        .merge(help_requests::router(state))
        .merge(events::router(state))
        .merge(messages::router(state))
        .merge(notifications::router(state))
        .merge(user_status::router(state))
        .merge(uploads::router(state))
        .merge(debug::router())
        .merge(socket::router())
}

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let api = api_routes(&state);

    let mut router = Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api.clone())
        .nest("/api", api)
        .merge(socket::router())
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .layer(TraceLayer::new_for_http());

    if let Some(origin) = state.config.cors_origin.as_deref() {
        match origin.parse::<HeaderValue>() {
            Ok(origin) => {
                router = router.layer(
                    CorsLayer::new()
                        .allow_origin(origin)
                        .allow_credentials(true)
                        .allow_methods([
                            Method::GET,
                            Method::POST,
                            Method::PUT,
                            Method::DELETE,
                            Method::OPTIONS,
                        ])
                        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
                );
            }
            Err(e) => warn!("Ignoring invalid CORS origin {}: {}", origin, e),
        }
    }

    router.with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = common::database::health_check(&state.db_pool)
        .await
        .unwrap_or(false);

    Json(json!({
        "status": if database { "ok" } else { "degraded" },
        "service": "api-service",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;

    #[tokio::test]
    async fn test_router_builds_with_both_prefixes() {
        let _router = create_router(test_state());
    }
}
