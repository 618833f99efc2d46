//! Community help requests

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde_json::{Value, json};
use uuid::Uuid;

use super::require_auth;
use crate::{
    error::ApiResult,
    lifecycle::HelpAction,
    middleware::AuthUser,
    models::{
        ListResponse, PageQuery,
        help_request::{CreateHelpRequest, HelpRequest, HelpRequestQuery, UpdateHelpRequest},
    },
    state::AppState,
    validation::{
        CATEGORY_MAX, DESCRIPTION_MAX, SHORT_TEXT_MAX, TITLE_MAX, optional_text, replacement_text,
        required_text,
    },
};

pub fn router(state: &AppState) -> Router<AppState> {
    let protected = require_auth(
        state,
        Router::new()
            .route("/help-requests", post(create_help_request))
            .route("/help-requests/mine", get(my_help_requests))
            .route(
                "/help-requests/:id",
                put(update_help_request).delete(delete_help_request),
            )
            .route("/help-requests/:id/offer", put(offer))
            .route("/help-requests/:id/complete", put(complete))
            .route("/help-requests/:id/cancel", put(cancel)),
    );

    Router::new()
        .route("/help-requests", get(list_help_requests))
        .route("/help-requests/:id", get(get_help_request))
        .merge(protected)
}

fn validate_new_help_request(payload: CreateHelpRequest) -> ApiResult<CreateHelpRequest> {
    Ok(CreateHelpRequest {
        title: required_text("Title", &payload.title, TITLE_MAX)?,
        description: required_text("Description", &payload.description, DESCRIPTION_MAX)?,
        category: required_text("Category", &payload.category, CATEGORY_MAX)?,
        urgency: payload.urgency,
        location: optional_text("Location", payload.location.as_deref(), SHORT_TEXT_MAX)?,
    })
}

/// Ask the community for help
pub async fn create_help_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateHelpRequest>,
) -> ApiResult<(StatusCode, Json<HelpRequest>)> {
    let payload = validate_new_help_request(payload)?;
    let request = state
        .help_request_repository
        .create(user.id, &payload)
        .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

/// Most urgent first, then newest
pub async fn list_help_requests(
    State(state): State<AppState>,
    Query(query): Query<HelpRequestQuery>,
) -> ApiResult<Json<ListResponse<HelpRequest>>> {
    let (items, total) = state.help_request_repository.list(&query).await?;
    Ok(Json(ListResponse::new(items, query.page(), total)))
}

pub async fn my_help_requests(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<ListResponse<HelpRequest>>> {
    let page = query.page();
    let (items, total) = state
        .help_request_repository
        .by_requester(user.id, page)
        .await?;

    Ok(Json(ListResponse::new(items, page, total)))
}

pub async fn get_help_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<HelpRequest>> {
    Ok(Json(state.help_request_repository.get(id).await?))
}

pub async fn update_help_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateHelpRequest>,
) -> ApiResult<Json<HelpRequest>> {
    let update = UpdateHelpRequest {
        title: replacement_text("Title", payload.title.as_deref(), TITLE_MAX)?,
        description: replacement_text("Description", payload.description.as_deref(), DESCRIPTION_MAX)?,
        category: replacement_text("Category", payload.category.as_deref(), CATEGORY_MAX)?,
        urgency: payload.urgency,
        location: optional_text("Location", payload.location.as_deref(), SHORT_TEXT_MAX)?,
    };

    Ok(Json(
        state
            .help_request_repository
            .update(id, user.id, &update)
            .await?,
    ))
}

pub async fn delete_help_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    state.help_request_repository.soft_delete(id, user.id).await?;
    Ok(Json(json!({ "message": "Help request deleted" })))
}

async fn transition(
    state: AppState,
    user: AuthUser,
    id: Uuid,
    action: HelpAction,
) -> ApiResult<Json<HelpRequest>> {
    let outcome = state
        .help_request_repository
        .transition(id, user.id, action)
        .await?;
    state.push_notifications(outcome.notifications).await;

    Ok(Json(outcome.value))
}

/// Volunteer for someone else's open request
pub async fn offer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<HelpRequest>> {
    transition(state, user, id, HelpAction::Offer).await
}

pub async fn complete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<HelpRequest>> {
    transition(state, user, id, HelpAction::Complete).await
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<HelpRequest>> {
    transition(state, user, id, HelpAction::Cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ApiError, models::help_request::Urgency};

    #[test]
    fn test_new_help_request_keeps_urgency_and_drops_blank_location() {
        let payload = validate_new_help_request(CreateHelpRequest {
            title: "Moving a sofa".to_string(),
            description: " Need two people on Saturday ".to_string(),
            category: "moving".to_string(),
            urgency: Some(Urgency::High),
            location: Some(" ".to_string()),
        })
        .unwrap();

        assert_eq!(payload.description, "Need two people on Saturday");
        assert_eq!(payload.urgency, Some(Urgency::High));
        assert_eq!(payload.location, None);
    }

    #[test]
    fn test_new_help_request_requires_description() {
        let result = validate_new_help_request(CreateHelpRequest {
            title: "Moving a sofa".to_string(),
            description: String::new(),
            category: "moving".to_string(),
            urgency: None,
            location: None,
        });

        assert!(matches!(result, Err(ApiError::BadRequest(msg)) if msg == "Description is required"));
    }
}
