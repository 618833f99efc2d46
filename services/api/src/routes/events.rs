//! Community events and attendance

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use super::require_auth;
use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::{
        ListResponse,
        event::{Attendee, CreateEventRequest, Event, EventQuery, UpdateEventRequest},
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
            .route("/events", post(create_event))
            .route("/events/:id", put(update_event).delete(delete_event))
            .route("/events/:id/join", post(join_event).delete(leave_event)),
    );

    Router::new()
        .route("/events", get(list_events))
        .route("/events/:id", get(get_event))
        .route("/events/:id/attendees", get(attendees))
        .merge(protected)
}

fn check_capacity(capacity: Option<i32>) -> ApiResult<Option<i32>> {
    match capacity {
        Some(capacity) if capacity <= 0 => Err(ApiError::BadRequest(
            "Capacity must be a positive number".to_string(),
        )),
        capacity => Ok(capacity),
    }
}

fn check_window(starts_at: Option<DateTime<Utc>>, ends_at: Option<DateTime<Utc>>) -> ApiResult<()> {
    if let (Some(starts_at), Some(ends_at)) = (starts_at, ends_at) {
        if ends_at < starts_at {
            return Err(ApiError::BadRequest(
                "Event cannot end before it starts".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_new_event(payload: CreateEventRequest) -> ApiResult<CreateEventRequest> {
    check_window(Some(payload.starts_at), payload.ends_at)?;

    Ok(CreateEventRequest {
        title: required_text("Title", &payload.title, TITLE_MAX)?,
        description: required_text("Description", &payload.description, DESCRIPTION_MAX)?,
        location: required_text("Location", &payload.location, SHORT_TEXT_MAX)?,
        category: optional_text("Category", payload.category.as_deref(), CATEGORY_MAX)?,
        starts_at: payload.starts_at,
        ends_at: payload.ends_at,
        capacity: check_capacity(payload.capacity)?,
    })
}

/// Organize an event
pub async fn create_event(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateEventRequest>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    let payload = validate_new_event(payload)?;
    let event = state.event_repository.create(user.id, &payload).await?;

    Ok((StatusCode::CREATED, Json(event)))
}

/// Upcoming events by default, soonest first
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> ApiResult<Json<ListResponse<Event>>> {
    let (items, total) = state.event_repository.list(&query).await?;
    Ok(Json(ListResponse::new(items, query.page(), total)))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Event>> {
    Ok(Json(state.event_repository.get(id).await?))
}

pub async fn update_event(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEventRequest>,
) -> ApiResult<Json<Event>> {
    check_window(payload.starts_at, payload.ends_at)?;

    let update = UpdateEventRequest {
        title: replacement_text("Title", payload.title.as_deref(), TITLE_MAX)?,
        description: replacement_text("Description", payload.description.as_deref(), DESCRIPTION_MAX)?,
        location: replacement_text("Location", payload.location.as_deref(), SHORT_TEXT_MAX)?,
        category: optional_text("Category", payload.category.as_deref(), CATEGORY_MAX)?,
        starts_at: payload.starts_at,
        ends_at: payload.ends_at,
        capacity: check_capacity(payload.capacity)?,
    };

    Ok(Json(state.event_repository.update(id, user.id, &update).await?))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    state.event_repository.delete(id, user.id).await?;
    Ok(Json(json!({ "message": "Event deleted" })))
}

/// Sign up for an event
pub async fn join_event(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Event>> {
    let outcome = state.event_repository.join(id, user.id).await?;
    state.push_notifications(outcome.notifications).await;

    Ok(Json(outcome.value))
}

pub async fn leave_event(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Event>> {
    Ok(Json(state.event_repository.leave(id, user.id).await?))
}

pub async fn attendees(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Attendee>>> {
    Ok(Json(state.event_repository.attendees(id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn picnic(starts_at: DateTime<Utc>) -> CreateEventRequest {
        CreateEventRequest {
            title: "Park picnic".to_string(),
            description: "Bring a dish to share".to_string(),
            location: "Riverside park".to_string(),
            category: None,
            starts_at,
            ends_at: None,
            capacity: Some(30),
        }
    }

    #[test]
    fn test_event_cannot_end_before_it_starts() {
        let starts_at = Utc::now() + Duration::days(2);
        let result = validate_new_event(CreateEventRequest {
            ends_at: Some(starts_at - Duration::hours(1)),
            ..picnic(starts_at)
        });

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_capacity_must_be_positive() {
        assert!(check_capacity(Some(0)).is_err());
        assert!(check_capacity(Some(-3)).is_err());
        assert_eq!(check_capacity(Some(12)).unwrap(), Some(12));
        assert_eq!(check_capacity(None).unwrap(), None);
    }

    #[test]
    fn test_valid_event_passes() {
        let starts_at = Utc::now() + Duration::days(2);
        let payload = validate_new_event(CreateEventRequest {
            ends_at: Some(starts_at + Duration::hours(3)),
            ..picnic(starts_at)
        })
        .unwrap();

        assert_eq!(payload.capacity, Some(30));
        assert_eq!(payload.location, "Riverside park");
    }
}
