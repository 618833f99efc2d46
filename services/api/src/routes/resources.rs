//! Lendable resources

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
    middleware::AuthUser,
    models::{
        ListResponse, PageQuery,
        resource::{CreateResourceRequest, Resource, ResourceQuery, UpdateResourceRequest},
    },
    realtime::ServerEvent,
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
            .route("/resources", post(create_resource))
            .route("/resources/mine", get(my_resources))
            .route("/resources/:id", put(update_resource).delete(delete_resource)),
    );

    Router::new()
        .route("/resources", get(list_resources))
        .route("/resources/:id", get(get_resource))
        .merge(protected)
}

fn validate_new_resource(payload: CreateResourceRequest) -> ApiResult<CreateResourceRequest> {
    Ok(CreateResourceRequest {
        title: required_text("Title", &payload.title, TITLE_MAX)?,
        description: required_text("Description", &payload.description, DESCRIPTION_MAX)?,
        category: required_text("Category", &payload.category, CATEGORY_MAX)?,
        condition: optional_text("Condition", payload.condition.as_deref(), CATEGORY_MAX)?,
        location: optional_text("Location", payload.location.as_deref(), SHORT_TEXT_MAX)?,
        image_url: optional_text("Image URL", payload.image_url.as_deref(), SHORT_TEXT_MAX)?,
    })
}

fn validate_resource_update(payload: UpdateResourceRequest) -> ApiResult<UpdateResourceRequest> {
    Ok(UpdateResourceRequest {
        title: replacement_text("Title", payload.title.as_deref(), TITLE_MAX)?,
        description: replacement_text("Description", payload.description.as_deref(), DESCRIPTION_MAX)?,
        category: replacement_text("Category", payload.category.as_deref(), CATEGORY_MAX)?,
        condition: optional_text("Condition", payload.condition.as_deref(), CATEGORY_MAX)?,
        location: optional_text("Location", payload.location.as_deref(), SHORT_TEXT_MAX)?,
        image_url: optional_text("Image URL", payload.image_url.as_deref(), SHORT_TEXT_MAX)?,
        availability: payload.availability,
    })
}

/// List a new resource
pub async fn create_resource(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateResourceRequest>,
) -> ApiResult<(StatusCode, Json<Resource>)> {
    let payload = validate_new_resource(payload)?;
    let resource = state.resource_repository.create(user.id, &payload).await?;

    Ok((StatusCode::CREATED, Json(resource)))
}

/// Browse resources with optional filters
pub async fn list_resources(
    State(state): State<AppState>,
    Query(query): Query<ResourceQuery>,
) -> ApiResult<Json<ListResponse<Resource>>> {
    let (items, total) = state.resource_repository.list(&query).await?;
    Ok(Json(ListResponse::new(items, query.page(), total)))
}

/// Resources owned by the caller
pub async fn my_resources(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<ListResponse<Resource>>> {
    let query = ResourceQuery {
        owner_id: Some(user.id),
        page: page.page,
        limit: page.limit,
        ..Default::default()
    };
    let (items, total) = state.resource_repository.list(&query).await?;

    Ok(Json(ListResponse::new(items, query.page(), total)))
}

pub async fn get_resource(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Resource>> {
    Ok(Json(state.resource_repository.get(id).await?))
}

/// Owner's edit; availability changes are broadcast
pub async fn update_resource(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateResourceRequest>,
) -> ApiResult<Json<Resource>> {
    let update = validate_resource_update(payload)?;
    let (resource, availability_changed) = state
        .resource_repository
        .update(id, user.id, &update)
        .await?;

    if availability_changed {
        state
            .hub
            .broadcast(&ServerEvent::ResourceUpdated(resource.clone()))
            .await;
    }

    Ok(Json(resource))
}

pub async fn delete_resource(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    state.resource_repository.delete(id, user.id).await?;
    Ok(Json(json!({ "message": "Resource deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ApiError, models::resource::ResourceAvailability, test_support::test_state};

    fn drill() -> CreateResourceRequest {
        CreateResourceRequest {
            title: " Cordless drill ".to_string(),
            description: "18V, two batteries".to_string(),
            category: "tools".to_string(),
            condition: Some("  ".to_string()),
            location: None,
            image_url: None,
        }
    }

    #[test]
    fn test_new_resource_is_normalized() {
        let payload = validate_new_resource(drill()).unwrap();
        assert_eq!(payload.title, "Cordless drill");
        assert_eq!(payload.condition, None);
    }

    #[test]
    fn test_update_rejects_blank_title() {
        let result = validate_resource_update(UpdateResourceRequest {
            title: Some("   ".to_string()),
            availability: Some(ResourceAvailability::Unavailable),
            ..Default::default()
        });

        assert!(matches!(result, Err(ApiError::BadRequest(msg)) if msg == "Title is required"));
    }

    #[tokio::test]
    async fn test_create_rejects_missing_category_before_touching_the_database() {
        let result = create_resource(
            State(test_state()),
            Extension(AuthUser { id: Uuid::new_v4() }),
            Json(CreateResourceRequest {
                category: String::new(),
                ..drill()
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::BadRequest(msg)) if msg == "Category is required"));
    }
}
