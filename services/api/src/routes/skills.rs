//! Skills members offer to teach or help with

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
        skill::{CreateSkillRequest, Skill, SkillQuery, UpdateSkillRequest},
    },
    state::AppState,
    validation::{CATEGORY_MAX, DESCRIPTION_MAX, TITLE_MAX, replacement_text, required_text},
};

pub fn router(state: &AppState) -> Router<AppState> {
    let protected = require_auth(
        state,
        Router::new()
            .route("/skills", post(create_skill))
            .route("/skills/mine", get(my_skills))
            .route("/skills/:id", put(update_skill).delete(delete_skill)),
    );

    Router::new()
        .route("/skills", get(list_skills))
        .route("/skills/:id", get(get_skill))
        .merge(protected)
}

pub async fn create_skill(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateSkillRequest>,
) -> ApiResult<(StatusCode, Json<Skill>)> {
    let payload = CreateSkillRequest {
        title: required_text("Title", &payload.title, TITLE_MAX)?,
        description: required_text("Description", &payload.description, DESCRIPTION_MAX)?,
        category: required_text("Category", &payload.category, CATEGORY_MAX)?,
        level: payload.level,
    };

    let skill = state.skill_repository.create(user.id, &payload).await?;
    Ok((StatusCode::CREATED, Json(skill)))
}

/// Browse skills by category, availability, provider or keyword
pub async fn list_skills(
    State(state): State<AppState>,
    Query(query): Query<SkillQuery>,
) -> ApiResult<Json<ListResponse<Skill>>> {
    let (items, total) = state.skill_repository.list(&query).await?;
    Ok(Json(ListResponse::new(items, query.page(), total)))
}

pub async fn my_skills(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<ListResponse<Skill>>> {
    let query = SkillQuery {
        user_id: Some(user.id),
        page: page.page,
        limit: page.limit,
        ..Default::default()
    };
    let (items, total) = state.skill_repository.list(&query).await?;

    Ok(Json(ListResponse::new(items, query.page(), total)))
}

pub async fn get_skill(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Skill>> {
    Ok(Json(state.skill_repository.get(id).await?))
}

pub async fn update_skill(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSkillRequest>,
) -> ApiResult<Json<Skill>> {
    let update = UpdateSkillRequest {
        title: replacement_text("Title", payload.title.as_deref(), TITLE_MAX)?,
        description: replacement_text("Description", payload.description.as_deref(), DESCRIPTION_MAX)?,
        category: replacement_text("Category", payload.category.as_deref(), CATEGORY_MAX)?,
        level: payload.level,
        availability: payload.availability,
    };

    Ok(Json(state.skill_repository.update(id, user.id, &update).await?))
}

pub async fn delete_skill(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    state.skill_repository.delete(id, user.id).await?;
    Ok(Json(json!({ "message": "Skill deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ApiError, test_support::test_state};

    #[tokio::test]
    async fn test_blank_title_update_is_rejected() {
        let result = update_skill(
            State(test_state()),
            Extension(AuthUser { id: Uuid::new_v4() }),
            Path(Uuid::new_v4()),
            Json(UpdateSkillRequest {
                title: Some("  ".to_string()),
                ..Default::default()
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::BadRequest(msg)) if msg == "Title is required"));
    }

    #[tokio::test]
    async fn test_overlong_category_is_rejected() {
        let result = create_skill(
            State(test_state()),
            Extension(AuthUser { id: Uuid::new_v4() }),
            Json(CreateSkillRequest {
                title: "Bread baking".to_string(),
                description: "Sourdough basics".to_string(),
                category: "c".repeat(CATEGORY_MAX + 1),
                level: None,
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
