//! Member profiles and search

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use super::require_auth;
use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::{
        ListResponse,
        review::ReceivedReviews,
        user::{Profile, PublicProfile, UpdateProfileRequest, UserSearchQuery},
    },
    state::AppState,
    validation::{SHORT_TEXT_MAX, optional_text, required_text},
};

const BIO_MAX: usize = 500;
const MAX_SKILLS: usize = 20;
const SKILL_MAX: usize = 50;

pub fn router(state: &AppState) -> Router<AppState> {
    let protected = require_auth(
        state,
        Router::new().route("/users/me", get(me).put(update_me)),
    );

    Router::new()
        .route("/users", get(search))
        .route("/users/:id", get(profile))
        .route("/users/:id/reviews", get(reviews))
        .merge(protected)
}

/// Current user's own profile
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(state.user_repository.profile(user.id).await?))
}

fn validate_profile_update(payload: UpdateProfileRequest) -> ApiResult<UpdateProfileRequest> {
    let name = match payload.name.as_deref() {
        Some(name) => {
            let name = required_text("Name", name, 50)?;
            if name.chars().count() < 2 {
                return Err(ApiError::BadRequest(
                    "Name must be at least 2 characters long".to_string(),
                ));
            }
            Some(name)
        }
        None => None,
    };

    let skills = match payload.skills {
        Some(skills) => {
            if skills.len() > MAX_SKILLS {
                return Err(ApiError::BadRequest(format!(
                    "At most {} skills can be listed",
                    MAX_SKILLS
                )));
            }
            let mut cleaned = Vec::with_capacity(skills.len());
            for skill in &skills {
                if let Some(skill) = optional_text("Skill", Some(skill.as_str()), SKILL_MAX)? {
                    if !cleaned.contains(&skill) {
                        cleaned.push(skill);
                    }
                }
            }
            Some(cleaned)
        }
        None => None,
    };

    Ok(UpdateProfileRequest {
        name,
        bio: optional_text("Bio", payload.bio.as_deref(), BIO_MAX)?,
        location: optional_text("Location", payload.location.as_deref(), SHORT_TEXT_MAX)?,
        skills,
        avatar_url: optional_text("Avatar URL", payload.avatar_url.as_deref(), SHORT_TEXT_MAX)?,
    })
}

/// Update name, bio, location, skills or avatar
pub async fn update_me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<Json<Profile>> {
    let update = validate_profile_update(payload)?;
    let profile = state.user_repository.update_profile(user.id, &update).await?;

    Ok(Json(profile))
}

/// Public profile of any member
pub async fn profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PublicProfile>> {
    Ok(Json(state.user_repository.public_profile(id).await?))
}

/// Search members by name or skill
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<UserSearchQuery>,
) -> ApiResult<Json<ListResponse<PublicProfile>>> {
    let page = query.page();
    let (items, total) = state
        .user_repository
        .search(query.search.as_deref(), page)
        .await?;

    Ok(Json(ListResponse::new(items, page, total)))
}

/// Borrow and skill reviews a member has received
pub async fn reviews(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReceivedReviews>> {
    let profile = state.user_repository.public_profile(id).await?;
    let borrow_reviews = state.review_repository.for_user(id).await?;
    let skill_reviews = state.skill_review_repository.for_user(id).await?;

    Ok(Json(ReceivedReviews {
        user_id: profile.id,
        trust_score: profile.trust_score,
        total_reviews: profile.total_reviews,
        borrow_reviews,
        skill_reviews,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_update_trims_and_dedupes_skills() {
        let update = validate_profile_update(UpdateProfileRequest {
            name: Some("  Grace ".to_string()),
            skills: Some(vec![
                " plumbing ".to_string(),
                "plumbing".to_string(),
                "  ".to_string(),
                "baking".to_string(),
            ]),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(update.name.as_deref(), Some("Grace"));
        assert_eq!(
            update.skills,
            Some(vec!["plumbing".to_string(), "baking".to_string()])
        );
        assert_eq!(update.bio, None);
    }

    #[test]
    fn test_profile_update_rejects_short_name() {
        let result = validate_profile_update(UpdateProfileRequest {
            name: Some("G".to_string()),
            ..Default::default()
        });

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_profile_update_limits_skill_count() {
        let result = validate_profile_update(UpdateProfileRequest {
            skills: Some((0..=MAX_SKILLS).map(|i| format!("skill {}", i)).collect()),
            ..Default::default()
        });

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
