//! User profile models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Page;

/// Profile as seen by its owner
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub skills: Vec<String>,
    pub avatar_url: Option<String>,
    pub trust_score: f64,
    pub total_reviews: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile as seen by other members; no email
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PublicProfile {
    pub id: Uuid,
    pub name: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub skills: Vec<String>,
    pub avatar_url: Option<String>,
    pub trust_score: f64,
    pub total_reviews: i32,
    pub created_at: DateTime<Utc>,
}

/// Partial profile update; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub skills: Option<Vec<String>>,
    pub avatar_url: Option<String>,
}

/// Query parameters for member search
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserSearchQuery {
    /// Matches name or any listed skill
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl UserSearchQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.limit)
    }
}
