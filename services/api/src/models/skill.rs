//! Shared skills and skill requests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Page;
use crate::lifecycle::RequestStatus;

text_enum! {
    /// Whether a skill can currently be booked
    pub enum SkillAvailability {
        Available => "available",
        Booked => "booked",
        Unavailable => "unavailable",
    }
}

text_enum! {
    pub enum SkillLevel {
        Beginner => "beginner",
        Intermediate => "intermediate",
        Expert => "expert",
    }
}

/// Skill row joined with the provider's name
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Skill {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub title: String,
    pub description: String,
    pub category: String,
    #[sqlx(try_from = "String")]
    pub level: SkillLevel,
    #[sqlx(try_from = "String")]
    pub availability: SkillAvailability,
    pub booked_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request for offering a new skill
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSkillRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    pub level: Option<SkillLevel>,
}

/// Partial update by the provider
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSkillRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub level: Option<SkillLevel>,
    /// Only `available` and `unavailable` may be set by hand
    pub availability: Option<SkillAvailability>,
}

/// Query parameters for skill listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkillQuery {
    pub category: Option<String>,
    pub availability: Option<SkillAvailability>,
    pub user_id: Option<Uuid>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl SkillQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.limit)
    }
}

/// Skill request row joined with the skill title and both names
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SkillRequest {
    pub id: Uuid,
    pub skill_id: Uuid,
    pub skill_title: String,
    pub requester_id: Uuid,
    pub requester_name: String,
    pub provider_id: Uuid,
    pub provider_name: String,
    pub message: Option<String>,
    pub proposed_time: Option<DateTime<Utc>>,
    #[sqlx(try_from = "String")]
    pub status: RequestStatus,
    pub requester_reviewed: bool,
    pub provider_reviewed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to book a skill
#[derive(Debug, Clone, Deserialize)]
pub struct NewSkillRequest {
    pub skill_id: Uuid,
    pub message: Option<String>,
    pub proposed_time: Option<DateTime<Utc>>,
}
