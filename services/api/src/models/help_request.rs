//! Help requests posted by members

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Page;
use crate::lifecycle::HelpStatus;

text_enum! {
    pub enum Urgency {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

/// Help request row joined with the requester's name
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct HelpRequest {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub requester_name: String,
    pub helper_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub category: String,
    #[sqlx(try_from = "String")]
    pub urgency: Urgency,
    pub location: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: HelpStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /help-requests`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateHelpRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    pub urgency: Option<Urgency>,
    pub location: Option<String>,
}

/// Partial update by the requester while the request is open
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateHelpRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub urgency: Option<Urgency>,
    pub location: Option<String>,
}

/// Query parameters for help request listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HelpRequestQuery {
    pub status: Option<HelpStatus>,
    pub category: Option<String>,
    pub urgency: Option<Urgency>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl HelpRequestQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.limit)
    }
}
