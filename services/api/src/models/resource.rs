//! Lendable resources and borrow requests

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Page;
use crate::lifecycle::RequestStatus;

text_enum! {
    /// Whether a resource can currently be borrowed
    pub enum ResourceAvailability {
        Available => "available",
        Borrowed => "borrowed",
        Unavailable => "unavailable",
    }
}

/// Resource row joined with its owner's name
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Resource {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_name: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    #[sqlx(try_from = "String")]
    pub availability: ResourceAvailability,
    pub borrowed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request for listing a new resource
#[derive(Debug, Clone, Deserialize)]
pub struct CreateResourceRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
}

/// Partial update by the owner
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateResourceRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    /// Only `available` and `unavailable` may be set by hand
    pub availability: Option<ResourceAvailability>,
}

/// Query parameters for resource listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceQuery {
    pub category: Option<String>,
    pub availability: Option<ResourceAvailability>,
    pub owner_id: Option<Uuid>,
    /// Matches title or description
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ResourceQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.limit)
    }
}

/// Borrow request row joined with the resource title and both names
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BorrowRequest {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub resource_title: String,
    pub borrower_id: Uuid,
    pub borrower_name: String,
    pub owner_id: Uuid,
    pub owner_name: String,
    pub message: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[sqlx(try_from = "String")]
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to borrow a resource
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBorrowRequest {
    pub resource_id: Uuid,
    pub message: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}
