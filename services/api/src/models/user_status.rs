//! Presence models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Online flag and last activity of a user
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserStatus {
    pub user_id: Uuid,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
}

/// Body of `PUT /user-status`
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub is_online: bool,
}
