//! In-app notifications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Page;

text_enum! {
    pub enum NotificationType {
        Message => "message",
        BorrowRequest => "borrow_request",
        BorrowAccepted => "borrow_accepted",
        BorrowDeclined => "borrow_declined",
        BorrowCompleted => "borrow_completed",
        SkillRequest => "skill_request",
        SkillAccepted => "skill_accepted",
        SkillDeclined => "skill_declined",
        SkillCompleted => "skill_completed",
        HelpOffer => "help_offer",
        HelpCompleted => "help_completed",
        Review => "review",
        EventJoin => "event_join",
    }
}

/// Notification row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(rename = "type", try_from = "String")]
    pub kind: NotificationType,
    pub message: String,
    pub related_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A notification about to be stored
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationType,
    pub message: String,
    pub related_id: Option<Uuid>,
}

impl NewNotification {
    pub fn new(user_id: Uuid, kind: NotificationType, message: impl Into<String>, related_id: Uuid) -> Self {
        Self {
            user_id,
            kind,
            message: message.into(),
            related_id: Some(related_id),
        }
    }
}

/// Query parameters for notification listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationQuery {
    pub unread_only: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl NotificationQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str =
        include_str!("../../../../libs/common/migrations/20240601000000_community_schema.sql");

    #[test]
    fn test_schema_accepts_every_notification_type() {
        let table = SCHEMA
            .split("CREATE TABLE IF NOT EXISTS notifications")
            .nth(1)
            .and_then(|rest| rest.split(");").next())
            .expect("notifications table");
        let check = table
            .split("CHECK (type IN (")
            .nth(1)
            .and_then(|rest| rest.split("))").next())
            .expect("type check");

        let listed: Vec<&str> = check
            .split(',')
            .map(|value| value.trim().trim_matches('\''))
            .collect();

        assert_eq!(listed.len(), NotificationType::ALL.len());
        for kind in NotificationType::ALL {
            assert!(listed.contains(&kind.as_str()), "{} not allowed by schema", kind);
        }
    }
}
