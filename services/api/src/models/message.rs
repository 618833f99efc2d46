//! Direct messages between members

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Message row joined with the sender's name
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub recipient_id: Uuid,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /messages`
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub recipient_id: Uuid,
    pub content: String,
}

/// Latest message with one partner plus unread count
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ConversationSummary {
    pub partner_id: Uuid,
    pub partner_name: String,
    pub partner_avatar_url: Option<String>,
    pub last_message_id: Uuid,
    pub last_message: String,
    pub last_sender_id: Uuid,
    pub last_message_at: DateTime<Utc>,
    pub unread_count: i64,
}
