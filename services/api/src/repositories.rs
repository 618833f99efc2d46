//! Repositories for database operations
//!
//! Multi-row writes (request lifecycles, reviews, event attendance) run in a
//! single transaction and hand back the notifications they stored so the
//! caller can push them once the transaction has committed.

use sqlx::{Postgres, QueryBuilder};

use crate::models::{Page, notification::Notification};

pub mod borrow_request;
pub mod event;
pub mod help_request;
pub mod message;
pub mod notification;
pub mod resource;
pub mod review;
pub mod skill;
pub mod skill_request;
pub mod skill_review;
pub mod user;
pub mod user_status;

pub use borrow_request::BorrowRequestRepository;
pub use event::EventRepository;
pub use help_request::HelpRequestRepository;
pub use message::MessageRepository;
pub use notification::NotificationRepository;
pub use resource::ResourceRepository;
pub use review::ReviewRepository;
pub use skill::SkillRepository;
pub use skill_request::SkillRequestRepository;
pub use skill_review::SkillReviewRepository;
pub use user::UserRepository;
pub use user_status::UserStatusRepository;

/// Result of a committed write plus the notifications it produced
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub notifications: Vec<Notification>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, notifications: Vec<Notification>) -> Self {
        Self {
            value,
            notifications,
        }
    }
}

/// Which side of a two-party request a listing is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Requests addressed to the user as owner or provider
    Incoming,
    /// Requests the user has made
    Outgoing,
}

/// `%term%` pattern for ILIKE filters, with LIKE wildcards escaped
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Append `ORDER BY`, `LIMIT` and `OFFSET`
pub(crate) fn push_page(builder: &mut QueryBuilder<'_, Postgres>, order_by: &str, page: Page) {
    builder
        .push(" ORDER BY ")
        .push(order_by)
        .push(" LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" drill "), "%drill%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
    }
}
