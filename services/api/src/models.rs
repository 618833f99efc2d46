//! API models for rows, request payloads and response envelopes

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod event;
pub mod help_request;
pub mod message;
pub mod notification;
pub mod resource;
pub mod review;
pub mod skill;
pub mod user;
pub mod user_status;

/// A TEXT column held a value the enum does not know
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Resolved pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    /// Clamp raw query values: page starts at 1, limit is 1..=100
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.limit)
    }
}

/// Query parameters for endpoints that only paginate
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.limit)
    }
}

/// Paginated list envelope
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
}

impl<T> ListResponse<T> {
    pub fn new(items: Vec<T>, page: Page, total: i64) -> Self {
        Self {
            items,
            page: page.page,
            limit: page.limit,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_and_clamping() {
        assert_eq!(Page::new(None, None), Page { page: 1, limit: 20 });
        assert_eq!(Page::new(Some(0), Some(0)), Page { page: 1, limit: 1 });
        assert_eq!(Page::new(Some(3), Some(500)), Page { page: 3, limit: 100 });
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(Page::new(Some(1), Some(10)).offset(), 0);
        assert_eq!(Page::new(Some(4), Some(25)).offset(), 75);
    }

    #[test]
    fn test_list_response_serializes_window() {
        let response = ListResponse::new(vec![1, 2], Page::new(Some(2), Some(2)), 6);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["page"], 2);
        assert_eq!(json["limit"], 2);
        assert_eq!(json["total"], 6);
        assert_eq!(json["items"].as_array().map(Vec::len), Some(2));
    }
}
