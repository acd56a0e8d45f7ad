//! ServiceDesk Plus data models
//!
//! Upstream records stay as raw `serde_json::Value`; their shape differs
//! between on-premises builds. Only the views handed to callers are typed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ServiceError};

/// Largest page a caller may ask for
pub const MAX_PAGE_SIZE: u32 = 200;

/// Smallest block pulled when filtering has to happen locally
pub const MIN_RAW_PULL: u32 = 200;

/// "List my tickets" request, validated on construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketQuery {
    requester_email: String,
    page: u32,
    page_size: u32,
}

impl TicketQuery {
    /// Build a query; `page >= 1`, `1 <= page_size <= 200`, non-blank email
    pub fn new(requester_email: impl Into<String>, page: u32, page_size: u32) -> Result<Self> {
        let requester_email = requester_email.into();

        if requester_email.trim().is_empty() {
            return Err(ServiceError::validation("requester email must not be empty"));
        }

        if page < 1 {
            return Err(ServiceError::validation("page must be >= 1"));
        }

        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(ServiceError::validation(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        Ok(Self {
            requester_email,
            page,
            page_size,
        })
    }

    pub fn requester_email(&self) -> &str {
        &self.requester_email
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// One-based index of the first row on this page
    pub fn start_index(&self) -> u64 {
        1 + self.offset() as u64
    }

    /// Zero-based offset of the first row on this page
    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.page_size as usize
    }

    /// Rows pulled unfiltered when the upstream cannot filter by requester
    pub fn raw_pull_size(&self) -> u32 {
        (self.page_size * 5).max(MIN_RAW_PULL)
    }
}

/// Stable, minimal view of one ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTicket {
    pub display_id: String,
    pub subject: Option<String>,
    pub status: Option<String>,
    pub status_id: Option<Value>,
    pub created_time: Option<String>,
    pub requester_email: Option<String>,
    pub technician: Option<String>,
    pub site: Option<String>,
}

/// Paging block of a ticket listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListInfo {
    pub row_count: usize,
    pub start_index: u64,
    pub get_total_count: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_more_rows: Option<bool>,
}

/// One page of a requester's tickets; `row_count == requests.len()`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub list_info: ListInfo,
    pub requests: Vec<Value>,
}

/// Result of a status lookup by display identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketStatus {
    pub ticket: NormalizedTicket,
    pub raw: Value,
}

/// Active announcement, HTML flattened to text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub title: String,
    pub description_text: String,
    pub description_html_present: bool,
    pub status: Value,
    pub start_time: Value,
    pub end_time: Value,
    pub id: Value,
}

/// Announcement listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcements {
    pub announcements: Vec<Announcement>,
}

/// Fields a caller supplies to open a ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    pub requester_email: String,
    pub subject: String,
    pub description: String,
}

impl NewTicket {
    pub fn new(
        requester_email: impl Into<String>,
        subject: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            requester_email: requester_email.into(),
            subject: subject.into(),
            description: description.into(),
        }
    }
}
