use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// The Issue model. Timestamps are naive UTC and serialize as ISO-8601
/// strings without an offset suffix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub description: Option<String>,

    /// e.g. "Open", "In Progress", "Closed"
    pub status: String,

    /// e.g. "Low", "Medium", "High"
    pub priority: String,

    pub assignee: Option<String>,

    #[serde(rename = "createdAt")]
    pub created_at: NaiveDateTime,
    #[serde(rename = "updatedAt")]
    pub updated_at: NaiveDateTime,
}

/// Request payload for creating an issue. Only `title` is required;
/// everything else falls back to the model defaults.
#[derive(Debug, Deserialize)]
pub struct CreateIssueRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
}

/// Request payload for updating an issue. Any subset of fields may be set.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateIssueRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
}

/// Envelope returned by the listing endpoint: one page of issues plus
/// pagination metadata.
#[derive(Debug, Serialize, Deserialize)]
pub struct IssueListResponse {
    pub data: Vec<Issue>,
    pub total: i64,
    pub page: i64,
    #[serde(rename = "pageSize")]
    pub page_size: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}
