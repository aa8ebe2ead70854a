//! The DynamicQuery record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generation status. There is no failed state: a failed generation leaves
/// the record `InProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    InProgress,
    Complete,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::InProgress => "in_progress",
            QueryStatus::Complete => "complete",
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(QueryStatus::InProgress),
            "complete" => Ok(QueryStatus::Complete),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

/// A named natural-language prompt and, once generated, its SQL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicQuery {
    pub id: Uuid,
    pub name: String,
    pub prompt: String,
    /// Generated SQL; `None` until the first successful generation.
    pub query: Option<String>,
    /// Provider correlation id of the last successful generation, used to
    /// continue the provider conversation on regeneration.
    pub response_id: Option<String>,
    pub status: QueryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DynamicQuery {
    pub fn is_complete(&self) -> bool {
        self.status == QueryStatus::Complete
    }
}
