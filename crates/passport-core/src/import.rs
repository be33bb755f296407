//! Bulk import job types shared by the API client and the CLI.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server-side lifecycle of a bulk import job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportJobStatus {
    Pending,
    Validating,
    Validated,
    Approving,
    Completed,
    Failed,
    Cancelled,
}

impl ImportJobStatus {
    /// No further review, approval or cancellation is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Staging rows and validation errors are final and can be reviewed.
    #[must_use]
    pub fn is_reviewable(self) -> bool {
        matches!(self, Self::Validated)
    }
}

impl std::fmt::Display for ImportJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Validating => "validating",
            Self::Validated => "validated",
            Self::Approving => "approving",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
    pub id: Uuid,
    pub status: ImportJobStatus,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub total_rows: u32,
    #[serde(default)]
    pub valid_rows: u32,
    #[serde(default)]
    pub error_rows: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Valid,
    Error,
}

/// One uploaded spreadsheet row held pending before commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingRow {
    pub row_number: u32,
    pub data: BTreeMap<String, String>,
    pub status: RowStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRowError {
    pub row_number: u32,
    #[serde(default)]
    pub field: Option<String>,
    pub message: String,
}

impl std::fmt::Display for ImportRowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "row {}: {field}: {}", self.row_number, self.message),
            None => write!(f, "row {}: {}", self.row_number, self.message),
        }
    }
}

/// A page of results from a paginated endpoint. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u32,
}

impl<T> Page<T> {
    /// False for a zero `page_size`, which can never advance.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page_size > 0
            && u64::from(self.page) * u64::from(self.page_size) < u64::from(self.total)
    }

    #[must_use]
    pub fn total_pages(&self) -> u32 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(self.page_size)
    }
}
