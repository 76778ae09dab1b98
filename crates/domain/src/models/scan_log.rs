//! Scan ledger domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::event::EventStatus;

/// Outcome recorded for a scan attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    Success,
    Duplicate,
    DuplicateOverride,
    Error,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Success => "SUCCESS",
            ScanStatus::Duplicate => "DUPLICATE",
            ScanStatus::DuplicateOverride => "DUPLICATE_OVERRIDE",
            ScanStatus::Error => "ERROR",
        }
    }

    /// Accepted scans count toward attendance and toward duplicate detection.
    pub fn is_accepted(&self) -> bool {
        matches!(self, ScanStatus::Success | ScanStatus::DuplicateOverride)
    }
}

impl FromStr for ScanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SUCCESS" => Ok(ScanStatus::Success),
            "DUPLICATE" => Ok(ScanStatus::Duplicate),
            "DUPLICATE_OVERRIDE" => Ok(ScanStatus::DuplicateOverride),
            "ERROR" => Ok(ScanStatus::Error),
            _ => Err(format!("Invalid scan status: {}", s)),
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recorded scan. Rows are insert-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanLog {
    pub id: Uuid,
    pub event_id: Uuid,
    pub scanner_id: Uuid,
    pub student_id: String,
    pub status: ScanStatus,
    pub timestamp: DateTime<Utc>,
    pub is_override: bool,
    pub override_reason: Option<String>,
    /// The prior accepted scan a duplicate decision referred to.
    pub last_scan_at: Option<DateTime<Utc>>,
}

/// A scan about to be appended to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScanLog {
    pub event_id: Uuid,
    pub scanner_id: Uuid,
    pub student_id: String,
    pub status: ScanStatus,
    pub timestamp: DateTime<Utc>,
    pub is_override: bool,
    pub override_reason: Option<String>,
    pub last_scan_at: Option<DateTime<Utc>>,
}

/// Request payload for submitting a scan.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateScanRequest {
    pub event_id: Uuid,

    #[validate(custom(function = "shared::validation::validate_student_id"))]
    pub student_id: String,

    #[serde(default, rename = "override")]
    pub is_override: bool,

    #[validate(length(max = 500, message = "Override reason must be at most 500 characters"))]
    pub override_reason: Option<String>,
}

/// Response for a submitted scan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    #[serde(flatten)]
    pub scan: ScanLog,
    pub duplicate_count: usize,
    pub event_status: EventStatus,
    pub message: String,
}

/// Query parameters for listing scans.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListScansQuery {
    pub event_id: Option<Uuid>,
    pub scanner_id: Option<Uuid>,
    pub status: Option<ScanStatus>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// Pagination info for scan listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanPagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Response for GET /api/v1/scans
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListScansResponse {
    pub scans: Vec<ScanLog>,
    pub pagination: ScanPagination,
}
