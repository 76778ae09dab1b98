//! Scan log entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::scan_log::{ScanLog, ScanStatus};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the scan_logs table.
#[derive(Debug, Clone, FromRow)]
pub struct ScanLogEntity {
    pub id: Uuid,
    pub event_id: Uuid,
    pub scanner_id: Uuid,
    pub student_id: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub is_override: bool,
    pub override_reason: Option<String>,
    pub last_scan_at: Option<DateTime<Utc>>,
}

impl From<ScanLogEntity> for ScanLog {
    fn from(entity: ScanLogEntity) -> Self {
        let status = entity.status.parse().unwrap_or_else(|_| {
            tracing::warn!(scan_id = %entity.id, status = %entity.status, "Unrecognised scan status");
            ScanStatus::Error
        });
        Self {
            id: entity.id,
            event_id: entity.event_id,
            scanner_id: entity.scanner_id,
            student_id: entity.student_id,
            status,
            timestamp: entity.timestamp,
            is_override: entity.is_override,
            override_reason: entity.override_reason,
            last_scan_at: entity.last_scan_at,
        }
    }
}
