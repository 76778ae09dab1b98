//! Scan ingestion over a storage seam.
//!
//! The check-then-insert sequence runs against a [`ScanLedger`] scoped to one
//! (event, student) pair. Implementations hold whatever mutual exclusion the
//! store needs so that two concurrent scans of the same student serialize.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::event::{Event, EventStatus};
use crate::models::scan_log::{NewScanLog, ScanLog, ScanStatus};
use crate::services::event_status::resolve_status;
use crate::services::scan_admission::{AdmissionDecision, ScanAdmissionEngine, ScanCandidate};

/// Persistence failure during ingestion. Nothing was recorded.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage query failed: {0}")]
    Query(String),
}

/// Append-only access to the scan ledger for one (event, student) scope.
#[async_trait]
pub trait ScanLedger: Send {
    /// Prior scans for the pair, ascending by timestamp.
    async fn find_scans_for(
        &mut self,
        event_id: Uuid,
        student_id: &str,
    ) -> Result<Vec<ScanLog>, StorageError>;

    /// Appends a scan. Implementations commit their scope here.
    async fn insert_scan_log(&mut self, record: NewScanLog) -> Result<ScanLog, StorageError>;
}

/// Error type for scan ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Student ID must not be empty")]
    EmptyStudentId,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A scan submitted by a scanner.
#[derive(Debug, Clone)]
pub struct ScanAttempt {
    pub scanner_id: Uuid,
    pub student_id: String,
    /// Set only when the caller is allowed to override duplicates.
    pub is_override: bool,
    pub override_reason: Option<String>,
}

/// Why an event refused a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanRejection {
    ScanningDisabled,
    EventNotActive(EventStatus),
}

impl ScanRejection {
    pub fn message(&self) -> String {
        match self {
            ScanRejection::ScanningDisabled => "Scanning is disabled for this event".to_string(),
            ScanRejection::EventNotActive(EventStatus::Upcoming) => {
                "Event has not started yet".to_string()
            }
            ScanRejection::EventNotActive(EventStatus::Completed) => {
                "Event has already ended".to_string()
            }
            ScanRejection::EventNotActive(status) => format!("Event is not active ({})", status),
        }
    }
}

/// Result of ingesting one scan attempt.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub log: ScanLog,
    pub event_status: EventStatus,
    /// `None` when the event refused the scan before admission ran.
    pub decision: Option<AdmissionDecision>,
    pub rejection: Option<ScanRejection>,
}

impl ScanOutcome {
    pub fn duplicate_count(&self) -> usize {
        self.decision.map(|d| d.duplicate_count).unwrap_or(0)
    }

    pub fn message(&self) -> String {
        if let Some(rejection) = self.rejection {
            return rejection.message();
        }
        match self.log.status {
            ScanStatus::Success => "Check-in recorded".to_string(),
            ScanStatus::Duplicate => "Student already checked in".to_string(),
            ScanStatus::DuplicateOverride => "Duplicate accepted by override".to_string(),
            ScanStatus::Error => "Scan could not be accepted".to_string(),
        }
    }
}

/// Records one scan attempt against `event` at `now`.
///
/// Attempts on events that are not accepting scans are recorded with status
/// ERROR and carry a rejection. Accepted attempts go through the admission
/// engine under the ledger's scope.
pub async fn ingest<L>(
    ledger: &mut L,
    engine: &ScanAdmissionEngine,
    event: &Event,
    attempt: ScanAttempt,
    now: DateTime<Utc>,
) -> Result<ScanOutcome, IngestError>
where
    L: ScanLedger + ?Sized,
{
    let student_id = attempt.student_id.trim();
    if student_id.is_empty() {
        return Err(IngestError::EmptyStudentId);
    }

    let resolution = resolve_status(&event.schedule(), now);
    let rejection = if !event.scanning_enabled {
        Some(ScanRejection::ScanningDisabled)
    } else if !resolution.is_active {
        Some(ScanRejection::EventNotActive(resolution.status))
    } else {
        None
    };

    if let Some(rejection) = rejection {
        let log = ledger
            .insert_scan_log(NewScanLog {
                event_id: event.id,
                scanner_id: attempt.scanner_id,
                student_id: student_id.to_string(),
                status: ScanStatus::Error,
                timestamp: now,
                is_override: false,
                override_reason: None,
                last_scan_at: None,
            })
            .await?;

        tracing::info!(
            event_id = %event.id,
            scanner_id = %attempt.scanner_id,
            status = %log.status,
            reason = ?rejection,
            "Scan rejected"
        );

        return Ok(ScanOutcome {
            log,
            event_status: resolution.status,
            decision: None,
            rejection: Some(rejection),
        });
    }

    let prior = ledger.find_scans_for(event.id, student_id).await?;
    let candidate = ScanCandidate {
        student_id,
        event_id: event.id,
        scanned_at: now,
    };
    let decision = engine.evaluate(&candidate, event.duplicate_policy, &prior);
    let status = decision.resulting_status(attempt.is_override);
    let overridden = status == ScanStatus::DuplicateOverride;

    let log = ledger
        .insert_scan_log(NewScanLog {
            event_id: event.id,
            scanner_id: attempt.scanner_id,
            student_id: student_id.to_string(),
            status,
            timestamp: now,
            is_override: overridden,
            override_reason: if overridden {
                attempt.override_reason
            } else {
                None
            },
            last_scan_at: decision.last_scan_at,
        })
        .await?;

    tracing::info!(
        event_id = %event.id,
        scanner_id = %attempt.scanner_id,
        status = %log.status,
        duplicate_count = decision.duplicate_count,
        "Scan recorded"
    );

    Ok(ScanOutcome {
        log,
        event_status: resolution.status,
        decision: Some(decision),
        rejection: None,
    })
}

/// In-memory ledger, used for tests and local tooling.
#[derive(Debug, Default)]
pub struct MemoryScanLedger {
    logs: Vec<ScanLog>,
    fail_writes: bool,
}

impl MemoryScanLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logs(logs: Vec<ScanLog>) -> Self {
        Self {
            logs,
            fail_writes: false,
        }
    }

    /// A ledger whose inserts always fail.
    pub fn failing() -> Self {
        Self {
            logs: Vec::new(),
            fail_writes: true,
        }
    }

    pub fn logs(&self) -> &[ScanLog] {
        &self.logs
    }
}

#[async_trait]
impl ScanLedger for MemoryScanLedger {
    async fn find_scans_for(
        &mut self,
        event_id: Uuid,
        student_id: &str,
    ) -> Result<Vec<ScanLog>, StorageError> {
        let mut scans: Vec<ScanLog> = self
            .logs
            .iter()
            .filter(|log| log.event_id == event_id && log.student_id == student_id)
            .cloned()
            .collect();
        scans.sort_by_key(|log| log.timestamp);
        Ok(scans)
    }

    async fn insert_scan_log(&mut self, record: NewScanLog) -> Result<ScanLog, StorageError> {
        if self.fail_writes {
            return Err(StorageError::Unavailable("write refused".to_string()));
        }
        let log = ScanLog {
            id: Uuid::new_v4(),
            event_id: record.event_id,
            scanner_id: record.scanner_id,
            student_id: record.student_id,
            status: record.status,
            timestamp: record.timestamp,
            is_override: record.is_override,
            override_reason: record.override_reason,
            last_scan_at: record.last_scan_at,
        };
        self.logs.push(log.clone());
        Ok(log)
    }
}
