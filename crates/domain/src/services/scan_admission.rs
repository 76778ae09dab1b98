//! Duplicate-scan admission.
//!
//! Decides whether a candidate scan repeats an already accepted scan of the
//! same student at the same event, under the event's duplicate policy. The
//! decision is a deterministic fold over the prior scans and performs no I/O,
//! so it can be re-derived from the ledger at any time.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use uuid::Uuid;

use crate::models::event::DuplicatePolicy;
use crate::models::scan_log::{ScanLog, ScanStatus};

/// A scan that has not been recorded yet.
#[derive(Debug, Clone, Copy)]
pub struct ScanCandidate<'a> {
    pub student_id: &'a str,
    pub event_id: Uuid,
    pub scanned_at: DateTime<Utc>,
}

/// Outcome of duplicate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionDecision {
    pub is_duplicate: bool,
    /// Timestamp of the latest accepted scan the decision refers to.
    pub last_scan_at: Option<DateTime<Utc>>,
    /// Number of accepted scans in the policy's scope. Informational when the
    /// scan is admitted.
    pub duplicate_count: usize,
}

impl AdmissionDecision {
    fn admitted(duplicate_count: usize) -> Self {
        Self {
            is_duplicate: false,
            last_scan_at: None,
            duplicate_count,
        }
    }

    fn duplicate_of(scope: &[&ScanLog]) -> Option<Self> {
        scope.last().map(|last| Self {
            is_duplicate: true,
            last_scan_at: Some(last.timestamp),
            duplicate_count: scope.len(),
        })
    }

    /// Status to record for this decision.
    ///
    /// An override only matters for duplicates; on an admitted scan it has
    /// no effect.
    pub fn resulting_status(&self, override_authorized: bool) -> ScanStatus {
        match (self.is_duplicate, override_authorized) {
            (false, _) => ScanStatus::Success,
            (true, false) => ScanStatus::Duplicate,
            (true, true) => ScanStatus::DuplicateOverride,
        }
    }
}

/// Evaluates duplicate policies. Calendar days are taken in a fixed offset.
#[derive(Debug, Clone, Copy)]
pub struct ScanAdmissionEngine {
    day_offset: FixedOffset,
}

impl Default for ScanAdmissionEngine {
    fn default() -> Self {
        Self::utc()
    }
}

impl ScanAdmissionEngine {
    pub fn new(day_offset: FixedOffset) -> Self {
        Self { day_offset }
    }

    pub fn utc() -> Self {
        Self {
            day_offset: Utc.fix(),
        }
    }

    /// Builds an engine from an offset in minutes east of UTC.
    ///
    /// Returns `None` if the offset is out of range.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(Self::new)
    }

    pub fn day_offset(&self) -> FixedOffset {
        self.day_offset
    }

    /// Calendar day of `at` in the engine's offset.
    pub fn local_day(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.day_offset).date_naive()
    }

    /// Decides whether `candidate` is a duplicate under `policy`.
    pub fn evaluate(
        &self,
        candidate: &ScanCandidate<'_>,
        policy: DuplicatePolicy,
        prior_scans: &[ScanLog],
    ) -> AdmissionDecision {
        if policy == DuplicatePolicy::AllowDuplicates {
            return AdmissionDecision::admitted(0);
        }

        let mut relevant: Vec<&ScanLog> = prior_scans
            .iter()
            .filter(|scan| {
                scan.student_id == candidate.student_id
                    && scan.event_id == candidate.event_id
                    && scan.status.is_accepted()
            })
            .collect();
        // Stable, so records sharing a timestamp keep caller order.
        relevant.sort_by_key(|scan| scan.timestamp);

        let duplicate = match policy {
            DuplicatePolicy::OncePerEvent => AdmissionDecision::duplicate_of(&relevant),
            DuplicatePolicy::OncePerDay => {
                let day = self.local_day(candidate.scanned_at);
                let same_day: Vec<&ScanLog> = relevant
                    .iter()
                    .copied()
                    .filter(|scan| self.local_day(scan.timestamp) == day)
                    .collect();
                AdmissionDecision::duplicate_of(&same_day)
            }
            DuplicatePolicy::AllowDuplicates => None,
        };

        duplicate.unwrap_or_else(|| AdmissionDecision::admitted(relevant.len()))
    }
}
