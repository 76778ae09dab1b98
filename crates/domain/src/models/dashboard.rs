//! Dashboard statistics domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::EventStatus;
use super::scan_log::ScanLog;

/// Scan counts for one event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanTotals {
    /// Every recorded attempt, including errors.
    pub attempts: i64,
    /// SUCCESS plus DUPLICATE_OVERRIDE.
    pub accepted: i64,
    /// Distinct students among accepted scans.
    pub unique_students: i64,
    pub duplicates: i64,
    pub overridden: i64,
    pub errors: i64,
}

/// Accepted and duplicate counts for one time bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBucket {
    pub period: String,
    pub accepted: i64,
    pub duplicates: i64,
}

/// Per-scanner throughput.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerPerformance {
    pub scanner_id: Uuid,
    pub name: String,
    pub accepted: i64,
    pub duplicates: i64,
}

/// Granularity used for trend charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendView {
    Hour,
    Day,
    Week,
    Month,
}

/// Length of an event, rounded up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDuration {
    /// `None` for permanent events.
    pub days: Option<i64>,
    /// `None` for permanent events.
    pub hours: Option<i64>,
    pub is_multi_day: bool,
    pub is_permanent: bool,
    pub default_view: TrendView,
}

/// Busiest bucket in the default trend view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakPeriod {
    pub period: String,
    pub count: i64,
}

impl PeakPeriod {
    pub fn none() -> Self {
        Self {
            period: "N/A".to_string(),
            count: 0,
        }
    }
}

/// Live statistics for one event, recomputed from the ledger on each read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStats {
    pub event_id: Uuid,
    pub event_name: String,
    pub status: EventStatus,
    pub totals: ScanTotals,
    pub scans_by_hour: Vec<TimeBucket>,
    pub scans_by_day: Vec<TimeBucket>,
    pub scans_by_week: Vec<TimeBucket>,
    pub scans_by_month: Vec<TimeBucket>,
    pub scanner_performance: Vec<ScannerPerformance>,
    pub duration: EventDuration,
    pub peak_period: PeakPeriod,
    pub recent_logs: Vec<ScanLog>,
    pub generated_at: DateTime<Utc>,
}

/// Event counts by derived status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStatusCounts {
    pub total: i64,
    pub upcoming: i64,
    pub ongoing: i64,
    pub completed: i64,
}

/// Scan counts for the current local day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayCounts {
    pub accepted: i64,
    pub duplicates: i64,
}

/// Admin dashboard overview.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub events: EventStatusCounts,
    pub total_scans: i64,
    pub today: TodayCounts,
    pub generated_at: DateTime<Utc>,
}
