//! Dashboard aggregation over the scan ledger.
//!
//! Every figure is recomputed from the recorded scans on read. Calendar
//! buckets use the configured fixed offset.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, TimeZone, Timelike, Utc};
use uuid::Uuid;

use crate::models::dashboard::{
    DashboardOverview, EventDuration, EventStats, EventStatusCounts, PeakPeriod, ScanTotals,
    ScannerPerformance, TimeBucket, TodayCounts, TrendView,
};
use crate::models::event::{Event, EventSchedule, EventStatus};
use crate::models::scan_log::{ScanLog, ScanStatus};
use crate::services::event_status::resolve_status;

/// Label for scanners that no longer exist.
pub const UNKNOWN_SCANNER: &str = "Unknown scanner";

const MS_PER_HOUR: i64 = 60 * 60 * 1000;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Computes event statistics and the dashboard overview.
#[derive(Debug, Clone, Copy)]
pub struct StatsAggregator {
    offset: FixedOffset,
    recent_logs_limit: usize,
}

impl StatsAggregator {
    pub fn new(offset: FixedOffset, recent_logs_limit: usize) -> Self {
        Self {
            offset,
            recent_logs_limit,
        }
    }

    /// Full statistics for one event.
    pub fn event_stats(
        &self,
        event: &Event,
        logs: &[ScanLog],
        scanner_names: &HashMap<Uuid, String>,
        now: DateTime<Utc>,
    ) -> EventStats {
        let duration = event_duration(&event.schedule(), now);
        let scans_by_hour = self.buckets(logs, TrendView::Hour);
        let scans_by_day = self.buckets(logs, TrendView::Day);
        let scans_by_week = self.buckets(logs, TrendView::Week);
        let scans_by_month = self.buckets(logs, TrendView::Month);

        let peak_period = match duration.default_view {
            TrendView::Hour => peak_period(&scans_by_hour),
            TrendView::Day => peak_period(&scans_by_day),
            TrendView::Week => peak_period(&scans_by_week),
            TrendView::Month => peak_period(&scans_by_month),
        };

        EventStats {
            event_id: event.id,
            event_name: event.name.clone(),
            status: resolve_status(&event.schedule(), now).status,
            totals: totals(logs),
            scans_by_hour,
            scans_by_day,
            scans_by_week,
            scans_by_month,
            scanner_performance: scanner_performance(logs, scanner_names),
            duration,
            peak_period,
            recent_logs: self.recent_logs(logs),
            generated_at: now,
        }
    }

    /// Accepted and duplicate counts per bucket, ascending, only buckets with
    /// data.
    pub fn buckets(&self, logs: &[ScanLog], view: TrendView) -> Vec<TimeBucket> {
        let mut counts: BTreeMap<String, (i64, i64)> = BTreeMap::new();
        for log in logs {
            let (accepted, duplicate) = match log.status {
                ScanStatus::Success | ScanStatus::DuplicateOverride => (1, 0),
                ScanStatus::Duplicate => (0, 1),
                ScanStatus::Error => continue,
            };
            let entry = counts.entry(self.bucket_label(log.timestamp, view)).or_default();
            entry.0 += accepted;
            entry.1 += duplicate;
        }
        counts
            .into_iter()
            .map(|(period, (accepted, duplicates))| TimeBucket {
                period,
                accepted,
                duplicates,
            })
            .collect()
    }

    /// Bucket label for an instant. Labels sort chronologically.
    pub fn bucket_label(&self, at: DateTime<Utc>, view: TrendView) -> String {
        let local = at.with_timezone(&self.offset);
        match view {
            TrendView::Hour => format!("{:02}:00", local.hour()),
            TrendView::Day => local.format("%Y-%m-%d").to_string(),
            TrendView::Week => {
                let week = local.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            TrendView::Month => local.format("%Y-%m").to_string(),
        }
    }

    /// Latest logs first, capped at the configured limit.
    pub fn recent_logs(&self, logs: &[ScanLog]) -> Vec<ScanLog> {
        let mut recent = logs.to_vec();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(self.recent_logs_limit);
        recent
    }

    /// UTC bounds `[start, end)` of the local calendar day containing `now`.
    pub fn local_day_bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let day = now.with_timezone(&self.offset).date_naive();
        let start = self
            .offset
            .from_local_datetime(&day.and_time(NaiveTime::MIN))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now);
        (start, start + Duration::days(1))
    }

    /// Admin overview. `today_logs` are the scans within the local day.
    pub fn overview(
        &self,
        events: &[Event],
        total_scans: i64,
        today_logs: &[ScanLog],
        now: DateTime<Utc>,
    ) -> DashboardOverview {
        let mut counts = EventStatusCounts::default();
        for event in events {
            counts.total += 1;
            match resolve_status(&event.schedule(), now).status {
                EventStatus::Upcoming => counts.upcoming += 1,
                EventStatus::Ongoing => counts.ongoing += 1,
                EventStatus::Completed => counts.completed += 1,
            }
        }

        let today = today_logs.iter().fold(TodayCounts::default(), |mut acc, log| {
            if log.status.is_accepted() {
                acc.accepted += 1;
            } else if log.status == ScanStatus::Duplicate {
                acc.duplicates += 1;
            }
            acc
        });

        DashboardOverview {
            events: counts,
            total_scans,
            today,
            generated_at: now,
        }
    }
}

/// Scan totals for a set of logs.
pub fn totals(logs: &[ScanLog]) -> ScanTotals {
    let mut totals = ScanTotals::default();
    let mut students: HashSet<&str> = HashSet::new();
    for log in logs {
        totals.attempts += 1;
        match log.status {
            ScanStatus::Success => totals.accepted += 1,
            ScanStatus::DuplicateOverride => {
                totals.accepted += 1;
                totals.overridden += 1;
            }
            ScanStatus::Duplicate => totals.duplicates += 1,
            ScanStatus::Error => totals.errors += 1,
        }
        if log.status.is_accepted() {
            students.insert(log.student_id.as_str());
        }
    }
    totals.unique_students = students.len() as i64;
    totals
}

/// Per-scanner counts, busiest first, ties broken by name.
pub fn scanner_performance(
    logs: &[ScanLog],
    scanner_names: &HashMap<Uuid, String>,
) -> Vec<ScannerPerformance> {
    let mut by_scanner: HashMap<Uuid, (i64, i64)> = HashMap::new();
    for log in logs {
        let entry = by_scanner.entry(log.scanner_id).or_default();
        if log.status.is_accepted() {
            entry.0 += 1;
        } else if log.status == ScanStatus::Duplicate {
            entry.1 += 1;
        }
    }

    let mut performance: Vec<ScannerPerformance> = by_scanner
        .into_iter()
        .map(|(scanner_id, (accepted, duplicates))| ScannerPerformance {
            scanner_id,
            name: scanner_names
                .get(&scanner_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_SCANNER.to_string()),
            accepted,
            duplicates,
        })
        .collect();

    performance.sort_by(|a, b| {
        b.accepted
            .cmp(&a.accepted)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.scanner_id.cmp(&b.scanner_id))
    });
    performance
}

/// Duration of an event, rounded up to whole days and hours.
///
/// A missing start counts from `now`; a missing end is one day after the
/// start. An end before the start counts as zero length.
pub fn event_duration(schedule: &EventSchedule, now: DateTime<Utc>) -> EventDuration {
    if schedule.is_permanent {
        return EventDuration {
            days: None,
            hours: None,
            is_multi_day: true,
            is_permanent: true,
            default_view: TrendView::Day,
        };
    }

    let start = schedule.start_date.unwrap_or(now);
    let end = schedule.end_date.unwrap_or(start + Duration::days(1));
    let ms = (end - start).num_milliseconds().max(0);
    let days = ceil_div(ms, MS_PER_DAY);
    let hours = ceil_div(ms, MS_PER_HOUR);

    let default_view = if days <= 1 {
        TrendView::Hour
    } else if days <= 7 {
        TrendView::Day
    } else if days <= 30 {
        TrendView::Week
    } else {
        TrendView::Month
    };

    EventDuration {
        days: Some(days),
        hours: Some(hours),
        is_multi_day: days > 1,
        is_permanent: false,
        default_view,
    }
}

/// Bucket with the most accepted scans. The earliest bucket wins ties.
pub fn peak_period(buckets: &[TimeBucket]) -> PeakPeriod {
    let mut peak: Option<&TimeBucket> = None;
    for bucket in buckets {
        if bucket.accepted > peak.map(|p| p.accepted).unwrap_or(0) {
            peak = Some(bucket);
        }
    }
    peak.map(|bucket| PeakPeriod {
        period: bucket.period.clone(),
        count: bucket.accepted,
    })
    .unwrap_or_else(PeakPeriod::none)
}

fn ceil_div(value: i64, divisor: i64) -> i64 {
    -((-value).div_euclid(divisor))
}
