//! Event temporal status resolution.
//!
//! Status is a pure function of an event's schedule and the current instant.
//! It is recomputed on every read and never persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::event::{EventSchedule, EventStatus};

/// Result of resolving an event's status at an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResolution {
    pub status: EventStatus,
    pub is_active: bool,
    /// Milliseconds until the event starts, for upcoming events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_until_start: Option<i64>,
    /// Milliseconds until the event ends, for bounded ongoing events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_until_end: Option<i64>,
}

impl StatusResolution {
    fn ongoing() -> Self {
        Self {
            status: EventStatus::Ongoing,
            is_active: true,
            time_until_start: None,
            time_until_end: None,
        }
    }

    fn upcoming(start: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            status: EventStatus::Upcoming,
            is_active: false,
            time_until_start: Some((start - now).num_milliseconds()),
            time_until_end: None,
        }
    }

    fn completed() -> Self {
        Self {
            status: EventStatus::Completed,
            is_active: false,
            time_until_start: None,
            time_until_end: None,
        }
    }
}

/// Resolves the status of an event at `now`.
///
/// Permanent events and events without dates are always ongoing. Both
/// boundaries of the ongoing window are inclusive.
pub fn resolve_status(schedule: &EventSchedule, now: DateTime<Utc>) -> StatusResolution {
    if schedule.is_permanent {
        return StatusResolution::ongoing();
    }

    match (schedule.start_date, schedule.end_date) {
        (None, None) => StatusResolution::ongoing(),
        (Some(start), None) => {
            if now < start {
                StatusResolution::upcoming(start, now)
            } else {
                StatusResolution::ongoing()
            }
        }
        (None, Some(end)) => {
            if now > end {
                StatusResolution::completed()
            } else {
                StatusResolution::ongoing()
            }
        }
        (Some(start), Some(end)) => {
            if now < start {
                StatusResolution::upcoming(start, now)
            } else if now <= end {
                StatusResolution {
                    time_until_end: Some((end - now).num_milliseconds()),
                    ..StatusResolution::ongoing()
                }
            } else {
                StatusResolution::completed()
            }
        }
    }
}
