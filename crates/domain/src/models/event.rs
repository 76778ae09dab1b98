//! Event domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Rule governing how often a student may be accepted for one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DuplicatePolicy {
    #[default]
    OncePerEvent,
    OncePerDay,
    AllowDuplicates,
}

impl DuplicatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicatePolicy::OncePerEvent => "ONCE_PER_EVENT",
            DuplicatePolicy::OncePerDay => "ONCE_PER_DAY",
            DuplicatePolicy::AllowDuplicates => "ALLOW_DUPLICATES",
        }
    }

    /// Reads a policy loaded from storage.
    ///
    /// Unrecognised values resolve to `OncePerEvent`, the strictest policy,
    /// so a corrupt row can never silently admit repeat scans.
    pub fn from_stored(value: &str) -> Self {
        match value.parse() {
            Ok(policy) => policy,
            Err(_) => {
                tracing::warn!(
                    stored_policy = %value,
                    "Unrecognised duplicate policy, falling back to ONCE_PER_EVENT"
                );
                DuplicatePolicy::OncePerEvent
            }
        }
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ONCE_PER_EVENT" => Ok(DuplicatePolicy::OncePerEvent),
            "ONCE_PER_DAY" => Ok(DuplicatePolicy::OncePerDay),
            "ALLOW_DUPLICATES" => Ok(DuplicatePolicy::AllowDuplicates),
            _ => Err(format!("Invalid duplicate policy: {}", s)),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Temporal status of an event. Always derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Upcoming,
    Ongoing,
    Completed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "UPCOMING",
            EventStatus::Ongoing => "ONGOING",
            EventStatus::Completed => "COMPLETED",
        }
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "UPCOMING" => Ok(EventStatus::Upcoming),
            "ONGOING" => Ok(EventStatus::Ongoing),
            "COMPLETED" => Ok(EventStatus::Completed),
            _ => Err(format!("Invalid event status: {}", s)),
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Temporal bounds of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventSchedule {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_permanent: bool,
}

impl EventSchedule {
    pub fn permanent() -> Self {
        Self {
            start_date: None,
            end_date: None,
            is_permanent: true,
        }
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start_date: Some(start),
            end_date: Some(end),
            is_permanent: false,
        }
    }

    /// A bounded event must end strictly after it starts.
    pub fn check_bounds(&self) -> Result<(), ValidationError> {
        if self.is_permanent {
            return Ok(());
        }
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if end <= start => {
                let mut err = ValidationError::new("schedule_bounds");
                err.message = Some("endDate must be after startDate".into());
                Err(err)
            }
            _ => Ok(()),
        }
    }
}

/// Represents a check-in event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_permanent: bool,
    pub duplicate_policy: DuplicatePolicy,
    pub scanning_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn schedule(&self) -> EventSchedule {
        EventSchedule {
            start_date: self.start_date,
            end_date: self.end_date,
            is_permanent: self.is_permanent,
        }
    }
}

/// A scanner assigned to an event, with an optional station label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EventAssignment {
    pub user_id: Uuid,

    #[validate(length(max = 200, message = "Location must be at most 200 characters"))]
    pub location: Option<String>,
}

/// Assigned scanner as shown on event detail.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedScanner {
    pub user_id: Uuid,
    pub name: String,
    pub location: Option<String>,
}

/// Request payload for creating an event.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_create_schedule"))]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    #[validate(length(max = 200, message = "Location must be at most 200 characters"))]
    pub location: Option<String>,

    pub start_date: Option<DateTime<Utc>>,

    pub end_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub is_permanent: bool,

    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,

    #[serde(default = "default_scanning_enabled")]
    pub scanning_enabled: bool,

    #[serde(default)]
    #[validate(nested)]
    pub assigned_users: Vec<EventAssignment>,
}

fn default_scanning_enabled() -> bool {
    true
}

impl CreateEventRequest {
    pub fn schedule(&self) -> EventSchedule {
        EventSchedule {
            start_date: self.start_date,
            end_date: self.end_date,
            is_permanent: self.is_permanent,
        }
    }
}

fn validate_create_schedule(request: &CreateEventRequest) -> Result<(), ValidationError> {
    request.schedule().check_bounds()
}

/// Request payload for updating an event.
///
/// Absent fields keep their stored value. An explicit `null` date clears it.
/// `assignedUsers`, when present, replaces the whole assignment list.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub name: Option<String>,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    #[validate(length(max = 200, message = "Location must be at most 200 characters"))]
    pub location: Option<String>,

    #[serde(default, deserialize_with = "present_or_null")]
    pub start_date: Option<Option<DateTime<Utc>>>,

    #[serde(default, deserialize_with = "present_or_null")]
    pub end_date: Option<Option<DateTime<Utc>>>,

    pub is_permanent: Option<bool>,

    pub duplicate_policy: Option<DuplicatePolicy>,

    pub scanning_enabled: Option<bool>,

    #[validate(nested)]
    pub assigned_users: Option<Vec<EventAssignment>>,
}

impl UpdateEventRequest {
    /// Schedule that results from applying this update to `current`.
    ///
    /// A permanent result never carries dates.
    pub fn merged_schedule(&self, current: &EventSchedule) -> EventSchedule {
        if self.is_permanent.unwrap_or(current.is_permanent) {
            return EventSchedule::permanent();
        }
        EventSchedule {
            start_date: self.start_date.unwrap_or(current.start_date),
            end_date: self.end_date.unwrap_or(current.end_date),
            is_permanent: false,
        }
    }
}

/// Tells a field sent as `null` (`Some(None)`) apart from an absent one (`None`).
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Query parameters for listing events.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEventsQuery {
    pub status: Option<EventStatus>,
    pub scanning_enabled: Option<bool>,
}

/// An event with its status resolved at read time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    #[serde(flatten)]
    pub event: Event,
    pub status: EventStatus,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_scanners: Option<Vec<AssignedScanner>>,
    /// The caller's station label, for scanners viewing their own events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_location: Option<String>,
}

/// Response for GET /api/v1/events
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEventsResponse {
    pub events: Vec<EventResponse>,
    pub total: usize,
}
