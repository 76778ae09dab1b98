//! Event routes: listing, detail, status, statistics and admin CRUD.

use std::collections::{HashMap, HashSet};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::dashboard::EventStats;
use domain::models::event::{
    AssignedScanner, CreateEventRequest, Event, EventAssignment, EventResponse, ListEventsQuery,
    ListEventsResponse, UpdateEventRequest,
};
use domain::models::scan_log::ScanLog;
use domain::services::{resolve_status, StatusResolution};
use persistence::repositories::{
    AssignmentInput, EventChanges, EventRepository, NewEvent, ScanLogRepository, UserRepository,
};
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::UserAuth;

fn schedule_error(err: ValidationError) -> ApiError {
    ApiError::validation(
        err.message
            .map(|m| m.to_string())
            .unwrap_or_else(|| err.code.to_string()),
    )
}

fn not_found() -> ApiError {
    ApiError::NotFound("Event not found".to_string())
}

fn assignment_inputs(assigned: &[EventAssignment]) -> Result<Vec<AssignmentInput<'_>>, ApiError> {
    let mut seen = HashSet::new();
    assigned
        .iter()
        .map(|a| {
            if !seen.insert(a.user_id) {
                return Err(ApiError::validation(format!(
                    "Scanner {} is assigned more than once",
                    a.user_id
                )));
            }
            Ok(AssignmentInput {
                user_id: a.user_id,
                location: a.location.as_deref().map(str::trim).filter(|l| !l.is_empty()),
            })
        })
        .collect()
}

fn respond(
    state: &AppState,
    event: Event,
    assigned_scanners: Option<Vec<AssignedScanner>>,
    assignment_location: Option<String>,
) -> EventResponse {
    let resolution = resolve_status(&event.schedule(), state.clock.now());
    EventResponse {
        event,
        status: resolution.status,
        is_active: resolution.is_active,
        assigned_scanners,
        assignment_location,
    }
}

async fn load_event(repo: &EventRepository, event_id: Uuid) -> Result<Event, ApiError> {
    Ok(repo
        .find_by_id(event_id)
        .await?
        .ok_or_else(not_found)?
        .into())
}

async fn assigned_scanners(
    repo: &EventRepository,
    event_id: Uuid,
) -> Result<Vec<AssignedScanner>, ApiError> {
    Ok(repo
        .find_assignments(event_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect())
}

/// Scanners may only see events they are assigned to. Returns their station label.
async fn scanner_assignment(
    repo: &EventRepository,
    user_auth: &UserAuth,
    event_id: Uuid,
) -> Result<Option<Option<String>>, ApiError> {
    if user_auth.is_admin() {
        return Ok(None);
    }
    let assignment = repo
        .find_assignment(event_id, user_auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Forbidden("You are not assigned to this event".to_string()))?;
    Ok(Some(assignment.location))
}

/// List events with their current status.
///
/// GET /api/v1/events?status=ONGOING&scanningEnabled=true
///
/// Scanners see only the events they are assigned to.
pub async fn list_events(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<ListEventsResponse>, ApiError> {
    let repo = EventRepository::new(state.pool.clone());

    let entries: Vec<(Event, Option<String>)> = if user_auth.is_admin() {
        repo.list(query.scanning_enabled)
            .await?
            .into_iter()
            .map(|e| (e.into(), None))
            .collect()
    } else {
        repo.list_assigned(user_auth.user_id, query.scanning_enabled)
            .await?
            .into_iter()
            .map(|a| (a.event.into(), a.assignment_location))
            .collect()
    };

    let events: Vec<EventResponse> = entries
        .into_iter()
        .map(|(event, location)| respond(&state, event, None, location))
        .filter(|e| query.status.map_or(true, |s| e.status == s))
        .collect();

    let total = events.len();
    Ok(Json(ListEventsResponse { events, total }))
}

/// Get one event.
///
/// GET /api/v1/events/:event_id
pub async fn get_event(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(event_id): Path<Uuid>,
) -> Result<Json<EventResponse>, ApiError> {
    let repo = EventRepository::new(state.pool.clone());
    let event = load_event(&repo, event_id).await?;

    let response = match scanner_assignment(&repo, &user_auth, event_id).await? {
        Some(location) => respond(&state, event, None, location),
        None => {
            let scanners = assigned_scanners(&repo, event_id).await?;
            respond(&state, event, Some(scanners), None)
        }
    };
    Ok(Json(response))
}

/// Status of an event at the current instant.
///
/// GET /api/v1/events/:event_id/status
pub async fn get_event_status(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(event_id): Path<Uuid>,
) -> Result<Json<StatusResolution>, ApiError> {
    let repo = EventRepository::new(state.pool.clone());
    let event = load_event(&repo, event_id).await?;
    scanner_assignment(&repo, &user_auth, event_id).await?;

    Ok(Json(resolve_status(&event.schedule(), state.clock.now())))
}

/// Create an event.
///
/// POST /api/v1/events
pub async fn create_event(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventResponse>), ApiError> {
    request.validate()?;
    let assignments = assignment_inputs(&request.assigned_users)?;

    let repo = EventRepository::new(state.pool.clone());
    let (start_date, end_date) = if request.is_permanent {
        (None, None)
    } else {
        (request.start_date, request.end_date)
    };

    let created = repo
        .create(
            &NewEvent {
                name: request.name.trim(),
                description: request.description.as_deref(),
                location: request.location.as_deref(),
                start_date,
                end_date,
                is_permanent: request.is_permanent,
                duplicate_policy: request.duplicate_policy.as_str(),
                scanning_enabled: request.scanning_enabled,
            },
            &assignments,
        )
        .await?;

    info!(
        event_id = %created.id,
        created_by = %user_auth.user_id,
        assigned = assignments.len(),
        "Event created"
    );

    let scanners = assigned_scanners(&repo, created.id).await?;
    Ok((
        StatusCode::CREATED,
        Json(respond(&state, created.into(), Some(scanners), None)),
    ))
}

/// Update an event. `assignedUsers`, when given, replaces all assignments.
///
/// PUT/PATCH /api/v1/events/:event_id
pub async fn update_event(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(event_id): Path<Uuid>,
    Json(request): Json<UpdateEventRequest>,
) -> Result<Json<EventResponse>, ApiError> {
    request.validate()?;
    let assignments = request
        .assigned_users
        .as_deref()
        .map(assignment_inputs)
        .transpose()?;

    let repo = EventRepository::new(state.pool.clone());
    let current = load_event(&repo, event_id).await?;
    let schedule = request.merged_schedule(&current.schedule());
    schedule.check_bounds().map_err(schedule_error)?;

    let updated = repo
        .update(
            event_id,
            &EventChanges {
                name: request.name.as_deref().map(str::trim),
                description: request.description.as_deref(),
                location: request.location.as_deref(),
                start_date: schedule.start_date,
                end_date: schedule.end_date,
                is_permanent: schedule.is_permanent,
                duplicate_policy: request.duplicate_policy.as_ref().map(|p| p.as_str()),
                scanning_enabled: request.scanning_enabled,
            },
            assignments.as_deref(),
        )
        .await?
        .ok_or_else(not_found)?;

    info!(event_id = %event_id, updated_by = %user_auth.user_id, "Event updated");

    let scanners = assigned_scanners(&repo, event_id).await?;
    Ok(Json(respond(&state, updated.into(), Some(scanners), None)))
}

/// Delete an event with its assignments and scans.
///
/// DELETE /api/v1/events/:event_id
pub async fn delete_event(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(event_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = EventRepository::new(state.pool.clone())
        .delete(event_id)
        .await?;
    if !deleted {
        return Err(not_found());
    }

    info!(event_id = %event_id, deleted_by = %user_auth.user_id, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Attendance statistics recomputed from the scan ledger.
///
/// GET /api/v1/events/:event_id/stats
pub async fn get_event_stats(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<EventStats>, ApiError> {
    let event = load_event(&EventRepository::new(state.pool.clone()), event_id).await?;

    let logs: Vec<ScanLog> = ScanLogRepository::new(state.pool.clone())
        .find_by_event(event_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let scanner_ids: Vec<Uuid> = logs
        .iter()
        .map(|l| l.scanner_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let names: HashMap<Uuid, String> = UserRepository::new(state.pool.clone())
        .names_by_ids(&scanner_ids)
        .await?
        .into_iter()
        .collect();

    let stats = state
        .aggregator
        .event_stats(&event, &logs, &names, state.clock.now());
    Ok(Json(stats))
}
