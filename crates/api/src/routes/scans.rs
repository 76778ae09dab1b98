//! Scan routes: submit a scan and browse the ledger.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::event::{Event, EventStatus};
use domain::models::scan_log::{
    CreateScanRequest, ListScansQuery, ListScansResponse, ScanLog, ScanPagination, ScanResponse,
};
use domain::services::{ingest, ScanAttempt, ScanRejection};
use persistence::repositories::{EventRepository, ScanLogFilter, ScanLogRepository, UserRepository};
use shared::pagination::{clamp_page_size, decode_cursor, encode_cursor};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::metrics::record_scan_rejected;
use crate::middleware::UserAuth;

fn rejection_reason(rejection: ScanRejection) -> &'static str {
    match rejection {
        ScanRejection::ScanningDisabled => "scanning_disabled",
        ScanRejection::EventNotActive(EventStatus::Upcoming) => "upcoming",
        ScanRejection::EventNotActive(EventStatus::Completed) => "completed",
        ScanRejection::EventNotActive(EventStatus::Ongoing) => "not_active",
    }
}

/// Scanners must be enabled and assigned to the event.
async fn ensure_may_scan(
    state: &AppState,
    user_auth: &UserAuth,
    event_id: Uuid,
) -> Result<(), ApiError> {
    if user_auth.is_admin() {
        return Ok(());
    }

    let scanner = UserRepository::new(state.pool.clone())
        .find_by_id(user_auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown scanner".to_string()))?;
    if !scanner.enabled {
        return Err(ApiError::Forbidden("Account is disabled".to_string()));
    }

    EventRepository::new(state.pool.clone())
        .find_assignment(event_id, user_auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Forbidden("You are not assigned to this event".to_string()))?;
    Ok(())
}

/// Submit a scan.
///
/// POST /api/v1/scans
///
/// Returns 201 with the recorded scan. A scan on an event that is not
/// accepting scans is still recorded, with status ERROR, and answered 422.
pub async fn create_scan(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<CreateScanRequest>,
) -> Result<(StatusCode, Json<ScanResponse>), ApiError> {
    request.validate()?;

    let event: Event = EventRepository::new(state.pool.clone())
        .find_by_id(request.event_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))?
        .into();

    ensure_may_scan(&state, &user_auth, event.id).await?;

    if request.is_override
        && !user_auth.is_admin()
        && !state.config.scanning.allow_scanner_override
    {
        return Err(ApiError::Forbidden(
            "Scanners are not allowed to override duplicates".to_string(),
        ));
    }

    let student_id = request.student_id.trim().to_string();
    let mut ledger = ScanLogRepository::new(state.pool.clone())
        .lock_scope(event.id, &student_id)
        .await?;

    let outcome = ingest(
        &mut ledger,
        &state.engine,
        &event,
        ScanAttempt {
            scanner_id: user_auth.user_id,
            student_id,
            is_override: request.is_override,
            override_reason: request
                .override_reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        },
        state.clock.now(),
    )
    .await?;

    let status = match outcome.rejection {
        Some(rejection) => {
            record_scan_rejected(rejection_reason(rejection));
            StatusCode::UNPROCESSABLE_ENTITY
        }
        None => StatusCode::CREATED,
    };

    let response = ScanResponse {
        duplicate_count: outcome.duplicate_count(),
        event_status: outcome.event_status,
        message: outcome.message(),
        scan: outcome.log,
    };
    Ok((status, Json(response)))
}

/// List scans newest first.
///
/// GET /api/v1/scans?eventId=..&scannerId=..&status=DUPLICATE&cursor=..&limit=50
pub async fn list_scans(
    State(state): State<AppState>,
    Query(query): Query<ListScansQuery>,
) -> Result<Json<ListScansResponse>, ApiError> {
    let limit = clamp_page_size(query.limit);
    let before = query.cursor.as_deref().map(decode_cursor).transpose()?;

    let mut rows = ScanLogRepository::new(state.pool.clone())
        .list(
            &ScanLogFilter {
                event_id: query.event_id,
                scanner_id: query.scanner_id,
                status: query.status.as_ref().map(|s| s.as_str()),
                before,
            },
            limit + 1,
        )
        .await?;

    let has_more = rows.len() as i64 > limit;
    rows.truncate(limit as usize);

    let scans: Vec<ScanLog> = rows.into_iter().map(Into::into).collect();
    let next_cursor = if has_more {
        scans.last().map(|s| encode_cursor(s.timestamp, s.id))
    } else {
        None
    };

    Ok(Json(ListScansResponse {
        scans,
        pagination: ScanPagination {
            next_cursor,
            has_more,
        },
    }))
}

/// Get one scan.
///
/// GET /api/v1/scans/:scan_id
pub async fn get_scan(
    State(state): State<AppState>,
    Path(scan_id): Path<Uuid>,
) -> Result<Json<ScanLog>, ApiError> {
    let scan = ScanLogRepository::new(state.pool.clone())
        .find_by_id(scan_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Scan not found".to_string()))?;
    Ok(Json(scan.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::user::UserRole;

    #[test]
    fn test_rejection_reasons() {
        assert_eq!(
            rejection_reason(ScanRejection::ScanningDisabled),
            "scanning_disabled"
        );
        assert_eq!(
            rejection_reason(ScanRejection::EventNotActive(EventStatus::Upcoming)),
            "upcoming"
        );
        assert_eq!(
            rejection_reason(ScanRejection::EventNotActive(EventStatus::Completed)),
            "completed"
        );
    }

    #[tokio::test]
    async fn test_admin_may_scan_without_assignment() {
        let state = crate::app::tests::test_state();
        let admin = UserAuth {
            user_id: Uuid::new_v4(),
            role: UserRole::Admin,
            jti: "jti".to_string(),
            password_change_required: false,
        };
        assert!(ensure_may_scan(&state, &admin, Uuid::new_v4()).await.is_ok());
    }
}
