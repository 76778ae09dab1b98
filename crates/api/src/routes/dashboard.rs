//! Admin dashboard overview.

use axum::{extract::State, Json};
use domain::models::dashboard::DashboardOverview;
use domain::models::event::Event;
use domain::models::scan_log::ScanLog;
use persistence::repositories::{EventRepository, ScanLogRepository};

use crate::app::AppState;
use crate::error::ApiError;

/// Event counts by status, total scans and today's check-ins.
///
/// GET /api/v1/dashboard
///
/// "Today" is the local calendar day in the configured scanning offset.
pub async fn get_overview(
    State(state): State<AppState>,
) -> Result<Json<DashboardOverview>, ApiError> {
    let now = state.clock.now();
    let scans = ScanLogRepository::new(state.pool.clone());

    let events: Vec<Event> = EventRepository::new(state.pool.clone())
        .list(None)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let total_scans = scans.count_all().await?;

    let (day_start, day_end) = state.aggregator.local_day_bounds(now);
    let today: Vec<ScanLog> = scans
        .find_between(day_start, day_end)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(
        state.aggregator.overview(&events, total_scans, &today, now),
    ))
}
