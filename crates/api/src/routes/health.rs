//! Health check endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::app::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseHealth,
}

/// Database health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseHealth {
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

/// Simple status response for liveness/readiness probes.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

impl HealthResponse {
    fn from_probe(latency: Option<std::time::Duration>) -> Self {
        let connected = latency.is_some();
        Self {
            status: if connected { "healthy" } else { "unhealthy" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: DatabaseHealth {
                connected,
                latency_ms: latency.map(|d| d.as_millis() as u64),
            },
        }
    }
}

/// Full health check with database latency.
///
/// GET /api/health
pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let latency = match persistence::db::ping(&state.pool).await {
        Ok(latency) => Some(latency),
        Err(e) => {
            tracing::warn!(error = %e, "Database health probe failed");
            None
        }
    };

    let response = HealthResponse::from_probe(latency);
    let status = if response.database.connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Liveness probe. 200 while the process runs.
///
/// GET /api/health/live
pub async fn live() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe. 200 once the database answers.
///
/// GET /api/health/ready
pub async fn ready(State(state): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    persistence::db::ping(&state.pool)
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(StatusResponse {
        status: "ready".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_health_response_healthy() {
        let response = HealthResponse::from_probe(Some(Duration::from_millis(5)));
        assert_eq!(response.status, "healthy");
        assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
        assert!(response.database.connected);
        assert_eq!(response.database.latency_ms, Some(5));
    }

    #[test]
    fn test_health_response_unhealthy() {
        let response = HealthResponse::from_probe(None);
        assert_eq!(response.status, "unhealthy");
        assert!(!response.database.connected);
        assert_eq!(response.database.latency_ms, None);
    }

    #[test]
    fn test_health_response_serialization() {
        let json = serde_json::to_value(HealthResponse::from_probe(None)).unwrap();
        assert_eq!(json["database"]["connected"], false);
        assert!(json["database"]["latency_ms"].is_null());
    }

    #[tokio::test]
    async fn test_live() {
        let Json(response) = live().await;
        assert_eq!(response.status, "alive");
    }

    #[tokio::test]
    async fn test_ready_without_database() {
        let state = crate::app::tests::test_state();
        assert_eq!(
            ready(State(state)).await.unwrap_err(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
