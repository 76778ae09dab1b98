use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use domain::services::{Clock, ScanAdmissionEngine, StatsAggregator, SystemClock};
use shared::jwt::{JwtConfig, JwtError};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    login_rate_limit, metrics_handler, metrics_middleware, require_admin, require_auth,
    security_headers_middleware, trace_id, RateLimiterState,
};
use crate::routes::{auth, dashboard, events, health, scans, users};
use crate::services::auth::jwt_from_config;

/// Errors that prevent the router from being built.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("JWT configuration error: {0}")]
    Jwt(#[from] JwtError),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub jwt: Arc<JwtConfig>,
    pub clock: Arc<dyn Clock>,
    pub engine: ScanAdmissionEngine,
    pub aggregator: StatsAggregator,
    pub login_limiter: Option<Arc<RateLimiterState>>,
}

impl AppState {
    /// State backed by the wall clock.
    pub fn with_system_clock(config: Config, pool: PgPool) -> Result<Self, StartupError> {
        Self::new(config, pool, Arc::new(SystemClock))
    }

    /// Builds shared state with an explicit time source.
    pub fn new(config: Config, pool: PgPool, clock: Arc<dyn Clock>) -> Result<Self, StartupError> {
        let jwt = jwt_from_config(&config.jwt)?;

        let offset_minutes = config.scanning.utc_offset_minutes;
        let engine = ScanAdmissionEngine::from_offset_minutes(offset_minutes).ok_or_else(|| {
            StartupError::Config(format!(
                "scanning.utc_offset_minutes out of range: {}",
                offset_minutes
            ))
        })?;
        let aggregator =
            StatsAggregator::new(engine.day_offset(), config.scanning.recent_logs_limit);

        // A limit of 0 disables login rate limiting
        let login_limiter = RateLimiterState::new(
            config.security.login_rate_limit_per_minute,
            config.security.trust_forwarded_for,
        )
        .map(Arc::new);

        Ok(Self {
            pool,
            config: Arc::new(config),
            jwt: Arc::new(jwt),
            clock,
            engine,
            aggregator,
            login_limiter,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Credential exchange, rate limited per client IP
    let login_routes = Router::new()
        .route("/api/v1/auth/scanner-login", post(auth::scanner_login))
        .route("/api/v1/auth/admin-login", post(auth::admin_login))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            login_rate_limit,
        ));

    // Any signed-in admin or scanner
    let authenticated_routes = Router::new()
        .route("/api/v1/auth/me", get(auth::me))
        .route("/api/v1/auth/change-password", post(auth::change_password))
        .route("/api/v1/events", get(events::list_events))
        .route("/api/v1/events/:event_id", get(events::get_event))
        .route("/api/v1/events/:event_id/status", get(events::get_event_status))
        .route("/api/v1/scans", post(scans::create_scan))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route(
            "/api/v1/users",
            get(users::list_users).post(users::create_user),
        )
        .route(
            "/api/v1/users/:user_id",
            get(users::get_user)
                .put(users::update_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/api/v1/events", post(events::create_event))
        .route(
            "/api/v1/events/:event_id",
            axum::routing::put(events::update_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        .route("/api/v1/events/:event_id/stats", get(events::get_event_stats))
        .route("/api/v1/scans", get(scans::list_scans))
        .route("/api/v1/scans/:scan_id", get(scans::get_scan))
        .route("/api/v1/dashboard", get(dashboard::get_overview))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/api/v1/auth/refresh", post(auth::refresh))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(login_routes)
        .merge(authenticated_routes)
        .merge(admin_routes)
        // Global middleware (bottom layers run first)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
