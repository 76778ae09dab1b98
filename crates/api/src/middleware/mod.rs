//! HTTP middleware components.

pub mod auth;
pub mod logging;
pub mod metrics;
pub mod rate_limit;
pub mod security_headers;
pub mod trace_id;

pub use auth::{require_admin, require_auth, UserAuth};
pub use metrics::{init_metrics, metrics_handler, metrics_middleware};
pub use rate_limit::{login_rate_limit, RateLimiterState};
pub use security_headers::security_headers_middleware;
pub use trace_id::{trace_id, RequestId, REQUEST_ID_HEADER};
