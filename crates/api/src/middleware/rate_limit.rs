//! Login rate limiting keyed by client IP.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use serde_json::json;
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
};

use crate::app::AppState;

/// Per-client login limiter shared across requests.
pub struct RateLimiterState {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
    rate_limit_per_minute: u32,
    trust_forwarded_for: bool,
}

impl RateLimiterState {
    /// Returns `None` when the limit is 0, which disables limiting.
    ///
    /// `X-Forwarded-For` is only consulted when `trust_forwarded_for` is set,
    /// i.e. when a reverse proxy overwrites it.
    pub fn new(rate_limit_per_minute: u32, trust_forwarded_for: bool) -> Option<Self> {
        let per_minute = NonZeroU32::new(rate_limit_per_minute)?;
        Some(Self {
            limiter: RateLimiter::keyed(Quota::per_minute(per_minute)),
            rate_limit_per_minute,
            trust_forwarded_for,
        })
    }

    pub fn rate_limit_per_minute(&self) -> u32 {
        self.rate_limit_per_minute
    }

    /// Ok if the client may proceed, otherwise the retry-after in seconds.
    pub fn check(&self, client: IpAddr) -> Result<(), u64> {
        self.limiter.check_key(&client).map_err(|not_until| {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            wait.as_secs().max(1)
        })
    }

    /// Key for a request: the socket peer, or the first forwarded hop when
    /// the proxy is trusted.
    pub fn client_key(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
        let forwarded = if self.trust_forwarded_for {
            forwarded_for(headers)
        } else {
            None
        };
        forwarded
            .or_else(|| peer.map(|p| p.ip()))
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }

    /// Drops clients whose quota has fully replenished.
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

impl std::fmt::Debug for RateLimiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterState")
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .field("tracked_clients", &self.tracked_clients())
            .finish()
    }
}

/// First `X-Forwarded-For` hop, if it parses as an address.
fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
}

/// Middleware that limits login attempts per client IP.
pub async fn login_rate_limit(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(ref limiter) = state.login_limiter {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let client = limiter.client_key(req.headers(), peer);

        if let Err(retry_after) = limiter.check(client) {
            tracing::warn!(client = %client, "Login rate limit exceeded");
            return rate_limited_response(limiter.rate_limit_per_minute(), retry_after);
        }
    }

    next.run(req).await
}

fn rate_limited_response(limit: u32, retry_after: u64) -> Response {
    let body = json!({
        "error": "rate_limited",
        "message": format!("Rate limit of {} login attempts/minute exceeded", limit),
        "retryAfter": retry_after
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn forwarded(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", value.parse().unwrap());
        headers
    }

    #[test]
    fn test_zero_limit_disables() {
        assert!(RateLimiterState::new(0, false).is_none());
        assert!(RateLimiterState::new(5, false).is_some());
    }

    #[test]
    fn test_rate_limiter_exhaustion() {
        let state = RateLimiterState::new(2, false).unwrap();
        let client = ip("10.0.0.1");

        assert!(state.check(client).is_ok());
        assert!(state.check(client).is_ok());
        let retry_after = state.check(client).unwrap_err();
        assert!(retry_after >= 1);
    }

    #[test]
    fn test_clients_are_independent() {
        let state = RateLimiterState::new(1, false).unwrap();

        assert!(state.check(ip("10.0.0.1")).is_ok());
        assert!(state.check(ip("10.0.0.2")).is_ok());
        assert!(state.check(ip("10.0.0.1")).is_err());
        assert!(state.check(ip("10.0.0.2")).is_err());
        assert!(state.check(ip("::1")).is_ok());
        assert_eq!(state.tracked_clients(), 3);
    }

    #[test]
    fn test_rotating_forwarded_for_is_ignored_by_default() {
        let state = RateLimiterState::new(1, false).unwrap();
        let peer: SocketAddr = "10.0.0.5:40000".parse().unwrap();

        let allowed = (0..1000)
            .filter(|i| {
                let headers = forwarded(&format!("198.51.{}.{}", i / 256, i % 256));
                state.check(state.client_key(&headers, Some(peer))).is_ok()
            })
            .count();

        assert_eq!(allowed, 1);
        assert_eq!(state.tracked_clients(), 1);
    }

    #[test]
    fn test_client_key_uses_peer_by_default() {
        let state = RateLimiterState::new(10, false).unwrap();
        let peer: SocketAddr = "192.168.1.5:5000".parse().unwrap();

        assert_eq!(
            state.client_key(&forwarded("203.0.113.7"), Some(peer)),
            ip("192.168.1.5")
        );
        assert_eq!(
            state.client_key(&HeaderMap::new(), None),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        );
    }

    #[test]
    fn test_client_key_trusts_proxy_when_configured() {
        let state = RateLimiterState::new(10, true).unwrap();
        let peer: SocketAddr = "192.168.1.5:5000".parse().unwrap();

        assert_eq!(
            state.client_key(&forwarded("203.0.113.7, 10.0.0.1"), Some(peer)),
            ip("203.0.113.7")
        );
        assert_eq!(
            state.client_key(&forwarded("garbage"), Some(peer)),
            ip("192.168.1.5")
        );
        assert_eq!(state.client_key(&HeaderMap::new(), Some(peer)), ip("192.168.1.5"));
    }

    #[test]
    fn test_retain_recent_keeps_limited_clients() {
        let state = RateLimiterState::new(1, false).unwrap();
        let client = ip("10.0.0.1");
        assert!(state.check(client).is_ok());

        state.retain_recent();
        assert!(state.check(client).is_err());
    }

    #[test]
    fn test_debug_output() {
        let state = RateLimiterState::new(10, true).unwrap();
        let debug = format!("{:?}", state);
        assert!(debug.contains("rate_limit_per_minute"));
        assert!(debug.contains("trust_forwarded_for: true"));
    }

    #[test]
    fn test_rate_limited_response_format() {
        let response = rate_limited_response(10, 42);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }
}
