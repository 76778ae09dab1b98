//! Security headers middleware.

use axum::{
    body::Body,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

/// Adds security headers to every response.
///
/// `Strict-Transport-Security` is only sent when
/// `CHECKIN__SECURITY__HSTS_ENABLED` is `true`, since it must only be enabled
/// behind proper TLS termination.
pub async fn security_headers_middleware(req: Request<Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    );
    // Scan results and tokens must never be cached by intermediaries.
    headers
        .entry(header::CACHE_CONTROL)
        .or_insert(HeaderValue::from_static("no-store"));

    if hsts_enabled(std::env::var("CHECKIN__SECURITY__HSTS_ENABLED").ok().as_deref()) {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    response
}

fn hsts_enabled(value: Option<&str>) -> bool {
    value.map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false)
}
