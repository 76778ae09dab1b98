//! Router-level tests that never reach the database.
//!
//! Authentication, role checks, request validation, rate limiting and the
//! global middleware all answer before any query runs, so these use a lazy
//! pool and need no PostgreSQL instance.

mod common;

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{header, Method, StatusCode};
use checkin_api::middleware::init_metrics;
use common::{
    admin_token, body_json, clock_at, json_request, lazy_pool, t0, test_app, test_config,
    token_for,
};
use domain::models::user::UserRole;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

#[tokio::test]
async fn test_liveness_probe() {
    let app = test_app(lazy_pool());
    let response = app
        .oneshot(json_request(Method::GET, "/api/health/live", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "alive");
}

#[tokio::test]
async fn test_readiness_fails_without_database() {
    let app = test_app(lazy_pool());
    let response = app
        .oneshot(json_request(Method::GET, "/api/health/ready", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_responses_carry_security_headers_and_request_id() {
    let app = test_app(lazy_pool());
    let mut request = json_request(Method::GET, "/api/health/live", None, None);
    request
        .headers_mut()
        .insert("x-request-id", "scan-desk-7".parse().unwrap());

    let response = app.oneshot(request).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers.get("x-request-id").unwrap(), "scan-desk-7");
    assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
    assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    init_metrics().unwrap();
    let app = test_app(lazy_pool());
    let response = app
        .oneshot(json_request(Method::GET, "/metrics", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = test_app(lazy_pool());
    let response = app
        .oneshot(json_request(Method::GET, "/api/v1/nowhere", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    for (method, uri) in [
        (Method::GET, "/api/v1/events"),
        (Method::POST, "/api/v1/scans"),
        (Method::GET, "/api/v1/auth/me"),
        (Method::GET, "/api/v1/users"),
        (Method::GET, "/api/v1/dashboard"),
    ] {
        let app = test_app(lazy_pool());
        let response = app
            .oneshot(json_request(method.clone(), uri, None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);

        let body = body_json(response).await;
        assert_eq!(body["error"], "unauthorized");
    }
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let app = test_app(lazy_pool());
    let response = app
        .oneshot(json_request(
            Method::GET,
            "/api/v1/events",
            Some("not-a-jwt"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_scanner_cannot_reach_admin_routes() {
    let token = token_for(Uuid::new_v4(), UserRole::User, false);
    for (method, uri) in [
        (Method::GET, "/api/v1/users".to_string()),
        (Method::GET, "/api/v1/dashboard".to_string()),
        (Method::GET, "/api/v1/scans".to_string()),
        (Method::DELETE, format!("/api/v1/events/{}", Uuid::new_v4())),
        (Method::GET, format!("/api/v1/events/{}/stats", Uuid::new_v4())),
    ] {
        let app = test_app(lazy_pool());
        let response = app
            .oneshot(json_request(method.clone(), &uri, Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{} {}", method, uri);
    }
}

#[tokio::test]
async fn test_scanner_cannot_create_events() {
    let token = token_for(Uuid::new_v4(), UserRole::User, false);
    let app = test_app(lazy_pool());
    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/events",
            Some(&token),
            Some(json!({"name": "Open Day", "isPermanent": true})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_pending_password_change_is_held_back() {
    let token = token_for(Uuid::new_v4(), UserRole::Admin, true);
    let app = test_app(lazy_pool());
    let response = app
        .oneshot(json_request(Method::GET, "/api/v1/dashboard", Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("Password change"));
}

#[tokio::test]
async fn test_scanner_cannot_change_password() {
    let token = token_for(Uuid::new_v4(), UserRole::User, false);
    let app = test_app(lazy_pool());
    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/auth/change-password",
            Some(&token),
            Some(json!({"oldPassword": "whatever", "newPassword": "long-enough-1"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_scan_with_blank_student_is_rejected() {
    let app = test_app(lazy_pool());
    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/scans",
            Some(&admin_token()),
            Some(json!({"eventId": Uuid::new_v4(), "studentId": "   "})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "validation_error");
}

#[tokio::test]
async fn test_scan_list_rejects_bad_cursor() {
    let app = test_app(lazy_pool());
    let response = app
        .oneshot(json_request(
            Method::GET,
            "/api/v1/scans?cursor=not-a-cursor",
            Some(&admin_token()),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_scanner_login_validates_pin_format() {
    let app = test_app(lazy_pool());
    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/auth/scanner-login",
            None,
            Some(json!({"pin": "12ab"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_rejects_invalid_token() {
    let app = test_app(lazy_pool());
    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(json!({"refreshToken": "not-a-jwt"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_access_token_is_not_a_refresh_token() {
    let app = test_app(lazy_pool());
    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(json!({"refreshToken": admin_token()})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_attempts_are_rate_limited_per_client() {
    let mut config = test_config();
    config.security.login_rate_limit_per_minute = 2;
    config.security.trust_forwarded_for = true;
    let app = common::app_with(config, lazy_pool(), clock_at(t0()));

    let attempt = |ip: &str| {
        let mut request = json_request(
            Method::POST,
            "/api/v1/auth/scanner-login",
            None,
            Some(json!({"pin": "x"})),
        );
        request
            .headers_mut()
            .insert("x-forwarded-for", ip.parse().unwrap());
        request
    };

    for _ in 0..2 {
        let response = app.clone().oneshot(attempt("203.0.113.9")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let limited = app.clone().oneshot(attempt("203.0.113.9")).await.unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key(header::RETRY_AFTER));

    let other = app.oneshot(attempt("203.0.113.10")).await.unwrap();
    assert_eq!(other.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rotating_forwarded_for_does_not_bypass_login_limit() {
    let mut config = test_config();
    config.security.login_rate_limit_per_minute = 2;
    let app = common::app_with(config, lazy_pool(), clock_at(t0()));
    let peer: SocketAddr = "198.51.100.4:52000".parse().unwrap();

    let attempt = |n: u8, peer: SocketAddr| {
        let mut request = json_request(
            Method::POST,
            "/api/v1/auth/scanner-login",
            None,
            Some(json!({"pin": "x"})),
        );
        request
            .headers_mut()
            .insert("x-forwarded-for", format!("203.0.113.{}", n).parse().unwrap());
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    };

    for n in 0..2 {
        let response = app.clone().oneshot(attempt(n, peer)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    for n in 2..10 {
        let response = app.clone().oneshot(attempt(n, peer)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    let other_peer: SocketAddr = "198.51.100.5:52000".parse().unwrap();
    let response = app.oneshot(attempt(0, other_peer)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
