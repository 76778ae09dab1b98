//! Scan admission, ledger browsing and dashboard counts against a real database.
//!
//! Requires `TEST_DATABASE_URL`; each test returns early without it.

mod common;

use axum::http::{Method, StatusCode};
use axum::Router;
use chrono::{Duration, TimeZone, Utc};
use common::{
    admin_token, app_with, body_json, clock_at, create_event, create_permanent_event,
    create_scanner, json_request, t0, test_app, test_config, test_pool, unique_student,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

async fn scan(app: &Router, token: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(json_request(Method::POST, "/api/v1/scans", Some(token), Some(body)))
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

#[tokio::test]
async fn test_once_per_event_flags_repeat() {
    let Some(pool) = test_pool().await else { return };
    let scanner = create_scanner(&pool, true).await;
    let event = create_event(&pool, "ONCE_PER_EVENT", true, &[(scanner.id, None)]).await;
    let app = test_app(pool);
    let student = unique_student();

    let (status, first) = scan(
        &app,
        &scanner.token(),
        json!({"eventId": event, "studentId": format!("  {}  ", student)}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["status"], "SUCCESS");
    assert_eq!(first["studentId"], student);
    assert_eq!(first["duplicateCount"], 0);
    assert_eq!(first["eventStatus"], "ONGOING");
    assert_eq!(first["scannerId"], scanner.id.to_string());

    let (status, second) = scan(
        &app,
        &scanner.token(),
        json!({"eventId": event, "studentId": student}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["status"], "DUPLICATE");
    assert_eq!(second["duplicateCount"], 1);
    assert_eq!(second["lastScanAt"], first["timestamp"]);
    assert_eq!(second["message"], "Student already checked in");
}

#[tokio::test]
async fn test_allow_duplicates_accepts_every_scan() {
    let Some(pool) = test_pool().await else { return };
    let scanner = create_scanner(&pool, true).await;
    let event = create_event(&pool, "ALLOW_DUPLICATES", true, &[(scanner.id, None)]).await;
    let app = test_app(pool);
    let student = unique_student();

    for _ in 0..3 {
        let (status, body) = scan(
            &app,
            &scanner.token(),
            json!({"eventId": event, "studentId": student}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "SUCCESS");
    }
}

#[tokio::test]
async fn test_once_per_day_resets_next_day() {
    let Some(pool) = test_pool().await else { return };
    let scanner = create_scanner(&pool, true).await;
    let event = create_permanent_event(&pool, "ONCE_PER_DAY", &[(scanner.id, None)]).await;
    let student = unique_student();
    let body = json!({"eventId": event, "studentId": student});

    let today = test_app(pool.clone());
    let (_, first) = scan(&today, &scanner.token(), body.clone()).await;
    assert_eq!(first["status"], "SUCCESS");
    let (_, again) = scan(&today, &scanner.token(), body.clone()).await;
    assert_eq!(again["status"], "DUPLICATE");

    let tomorrow = app_with(test_config(), pool, clock_at(t0() + Duration::days(1)));
    let (status, next_day) = scan(&tomorrow, &scanner.token(), body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(next_day["status"], "SUCCESS");
    assert_eq!(next_day["duplicateCount"], 1);
}

#[tokio::test]
async fn test_admin_override_accepts_duplicate() {
    let Some(pool) = test_pool().await else { return };
    let scanner = create_scanner(&pool, true).await;
    let event = create_event(&pool, "ONCE_PER_EVENT", true, &[(scanner.id, None)]).await;
    let app = test_app(pool);
    let student = unique_student();

    let (_, first) = scan(
        &app,
        &scanner.token(),
        json!({"eventId": event, "studentId": student}),
    )
    .await;
    assert_eq!(first["status"], "SUCCESS");

    let (status, overridden) = scan(
        &app,
        &admin_token(),
        json!({
            "eventId": event,
            "studentId": student,
            "override": true,
            "overrideReason": "Lost wristband"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(overridden["status"], "DUPLICATE_OVERRIDE");
    assert_eq!(overridden["isOverride"], true);
    assert_eq!(overridden["overrideReason"], "Lost wristband");
}

#[tokio::test]
async fn test_override_without_duplicate_is_plain_success() {
    let Some(pool) = test_pool().await else { return };
    let event = create_event(&pool, "ONCE_PER_EVENT", true, &[]).await;
    let app = test_app(pool);

    let (status, body) = scan(
        &app,
        &admin_token(),
        json!({"eventId": event, "studentId": unique_student(), "override": true}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "SUCCESS");
}

#[tokio::test]
async fn test_scanner_override_refused_by_default() {
    let Some(pool) = test_pool().await else { return };
    let scanner = create_scanner(&pool, true).await;
    let event = create_event(&pool, "ONCE_PER_EVENT", true, &[(scanner.id, None)]).await;
    let app = test_app(pool);

    let (status, body) = scan(
        &app,
        &scanner.token(),
        json!({"eventId": event, "studentId": unique_student(), "override": true}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn test_scanner_override_when_allowed() {
    let Some(pool) = test_pool().await else { return };
    let scanner = create_scanner(&pool, true).await;
    let event = create_event(&pool, "ONCE_PER_EVENT", true, &[(scanner.id, None)]).await;
    let mut config = test_config();
    config.scanning.allow_scanner_override = true;
    let app = app_with(config, pool, clock_at(t0()));
    let student = unique_student();

    scan(&app, &scanner.token(), json!({"eventId": event, "studentId": student})).await;
    let (status, body) = scan(
        &app,
        &scanner.token(),
        json!({"eventId": event, "studentId": student, "override": true}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "DUPLICATE_OVERRIDE");
}

#[tokio::test]
async fn test_unassigned_scanner_is_refused() {
    let Some(pool) = test_pool().await else { return };
    let scanner = create_scanner(&pool, true).await;
    let event = create_event(&pool, "ONCE_PER_EVENT", true, &[]).await;
    let app = test_app(pool);

    let (status, _) = scan(
        &app,
        &scanner.token(),
        json!({"eventId": event, "studentId": unique_student()}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_disabled_scanner_is_refused() {
    let Some(pool) = test_pool().await else { return };
    let scanner = create_scanner(&pool, false).await;
    let event = create_event(&pool, "ONCE_PER_EVENT", true, &[(scanner.id, None)]).await;
    let app = test_app(pool);

    let (status, _) = scan(
        &app,
        &scanner.token(),
        json!({"eventId": event, "studentId": unique_student()}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_scan_on_missing_event() {
    let Some(pool) = test_pool().await else { return };
    let app = test_app(pool);

    let (status, _) = scan(
        &app,
        &admin_token(),
        json!({"eventId": Uuid::new_v4(), "studentId": unique_student()}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_scan_outside_window_is_recorded_as_error() {
    let Some(pool) = test_pool().await else { return };
    let scanner = create_scanner(&pool, true).await;
    let event = create_event(&pool, "ONCE_PER_EVENT", true, &[(scanner.id, None)]).await;
    let evening = Utc.with_ymd_and_hms(2024, 9, 1, 19, 30, 0).unwrap();
    let app = app_with(test_config(), pool, clock_at(evening));

    let (status, body) = scan(
        &app,
        &scanner.token(),
        json!({"eventId": event, "studentId": unique_student()}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "ERROR");
    assert_eq!(body["eventStatus"], "COMPLETED");
    assert_eq!(body["message"], "Event has already ended");

    let ledger = body_json(
        app.oneshot(json_request(
            Method::GET,
            &format!("/api/v1/scans?eventId={}", event),
            Some(&admin_token()),
            None,
        ))
        .await
        .unwrap(),
    )
    .await;
    assert_eq!(ledger["scans"].as_array().unwrap().len(), 1);
    assert_eq!(ledger["scans"][0]["status"], "ERROR");
}

#[tokio::test]
async fn test_scan_with_scanning_disabled() {
    let Some(pool) = test_pool().await else { return };
    let scanner = create_scanner(&pool, true).await;
    let event = create_event(&pool, "ONCE_PER_EVENT", false, &[(scanner.id, None)]).await;
    let app = test_app(pool);

    let (status, body) = scan(
        &app,
        &scanner.token(),
        json!({"eventId": event, "studentId": unique_student()}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "ERROR");
    assert_eq!(body["message"], "Scanning is disabled for this event");
}

#[tokio::test]
async fn test_error_scans_do_not_count_as_check_ins() {
    let Some(pool) = test_pool().await else { return };
    let scanner = create_scanner(&pool, true).await;
    let event = create_event(&pool, "ONCE_PER_EVENT", true, &[(scanner.id, None)]).await;
    let student = unique_student();
    let body = json!({"eventId": event, "studentId": student});

    let early = Utc.with_ymd_and_hms(2024, 9, 1, 7, 0, 0).unwrap();
    let before_open = app_with(test_config(), pool.clone(), clock_at(early));
    let (status, _) = scan(&before_open, &scanner.token(), body.clone()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, accepted) = scan(&test_app(pool), &scanner.token(), body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(accepted["status"], "SUCCESS");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_scans_admit_exactly_one() {
    let Some(pool) = test_pool().await else { return };
    let scanner = create_scanner(&pool, true).await;
    let event = create_event(&pool, "ONCE_PER_EVENT", true, &[(scanner.id, None)]).await;
    let app = test_app(pool);
    let student = unique_student();
    let token = scanner.token();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let app = app.clone();
            let token = token.clone();
            let body = json!({"eventId": event, "studentId": student});
            tokio::spawn(async move { scan(&app, &token, body).await })
        })
        .collect();

    let mut statuses = Vec::new();
    for handle in handles {
        let (code, body) = handle.await.unwrap();
        assert_eq!(code, StatusCode::CREATED);
        statuses.push(body["status"].as_str().unwrap().to_string());
    }

    assert_eq!(statuses.iter().filter(|s| *s == "SUCCESS").count(), 1);
    assert_eq!(statuses.iter().filter(|s| *s == "DUPLICATE").count(), 7);
}

#[tokio::test]
async fn test_scan_list_pages_with_cursor() {
    let Some(pool) = test_pool().await else { return };
    let event = create_event(&pool, "ALLOW_DUPLICATES", true, &[]).await;
    let app = test_app(pool);

    let mut ids = Vec::new();
    for _ in 0..3 {
        let (_, body) = scan(
            &app,
            &admin_token(),
            json!({"eventId": event, "studentId": unique_student()}),
        )
        .await;
        ids.push(body["id"].as_str().unwrap().to_string());
    }

    let first = body_json(
        app.clone()
            .oneshot(json_request(
                Method::GET,
                &format!("/api/v1/scans?eventId={}&limit=2", event),
                Some(&admin_token()),
                None,
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(first["scans"].as_array().unwrap().len(), 2);
    assert_eq!(first["pagination"]["hasMore"], true);
    let cursor = first["pagination"]["nextCursor"].as_str().unwrap();

    let second = body_json(
        app.clone()
            .oneshot(json_request(
                Method::GET,
                &format!("/api/v1/scans?eventId={}&limit=2&cursor={}", event, cursor),
                Some(&admin_token()),
                None,
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(second["scans"].as_array().unwrap().len(), 1);
    assert_eq!(second["pagination"]["hasMore"], false);
    assert!(second["pagination"].get("nextCursor").is_none());

    let mut seen: Vec<String> = first["scans"]
        .as_array()
        .unwrap()
        .iter()
        .chain(second["scans"].as_array().unwrap())
        .map(|s| s["id"].as_str().unwrap().to_string())
        .collect();
    seen.sort();
    ids.sort();
    assert_eq!(seen, ids);

    let one = app
        .oneshot(json_request(
            Method::GET,
            &format!("/api/v1/scans/{}", ids[0]),
            Some(&admin_token()),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(one.status(), StatusCode::OK);
    assert_eq!(body_json(one).await["eventId"], event.to_string());
}

#[tokio::test]
async fn test_scan_list_filters_by_status() {
    let Some(pool) = test_pool().await else { return };
    let event = create_event(&pool, "ONCE_PER_EVENT", true, &[]).await;
    let app = test_app(pool);
    let student = unique_student();

    for _ in 0..2 {
        scan(&app, &admin_token(), json!({"eventId": event, "studentId": student})).await;
    }

    let body = body_json(
        app.oneshot(json_request(
            Method::GET,
            &format!("/api/v1/scans?eventId={}&status=DUPLICATE", event),
            Some(&admin_token()),
            None,
        ))
        .await
        .unwrap(),
    )
    .await;
    let scans = body["scans"].as_array().unwrap();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0]["status"], "DUPLICATE");
}

#[tokio::test]
async fn test_dashboard_overview_counts() {
    let Some(pool) = test_pool().await else { return };
    let event = create_event(&pool, "ONCE_PER_EVENT", true, &[]).await;
    let app = test_app(pool);
    let student = unique_student();

    for _ in 0..2 {
        scan(&app, &admin_token(), json!({"eventId": event, "studentId": student})).await;
    }

    let response = app
        .oneshot(json_request(Method::GET, "/api/v1/dashboard", Some(&admin_token()), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let overview = body_json(response).await;
    assert!(overview["events"]["total"].as_i64().unwrap() >= 1);
    assert!(overview["events"]["ongoing"].as_i64().unwrap() >= 1);
    assert!(overview["totalScans"].as_i64().unwrap() >= 2);
    assert!(overview["today"]["accepted"].as_i64().unwrap() >= 1);
    assert!(overview["today"]["duplicates"].as_i64().unwrap() >= 1);
}
