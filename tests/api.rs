#![cfg(feature = "server")]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::Value;
use tower::ServiceExt;

use chart_defaults::api::{router, AppState};
use chart_defaults::{
    add_membership, create_business, default_catalog, setup_database, ChartRepository,
    DefaultsService, NewTransaction, Role,
};

const OWNER: i64 = 1;
const STRANGER: i64 = 99;

fn database() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    setup_database(&conn).unwrap();
    let business = create_business(&conn, "Acme Consulting").unwrap();
    add_membership(&conn, business.id, OWNER, Role::Owner).unwrap();
    conn
}

/// Seeded business with one Travel → Airfare transaction.
fn database_with_transaction() -> Connection {
    let mut conn = database();
    let business = {
        let mut service = DefaultsService::new(&mut conn);
        service.seed_defaults(OWNER).unwrap();
        service.resolve_business(OWNER).unwrap()
    };

    let repo = ChartRepository::new(&conn, &business);
    let airfare = repo.find_subcategories_named("Airfare").unwrap().remove(0);
    assert_eq!(
        repo.categories().unwrap().iter().find(|c| c.id == airfare.category_id).unwrap().name,
        "Travel & Meals: Travel"
    );
    let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    repo.insert_transaction(&NewTransaction::new(airfare.id, date, 32_000, "Flight"))
        .unwrap();
    conn
}

async fn send(app: &Router, method: &str, uri: &str, user: Option<i64>, body: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        request = request.header("X-User-Id", user.to_string());
    }
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn health_check_responds() {
    let app = router(AppState::new(database()));

    let (status, body) = send(&app, "GET", "/api/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], "OK");
}

#[tokio::test]
async fn seed_then_reseed() {
    let app = router(AppState::new(database()));

    let (status, body) = send(&app, "POST", "/api/defaults/seed", Some(OWNER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["already_seeded"], false);
    assert_eq!(
        body["data"]["categories_created"],
        default_catalog().category_count() as u64
    );

    let (status, body) = send(&app, "POST", "/api/defaults/seed", Some(OWNER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["already_seeded"], true);
    assert_eq!(body["data"]["categories_created"], 0);
    assert_eq!(body["data"]["subcategories_created"], 0);
}

#[tokio::test]
async fn mutating_routes_reject_get() {
    let app = router(AppState::new(database()));

    let (seed, _) = send(&app, "GET", "/api/defaults/seed", Some(OWNER), None).await;
    let (rebuild, _) = send(&app, "GET", "/api/defaults/rebuild", Some(OWNER), None).await;

    assert_eq!(seed, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(rebuild, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let app = router(AppState::new(database()));

    let (status, body) = send(&app, "POST", "/api/defaults/seed", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn user_without_business_is_forbidden() {
    let app = router(AppState::new(database()));

    let (seed, _) = send(&app, "POST", "/api/defaults/seed", Some(STRANGER), None).await;
    let (status, _) = send(&app, "GET", "/api/defaults/status", Some(STRANGER), None).await;

    assert_eq!(seed, StatusCode::FORBIDDEN);
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn rebuild_requires_confirmation() {
    let app = router(AppState::new(database()));

    let (no_body, _) = send(&app, "POST", "/api/defaults/rebuild", Some(OWNER), None).await;
    let (wrong, _) = send(
        &app,
        "POST",
        "/api/defaults/rebuild",
        Some(OWNER),
        Some(r#"{"confirm":"yes"}"#),
    )
    .await;

    assert_eq!(no_body, StatusCode::BAD_REQUEST);
    assert_eq!(wrong, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rebuild_completes_without_transactions() {
    let app = router(AppState::new(database()));
    send(&app, "POST", "/api/defaults/seed", Some(OWNER), None).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/defaults/rebuild",
        Some(OWNER),
        Some(r#"{"confirm":"REBUILD"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(
        body["categories_deleted"],
        default_catalog().category_count() as u64
    );
    assert_eq!(
        body["categories_created"],
        default_catalog().category_count() as u64
    );
}

#[tokio::test]
async fn rebuild_blocked_by_transactions() {
    let app = router(AppState::new(database_with_transaction()));
    let (_, before) = send(&app, "GET", "/api/chart", Some(OWNER), None).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/defaults/rebuild",
        Some(OWNER),
        Some(r#"{"confirm":"REBUILD"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "blocked");
    assert!(body["message"].as_str().unwrap().contains("use re-seed instead"));

    let (_, after) = send(&app, "GET", "/api/chart", Some(OWNER), None).await;
    assert_eq!(before, after);

    // Re-seed stays available
    let (status, _) = send(&app, "POST", "/api/defaults/seed", Some(OWNER), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn status_is_read_only() {
    let app = router(AppState::new(database()));

    let (status, first) = send(&app, "GET", "/api/defaults/status", Some(OWNER), None).await;
    let (_, second) = send(&app, "GET", "/api/defaults/status", Some(OWNER), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);
    assert_eq!(first["data"]["has_seeded"], false);
    assert_eq!(first["data"]["can_rebuild"], true);
    assert_eq!(first["data"]["category_count"], 0);
}

#[tokio::test]
async fn status_after_transaction_disallows_rebuild() {
    let app = router(AppState::new(database_with_transaction()));

    let (_, body) = send(&app, "GET", "/api/defaults/status", Some(OWNER), None).await;

    assert_eq!(body["data"]["has_seeded"], true);
    assert_eq!(body["data"]["can_rebuild"], false);
    assert_eq!(body["data"]["transaction_count"], 1);
    assert_eq!(
        body["data"]["applied_catalog_version"],
        default_catalog().version
    );
}

#[tokio::test]
async fn select_business_switches_scope() {
    let conn = database();
    let second = create_business(&conn, "Acme Drones").unwrap();
    add_membership(&conn, second.id, OWNER, Role::Admin).unwrap();
    let app = router(AppState::new(conn));
    send(&app, "POST", "/api/defaults/seed", Some(OWNER), None).await;

    let body = format!(r#"{{"business_id":{}}}"#, second.id);
    let (status, selected) =
        send(&app, "POST", "/api/business/select", Some(OWNER), Some(&body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(selected["data"]["name"], "Acme Drones");
    let (_, status) = send(&app, "GET", "/api/defaults/status", Some(OWNER), None).await;
    assert_eq!(status["data"]["business_id"], second.id);
    assert_eq!(status["data"]["has_seeded"], false);
}

#[tokio::test]
async fn select_business_rejects_non_member() {
    let conn = database();
    let theirs = create_business(&conn, "Someone Else LLC").unwrap();
    add_membership(&conn, theirs.id, STRANGER, Role::Owner).unwrap();
    let app = router(AppState::new(conn));

    let body = format!(r#"{{"business_id":{}}}"#, theirs.id);
    let (status, response) =
        send(&app, "POST", "/api/business/select", Some(OWNER), Some(&body)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(response["success"], false);

    // Still acting for the original business
    let (_, status) = send(&app, "GET", "/api/defaults/status", Some(OWNER), None).await;
    assert_ne!(status["data"]["business_id"], theirs.id);
}

#[tokio::test]
async fn select_business_requires_identity() {
    let app = router(AppState::new(database()));

    let (status, _) =
        send(&app, "POST", "/api/business/select", None, Some(r#"{"business_id":1}"#)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
