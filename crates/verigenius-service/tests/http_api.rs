use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use verigenius_adapters::{demo_records, MemoryAuditSink, MemoryStudentStore};
use verigenius_core::MatchPolicy;
use verigenius_service::{build_router, ServiceState};

fn test_app() -> (Router, Arc<MemoryAuditSink>) {
    let store = Arc::new(MemoryStudentStore::with_records(demo_records()));
    let sink = Arc::new(MemoryAuditSink::new());
    let state =
        ServiceState::with_collaborators(store, sink.clone(), MatchPolicy::CaseInsensitiveBoth);
    (build_router(state), sink)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn validate(app: &Router, body: Value) -> (StatusCode, Value) {
    send(app, "POST", "/api/validate-student", Some(body)).await
}

#[tokio::test]
async fn known_student_is_validated_with_class_assignment() {
    let (app, sink) = test_app();

    let (status, body) = validate(
        &app,
        json!({"studentId": "1814 H-F", "firstName": "irinah", "lastName": "RAOEL"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["student"]["classId"], "L3-IG-G1");
    assert_eq!(body["student"]["firstName"], "Irinah");
    assert!(body["student"].get("recordId").is_none());

    let entries = sink.entries().await;
    assert_eq!(entries.len(), 1);
    assert!(entries[0].is_success);
}

#[tokio::test]
async fn malformed_matricule_is_rejected_and_audited() {
    let (app, sink) = test_app();

    let (status, body) = validate(
        &app,
        json!({"studentId": "bad-format", "firstName": "a", "lastName": "b"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["errors"]["studentId"].is_string());
    assert_eq!(sink.entries().await.len(), 1);
}

#[tokio::test]
async fn wrong_name_gets_one_generic_mismatch_message() {
    let (app, _) = test_app();

    let (status_first, body_first) = validate(
        &app,
        json!({"studentId": "1814 H-F", "firstName": "wrong", "lastName": "RAOEL"}),
    )
    .await;
    let (status_last, body_last) = validate(
        &app,
        json!({"studentId": "1814 H-F", "firstName": "Irinah", "lastName": "wrong"}),
    )
    .await;

    assert_eq!(status_first, StatusCode::FORBIDDEN);
    assert_eq!(status_last, StatusCode::FORBIDDEN);
    assert_eq!(body_first, body_last);
}

#[tokio::test]
async fn pending_payment_is_denied_with_status() {
    let (app, _) = test_app();

    let (status, body) = validate(
        &app,
        json!({"studentId": "2077 D-E", "firstName": "Miora", "lastName": "ANDRIANA"}),
    )
    .await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["success"], false);
    assert_eq!(body["status"], "pending_payment");
}

#[tokio::test]
async fn unknown_matricule_is_not_found() {
    let (app, _) = test_app();

    let (status, body) = validate(
        &app,
        json!({"studentId": "0001 A-A", "firstName": "x", "lastName": "y"}),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn crud_lifecycle_canonicalizes_and_protects_the_matricule() {
    let (app, _) = test_app();

    let payload = json!({
        "studentId": "2100 A-B",
        "firstName": "naina fitia",
        "lastName": "randria",
        "level": "M2",
        "fieldOfStudy": "IG",
        "status": "fully_paid",
        "classId": "M2-IG-G1"
    });

    let (status, created) = send(&app, "POST", "/api/students", Some(payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["firstName"], "Naina Fitia");
    assert_eq!(created["lastName"], "RANDRIA");
    let record_id = created["recordId"].as_str().unwrap().to_string();

    let (status, fetched) =
        send(&app, "GET", &format!("/api/students/{record_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["studentId"], "2100 A-B");

    // The matricule is immutable once assigned.
    let mut moved = payload.clone();
    moved["studentId"] = json!("2101 A-B");
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/students/{record_id}"),
        Some(moved),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut updated = payload.clone();
    updated["status"] = json!("inactive");
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/students/{record_id}"),
        Some(updated),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "inactive");

    let (status, _) = send(&app, "DELETE", &format!("/api/students/{record_id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &format!("/api/students/{record_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_matricule_is_a_conflict() {
    let (app, _) = test_app();

    let payload = json!({
        "studentId": "1814 H-F",
        "firstName": "Someone",
        "lastName": "ELSE",
        "level": "L3",
        "fieldOfStudy": "IG",
        "status": "fully_paid",
        "classId": "L3-IG-G1"
    });

    let (status, body) = send(&app, "POST", "/api/students", Some(payload)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn unknown_status_is_rejected_on_create() {
    let (app, _) = test_app();

    let payload = json!({
        "studentId": "2200 C-D",
        "firstName": "Vola",
        "lastName": "RAZAFY",
        "level": "L1",
        "fieldOfStudy": "SR",
        "status": "scholarship",
        "classId": "L1-SR-G1"
    });

    let (status, _) = send(&app, "POST", "/api/students", Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn logs_endpoint_lists_entries_newest_first() {
    let (app, _) = test_app();

    validate(
        &app,
        json!({"studentId": "1814 H-F", "firstName": "Irinah", "lastName": "RAOEL"}),
    )
    .await;
    validate(
        &app,
        json!({"studentId": "bad", "firstName": "", "lastName": ""}),
    )
    .await;

    let (status, body) = send(&app, "GET", "/api/logs?limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["returned"], 2);
    assert_eq!(body["items"][0]["statusCode"], 400);
    assert_eq!(body["items"][1]["statusCode"], 200);
    assert_eq!(body["items"][1]["isSuccess"], true);
}

#[tokio::test]
async fn health_reports_backends_and_policy() {
    let (app, _) = test_app();

    let (status, body) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storeBackend"], "memory");
    assert_eq!(body["auditBackend"], "memory");
    assert_eq!(body["matchPolicy"], "case_insensitive_both");
}
