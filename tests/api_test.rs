use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use coachdesk::api::router;
use coachdesk::db::MemoryStore;
use coachdesk::state::AppState;

fn app() -> Router {
    router(AppState::new(Arc::new(MemoryStore::new())))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .expect("Failed to build request");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("Failed to call router");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    // axum's own rejections are plain text
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn create_coach(app: &Router, name: &str) -> i64 {
    let (status, coach) = send(app, Method::POST, "/coaches", Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    coach["id"].as_i64().expect("coach id")
}

#[tokio::test]
async fn test_health() {
    let (status, _) = send(&app(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_duplicate_coach_name_conflicts() {
    let app = app();
    create_coach(&app, "黃教練").await;

    let (status, body) = send(&app, Method::POST, "/coaches", Some(json!({ "name": " 黃教練 " }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "409 Conflict");
}

#[tokio::test]
async fn test_recurring_preview_and_create() {
    let app = app();
    let coach_id = create_coach(&app, "黃教練").await;
    let pattern = json!({
        "start_date": "2025-07-01",
        "end_date": "2025-07-14",
        "weekdays": [2, 4],
        "start_time": "09:00",
        "end_time": "10:30"
    });

    let (status, preview) = send(&app, Method::POST, "/timeslots/recurring/preview", Some(pattern.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["count"], 4);
    assert_eq!(preview["dates"][0], "2025-07-01");

    let mut body = pattern;
    body["coach_id"] = json!(coach_id);
    let (status, created) = send(&app, Method::POST, "/timeslots/recurring", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created.as_array().map(Vec::len), Some(4));
    assert_eq!(created[0]["status"], "available");
    assert_eq!(created[0]["coach_name"], "黃教練");

    let (_, listed) = send(&app, Method::GET, &format!("/timeslots?coach_id={}", coach_id), None).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(4));
}

#[tokio::test]
async fn test_recurring_without_matching_dates_is_unprocessable() {
    let app = app();
    let coach_id = create_coach(&app, "黃教練").await;
    let body = json!({
        "coach_id": coach_id,
        "start_date": "2025-07-06",
        "end_date": "2025-07-06",
        "weekdays": [1],
        "start_time": "09:00",
        "end_time": "10:00"
    });

    let (status, _) = send(&app, Method::POST, "/timeslots/recurring", Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        Method::POST,
        "/timeslots/recurring/preview",
        Some(json!({ "start_date": "2025-07-06", "weekdays": [1] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_assignment_lifecycle_moves_slot_status() {
    let app = app();
    let coach_id = create_coach(&app, "黃教練").await;
    let (_, slot) = send(
        &app,
        Method::POST,
        "/timeslots",
        Some(json!({
            "coach_id": coach_id,
            "start_time": "2025-07-10T09:00:00",
            "end_time": "2025-07-10T10:00:00"
        })),
    )
    .await;
    let slot_id = slot["id"].as_i64().expect("slot id");

    let (status, assignment) = send(
        &app,
        Method::POST,
        "/assignments",
        Some(json!({ "time_slot_id": slot_id, "client_name": "林小姐", "topic": "職涯規劃" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(assignment["status"], "pending");
    assert_eq!(assignment["priority"], "medium");
    let id = assignment["id"].as_i64().expect("assignment id");

    // 予約済みのスロットには重ねて割り当てできない
    let (status, _) = send(
        &app,
        Method::POST,
        "/assignments",
        Some(json!({ "time_slot_id": slot_id, "client_name": "陳先生", "topic": "面試" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, Method::DELETE, &format!("/timeslots/{}", slot_id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, confirmed) = send(&app, Method::PATCH, &format!("/assignments/{}/confirm", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["status"], "confirmed");

    let (_, slots) = send(&app, Method::GET, "/timeslots", None).await;
    assert_eq!(slots[0]["status"], "confirmed");

    let (status, _) = send(&app, Method::PATCH, &format!("/assignments/{}/reject", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, cancelled) = send(&app, Method::PATCH, &format!("/assignments/{}/cancel", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (_, slots) = send(&app, Method::GET, "/timeslots", None).await;
    assert_eq!(slots[0]["status"], "available");

    let (status, _) = send(&app, Method::DELETE, &format!("/timeslots/{}", slot_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_import_preview_then_commit() {
    let app = app();
    create_coach(&app, "Amy Chen").await;
    let csv = "coachName,startTime,endTime,status\n\
               新教練,2025-07-10T09:00,2025-07-10T10:00,available\n\
               Amy Chen,2025-07-11T09:00,2025-07-11T10:00,\n";

    let (status, preview) = send(&app, Method::POST, "/imports/timeslots/preview", Some(json!({ "csv": csv }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["kind"], "timeslots");
    assert_eq!(preview["missing_coaches"][0]["name"], "新教練");
    assert_eq!(preview["clean"].as_array().map(Vec::len), Some(1));

    let (status, summary) = send(
        &app,
        Method::POST,
        "/imports/timeslots/commit",
        Some(json!({ "csv": csv, "create_coaches": ["新教練"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["added"], 2);
    assert_eq!(summary["coaches_created"], 1);

    // 同じファイルを再度取り込むと二件とも重複になり、解決が必要
    let (status, _) = send(&app, Method::POST, "/imports/timeslots/commit", Some(json!({ "csv": csv }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, summary) = send(
        &app,
        Method::POST,
        "/imports/timeslots/commit",
        Some(json!({ "csv": csv, "resolutions": { "0": "skip", "1": "keep" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["skipped"], 1);
    assert_eq!(summary["kept"], 1);
}

#[tokio::test]
async fn test_unknown_import_kind_is_rejected() {
    let (status, _) = send(&app(), Method::POST, "/imports/payments/preview", Some(json!({ "csv": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

async fn create_slot(app: &Router, coach_id: i64, day: u32) -> i64 {
    let (status, slot) = send(
        app,
        Method::POST,
        "/timeslots",
        Some(json!({
            "coach_id": coach_id,
            "start_time": format!("2025-07-{:02}T09:00:00", day),
            "end_time": format!("2025-07-{:02}T10:00:00", day)
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    slot["id"].as_i64().expect("slot id")
}

#[tokio::test]
async fn test_coach_rename_reaches_slots_and_assignments() {
    let app = app();
    let coach_id = create_coach(&app, "黃教練").await;
    let slot_id = create_slot(&app, coach_id, 10).await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/assignments",
        Some(json!({ "time_slot_id": slot_id, "client_name": "林小姐", "topic": "職涯規劃" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, coach) = send(
        &app,
        Method::PATCH,
        &format!("/coaches/{}", coach_id),
        Some(json!({ "name": "黃大明", "phone": " 0912-345-678 " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(coach["name"], "黃大明");
    assert_eq!(coach["phone"], "0912-345-678");

    let (_, slots) = send(&app, Method::GET, "/timeslots", None).await;
    assert_eq!(slots[0]["coach_name"], "黃大明");
    let (_, assignments) = send(&app, Method::GET, "/assignments", None).await;
    assert_eq!(assignments[0]["coach_name"], "黃大明");

    create_coach(&app, "李教練").await;
    let (status, _) = send(&app, Method::PATCH, &format!("/coaches/{}", coach_id), Some(json!({ "name": "李教練" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, Method::PATCH, "/coaches/99", Some(json!({ "bio": "x" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_coach_waits_for_active_assignments() {
    let app = app();
    let coach_id = create_coach(&app, "黃教練").await;
    let slot_id = create_slot(&app, coach_id, 10).await;
    let (_, assignment) = send(
        &app,
        Method::POST,
        "/assignments",
        Some(json!({ "time_slot_id": slot_id, "client_name": "林小姐", "topic": "職涯規劃" })),
    )
    .await;
    let assignment_id = assignment["id"].as_i64().expect("assignment id");

    let (status, _) = send(&app, Method::DELETE, &format!("/coaches/{}", coach_id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, Method::PATCH, &format!("/assignments/{}/reject", assignment_id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::DELETE, &format!("/coaches/{}", coach_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, coaches) = send(&app, Method::GET, "/coaches", None).await;
    assert_eq!(coaches.as_array().map(Vec::len), Some(0));
    let (_, slots) = send(&app, Method::GET, "/timeslots", None).await;
    assert_eq!(slots.as_array().map(Vec::len), Some(0));
    // 過去の割り当ては名前だけ残る
    let (_, assignments) = send(&app, Method::GET, "/assignments", None).await;
    assert_eq!(assignments[0]["coach_name"], "黃教練");
    assert_eq!(assignments[0]["coach_id"], Value::Null);

    let (status, _) = send(&app, Method::DELETE, &format!("/coaches/{}", coach_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_coach_status_toggle_and_batch() {
    let app = app();
    let first = create_coach(&app, "黃教練").await;
    let second = create_coach(&app, "李教練").await;

    let (status, coach) = send(&app, Method::PATCH, &format!("/coaches/{}/status", first), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(coach["status"], "inactive");

    let (status, changed) = send(
        &app,
        Method::PATCH,
        "/coaches",
        Some(json!({ "ids": [first, second], "status": "active" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(changed.as_array().map(Vec::len), Some(2));
    assert!(changed.as_array().expect("list").iter().all(|c| c["status"] == "active"));

    let (status, _) = send(&app, Method::DELETE, "/coaches", Some(json!({ "ids": [first, 99] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::DELETE, "/coaches", Some(json!({ "ids": [first, second] }))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, coaches) = send(&app, Method::GET, "/coaches", None).await;
    assert_eq!(coaches.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_batch_delete_time_slots() {
    let app = app();
    let coach_id = create_coach(&app, "黃教練").await;
    let kept = create_slot(&app, coach_id, 10).await;
    let a = create_slot(&app, coach_id, 11).await;
    let b = create_slot(&app, coach_id, 12).await;

    let (status, _) = send(&app, Method::DELETE, "/timeslots", Some(json!({ "ids": [a, b] }))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, slots) = send(&app, Method::GET, "/timeslots", None).await;
    assert_eq!(slots.as_array().map(Vec::len), Some(1));
    assert_eq!(slots[0]["id"], kept);
}
