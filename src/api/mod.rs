use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::{patch, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::store::COACHES;
use crate::error::AppError;
use crate::import::{Decisions, ImportKind, ImportPreview, ImportSummary, Resolution};
use crate::models::*;
use crate::services::recurring::{self, RecurringSlotRequest};
use crate::services::{ImportService, assignment_service, coach_service, slot_service};
use crate::state::AppState;

#[derive(Deserialize)]
struct TimeSlotQueryParams {
    #[serde(default)]
    coach_id: Option<i64>,
}

#[derive(Deserialize)]
struct RecurringSlotBody {
    coach_id: i64,
    #[serde(flatten)]
    pattern: RecurringSlotRequest,
}

#[derive(Serialize)]
struct RecurringPreview {
    count: usize,
    dates: Vec<NaiveDate>,
}

#[derive(Deserialize)]
struct ImportPreviewBody {
    csv: String,
}

#[derive(Deserialize)]
struct ImportCommitBody {
    csv: String,
    #[serde(default)]
    resolutions: std::collections::BTreeMap<usize, Resolution>,
    #[serde(default)]
    create_coaches: Vec<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/coaches",
            get(list_coaches)
                .post(create_coach)
                .patch(set_coaches_status)
                .delete(delete_coaches),
        )
        .route("/coaches/{id}", patch(update_coach).delete(delete_coach))
        .route("/coaches/{id}/status", patch(toggle_coach_status))
        .route(
            "/timeslots",
            get(list_time_slots)
                .post(create_time_slot)
                .delete(delete_time_slots),
        )
        .route("/timeslots/recurring", post(add_recurring))
        .route("/timeslots/recurring/preview", post(preview_recurring))
        .route("/timeslots/{id}", patch(update_time_slot).delete(delete_time_slot))
        .route("/assignments", get(list_assignments).post(create_assignment))
        .route("/assignments/{id}/{action}", patch(assignment_action))
        .route("/imports/{kind}/preview", post(preview_import))
        .route("/imports/{kind}/commit", post(commit_import))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.store.load(COACHES).await?;
    Ok(StatusCode::OK)
}

async fn list_coaches(State(state): State<AppState>) -> Result<Json<Vec<Coach>>, AppError> {
    let coaches = coach_service::list_coaches(state.store.as_ref()).await?;
    Ok(Json(coaches))
}

async fn create_coach(
    State(state): State<AppState>,
    Json(req): Json<NewCoachRequest>,
) -> Result<(StatusCode, Json<Coach>), AppError> {
    let coach = coach_service::create_coach(state.store.as_ref(), req).await?;
    Ok((StatusCode::CREATED, Json(coach)))
}

async fn update_coach(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCoachRequest>,
) -> Result<Json<Coach>, AppError> {
    let coach = coach_service::update_coach(state.store.as_ref(), id, req).await?;
    Ok(Json(coach))
}

async fn delete_coach(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    coach_service::delete_coach(state.store.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_coach_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Coach>, AppError> {
    let coach = coach_service::toggle_coach_status(state.store.as_ref(), id).await?;
    Ok(Json(coach))
}

async fn set_coaches_status(
    State(state): State<AppState>,
    Json(batch): Json<CoachStatusBatch>,
) -> Result<Json<Vec<Coach>>, AppError> {
    let coaches = coach_service::set_coaches_status(state.store.as_ref(), &batch.ids, batch.status).await?;
    Ok(Json(coaches))
}

async fn delete_coaches(
    State(state): State<AppState>,
    Json(batch): Json<IdBatch>,
) -> Result<StatusCode, AppError> {
    coach_service::delete_coaches(state.store.as_ref(), &batch.ids).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_time_slots(
    State(state): State<AppState>,
    Query(params): Query<TimeSlotQueryParams>,
) -> Result<Json<Vec<TimeSlot>>, AppError> {
    let slots = slot_service::list_time_slots(state.store.as_ref(), params.coach_id).await?;
    Ok(Json(slots))
}

async fn create_time_slot(
    State(state): State<AppState>,
    Json(req): Json<NewTimeSlotRequest>,
) -> Result<(StatusCode, Json<TimeSlot>), AppError> {
    let slot = slot_service::create_time_slot(state.store.as_ref(), req).await?;
    Ok((StatusCode::CREATED, Json(slot)))
}

async fn add_recurring(
    State(state): State<AppState>,
    Json(body): Json<RecurringSlotBody>,
) -> Result<(StatusCode, Json<Vec<TimeSlot>>), AppError> {
    let slots = slot_service::add_recurring(state.store.as_ref(), body.coach_id, &body.pattern).await?;
    Ok((StatusCode::CREATED, Json(slots)))
}

async fn preview_recurring(
    Json(req): Json<RecurringSlotRequest>,
) -> Result<Json<RecurringPreview>, AppError> {
    let dates = recurring::preview_dates(&req)?;
    Ok(Json(RecurringPreview { count: dates.len(), dates }))
}

async fn update_time_slot(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTimeSlotRequest>,
) -> Result<Json<TimeSlot>, AppError> {
    let slot = slot_service::update_time_slot(state.store.as_ref(), id, req).await?;
    Ok(Json(slot))
}

async fn delete_time_slot(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    slot_service::delete_time_slot(state.store.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_time_slots(
    State(state): State<AppState>,
    Json(batch): Json<IdBatch>,
) -> Result<StatusCode, AppError> {
    slot_service::delete_time_slots(state.store.as_ref(), &batch.ids).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_assignments(
    State(state): State<AppState>,
) -> Result<Json<Vec<Assignment>>, AppError> {
    let assignments = assignment_service::list_assignments(state.store.as_ref()).await?;
    Ok(Json(assignments))
}

async fn create_assignment(
    State(state): State<AppState>,
    Json(req): Json<NewAssignmentRequest>,
) -> Result<(StatusCode, Json<Assignment>), AppError> {
    let assignment = assignment_service::create_assignment(state.store.as_ref(), req).await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

async fn assignment_action(
    State(state): State<AppState>,
    Path((id, action)): Path<(i64, AssignmentAction)>,
) -> Result<Json<Assignment>, AppError> {
    let assignment = assignment_service::apply_action(state.store.as_ref(), id, action).await?;
    Ok(Json(assignment))
}

async fn preview_import(
    State(state): State<AppState>,
    Path(kind): Path<ImportKind>,
    Json(body): Json<ImportPreviewBody>,
) -> Result<Json<ImportPreview>, AppError> {
    let service = ImportService::new(state.store.clone());
    let preview = service.preview(kind, &body.csv).await?;
    Ok(Json(preview))
}

async fn commit_import(
    State(state): State<AppState>,
    Path(kind): Path<ImportKind>,
    Json(body): Json<ImportCommitBody>,
) -> Result<Json<ImportSummary>, AppError> {
    let decisions = Decisions {
        resolutions: body.resolutions,
        create_coaches: body.create_coaches,
    };
    let service = ImportService::new(state.store.clone());
    let summary = service.commit(kind, &body.csv, &decisions).await?;
    Ok(Json(summary))
}
