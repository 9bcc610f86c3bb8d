use chrono::Utc;
use tracing::info;

use crate::db::Store;
use crate::db::repository::{self, IdAllocator};
use crate::error::{AppError, ScheduleError};
use crate::models::{
    Assignment, AssignmentAction, AssignmentStatus, NewAssignmentRequest, SlotStatus,
};

pub async fn list_assignments(store: &dyn Store) -> Result<Vec<Assignment>, AppError> {
    let mut assignments = repository::fetch_assignments(store).await?;
    assignments.sort_by_key(|a| (a.start_time, a.id));
    Ok(assignments)
}

/// Binds a client case to an available slot, taking the slot out of the pool.
pub async fn create_assignment(
    store: &dyn Store,
    req: NewAssignmentRequest,
) -> Result<Assignment, AppError> {
    if req.client_name.trim().is_empty() || req.topic.trim().is_empty() {
        return Err(ScheduleError::Validation("client name and topic are required".to_string()).into());
    }

    let before = repository::load_dataset(store).await?;
    let mut data = before.clone();
    let id = IdAllocator::for_dataset(&data).next_id();
    let now = Utc::now();

    let slot = data
        .time_slots
        .iter()
        .find(|s| s.id == req.time_slot_id)
        .cloned()
        .ok_or(AppError::NotFound)?;
    if slot.status != SlotStatus::Available {
        return Err(AppError::Conflict(format!(
            "slot {} is {}, not available",
            slot.id, slot.status
        )));
    }
    let coach = data
        .find_coach(slot.coach_id)
        .cloned()
        .ok_or_else(|| ScheduleError::ParentNotFound(format!("id {}", slot.coach_id)))?;

    let assignment = Assignment {
        id,
        time_slot_id: Some(slot.id),
        coach_id: Some(coach.id),
        coach_name: coach.name,
        client_name: req.client_name.trim().to_string(),
        client_contact: req.client_contact.trim().to_string(),
        topic: req.topic.trim().to_string(),
        priority: req.priority,
        status: AssignmentStatus::Pending,
        start_time: slot.start_time,
        end_time: slot.end_time,
        notes: req.notes,
        created_at: now,
        updated_at: now,
    };

    set_slot_status(&mut data.time_slots, slot.id, SlotStatus::Assigned);
    data.assignments.push(assignment.clone());
    repository::save_changes(store, &before, &data).await?;

    info!("Assignment {} created on slot {}", assignment.id, slot.id);
    Ok(assignment)
}

fn set_slot_status(slots: &mut [crate::models::TimeSlot], slot_id: i64, status: SlotStatus) {
    if let Some(slot) = slots.iter_mut().find(|s| s.id == slot_id) {
        slot.status = status;
        slot.updated_at = Utc::now();
    }
}

/// Next assignment status and, if it changes, the slot's new status.
fn transition(
    current: AssignmentStatus,
    action: AssignmentAction,
) -> Option<(AssignmentStatus, Option<SlotStatus>)> {
    use AssignmentAction::*;
    use AssignmentStatus::*;

    match (current, action) {
        (Pending, Confirm) => Some((Confirmed, Some(SlotStatus::Confirmed))),
        (Pending, Reject) => Some((Rejected, Some(SlotStatus::Available))),
        (Pending | Confirmed, Cancel) => Some((Cancelled, Some(SlotStatus::Available))),
        (Confirmed, Complete) => Some((Completed, None)),
        _ => None,
    }
}

pub async fn apply_action(
    store: &dyn Store,
    id: i64,
    action: AssignmentAction,
) -> Result<Assignment, AppError> {
    let before = repository::load_dataset(store).await?;
    let mut data = before.clone();

    let assignment = data
        .assignments
        .iter_mut()
        .find(|a| a.id == id)
        .ok_or(AppError::NotFound)?;

    let (status, slot_status) = transition(assignment.status, action).ok_or_else(|| {
        AppError::Conflict(format!(
            "cannot {:?} an assignment that is {:?}",
            action, assignment.status
        ))
    })?;

    assignment.status = status;
    assignment.updated_at = Utc::now();
    let updated = assignment.clone();

    if let (Some(slot_status), Some(slot_id)) = (slot_status, updated.time_slot_id) {
        set_slot_status(&mut data.time_slots, slot_id, slot_status);
    }

    repository::save_changes(store, &before, &data).await?;
    info!("Assignment {} is now {:?}", updated.id, updated.status);
    Ok(updated)
}
