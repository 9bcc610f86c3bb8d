use chrono::Utc;
use tracing::info;

use crate::db::Store;
use crate::db::repository::{self, Dataset, IdAllocator};
use crate::error::{AppError, ScheduleError};
use crate::models::{NewTimeSlotRequest, SlotStatus, TimeSlot, UpdateTimeSlotRequest};
use crate::services::recurring::{self, RecurringSlotRequest};

pub async fn list_time_slots(
    store: &dyn Store,
    coach_id: Option<i64>,
) -> Result<Vec<TimeSlot>, AppError> {
    let mut slots: Vec<TimeSlot> = repository::fetch_time_slots(store)
        .await?
        .into_iter()
        .filter(|s| coach_id.is_none_or(|id| s.coach_id == id))
        .collect();
    slots.sort_by_key(|s| (s.start_time, s.id));
    Ok(slots)
}

pub async fn create_time_slot(
    store: &dyn Store,
    req: NewTimeSlotRequest,
) -> Result<TimeSlot, AppError> {
    if req.end_time <= req.start_time {
        return Err(ScheduleError::Validation("end time must be later than start time".to_string()).into());
    }

    let data = repository::load_dataset(store).await?;
    let coach = data.find_coach(req.coach_id).cloned().ok_or(AppError::NotFound)?;
    let now = Utc::now();

    let slot = TimeSlot {
        id: IdAllocator::for_dataset(&data).next_id(),
        coach_id: coach.id,
        coach_name: coach.name.clone(),
        start_time: req.start_time,
        end_time: req.end_time,
        status: SlotStatus::Available,
        created_at: now,
        updated_at: now,
    };

    let mut slots = data.time_slots;
    slots.push(slot.clone());
    repository::save_time_slots(store, &slots).await?;

    Ok(slot)
}

/// Generates the recurring slots for one coach and persists them.
pub async fn add_recurring(
    store: &dyn Store,
    coach_id: i64,
    req: &RecurringSlotRequest,
) -> Result<Vec<TimeSlot>, AppError> {
    let data = repository::load_dataset(store).await?;
    let coach = data.find_coach(coach_id).cloned().ok_or(AppError::NotFound)?;

    let drafts = recurring::generate(req)?;
    let mut ids = IdAllocator::for_dataset(&data);
    let now = Utc::now();

    let created: Vec<TimeSlot> = drafts
        .into_iter()
        .map(|draft| TimeSlot {
            id: ids.next_id(),
            coach_id: coach.id,
            coach_name: coach.name.clone(),
            start_time: draft.start_time,
            end_time: draft.end_time,
            status: draft.status,
            created_at: now,
            updated_at: now,
        })
        .collect();

    let mut slots = data.time_slots;
    slots.extend(created.iter().cloned());
    repository::save_time_slots(store, &slots).await?;

    info!("Added {} recurring slot(s) for coach {}", created.len(), coach.name);
    Ok(created)
}

pub async fn update_time_slot(
    store: &dyn Store,
    id: i64,
    req: UpdateTimeSlotRequest,
) -> Result<TimeSlot, AppError> {
    let mut slots = repository::fetch_time_slots(store).await?;
    let current = slots
        .iter_mut()
        .find(|s| s.id == id)
        .ok_or(AppError::NotFound)?;

    if current.status != SlotStatus::Available {
        return Err(AppError::Conflict(format!(
            "slot {} is {} and can no longer be moved",
            id, current.status
        )));
    }

    let start_time = req.start_time.unwrap_or(current.start_time);
    let end_time = req.end_time.unwrap_or(current.end_time);
    if end_time <= start_time {
        return Err(ScheduleError::Validation("end time must be later than start time".to_string()).into());
    }

    current.start_time = start_time;
    current.end_time = end_time;
    current.updated_at = Utc::now();
    let updated = current.clone();

    repository::save_time_slots(store, &slots).await?;
    Ok(updated)
}

fn ensure_unheld(data: &Dataset, id: i64) -> Result<(), AppError> {
    if data
        .assignments
        .iter()
        .any(|a| a.time_slot_id == Some(id) && a.is_active())
    {
        return Err(AppError::Conflict(format!("slot {} has an active assignment", id)));
    }
    Ok(())
}

pub async fn delete_time_slot(store: &dyn Store, id: i64) -> Result<(), AppError> {
    let data = repository::load_dataset(store).await?;
    if !data.time_slots.iter().any(|s| s.id == id) {
        return Err(AppError::NotFound);
    }
    ensure_unheld(&data, id)?;

    let slots: Vec<TimeSlot> = data.time_slots.into_iter().filter(|s| s.id != id).collect();
    repository::save_time_slots(store, &slots).await?;
    Ok(())
}

/// Deletes every listed slot, or none of them.
pub async fn delete_time_slots(store: &dyn Store, ids: &[i64]) -> Result<usize, AppError> {
    let data = repository::load_dataset(store).await?;
    for id in ids {
        if !data.time_slots.iter().any(|s| s.id == *id) {
            return Err(AppError::BadRequest(format!("slot {} does not exist", id)));
        }
        ensure_unheld(&data, *id)?;
    }

    let before = data.time_slots.len();
    let slots: Vec<TimeSlot> = data
        .time_slots
        .into_iter()
        .filter(|s| !ids.contains(&s.id))
        .collect();
    repository::save_time_slots(store, &slots).await?;

    let removed = before - slots.len();
    info!("Deleted {} slot(s)", removed);
    Ok(removed)
}
