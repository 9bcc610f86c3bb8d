use std::collections::BTreeSet;

use chrono::Utc;
use tracing::info;

use crate::db::Store;
use crate::db::repository::{self, Dataset, IdAllocator};
use crate::error::{AppError, ScheduleError};
use crate::models::{Coach, CoachStatus, NewCoachRequest, UpdateCoachRequest};

pub async fn list_coaches(store: &dyn Store) -> Result<Vec<Coach>, AppError> {
    repository::fetch_coaches(store).await
}

fn clean_specialties(specialties: BTreeSet<String>) -> BTreeSet<String> {
    specialties
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn checked_name(data: &Dataset, name: &str, except: Option<i64>) -> Result<String, AppError> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(ScheduleError::Validation("coach name is required".to_string()).into());
    }
    if data
        .coaches
        .iter()
        .any(|c| Some(c.id) != except && c.is_named(&name))
    {
        return Err(AppError::Conflict(format!("coach '{}' already exists", name)));
    }
    Ok(name)
}

pub async fn create_coach(store: &dyn Store, req: NewCoachRequest) -> Result<Coach, AppError> {
    let data = repository::load_dataset(store).await?;
    let name = checked_name(&data, &req.name, None)?;

    let now = Utc::now();
    let coach = Coach {
        id: IdAllocator::for_dataset(&data).next_id(),
        name,
        bio: req.bio,
        specialties: clean_specialties(req.specialties),
        status: req.status,
        email: req.email.trim().to_string(),
        phone: req.phone.trim().to_string(),
        created_at: now,
        updated_at: now,
    };

    let mut coaches = data.coaches;
    coaches.push(coach.clone());
    repository::save_coaches(store, &coaches).await?;

    info!("Coach {} created ({})", coach.id, coach.name);
    Ok(coach)
}

/// Edits a coach profile. A new name is copied onto the coach's slots and assignments.
pub async fn update_coach(
    store: &dyn Store,
    id: i64,
    req: UpdateCoachRequest,
) -> Result<Coach, AppError> {
    let before = repository::load_dataset(store).await?;
    let mut data = before.clone();

    let name = match &req.name {
        Some(name) => Some(checked_name(&data, name, Some(id))?),
        None => None,
    };
    let coach = data
        .coaches
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or(AppError::NotFound)?;

    if let Some(name) = name {
        coach.name = name;
    }
    if let Some(bio) = req.bio {
        coach.bio = bio;
    }
    if let Some(specialties) = req.specialties {
        coach.specialties = clean_specialties(specialties);
    }
    if let Some(status) = req.status {
        coach.status = status;
    }
    if let Some(email) = req.email {
        coach.email = email.trim().to_string();
    }
    if let Some(phone) = req.phone {
        coach.phone = phone.trim().to_string();
    }
    coach.updated_at = Utc::now();
    let updated = coach.clone();

    for slot in data.time_slots.iter_mut().filter(|s| s.coach_id == id) {
        slot.coach_name = updated.name.clone();
    }
    for assignment in data.assignments.iter_mut().filter(|a| a.coach_id == Some(id)) {
        assignment.coach_name = updated.name.clone();
    }

    repository::save_changes(store, &before, &data).await?;
    info!("Coach {} updated", id);
    Ok(updated)
}

pub async fn toggle_coach_status(store: &dyn Store, id: i64) -> Result<Coach, AppError> {
    let mut coaches = repository::fetch_coaches(store).await?;
    let coach = coaches
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or(AppError::NotFound)?;

    coach.status = coach.status.toggled();
    coach.updated_at = Utc::now();
    let updated = coach.clone();

    repository::save_coaches(store, &coaches).await?;
    info!("Coach {} is now {:?}", id, updated.status);
    Ok(updated)
}

/// Sets the status of every listed coach. Nothing changes if any id is unknown.
pub async fn set_coaches_status(
    store: &dyn Store,
    ids: &[i64],
    status: CoachStatus,
) -> Result<Vec<Coach>, AppError> {
    let mut coaches = repository::fetch_coaches(store).await?;
    if let Some(missing) = ids.iter().find(|id| !coaches.iter().any(|c| c.id == **id)) {
        return Err(AppError::BadRequest(format!("coach {} does not exist", missing)));
    }

    let now = Utc::now();
    let mut changed = Vec::new();
    for coach in coaches.iter_mut().filter(|c| ids.contains(&c.id)) {
        coach.status = status;
        coach.updated_at = now;
        changed.push(coach.clone());
    }

    repository::save_coaches(store, &coaches).await?;
    info!("Set {} coach(es) to {:?}", changed.len(), status);
    Ok(changed)
}

/// Removes coaches together with their slots. Past assignments keep the
/// coach's name but lose their links.
fn remove_coaches(data: &mut Dataset, ids: &[i64]) -> Result<(), AppError> {
    if let Some(busy) = data
        .assignments
        .iter()
        .find(|a| a.is_active() && a.coach_id.is_some_and(|id| ids.contains(&id)))
    {
        return Err(AppError::Conflict(format!(
            "coach {} still has an active assignment ({})",
            busy.coach_name, busy.id
        )));
    }

    let dropped_slots: Vec<i64> = data
        .time_slots
        .iter()
        .filter(|s| ids.contains(&s.coach_id))
        .map(|s| s.id)
        .collect();

    data.coaches.retain(|c| !ids.contains(&c.id));
    data.time_slots.retain(|s| !ids.contains(&s.coach_id));
    for assignment in data.assignments.iter_mut() {
        if assignment.coach_id.is_some_and(|id| ids.contains(&id)) {
            assignment.coach_id = None;
        }
        if assignment
            .time_slot_id
            .is_some_and(|id| dropped_slots.contains(&id))
        {
            assignment.time_slot_id = None;
        }
    }
    Ok(())
}

pub async fn delete_coach(store: &dyn Store, id: i64) -> Result<(), AppError> {
    let before = repository::load_dataset(store).await?;
    if before.find_coach(id).is_none() {
        return Err(AppError::NotFound);
    }

    let mut data = before.clone();
    remove_coaches(&mut data, &[id])?;
    repository::save_changes(store, &before, &data).await?;

    info!("Coach {} deleted", id);
    Ok(())
}

/// Deletes every listed coach, or none of them.
pub async fn delete_coaches(store: &dyn Store, ids: &[i64]) -> Result<usize, AppError> {
    let before = repository::load_dataset(store).await?;
    if let Some(missing) = ids.iter().find(|id| before.find_coach(**id).is_none()) {
        return Err(AppError::BadRequest(format!("coach {} does not exist", missing)));
    }

    let mut data = before.clone();
    remove_coaches(&mut data, ids)?;
    repository::save_changes(store, &before, &data).await?;

    let removed = before.coaches.len() - data.coaches.len();
    info!("Deleted {} coach(es)", removed);
    Ok(removed)
}
