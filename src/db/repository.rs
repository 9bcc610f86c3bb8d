use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::db::store::{ASSIGNMENTS, COACHES, Store, TIME_SLOTS};
use crate::error::AppError;
use crate::models::{Assignment, Coach, TimeSlot};

/// All three collections, loaded together for one import or lifecycle pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub coaches: Vec<Coach>,
    pub time_slots: Vec<TimeSlot>,
    pub assignments: Vec<Assignment>,
}

impl Dataset {
    pub fn find_coach_by_name(&self, name: &str) -> Option<&Coach> {
        self.coaches.iter().find(|c| c.is_named(name))
    }

    pub fn find_coach(&self, id: i64) -> Option<&Coach> {
        self.coaches.iter().find(|c| c.id == id)
    }

    pub fn max_id(&self) -> i64 {
        let coaches = self.coaches.iter().map(|c| c.id);
        let slots = self.time_slots.iter().map(|s| s.id);
        let assignments = self.assignments.iter().map(|a| a.id);
        coaches.chain(slots).chain(assignments).max().unwrap_or(0)
    }
}

/// Hands out ids above everything already stored.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: i64,
}

impl IdAllocator {
    pub fn starting_after(max_id: i64) -> Self {
        Self { next: max_id + 1 }
    }

    pub fn for_dataset(dataset: &Dataset) -> Self {
        Self::starting_after(dataset.max_id())
    }

    pub fn next_id(&mut self) -> i64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

async fn load_collection<T: DeserializeOwned>(
    store: &dyn Store,
    collection: &str,
) -> Result<Vec<T>, AppError> {
    store
        .load(collection)
        .await?
        .into_iter()
        .map(|value| serde_json::from_value(value).map_err(AppError::from))
        .collect()
}

async fn save_collection<T: Serialize>(
    store: &dyn Store,
    collection: &str,
    records: &[T],
) -> Result<(), AppError> {
    let values = records
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    store.save(collection, values).await
}

pub async fn fetch_coaches(store: &dyn Store) -> Result<Vec<Coach>, AppError> {
    load_collection(store, COACHES).await
}

pub async fn fetch_time_slots(store: &dyn Store) -> Result<Vec<TimeSlot>, AppError> {
    load_collection(store, TIME_SLOTS).await
}

pub async fn fetch_assignments(store: &dyn Store) -> Result<Vec<Assignment>, AppError> {
    load_collection(store, ASSIGNMENTS).await
}

pub async fn save_coaches(store: &dyn Store, coaches: &[Coach]) -> Result<(), AppError> {
    save_collection(store, COACHES, coaches).await
}

pub async fn save_time_slots(store: &dyn Store, slots: &[TimeSlot]) -> Result<(), AppError> {
    save_collection(store, TIME_SLOTS, slots).await
}

pub async fn save_assignments(
    store: &dyn Store,
    assignments: &[Assignment],
) -> Result<(), AppError> {
    save_collection(store, ASSIGNMENTS, assignments).await
}

pub async fn load_dataset(store: &dyn Store) -> Result<Dataset, AppError> {
    Ok(Dataset {
        coaches: fetch_coaches(store).await?,
        time_slots: fetch_time_slots(store).await?,
        assignments: fetch_assignments(store).await?,
    })
}

/// Writes back only the collections that differ from `before`.
/// Returns how many collections were written.
pub async fn save_changes(
    store: &dyn Store,
    before: &Dataset,
    after: &Dataset,
) -> Result<usize, AppError> {
    let mut written = 0;

    if before.coaches != after.coaches {
        save_coaches(store, &after.coaches).await?;
        written += 1;
    }
    if before.time_slots != after.time_slots {
        save_time_slots(store, &after.time_slots).await?;
        written += 1;
    }
    if before.assignments != after.assignments {
        save_assignments(store, &after.assignments).await?;
        written += 1;
    }

    Ok(written)
}
