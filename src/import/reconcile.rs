//! Classifies imported records against what is already stored and applies
//! the operator's decisions.
//!
//! Every incoming record ends up in exactly one bucket:
//! - clean: nothing matches, appended on commit
//! - duplicate: matches an existing record, needs keep / replace / skip
//! - missing coach (time slots only): the named coach does not exist yet;
//!   imported only if the operator selects that coach for creation
//!
//! Nothing here touches storage. `apply` mutates an in-memory `Dataset`
//! that the caller persists afterwards.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::db::repository::{Dataset, IdAllocator};
use crate::error::ScheduleError;
use crate::import::rows::{
    self, AssignmentRecord, CoachRecord, ImportKind, RowError, TimeSlotRecord,
};
use crate::models::coach::same_name;
use crate::models::{Assignment, AssignmentStatus, Coach, SlotStatus, TimeSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Keep,
    Replace,
    Skip,
}

/// What the operator decided before commit.
/// `resolutions` is keyed by the duplicate's data row index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Decisions {
    #[serde(default)]
    pub resolutions: BTreeMap<usize, Resolution>,
    #[serde(default)]
    pub create_coaches: Vec<String>,
}

impl Decisions {
    fn creates_coach(&self, name: &str) -> bool {
        self.create_coaches.iter().any(|n| same_name(n, name))
    }

    fn resolution_for(&self, row: usize) -> Result<Resolution, ScheduleError> {
        self.resolutions
            .get(&row)
            .copied()
            .ok_or(ScheduleError::ResolutionIncomplete { unresolved: vec![row] })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Staged<R> {
    pub row: usize,
    pub record: R,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Duplicate<R, E> {
    pub row: usize,
    pub existing: E,
    pub incoming: R,
}

/// Slots queued under a coach name that has no coach yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingCoach {
    pub name: String,
    pub rows: Vec<usize>,
    pub slots: Vec<TimeSlotRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification<R, E> {
    pub clean: Vec<Staged<R>>,
    pub duplicates: Vec<Duplicate<R, E>>,
    pub missing_coaches: Vec<MissingCoach>,
    pub row_errors: Vec<RowError>,
}

impl<R, E> Classification<R, E> {
    fn new(row_errors: Vec<RowError>) -> Self {
        Self {
            clean: Vec::new(),
            duplicates: Vec::new(),
            missing_coaches: Vec::new(),
            row_errors,
        }
    }

    /// Rows of duplicates that have no resolution yet.
    pub fn unresolved(&self, resolutions: &BTreeMap<usize, Resolution>) -> Vec<usize> {
        self.duplicates
            .iter()
            .map(|d| d.row)
            .filter(|row| !resolutions.contains_key(row))
            .collect()
    }

    fn ensure_resolved(&self, decisions: &Decisions) -> Result<(), ScheduleError> {
        let unresolved = self.unresolved(&decisions.resolutions);
        if unresolved.is_empty() {
            Ok(())
        } else {
            Err(ScheduleError::ResolutionIncomplete { unresolved })
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub added: usize,
    pub replaced: usize,
    pub kept: usize,
    pub skipped: usize,
    pub coaches_created: usize,
    pub missing_dropped: usize,
    pub rows_rejected: usize,
}

impl ImportSummary {
    fn count(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Keep => self.kept += 1,
            Resolution::Replace => self.replaced += 1,
            Resolution::Skip => self.skipped += 1,
        }
    }
}

fn split_errors<R>(records: Vec<Result<R, RowError>>) -> (Vec<Staged<R>>, Vec<RowError>) {
    let mut staged = Vec::new();
    let mut errors = Vec::new();
    for (row, record) in records.into_iter().enumerate() {
        match record {
            Ok(record) => staged.push(Staged { row, record }),
            Err(e) => errors.push(e),
        }
    }
    (staged, errors)
}

pub fn coach_matches(existing: &Coach, incoming: &CoachRecord) -> bool {
    let same_email = !existing.email.trim().is_empty()
        && !incoming.email.trim().is_empty()
        && existing.email.trim().to_lowercase() == incoming.email.trim().to_lowercase();
    existing.is_named(&incoming.name) || same_email
}

fn assignment_matches(existing: &Assignment, coach_id: Option<i64>, incoming: &AssignmentRecord) -> bool {
    let same_coach = match (existing.coach_id, coach_id) {
        (Some(a), Some(b)) => a == b,
        _ => same_name(&existing.coach_name, &incoming.coach_name),
    };
    same_coach
        && existing.client_name == incoming.client_name
        && existing.start_time == incoming.start_time
}

pub fn classify_coaches(
    records: Vec<Result<CoachRecord, RowError>>,
    existing: &[Coach],
) -> Classification<CoachRecord, Coach> {
    let (staged, errors) = split_errors(records);
    let mut out = Classification::new(errors);

    for Staged { row, record } in staged {
        match existing.iter().find(|c| coach_matches(c, &record)) {
            Some(found) => out.duplicates.push(Duplicate {
                row,
                existing: found.clone(),
                incoming: record,
            }),
            None => out.clean.push(Staged { row, record }),
        }
    }
    out
}

/// Slots naming an unknown coach are only grouped, never checked for duplication.
pub fn classify_time_slots(
    records: Vec<Result<TimeSlotRecord, RowError>>,
    coaches: &[Coach],
    existing: &[TimeSlot],
) -> Classification<TimeSlotRecord, TimeSlot> {
    let (staged, errors) = split_errors(records);
    let mut out = Classification::new(errors);

    for Staged { row, record } in staged {
        let Some(coach) = coaches.iter().find(|c| c.is_named(&record.coach_name)) else {
            match out
                .missing_coaches
                .iter_mut()
                .find(|m| same_name(&m.name, &record.coach_name))
            {
                Some(group) => {
                    group.rows.push(row);
                    group.slots.push(record);
                }
                None => out.missing_coaches.push(MissingCoach {
                    name: record.coach_name.trim().to_string(),
                    rows: vec![row],
                    slots: vec![record],
                }),
            }
            continue;
        };

        match existing
            .iter()
            .find(|s| s.same_window(coach.id, record.start_time, record.end_time))
        {
            Some(found) => out.duplicates.push(Duplicate {
                row,
                existing: found.clone(),
                incoming: record,
            }),
            None => out.clean.push(Staged { row, record }),
        }
    }
    out
}

pub fn classify_assignments(
    records: Vec<Result<AssignmentRecord, RowError>>,
    coaches: &[Coach],
    existing: &[Assignment],
) -> Classification<AssignmentRecord, Assignment> {
    let (staged, errors) = split_errors(records);
    let mut out = Classification::new(errors);

    for Staged { row, record } in staged {
        let coach_id = coaches
            .iter()
            .find(|c| c.is_named(&record.coach_name))
            .map(|c| c.id);
        match existing
            .iter()
            .find(|a| assignment_matches(a, coach_id, &record))
        {
            Some(found) => out.duplicates.push(Duplicate {
                row,
                existing: found.clone(),
                incoming: record,
            }),
            None => out.clean.push(Staged { row, record }),
        }
    }
    out
}

/// A classified batch of one of the three entity kinds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ImportPreview {
    Coaches(Classification<CoachRecord, Coach>),
    Timeslots(Classification<TimeSlotRecord, TimeSlot>),
    Assignments(Classification<AssignmentRecord, Assignment>),
}

impl ImportPreview {
    pub fn row_errors(&self) -> &[RowError] {
        match self {
            ImportPreview::Coaches(c) => &c.row_errors,
            ImportPreview::Timeslots(c) => &c.row_errors,
            ImportPreview::Assignments(c) => &c.row_errors,
        }
    }

    pub fn unresolved(&self, resolutions: &BTreeMap<usize, Resolution>) -> Vec<usize> {
        match self {
            ImportPreview::Coaches(c) => c.unresolved(resolutions),
            ImportPreview::Timeslots(c) => c.unresolved(resolutions),
            ImportPreview::Assignments(c) => c.unresolved(resolutions),
        }
    }

    pub fn duplicate_count(&self) -> usize {
        match self {
            ImportPreview::Coaches(c) => c.duplicates.len(),
            ImportPreview::Timeslots(c) => c.duplicates.len(),
            ImportPreview::Assignments(c) => c.duplicates.len(),
        }
    }
}

pub fn classify(kind: ImportKind, table: &[Vec<String>], data: &Dataset) -> ImportPreview {
    let preview = match kind {
        ImportKind::Coaches => ImportPreview::Coaches(classify_coaches(
            rows::parse_rows(table, rows::parse_coach_row),
            &data.coaches,
        )),
        ImportKind::Timeslots => ImportPreview::Timeslots(classify_time_slots(
            rows::parse_rows(table, rows::parse_time_slot_row),
            &data.coaches,
            &data.time_slots,
        )),
        ImportKind::Assignments => ImportPreview::Assignments(classify_assignments(
            rows::parse_rows(table, rows::parse_assignment_row),
            &data.coaches,
            &data.assignments,
        )),
    };
    debug!(
        "classified {:?} batch: {} duplicate(s), {} rejected row(s)",
        kind,
        preview.duplicate_count(),
        preview.row_errors().len()
    );
    preview
}

/// Applies a classified batch to `data`. Fails before any mutation if a
/// duplicate is unresolved.
pub fn apply(
    preview: &ImportPreview,
    decisions: &Decisions,
    data: &mut Dataset,
    ids: &mut IdAllocator,
    now: DateTime<Utc>,
) -> Result<ImportSummary, ScheduleError> {
    let mut summary = match preview {
        ImportPreview::Coaches(c) => apply_coaches(c, decisions, data, ids, now)?,
        ImportPreview::Timeslots(c) => apply_time_slots(c, decisions, data, ids, now)?,
        ImportPreview::Assignments(c) => apply_assignments(c, decisions, data, ids, now)?,
    };

    for e in preview.row_errors() {
        warn!("Skipping import {}", e);
    }
    summary.rows_rejected = preview.row_errors().len();
    Ok(summary)
}

fn coach_from_record(id: i64, record: &CoachRecord, now: DateTime<Utc>) -> Coach {
    Coach {
        id,
        name: record.name.clone(),
        bio: record.bio.clone(),
        specialties: record.specialties.clone(),
        status: record.status,
        email: record.email.clone(),
        phone: record.phone.clone(),
        created_at: now,
        updated_at: now,
    }
}

/// Points every slot and assignment of `old_id` at the replacement coach.
fn relink_coach(data: &mut Dataset, old_id: i64, coach: &Coach) {
    for slot in data.time_slots.iter_mut().filter(|s| s.coach_id == old_id) {
        slot.coach_id = coach.id;
        slot.coach_name = coach.name.clone();
    }
    for assignment in data
        .assignments
        .iter_mut()
        .filter(|a| a.coach_id == Some(old_id))
    {
        assignment.coach_id = Some(coach.id);
        assignment.coach_name = coach.name.clone();
    }
}

pub fn apply_coaches(
    batch: &Classification<CoachRecord, Coach>,
    decisions: &Decisions,
    data: &mut Dataset,
    ids: &mut IdAllocator,
    now: DateTime<Utc>,
) -> Result<ImportSummary, ScheduleError> {
    batch.ensure_resolved(decisions)?;
    let mut summary = ImportSummary::default();

    for dup in &batch.duplicates {
        let resolution = decisions.resolution_for(dup.row)?;
        if resolution == Resolution::Replace {
            let Some(index) = data.coaches.iter().position(|c| coach_matches(c, &dup.incoming)) else {
                warn!("Replace target for coach '{}' vanished, skipping", dup.incoming.name);
                summary.skipped += 1;
                continue;
            };
            let old_id = data.coaches[index].id;
            if data
                .coaches
                .iter()
                .any(|c| c.id != old_id && c.is_named(&dup.incoming.name))
            {
                warn!(
                    "Replacing coach {} would reuse the name '{}' of another coach, skipping",
                    old_id, dup.incoming.name
                );
                summary.skipped += 1;
                continue;
            }
            let coach = coach_from_record(ids.next_id(), &dup.incoming, now);
            relink_coach(data, old_id, &coach);
            data.coaches[index] = coach;
        }
        summary.count(resolution);
    }

    for staged in &batch.clean {
        data.coaches.push(coach_from_record(ids.next_id(), &staged.record, now));
        summary.added += 1;
    }

    Ok(summary)
}

fn slot_from_record(id: i64, coach: &Coach, record: &TimeSlotRecord, now: DateTime<Utc>) -> TimeSlot {
    TimeSlot {
        id,
        coach_id: coach.id,
        coach_name: coach.name.clone(),
        start_time: record.start_time,
        end_time: record.end_time,
        status: record.status,
        created_at: now,
        updated_at: now,
    }
}

fn coach_for(data: &Dataset, name: &str) -> Result<Coach, ScheduleError> {
    data.find_coach_by_name(name)
        .cloned()
        .ok_or_else(|| ScheduleError::ParentNotFound(name.to_string()))
}

pub fn apply_time_slots(
    batch: &Classification<TimeSlotRecord, TimeSlot>,
    decisions: &Decisions,
    data: &mut Dataset,
    ids: &mut IdAllocator,
    now: DateTime<Utc>,
) -> Result<ImportSummary, ScheduleError> {
    batch.ensure_resolved(decisions)?;
    let mut summary = ImportSummary::default();

    for name in &decisions.create_coaches {
        if !batch.missing_coaches.iter().any(|m| same_name(&m.name, name)) {
            warn!("Coach '{}' was selected for creation but has no queued slots", name);
        }
    }

    for dup in &batch.duplicates {
        let resolution = decisions.resolution_for(dup.row)?;
        if resolution == Resolution::Replace {
            let coach = coach_for(data, &dup.incoming.coach_name)?;
            let Some(index) = data.time_slots.iter().position(|s| {
                s.same_window(coach.id, dup.incoming.start_time, dup.incoming.end_time)
            }) else {
                warn!("Replace target for slot in row {} vanished, skipping", dup.row);
                summary.skipped += 1;
                continue;
            };
            let old_id = data.time_slots[index].id;
            let old_status = data.time_slots[index].status;
            let mut slot = slot_from_record(ids.next_id(), &coach, &dup.incoming, now);
            if is_held(data, old_id) {
                // an active case still sits on this slot
                slot.status = match old_status {
                    SlotStatus::Available => SlotStatus::Assigned,
                    held => held,
                };
            }
            for assignment in data
                .assignments
                .iter_mut()
                .filter(|a| a.time_slot_id == Some(old_id))
            {
                assignment.time_slot_id = Some(slot.id);
            }
            data.time_slots[index] = slot;
        }
        summary.count(resolution);
    }

    for staged in &batch.clean {
        let coach = coach_for(data, &staged.record.coach_name)?;
        let slot = slot_from_record(ids.next_id(), &coach, &staged.record, now);
        data.time_slots.push(slot);
        summary.added += 1;
    }

    for group in &batch.missing_coaches {
        if !decisions.creates_coach(&group.name) {
            debug!("Dropping {} slot(s) of unselected coach '{}'", group.slots.len(), group.name);
            summary.missing_dropped += group.slots.len();
            continue;
        }
        if data.find_coach_by_name(&group.name).is_none() {
            data.coaches.push(Coach::placeholder(ids.next_id(), &group.name, now));
            summary.coaches_created += 1;
        }
        let coach = coach_for(data, &group.name)?;
        for record in &group.slots {
            data.time_slots
                .push(slot_from_record(ids.next_id(), &coach, record, now));
            summary.added += 1;
        }
    }

    Ok(summary)
}

/// Whether a pending or confirmed assignment references the slot.
fn is_held(data: &Dataset, slot_id: i64) -> bool {
    data.assignments
        .iter()
        .any(|a| a.time_slot_id == Some(slot_id) && a.is_active())
}

/// Index of the coach's slot starting at `start` if it can take a new case.
///
/// The slot must be `available` with no active assignment on it, or be held
/// only by `replacing`, the assignment the new one supersedes.
fn free_slot(
    data: &Dataset,
    coach_id: i64,
    start: NaiveDateTime,
    replacing: Option<i64>,
) -> Option<usize> {
    let index = data
        .time_slots
        .iter()
        .position(|s| s.coach_id == coach_id && s.start_time == start)?;
    let slot = &data.time_slots[index];

    let holders: Vec<i64> = data
        .assignments
        .iter()
        .filter(|a| a.time_slot_id == Some(slot.id) && a.is_active())
        .map(|a| a.id)
        .collect();
    let free = if holders.is_empty() {
        slot.status == SlotStatus::Available
    } else {
        holders.iter().all(|id| Some(*id) == replacing)
    };

    if !free {
        debug!("Slot {} is already taken, imported assignment stays unlinked", slot.id);
    }
    free.then_some(index)
}

/// Builds an assignment for an imported record, linking it to the coach and
/// to that coach's slot starting at the same time when the slot is free.
fn admit_assignment(
    data: &mut Dataset,
    id: i64,
    record: &AssignmentRecord,
    replacing: Option<i64>,
    now: DateTime<Utc>,
) -> Assignment {
    let coach = data.find_coach_by_name(&record.coach_name).cloned();
    let coach_id = coach.as_ref().map(|c| c.id);

    let time_slot_id = coach_id
        .and_then(|cid| free_slot(data, cid, record.start_time, replacing))
        .map(|index| {
            let slot = &mut data.time_slots[index];
            if slot.status != SlotStatus::Assigned {
                slot.status = SlotStatus::Assigned;
                slot.updated_at = now;
            }
            slot.id
        });

    Assignment {
        id,
        time_slot_id,
        coach_id,
        coach_name: coach
            .map(|c| c.name)
            .unwrap_or_else(|| record.coach_name.clone()),
        client_name: record.client_name.clone(),
        client_contact: record.client_contact.clone(),
        topic: record.topic.clone(),
        priority: record.priority,
        status: AssignmentStatus::Pending,
        start_time: record.start_time,
        end_time: record.end_time,
        notes: None,
        created_at: now,
        updated_at: now,
    }
}

/// Returns a slot to the pool once no active assignment holds it.
fn release_slot(data: &mut Dataset, slot_id: i64, now: DateTime<Utc>) {
    if is_held(data, slot_id) {
        return;
    }
    if let Some(slot) = data.time_slots.iter_mut().find(|s| s.id == slot_id) {
        if matches!(slot.status, SlotStatus::Assigned | SlotStatus::Confirmed) {
            slot.status = SlotStatus::Available;
            slot.updated_at = now;
        }
    }
}

pub fn apply_assignments(
    batch: &Classification<AssignmentRecord, Assignment>,
    decisions: &Decisions,
    data: &mut Dataset,
    ids: &mut IdAllocator,
    now: DateTime<Utc>,
) -> Result<ImportSummary, ScheduleError> {
    batch.ensure_resolved(decisions)?;
    let mut summary = ImportSummary::default();

    for dup in &batch.duplicates {
        let resolution = decisions.resolution_for(dup.row)?;
        if resolution == Resolution::Replace {
            let coach_id = data.find_coach_by_name(&dup.incoming.coach_name).map(|c| c.id);
            let Some(index) = data
                .assignments
                .iter()
                .position(|a| assignment_matches(a, coach_id, &dup.incoming))
            else {
                warn!("Replace target for assignment in row {} vanished, skipping", dup.row);
                summary.skipped += 1;
                continue;
            };
            let old = data.assignments[index].clone();
            let assignment = admit_assignment(data, ids.next_id(), &dup.incoming, Some(old.id), now);
            data.assignments[index] = assignment;
            if let Some(slot_id) = old.time_slot_id.filter(|_| old.is_active()) {
                release_slot(data, slot_id, now);
            }
        }
        summary.count(resolution);
    }

    for staged in &batch.clean {
        let assignment = admit_assignment(data, ids.next_id(), &staged.record, None, now);
        data.assignments.push(assignment);
        summary.added += 1;
    }

    Ok(summary)
}
