use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{CoachStatus, Priority, SlotStatus};

/// Which collection a tabular file is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    Coaches,
    Timeslots,
    Assignments,
}

/// A data row that could not become a record. `row` is the zero-based data row index.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("row {row}: {reason}")]
pub struct RowError {
    pub row: usize,
    pub reason: String,
}

impl RowError {
    fn new(row: usize, reason: impl Into<String>) -> Self {
        Self {
            row,
            reason: reason.into(),
        }
    }
}

/// Column order: name, bio, specialty1-3, status, email, phone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoachRecord {
    pub name: String,
    pub bio: String,
    pub specialties: BTreeSet<String>,
    pub status: CoachStatus,
    pub email: String,
    pub phone: String,
}

/// Column order: coachName, startTime, endTime, status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSlotRecord {
    pub coach_name: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: SlotStatus,
}

/// Column order: coachName, clientName, contact, topic, startTime, endTime, priority.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentRecord {
    pub coach_name: String,
    pub client_name: String,
    pub client_contact: String,
    pub topic: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub priority: Priority,
}

/// Splits CSV text into trimmed string rows, dropping the header row and blank lines.
pub fn split_csv(text: &str) -> Result<Vec<Vec<String>>, csv::Error> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(|s| s.trim()).unwrap_or("")
}

fn required<'a>(row: &'a [String], index: usize, field: &str, at: usize) -> Result<&'a str, RowError> {
    let value = cell(row, index);
    if value.is_empty() {
        Err(RowError::new(at, format!("missing {}", field)))
    } else {
        Ok(value)
    }
}

fn timestamp(row: &[String], index: usize, field: &str, at: usize) -> Result<NaiveDateTime, RowError> {
    let raw = required(row, index, field, at)?;
    parse_timestamp(raw).ok_or_else(|| RowError::new(at, format!("invalid {} '{}'", field, raw)))
}

pub fn parse_coach_row(at: usize, row: &[String]) -> Result<CoachRecord, RowError> {
    let name = required(row, 0, "name", at)?.to_string();
    let specialties = (2..=4)
        .map(|i| cell(row, i))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let status = if cell(row, 5) == "active" {
        CoachStatus::Active
    } else {
        CoachStatus::Inactive
    };

    Ok(CoachRecord {
        name,
        bio: cell(row, 1).to_string(),
        specialties,
        status,
        email: cell(row, 6).to_string(),
        phone: cell(row, 7).to_string(),
    })
}

pub fn parse_time_slot_row(at: usize, row: &[String]) -> Result<TimeSlotRecord, RowError> {
    let coach_name = required(row, 0, "coach name", at)?.to_string();
    let start_time = timestamp(row, 1, "start time", at)?;
    let end_time = timestamp(row, 2, "end time", at)?;
    if end_time <= start_time {
        return Err(RowError::new(at, "end time must be later than start time"));
    }
    let status = match cell(row, 3) {
        "" => SlotStatus::Available,
        raw => raw.parse().map_err(|e: String| RowError::new(at, e))?,
    };

    Ok(TimeSlotRecord {
        coach_name,
        start_time,
        end_time,
        status,
    })
}

pub fn parse_assignment_row(at: usize, row: &[String]) -> Result<AssignmentRecord, RowError> {
    let coach_name = required(row, 0, "coach name", at)?.to_string();
    let client_name = required(row, 1, "client name", at)?.to_string();
    let start_time = timestamp(row, 4, "start time", at)?;
    let end_time = timestamp(row, 5, "end time", at)?;
    let priority = match cell(row, 6) {
        "" => Priority::Medium,
        raw => raw.parse().map_err(|e: String| RowError::new(at, e))?,
    };

    Ok(AssignmentRecord {
        coach_name,
        client_name,
        client_contact: cell(row, 2).to_string(),
        topic: cell(row, 3).to_string(),
        start_time,
        end_time,
        priority,
    })
}

pub fn parse_rows<T>(
    rows: &[Vec<String>],
    parse: impl Fn(usize, &[String]) -> Result<T, RowError>,
) -> Vec<Result<T, RowError>> {
    rows.iter()
        .enumerate()
        .map(|(at, row)| parse(at, row))
        .collect()
}
