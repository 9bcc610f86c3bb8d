//! Expands a date range and a weekday selection into concrete slot windows.
//!
//! Weekdays are numbered 0 = Sunday through 6 = Saturday, both in the request
//! and when testing each calendar date.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::ScheduleError;
use crate::models::SlotStatus;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecurringSlotRequest {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub weekdays: BTreeSet<u8>,
    #[serde(default, deserialize_with = "time_of_day")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, deserialize_with = "time_of_day")]
    pub end_time: Option<NaiveTime>,
}

/// A slot to be created; the caller assigns id and owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotDraft {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: SlotStatus,
}

pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

struct Window {
    start_date: NaiveDate,
    end_date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
}

fn validate(req: &RecurringSlotRequest) -> Result<Window, ScheduleError> {
    let (Some(start_date), Some(end_date), Some(start_time), Some(end_time)) =
        (req.start_date, req.end_date, req.start_time, req.end_time)
    else {
        return Err(ScheduleError::Validation(
            "start date, end date, start time and end time are required".to_string(),
        ));
    };

    if req.weekdays.is_empty() {
        return Err(ScheduleError::Validation("select at least one weekday".to_string()));
    }
    if let Some(day) = req.weekdays.iter().find(|d| **d > 6) {
        return Err(ScheduleError::Validation(format!(
            "weekday {} is out of range (0 = Sunday .. 6 = Saturday)",
            day
        )));
    }
    if end_date < start_date {
        return Err(ScheduleError::Validation(
            "end date must not be earlier than start date".to_string(),
        ));
    }
    if end_time <= start_time {
        return Err(ScheduleError::Validation(
            "end time must be later than start time".to_string(),
        ));
    }

    Ok(Window {
        start_date,
        end_date,
        start_time,
        end_time,
    })
}

fn matching_dates(window: &Window, weekdays: &BTreeSet<u8>) -> Vec<NaiveDate> {
    window
        .start_date
        .iter_days()
        .take_while(|date| *date <= window.end_date)
        .filter(|date| weekdays.contains(&weekday_index(*date)))
        .collect()
}

/// Dates the request would produce, for a live preview. An empty list is not an error here.
pub fn preview_dates(req: &RecurringSlotRequest) -> Result<Vec<NaiveDate>, ScheduleError> {
    let window = validate(req)?;
    Ok(matching_dates(&window, &req.weekdays))
}

pub fn preview_count(req: &RecurringSlotRequest) -> Result<usize, ScheduleError> {
    preview_dates(req).map(|dates| dates.len())
}

/// One `available` slot per date in `[start_date, end_date]` whose weekday was selected.
pub fn generate(req: &RecurringSlotRequest) -> Result<Vec<SlotDraft>, ScheduleError> {
    let window = validate(req)?;
    let dates = matching_dates(&window, &req.weekdays);

    debug!(
        "recurring range {}..={} weekdays {:?}: {} matching date(s)",
        window.start_date,
        window.end_date,
        req.weekdays,
        dates.len()
    );

    if dates.is_empty() {
        return Err(ScheduleError::EmptyResult);
    }

    let drafts: Vec<SlotDraft> = dates
        .into_iter()
        .map(|date| SlotDraft {
            start_time: date.and_time(window.start_time),
            end_time: date.and_time(window.end_time),
            status: SlotStatus::Available,
        })
        .collect();

    if let Some(stray) = drafts
        .iter()
        .find(|d| !req.weekdays.contains(&weekday_index(d.start_time.date())))
    {
        return Err(ScheduleError::Validation(format!(
            "generated slot on {} falls outside the selected weekdays",
            stray.start_time.date()
        )));
    }

    Ok(drafts)
}

/// Accepts `HH:MM` as well as `HH:MM:SS`.
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

fn time_of_day<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => parse_time_of_day(text)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid time of day '{}'", text))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn weekday_index_counts_from_sunday() {
        // 2025-07-06 は日曜日
        assert_eq!(weekday_index(date(2025, 7, 6)), 0);
        assert_eq!(weekday_index(date(2025, 7, 7)), 1);
        assert_eq!(weekday_index(date(2025, 7, 12)), 6);
    }

    #[test]
    fn parses_short_and_long_times() {
        assert_eq!(parse_time_of_day("09:30"), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(parse_time_of_day("18:00:15"), NaiveTime::from_hms_opt(18, 0, 15));
        assert_eq!(parse_time_of_day("9am"), None);
    }

    #[test]
    fn deserializes_form_payload() {
        let req: RecurringSlotRequest = serde_json::from_str(
            r#"{"start_date":"2025-07-01","end_date":"2025-07-31","weekdays":[1,3],"start_time":"09:00","end_time":"10:00"}"#,
        )
        .expect("valid payload");

        assert_eq!(req.start_time, NaiveTime::from_hms_opt(9, 0, 0));
        assert_eq!(req.weekdays.len(), 2);
    }

    #[test]
    fn blank_time_counts_as_absent() {
        let req: RecurringSlotRequest = serde_json::from_str(
            r#"{"start_date":"2025-07-01","end_date":"2025-07-31","weekdays":[1],"start_time":"","end_time":"10:00"}"#,
        )
        .expect("valid payload");

        assert!(matches!(generate(&req), Err(ScheduleError::Validation(_))));
    }
}
