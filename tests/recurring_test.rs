use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime};
use coachdesk::error::ScheduleError;
use coachdesk::models::SlotStatus;
use coachdesk::services::recurring::{self, RecurringSlotRequest};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
}

fn request(start: NaiveDate, end: NaiveDate, weekdays: &[u8]) -> RecurringSlotRequest {
    RecurringSlotRequest {
        start_date: Some(start),
        end_date: Some(end),
        weekdays: weekdays.iter().copied().collect(),
        start_time: Some(time(9, 0)),
        end_time: Some(time(10, 0)),
    }
}

#[test]
fn test_single_tuesday_in_first_week_of_july() {
    // 2025-07-01 は火曜日
    let drafts = recurring::generate(&request(date(2025, 7, 1), date(2025, 7, 7), &[2]))
        .expect("Failed to generate");

    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].start_time, date(2025, 7, 1).and_time(time(9, 0)));
    assert_eq!(drafts[0].end_time, date(2025, 7, 1).and_time(time(10, 0)));
    assert_eq!(drafts[0].status, SlotStatus::Available);
}

#[test]
fn test_all_weekdays_cover_every_date() {
    let start = date(2025, 7, 1);
    let end = date(2025, 7, 21);
    let drafts = recurring::generate(&request(start, end, &[0, 1, 2, 3, 4, 5, 6]))
        .expect("Failed to generate");

    let expected = (end - start).num_days() as usize + 1;
    assert_eq!(drafts.len(), expected);
    assert_eq!(drafts.first().map(|d| d.start_time.date()), Some(start));
    assert_eq!(drafts.last().map(|d| d.start_time.date()), Some(end));
}

#[test]
fn test_generated_dates_stay_on_selected_weekdays() {
    let selections: [&[u8]; 4] = [&[0], &[1, 3, 5], &[6, 0], &[2, 4]];

    for weekdays in selections {
        let req = request(date(2025, 6, 15), date(2025, 9, 30), weekdays);
        let drafts = recurring::generate(&req).expect("Failed to generate");
        let selected: BTreeSet<u8> = weekdays.iter().copied().collect();

        assert!(
            drafts
                .iter()
                .all(|d| selected.contains(&recurring::weekday_index(d.start_time.date())))
        );

        let expected = date(2025, 6, 15)
            .iter_days()
            .take_while(|d| *d <= date(2025, 9, 30))
            .filter(|d| selected.contains(&recurring::weekday_index(*d)))
            .count();
        assert_eq!(drafts.len(), expected);
        assert!(drafts.windows(2).all(|w| w[0].start_time < w[1].start_time));
    }
}

#[test]
fn test_non_matching_single_day_is_empty_result() {
    // 2025-07-06 は日曜日、月曜日だけを選択
    let req = request(date(2025, 7, 6), date(2025, 7, 6), &[1]);

    assert_eq!(recurring::generate(&req), Err(ScheduleError::EmptyResult));
    assert_eq!(recurring::preview_count(&req), Ok(0));
}

#[test]
fn test_preview_matches_generate() {
    let req = request(date(2025, 7, 1), date(2025, 7, 31), &[1, 3]);
    let dates = recurring::preview_dates(&req).expect("Failed to preview");
    let drafts = recurring::generate(&req).expect("Failed to generate");

    assert_eq!(dates.len(), drafts.len());
    assert_eq!(recurring::preview_count(&req), Ok(drafts.len()));
    assert!(dates.iter().zip(&drafts).all(|(d, draft)| *d == draft.start_time.date()));
}

#[test]
fn test_missing_fields_are_rejected() {
    let mut req = request(date(2025, 7, 1), date(2025, 7, 7), &[2]);
    req.start_time = None;
    assert!(matches!(recurring::generate(&req), Err(ScheduleError::Validation(_))));

    let mut req = request(date(2025, 7, 1), date(2025, 7, 7), &[2]);
    req.end_date = None;
    assert!(matches!(recurring::generate(&req), Err(ScheduleError::Validation(_))));

    let req = request(date(2025, 7, 1), date(2025, 7, 7), &[]);
    assert!(matches!(recurring::generate(&req), Err(ScheduleError::Validation(_))));
}

#[test]
fn test_inverted_ranges_are_rejected() {
    let req = request(date(2025, 7, 7), date(2025, 7, 1), &[2]);
    assert!(matches!(recurring::generate(&req), Err(ScheduleError::Validation(_))));

    let mut req = request(date(2025, 7, 1), date(2025, 7, 7), &[2]);
    req.end_time = Some(time(9, 0));
    assert!(matches!(recurring::generate(&req), Err(ScheduleError::Validation(_))));
}

#[test]
fn test_weekday_out_of_range_is_rejected() {
    let req = request(date(2025, 7, 1), date(2025, 7, 7), &[2, 7]);
    assert!(matches!(recurring::preview_dates(&req), Err(ScheduleError::Validation(_))));
}
