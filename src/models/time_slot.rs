use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Assigned,
    Confirmed,
    Rejected,
    Pending,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Assigned => "assigned",
            SlotStatus::Confirmed => "confirmed",
            SlotStatus::Rejected => "rejected",
            SlotStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "available" => Ok(SlotStatus::Available),
            "assigned" => Ok(SlotStatus::Assigned),
            "confirmed" => Ok(SlotStatus::Confirmed),
            "rejected" => Ok(SlotStatus::Rejected),
            "pending" => Ok(SlotStatus::Pending),
            other => Err(format!("unknown slot status '{}'", other)),
        }
    }
}

/// A coach's declared window of availability. `start_time`/`end_time` are wall-clock times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: i64,
    pub coach_id: i64,
    pub coach_name: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: SlotStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeSlot {
    pub fn same_window(&self, coach_id: i64, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.coach_id == coach_id && self.start_time == start && self.end_time == end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTimeSlotRequest {
    pub coach_id: i64,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTimeSlotRequest {
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
}
