pub mod assignment;
pub mod coach;
pub mod time_slot;

pub use assignment::{Assignment, AssignmentAction, AssignmentStatus, NewAssignmentRequest, Priority};
pub use coach::{Coach, CoachStatus, CoachStatusBatch, NewCoachRequest, UpdateCoachRequest};
pub use time_slot::{NewTimeSlotRequest, SlotStatus, TimeSlot, UpdateTimeSlotRequest};

use serde::{Deserialize, Serialize};

/// Ids selected for a batch operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdBatch {
    pub ids: Vec<i64>,
}
