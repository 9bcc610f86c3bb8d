pub mod assignment_service;
pub mod coach_service;
pub mod import_service;
pub mod recurring;
pub mod slot_service;

pub use import_service::ImportService;
pub use recurring::{RecurringSlotRequest, SlotDraft};
