pub mod reconcile;
pub mod rows;

pub use reconcile::{Decisions, ImportPreview, ImportSummary, Resolution};
pub use rows::{ImportKind, RowError};
