pub mod repository;
pub mod store;

pub use store::{MemoryStore, SqliteStore, Store};
