pub mod connection;
pub mod migrations;
pub mod models;
pub mod record_store;

pub use models::PersistedRecord;
pub use record_store::{MemoryRecordStore, PgRecordStore, RecordStore};
