//! Index state and its persistence.
//!
//! This module provides:
//! - The in-memory index store and immutable snapshots
//! - Data models for tags, occurrences, and file entries
//! - The persisted cache over a key-value slot (`SQLite` or in-memory)

mod cache;
mod connection;
mod kv;
mod models;
mod schema;
mod store;

pub use cache::{IndexCache, CACHE_SCHEMA_VERSION};
pub use connection::Database;
pub use kv::{KeyValueStore, MemoryStore};
pub use models::{FileEntry, FileStamp, Occurrence, Tag};
pub use schema::{migrate, verify_schema, SCHEMA_VERSION};
pub use store::{IndexSnapshot, IndexStore};

/// Initialize storage with migrations.
///
/// # Errors
///
/// Returns an error if database initialization fails.
pub fn init_storage(db: &Database) -> crate::Result<()> {
    db.with_conn(|conn| {
        migrate(conn)?;
        verify_schema(conn)?;

        tracing::info!("Storage initialized, schema version {SCHEMA_VERSION}");
        Ok(())
    })
}
