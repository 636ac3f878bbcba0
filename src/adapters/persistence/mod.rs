//! Persistence adapters (SQLite via libsql).

pub mod sqlite_store;

pub use sqlite_store::SqliteStore;
