//! # vab-store
//!
//! SQLite-backed Record Store: dedup records for posted notifications,
//! subscriber preferences, watch-lists and per-chat menu state.
//!
//! [`Database`] is a synchronous handle with typed helpers per table;
//! [`SqliteStore`] wraps it behind the async `RecordStore` port.

pub mod database;
pub mod migrations;

mod context;
mod error;
mod posts;
mod preferences;
mod proposals;
mod store;

pub use database::Database;
pub use error::StoreError;
pub use store::SqliteStore;
