//! SQLite storage layer for Reelkeep.
//!
//! Provides the local, indexed catalog store and the jobs that keep it
//! bounded.
//!
//! # Architecture
//!
//! - Each entity kind is one table: the JSON document plus columns extracted
//!   from it for secondary indexes (see [`schema`])
//! - [`EntityStore`] gives typed upserts, deletes, counts and lazy range scans
//!   with keyset continuation
//! - Queries are planned onto one index and finished with residual filters
//!   over the decoded document
//! - Schema migrations run automatically when a [`Database`] is opened
//! - [`RetentionManager`] bounds the log table and sweeps expired link cache
//!   entries; [`WriteQueue`] serializes verified read-modify-write cycles

mod catalog;
mod config;
mod cursor;
mod database;
mod error;
mod logbook;
pub mod migrations;
mod predicate;
mod query;
mod range;
mod retention;
pub mod schema;
mod store;
mod write_queue;

pub use catalog::{Analytics, Catalog};
pub use config::{RetentionSettings, RetryPolicy, StoreConfig, TtlSweepConfig};
pub use cursor::{RangeScan, RawRow};
pub use database::Database;
pub use error::{StorageError, StorageResult};
pub use logbook::Logbook;
pub use migrations::{AppliedMigration, SCHEMA_VERSION};
pub use predicate::{Predicate, PredicateOperator};
pub use query::{QueryPage, QueryPlan, QuerySpec};
pub use range::{Direction, KeyRange, ScanIndex};
pub use retention::{JobStatus, RetentionManager, RetentionReport, TtlSweeperHandle};
pub use rusqlite::types::Value as SqlValue;
pub use store::EntityStore;
pub use write_queue::{MemoryMirror, WriteMirror, WriteQueue};
