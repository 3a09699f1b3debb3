//! Entity model for Reelkeep.
//!
//! Every kind the catalog persists is a plain serde struct with camelCase
//! JSON field names, so a local export and a decoded cloud backup share one
//! shape.
//!
//! # Kinds
//!
//! - [`CatalogRecord`]: a catalog item the user has browsed, wants, or viewed
//! - [`ActorRecord`]: a performer with aliases and a blacklist flag
//! - [`LogEntry`]: an append-only diagnostic line
//! - [`NewWork`]: a discovery event for a subscribed actor
//! - [`LinkCacheEntry`]: a cached set of resolved links with a TTL
//! - [`DailyAggregate`] / [`MonthlyReport`]: derived analytics

mod actor;
mod analytics;
mod discovery;
mod kind;
mod link_cache;
mod log;
mod record;
pub mod time;

pub use actor::{ActorCategory, ActorRecord, Gender};
pub use analytics::{DailyAggregate, MonthlyReport, ReportPeriod, ReportStatus};
pub use discovery::{NewWork, NewWorkStatus};
pub use kind::{EntityKey, EntityKind, StoredEntity};
pub use link_cache::LinkCacheEntry;
pub use log::{LogEntry, LogLevel};
pub use record::{CatalogRecord, RecordStatus};
