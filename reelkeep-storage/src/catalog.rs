//! Cross-kind helpers: record status propagation and daily tag analytics.

use crate::database::Database;
use crate::error::{StorageError, StorageResult};
use crate::range::{Direction, KeyRange, ScanIndex};
use crate::write_queue::WriteQueue;
use reelkeep_model::time::{day_key, is_valid_day_key};
use reelkeep_model::{CatalogRecord, DailyAggregate, NewWork, NewWorkStatus, RecordStatus};
use tracing::{debug, info};

/// Keeps catalog records and the discovery events that mirror their
/// status consistent.
#[derive(Clone)]
pub struct Catalog {
    db: Database,
    queue: WriteQueue,
}

impl Catalog {
    pub fn new(db: Database, queue: WriteQueue) -> Self {
        Self { db, queue }
    }

    /// Set a record's status, then mirror it onto the discovery event of
    /// the same id. The two writes are not atomic with each other.
    ///
    /// Returns `None` when no record exists under `id`.
    pub async fn set_record_status(
        &self,
        id: &str,
        status: RecordStatus,
        now: i64,
    ) -> StorageResult<Option<CatalogRecord>> {
        let record = self
            .queue
            .update(&self.db.records(), id, |current| {
                current.map(|mut record| {
                    record.status = status;
                    record.updated_at = now;
                    record
                })
            })
            .await?;
        if record.is_none() {
            return Ok(None);
        }

        self.queue
            .update(&self.db.new_works(), id, |current| {
                current.map(|mut work: NewWork| {
                    work.status = status.into();
                    work
                })
            })
            .await?;

        debug!(id, status = %status, "record status set");
        Ok(record)
    }

    /// Re-derive every discovery event's status from the record of the same
    /// id. Returns how many events changed; a second run changes none.
    ///
    /// The whole pass holds the write queue's turn, so each queued write
    /// from [`Catalog::set_record_status`] lands before or after it.
    pub async fn reconcile_new_works(&self) -> StorageResult<usize> {
        self.queue.exclusive(|| self.reconcile_pass()).await
    }

    fn reconcile_pass(&self) -> StorageResult<usize> {
        let records = self.db.records();
        let works = self.db.new_works();

        let mut changed = Vec::new();
        for work in works.range_scan(&ScanIndex::Primary, &KeyRange::all(), Direction::Ascending, None)? {
            let mut work = work?;
            let derived = records
                .get(work.id.as_str())?
                .map(|record| NewWorkStatus::from(record.status))
                .unwrap_or(NewWorkStatus::New);
            if work.status != derived {
                work.status = derived;
                changed.push(work);
            }
        }

        if !changed.is_empty() {
            works.bulk_put(&changed)?;
            info!(changed = changed.len(), "discovery statuses reconciled");
        }
        Ok(changed.len())
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn queue(&self) -> &WriteQueue {
        &self.queue
    }
}

/// Daily tag counters.
#[derive(Clone)]
pub struct Analytics {
    db: Database,
    queue: WriteQueue,
}

impl Analytics {
    pub fn new(db: Database, queue: WriteQueue) -> Self {
        Self { db, queue }
    }

    /// Count one viewed item with `tags` against `date`.
    ///
    /// Past days are sealed and reject further writes.
    pub async fn record_tags(&self, date: &str, tags: &[String], now: i64) -> StorageResult<DailyAggregate> {
        if !is_valid_day_key(date) {
            return Err(StorageError::Validation(format!("invalid day key {date:?}")));
        }
        let today = day_key(now);
        if date < today.as_str() {
            return Err(StorageError::Validation(format!("daily aggregate {date} is sealed")));
        }

        let updated = self
            .queue
            .update(&self.db.daily_stats(), date, |current| {
                let mut aggregate = current.unwrap_or_else(|| DailyAggregate::new(date, now));
                aggregate.bump(tags.iter().map(String::as_str));
                aggregate.updated_at = now;
                Some(aggregate)
            })
            .await?;

        updated.ok_or_else(|| StorageError::Validation(format!("daily aggregate {date} was not written")))
    }
}
