//! Log retention and link-cache TTL sweeping.
//!
//! Neither job ever returns an error to its caller. Failures are logged and
//! recorded in the job's [`JobStatus`].

use crate::config::{RetentionSettings, TtlSweepConfig};
use crate::database::Database;
use crate::error::StorageResult;
use crate::range::{Direction, KeyRange, ScanIndex};
use reelkeep_model::time::{MILLIS_PER_DAY, now_millis};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Observable outcome of a recurring job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub runs: u64,
    pub last_run_at: Option<i64>,
    pub last_deleted: usize,
    pub last_error: Option<String>,
}

/// What one log-retention pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetentionReport {
    /// Entries older than the retention window.
    pub aged_out: usize,
    /// Oldest entries removed to respect the entry cap.
    pub trimmed: usize,
}

impl RetentionReport {
    pub fn total(&self) -> usize {
        self.aged_out + self.trimmed
    }
}

#[derive(Clone)]
pub struct RetentionManager {
    db: Database,
    settings: Arc<RwLock<RetentionSettings>>,
    log_status: Arc<Mutex<JobStatus>>,
    ttl_status: Arc<Mutex<JobStatus>>,
}

impl RetentionManager {
    pub fn new(db: Database, settings: RetentionSettings) -> Self {
        Self {
            db,
            settings: Arc::new(RwLock::new(settings)),
            log_status: Arc::new(Mutex::new(JobStatus::default())),
            ttl_status: Arc::new(Mutex::new(JobStatus::default())),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> RetentionSettings {
        *self.settings.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the settings; the next pass uses them.
    pub fn update_settings(&self, settings: RetentionSettings) {
        *self.settings.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = settings;
        debug!(
            max_entries = settings.max_entries,
            retention_days = settings.retention_days,
            "retention settings updated"
        );
    }

    pub fn log_job_status(&self) -> JobStatus {
        lock_status(&self.log_status).clone()
    }

    pub fn ttl_job_status(&self) -> JobStatus {
        lock_status(&self.ttl_status).clone()
    }

    /// Delete log entries older than the retention window, then trim the
    /// oldest entries until at most `max_entries` remain.
    pub fn enforce_log_retention(&self, now: i64) -> RetentionReport {
        let settings = self.settings();
        let mut report = RetentionReport::default();
        let result = self.apply_log_retention(settings, now, &mut report);

        let mut status = lock_status(&self.log_status);
        status.runs += 1;
        status.last_run_at = Some(now);
        status.last_deleted = report.total();
        match result {
            Ok(()) => {
                status.last_error = None;
                if report.total() > 0 {
                    info!(aged_out = report.aged_out, trimmed = report.trimmed, "log retention applied");
                }
            }
            Err(e) => {
                warn!("log retention failed: {e}");
                status.last_error = Some(e.to_string());
            }
        }
        report
    }

    fn apply_log_retention(
        &self,
        settings: RetentionSettings,
        now: i64,
        report: &mut RetentionReport,
    ) -> StorageResult<()> {
        let logs = self.db.logs();
        let by_time = ScanIndex::named("timestamp_ms");

        if settings.retention_days > 0 {
            let cutoff = now - i64::from(settings.retention_days) * MILLIS_PER_DAY;
            report.aged_out = logs.delete_range(
                &by_time,
                &KeyRange::all().upper(cutoff, false),
                Direction::Ascending,
                None,
            )?;
        }

        if settings.max_entries > 0 {
            let count = logs.count_all()?;
            if count > settings.max_entries {
                report.trimmed = logs.delete_range(
                    &by_time,
                    &KeyRange::all(),
                    Direction::Ascending,
                    Some(count - settings.max_entries),
                )?;
            }
        }
        Ok(())
    }

    /// Delete link-cache entries with `expireAt <= now`.
    pub fn sweep_expired_links(&self, now: i64) -> usize {
        let result = self.db.link_cache().delete_range(
            &ScanIndex::named("expire_at"),
            &KeyRange::all().upper(now, true),
            Direction::Ascending,
            None,
        );

        let mut status = lock_status(&self.ttl_status);
        status.runs += 1;
        status.last_run_at = Some(now);
        match result {
            Ok(deleted) => {
                status.last_deleted = deleted;
                status.last_error = None;
                if deleted > 0 {
                    info!(deleted, "expired link cache entries swept");
                }
                deleted
            }
            Err(e) => {
                warn!("link cache sweep failed: {e}");
                status.last_deleted = 0;
                status.last_error = Some(e.to_string());
                0
            }
        }
    }

    /// Sweep now, then on every interval tick until stopped or the handle
    /// is dropped. Must be called from within a tokio runtime.
    pub fn spawn_ttl_sweeper(&self, config: TtlSweepConfig) -> TtlSweeperHandle {
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let manager = self.clone();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(interval_ms = config.interval.as_millis() as u64, "ttl sweeper started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        manager.sweep_expired_links(now_millis());
                    }
                    _ = stop_rx.recv() => {
                        // An explicit stop and a dropped handle both end the loop.
                        break;
                    }
                }
            }
            debug!("ttl sweeper stopped");
        });

        TtlSweeperHandle { stop_tx, task }
    }
}

/// Running TTL sweeper. Dropping the handle stops the task.
pub struct TtlSweeperHandle {
    stop_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl TtlSweeperHandle {
    /// Stop the sweeper and wait for the task to exit.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
        if let Err(e) = self.task.await {
            warn!("ttl sweeper task ended abnormally: {e}");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

fn lock_status(status: &Mutex<JobStatus>) -> MutexGuard<'_, JobStatus> {
    status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
