//! Backup snapshots.
//!
//! A snapshot is the full JSON image of the reconcilable kinds, each
//! section keyed by primary key. Import is lenient: a section may be an
//! object map or an array, and every entry that fails to decode or
//! validate is skipped and counted instead of failing the import.

use crate::error::{SyncError, SyncResult};
use reelkeep_model::time::{is_valid_day_key, is_valid_month_key, now_millis};
use reelkeep_model::{
    ActorRecord, CatalogRecord, DailyAggregate, EntityKey, EntityKind, LogEntry, MonthlyReport,
    NewWork, StoredEntity,
};
use reelkeep_storage::Database;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    pub version: u32,
    pub exported_at: i64,
    #[serde(default)]
    pub records: BTreeMap<String, CatalogRecord>,
    #[serde(default)]
    pub actors: BTreeMap<String, ActorRecord>,
    #[serde(default)]
    pub new_works: BTreeMap<String, NewWork>,
    #[serde(default)]
    pub daily_stats: BTreeMap<String, DailyAggregate>,
    #[serde(default)]
    pub monthly_reports: BTreeMap<String, MonthlyReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<LogEntry>,
}

/// A decoded snapshot plus the number of entries dropped per kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub snapshot: BackupSnapshot,
    pub skipped: BTreeMap<EntityKind, usize>,
}

impl ImportOutcome {
    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }
}

impl BackupSnapshot {
    pub fn empty(exported_at: i64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            exported_at,
            records: BTreeMap::new(),
            actors: BTreeMap::new(),
            new_works: BTreeMap::new(),
            daily_stats: BTreeMap::new(),
            monthly_reports: BTreeMap::new(),
            logs: Vec::new(),
        }
    }

    /// Decodes a snapshot, skipping entries that do not validate.
    ///
    /// Only a top level that is not a JSON object is an error.
    pub fn from_json(value: &Value) -> SyncResult<ImportOutcome> {
        let Some(root) = value.as_object() else {
            return Err(SyncError::InvalidSnapshot(format!(
                "expected an object at the top level, found {}",
                json_type(value)
            )));
        };

        let mut skipped = BTreeMap::new();
        let version = root
            .get("version")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(SNAPSHOT_VERSION);
        if version > SNAPSHOT_VERSION {
            warn!(version, supported = SNAPSHOT_VERSION, "Snapshot is newer than this build, importing known fields");
        }

        let snapshot = Self {
            version,
            exported_at: root.get("exportedAt").and_then(Value::as_i64).unwrap_or(0),
            records: import_keyed(root.get("records"), &mut skipped),
            actors: import_keyed(root.get("actors"), &mut skipped),
            new_works: import_keyed(root.get("newWorks"), &mut skipped),
            daily_stats: import_keyed(root.get("dailyStats"), &mut skipped),
            monthly_reports: import_keyed(root.get("monthlyReports"), &mut skipped),
            logs: import_logs(root.get("logs"), &mut skipped),
        };

        let outcome = ImportOutcome { snapshot, skipped };
        if outcome.total_skipped() > 0 {
            warn!(skipped = ?outcome.skipped, "Skipped invalid snapshot entries");
        }
        Ok(outcome)
    }

    pub fn to_json(&self) -> SyncResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn entity_count(&self) -> usize {
        self.records.len()
            + self.actors.len()
            + self.new_works.len()
            + self.daily_stats.len()
            + self.monthly_reports.len()
            + self.logs.len()
    }
}

/// Builds a snapshot of everything currently in the store.
pub fn export_snapshot(db: &Database, include_logs: bool) -> SyncResult<BackupSnapshot> {
    let snapshot = BackupSnapshot {
        version: SNAPSHOT_VERSION,
        exported_at: now_millis(),
        records: db.records().export_map()?,
        actors: db.actors().export_map()?,
        new_works: db.new_works().export_map()?,
        daily_stats: db.daily_stats().export_map()?,
        monthly_reports: db.monthly_reports().export_map()?,
        logs: if include_logs { db.logs().export_all()? } else { Vec::new() },
    };
    info!(entities = snapshot.entity_count(), include_logs, "Exported snapshot");
    Ok(snapshot)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Entries of a section, whether it arrived as a map or an array.
fn section_entries(section: Option<&Value>) -> Result<Vec<&Value>, &'static str> {
    match section {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(map)) => Ok(map.values().collect()),
        Some(Value::Array(items)) => Ok(items.iter().collect()),
        Some(other) => Err(json_type(other)),
    }
}

fn bump(skipped: &mut BTreeMap<EntityKind, usize>, kind: EntityKind, by: usize) {
    if by > 0 {
        *skipped.entry(kind).or_default() += by;
    }
}

/// Checks an entry's key and returns it rendered as the map key.
fn validate_key<T: StoredEntity>(entity: &T) -> Result<String, String> {
    let key = match entity.key() {
        Some(EntityKey::Text(key)) => key,
        Some(EntityKey::Int(_)) | None => return Err("missing key".to_string()),
    };
    if key.trim().is_empty() {
        return Err("empty key".to_string());
    }
    match T::KIND {
        EntityKind::DailyAggregate if !is_valid_day_key(&key) => Err(format!("malformed day key {key:?}")),
        EntityKind::MonthlyReport if !is_valid_month_key(&key) => Err(format!("malformed month key {key:?}")),
        _ => Ok(key),
    }
}

fn import_keyed<T: StoredEntity>(
    section: Option<&Value>,
    skipped: &mut BTreeMap<EntityKind, usize>,
) -> BTreeMap<String, T> {
    let entries = match section_entries(section) {
        Ok(entries) => entries,
        Err(found) => {
            warn!(kind = %T::KIND, found, "Snapshot section has the wrong shape, ignoring it");
            bump(skipped, T::KIND, 1);
            return BTreeMap::new();
        }
    };

    let mut out = BTreeMap::new();
    let mut bad = 0;
    for entry in entries {
        let entity: T = match serde_json::from_value(entry.clone()) {
            Ok(entity) => entity,
            Err(e) => {
                warn!(kind = %T::KIND, error = %e, "Skipping undecodable entry");
                bad += 1;
                continue;
            }
        };
        match validate_key(&entity) {
            Ok(key) => {
                out.insert(key, entity);
            }
            Err(reason) => {
                warn!(kind = %T::KIND, %reason, "Skipping invalid entry");
                bad += 1;
            }
        }
    }
    bump(skipped, T::KIND, bad);
    out
}

fn import_logs(section: Option<&Value>, skipped: &mut BTreeMap<EntityKind, usize>) -> Vec<LogEntry> {
    let entries = match section_entries(section) {
        Ok(entries) => entries,
        Err(found) => {
            warn!(found, "Snapshot logs section has the wrong shape, ignoring it");
            bump(skipped, EntityKind::LogEntry, 1);
            return Vec::new();
        }
    };

    let mut logs = Vec::with_capacity(entries.len());
    let mut bad = 0;
    for entry in entries {
        match serde_json::from_value::<LogEntry>(entry.clone()) {
            Ok(log) => logs.push(log),
            Err(e) => {
                warn!(error = %e, "Skipping undecodable log entry");
                bad += 1;
            }
        }
    }
    bump(skipped, EntityKind::LogEntry, bad);
    logs
}
