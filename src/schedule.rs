//! Backup run bookkeeping and the "backup in progress" heuristic.

use chrono::{Local, NaiveDateTime};
use tracing::{debug, error};

use crate::store::{SettingsStore, Store};

pub const LAST_RUN_START_SETTING: &str = "BackupDBLastRunStart";
pub const LAST_RUN_END_SETTING: &str = "BackupDBLastRunEnd";
/// Housekeeping tag of the database backup task.
pub const BACKUP_TAG: &str = "BackupDB";

/// A backup older than this with no matching end time is assumed dead.
pub const IN_PROGRESS_THRESHOLD_SECS: i64 = 600;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp(time: NaiveDateTime) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Accepts both the stored `YYYY-MM-DD hh:mm:ss` and ISO `T`-separated forms.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let iso = raw.trim().replace(' ', "T");
    NaiveDateTime::parse_from_str(&iso, "%Y-%m-%dT%H:%M:%S").ok()
}

/// Start and end of the most recent backup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleRecord {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl ScheduleRecord {
    /// Unparseable stored values read as absent.
    pub async fn load(settings: &dyn SettingsStore) -> Self {
        let read = |value: Option<String>| value.as_deref().and_then(parse_timestamp);
        Self {
            start: read(settings.get_setting(LAST_RUN_START_SETTING).await),
            end: read(settings.get_setting(LAST_RUN_END_SETTING).await),
        }
    }

    pub fn in_progress_at(&self, now: NaiveDateTime) -> bool {
        let Some(start) = self.start else {
            debug!("No backup start time found, database backup is not in progress.");
            return false;
        };
        let elapsed = (now - start).num_seconds();

        match self.end {
            None if elapsed < IN_PROGRESS_THRESHOLD_SECS => {
                debug!(
                    "Backup started at {} ({}s ago) with no end time, it appears to still be running.",
                    format_timestamp(start),
                    elapsed
                );
                true
            }
            None => {
                debug!(
                    "Backup started at {} ({}s ago) but never recorded an end time, assuming it is not running.",
                    format_timestamp(start),
                    elapsed
                );
                false
            }
            Some(end) if end >= start => {
                debug!(
                    "Backup end time {} is not before start time {}, backup is not running.",
                    format_timestamp(end),
                    format_timestamp(start)
                );
                false
            }
            Some(_) if elapsed >= IN_PROGRESS_THRESHOLD_SECS => {
                debug!(
                    "Backup started at {} ({}s ago) and has not ended, assuming it is not running.",
                    format_timestamp(start),
                    elapsed
                );
                false
            }
            Some(_) => {
                debug!("Backup started at {} and is still running.", format_timestamp(start));
                true
            }
        }
    }
}

pub async fn is_backup_in_progress(settings: &dyn SettingsStore) -> bool {
    ScheduleRecord::load(settings)
        .await
        .in_progress_at(Local::now().naive_local())
}

/// Writes run timestamps and the per-tag last-run row.
pub struct ScheduleLedger<'a> {
    store: &'a dyn Store,
    settings: &'a dyn SettingsStore,
}

impl<'a> ScheduleLedger<'a> {
    pub fn new(store: &'a dyn Store, settings: &'a dyn SettingsStore) -> Self {
        Self { store, settings }
    }

    pub async fn record_start(&self, time: NaiveDateTime) {
        self.save(LAST_RUN_START_SETTING, time).await;
    }

    pub async fn record_end(&self, time: NaiveDateTime) {
        self.save(LAST_RUN_END_SETTING, time).await;
    }

    async fn save(&self, key: &str, time: NaiveDateTime) {
        if let Err(e) = self
            .settings
            .save_setting_on_host(key, &format_timestamp(time))
            .await
        {
            error!("Unable to save {}: {}", key, e);
        }
    }

    /// Replaces the housekeeping row for `tag` (delete, then insert) so a run
    /// that crashed halfway never leaves a partial record behind.
    pub async fn record_last_run(&self, tag: &str) {
        if !self.store.is_connected().await {
            return;
        }
        if let Err(e) = self
            .store
            .execute("DELETE FROM housekeeping WHERE tag = ?;", &[tag])
            .await
        {
            error!("Clearing housekeeping record {} failed: {}", tag, e);
        }
        if let Err(e) = self
            .store
            .execute("INSERT INTO housekeeping(tag, lastrun) VALUES (?, now());", &[tag])
            .await
        {
            error!("Writing housekeeping record {} failed: {}", tag, e);
        }
    }
}
