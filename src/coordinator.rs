//! One handle over every maintenance operation on the shared store.

use std::path::PathBuf;
use std::sync::Arc;

use crate::audit;
use crate::backup::{self, BackupContext, BackupOutcome};
use crate::process::ProcessRunner;
use crate::schedule;
use crate::schema_lock::SchemaLock;
use crate::store::{SettingsStore, Store};
use crate::utils::directories::StorageDirectories;
use crate::version::VersionProbe;

/// Filesystem locations the backup paths need.
#[derive(Debug, Clone)]
pub struct BackupPaths {
    pub share_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub dump_program: PathBuf,
    pub compressors: Vec<PathBuf>,
}

pub struct DbCoordinator {
    store: Arc<dyn Store>,
    settings: Arc<dyn SettingsStore>,
    runner: Arc<dyn ProcessRunner>,
    directories: Arc<dyn StorageDirectories>,
    paths: BackupPaths,
    version: VersionProbe,
}

impl DbCoordinator {
    pub fn new(
        store: Arc<dyn Store>,
        settings: Arc<dyn SettingsStore>,
        runner: Arc<dyn ProcessRunner>,
        directories: Arc<dyn StorageDirectories>,
        paths: BackupPaths,
    ) -> Self {
        Self {
            store,
            settings,
            runner,
            directories,
            paths,
            version: VersionProbe::new(),
        }
    }

    pub async fn backup_database(&self) -> BackupOutcome {
        let ctx = BackupContext {
            store: self.store.as_ref(),
            settings: self.settings.as_ref(),
            runner: self.runner.as_ref(),
            directories: self.directories.as_ref(),
            share_dir: &self.paths.share_dir,
            temp_dir: &self.paths.temp_dir,
            dump_program: &self.paths.dump_program,
            compressors: &self.paths.compressors,
        };
        backup::perform_backup(&ctx).await
    }

    pub async fn is_backup_in_progress(&self) -> bool {
        schedule::is_backup_in_progress(self.settings.as_ref()).await
    }

    pub async fn check_tables(&self, repair: bool, options: &str) -> bool {
        audit::check_tables(self.store.as_ref(), repair, options).await
    }

    pub async fn repair_tables(&self, tables: &[String]) -> bool {
        audit::repair_tables(self.store.as_ref(), tables).await
    }

    pub async fn list_tables(&self, engines: &[&str]) -> Vec<String> {
        audit::list_tables(self.store.as_ref(), engines).await
    }

    pub async fn is_empty_store(&self) -> bool {
        audit::is_empty_store(self.store.as_ref()).await
    }

    pub async fn version_string(&mut self) -> String {
        self.version
            .version_string(self.store.as_ref(), self.settings.as_ref())
            .await
    }

    /// `None` when the server version is unknown.
    pub async fn compare_version(&mut self, major: i64, minor: i64, point: i64) -> Option<i64> {
        self.version
            .compare(self.store.as_ref(), self.settings.as_ref(), major, minor, point)
            .await
    }

    pub fn reprobe_version(&mut self) {
        self.version.reprobe();
    }

    pub async fn acquire_schema_lock(&self) -> bool {
        SchemaLock::new(self.store.as_ref()).acquire().await
    }

    pub async fn release_schema_lock(&self) {
        SchemaLock::new(self.store.as_ref()).release().await
    }

    /// Estimated number of client processes attached to the store.
    pub async fn count_clients(&self) -> usize {
        audit::count_clients(self.store.as_ref()).await
    }
}
