pub(crate) mod logic;   // Orchestration and fallback chain
pub(crate) mod script;  // Operator-supplied backup script
pub(crate) mod db_dump; // Built-in mysqldump + gzip path

use chrono::NaiveDateTime;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::process::ProcessRunner;
use crate::store::{SettingsStore, Store};
use crate::utils::directories::StorageDirectories;

pub use logic::perform_backup;
pub use db_dump::COMPRESSOR_CANDIDATES;
pub use script::DEFAULT_BACKUP_SCRIPT;

/// Printed in place of an artifact path when the backup itself failed.
pub const FAILED_ARTIFACT_MARKER: &str = "__FAILED__";

pub const DISABLE_BACKUP_SETTING: &str = "DisableAutomaticBackup";
pub const BACKUP_SCRIPT_SETTING: &str = "DatabaseBackupScript";
pub const BACKUP_SCRIPT_ARGS_SETTING: &str = "BackupDBScriptArgs";
pub const SCHEMA_VERSION_SETTING: &str = "DBSchemaVer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupStatus {
    Completed,
    Failed,
    Disabled,
    EmptyStore,
}

/// What a backup run left on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// No file could be attributed to the run (or none was attempted).
    Unidentified,
    File(PathBuf),
    /// The backup failed; there is nothing usable.
    Failed,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artifact::Unidentified => Ok(()),
            Artifact::File(path) => write!(f, "{}", path.display()),
            Artifact::Failed => f.write_str(FAILED_ARTIFACT_MARKER),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOutcome {
    pub status: BackupStatus,
    pub artifact: Artifact,
    /// The dump succeeded but was left uncompressed.
    pub degraded: bool,
}

impl BackupOutcome {
    pub fn skipped(status: BackupStatus) -> Self {
        Self {
            status,
            artifact: Artifact::Unidentified,
            degraded: false,
        }
    }
}

/// Result of one backup attempt (script or internal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttemptOutcome {
    Succeeded { artifact: Artifact, degraded: bool },
    Failed,
}

impl From<AttemptOutcome> for BackupOutcome {
    fn from(attempt: AttemptOutcome) -> Self {
        match attempt {
            AttemptOutcome::Succeeded { artifact, degraded } => BackupOutcome {
                status: BackupStatus::Completed,
                artifact,
                degraded,
            },
            AttemptOutcome::Failed => BackupOutcome {
                status: BackupStatus::Failed,
                artifact: Artifact::Failed,
                degraded: false,
            },
        }
    }
}

/// Collaborators and locations a backup run works with.
pub struct BackupContext<'a> {
    pub store: &'a dyn Store,
    pub settings: &'a dyn SettingsStore,
    pub runner: &'a dyn ProcessRunner,
    pub directories: &'a dyn StorageDirectories,
    /// Holds the default backup script.
    pub share_dir: &'a Path,
    /// Where credential files are staged.
    pub temp_dir: &'a Path,
    pub dump_program: &'a Path,
    /// Compressor locations, tried in order.
    pub compressors: &'a [PathBuf],
}

/// Directory and suggested file name of one backup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupTarget {
    pub directory: PathBuf,
    pub filename: String,
    pub schema_version: String,
}

impl BackupTarget {
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }
}

/// `<prefix>-<yyyyMMddhhmmss><extension>`; the extension includes its dot.
pub fn create_backup_filename(prefix: &str, extension: &str, now: NaiveDateTime) -> String {
    format!("{}-{}{}", prefix, now.format("%Y%m%d%H%M%S"), extension)
}
