// dbkeeper/src/utils/directories.rs
use std::path::{Path, PathBuf};
use tracing::debug;

/// Purpose label of the directories that receive database backups.
pub const BACKUP_PURPOSE: &str = "DB Backups";
const FALLBACK_BACKUP_DIR: &str = "/tmp";

/// Picks storage directories for a logical purpose.
pub trait StorageDirectories: Send + Sync {
    /// Candidate directories, in preference order.
    fn dir_list(&self, purpose: &str) -> Vec<PathBuf>;

    /// The candidate with the most free space, if any.
    fn most_free(&self, purpose: &str) -> Option<PathBuf>;
}

/// Directory selection over the `backup_directories` list from config.json.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredDirectories {
    backup_directories: Vec<PathBuf>,
}

impl ConfiguredDirectories {
    pub fn new(backup_directories: Vec<PathBuf>) -> Self {
        Self { backup_directories }
    }
}

impl StorageDirectories for ConfiguredDirectories {
    fn dir_list(&self, purpose: &str) -> Vec<PathBuf> {
        if purpose == BACKUP_PURPOSE {
            self.backup_directories.clone()
        } else {
            Vec::new()
        }
    }

    fn most_free(&self, purpose: &str) -> Option<PathBuf> {
        let candidates = self.dir_list(purpose);
        // Unreadable directories rank last but still win over nothing
        candidates
            .iter()
            .enumerate()
            .max_by_key(|(index, dir)| {
                (
                    fs2::available_space(dir).unwrap_or(0),
                    std::cmp::Reverse(*index),
                )
            })
            .map(|(_, dir)| dir.clone())
    }
}

/// Chooses where a backup goes: the most-free "DB Backups" directory, or
/// `/tmp` when none is configured or the chosen one does not exist.
pub fn resolve_backup_directory(directories: &dyn StorageDirectories) -> PathBuf {
    if !directories.dir_list(BACKUP_PURPOSE).is_empty() {
        if let Some(directory) = directories.most_free(BACKUP_PURPOSE) {
            if directory.is_dir() {
                return directory;
            }
            debug!(
                "Backup directory {} does not exist, using {}",
                directory.display(),
                FALLBACK_BACKUP_DIR
            );
        }
    }
    Path::new(FALLBACK_BACKUP_DIR).to_path_buf()
}
