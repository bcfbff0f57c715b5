// dbkeeper/src/backup/script.rs
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use walkdir::WalkDir;

use super::{
    AttemptOutcome, Artifact, BACKUP_SCRIPT_ARGS_SETTING, BACKUP_SCRIPT_SETTING, BackupContext,
    BackupTarget,
};
use crate::credentials::{CredentialBundle, StagedCredentials};
use crate::errors::AppError;
use crate::process::{CommandSpec, EXIT_OK};
use crate::store::SettingsStore;

/// Backup script looked up in the share directory when no override is set.
pub const DEFAULT_BACKUP_SCRIPT: &str = "mythconverg_backup.pl";

/// Keep every old backup unless the operator's arguments say otherwise.
const ROTATE_DIRECTIVE: &str = "rotate=-1";

/// The configured backup script, or `None` when it does not exist.
pub async fn resolve_backup_script(settings: &dyn SettingsStore, share_dir: &Path) -> Option<PathBuf> {
    let script = settings
        .get_setting(BACKUP_SCRIPT_SETTING)
        .await
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| share_dir.join(DEFAULT_BACKUP_SCRIPT));

    if script.is_file() {
        Some(script)
    } else {
        info!("Database backup script does not exist: {}", script.display());
        None
    }
}

/// Runs the backup script with the staged `key=value` file as its last argument.
pub(crate) async fn run_script_backup(
    ctx: &BackupContext<'_>,
    script: &Path,
    target: &BackupTarget,
) -> AttemptOutcome {
    let script_args = ctx
        .settings
        .get_setting(BACKUP_SCRIPT_ARGS_SETTING)
        .await
        .unwrap_or_default();

    let mut directives = Vec::new();
    if !script_args.to_ascii_lowercase().contains("rotate") {
        directives.push(ROTATE_DIRECTIVE.to_string());
    }

    let bundle = CredentialBundle {
        params: ctx.store.params().clone(),
        schema_version: target.schema_version.clone(),
        backup_directory: target.directory.clone(),
        backup_filename: target.filename.clone(),
        directives,
    };

    let mut staged = match StagedCredentials::stage(ctx.temp_dir, &bundle.render_key_values()) {
        Ok(staged) => Some(staged),
        Err(e) => {
            error!("{}. Attempting backup, anyway.", e);
            None
        }
    };

    let mut command = CommandSpec::new(script).args(script_args.split_whitespace());
    if let Some(staged) = &staged {
        command = command.arg(staged.path_string());
    }

    info!("Backing up database with script: '{}'", script.display());
    let status = ctx.runner.run(&command).await;
    if let Some(staged) = staged.as_mut() {
        staged.release();
    }

    match status {
        Ok(EXIT_OK) => {}
        Ok(code) => {
            let failure = AppError::ExternalProcessFailed {
                program: script.display().to_string(),
                status: code,
            };
            error!("Error backing up database: {}", failure);
            return AttemptOutcome::Failed;
        }
        Err(e) => {
            error!("Error backing up database: {} ({})", script.display(), e);
            return AttemptOutcome::Failed;
        }
    }

    info!("Database Backup complete.");
    let artifact = locate_artifact(&target.directory, &target.filename);
    if let Artifact::File(path) = &artifact {
        info!("Backed up database to file: '{}'", path.display());
    }
    AttemptOutcome::Succeeded {
        artifact,
        degraded: false,
    }
}

/// Finds the file the script produced: the first (by name) file in
/// `directory` whose name starts with `prefix`.
pub fn locate_artifact(directory: &Path, prefix: &str) -> Artifact {
    let matches: Vec<String> = WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping unreadable entry in {}: {}", directory.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_owned))
        .filter(|name| name.starts_with(prefix))
        .collect();

    match matches.as_slice() {
        [] => {
            // The script probably chose its own name; don't guess
            debug!(
                "No files beginning with the suggested database backup filename '{}' were found in '{}'.",
                prefix,
                directory.display()
            );
            Artifact::Unidentified
        }
        [first, rest @ ..] => {
            if !rest.is_empty() {
                debug!(
                    "{} files beginning with the suggested database backup filename '{}' were found in '{}'. Assuming the first is the backup.",
                    rest.len() + 1,
                    prefix,
                    directory.display()
                );
            }
            Artifact::File(directory.join(first))
        }
    }
}
