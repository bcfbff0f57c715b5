// dbkeeper/src/backup/logic.rs
use chrono::Local;
use std::path::PathBuf;
use tracing::{info, warn};

use super::{
    AttemptOutcome, BackupContext, BackupOutcome, BackupStatus, BackupTarget,
    DISABLE_BACKUP_SETTING, SCHEMA_VERSION_SETTING, create_backup_filename, db_dump, script,
};
use crate::audit;
use crate::schedule::{BACKUP_TAG, ScheduleLedger};
use crate::utils::directories::resolve_backup_directory;

const BACKUP_EXTENSION: &str = ".sql";

/// Where a backup run stands.
enum Stage {
    Script(PathBuf),
    Internal,
    Finished(AttemptOutcome),
}

/// Why a backup request was not carried out.
async fn skip_reason(ctx: &BackupContext<'_>) -> Option<BackupStatus> {
    if cfg!(windows) {
        info!("Database backups disabled on Windows.");
        return Some(BackupStatus::Disabled);
    }
    if ctx.settings.get_num_setting(DISABLE_BACKUP_SETTING, 0).await != 0 {
        info!("Database backups disabled.  Skipping backup.");
        return Some(BackupStatus::Disabled);
    }
    if audit::is_empty_store(ctx.store).await {
        info!("New database detected.  Skipping backup.");
        return Some(BackupStatus::EmptyStore);
    }
    None
}

async fn backup_target(ctx: &BackupContext<'_>) -> BackupTarget {
    let schema_version = ctx
        .settings
        .get_setting(SCHEMA_VERSION_SETTING)
        .await
        .unwrap_or_default();
    let prefix = format!("{}-{}", ctx.store.params().name, schema_version);

    BackupTarget {
        directory: resolve_backup_directory(ctx.directories),
        filename: create_backup_filename(&prefix, BACKUP_EXTENSION, Local::now().naive_local()),
        schema_version,
    }
}

/// Backs up the store: the operator's script first, the built-in dump if
/// there is no script or it fails.
///
/// Skipped requests (disabled, empty store) touch neither the ledger nor any
/// credentials. Otherwise the start and end times and the housekeeping row are
/// recorded whatever the result.
///
/// Can corrupt in-progress writes or stall readers on a busy store while the
/// dump holds its table locks.
pub async fn perform_backup(ctx: &BackupContext<'_>) -> BackupOutcome {
    if let Some(status) = skip_reason(ctx).await {
        return BackupOutcome::skipped(status);
    }

    let ledger = ScheduleLedger::new(ctx.store, ctx.settings);
    ledger.record_start(Local::now().naive_local()).await;

    let target = backup_target(ctx).await;
    let mut stage = match script::resolve_backup_script(ctx.settings, ctx.share_dir).await {
        Some(script) => Stage::Script(script),
        None => Stage::Internal,
    };

    let attempt = loop {
        stage = match stage {
            Stage::Script(script) => match script::run_script_backup(ctx, &script, &target).await {
                AttemptOutcome::Failed => {
                    warn!("Script-based database backup failed. Retrying with internal backup.");
                    Stage::Internal
                }
                succeeded => Stage::Finished(succeeded),
            },
            Stage::Internal => Stage::Finished(db_dump::run_internal_backup(ctx, &target).await),
            Stage::Finished(attempt) => break attempt,
        };
    };

    ledger.record_end(Local::now().naive_local()).await;
    ledger.record_last_run(BACKUP_TAG).await;

    BackupOutcome::from(attempt)
}
