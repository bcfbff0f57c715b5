// dbkeeper/src/backup/db_dump.rs
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::{AttemptOutcome, Artifact, BackupContext, BackupTarget};
use crate::config::DatabaseParams;
use crate::credentials::{CredentialBundle, StagedCredentials};
use crate::errors::AppError;
use crate::process::{CommandSpec, EXIT_OK};

/// Where the compressor is looked for, in order.
pub const COMPRESSOR_CANDIDATES: [&str; 2] = ["/bin/gzip", "/usr/bin/gzip"];
const COMPRESSED_EXTENSION: &str = ".gz";

const DUMP_OPTIONS: &[&str] = &[
    "--add-drop-table",
    "--add-locks",
    "--allow-keywords",
    "--complete-insert",
    "--extended-insert",
    "--lock-tables",
    "--no-create-db",
    "--quick",
];

pub fn find_compressor(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|path| path.is_file()).cloned()
}

/// The mysqldump invocation. The password only travels in `extra_file`,
/// which must come first for the client to read it.
fn dump_command(
    program: &Path,
    params: &DatabaseParams,
    extra_file: &Path,
    output: &Path,
) -> CommandSpec {
    let mut command = CommandSpec::new(program)
        .arg(format!("--defaults-extra-file={}", extra_file.display()))
        .arg(format!("--host={}", params.host));
    if params.port > 0 {
        command = command.arg(format!("--port={}", params.port));
    }
    command
        .arg(format!("--user={}", params.user))
        .args(DUMP_OPTIONS.iter().copied())
        .arg(params.name.clone())
        .stdout_to(output)
        .discard_stderr()
}

fn with_extension(path: PathBuf, extension: &str) -> PathBuf {
    let mut raw = path.into_os_string();
    raw.push(extension);
    PathBuf::from(raw)
}

/// Dumps the store with mysqldump into the target file, then gzips it when a
/// compressor is available.
///
/// A failed dump fails the attempt. A missing or failing compressor only
/// leaves the dump uncompressed, reported as degraded.
pub(crate) async fn run_internal_backup(
    ctx: &BackupContext<'_>,
    target: &BackupTarget,
) -> AttemptOutcome {
    let params = ctx.store.params();
    let compressor = find_compressor(ctx.compressors);
    if compressor.is_none() {
        warn!(
            "No compressor found at {:?}. The database backup will be uncompressed.",
            ctx.compressors
        );
    }

    let bundle = CredentialBundle {
        params: params.clone(),
        schema_version: target.schema_version.clone(),
        backup_directory: target.directory.clone(),
        backup_filename: target.filename.clone(),
        directives: Vec::new(),
    };
    let mut staged = match StagedCredentials::stage(ctx.temp_dir, &bundle.render_client_sections()) {
        Ok(staged) => staged,
        Err(e) => {
            error!("{}", e);
            return AttemptOutcome::Failed;
        }
    };

    let backup_path = target.path();
    let command = dump_command(ctx.dump_program, params, staged.path(), &backup_path);
    debug!(
        "Backing up database with command: {} {}",
        command.program_name(),
        command.args.join(" ")
    );
    info!("Backing up database to file: '{}'", backup_path.display());

    let status = ctx.runner.run(&command).await;
    staged.release();

    match status {
        Ok(EXIT_OK) => {}
        Ok(code) => {
            let failure = AppError::ExternalProcessFailed {
                program: command.program_name(),
                status: code,
            };
            error!("Error backing up database: {}", failure);
            return AttemptOutcome::Failed;
        }
        Err(e) => {
            error!("Error backing up database: {} ({})", command.program_name(), e);
            return AttemptOutcome::Failed;
        }
    }

    let mut artifact_path = backup_path;
    let mut degraded = compressor.is_none();
    if let Some(gzip) = compressor {
        info!("Compressing database backup file.");
        let compress = CommandSpec::new(gzip).arg(artifact_path.display().to_string());
        match ctx.runner.run(&compress).await {
            Ok(EXIT_OK) => {
                artifact_path = with_extension(artifact_path, COMPRESSED_EXTENSION);
                info!("Database Backup filename: '{}'", artifact_path.display());
            }
            Ok(_) | Err(_) => {
                warn!("Compression failed, backup file will remain uncompressed.");
                degraded = true;
            }
        }
    }

    info!("Database Backup complete.");
    AttemptOutcome::Succeeded {
        artifact: Artifact::File(artifact_path),
        degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::OutputTarget;
    use crate::testkit::{FakeStore, FixedDirectories, MemorySettings, ScriptedRunner};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct Fixture {
        backups: TempDir,
        temp: TempDir,
        gzip_dir: TempDir,
    }

    impl Fixture {
        fn new() -> anyhow::Result<Self> {
            Ok(Self {
                backups: TempDir::new()?,
                temp: TempDir::new()?,
                gzip_dir: TempDir::new()?,
            })
        }

        fn installed_gzip(&self) -> anyhow::Result<PathBuf> {
            let gzip = self.gzip_dir.path().join("gzip");
            std::fs::write(&gzip, "")?;
            Ok(gzip)
        }

        fn target(&self) -> BackupTarget {
            BackupTarget {
                directory: self.backups.path().to_path_buf(),
                filename: "mythconverg-1254-20240101120000.sql".into(),
                schema_version: "1254".into(),
            }
        }
    }

    async fn run(fixture: &Fixture, runner: &ScriptedRunner, compressors: &[PathBuf]) -> AttemptOutcome {
        let store = FakeStore::new();
        let settings = MemorySettings::new();
        let directories = FixedDirectories(Vec::new());
        let ctx = BackupContext {
            store: &store,
            settings: &settings,
            runner,
            directories: &directories,
            share_dir: Path::new("/nonexistent"),
            temp_dir: fixture.temp.path(),
            dump_program: Path::new("/usr/bin/mysqldump"),
            compressors,
        };
        run_internal_backup(&ctx, &fixture.target()).await
    }

    #[test]
    fn test_dump_command_layout() {
        let params = crate::testkit::test_params();
        let command = dump_command(
            Path::new("mysqldump"),
            &params,
            Path::new("/tmp/conf"),
            Path::new("/srv/out.sql"),
        );

        assert_eq!(command.args[0], "--defaults-extra-file=/tmp/conf");
        assert!(command.args.contains(&"--port=3306".to_string()));
        assert_eq!(command.args.last().map(String::as_str), Some("mythconverg"));
        assert!(command.args.iter().all(|arg| !arg.contains("s3cret")));
        assert_eq!(command.stdout, OutputTarget::File(PathBuf::from("/srv/out.sql")));
        assert!(command.discard_stderr);
    }

    #[test]
    fn test_default_port_is_not_passed() {
        let params = DatabaseParams {
            port: 0,
            ..crate::testkit::test_params()
        };
        let command = dump_command(Path::new("mysqldump"), &params, Path::new("/c"), Path::new("/o"));
        assert!(!command.args.iter().any(|arg| arg.starts_with("--port")));
    }

    #[tokio::test]
    async fn test_dump_and_compress() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let gzip = fixture.installed_gzip()?;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_hook = seen.clone();
        let runner = ScriptedRunner::new().on_run(move |command| {
            if let Some(conf) = command
                .args
                .first()
                .and_then(|arg| arg.strip_prefix("--defaults-extra-file="))
            {
                seen_hook.lock().unwrap().push(std::fs::read_to_string(conf).ok());
            }
        });

        let outcome = run(&fixture, &runner, &[gzip.clone()]).await;
        let expected = fixture.backups.path().join("mythconverg-1254-20240101120000.sql.gz");
        assert_eq!(
            outcome,
            AttemptOutcome::Succeeded {
                artifact: Artifact::File(expected),
                degraded: false
            }
        );

        let commands = runner.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1].program, gzip);
        assert_eq!(
            seen.lock().unwrap()[0].as_deref(),
            Some("[client]\npassword=s3cret\n[mysqldump]\npassword=s3cret\n")
        );
        assert_eq!(std::fs::read_dir(fixture.temp.path())?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_compressor_is_degraded() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let runner = ScriptedRunner::new();
        let outcome = run(&fixture, &runner, &[PathBuf::from("/nonexistent/gzip")]).await;

        assert_eq!(
            outcome,
            AttemptOutcome::Succeeded {
                artifact: Artifact::File(fixture.target().path()),
                degraded: true
            }
        );
        assert_eq!(runner.commands().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_compression_failure_keeps_uncompressed_file() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let gzip = fixture.installed_gzip()?;
        let runner = ScriptedRunner::new().status_for("gzip", 1);

        let outcome = run(&fixture, &runner, &[gzip]).await;
        assert_eq!(
            outcome,
            AttemptOutcome::Succeeded {
                artifact: Artifact::File(fixture.target().path()),
                degraded: true
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_dump_failure_fails_and_removes_credentials() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let gzip = fixture.installed_gzip()?;
        let runner = ScriptedRunner::new().status_for("mysqldump", 2);

        let outcome = run(&fixture, &runner, &[gzip]).await;
        assert_eq!(outcome, AttemptOutcome::Failed);
        // No compression after a failed dump
        assert_eq!(runner.commands().len(), 1);
        assert_eq!(std::fs::read_dir(fixture.temp.path())?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_staging_failure_is_fatal() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let runner = ScriptedRunner::new();
        let store = FakeStore::new();
        let settings = MemorySettings::new();
        let directories = FixedDirectories(Vec::new());
        let ctx = BackupContext {
            store: &store,
            settings: &settings,
            runner: &runner,
            directories: &directories,
            share_dir: Path::new("/nonexistent"),
            temp_dir: Path::new("/nonexistent/tmp"),
            dump_program: Path::new("mysqldump"),
            compressors: &[],
        };

        assert_eq!(run_internal_backup(&ctx, &fixture.target()).await, AttemptOutcome::Failed);
        assert!(runner.commands().is_empty());
        Ok(())
    }

    #[test]
    fn test_find_compressor_order() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let second = dir.path().join("gzip2");
        std::fs::write(&second, "")?;
        let candidates = vec![dir.path().join("gzip1"), second.clone()];
        assert_eq!(find_compressor(&candidates), Some(second));
        assert_eq!(find_compressor(&[]), None);
        Ok(())
    }
}
