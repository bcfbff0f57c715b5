//! Short-lived credential files for external tools.
//!
//! Secrets reach the backup script and the dump utility only through a staged
//! file whose path is passed on the command line; the secret values themselves
//! never become process arguments or log lines.
//!
//! A staged file is removed when its [`StagedCredentials`] is released or
//! dropped, on success and failure paths alike. If the process is killed
//! outright (SIGKILL, power loss) the file stays behind in the temp directory
//! until the system cleans it up. It is owner-read-only, but it does hold the
//! database password for that window.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, warn};

use crate::config::DatabaseParams;
use crate::errors::{AppError, Result};

const STAGED_FILE_PREFIX: &str = "dbkeeper_db_backup_conf_";

/// Everything an external backup tool needs to reach the store.
#[derive(Debug, Clone)]
pub struct CredentialBundle {
    pub params: DatabaseParams,
    pub schema_version: String,
    pub backup_directory: PathBuf,
    pub backup_filename: String,
    /// Free-form `key=value` directives appended verbatim, one per line.
    pub directives: Vec<String>,
}

impl CredentialBundle {
    /// `key=value` lines read by the backup script.
    pub fn render_key_values(&self) -> String {
        let mut out = format!(
            "DBHostName={}\nDBPort={}\nDBUserName={}\nDBPassword={}\n\
             DBName={}\nDBSchemaVer={}\nDBBackupDirectory={}\nDBBackupFilename={}\n",
            self.params.host,
            self.params.port,
            self.params.user,
            self.params.password,
            self.params.name,
            self.schema_version,
            self.backup_directory.display(),
            self.backup_filename,
        );
        for directive in &self.directives {
            out.push_str(directive);
            out.push('\n');
        }
        out
    }

    /// Option-file sections understood by the MySQL client tools
    /// (`--defaults-extra-file`).
    pub fn render_client_sections(&self) -> String {
        format!(
            "[client]\npassword={0}\n[mysqldump]\npassword={0}\n",
            self.params.password
        )
    }
}

/// A permission-restricted temporary file holding connection secrets.
pub struct StagedCredentials {
    path: PathBuf,
    temp: Option<TempPath>,
}

impl StagedCredentials {
    /// Creates a uniquely named file in `dir`, restricts it to owner-read
    /// before anything is written, then writes `content` verbatim.
    pub fn stage(dir: &Path, content: &str) -> Result<Self> {
        let staging_error =
            |e: std::io::Error| AppError::CredentialStagingFailed(format!("{}: {}", dir.display(), e));

        let (mut file, temp) = tempfile::Builder::new()
            .prefix(STAGED_FILE_PREFIX)
            .tempfile_in(dir)
            .map_err(staging_error)?
            .into_parts();

        // On any error below `temp` is dropped and the file unlinked
        restrict_to_owner_read(&temp).map_err(staging_error)?;
        file.write_all(content.as_bytes())
            .and_then(|_| file.flush())
            .map_err(staging_error)?;

        let path = temp.to_path_buf();
        debug!(path = %path.display(), "Staged temporary credential file");
        Ok(Self {
            path,
            temp: Some(temp),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn path_string(&self) -> String {
        self.path.display().to_string()
    }

    /// Deletes the file. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(temp) = self.temp.take() {
            match temp.close() {
                Ok(()) => debug!(path = %self.path.display(), "Removed temporary credential file"),
                Err(e) => warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Unable to remove temporary credential file"
                ),
            }
        }
    }

    pub fn is_released(&self) -> bool {
        self.temp.is_none()
    }
}

impl Drop for StagedCredentials {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(unix)]
fn restrict_to_owner_read(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o400))
}

#[cfg(not(unix))]
fn restrict_to_owner_read(_path: &Path) -> std::io::Result<()> {
    // tempfile already creates the file private to the current user
    Ok(())
}
