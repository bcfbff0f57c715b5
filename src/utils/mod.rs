pub mod directories;
pub mod setting;

use std::path::PathBuf;
use tracing::warn;
use which::which;

const DUMP_EXECUTABLE: &str = "mysqldump";

/// Finds the mysqldump executable in the system PATH.
///
/// Falls back to the bare name so the failure surfaces when the dump runs.
pub fn find_dump_executable() -> PathBuf {
    which(DUMP_EXECUTABLE).unwrap_or_else(|_| {
        warn!("{} executable not found in PATH. Please ensure MySQL client tools are installed.", DUMP_EXECUTABLE);
        PathBuf::from(DUMP_EXECUTABLE)
    })
}
