//! crates/batch/src/script.rs
//!
//! The `.sh` companion that replays a batch against another destination.

use std::fs::{self, File};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::error::{BatchError, BatchResult};

/// Path of the replay script for `batch`.
#[must_use]
pub fn script_path(batch: &Path) -> PathBuf {
    let mut name = batch.as_os_str().to_owned();
    name.push(".sh");
    PathBuf::from(name)
}

/// Writes an executable script beside `batch` that reruns `program` with
/// `options` in read-batch mode.
///
/// Batch-writing options become `--read-batch` and the destination can be
/// overridden by the script's first argument.
pub fn write_replay_script(
    batch: &Path,
    program: &str,
    options: &[String],
    destination: &str,
) -> BatchResult<PathBuf> {
    let path = script_path(batch);
    let mut file = File::create(&path).map_err(|err| BatchError::file(&path, err))?;

    let mut line = String::from(program);
    for option in options {
        let converted = option
            .strip_prefix("--write-batch=")
            .or_else(|| option.strip_prefix("--only-write-batch="))
            .map(|name| format!("--read-batch={name}"));
        line.push(' ');
        line.push_str(&shell_quote(converted.as_deref().unwrap_or(option)));
    }
    line.push_str(&format!(" \"${{1:-{}}}\"", shell_quote(destination)));

    writeln!(file, "#!/bin/sh")?;
    writeln!(file, "{line}")?;
    file.flush()?;

    let mut permissions = file.metadata()?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    fs::set_permissions(&path, permissions).map_err(|err| BatchError::file(&path, err))?;
    Ok(path)
}

fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '/' | '.' | ':' | '=' | ','))
    {
        return s.to_owned();
    }
    format!("'{}'", s.replace('\'', "'\\''"))
}
