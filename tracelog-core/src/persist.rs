//! Reading and writing source files
//!
//! Global invariants enforced:
//! - A file is either fully rewritten or left untouched
//! - The temp file lives next to its target so the rename stays on one filesystem

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Read a file as UTF-8 text
pub fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Temp path for `path`: the full file name plus `.tracelog.tmp`
///
/// Appending keeps `obs.c` and `obs.h` from sharing one temp file.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tracelog.tmp");
    path.with_file_name(name)
}

/// Write `contents` to `path` atomically (temp file + sync + rename)
pub fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }
    }

    let temp_path = temp_path_for(path);

    let mut file = fs::File::create(&temp_path)
        .with_context(|| format!("failed to create temp file: {}", temp_path.display()))?;
    let written = file
        .write_all(contents.as_bytes())
        .and_then(|()| file.sync_all());
    drop(file);
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e)
            .with_context(|| format!("failed to write temp file: {}", temp_path.display()));
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e).with_context(|| format!("failed to rename temp file to: {}", path.display()));
    }

    Ok(())
}
