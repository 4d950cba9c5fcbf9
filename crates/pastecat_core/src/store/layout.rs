//! On-disk layout shared by the filesystem-backed stores.
//!
//! A data directory holds 256 shard directories `00`..`ff`. A paste lives at
//! `<first id byte hex>/<remaining id hex>`.

use crate::constants::{DIR_MODE, FILE_MODE, SHARD_COUNT};
use crate::error::AppError;
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Name of the shard directory for a first id byte.
pub(crate) fn shard_name(byte: u8) -> String {
    format!("{:02x}", byte)
}

/// Every shard directory name, in order.
pub(crate) fn shard_names() -> impl Iterator<Item = String> {
    (0..SHARD_COUNT).map(|byte| shard_name(byte as u8))
}

fn dir_builder(recursive: bool) -> DirBuilder {
    let mut builder = DirBuilder::new();
    builder.recursive(recursive);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder
}

/// Create the data directory if needed.
///
/// # Errors
/// Returns [`AppError::Recovery`] if `dir` cannot be created or is not a
/// directory.
pub(crate) fn setup_top_dir(dir: &Path) -> Result<(), AppError> {
    dir_builder(true).create(dir).map_err(|err| {
        AppError::Recovery(format!(
            "cannot create data directory {}: {}",
            dir.display(),
            err
        ))
    })?;
    if !dir.is_dir() {
        return Err(AppError::Recovery(format!(
            "{} exists but is not a directory",
            dir.display()
        )));
    }
    Ok(())
}

/// Make sure the shard directory `name` exists under `dir`.
///
/// # Returns
/// The shard path and whether it already existed (and so may hold pastes).
///
/// # Errors
/// Returns [`AppError::Recovery`] when the entry exists but is not a
/// directory, or when it cannot be created.
pub(crate) fn setup_shard(dir: &Path, name: &str) -> Result<(PathBuf, bool), AppError> {
    let shard = dir.join(name);
    match fs::metadata(&shard) {
        Ok(meta) if meta.is_dir() => Ok((shard, true)),
        Ok(_) => Err(AppError::Recovery(format!(
            "{} exists but is not a directory",
            shard.display()
        ))),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            dir_builder(false).create(&shard).map_err(|err| {
                AppError::Recovery(format!(
                    "cannot create data directory {}: {}",
                    shard.display(),
                    err
                ))
            })?;
            Ok((shard, false))
        }
        Err(err) => Err(AppError::Recovery(format!(
            "cannot inspect data directory {}: {}",
            shard.display(),
            err
        ))),
    }
}

/// Write `content` to a file that must not exist yet.
///
/// A partially written file is removed before the error is returned.
///
/// # Errors
/// Returns the I/O error from creating or writing the file. An existing file
/// surfaces as [`std::io::ErrorKind::AlreadyExists`].
pub(crate) fn write_new_file(path: &Path, content: &[u8]) -> Result<(), AppError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }
    let mut file = options.open(path)?;
    if let Err(err) = file.write_all(content).and_then(|()| file.flush()) {
        drop(file);
        if let Err(remove_err) = fs::remove_file(path) {
            tracing::warn!(
                "Could not remove partially written paste {}: {}",
                path.display(),
                remove_err
            );
        }
        return Err(err.into());
    }
    Ok(())
}
