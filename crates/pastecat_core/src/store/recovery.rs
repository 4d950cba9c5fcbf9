//! Startup recovery of filesystem-backed stores.
//!
//! Rebuilds the in-memory index from the shard directories using only file
//! sizes and modification times, prunes pastes that expired while the process
//! was down, and returns the remaining lifetimes so deletion can be re-armed.

use super::layout;
use crate::constants::MIN_EXPIRY_DELAY;
use crate::error::AppError;
use crate::id::PasteId;
use crate::models::Header;
use crate::stats::Stats;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// A pending deletion for a paste that survived a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    pub id: PasteId,
    pub after: Duration,
}

/// What a recovery walk found.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Pastes indexed, in walk order.
    pub recovered: usize,
    /// Files removed because their lifetime ended while the process was down.
    pub pruned: usize,
    /// Zero-byte files left behind by interrupted writes.
    pub removed_empty: usize,
    /// Deletions to arm, empty when the lifetime is infinite.
    pub expiries: Vec<Expiry>,
}

/// A paste file accepted by the walk, handed to the backend for indexing.
#[derive(Debug)]
pub(crate) struct RecoveredFile {
    pub path: PathBuf,
    pub header: Header,
}

/// Walk `dir` and index every live paste through `insert`.
///
/// Capacity for each indexed paste is reserved on `stats` before `insert` is
/// called, and released again if `insert` fails.
///
/// # Arguments
/// - `dir`: Data directory holding the shard directories.
/// - `lifetime`: Configured paste lifetime (`0` = infinite).
/// - `started_at`: Process start time, used for pruning and remaining lifetimes.
/// - `stats`: Capacity controller to reserve recovered pastes against.
/// - `insert`: Backend callback that indexes one paste.
///
/// # Errors
/// Every error is fatal: an unexpected directory layout, a file name that is
/// not a paste id, a capacity overflow, or an I/O failure.
pub(crate) fn recover<F>(
    dir: &Path,
    lifetime: Duration,
    started_at: SystemTime,
    stats: &Stats,
    mut insert: F,
) -> Result<RecoveryReport, AppError>
where
    F: FnMut(RecoveredFile) -> Result<(), AppError>,
{
    layout::setup_top_dir(dir)?;
    let mut report = RecoveryReport::default();
    for name in layout::shard_names() {
        let (shard, existed) = layout::setup_shard(dir, &name)?;
        if existed {
            recover_shard(&shard, &name, lifetime, started_at, stats, &mut insert, &mut report)?;
        }
    }
    tracing::info!(
        dir = %dir.display(),
        recovered = report.recovered,
        pruned = report.pruned,
        removed_empty = report.removed_empty,
        "Recovered data directory"
    );
    Ok(report)
}

fn recovery_error(path: &Path, err: impl std::fmt::Display) -> AppError {
    AppError::Recovery(format!("{}: {}", path.display(), err))
}

fn recover_shard<F>(
    shard: &Path,
    shard_name: &str,
    lifetime: Duration,
    started_at: SystemTime,
    stats: &Stats,
    insert: &mut F,
    report: &mut RecoveryReport,
) -> Result<(), AppError>
where
    F: FnMut(RecoveredFile) -> Result<(), AppError>,
{
    let entries = fs::read_dir(shard).map_err(|err| recovery_error(shard, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| recovery_error(shard, err))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|err| recovery_error(&path, err))?;
        if meta.is_dir() {
            return Err(recovery_error(&path, "invalid number of directories"));
        }
        if !meta.is_file() {
            tracing::warn!("Skipping non-regular file {}", path.display());
            continue;
        }

        let file_name = entry.file_name();
        let id = file_name
            .to_str()
            .ok_or_else(|| recovery_error(&path, "file name is not valid UTF-8"))
            .and_then(|suffix| {
                PasteId::parse(&format!("{}{}", shard_name, suffix))
                    .map_err(|err| recovery_error(&path, err))
            })?;

        if meta.len() == 0 {
            fs::remove_file(&path).map_err(|err| recovery_error(&path, err))?;
            tracing::info!("Removed empty paste {} left by an interrupted write", id);
            report.removed_empty += 1;
            continue;
        }

        let mod_time = meta.modified().map_err(|err| recovery_error(&path, err))?;
        let death_time = mod_time.checked_add(lifetime);
        if !lifetime.is_zero() && death_time.is_some_and(|death| death < started_at) {
            fs::remove_file(&path).map_err(|err| recovery_error(&path, err))?;
            tracing::info!("Removed paste {} which expired while down", id);
            report.pruned += 1;
            continue;
        }

        let size = meta.len();
        stats
            .reserve(size)
            .map_err(|err| recovery_error(&path, format!("{} while recovering", err)))?;

        let effective = mod_time.min(started_at);
        let header = Header::new(id, lifetime, DateTime::<Utc>::from(effective), size);
        if let Err(err) = insert(RecoveredFile {
            path: path.clone(),
            header,
        }) {
            stats.release(size);
            return Err(err);
        }
        report.recovered += 1;

        if !lifetime.is_zero() {
            let after = death_time
                .and_then(|death| death.duration_since(started_at).ok())
                .map(|left| left.clamp(MIN_EXPIRY_DELAY, lifetime.max(MIN_EXPIRY_DELAY)))
                .unwrap_or(lifetime);
            tracing::debug!("Recovered paste {} has {:?} left", id, after);
            report.expiries.push(Expiry { id, after });
        } else {
            tracing::debug!("Recovered paste {}", id);
        }
    }
    Ok(())
}
