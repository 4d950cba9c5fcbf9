//! Pluggable paste storage.
//!
//! Three interchangeable backends implement [`Store`]: plain files
//! ([`FileStore`]), memory-mapped files ([`MmapStore`]) and process memory
//! ([`MemStore`]). They share no base type; the capacity controller, header
//! derivation and id generation are composed in by value.

/// Plain-file backend.
pub mod fs;
/// On-disk shard layout helpers.
pub(crate) mod layout;
/// In-memory backend.
pub mod mem;
/// Memory-mapped file backend.
pub mod mmap;
/// In-flight reader accounting.
pub mod readers;
/// Startup recovery walker.
pub mod recovery;

pub use fs::FileStore;
pub use mem::MemStore;
pub use mmap::MmapStore;
pub use recovery::{Expiry, RecoveryReport};

use crate::config::{BackendKind, Config};
use crate::error::AppError;
use crate::id::PasteId;
use crate::models::Paste;
use crate::stats::{Stats, StatsSnapshot};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

/// A database of pastes identified by random ids.
///
/// Implementations are shared across request threads. Operations on one id
/// are linearizable; operations on different ids are unordered.
pub trait Store: Send + Sync {
    /// Open a read handle on a paste.
    ///
    /// The handle holds a reader reservation until it is dropped.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] for unknown ids or ids being deleted.
    fn get(&self, id: &PasteId) -> Result<Box<dyn Paste>, AppError>;

    /// Store new content under a fresh random id.
    ///
    /// # Errors
    /// Returns [`AppError::EmptyPaste`] for empty content, a capacity error
    /// when limits are reached, [`AppError::NoUnusedId`] when id draws keep
    /// colliding, or an I/O error. No capacity is held after a failure.
    fn put(&self, content: &[u8]) -> Result<PasteId, AppError>;

    /// Remove a paste and release its capacity.
    ///
    /// Blocks until every outstanding read handle on `id` is dropped.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] for unknown ids, or an I/O error, in
    /// which case the paste stays live and accounted.
    fn delete(&self, id: &PasteId) -> Result<(), AppError>;

    /// Capacity counters of this store.
    fn stats(&self) -> StatsSnapshot;

    /// Number of live pastes.
    fn len(&self) -> usize;

    /// Whether `id` is indexed, including while a deletion of it is in flight.
    fn contains(&self, id: &PasteId) -> bool;

    /// Whether the store holds no pastes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human-readable usage summary.
    fn report(&self) -> String {
        self.stats().to_string()
    }
}

/// A backend opened over a data directory, with what its recovery found.
pub struct Opened<S> {
    pub store: S,
    pub recovery: RecoveryReport,
}

/// Open the backend selected by `config`, recovering persisted pastes.
///
/// # Arguments
/// - `config`: Validated configuration.
/// - `stats`: Capacity controller the backend will account against.
/// - `started_at`: Process start time used by recovery.
///
/// # Errors
/// Propagates fatal recovery errors.
pub fn open_backend(
    config: &Config,
    stats: Arc<Stats>,
    started_at: SystemTime,
) -> Result<Opened<Arc<dyn Store>>, AppError> {
    let dir = Path::new(&config.data_dir);
    match config.backend {
        BackendKind::Fs => {
            let opened = FileStore::open(dir, config.lifetime, stats, started_at)?;
            Ok(Opened {
                store: Arc::new(opened.store),
                recovery: opened.recovery,
            })
        }
        BackendKind::Mmap => {
            let opened = MmapStore::open(dir, config.lifetime, stats, started_at)?;
            Ok(Opened {
                store: Arc::new(opened.store),
                recovery: opened.recovery,
            })
        }
        BackendKind::Mem => Ok(Opened {
            store: Arc::new(MemStore::new(config.lifetime, stats)),
            recovery: RecoveryReport::default(),
        }),
    }
}

/// Reserve capacity for `size` bytes, run `insert`, and roll back on failure.
pub(crate) fn admit<F>(stats: &Stats, size: u64, insert: F) -> Result<PasteId, AppError>
where
    F: FnOnce() -> Result<PasteId, AppError>,
{
    if size == 0 {
        return Err(AppError::EmptyPaste);
    }
    if let Err(err) = stats.reserve(size) {
        tracing::warn!("Rejecting paste of {} bytes: {}", size, err);
        return Err(err);
    }
    insert().map_err(|err| {
        stats.release(size);
        err
    })
}
