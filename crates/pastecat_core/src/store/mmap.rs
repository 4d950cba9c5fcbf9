//! Memory-mapped paste storage.

use super::layout;
use super::readers::ReaderGate;
use super::recovery::{self, RecoveredFile};
use super::{admit, Opened, Store};
use crate::error::AppError;
use crate::id::PasteId;
use crate::models::paste::BufferPaste;
use crate::models::{Header, Paste};
use crate::stats::{Stats, StatsSnapshot};
use chrono::Utc;
use memmap2::Mmap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

struct MmapRecord {
    header: Header,
    path: PathBuf,
    map: Mmap,
    reading: Arc<ReaderGate>,
}

/// Zero-copy view over a record's mapping, kept alive by the handle.
struct MappedBytes(Arc<MmapRecord>);

impl AsRef<[u8]> for MappedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0.map
    }
}

/// Persists pastes exactly like [`super::FileStore`] and serves reads from a
/// read-only memory mapping of each file.
///
/// Deleting a paste waits for its readers before removing the file and
/// dropping the mapping.
pub struct MmapStore {
    dir: PathBuf,
    lifetime: Duration,
    stats: Arc<Stats>,
    index: RwLock<HashMap<PasteId, Arc<MmapRecord>>>,
}

fn map_file(path: &Path) -> Result<Mmap, AppError> {
    let file = File::open(path)?;
    // SAFETY: paste files are written once before being mapped and are only
    // removed after every reader of the mapping has been dropped.
    let map = unsafe { Mmap::map(&file) }?;
    Ok(map)
}

impl MmapStore {
    /// Open a store over `dir`, mapping every paste recovered from it.
    ///
    /// # Arguments
    /// - `dir`: Data directory, created if missing.
    /// - `lifetime`: Paste lifetime (`0` = infinite).
    /// - `stats`: Capacity controller shared with the caller.
    /// - `started_at`: Process start time used by recovery.
    ///
    /// # Errors
    /// Returns [`AppError::Recovery`] when the directory is corrupt or the
    /// recovered pastes do not fit, or an I/O error if a file cannot be mapped.
    pub fn open(
        dir: &Path,
        lifetime: Duration,
        stats: Arc<Stats>,
        started_at: SystemTime,
    ) -> Result<Opened<Self>, AppError> {
        let mut index = HashMap::new();
        let recovery = recovery::recover(dir, lifetime, started_at, &stats, |file| {
            let RecoveredFile { path, header } = file;
            if index.contains_key(&header.id) {
                return Err(AppError::Recovery(format!(
                    "{}: duplicate paste id {}",
                    path.display(),
                    header.id
                )));
            }
            let map = map_file(&path)?;
            index.insert(
                header.id,
                Arc::new(MmapRecord {
                    header,
                    path,
                    map,
                    reading: ReaderGate::new(),
                }),
            );
            Ok(())
        })?;

        Ok(Opened {
            store: Self {
                dir: dir.to_path_buf(),
                lifetime,
                stats,
                index: RwLock::new(index),
            },
            recovery,
        })
    }

    /// Data directory of this store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn insert_new(&self, content: &[u8]) -> Result<PasteId, AppError> {
        let mut index = self.index.write();
        let id = PasteId::generate(|candidate| !index.contains_key(candidate))?;
        let path = self.dir.join(id.shard_path());
        layout::write_new_file(&path, content)?;
        let map = match map_file(&path) {
            Ok(map) => map,
            Err(err) => {
                if let Err(remove_err) = fs::remove_file(&path) {
                    tracing::warn!(
                        "Could not remove unmappable paste {}: {}",
                        path.display(),
                        remove_err
                    );
                }
                return Err(err);
            }
        };
        let header = Header::new(id, self.lifetime, Utc::now(), content.len() as u64);
        index.insert(
            id,
            Arc::new(MmapRecord {
                header,
                path,
                map,
                reading: ReaderGate::new(),
            }),
        );
        Ok(id)
    }
}

impl Store for MmapStore {
    fn get(&self, id: &PasteId) -> Result<Box<dyn Paste>, AppError> {
        let record = {
            let index = self.index.read();
            index.get(id).cloned().ok_or(AppError::NotFound)?
        };
        let reading = record.reading.enter().ok_or(AppError::NotFound)?;
        let header = record.header.clone();
        Ok(Box::new(BufferPaste::new(
            MappedBytes(record),
            header,
            reading,
        )))
    }

    fn put(&self, content: &[u8]) -> Result<PasteId, AppError> {
        admit(&self.stats, content.len() as u64, || self.insert_new(content))
    }

    fn delete(&self, id: &PasteId) -> Result<(), AppError> {
        let record = {
            let index = self.index.write();
            let record = index.get(id).cloned().ok_or(AppError::NotFound)?;
            if !record.reading.close() {
                return Err(AppError::NotFound);
            }
            record
        };

        record.reading.wait_drained();
        if let Err(err) = fs::remove_file(&record.path) {
            record.reading.reopen();
            return Err(err.into());
        }

        self.index.write().remove(id);
        self.stats.release(record.header.size);
        // Dropping the last reference unmaps the file.
        drop(record);
        tracing::debug!("Deleted paste {}", id);
        Ok(())
    }

    fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn len(&self) -> usize {
        self.index.read().len()
    }

    fn contains(&self, id: &PasteId) -> bool {
        self.index.read().contains_key(id)
    }
}
