//! Volatile in-memory paste storage.

use super::readers::ReaderGate;
use super::{admit, Store};
use crate::error::AppError;
use crate::id::PasteId;
use crate::models::paste::BufferPaste;
use crate::models::{Header, Paste};
use crate::stats::{Stats, StatsSnapshot};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

struct MemRecord {
    header: Header,
    content: Arc<[u8]>,
    reading: Arc<ReaderGate>,
}

/// Keeps paste content in process memory. Nothing survives a restart.
pub struct MemStore {
    lifetime: Duration,
    stats: Arc<Stats>,
    index: RwLock<HashMap<PasteId, MemRecord>>,
}

impl MemStore {
    pub fn new(lifetime: Duration, stats: Arc<Stats>) -> Self {
        Self {
            lifetime,
            stats,
            index: RwLock::new(HashMap::new()),
        }
    }

    fn insert_new(&self, content: &[u8]) -> Result<PasteId, AppError> {
        let mut index = self.index.write();
        let id = PasteId::generate(|candidate| !index.contains_key(candidate))?;
        let header = Header::new(id, self.lifetime, Utc::now(), content.len() as u64);
        index.insert(
            id,
            MemRecord {
                header,
                content: Arc::from(content),
                reading: ReaderGate::new(),
            },
        );
        Ok(id)
    }
}

impl Store for MemStore {
    fn get(&self, id: &PasteId) -> Result<Box<dyn Paste>, AppError> {
        let index = self.index.read();
        let record = index.get(id).ok_or(AppError::NotFound)?;
        let reading = record.reading.enter().ok_or(AppError::NotFound)?;
        Ok(Box::new(BufferPaste::new(
            Arc::clone(&record.content),
            record.header.clone(),
            reading,
        )))
    }

    fn put(&self, content: &[u8]) -> Result<PasteId, AppError> {
        admit(&self.stats, content.len() as u64, || self.insert_new(content))
    }

    fn delete(&self, id: &PasteId) -> Result<(), AppError> {
        let reading = {
            let index = self.index.read();
            let record = index.get(id).ok_or(AppError::NotFound)?;
            if !record.reading.close() {
                return Err(AppError::NotFound);
            }
            Arc::clone(&record.reading)
        };

        reading.wait_drained();
        let removed = self.index.write().remove(id);
        if let Some(record) = removed {
            self.stats.release(record.header.size);
        }
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
