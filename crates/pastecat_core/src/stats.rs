//! Capacity accounting shared by every store backend.
//!
//! A reservation is one paste plus its size in bytes. Every successful
//! [`Stats::reserve`] must be paired with exactly one [`Stats::release`].

use crate::bytesize::ByteSize;
use crate::error::AppError;
use parking_lot::RwLock;

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    number: usize,
    storage: u64,
}

/// Admission controller bounding the paste count and aggregate bytes.
///
/// A zero maximum leaves that dimension unbounded.
#[derive(Debug, Default)]
pub struct Stats {
    max_number: usize,
    max_storage: u64,
    counters: RwLock<Counters>,
}

/// Point-in-time copy of the capacity counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub number: usize,
    pub max_number: usize,
    pub storage: u64,
    pub max_storage: u64,
}

impl Stats {
    /// Create a controller with the given maxima (`0` = unbounded).
    pub fn new(max_number: usize, max_storage: u64) -> Self {
        Self {
            max_number,
            max_storage,
            counters: RwLock::new(Counters::default()),
        }
    }

    /// Reserve room for one paste of `size` bytes.
    ///
    /// The limit checks and the increment happen under one exclusive lock, so
    /// concurrent callers can never over-commit.
    ///
    /// # Errors
    /// Returns [`AppError::ReachedMaxNumber`] or [`AppError::ReachedMaxStorage`]
    /// and leaves the counters untouched when a bounded maximum would be
    /// exceeded.
    pub fn reserve(&self, size: u64) -> Result<(), AppError> {
        let mut counters = self.counters.write();
        if self.max_number > 0 && counters.number >= self.max_number {
            return Err(AppError::ReachedMaxNumber);
        }
        if self.max_storage > 0 && counters.storage.saturating_add(size) > self.max_storage {
            return Err(AppError::ReachedMaxStorage);
        }
        counters.number += 1;
        counters.storage += size;
        Ok(())
    }

    /// Return a reservation made by [`Stats::reserve`].
    pub fn release(&self, size: u64) {
        let mut counters = self.counters.write();
        if counters.number == 0 || counters.storage < size {
            tracing::error!(
                number = counters.number,
                storage = counters.storage,
                size,
                "Releasing more capacity than was reserved"
            );
        }
        counters.number = counters.number.saturating_sub(1);
        counters.storage = counters.storage.saturating_sub(size);
    }

    /// Current counters and configured maxima.
    pub fn snapshot(&self) -> StatsSnapshot {
        let counters = *self.counters.read();
        StatsSnapshot {
            number: counters.number,
            max_number: self.max_number,
            storage: counters.storage,
            max_storage: self.max_storage,
        }
    }

    /// Human-readable usage summary.
    pub fn report(&self) -> String {
        self.snapshot().to_string()
    }
}

impl StatsSnapshot {
    fn number_stat(&self) -> String {
        if self.max_number > 0 {
            format!(
                "{} ({:.2}% out of {})",
                self.number,
                self.number as f64 * 100.0 / self.max_number as f64,
                self.max_number
            )
        } else {
            self.number.to_string()
        }
    }

    fn storage_stat(&self) -> String {
        if self.max_storage > 0 {
            format!(
                "{} ({:.2}% out of {})",
                ByteSize(self.storage),
                self.storage as f64 * 100.0 / self.max_storage as f64,
                ByteSize(self.max_storage)
            )
        } else {
            ByteSize(self.storage).to_string()
        }
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Have a total of {} pastes using {}",
            self.number_stat(),
            self.storage_stat()
        )
    }
}
