//! Core library for pastecat (ids, capacity limits, storage backends, expiry).

/// Human-readable byte sizes.
pub mod bytesize;
/// Configuration loading and defaults.
pub mod config;
/// Shared constants.
pub mod constants;
/// Store, scheduler and config bundled for the server.
pub mod context;
/// Environment mutation helpers for tests.
pub mod env;
/// Error types shared by every layer.
pub mod error;
/// Paste identifiers.
pub mod id;
/// Paste metadata and read handles.
pub mod models;
/// Expiry timers with bounded retry.
pub mod scheduler;
/// Capacity accounting.
pub mod stats;
/// Storage backends and recovery.
pub mod store;

pub use bytesize::ByteSize;
pub use config::{BackendKind, Config};
pub use constants::*;
pub use context::StoreContext;
pub use error::AppError;
pub use id::PasteId;
pub use models::{Header, Paste};
pub use scheduler::{DeletionScheduler, RetryPolicy};
pub use stats::{Stats, StatsSnapshot};
pub use store::{FileStore, MemStore, MmapStore, Store};
