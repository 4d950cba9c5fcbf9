//! Shared constants used across pastecat crates.

use std::time::Duration;

/// Number of random bytes in a paste id. Rendered as twice as many hex digits.
pub const ID_LEN: usize = 4;

/// Number of times to try drawing an unused random paste id.
pub const RAND_TRIES: usize = 10;

/// Number of times to retry deleting an expired paste after the first failure.
pub const DELETE_RETRIES: u32 = 5;

/// How long to wait between deletion retries.
pub const DELETE_RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// Shortest delay handed to the scheduler for recovered pastes whose
/// remaining lifetime ran out between process start and the recovery walk.
pub const MIN_EXPIRY_DELAY: Duration = Duration::from_millis(1);

/// Number of shard subdirectories under a data directory (one per first id byte).
pub const SHARD_COUNT: usize = 256;

/// Permissions for data and shard directories.
pub const DIR_MODE: u32 = 0o700;

/// Permissions for paste files.
pub const FILE_MODE: u32 = 0o600;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default site URL printed back to clients.
pub const DEFAULT_SITE_URL: &str = "http://localhost:8080";

/// Default data directory for the filesystem-backed stores.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default paste lifetime.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(12 * 60 * 60);

/// Default maximum paste size accepted by the HTTP layer.
pub const DEFAULT_MAX_SIZE: u64 = 1024 * 1024;

/// Default per-request timeout enforced by the HTTP layer.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between capacity report log lines.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// Multipart form field carrying the paste content.
pub const FIELD_NAME: &str = "paste";
