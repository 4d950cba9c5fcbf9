//! Environment mutation helpers for configuration tests.

use std::sync::{Mutex, OnceLock};

/// Lock serializing environment mutation across test threads.
pub fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Set or unset an environment variable.
///
/// Newer editions mark env mutation `unsafe`; this wrapper compiles on both.
#[allow(unused_unsafe)]
fn write_env_var(key: &str, value: Option<&str>) {
    // SAFETY: callers hold `env_lock` while test threads may run in parallel.
    unsafe {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
}

/// Scoped override of one environment variable.
pub struct EnvGuard {
    key: String,
    previous: Option<String>,
}

impl EnvGuard {
    fn swap(key: &str, value: Option<&str>) -> Self {
        let previous = std::env::var(key).ok();
        write_env_var(key, value);
        Self {
            key: key.to_string(),
            previous,
        }
    }

    /// Set `key=value` until the guard is dropped.
    pub fn set(key: &str, value: &str) -> Self {
        Self::swap(key, Some(value))
    }

    /// Unset `key` until the guard is dropped.
    pub fn remove(key: &str) -> Self {
        Self::swap(key, None)
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        write_env_var(&self.key, self.previous.as_deref());
    }
}
