//! The running paste service: one store, its capacity limits and its timers.

use crate::config::Config;
use crate::constants::MIN_EXPIRY_DELAY;
use crate::error::AppError;
use crate::id::PasteId;
use crate::models::Paste;
use crate::scheduler::{DeletionScheduler, RetryPolicy};
use crate::stats::Stats;
use crate::store::{self, Expiry, RecoveryReport, Store};
use std::sync::Arc;
use std::time::SystemTime;

/// Owns the configured backend together with the scheduler that expires its
/// pastes. Shared by every request handler.
pub struct StoreContext {
    // Dropped first so the expiry thread stops before the store goes away.
    scheduler: DeletionScheduler,
    store: Arc<dyn Store>,
    config: Config,
    started_at: SystemTime,
}

impl StoreContext {
    /// Validate `config`, open its backend and re-arm recovered expiries.
    ///
    /// # Errors
    /// Returns [`AppError::Config`] for invalid settings, and any fatal error
    /// from recovering the data directory.
    pub fn open(config: Config) -> Result<Self, AppError> {
        Self::open_with_policy(config, RetryPolicy::default())
    }

    /// Like [`StoreContext::open`] with a custom deletion retry policy.
    ///
    /// # Errors
    /// Same as [`StoreContext::open`].
    pub fn open_with_policy(config: Config, policy: RetryPolicy) -> Result<Self, AppError> {
        config.validate()?;
        let started_at = SystemTime::now();
        let stats = Arc::new(Stats::new(config.max_number, config.max_storage.as_u64()));
        let opened = store::open_backend(&config, stats, started_at)?;
        let context = Self {
            scheduler: DeletionScheduler::start(policy)?,
            store: opened.store,
            config,
            started_at,
        };
        context.arm_recovered(&opened.recovery);
        tracing::info!(
            backend = %context.config.backend,
            lifetime = ?context.config.lifetime,
            "Store ready. {}",
            context.report()
        );
        Ok(context)
    }

    /// Recovered delays count from `started_at`; the time spent walking the
    /// data directory since then comes off each of them.
    fn arm_recovered(&self, recovery: &RecoveryReport) {
        let walked = self.started_at.elapsed().unwrap_or_default();
        for Expiry { id, after } in &recovery.expiries {
            let after = after.saturating_sub(walked).max(MIN_EXPIRY_DELAY);
            self.scheduler
                .schedule(Arc::downgrade(&self.store), *id, after);
        }
    }

    /// Store `content` and schedule its expiry.
    ///
    /// # Errors
    /// Returns [`AppError::EmptyPaste`] or [`AppError::TooLarge`] without
    /// touching the store, otherwise whatever [`Store::put`] fails with.
    pub fn put(&self, content: &[u8]) -> Result<PasteId, AppError> {
        let size = content.len() as u64;
        if size == 0 {
            return Err(AppError::EmptyPaste);
        }
        let max = self.config.max_size.as_u64();
        if size > max {
            return Err(AppError::TooLarge { size, max });
        }
        let id = self.store.put(content)?;
        self.scheduler
            .schedule(Arc::downgrade(&self.store), id, self.config.lifetime);
        tracing::debug!("Created paste {} of {} bytes", id, size);
        Ok(id)
    }

    pub fn get(&self, id: &PasteId) -> Result<Box<dyn Paste>, AppError> {
        self.store.get(id)
    }

    /// Delete a paste ahead of its expiry. A pending timer for it becomes a no-op.
    pub fn delete(&self, id: &PasteId) -> Result<(), AppError> {
        self.store.delete(id)
    }

    pub fn report(&self) -> String {
        self.store.report()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn scheduler(&self) -> &DeletionScheduler {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytesize::ByteSize;
    use crate::config::BackendKind;
    use std::fs::{self, File};
    use std::io::Read;
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn mem_config() -> Config {
        Config {
            backend: BackendKind::Mem,
            max_size: ByteSize(16),
            ..Config::default()
        }
    }

    #[test]
    fn put_checks_size_before_the_store() {
        let ctx = StoreContext::open(mem_config()).expect("open");
        assert!(matches!(ctx.put(b""), Err(AppError::EmptyPaste)));
        assert!(matches!(
            ctx.put(&[b'x'; 17]),
            Err(AppError::TooLarge { size: 17, max: 16 })
        ));
        assert_eq!(ctx.store().stats().number, 0);

        let id = ctx.put(&[b'x'; 16]).expect("exact limit");
        let mut content = Vec::new();
        ctx.get(&id)
            .expect("get")
            .read_to_end(&mut content)
            .expect("read");
        assert_eq!(content.len(), 16);
        assert_eq!(ctx.scheduler().pending(), 1);
    }

    #[test]
    fn infinite_lifetime_arms_nothing() {
        let config = Config {
            lifetime: Duration::ZERO,
            ..mem_config()
        };
        let ctx = StoreContext::open(config).expect("open");
        let id = ctx.put(b"forever").expect("put");
        assert_eq!(ctx.scheduler().pending(), 0);
        assert!(ctx.get(&id).expect("get").header().expires.is_none());
    }

    #[test]
    fn pastes_expire_after_lifetime() {
        let config = Config {
            lifetime: Duration::from_millis(50),
            ..mem_config()
        };
        let ctx = StoreContext::open(config).expect("open");
        let id = ctx.put(b"brief").expect("put");
        assert!(ctx.get(&id).is_ok());

        let deadline = Instant::now() + Duration::from_secs(5);
        while ctx.get(&id).is_ok() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(matches!(ctx.get(&id), Err(AppError::NotFound)));
        assert_eq!(ctx.store().stats().number, 0);
    }

    #[test]
    fn manual_delete_then_timer_is_harmless() {
        let config = Config {
            lifetime: Duration::from_millis(20),
            ..mem_config()
        };
        let ctx = StoreContext::open(config).expect("open");
        let id = ctx.put(b"gone early").expect("put");
        ctx.delete(&id).expect("delete");
        thread::sleep(Duration::from_millis(100));
        assert_eq!(ctx.scheduler().pending(), 0);
        assert_eq!(ctx.store().stats().number, 0);
    }

    #[test]
    fn open_rejects_invalid_config() {
        let config = Config {
            max_size: ByteSize(0),
            ..mem_config()
        };
        assert!(matches!(
            StoreContext::open(config),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn reopen_rearms_recovered_pastes() {
        let dir = TempDir::new().expect("temp dir");
        let config = Config {
            backend: BackendKind::Fs,
            data_dir: dir.path().display().to_string(),
            lifetime: Duration::from_secs(3600),
            ..mem_config()
        };

        let id = {
            let ctx = StoreContext::open(config.clone()).expect("first open");
            ctx.put(b"survivor").expect("put")
        };
        let ctx = StoreContext::open(config).expect("second open");
        assert_eq!(ctx.store().len(), 1);
        assert_eq!(ctx.scheduler().pending(), 1);
        let mut content = String::new();
        ctx.get(&id)
            .expect("get")
            .read_to_string(&mut content)
            .expect("read");
        assert_eq!(content, "survivor");
    }

    #[test]
    fn reopen_prunes_expired_files() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("a6").join("3d03b9");
        fs::create_dir_all(dir.path().join("a6")).expect("shard");
        fs::write(&path, b"stale").expect("write");
        File::options()
            .write(true)
            .open(&path)
            .expect("open")
            .set_modified(SystemTime::now() - Duration::from_secs(7200))
            .expect("mtime");

        let config = Config {
            backend: BackendKind::Mmap,
            data_dir: dir.path().display().to_string(),
            lifetime: Duration::from_secs(3600),
            ..mem_config()
        };
        let ctx = StoreContext::open(config).expect("open");
        assert!(ctx.store().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn open_rejects_unrepresentable_lifetime() {
        let config = Config {
            lifetime: Duration::from_secs(u64::MAX / 2),
            ..mem_config()
        };
        assert!(matches!(
            StoreContext::open(config),
            Err(AppError::Config(_))
        ));
    }
}
