//! Configuration loading from environment variables.

use crate::bytesize::ByteSize;
use crate::constants::{
    DEFAULT_DATA_DIR, DEFAULT_LIFETIME, DEFAULT_MAX_SIZE, DEFAULT_PORT, DEFAULT_REPORT_INTERVAL,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_SITE_URL,
};
use crate::error::AppError;
use chrono::Utc;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Which [`crate::Store`] implementation to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    #[default]
    Fs,
    Mmap,
    Mem,
}

impl BackendKind {
    /// Whether this backend persists pastes under the data directory.
    pub fn is_persistent(self) -> bool {
        !matches!(self, Self::Mem)
    }
}

impl FromStr for BackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fs" | "file" => Ok(Self::Fs),
            "mmap" => Ok(Self::Mmap),
            "mem" | "memory" => Ok(Self::Mem),
            other => Err(AppError::Config(format!("unknown backend '{}'", other))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fs => "fs",
            Self::Mmap => "mmap",
            Self::Mem => "mem",
        })
    }
}

/// Runtime configuration for the paste service.
#[derive(Debug, Clone)]
pub struct Config {
    pub site_url: String,
    pub port: u16,
    pub bind: Option<String>,
    pub data_dir: String,
    pub backend: BackendKind,
    /// Paste lifetime, `0` for pastes that never expire.
    pub lifetime: Duration,
    pub max_size: ByteSize,
    /// Maximum live pastes, `0` for unbounded.
    pub max_number: usize,
    /// Maximum aggregate bytes, `0` for unbounded.
    pub max_storage: ByteSize,
    pub request_timeout: Duration,
    /// Interval of the periodic usage report, `0` to disable it.
    pub report_interval: Duration,
    pub allow_public_access: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_url: DEFAULT_SITE_URL.to_string(),
            port: DEFAULT_PORT,
            bind: None,
            data_dir: DEFAULT_DATA_DIR.to_string(),
            backend: BackendKind::default(),
            lifetime: DEFAULT_LIFETIME,
            max_size: ByteSize(DEFAULT_MAX_SIZE),
            max_number: 0,
            max_storage: ByteSize(0),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            report_interval: DEFAULT_REPORT_INTERVAL,
            allow_public_access: false,
        }
    }
}

/// Expand tilde (~) in paths to the user's home directory
fn expand_tilde(path: String) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = resolve_home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    path
}

fn resolve_home_dir() -> Option<PathBuf> {
    for key in ["HOME", "USERPROFILE"] {
        if let Ok(home) = env::var(key) {
            if !home.trim().is_empty() {
                return Some(PathBuf::from(home));
            }
        }
    }
    if let (Ok(drive), Ok(path)) = (env::var("HOMEDRIVE"), env::var("HOMEPATH")) {
        if !drive.trim().is_empty() && !path.trim().is_empty() {
            return Some(PathBuf::from(format!("{}{}", drive, path)));
        }
    }
    None
}

/// Parse a boolean-like environment flag value.
///
/// # Supported Values
/// - Truthy: `1`, `true`, `yes`, `on`
/// - Falsy: `0`, `false`, `no`, `off`, empty string
///
/// Matching is case-insensitive and ignores surrounding whitespace.
///
/// # Returns
/// `Some(bool)` when the value is recognized, otherwise `None`.
pub fn parse_env_flag(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read a boolean flag from the environment.
///
/// Missing or unrecognized values are treated as `false`.
pub fn env_flag_enabled(name: &str) -> bool {
    env::var(name)
        .ok()
        .and_then(|value| parse_env_flag(&value))
        .unwrap_or(false)
}

/// Parse a duration such as `0`, `250ms`, `90s`, `30m`, `12h`, `3d` or `1h30m`.
///
/// # Errors
/// Returns [`AppError::Config`] for empty input, a missing unit, an unknown
/// unit or an overflowing total.
pub fn parse_duration(value: &str) -> Result<Duration, AppError> {
    let err = || AppError::Config(format!("invalid duration '{}'", value));
    let mut rest = value.trim();
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(err());
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(err)?;
        if digits == 0 {
            return Err(err());
        }
        let amount: u64 = rest[..digits].parse().map_err(|_| err())?;
        rest = &rest[digits..];
        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit_secs = |secs: u64| amount.checked_mul(secs).map(Duration::from_secs);
        let part = match &rest[..unit_len] {
            "ms" => Some(Duration::from_millis(amount)),
            "s" => unit_secs(1),
            "m" => unit_secs(60),
            "h" => unit_secs(60 * 60),
            "d" => unit_secs(24 * 60 * 60),
            _ => None,
        }
        .ok_or_else(err)?;
        total = total.checked_add(part).ok_or_else(err)?;
        rest = &rest[unit_len..];
    }
    Ok(total)
}

/// Read `name` with `parse`, warning and keeping `default` when it is unusable.
fn env_or<T, E: fmt::Display>(name: &str, default: T, parse: impl Fn(&str) -> Result<T, E>) -> T {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => match parse(raw.trim()) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("Ignoring {}={:?}: {}", name, raw, err);
                default
            }
        },
        _ => default,
    }
}

/// Whether a paste created now could carry an expiry date and a timer.
fn lifetime_in_range(lifetime: Duration) -> bool {
    let expires = chrono::Duration::from_std(lifetime)
        .ok()
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));
    expires.is_some() && Instant::now().checked_add(lifetime).is_some()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Returns
    /// A populated [`Config`] with defaults applied when env vars are missing
    /// or cannot be parsed.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            site_url: env_or("SITE_URL", defaults.site_url, |raw| {
                Ok::<_, AppError>(raw.trim_end_matches('/').to_string())
            }),
            port: env_or("PORT", defaults.port, str::parse),
            bind: env::var("BIND").ok().filter(|raw| !raw.trim().is_empty()),
            data_dir: env::var("DATA_DIR")
                .ok()
                .filter(|raw| !raw.trim().is_empty())
                .map(expand_tilde)
                .unwrap_or(defaults.data_dir),
            backend: env_or("BACKEND", defaults.backend, str::parse),
            lifetime: env_or("LIFETIME", defaults.lifetime, parse_duration),
            max_size: env_or("MAX_SIZE", defaults.max_size, str::parse),
            max_number: env_or("MAX_NUMBER", defaults.max_number, str::parse),
            max_storage: env_or("MAX_STORAGE", defaults.max_storage, str::parse),
            request_timeout: env_or("REQUEST_TIMEOUT", defaults.request_timeout, parse_duration),
            report_interval: env_or("REPORT_INTERVAL", defaults.report_interval, parse_duration),
            allow_public_access: env_flag_enabled("ALLOW_PUBLIC_ACCESS"),
        }
    }

    /// Check values that parse fine on their own but make no sense together.
    ///
    /// # Errors
    /// Returns [`AppError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.site_url.trim().is_empty() {
            return Err(AppError::Config("SITE_URL must not be empty".to_string()));
        }
        if self.max_size.as_u64() == 0 {
            return Err(AppError::Config("MAX_SIZE must be positive".to_string()));
        }
        let max_storage = self.max_storage.as_u64();
        if max_storage > 0 && self.max_size.as_u64() > max_storage {
            return Err(AppError::Config(format!(
                "MAX_SIZE ({}) is larger than MAX_STORAGE ({})",
                self.max_size, self.max_storage
            )));
        }
        if self.backend.is_persistent() && self.data_dir.trim().is_empty() {
            return Err(AppError::Config(format!(
                "DATA_DIR is required by the {} backend",
                self.backend
            )));
        }
        if !self.lifetime.is_zero() && !lifetime_in_range(self.lifetime) {
            return Err(AppError::Config(format!(
                "LIFETIME ({:?}) is too far in the future",
                self.lifetime
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(AppError::Config(
                "REQUEST_TIMEOUT must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
