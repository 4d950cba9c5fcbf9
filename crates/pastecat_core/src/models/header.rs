//! Paste header derivation and HTTP date rendering.

use crate::id::PasteId;
use chrono::{DateTime, Utc};
use std::time::Duration;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Metadata created alongside a paste and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub id: PasteId,
    pub mod_time: DateTime<Utc>,
    /// Present only when pastes have a finite lifetime.
    pub expires: Option<DateTime<Utc>>,
    pub etag: String,
    pub size: u64,
}

impl Header {
    /// Derive a header for a paste.
    ///
    /// # Arguments
    /// - `id`: Paste identifier.
    /// - `lifetime`: Configured paste lifetime (`0` = infinite).
    /// - `mod_time`: Creation time, or the clamped file time on recovery.
    /// - `size`: Content length in bytes.
    pub fn new(id: PasteId, lifetime: Duration, mod_time: DateTime<Utc>, size: u64) -> Self {
        let expires = if lifetime.is_zero() {
            None
        } else {
            chrono::Duration::from_std(lifetime)
                .ok()
                .and_then(|lifetime| mod_time.checked_add_signed(lifetime))
        };
        Self {
            id,
            mod_time,
            expires,
            etag: format!("{}-{}", mod_time.timestamp(), id),
            size,
        }
    }

    /// `Last-Modified` value in IMF-fixdate form.
    pub fn last_modified_http(&self) -> String {
        http_date(self.mod_time)
    }

    /// `Expires` value in IMF-fixdate form, if the paste expires.
    pub fn expires_http(&self) -> Option<String> {
        self.expires.map(http_date)
    }

    /// Seconds left until expiry as seen from `now`, saturating at zero.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> Option<u64> {
        self.expires
            .map(|expires| (expires - now).num_seconds().max(0) as u64)
    }
}

fn http_date(time: DateTime<Utc>) -> String {
    time.format(HTTP_DATE_FORMAT).to_string()
}
