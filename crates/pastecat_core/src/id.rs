//! Fixed-width random paste identifiers.

use crate::constants::{ID_LEN, RAND_TRIES};
use crate::error::AppError;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Binary identifier of a paste, rendered as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PasteId([u8; ID_LEN]);

impl PasteId {
    /// Number of hex characters in the string form.
    pub const HEX_LEN: usize = ID_LEN * 2;

    /// Wrap raw id bytes.
    pub const fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Return the raw id bytes.
    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    /// Parse a hexadecimal id. Hex digits are accepted in either case.
    ///
    /// # Errors
    /// Returns [`AppError::InvalidId`] unless `hex_id` is exactly
    /// [`PasteId::HEX_LEN`] valid hex digits.
    pub fn parse(hex_id: &str) -> Result<Self, AppError> {
        if hex_id.len() != Self::HEX_LEN {
            return Err(AppError::InvalidId(hex_id.to_string()));
        }
        let mut bytes = [0u8; ID_LEN];
        hex::decode_to_slice(hex_id, &mut bytes)
            .map_err(|_| AppError::InvalidId(hex_id.to_string()))?;
        Ok(Self(bytes))
    }

    /// Shard-relative path of this id: `<first byte hex>/<remaining hex>`.
    pub fn shard_path(&self) -> PathBuf {
        let hex_id = self.to_string();
        let (shard, rest) = hex_id.split_at(2);
        PathBuf::from(shard).join(rest)
    }

    /// Draw random ids until `available` accepts one.
    ///
    /// Entropy comes from the operating system. A failed draw counts as a
    /// spent attempt.
    ///
    /// # Arguments
    /// - `tries`: Maximum number of draws.
    /// - `available`: Returns `true` when the candidate id is not in use.
    ///
    /// # Errors
    /// Returns [`AppError::NoUnusedId`] when every attempt collided or the
    /// entropy source failed.
    pub fn random_unused<F>(tries: usize, mut available: F) -> Result<Self, AppError>
    where
        F: FnMut(&PasteId) -> bool,
    {
        let mut bytes = [0u8; ID_LEN];
        for _ in 0..tries {
            if let Err(err) = OsRng.try_fill_bytes(&mut bytes) {
                tracing::warn!("Could not read random bytes for a paste id: {}", err);
                continue;
            }
            let id = Self(bytes);
            if available(&id) {
                return Ok(id);
            }
        }
        Err(AppError::NoUnusedId)
    }

    /// [`PasteId::random_unused`] with the default attempt budget.
    ///
    /// # Errors
    /// Same as [`PasteId::random_unused`].
    pub fn generate<F>(available: F) -> Result<Self, AppError>
    where
        F: FnMut(&PasteId) -> bool,
    {
        Self::random_unused(RAND_TRIES, available)
    }
}

impl fmt::Display for PasteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for PasteId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
