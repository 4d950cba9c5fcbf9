//! Human-readable byte sizes for configuration and capacity reports.

use std::fmt;
use std::str::FromStr;

const UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];

/// A number of bytes, formatted with binary multiples (`1.50MB`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub const KB: u64 = 1 << 10;
    pub const MB: u64 = 1 << 20;
    pub const GB: u64 = 1 << 30;

    /// Return the raw byte count.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut unit = 0;
        let mut divisor = 1u64;
        while unit + 1 < UNITS.len() && self.0 >= divisor << 10 {
            divisor <<= 10;
            unit += 1;
        }
        write!(f, "{:.2}{}", self.0 as f64 / divisor as f64, UNITS[unit])
    }
}

/// Error returned when a byte size string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseByteSizeError(String);

impl fmt::Display for ParseByteSizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid byte size '{}'", self.0)
    }
}

impl std::error::Error for ParseByteSizeError {}

impl FromStr for ByteSize {
    type Err = ParseByteSizeError;

    /// Parse sizes such as `512`, `100B`, `1.5M`, `2 GB`.
    ///
    /// Units are case-insensitive and the trailing `B` is optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseByteSizeError(s.to_string());
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);
        if number.is_empty() {
            return Err(err());
        }
        let value: f64 = number.parse().map_err(|_| err())?;

        let unit = unit.trim().to_ascii_uppercase();
        let unit = unit.strip_suffix('B').unwrap_or(unit.as_str());
        let shift = match unit {
            "" => 0,
            "K" => 10,
            "M" => 20,
            "G" => 30,
            "T" => 40,
            "P" => 50,
            "E" => 60,
            _ => return Err(err()),
        };
        let bytes = value * (1u64 << shift) as f64;
        if !bytes.is_finite() || bytes > u64::MAX as f64 {
            return Err(err());
        }
        Ok(Self(bytes as u64))
    }
}
