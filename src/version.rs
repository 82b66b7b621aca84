//! Fixed-width version codec.
//!
//! Versions are stored as [`VERSION_WIDTH`]-digit zero-padded decimal strings so
//! the table's byte-wise sort key order is numeric order.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SecretError};

/// Number of decimal digits in [`Version::MAX`].
pub const VERSION_WIDTH: usize = 19;

/// A secret version number in `0..=Version::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u64);

impl Version {
    /// Largest representable version: the signed 64-bit maximum.
    pub const MAX: u64 = i64::MAX as u64;

    /// Version used when a write does not name one.
    pub const FIRST: Version = Version(1);

    pub fn new(n: u64) -> Result<Self> {
        if n > Self::MAX {
            return Err(SecretError::InvalidVersion(format!(
                "{} exceeds the maximum version {}",
                n,
                Self::MAX
            )));
        }
        Ok(Version(n))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// The following version, or `InvalidVersion` at the top of the range.
    pub fn next(self) -> Result<Self> {
        match self.0.checked_add(1) {
            Some(n) => Version::new(n),
            None => Err(SecretError::InvalidVersion(format!(
                "{} has no successor",
                self.0
            ))),
        }
    }

    /// Zero-padded fixed-width encoding.
    pub fn encode(self) -> String {
        format!("{:0width$}", self.0, width = VERSION_WIDTH)
    }

    /// Inverse of [`Version::encode`]. Accepts exactly [`VERSION_WIDTH`] ASCII digits.
    pub fn decode(s: &str) -> Result<Self> {
        if s.len() != VERSION_WIDTH || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SecretError::InvalidVersion(format!(
                "{:?} is not a {}-digit version",
                s, VERSION_WIDTH
            )));
        }
        let n: u64 = s
            .parse()
            .map_err(|e| SecretError::InvalidVersion(format!("{:?}: {}", s, e)))?;
        Version::new(n)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Version {
    type Err = SecretError;

    fn from_str(s: &str) -> Result<Self> {
        Version::decode(s)
    }
}

impl TryFrom<u64> for Version {
    type Error = SecretError;

    fn try_from(n: u64) -> Result<Self> {
        Version::new(n)
    }
}
