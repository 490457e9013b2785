//! Change detection for slowly-moving remote values.
//!
//! A value is serialized to JSON and reduced to the first four bytes of its
//! SHA-256 digest. Monitors publish the digest as a gauge and bump a counter
//! whenever it differs from the previous poll.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// 32-bit digest of the JSON serialization of `value`.
///
/// Map keys in `serde_json::Value` are ordered, so two structurally equal
/// documents produce the same fingerprint regardless of field order on the
/// wire.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> Result<u32, serde_json::Error> {
    let bytes = serde_json::to_vec(value)?;
    let digest = Sha256::digest(&bytes);
    Ok(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
}

/// Outcome of observing a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift {
    /// First observation since startup.
    Initial,
    Unchanged,
    Changed { previous: u32 },
}

/// Remembers the last fingerprint seen.
#[derive(Debug, Default, Clone)]
pub struct FingerprintTracker {
    last: Option<u32>,
}

impl FingerprintTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, current: u32) -> Drift {
        match self.last.replace(current) {
            None => Drift::Initial,
            Some(previous) if previous == current => Drift::Unchanged,
            Some(previous) => Drift::Changed { previous },
        }
    }

    pub fn last(&self) -> Option<u32> {
        self.last
    }
}
