//! Cache Entry Module
//!
//! Defines the structure for individual stored results with absolute expiry.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

// == Cache Entry ==
/// A single stored value and its expiry metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The serialized value
    pub value: Vec<u8>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Absolute expiry, None = never expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry expiring `expiration` from now.
    ///
    /// `None` and a zero duration both mean the entry never expires. A duration too large
    /// to represent as a timestamp is treated the same way.
    pub fn new(value: Vec<u8>, expiration: Option<Duration>) -> Self {
        let now = Utc::now();
        let expires_at = expiration
            .filter(|ttl| !ttl.is_zero())
            .and_then(|ttl| TimeDelta::from_std(ttl).ok())
            .and_then(|ttl| now.checked_add_signed(ttl));

        Self {
            value,
            created_at: now,
            expires_at,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time is greater than or equal to its
    /// expiration time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Expiry check against a caller-supplied clock reading.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, or None if the entry never expires.
    ///
    /// Returns `Some(Duration::ZERO)` once the entry has expired.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at.map(|expires| {
            (expires - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO)
        })
    }
}
