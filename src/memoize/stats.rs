//! Memoization Statistics Module
//!
//! Counts how memoized calls were served.

use serde::Serialize;

// == Cache Stats ==
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Calls answered from the backend
    pub hits: u64,
    /// Cacheable calls that ran the wrapped function
    pub misses: u64,
    /// Calls whose gating conditions were unmet
    pub bypassed: u64,
    /// Results not stored: unfaithful encoding, or the backend declined the write
    pub store_failures: u64,
    /// Entries removed through invalidation
    pub invalidated: u64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no cacheable calls have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_bypass(&mut self) {
        self.bypassed += 1;
    }

    pub fn record_store_failure(&mut self) {
        self.store_failures += 1;
    }

    pub fn record_invalidated(&mut self, count: usize) {
        self.invalidated += count as u64;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats, CacheStats::default());
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_bypass_not_in_hit_rate() {
        let mut stats = CacheStats::new();
        stats.record_bypass();
        stats.record_bypass();
        stats.record_hit();
        assert_eq!(stats.hit_rate(), 1.0);
        assert_eq!(stats.bypassed, 2);
    }

    #[test]
    fn test_record_invalidated() {
        let mut stats = CacheStats::new();
        stats.record_invalidated(3);
        stats.record_invalidated(0);
        stats.record_store_failure();
        assert_eq!(stats.invalidated, 3);
        assert_eq!(stats.store_failures, 1);
    }
}
