//! Broker configuration (spec §6).

use thiserror::Error;

/// Controls when the write-ahead log is fsynced to disk. Orthogonal to
/// whether WAL files exist at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// No fsync, no WAL files. All data lost on crash. Tests only.
    Cache,
    /// fsync after every batch. Maximum durability, highest latency.
    Always,
    /// fsync every `batch_size` writes or every `interval_ms`,
    /// whichever comes first. The recommended production mode.
    Standard {
        /// Maximum milliseconds between fsyncs.
        interval_ms: u64,
        /// Maximum writes between fsyncs.
        batch_size: usize,
    },
}

impl DurabilityMode {
    /// Whether this mode requires WAL segment files on disk.
    pub fn requires_wal(&self) -> bool {
        !matches!(self, DurabilityMode::Cache)
    }

    /// Whether this mode fsyncs after every single batch.
    pub fn requires_immediate_fsync(&self) -> bool {
        matches!(self, DurabilityMode::Always)
    }
}

impl Default for DurabilityMode {
    fn default() -> Self {
        DurabilityMode::Standard {
            interval_ms: 100,
            batch_size: 1000,
        }
    }
}

/// Broker-wide configuration (spec §6 "Configuration (recognized options)").
#[derive(Debug, Clone)]
pub struct Config {
    /// Sealed-page size threshold in bytes (spec: PageSize).
    pub page_size_bytes: u64,
    /// Minimum age in seconds for time-based page pruning (spec: RetentionSeconds).
    pub retention_seconds: i64,
    /// Residual byte budget for size-based pruning; `<= 0` disables that
    /// phase (spec: RetentionSizeBytes).
    pub retention_size_bytes: i64,
    /// Retention worker tick period in seconds (spec: TickIntervalSeconds).
    pub tick_interval_seconds: u64,
    /// Minimum interval between `expiredCleanUp` runs for the same
    /// topic, independent of tick cadence (spec §4.G "checkInterval").
    pub check_interval_seconds: i64,
    /// Compaction trigger period in seconds (spec: CompactionIntervalSeconds).
    pub compaction_interval_seconds: u64,
    /// Underlying engine block-cache size in bytes (spec: LRUCacheBytes).
    /// This core has no external block cache to size (see SPEC_FULL.md
    /// §D); kept only so a caller migrating a config from a cached
    /// engine has a stable, validated field to carry over.
    pub lru_cache_bytes: usize,
    /// Minimum id range size granted per allocator refresh
    /// (spec: ProducerIdRefillQuantum).
    pub producer_id_refill_quantum: u64,
    /// WAL durability mode.
    pub durability: DurabilityMode,
}

/// Lower clamp bound for `lru_cache_bytes`.
pub const MIN_LRU_CACHE_BYTES: usize = 1024 * 1024;
/// Upper clamp bound for `lru_cache_bytes`.
pub const MAX_LRU_CACHE_BYTES: usize = 16 * 1024 * 1024 * 1024;

impl Default for Config {
    fn default() -> Self {
        Config {
            page_size_bytes: 64 * 1024 * 1024,
            retention_seconds: 3 * 24 * 3600,
            retention_size_bytes: 8 * 1024 * 1024 * 1024,
            tick_interval_seconds: 600,
            // source: `minute*60/10 = 360s`, spec §4.G.
            check_interval_seconds: 360,
            compaction_interval_seconds: 600,
            lru_cache_bytes: 256 * 1024 * 1024,
            producer_id_refill_quantum: 200,
            durability: DurabilityMode::default(),
        }
    }
}

impl Config {
    /// Start from defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sealed-page size threshold (builder pattern).
    pub fn with_page_size_bytes(mut self, bytes: u64) -> Self {
        self.page_size_bytes = bytes;
        self
    }

    /// Set the retention age threshold (builder pattern).
    pub fn with_retention_seconds(mut self, seconds: i64) -> Self {
        self.retention_seconds = seconds;
        self
    }

    /// Set the retention residual-size threshold (builder pattern).
    pub fn with_retention_size_bytes(mut self, bytes: i64) -> Self {
        self.retention_size_bytes = bytes;
        self
    }

    /// Set the retention worker tick period (builder pattern).
    pub fn with_tick_interval_seconds(mut self, seconds: u64) -> Self {
        self.tick_interval_seconds = seconds;
        self
    }

    /// Set the durability mode (builder pattern).
    pub fn with_durability(mut self, mode: DurabilityMode) -> Self {
        self.durability = mode;
        self
    }

    /// A configuration tuned for fast tests: tiny pages, zero retention
    /// thresholds, sub-second ticks, no fsync.
    pub fn for_testing() -> Self {
        Config {
            page_size_bytes: 1024,
            retention_seconds: 0,
            retention_size_bytes: 0,
            tick_interval_seconds: 1,
            check_interval_seconds: 0,
            compaction_interval_seconds: 1,
            lru_cache_bytes: MIN_LRU_CACHE_BYTES,
            producer_id_refill_quantum: 4,
            durability: DurabilityMode::Cache,
        }
    }

    /// Validate configuration, clamping `lru_cache_bytes` into range.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.page_size_bytes == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        if self.producer_id_refill_quantum == 0 {
            return Err(ConfigError::ZeroRefillQuantum);
        }
        self.lru_cache_bytes = self
            .lru_cache_bytes
            .clamp(MIN_LRU_CACHE_BYTES, MAX_LRU_CACHE_BYTES);
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `page_size_bytes` must be nonzero.
    #[error("page_size_bytes must be nonzero")]
    ZeroPageSize,
    /// `producer_id_refill_quantum` must be nonzero.
    #[error("producer_id_refill_quantum must be nonzero")]
    ZeroRefillQuantum,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let c = Config::default();
        assert_eq!(c.check_interval_seconds, 360);
        assert_eq!(c.tick_interval_seconds, 600);
    }

    #[test]
    fn validate_clamps_lru_cache_bytes() {
        let mut c = Config::new();
        c.lru_cache_bytes = 0;
        c.validate().unwrap();
        assert_eq!(c.lru_cache_bytes, MIN_LRU_CACHE_BYTES);

        c.lru_cache_bytes = usize::MAX;
        c.validate().unwrap();
        assert_eq!(c.lru_cache_bytes, MAX_LRU_CACHE_BYTES);
    }

    #[test]
    fn validate_rejects_zero_page_size() {
        let mut c = Config::new().with_page_size_bytes(0);
        assert!(matches!(c.validate(), Err(ConfigError::ZeroPageSize)));
    }

    #[test]
    fn builder_pattern_chains() {
        let c = Config::new()
            .with_page_size_bytes(10)
            .with_retention_seconds(5)
            .with_durability(DurabilityMode::Always);
        assert_eq!(c.page_size_bytes, 10);
        assert_eq!(c.retention_seconds, 5);
        assert!(c.durability.requires_immediate_fsync());
    }
}
