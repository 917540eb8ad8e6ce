//! Engine-wide tuning knobs.
//!
//! Loading this from a file or CLI is out of scope (spec.md §1); only the
//! in-memory struct and its defaults, built the way the teacher's
//! `common::Config` uses `bon::Builder`, are in scope.

/// Runtime configuration for the paged B+-tree engine.
///
/// # Example
/// ```
/// use common::EngineConfig;
///
/// let config = EngineConfig::builder()
///     .page_size(8192)
///     .max_cache_pages(4096)
///     .build();
/// assert_eq!(config.page_size, 8192);
/// ```
#[derive(Clone, Debug, bon::Builder)]
pub struct EngineConfig {
    /// Fixed page size in bytes (spec.md §3: "power-of-two, typically 8 KiB").
    #[builder(default = 8192)]
    pub page_size: usize,

    /// Resident page ceiling for `PageBufferPool` (spec.md §4.10).
    #[builder(default = 10_000)]
    pub max_cache_pages: usize,

    /// Sweep target as a fraction of `max_cache_pages` (§4.10: "0.8 × max_cache_size").
    #[builder(default = 0.8)]
    pub sweep_target_ratio: f64,

    /// Lower clamp on the adaptive eviction quota (§4.10).
    #[builder(default = 1_000)]
    pub sweep_min_del: usize,

    /// Upper clamp on the adaptive eviction quota (§4.10).
    #[builder(default = 100_000)]
    pub sweep_max_del: usize,

    /// How often the buffer pool sweep runs, in milliseconds (§4.10: "≈ every 5s").
    #[builder(default = 5_000)]
    pub sweep_interval_ms: u64,

    /// `BUFFER_FLUSH_INTERVAL_MS` from §4.11: how long a mutated leaf may sit
    /// in the divide queue before it is eligible for flush even if small.
    #[builder(default = 1_000)]
    pub divide_flush_interval_ms: u64,

    /// Poll interval of the divide-pool worker between empty-queue checks.
    #[builder(default = 100)]
    pub divide_poll_interval_ms: u64,

    /// `LOAD_FACTOR` from §4.5: fraction of `max_data_length` a page may
    /// reach via the bulk-load fast path before `add_record` refuses.
    #[builder(default = 0.8)]
    pub load_factor: f64,

    /// Inline value threshold past which a record spills to overflow pages
    /// (§4.3 step 3).
    #[builder(default = 2048)]
    pub max_inline_value: usize,

    /// Bound on concurrently open `PageFile` handles per index (§4.2).
    #[builder(default = 8)]
    pub max_page_file_count: usize,

    /// `PageAllocator` outstanding-bytes ceiling (§4.1).
    #[builder(default = 512 * 1024 * 1024)]
    pub allocator_byte_ceiling: usize,

    /// Worker thread count for `StoragePool` (§4.12).
    #[builder(default = 4)]
    pub storage_pool_workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig::builder().build()
    }
}

impl EngineConfig {
    /// Maximum bytes of record payload a leaf/branch page may hold before
    /// `page_divide` is required (derives from `page_size` minus a small
    /// fixed prefix, see `storage::page_prefix_len`).
    pub fn max_data_length(&self, prefix_len: usize) -> usize {
        self.page_size.saturating_sub(prefix_len)
    }

    pub fn sweep_target(&self) -> usize {
        ((self.max_cache_pages as f64) * self.sweep_target_ratio) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let config = EngineConfig::default();
        assert_eq!(config.page_size, 8192);
        assert_eq!(config.max_cache_pages, 10_000);
        assert_eq!(config.sweep_interval_ms, 5_000);
        assert_eq!(config.divide_flush_interval_ms, 1_000);
    }

    #[test]
    fn builder_overrides_apply() {
        let config = EngineConfig::builder().page_size(4096).max_cache_pages(16).build();
        assert_eq!(config.page_size, 4096);
        assert_eq!(config.max_cache_pages, 16);
    }

    #[test]
    fn sweep_target_is_ratio_of_max() {
        let config = EngineConfig::builder()
            .max_cache_pages(1000)
            .sweep_target_ratio(0.8)
            .build();
        assert_eq!(config.sweep_target(), 800);
    }
}
