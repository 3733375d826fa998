use crate::core::error::{Error, Result};

/// LSM level fanout and depth (spec §4.6, §6.8).
pub const DEFAULT_SEGMENTS_PER_LEVEL: u16 = 8;
pub const DEFAULT_MAX_LEVELS: usize = 8;

/// Tunable constants with their documented defaults (spec §6.8).
#[derive(Debug, Clone)]
pub struct Config {
    /// Posting entries accumulated in the memtable before an automatic spill.
    pub memtable_spill_threshold: usize,
    /// Terms added in one transaction before a pre-commit bulk-load spill.
    pub bulk_load_threshold: usize,
    /// Segments per level before a merge is scheduled (`K`).
    pub segments_per_level: u16,
    /// Number of LSM levels (`Lmax`).
    pub max_levels: usize,
    /// LIMIT used when a query provides none.
    pub default_query_limit: usize,
    /// Upper bound on any LIMIT pushed down to the scorer.
    pub max_query_limit: usize,
    /// Documents per posting block.
    pub posting_block_size: usize,
    /// Emit per-document BM25 component scores at `debug!` level.
    pub log_scores: bool,
    /// Number of shards in the interning table and memtable maps.
    pub map_shards: usize,
    /// Arena byte budget the memtable is re-capped to once a build
    /// finishes (the arena runs effectively unbounded during the build
    /// itself).
    pub runtime_arena_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            memtable_spill_threshold: 800_000,
            bulk_load_threshold: 100_000,
            segments_per_level: DEFAULT_SEGMENTS_PER_LEVEL,
            max_levels: DEFAULT_MAX_LEVELS,
            default_query_limit: 1_000,
            max_query_limit: 100_000,
            posting_block_size: 128,
            log_scores: false,
            map_shards: 16,
            runtime_arena_capacity: 64 * 1024 * 1024,
        }
    }
}

/// Index options recognized at create time (spec §6.7).
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Names a tokenizer configuration understood by the host. Required.
    pub text_config: String,
    /// BM25 `k1`.
    pub k1: f32,
    /// BM25 `b`.
    pub b: f32,
}

impl IndexOptions {
    pub const DEFAULT_K1: f32 = 1.2;
    pub const DEFAULT_B: f32 = 0.75;

    pub fn new(text_config: impl Into<String>) -> Self {
        IndexOptions {
            text_config: text_config.into(),
            k1: Self::DEFAULT_K1,
            b: Self::DEFAULT_B,
        }
    }

    pub fn with_k1(mut self, k1: f32) -> Self {
        self.k1 = k1;
        self
    }

    pub fn with_b(mut self, b: f32) -> Self {
        self.b = b;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.text_config.trim().is_empty() {
            return Err(Error::invalid_option("text_config is required"));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(Error::invalid_option("b must be in [0, 1]"));
        }
        if self.k1 < 0.0 {
            return Err(Error::invalid_option("k1 must be >= 0"));
        }
        Ok(())
    }
}
