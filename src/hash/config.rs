// Index/matcher profiles.
//
// Each profile defines tuning parameters for the block index and the
// best-match search.  The block size is shared by the rolling hash and the
// index; the two caps bound the work done per lookup.

/// Default block (window) size in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 16;

/// Default chain-scan probe budget (`MAXPROBES`).
pub const MAX_PROBES: usize = 16;

/// Default cap on verified candidates examined per best-match query.
pub const DEFAULT_MAX_CANDIDATES: usize = 32;

/// Word size used when sizing the bucket table.
pub const TABLE_WORD_SIZE: usize = 4;

/// Index/matcher configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    /// Name for display purposes.
    pub name: &'static str,
    /// Block size and rolling-hash window width.
    pub block_size: usize,
    /// Maximum chain entries compared by one first/next-match scan.
    pub max_probes: usize,
    /// Maximum verified candidates considered by one best-match query.
    ///
    /// Independent of `max_probes`: a query may run several chain scans,
    /// each with its own probe budget, until this many candidates verified.
    pub max_candidates: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        DEFAULT
    }
}

impl IndexConfig {
    /// Same profile with a different block size.
    pub fn with_block_size(self, block_size: usize) -> Self {
        Self { block_size, ..self }
    }
}

/// Compression levels mapping to profiles.
///
/// - Levels 0-3: fast
/// - Levels 4-6: default
/// - Levels 7-9: thorough
pub fn config_for_level(level: u32) -> IndexConfig {
    match level {
        0..=3 => FAST,
        4..=6 => DEFAULT,
        _ => THOROUGH,
    }
}

// ---------------------------------------------------------------------------
// Profile definitions
// ---------------------------------------------------------------------------

pub const FAST: IndexConfig = IndexConfig {
    name: "fast",
    block_size: DEFAULT_BLOCK_SIZE,
    max_probes: 4,
    max_candidates: 4,
};

pub const DEFAULT: IndexConfig = IndexConfig {
    name: "default",
    block_size: DEFAULT_BLOCK_SIZE,
    max_probes: MAX_PROBES,
    max_candidates: DEFAULT_MAX_CANDIDATES,
};

pub const THOROUGH: IndexConfig = IndexConfig {
    name: "thorough",
    block_size: DEFAULT_BLOCK_SIZE,
    max_probes: 64,
    max_candidates: 256,
};
