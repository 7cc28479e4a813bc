// Hashing and block matching.
//
// This module provides:
// - The polynomial rolling hash (`rolling`)
// - The chained block hash index over a reference buffer (`table`)
// - Best-match search with left/right extension (`matching`)
// - Index/matcher profiles (`config`)

pub mod config;
pub mod matching;
pub mod rolling;
pub mod table;

pub use config::IndexConfig;
pub use matching::Match;
pub use rolling::RollingHash;
pub use table::{BlockHashIndex, BlockId};
