// Self-referential delta encoder.
//
// A single forward scan over the target, which is also the reference:
//
//   1. Build an empty block index over the target.
//   2. At each cursor position holding a full window, ask the index for the
//      best match against blocks already passed.
//   3. On a match: flush pending literals as ADD, emit COPY, and index every
//      block the match covers while skipping the cursor past it.
//   4. Otherwise index the cursor position and advance one byte.
//   5. Flush whatever is left as a final ADD.
//
// The flush point is the first target byte not yet covered by an op.  A
// match may reach back to it (left extension) but never before it.

use log::{debug, trace};

use super::ops::{Op, OpStats};
use crate::error::MatchError;
use crate::hash::config::IndexConfig;
use crate::hash::rolling::RollingHash;
use crate::hash::table::BlockHashIndex;

/// Reusable encoder for one index profile.
#[derive(Debug, Clone)]
pub struct DeltaEncoder {
    config: IndexConfig,
    rolling: RollingHash,
}

impl DeltaEncoder {
    /// Create an encoder; fails if the block size is not a valid window.
    pub fn new(config: IndexConfig) -> Result<Self, MatchError> {
        Ok(Self {
            rolling: RollingHash::new(config.block_size)?,
            config,
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Encode `target` against itself into a sequence of ADD/COPY ops.
    ///
    /// Replaying the ops (see [`replay`](super::ops::replay)) with `target`
    /// as the literal source reproduces `target` exactly.
    pub fn encode(&self, target: &[u8]) -> Result<Vec<Op>, MatchError> {
        let len = target.len();
        let w = self.config.block_size;

        if len == 0 {
            return Ok(Vec::new());
        }
        if len < w {
            return Ok(vec![Op::Add {
                target_offset: 0,
                length: len,
            }]);
        }

        let rh = &self.rolling;
        let mut index = BlockHashIndex::with_config(target, self.config)?;
        let mut ops = Vec::new();
        let mut hash = rh.hash(target);
        let mut cursor = 0usize;
        let mut flushed = 0usize;

        while cursor + w <= len {
            match index.find_best_match(hash, target, flushed, cursor) {
                Some(m) => {
                    trace!(
                        "match at {}: src={} len={} block={}",
                        m.target_offset, m.source_offset, m.length, m.block
                    );
                    if m.target_offset > flushed {
                        ops.push(Op::Add {
                            target_offset: flushed,
                            length: m.target_offset - flushed,
                        });
                    }
                    ops.push(Op::Copy {
                        source_offset: m.source_offset,
                        length: m.length,
                    });

                    // Keep the index complete for every block the copy spans.
                    let end = m.target_end();
                    while cursor < end && cursor + w <= len {
                        index.add_hash(cursor, hash)?;
                        if cursor + w < len {
                            hash = rh.roll(hash, target, cursor);
                        }
                        cursor += 1;
                    }
                    cursor = end;
                    flushed = end;
                }
                None => {
                    index.add_hash(cursor, hash)?;
                    if cursor + w < len {
                        hash = rh.roll(hash, target, cursor);
                    }
                    cursor += 1;
                }
            }
        }

        if flushed < len {
            ops.push(Op::Add {
                target_offset: flushed,
                length: len - flushed,
            });
        }

        let stats = OpStats::from_ops(&ops);
        debug!(
            "encoded {} bytes: {} adds ({} literal bytes), {} copies ({} copied bytes), {} blocks indexed",
            len,
            stats.adds,
            stats.literal_bytes,
            stats.copies,
            stats.copied_bytes,
            index.last_indexed_block().map_or(0, |b| b + 1),
        );
        Ok(ops)
    }

    /// Encode independent buffers in parallel, each with its own index.
    #[cfg(feature = "parallel")]
    pub fn encode_batch<T>(&self, targets: &[T]) -> Vec<Result<Vec<Op>, MatchError>>
    where
        T: AsRef<[u8]> + Sync,
    {
        use rayon::prelude::*;
        targets.par_iter().map(|t| self.encode(t.as_ref())).collect()
    }
}

/// Encode `target` with the default profile.
pub fn encode(target: &[u8]) -> Result<Vec<Op>, MatchError> {
    encode_with_config(target, IndexConfig::default())
}

/// Encode `target` with a specific profile.
pub fn encode_with_config(target: &[u8], config: IndexConfig) -> Result<Vec<Op>, MatchError> {
    DeltaEncoder::new(config)?.encode(target)
}

/// Encode independent buffers in parallel with the default profile.
#[cfg(feature = "parallel")]
pub fn encode_batch<T>(targets: &[T]) -> Result<Vec<Vec<Op>>, MatchError>
where
    T: AsRef<[u8]> + Sync,
{
    DeltaEncoder::new(IndexConfig::default())?
        .encode_batch(targets)
        .into_iter()
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
