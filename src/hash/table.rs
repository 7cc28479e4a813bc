// Block hash index over a reference buffer.
//
// The reference is cut into `len / block_size` fixed, non-overlapping
// blocks.  Blocks are inserted strictly in order as a scan passes their
// start offset.  Each bucket of the table heads a singly linked chain of
// block numbers in insertion order:
//
//   buckets[h & mask] = first block with that bucket (chain head)
//   next[b]           = following block in b's chain
//   last[head]        = current tail of the chain headed by `head`
//
// `last` is only meaningful for chain heads; it makes appends O(1).
// All three arrays are sized once at construction and use `EMPTY` as the
// "no block" marker.

use super::config::{IndexConfig, TABLE_WORD_SIZE};
use super::rolling::MIN_WINDOW;
use crate::error::MatchError;

/// Block number within the reference buffer.
pub type BlockId = usize;

/// Sentinel for an empty bucket / end of chain / unset tail.
pub const EMPTY: u32 = u32::MAX;

#[inline(always)]
fn slot(v: u32) -> Option<BlockId> {
    if v == EMPTY { None } else { Some(v as BlockId) }
}

/// Number of buckets for a reference of `len` bytes: the smallest power of
/// two that is at least `len / 4 + 1`.
pub fn table_size(len: usize) -> Result<usize, MatchError> {
    if len == 0 {
        return Err(MatchError::EmptyReference);
    }
    let min = len / TABLE_WORD_SIZE + 1;
    min.checked_next_power_of_two()
        .ok_or(MatchError::AllocationFailure { requested: min })
}

fn alloc_slots(len: usize) -> Result<Vec<u32>, MatchError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| MatchError::AllocationFailure { requested: len })?;
    v.resize(len, EMPTY);
    Ok(v)
}

/// Chained hash index over the fixed-size blocks of a reference buffer.
pub struct BlockHashIndex<'a> {
    reference: &'a [u8],
    config: IndexConfig,
    block_count: usize,
    last_indexed: Option<BlockId>,
    buckets: Vec<u32>,
    bucket_mask: usize,
    next: Vec<u32>,
    last: Vec<u32>,
}

impl<'a> BlockHashIndex<'a> {
    /// Create an empty index over `reference` with the default profile.
    pub fn new(reference: &'a [u8]) -> Result<Self, MatchError> {
        Self::with_config(reference, IndexConfig::default())
    }

    /// Create an empty index over `reference`.
    ///
    /// Nothing is indexed yet; blocks are added with [`add_hash`] as a scan
    /// reaches them.
    ///
    /// [`add_hash`]: Self::add_hash
    pub fn with_config(reference: &'a [u8], config: IndexConfig) -> Result<Self, MatchError> {
        if config.block_size < MIN_WINDOW {
            return Err(MatchError::InvalidWindow {
                window: config.block_size,
            });
        }
        let table_len = table_size(reference.len())?;
        let block_count = reference.len() / config.block_size;
        if block_count >= EMPTY as usize {
            return Err(MatchError::AllocationFailure {
                requested: block_count,
            });
        }

        Ok(Self {
            reference,
            config,
            block_count,
            last_indexed: None,
            buckets: alloc_slots(table_len)?,
            bucket_mask: table_len - 1,
            next: alloc_slots(block_count)?,
            last: alloc_slots(block_count)?,
        })
    }

    /// The indexed reference buffer.
    #[inline]
    pub fn reference(&self) -> &'a [u8] {
        self.reference
    }

    /// The profile this index was built with.
    #[inline]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Block size in bytes.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    /// Number of whole blocks in the reference.
    #[inline]
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Number of buckets.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Most recently indexed block, if any.
    #[inline]
    pub fn last_indexed_block(&self) -> Option<BlockId> {
        self.last_indexed
    }

    /// Reference offset `add_hash` will accept next.
    #[inline]
    pub fn next_index_to_add(&self) -> usize {
        self.last_indexed.map_or(0, |b| b + 1) * self.config.block_size
    }

    /// Whether `block` has been inserted.
    #[inline]
    pub fn is_indexed(&self, block: BlockId) -> bool {
        self.last_indexed.is_some_and(|last| block <= last)
    }

    /// Bytes of `block` in the reference.
    #[inline]
    pub fn block_bytes(&self, block: BlockId) -> &'a [u8] {
        let start = block * self.config.block_size;
        &self.reference[start..start + self.config.block_size]
    }

    #[inline(always)]
    fn bucket(&self, hash: u32) -> usize {
        hash as usize & self.bucket_mask
    }

    /// Offer the window hash at reference offset `index`.
    ///
    /// Only the start of the next unindexed block is accepted; any other
    /// offset is ignored and returns `Ok(false)`.  This lets a scanner call
    /// it at every position it passes.
    pub fn add_hash(&mut self, index: usize, hash: u32) -> Result<bool, MatchError> {
        if index != self.next_index_to_add() {
            return Ok(false);
        }

        let block = self.last_indexed.map_or(0, |b| b + 1);
        if block >= self.block_count {
            return Err(MatchError::InvalidIndex {
                index: block,
                block_count: self.block_count,
            });
        }
        if self.next[block] != EMPTY || self.last[block] != EMPTY {
            return Err(MatchError::DuplicateBlock { block });
        }

        let bucket = self.bucket(hash);
        match slot(self.buckets[bucket]) {
            None => {
                self.buckets[bucket] = block as u32;
                self.last[block] = block as u32;
            }
            Some(head) => {
                let tail = self.last[head] as usize;
                if self.next[tail] != EMPTY {
                    return Err(MatchError::InvalidIndex {
                        index: tail,
                        block_count: self.block_count,
                    });
                }
                self.next[tail] = block as u32;
                self.last[head] = block as u32;
            }
        }

        self.last_indexed = Some(block);
        Ok(true)
    }

    /// First block in the bucket for `hash` whose bytes equal
    /// `target[..block_size]`.
    ///
    /// Compares at most `max_probes` chain entries.  A true match deeper in
    /// the chain is reported as no match.
    pub fn find_first_match(&self, hash: u32, target: &[u8]) -> Option<BlockId> {
        self.scan_chain(slot(self.buckets[self.bucket(hash)]), target)
    }

    /// Next block after `block` in its chain whose bytes equal
    /// `target[..block_size]`, with the same probe budget as
    /// [`find_first_match`](Self::find_first_match).
    pub fn find_next_match(
        &self,
        block: BlockId,
        target: &[u8],
    ) -> Result<Option<BlockId>, MatchError> {
        if block >= self.block_count {
            return Err(MatchError::InvalidIndex {
                index: block,
                block_count: self.block_count,
            });
        }
        Ok(self.scan_from(block, target))
    }

    /// Unchecked variant of `find_next_match` for blocks already returned
    /// by a scan.
    #[inline]
    pub(crate) fn scan_from(&self, block: BlockId, target: &[u8]) -> Option<BlockId> {
        self.scan_chain(slot(self.next[block]), target)
    }

    #[inline]
    fn scan_chain(&self, mut candidate: Option<BlockId>, target: &[u8]) -> Option<BlockId> {
        let needle = target.get(..self.config.block_size)?;
        for _ in 0..self.config.max_probes {
            let block = candidate?;
            if self.block_bytes(block) == needle {
                return Some(block);
            }
            candidate = slot(self.next[block]);
        }
        None
    }

    /// Full length of the chain in the bucket for `hash`, ignoring the
    /// probe budget.
    pub fn chain_len(&self, hash: u32) -> usize {
        let mut n = 0;
        let mut cur = slot(self.buckets[self.bucket(hash)]);
        while let Some(b) = cur {
            n += 1;
            cur = slot(self.next[b]);
        }
        n
    }
}

impl std::fmt::Debug for BlockHashIndex<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockHashIndex")
            .field("reference_len", &self.reference.len())
            .field("block_size", &self.config.block_size)
            .field("block_count", &self.block_count)
            .field("buckets", &self.buckets.len())
            .field("last_indexed", &self.last_indexed)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
