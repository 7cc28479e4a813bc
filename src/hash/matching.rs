// Best-match search on top of the block index.
//
// A query walks the bucket chain for a window hash, verifies candidates
// byte-for-byte, then grows every verified block as far as the bytes agree
// in both directions:
//
//   left:  back from the block start, bounded by min(block start, pos - target_start)
//   right: on from the block end,     bounded by min(source left, target left)
//
// The longest total run wins.  Replacement needs a strictly longer run, so on
// ties the candidate met first in chain order is kept.

use super::table::{BlockHashIndex, BlockId};

// ---------------------------------------------------------------------------
// Match result
// ---------------------------------------------------------------------------

/// An extended block match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Verified block the match grew from.
    pub block: BlockId,
    /// Start of the run in the reference.
    pub source_offset: usize,
    /// Start of the run in the target.
    pub target_offset: usize,
    /// Run length; never less than the block size.
    pub length: usize,
}

impl Match {
    /// One past the last matched target byte.
    #[inline]
    pub fn target_end(&self) -> usize {
        self.target_offset + self.length
    }

    /// One past the last matched source byte.
    #[inline]
    pub fn source_end(&self) -> usize {
        self.source_offset + self.length
    }
}

// ---------------------------------------------------------------------------
// Byte comparison
// ---------------------------------------------------------------------------

#[inline(always)]
fn word(chunk: &[u8]) -> u64 {
    let mut w = [0u8; 8];
    w.copy_from_slice(chunk);
    u64::from_le_bytes(w)
}

/// Number of equal leading bytes of `a` and `b`.
///
/// Compares eight bytes at a time, then finishes byte by byte.
#[inline]
pub fn forward_match(a: &[u8], b: &[u8]) -> usize {
    let n = a.len().min(b.len());
    let (a, b) = (&a[..n], &b[..n]);
    let mut i = 0;
    for (ca, cb) in a.chunks_exact(8).zip(b.chunks_exact(8)) {
        let xor = word(ca) ^ word(cb);
        if xor != 0 {
            return i + (xor.trailing_zeros() / 8) as usize;
        }
        i += 8;
    }
    while i < n && a[i] == b[i] {
        i += 1;
    }
    i
}

/// Number of equal trailing bytes of `a` and `b`.
#[inline]
pub fn backward_match(a: &[u8], b: &[u8]) -> usize {
    let n = a.len().min(b.len());
    let (a, b) = (&a[a.len() - n..], &b[b.len() - n..]);
    let mut matched = 0;
    for (ca, cb) in a.rchunks_exact(8).zip(b.rchunks_exact(8)) {
        let xor = word(ca) ^ word(cb);
        if xor != 0 {
            return matched + (xor.leading_zeros() / 8) as usize;
        }
        matched += 8;
    }
    while matched < n && a[n - 1 - matched] == b[n - 1 - matched] {
        matched += 1;
    }
    matched
}

// ---------------------------------------------------------------------------
// Best match
// ---------------------------------------------------------------------------

impl<'a> BlockHashIndex<'a> {
    /// Longest run between the reference and `target` around `pos`.
    ///
    /// `hash` is the window hash of `target[pos..pos + block_size]`.
    /// `target_start` is the first target byte the run may reach back to
    /// (bytes before it are already encoded).  Candidates come from the
    /// bounded first/next chain scans; at most `max_candidates` verified
    /// blocks are extended.
    pub fn find_best_match(
        &self,
        hash: u32,
        target: &[u8],
        target_start: usize,
        pos: usize,
    ) -> Option<Match> {
        let w = self.block_size();
        if pos < target_start || pos + w > target.len() {
            return None;
        }
        let needle = &target[pos..];
        let max_candidates = self.config().max_candidates;

        let mut best: Option<Match> = None;
        let mut verified = 0usize;
        let mut candidate = self.find_first_match(hash, needle);

        while let Some(block) = candidate {
            if verified == max_candidates {
                break;
            }
            verified += 1;

            let m = self.extend_block(block, target, target_start, pos);
            if best.is_none_or(|b| m.length > b.length) {
                best = Some(m);
            }

            candidate = self.scan_from(block, needle);
        }

        best
    }

    /// Grow a verified block match in both directions.
    fn extend_block(&self, block: BlockId, target: &[u8], target_start: usize, pos: usize) -> Match {
        let w = self.block_size();
        let source = self.reference();
        let src_start = block * w;
        let src_end = src_start + w;
        let tgt_end = pos + w;

        let max_back = src_start.min(pos - target_start);
        let back = backward_match(
            &source[src_start - max_back..src_start],
            &target[pos - max_back..pos],
        );

        let max_fwd = (source.len() - src_end).min(target.len() - tgt_end);
        let fwd = forward_match(
            &source[src_end..src_end + max_fwd],
            &target[tgt_end..tgt_end + max_fwd],
        );

        Match {
            block,
            source_offset: src_start - back,
            target_offset: pos - back,
            length: back + w + fwd,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
