// Delta instructions and their replay.
//
// An op sequence rebuilds a target front to back:
//   ADD   append literal bytes taken from the target span it names
//   COPY  append bytes read from output that is already rebuilt
//
// A COPY may read into the bytes it is writing (source run overlapping the
// destination), so copies are applied LZ77-style, one byte after another,
// whenever the run reaches past the current end of output.

use std::fmt;

use thiserror::Error;

/// One delta instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Literal span `[target_offset, target_offset + length)` of the target.
    Add { target_offset: usize, length: usize },
    /// `length` bytes starting at `source_offset` of the rebuilt output.
    Copy { source_offset: usize, length: usize },
}

impl Op {
    /// Bytes this op appends to the output.
    #[inline]
    pub fn len(&self) -> usize {
        match *self {
            Op::Add { length, .. } | Op::Copy { length, .. } => length,
        }
    }

    /// Whether this op appends nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Op::Add {
                target_offset,
                length,
            } => write!(f, "ADD  {target_offset:>10} {length:>10}"),
            Op::Copy {
                source_offset,
                length,
            } => write!(f, "COPY {source_offset:>10} {length:>10}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Summary of an op sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpStats {
    pub adds: usize,
    pub copies: usize,
    pub literal_bytes: usize,
    pub copied_bytes: usize,
}

impl OpStats {
    pub fn from_ops(ops: &[Op]) -> Self {
        let mut s = Self::default();
        for op in ops {
            match *op {
                Op::Add { length, .. } => {
                    s.adds += 1;
                    s.literal_bytes += length;
                }
                Op::Copy { length, .. } => {
                    s.copies += 1;
                    s.copied_bytes += length;
                }
            }
        }
        s
    }

    /// Total output length.
    pub fn covered(&self) -> usize {
        self.literal_bytes + self.copied_bytes
    }
}

/// Total output length of `ops`, saturating at `usize::MAX`.
pub fn covered_len(ops: &[Op]) -> usize {
    ops.iter().fold(0usize, |n, op| n.saturating_add(op.len()))
}

/// Upper bound on capacity reserved ahead of the bytes actually written.
/// Op lengths may come from untrusted input; past this the buffer grows as
/// it is filled.
pub const MAX_PREALLOC: usize = 16 * 1024 * 1024;

/// Empty output buffer for replaying `ops`.
pub(crate) fn output_buffer(ops: &[Op]) -> Vec<u8> {
    Vec::with_capacity(covered_len(ops).min(MAX_PREALLOC))
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("ADD at output offset {at} names target offset {target_offset}")]
    AddOutOfOrder { at: usize, target_offset: usize },

    #[error("ADD span {target_offset}+{length} exceeds literal source of {available} bytes")]
    AddOutOfRange {
        target_offset: usize,
        length: usize,
        available: usize,
    },

    #[error("COPY from {source_offset} before it is written (output is {written} bytes)")]
    CopyBeforeWritten { source_offset: usize, written: usize },
}

/// Append a COPY to `out`.
///
/// Reads from `out[source_offset..]`; bytes appended by this same copy are
/// visible to its later positions.
pub fn apply_copy(
    out: &mut Vec<u8>,
    source_offset: usize,
    length: usize,
) -> Result<(), ReplayError> {
    if length == 0 {
        return Ok(());
    }
    let written = out.len();
    if source_offset >= written {
        return Err(ReplayError::CopyBeforeWritten {
            source_offset,
            written,
        });
    }

    if length <= written - source_offset {
        out.extend_from_within(source_offset..source_offset + length);
    } else {
        out.reserve(length.min(MAX_PREALLOC));
        for k in 0..length {
            let b = out[source_offset + k];
            out.push(b);
        }
    }
    Ok(())
}

/// Rebuild a target from `ops`, taking ADD literals from `literals`
/// (normally the original target itself).
pub fn replay(ops: &[Op], literals: &[u8]) -> Result<Vec<u8>, ReplayError> {
    let mut out = output_buffer(ops);
    for op in ops {
        match *op {
            Op::Add {
                target_offset,
                length,
            } => {
                if target_offset != out.len() {
                    return Err(ReplayError::AddOutOfOrder {
                        at: out.len(),
                        target_offset,
                    });
                }
                let span = target_offset
                    .checked_add(length)
                    .and_then(|end| literals.get(target_offset..end))
                    .ok_or(ReplayError::AddOutOfRange {
                        target_offset,
                        length,
                        available: literals.len(),
                    })?;
                out.extend_from_slice(span);
            }
            Op::Copy {
                source_offset,
                length,
            } => apply_copy(&mut out, source_offset, length)?,
        }
    }
    Ok(out)
}
