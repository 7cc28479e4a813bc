// Errors raised while building or querying a block index and while driving
// the delta encoder.  All of them are deterministic and non-retryable: they
// describe either bad construction parameters or a bookkeeping defect in the
// caller, never a property of the data being matched.

use thiserror::Error;

/// Block index / encoder error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// Rolling-hash window (block size) is too small.
    #[error("invalid window size {window} (must be greater than 2)")]
    InvalidWindow { window: usize },

    /// Block number or offset outside what the index covers.
    #[error("invalid block index {index} (block count {block_count})")]
    InvalidIndex { index: usize, block_count: usize },

    /// Attempt to index a block that is already in the table.
    #[error("block {block} is already indexed")]
    DuplicateBlock { block: usize },

    /// Backing storage for the index could not be reserved.
    #[error("cannot allocate index storage for {requested} entries")]
    AllocationFailure { requested: usize },

    /// Zero-length reference buffer: there is no table size to compute.
    #[error("reference buffer is empty")]
    EmptyReference,
}
