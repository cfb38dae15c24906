//! Error types for the on-disk experience tree.

use crate::record::Slot;
use thiserror::Error;

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, StoreError>;

/// Errors surfaced by the record store and the traversals built on it.
///
/// Structural damage discovered while reading (bad links, cycles, illegal
/// stored moves) is mostly tolerated by the high-level operations: they
/// skip the damaged region and report it instead of failing. The variants
/// here are the failures a caller must handle.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store length {len} bytes is not a whole number of {record}-byte records")]
    TornFile { len: u64, record: u64 },

    #[error("cannot read record {slot}")]
    BadSlot { slot: Slot },

    #[error("sibling chain through {slot} is longer than the whole store (link cycle)")]
    CyclicChain { slot: Slot },
}
