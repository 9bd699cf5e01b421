//! # Accumulator Error Types
//!
//! Tree errors are precise and recoverable: every one of them is detected
//! before the tree is mutated, so a failed call leaves the tree exactly as
//! it was.

use thiserror::Error;

/// Errors from the hash primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The Poseidon parameters could not be constructed. Fatal at startup.
    #[error("hash primitive initialization failed: {0}")]
    HasherInit(String),

    /// A hash invocation failed.
    #[error("hash computation failed: {0}")]
    Hash(String),
}

/// Errors from sparse Merkle tree operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Requested depth is outside `1..=32`.
    #[error("invalid tree depth {0}: must be between 1 and 32")]
    InvalidDepth(u8),

    /// Every leaf slot is occupied.
    #[error("tree capacity exceeded: all {capacity} leaf slots are occupied")]
    CapacityExceeded {
        /// Total leaf slots (`2^depth`).
        capacity: u64,
    },

    /// The leaf is already present in the tree.
    #[error("duplicate leaf: {0}")]
    DuplicateLeaf(String),

    /// The leaf is not present in the tree.
    #[error("leaf not found: {0}")]
    LeafNotFound(String),

    /// The replacement leaf already occupies another slot.
    #[error("replacement leaf already exists: {0}")]
    AlreadyExists(String),

    /// A serialized tree state is internally inconsistent.
    #[error("corrupt tree state: {0}")]
    CorruptState(String),

    /// The hash primitive failed while recomputing a path.
    #[error(transparent)]
    Hash(#[from] CryptoError),
}

/// A batch insert stopped partway.
///
/// Batch insertion is not atomic: the first `committed` leaves of the batch
/// remain in the tree. Callers that need all-or-nothing semantics snapshot
/// the tree first and restore it on error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("batch insert stopped after {committed} committed leaves: {source}")]
pub struct BatchInsertError {
    /// Number of leaves from the batch that were inserted before the failure.
    pub committed: usize,
    /// The error that stopped the batch.
    #[source]
    pub source: TreeError,
}
