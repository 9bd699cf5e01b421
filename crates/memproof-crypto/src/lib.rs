//! # memproof-crypto: Commitment Accumulator
//!
//! This crate provides the append-only, per-owner commitment accumulator:
//!
//! - **Poseidon hashing** ([`Hasher`]): the two-input, field-native
//!   compression function shared by the tree and the policy circuit.
//!   Parameters are circom-compatible so in-circuit and out-of-circuit
//!   hashes agree bit for bit.
//! - **Sparse Merkle tree** ([`SparseMerkleTree`]): fixed depth, leaves
//!   appended left to right, empty subtrees represented by precomputed
//!   zero hashes. Inclusion proofs ([`MerkleProof`]) verify without a live
//!   tree.
//! - **Tree registry** ([`TreeRegistry`]): one lazily created tree per
//!   owner, with per-owner write serialization.
//!
//! ## Initialization Order
//!
//! [`Hasher::initialize`] must succeed before any tree exists. Every tree
//! and registry is constructed from a hasher handle, so the ordering is
//! enforced by the types rather than by convention.

pub mod error;
pub mod poseidon;
pub mod registry;
pub mod smt;

// Re-export primary types.
pub use error::{BatchInsertError, CryptoError, TreeError};
pub use poseidon::Hasher;
pub use registry::{RegistryStats, RevocationOutcome, TreeRegistry};
pub use smt::{InsertOutcome, MerkleProof, SparseMerkleTree, TreeState, UpdateOutcome};
