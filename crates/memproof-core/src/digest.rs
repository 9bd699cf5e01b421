//! # SHA-256 Digests
//!
//! General-purpose digest helpers. SHA-256 is never used inside the tree
//! or the circuit; it only maps arbitrary caller strings onto the field
//! (see [`FieldElement::encode_str`](crate::FieldElement::encode_str)) and
//! derives deterministic placeholder values for simulated proofs.

use sha2::{Digest, Sha256};

/// SHA-256 of `data` as raw bytes.
pub fn sha256_raw(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Incremental SHA-256 over several byte segments.
///
/// Used where a digest binds a domain tag and a value together without
/// allocating the concatenation first.
#[derive(Clone, Default)]
pub struct Sha256Accumulator {
    inner: Sha256,
}

impl std::fmt::Debug for Sha256Accumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sha256Accumulator").finish_non_exhaustive()
    }
}

impl Sha256Accumulator {
    /// Start an empty accumulator.
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    /// Append a segment.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Finish and return the raw digest.
    pub fn finalize(self) -> [u8; 32] {
        self.inner.finalize().into()
    }
}
