//! # Poseidon Hasher
//!
//! The two-input, field-native compression function used for tree nodes,
//! record commitments and revocation markers. Parameters are the circom
//! ones (x^5 S-box, width 3, 8 full and 57 partial rounds over BN254), so a
//! commitment computed here equals the one a circom circuit computes for
//! the same inputs.
//!
//! Building the round constants and MDS matrix is the expensive step.
//! [`Hasher::initialize`] proves the parameters build and seeds the calling
//! thread. Each thread keeps its own instance, built on first use, so
//! hashing on one thread never waits on another.

use std::cell::RefCell;
use std::time::Instant;

use ark_bn254::Fr;
use light_poseidon::{Poseidon, PoseidonHasher};
use memproof_core::FieldElement;

use crate::error::CryptoError;

/// Domain tag hashed with a leaf to form its revocation marker.
pub const REVOCATION_TAG: &str = "REVOKED";

thread_local! {
    static INSTANCE: RefCell<Option<Poseidon<Fr>>> = const { RefCell::new(None) };
}

fn build() -> Result<Poseidon<Fr>, CryptoError> {
    Poseidon::<Fr>::new_circom(2).map_err(|e| CryptoError::HasherInit(e.to_string()))
}

/// Handle proving the Poseidon parameters were built successfully.
#[derive(Clone)]
pub struct Hasher {
    _ready: (),
}

impl std::fmt::Debug for Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hasher")
            .field("primitive", &"poseidon-bn254-circom")
            .field("arity", &2)
            .finish()
    }
}

impl Hasher {
    /// Build the Poseidon parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::HasherInit`] if the parameters cannot be
    /// constructed. Callers treat this as fatal: no tree or proof operation
    /// can run without a hasher.
    pub fn initialize() -> Result<Self, CryptoError> {
        let started = Instant::now();
        let poseidon = build()?;
        INSTANCE.with(|slot| *slot.borrow_mut() = Some(poseidon));
        tracing::info!(
            elapsed_us = started.elapsed().as_micros() as u64,
            "poseidon hasher initialized"
        );
        Ok(Self { _ready: () })
    }

    /// `Poseidon(left, right)`.
    pub fn hash2(
        &self,
        left: &FieldElement,
        right: &FieldElement,
    ) -> Result<FieldElement, CryptoError> {
        INSTANCE.with(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.is_none() {
                tracing::debug!("building poseidon instance for thread");
                *slot = Some(build()?);
            }
            let Some(poseidon) = slot.as_mut() else {
                return Err(CryptoError::HasherInit("poseidon instance missing".into()));
            };
            poseidon
                .hash(&[left.inner(), right.inner()])
                .map(FieldElement::from)
                .map_err(|e| CryptoError::Hash(e.to_string()))
        })
    }

    /// Commitment to a record: `Poseidon(content, salt)`.
    pub fn commitment(
        &self,
        content: &FieldElement,
        salt: &FieldElement,
    ) -> Result<FieldElement, CryptoError> {
        self.hash2(content, salt)
    }

    /// Replacement leaf used when a commitment is revoked:
    /// `Poseidon(encode("REVOKED"), leaf)`.
    ///
    /// The marker is unique per leaf, so revoking two different commitments
    /// never produces a duplicate leaf.
    pub fn revocation_marker(&self, leaf: &FieldElement) -> Result<FieldElement, CryptoError> {
        self.hash2(&FieldElement::encode_str(REVOCATION_TAG), leaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> Hasher {
        Hasher::initialize().unwrap()
    }

    #[test]
    fn matches_circomlib_test_vector() {
        let h = hasher();
        let out = h
            .hash2(&FieldElement::from_u64(1), &FieldElement::from_u64(2))
            .unwrap();
        assert_eq!(
            out.to_decimal(),
            "7853200120776062878684798364095072458815029376092732009249414926327459813530"
        );
    }

    #[test]
    fn hash_is_order_sensitive() {
        let h = hasher();
        let a = FieldElement::from_u64(1);
        let b = FieldElement::from_u64(2);
        assert_ne!(h.hash2(&a, &b).unwrap(), h.hash2(&b, &a).unwrap());
    }

    #[test]
    fn threads_hash_independently_and_agree() {
        let h = hasher();
        let x = FieldElement::from_u64(9);
        let expected = h.hash2(&x, &x).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let h = h.clone();
                std::thread::spawn(move || h.hash2(&x, &x).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }

    #[test]
    fn revocation_marker_differs_from_leaf_and_is_deterministic() {
        let h = hasher();
        let leaf = FieldElement::encode_str("a");
        let marker = h.revocation_marker(&leaf).unwrap();
        assert_ne!(marker, leaf);
        assert_eq!(marker, h.revocation_marker(&leaf).unwrap());
        assert_ne!(
            marker,
            h.revocation_marker(&FieldElement::encode_str("b")).unwrap()
        );
    }

    #[test]
    fn debug_does_not_dump_parameters() {
        let rendered = format!("{:?}", hasher());
        assert!(rendered.contains("poseidon"));
        assert!(rendered.len() < 120);
    }
}
