//! # SNARK Backend Seam
//!
//! The policy engine does not implement a proving system. It consumes one
//! through [`SnarkBackend`]: a `prove` that turns a witness and a circuit's
//! wasm + proving key into a proof and its public signals, and a `verify`
//! that checks a proof against a verification key.
//!
//! Unlike a sealed proof-system trait, this seam is open: the real backend
//! shells out to an external prover, and tests substitute a recording fake
//! to observe exactly when the engine calls out.

use std::collections::BTreeMap;
use std::fmt;

use memproof_core::FieldElement;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::circuit::CircuitArtifacts;
use crate::groth16::Groth16Proof;

/// Error during proof generation.
///
/// Never reaches the caller of [`PolicyProver::prove`](crate::PolicyProver::prove):
/// the prover logs it and degrades to a simulated proof.
#[derive(Error, Debug)]
pub enum ProofError {
    /// The witness or artifacts are unusable.
    #[error("invalid circuit inputs: {0}")]
    InvalidInputs(String),

    /// The external prover ran and reported failure.
    #[error("proof generation failed: {0}")]
    GenerationFailed(String),

    /// The prover's output could not be decoded.
    #[error("malformed prover output: {0}")]
    MalformedOutput(String),

    /// Filesystem or process error around the prover.
    #[error("prover I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error during proof verification.
///
/// Never reaches the caller of
/// [`PolicyVerifier::verify`](crate::PolicyVerifier::verify): it becomes
/// `valid = false`.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// The proof is structurally malformed.
    #[error("malformed proof: {0}")]
    MalformedProof(String),

    /// The verification key is structurally malformed.
    #[error("malformed verification key: {0}")]
    MalformedKey(String),

    /// A public signal is not a canonical field element, or the count is wrong.
    #[error("malformed public signals: {0}")]
    MalformedSignals(String),

    /// The pairing check could not be carried out.
    #[error("proof verification failed: {0}")]
    VerificationFailed(String),
}

/// Named circuit inputs, rendered as the decimal-string JSON object that
/// circom witness generators read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Witness(BTreeMap<String, String>);

impl Witness {
    /// Empty witness.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one input signal.
    pub fn set(&mut self, name: &str, value: FieldElement) -> &mut Self {
        self.0.insert(name.to_string(), value.to_decimal());
        self
    }

    /// Decimal value of one input signal.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Number of input signals.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no signal is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An external Groth16 proving and verification capability.
///
/// Requires `Send + Sync` so one backend can serve concurrent requests and
/// be moved onto a blocking worker.
pub trait SnarkBackend: Send + Sync + fmt::Debug {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    /// Produce a proof and the ordered public signals for `witness`.
    ///
    /// CPU-bound and uninterruptible; may take seconds.
    fn prove(
        &self,
        witness: &Witness,
        artifacts: &CircuitArtifacts,
    ) -> Result<(Groth16Proof, Vec<String>), ProofError>;

    /// Check `proof` against the snarkjs-format `verification_key`.
    ///
    /// `Ok(false)` means the pairing check ran and rejected the proof.
    fn verify(
        &self,
        verification_key: &serde_json::Value,
        public_signals: &[String],
        proof: &Groth16Proof,
    ) -> Result<bool, VerifyError>;
}
