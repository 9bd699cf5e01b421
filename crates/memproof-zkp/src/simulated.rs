//! # Simulated Proofs
//!
//! When no circuit can produce a real proof, the engine still answers the
//! policy question and attaches a proof-shaped placeholder. The placeholder
//! is deterministic so tests and repeated calls are reproducible:
//!
//! ```text
//! coord(tag) = SHA256("memproof/simulated/" || tag || ":" || memoryCommitment) mod r
//! ```
//!
//! **NOT A PROOF.** Anyone can recompute it from the public commitment. It
//! is only ever returned inside [`ProofResult::Simulated`](crate::ProofResult),
//! and production verifiers reject it.

use std::fmt;

use memproof_core::{FieldElement, Sha256Accumulator};
use serde::{Deserialize, Serialize};

use crate::groth16::{Groth16Proof, CURVE, PROTOCOL};

const DOMAIN: &[u8] = b"memproof/simulated/";

/// Why a result is simulated rather than real.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SimulationReason {
    /// No complete circuit triad was resolved at startup.
    NoCircuit,
    /// A circuit exists but proving failed or returned unusable output.
    ProverFailed,
    /// The legacy circuit cannot express a failed status or key-version
    /// check, so the blocked answer was computed without it.
    PolicyBlocked,
}

impl fmt::Display for SimulationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SimulationReason::NoCircuit => "no circuit available",
            SimulationReason::ProverFailed => "prover failed",
            SimulationReason::PolicyBlocked => "blocked before legacy circuit",
        })
    }
}

fn coordinate(tag: &str, memory_commitment: &FieldElement) -> String {
    let mut acc = Sha256Accumulator::new();
    acc.update(DOMAIN)
        .update(tag.as_bytes())
        .update(b":")
        .update(memory_commitment.to_decimal().as_bytes());
    FieldElement::from_bytes_be_mod_order(&acc.finalize()).to_decimal()
}

/// The placeholder proof for `memory_commitment`.
pub fn fabricate_proof(memory_commitment: &FieldElement) -> Groth16Proof {
    let c = |tag: &str| coordinate(tag, memory_commitment);
    Groth16Proof {
        pi_a: vec![c("pi_a.x"), c("pi_a.y"), "1".into()],
        pi_b: vec![
            vec![c("pi_b.x.c0"), c("pi_b.x.c1")],
            vec![c("pi_b.y.c0"), c("pi_b.y.c1")],
            vec!["1".into(), "0".into()],
        ],
        pi_c: vec![c("pi_c.x"), c("pi_c.y"), "1".into()],
        protocol: PROTOCOL.to_string(),
        curve: CURVE.to_string(),
    }
}

/// Whether `proof` is exactly the placeholder for `memory_commitment`.
pub fn matches_fabrication(proof: &Groth16Proof, memory_commitment: &FieldElement) -> bool {
    *proof == fabricate_proof(memory_commitment)
}
