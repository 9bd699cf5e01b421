//! # Policy Prover
//!
//! Produces a [`ProofResult`] for a [`ProveInput`] under the circuit mode
//! resolved at startup:
//!
//! | Mode | Behavior |
//! |------|----------|
//! | current circuit | full witness to the backend; ten public signals back |
//! | legacy circuit | status and key-version checked in software first; blocked inputs never reach the circuit; passing inputs prove the pattern sub-statement and are spliced into the current layout |
//! | simulated | predicate evaluated in software, placeholder proof attached |
//!
//! Proving never fails from the caller's point of view. Any backend error,
//! malformed proof or malformed signal vector is logged and answered with
//! a simulated result carrying the same policy booleans.

use std::sync::Arc;

use memproof_core::{FieldElement, Sha256Accumulator};
use memproof_crypto::Hasher;
use serde::{Deserialize, Serialize};

use crate::circuit::{CircuitArtifacts, CircuitMode, CircuitVersion};
use crate::groth16::Groth16Proof;
use crate::policy::{PolicyOutcome, ProofBackend, ProveInput};
use crate::signals::PolicySignals;
use crate::simulated::{fabricate_proof, SimulationReason};
use crate::traits::{ProofError, SnarkBackend, Witness};

/// A policy answer with its proof.
///
/// The variant is the discriminant between a cryptographic proof and a
/// placeholder; there is no way to read a simulated proof as a real one
/// without matching on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "proofKind", rename_all = "camelCase")]
pub enum ProofResult {
    /// Produced by a real circuit.
    #[serde(rename_all = "camelCase")]
    Real {
        /// Circuit that produced the proof.
        circuit_version: CircuitVersion,
        /// The Groth16 proof.
        proof: Groth16Proof,
        /// Current-layout public signals.
        public_signals: Vec<String>,
        /// Booleans asserted by the signals.
        outcome: PolicyOutcome,
    },
    /// Computed in software.
    #[serde(rename_all = "camelCase")]
    Simulated {
        /// Why no real proof was produced.
        reason: SimulationReason,
        /// Deterministic placeholder.
        proof: Groth16Proof,
        /// Current-layout public signals.
        public_signals: Vec<String>,
        /// Booleans from the software predicate.
        outcome: PolicyOutcome,
    },
}

/// Flat description of a result for logs and API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofMetadata {
    /// Whether the proof is cryptographically meaningful.
    pub is_real_proof: bool,
    /// Backend that produced it.
    pub backend: ProofBackend,
    /// Circuit version, for real proofs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_version: Option<CircuitVersion>,
    /// Reason, for simulated proofs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulation_reason: Option<SimulationReason>,
}

impl ProofResult {
    /// Whether the proof is cryptographically meaningful.
    pub fn is_real_proof(&self) -> bool {
        matches!(self, ProofResult::Real { .. })
    }

    /// The policy booleans.
    pub fn outcome(&self) -> &PolicyOutcome {
        match self {
            ProofResult::Real { outcome, .. } | ProofResult::Simulated { outcome, .. } => outcome,
        }
    }

    /// The proof object.
    pub fn proof(&self) -> &Groth16Proof {
        match self {
            ProofResult::Real { proof, .. } | ProofResult::Simulated { proof, .. } => proof,
        }
    }

    /// The public signals, current layout.
    pub fn public_signals(&self) -> &[String] {
        match self {
            ProofResult::Real { public_signals, .. }
            | ProofResult::Simulated { public_signals, .. } => public_signals,
        }
    }

    /// Circuit version, for real proofs.
    pub fn circuit_version(&self) -> Option<CircuitVersion> {
        match self {
            ProofResult::Real {
                circuit_version, ..
            } => Some(*circuit_version),
            ProofResult::Simulated { .. } => None,
        }
    }

    /// Summary of where the result came from.
    pub fn metadata(&self) -> ProofMetadata {
        match self {
            ProofResult::Real {
                circuit_version, ..
            } => ProofMetadata {
                is_real_proof: true,
                backend: ProofBackend::Groth16,
                circuit_version: Some(*circuit_version),
                simulation_reason: None,
            },
            ProofResult::Simulated { reason, .. } => ProofMetadata {
                is_real_proof: false,
                backend: ProofBackend::Simulated,
                circuit_version: None,
                simulation_reason: Some(*reason),
            },
        }
    }
}

/// Produces policy proofs. Cheap to clone; clones share the backend.
#[derive(Debug, Clone)]
pub struct PolicyProver {
    hasher: Hasher,
    mode: CircuitMode,
    backend: Arc<dyn SnarkBackend>,
}

impl PolicyProver {
    /// A prover for the resolved `mode`. `backend` is only called when the
    /// mode is real.
    pub fn new(hasher: Hasher, mode: CircuitMode, backend: Arc<dyn SnarkBackend>) -> Self {
        Self {
            hasher,
            mode,
            backend,
        }
    }

    /// The mode fixed at construction.
    pub fn mode(&self) -> &CircuitMode {
        &self.mode
    }

    /// Answer the policy question for `input`. Never fails.
    pub fn prove(&self, input: &ProveInput) -> ProofResult {
        let outcome = PolicyOutcome::evaluate(input);
        let commitment = self.commitment(input);

        match &self.mode {
            CircuitMode::Simulated => {
                simulate(input, outcome, commitment, SimulationReason::NoCircuit)
            }
            CircuitMode::Real(artifacts) => match artifacts.version {
                CircuitVersion::V2 => self.prove_current(input, outcome, commitment, artifacts),
                CircuitVersion::V1 => self.prove_legacy(input, outcome, commitment, artifacts),
            },
        }
    }

    /// [`prove`](Self::prove) on the blocking worker pool, so CPU-bound
    /// proving does not stall the async runtime.
    pub async fn prove_offloaded(&self, input: ProveInput) -> ProofResult {
        let prover = self.clone();
        let task_input = input.clone();
        match tokio::task::spawn_blocking(move || prover.prove(&task_input)).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "proving task did not complete; simulating");
                let outcome = PolicyOutcome::evaluate(&input);
                let commitment = self.commitment(&input);
                simulate(&input, outcome, commitment, SimulationReason::ProverFailed)
            }
        }
    }

    /// `Poseidon(memoryContent, salt)` with missing preimage values derived
    /// from the commitment string.
    pub fn commitment(&self, input: &ProveInput) -> FieldElement {
        let (content, salt) = preimage(input);
        match self.hasher.commitment(&content, &salt) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "commitment hash failed; echoing memoryCommitment");
                input.commitment_field()
            }
        }
    }

    fn prove_current(
        &self,
        input: &ProveInput,
        outcome: PolicyOutcome,
        commitment: FieldElement,
        artifacts: &CircuitArtifacts,
    ) -> ProofResult {
        let witness = current_witness(input);
        let attempt = self
            .backend
            .prove(&witness, artifacts)
            .and_then(|(proof, signals)| {
                let parsed = check_output(input, &proof, &signals)?;
                Ok((proof, parsed))
            });

        match attempt {
            Ok((proof, parsed)) => {
                if parsed.outcome() != outcome {
                    tracing::warn!(
                        circuit = ?parsed.outcome(),
                        software = ?outcome,
                        "circuit and software predicate disagree; keeping circuit result"
                    );
                }
                ProofResult::Real {
                    circuit_version: CircuitVersion::V2,
                    proof,
                    public_signals: parsed.to_strings(),
                    outcome: parsed.outcome(),
                }
            }
            Err(e) => fallback(input, outcome, commitment, CircuitVersion::V2, &e),
        }
    }

    fn prove_legacy(
        &self,
        input: &ProveInput,
        outcome: PolicyOutcome,
        commitment: FieldElement,
        artifacts: &CircuitArtifacts,
    ) -> ProofResult {
        if !outcome.passes_validity_checks() {
            tracing::debug!(
                status_valid = outcome.status_valid,
                key_version_valid = outcome.key_version_valid,
                "blocked before legacy circuit"
            );
            return simulate(input, outcome, commitment, SimulationReason::PolicyBlocked);
        }

        let witness = legacy_witness(input);
        let attempt = self
            .backend
            .prove(&witness, artifacts)
            .and_then(|(proof, signals)| {
                if !proof.is_well_formed() {
                    return Err(ProofError::MalformedOutput("proof shape".into()));
                }
                let spliced = PolicySignals::from_legacy(
                    &signals,
                    outcome.status_valid,
                    outcome.key_version_valid,
                    input.current_key_version,
                    input.min_key_version,
                )
                .map_err(|e| ProofError::MalformedOutput(e.to_string()))?;
                bind_check(input, &spliced)?;
                Ok((proof, spliced))
            });

        match attempt {
            Ok((proof, spliced)) => ProofResult::Real {
                circuit_version: CircuitVersion::V1,
                proof,
                public_signals: spliced.to_strings(),
                outcome: spliced.outcome(),
            },
            Err(e) => fallback(input, outcome, commitment, CircuitVersion::V1, &e),
        }
    }
}

fn check_output(
    input: &ProveInput,
    proof: &Groth16Proof,
    signals: &[String],
) -> Result<PolicySignals, ProofError> {
    if !proof.is_well_formed() {
        return Err(ProofError::MalformedOutput("proof shape".into()));
    }
    let parsed =
        PolicySignals::parse(signals).map_err(|e| ProofError::MalformedOutput(e.to_string()))?;
    bind_check(input, &parsed)?;
    Ok(parsed)
}

fn bind_check(input: &ProveInput, signals: &PolicySignals) -> Result<(), ProofError> {
    if signals.memory_commitment != input.commitment_field() {
        return Err(ProofError::MalformedOutput(
            "memoryCommitment signal does not match the input".into(),
        ));
    }
    Ok(())
}

fn fallback(
    input: &ProveInput,
    outcome: PolicyOutcome,
    commitment: FieldElement,
    version: CircuitVersion,
    error: &ProofError,
) -> ProofResult {
    tracing::warn!(%version, error = %error, "real proving failed; falling back to simulation");
    simulate(input, outcome, commitment, SimulationReason::ProverFailed)
}

fn simulate(
    input: &ProveInput,
    outcome: PolicyOutcome,
    commitment: FieldElement,
    reason: SimulationReason,
) -> ProofResult {
    let signals = PolicySignals::for_input(input, &outcome, commitment);
    ProofResult::Simulated {
        reason,
        proof: fabricate_proof(&signals.memory_commitment),
        public_signals: signals.to_strings(),
        outcome,
    }
}

/// `(memoryContent, salt)`: supplied values encoded onto the field, missing
/// ones derived as `SHA256("memproof/preimage/" || tag || ":" || memoryCommitment) mod r`.
pub fn preimage(input: &ProveInput) -> (FieldElement, FieldElement) {
    let derive = |tag: &str| {
        let mut acc = Sha256Accumulator::new();
        acc.update(b"memproof/preimage/")
            .update(tag.as_bytes())
            .update(b":")
            .update(input.memory_commitment.as_bytes());
        FieldElement::from_bytes_be_mod_order(&acc.finalize())
    };
    let content = input
        .memory_content
        .as_deref()
        .map(FieldElement::encode_str)
        .unwrap_or_else(|| derive("content"));
    let salt = input
        .salt
        .as_deref()
        .map(FieldElement::encode_str)
        .unwrap_or_else(|| derive("salt"));
    (content, salt)
}

fn legacy_witness(input: &ProveInput) -> Witness {
    let (content, salt) = preimage(input);
    let mut w = Witness::new();
    w.set("memoryContent", content)
        .set("salt", salt)
        .set("memoryCommitment", input.commitment_field())
        .set("isFinance", FieldElement::from_bool(input.is_finance))
        .set("isHealth", FieldElement::from_bool(input.is_health))
        .set("isPersonal", FieldElement::from_bool(input.is_personal));
    w
}

fn current_witness(input: &ProveInput) -> Witness {
    let mut w = legacy_witness(input);
    w.set("currentKeyVersion", FieldElement::from_u64(input.current_key_version))
        .set("minKeyVersion", FieldElement::from_u64(input.min_key_version))
        .set("memoryStatus", input.memory_status.to_field())
        .set("keyVersion", FieldElement::from_u64(input.key_version));
    w
}
