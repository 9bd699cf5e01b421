//! # Policy Verifier
//!
//! Checks a proof and its public signals. Verification never returns an
//! error: malformed proofs, malformed signals, unknown circuit versions and
//! pairing failures all come back as `valid = false`, with the reason
//! logged at `warn`.
//!
//! Real proofs are pairing-checked against the verification key of the
//! circuit version they claim. Simulated proofs are accepted only when the
//! [`ProofPolicy`] allows them and the proof is exactly the deterministic
//! placeholder for its `memoryCommitment` signal.

use std::collections::HashMap;
use std::sync::Arc;

use memproof_core::FieldElement;
use serde::{Deserialize, Serialize};

use crate::circuit::{CircuitArtifacts, CircuitVersion};
use crate::groth16::Groth16Proof;
use crate::policy::{ProofBackend, ProofPolicy};
use crate::prover::ProofResult;
use crate::signals::PolicySignals;
use crate::simulated::matches_fabrication;
use crate::traits::SnarkBackend;

/// What a proof claims to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProofClaim {
    /// Produced by this circuit version.
    Circuit(CircuitVersion),
    /// A simulated placeholder.
    Simulated,
}

impl ProofResult {
    /// What this result claims to be.
    pub fn claim(&self) -> ProofClaim {
        match self.circuit_version() {
            Some(v) => ProofClaim::Circuit(v),
            None => ProofClaim::Simulated,
        }
    }
}

/// Outcome of verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Whether the proof was accepted.
    pub valid: bool,
    /// Policy decision asserted by an accepted proof; `false` otherwise.
    pub allowed_for_agent: bool,
    /// The `commitment` signal of an accepted proof.
    pub commitment: Option<FieldElement>,
    /// `statusValid` of an accepted proof.
    pub status_valid: bool,
    /// `keyVersionValid` of an accepted proof.
    pub key_version_valid: bool,
    /// Whether acceptance rests on a pairing check.
    pub is_real_proof: bool,
}

impl VerificationResult {
    /// A rejection.
    pub fn invalid() -> Self {
        Self {
            valid: false,
            allowed_for_agent: false,
            commitment: None,
            status_valid: false,
            key_version_valid: false,
            is_real_proof: false,
        }
    }

    fn accepted(signals: &PolicySignals, is_real_proof: bool) -> Self {
        Self {
            valid: true,
            allowed_for_agent: signals.allowed_for_agent,
            commitment: Some(signals.commitment),
            status_valid: signals.status_valid,
            key_version_valid: signals.key_version_valid,
            is_real_proof,
        }
    }
}

/// Verifies policy proofs.
#[derive(Debug, Clone)]
pub struct PolicyVerifier {
    policy: ProofPolicy,
    backend: Arc<dyn SnarkBackend>,
    keys: Arc<HashMap<CircuitVersion, serde_json::Value>>,
}

impl PolicyVerifier {
    /// A verifier with explicit verification keys.
    pub fn new(
        policy: ProofPolicy,
        backend: Arc<dyn SnarkBackend>,
        keys: HashMap<CircuitVersion, serde_json::Value>,
    ) -> Self {
        Self {
            policy,
            backend,
            keys: Arc::new(keys),
        }
    }

    /// Load the verification key of every triad in `artifacts`. A key that
    /// cannot be read or parsed is logged and left out, so proofs claiming
    /// that version will not verify.
    pub fn from_artifacts(
        policy: ProofPolicy,
        backend: Arc<dyn SnarkBackend>,
        artifacts: &[CircuitArtifacts],
    ) -> Self {
        let mut keys = HashMap::new();
        for a in artifacts {
            match memproof_core::persist::read_json::<serde_json::Value>(&a.verification_key) {
                Ok(vk) => {
                    keys.insert(a.version, vk);
                }
                Err(e) => tracing::warn!(
                    version = %a.version,
                    path = %a.verification_key.display(),
                    error = %e,
                    "verification key unreadable; version disabled"
                ),
            }
        }
        Self::new(policy, backend, keys)
    }

    /// The proof policy in force.
    pub fn policy(&self) -> ProofPolicy {
        self.policy
    }

    /// Circuit versions with a loaded verification key.
    pub fn versions(&self) -> Vec<CircuitVersion> {
        let mut v: Vec<_> = self.keys.keys().copied().collect();
        v.sort();
        v
    }

    /// Verify a [`ProofResult`] as produced by the prover.
    pub fn verify_result(&self, result: &ProofResult) -> VerificationResult {
        self.verify(result.proof(), result.public_signals(), result.claim())
    }

    /// Verify `proof` and its current-layout `public_signals`.
    pub fn verify(
        &self,
        proof: &Groth16Proof,
        public_signals: &[String],
        claim: ProofClaim,
    ) -> VerificationResult {
        let signals = match PolicySignals::parse(public_signals) {
            Ok(s) => s,
            Err(e) => return reject(claim, &e.to_string()),
        };
        if !signals.is_consistent() {
            return reject(claim, "allowedForAgent contradicts the other flags");
        }
        if !proof.is_well_formed() {
            return reject(claim, "proof is not well formed");
        }

        match claim {
            ProofClaim::Simulated => {
                if let Err(e) = self.policy.validate(ProofBackend::Simulated) {
                    return reject(claim, &e.to_string());
                }
                if !matches_fabrication(proof, &signals.memory_commitment) {
                    return reject(claim, "simulated proof does not match its commitment");
                }
                VerificationResult::accepted(&signals, false)
            }
            ProofClaim::Circuit(version) => match self.keys.get(&version) {
                Some(vk) => {
                    match self
                        .backend
                        .verify(vk, &signals.for_version(version), proof)
                    {
                        Ok(true) => VerificationResult::accepted(&signals, true),
                        Ok(false) => reject(claim, "pairing check failed"),
                        Err(e) => reject(claim, &e.to_string()),
                    }
                }
                None => {
                    // No key: the proof can only be checked structurally.
                    if let Err(e) = self.policy.validate(ProofBackend::Simulated) {
                        return reject(claim, &format!("no verification key for {version}: {e}"));
                    }
                    tracing::warn!(
                        %version,
                        "no verification key; accepting on structure only"
                    );
                    VerificationResult::accepted(&signals, false)
                }
            },
        }
    }
}

fn reject(claim: ProofClaim, reason: &str) -> VerificationResult {
    tracing::warn!(claim = ?claim, reason, "policy proof rejected");
    VerificationResult::invalid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::CircuitMode;
    use crate::policy::MemoryStatus;
    use crate::prover::tests::{artifacts, input, FakeBackend};
    use crate::prover::PolicyProver;
    use memproof_crypto::Hasher;

    fn keys(versions: &[CircuitVersion]) -> HashMap<CircuitVersion, serde_json::Value> {
        versions
            .iter()
            .map(|v| (*v, serde_json::json!({"fake": true})))
            .collect()
    }

    fn prove(mode: CircuitMode) -> ProofResult {
        PolicyProver::new(Hasher::initialize().unwrap(), mode, Arc::new(FakeBackend::default()))
            .prove(&input())
    }

    fn verifier(policy: ProofPolicy, versions: &[CircuitVersion]) -> PolicyVerifier {
        PolicyVerifier::new(policy, Arc::new(FakeBackend::default()), keys(versions))
    }

    #[test]
    fn real_proof_verifies_with_key() {
        let r = prove(CircuitMode::Real(artifacts(CircuitVersion::V2)));
        let v = verifier(ProofPolicy::production(), &[CircuitVersion::V2]);
        let out = v.verify_result(&r);
        assert!(out.valid);
        assert!(out.is_real_proof);
        assert!(out.allowed_for_agent);
        assert_eq!(
            out.commitment.map(|c| c.to_decimal()),
            Some(r.public_signals()[1].clone())
        );
    }

    #[test]
    fn real_proof_without_key_depends_on_policy() {
        let r = prove(CircuitMode::Real(artifacts(CircuitVersion::V1)));
        assert!(!verifier(ProofPolicy::production(), &[CircuitVersion::V2])
            .verify_result(&r)
            .valid);
        let dev = verifier(ProofPolicy::development(), &[]).verify_result(&r);
        assert!(dev.valid);
        assert!(!dev.is_real_proof);
    }

    #[test]
    fn simulated_proof_follows_policy() {
        let r = prove(CircuitMode::Simulated);
        assert!(!verifier(ProofPolicy::production(), &[]).verify_result(&r).valid);
        let dev = verifier(ProofPolicy::development(), &[]).verify_result(&r);
        assert!(dev.valid);
        assert!(!dev.is_real_proof);
        assert!(dev.allowed_for_agent);
    }

    #[test]
    fn simulated_proof_must_match_commitment() {
        let r = prove(CircuitMode::Simulated);
        let mut signals = r.public_signals().to_vec();
        signals[4] = "42".into();
        let out = verifier(ProofPolicy::development(), &[]).verify(
            r.proof(),
            &signals,
            ProofClaim::Simulated,
        );
        assert_eq!(out, VerificationResult::invalid());
    }

    #[test]
    fn forged_allow_flag_is_rejected() {
        let mut i = input();
        i.memory_status = MemoryStatus::Deleted;
        let r = PolicyProver::new(
            Hasher::initialize().unwrap(),
            CircuitMode::Simulated,
            Arc::new(FakeBackend::default()),
        )
        .prove(&i);
        let mut signals = r.public_signals().to_vec();
        signals[0] = "1".into();
        let out = verifier(ProofPolicy::development(), &[]).verify(
            r.proof(),
            &signals,
            ProofClaim::Simulated,
        );
        assert!(!out.valid);
    }

    #[test]
    fn malformed_inputs_never_panic() {
        let v = verifier(ProofPolicy::development(), &[CircuitVersion::V2]);
        let r = prove(CircuitMode::Real(artifacts(CircuitVersion::V2)));
        assert!(!v.verify(r.proof(), &[], ProofClaim::Circuit(CircuitVersion::V2)).valid);
        let mut bad = r.proof().clone();
        bad.pi_a.clear();
        assert!(!v
            .verify(&bad, r.public_signals(), ProofClaim::Circuit(CircuitVersion::V2))
            .valid);
        let mut other = r.proof().clone();
        other.pi_c[0] = "1".into();
        assert!(!v
            .verify(&other, r.public_signals(), ProofClaim::Circuit(CircuitVersion::V2))
            .valid);
    }

    #[test]
    fn unreadable_key_disables_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = artifacts(CircuitVersion::V2);
        a.verification_key = dir.path().join("missing.json");
        let v = PolicyVerifier::from_artifacts(
            ProofPolicy::production(),
            Arc::new(FakeBackend::default()),
            &[a],
        );
        assert!(v.versions().is_empty());
    }

    #[test]
    fn result_serializes_camel_case() {
        let json = serde_json::to_value(VerificationResult::invalid()).unwrap();
        assert_eq!(json["allowedForAgent"], false);
        assert_eq!(json["isRealProof"], false);
        assert!(json["commitment"].is_null());
    }
}
