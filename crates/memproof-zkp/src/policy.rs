//! # Access Policy and Proof Policy
//!
//! Two policies live here.
//!
//! **The access predicate** is the statement every proof attests to:
//!
//! ```text
//! statusValid      = memoryStatus == ACTIVE
//! keyVersionValid  = minKeyVersion <= keyVersion <= currentKeyVersion
//! patternMatched   = !isPersonal
//! allowedForAgent  = statusValid && keyVersionValid && patternMatched
//! ```
//!
//! [`PolicyOutcome::evaluate`] is the only software rendition of it. The
//! simulated path, the legacy-circuit pre-check and the cross-check of
//! real-circuit results all call it, so they cannot drift apart.
//!
//! **The proof policy** decides whether simulated proofs are acceptable at
//! verification time. Release builds default to [`PolicyMode::Production`],
//! which rejects them; debug builds default to
//! [`PolicyMode::Development`]. Override with `MEMPROOF_PROOF_POLICY`.

use memproof_core::FieldElement;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a record. The discriminant is the circuit encoding.
///
/// Deserializes from either the name (`"ACTIVE"`) or the code (`1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "StatusRepr")]
pub enum MemoryStatus {
    /// Deleted by its owner.
    Deleted = 0,
    /// Live and readable.
    Active = 1,
    /// Revoked in the commitment tree.
    Revoked = 2,
}

impl MemoryStatus {
    /// The circuit's integer encoding.
    pub fn code(self) -> u64 {
        self as u64
    }

    /// The status as a witness value.
    pub fn to_field(self) -> FieldElement {
        FieldElement::from_u64(self.code())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatusRepr {
    Code(u64),
    Name(String),
}

impl TryFrom<StatusRepr> for MemoryStatus {
    type Error = String;

    fn try_from(repr: StatusRepr) -> Result<Self, Self::Error> {
        match repr {
            StatusRepr::Code(0) => Ok(Self::Deleted),
            StatusRepr::Code(1) => Ok(Self::Active),
            StatusRepr::Code(2) => Ok(Self::Revoked),
            StatusRepr::Name(name) => match name.to_uppercase().as_str() {
                "DELETED" => Ok(Self::Deleted),
                "ACTIVE" => Ok(Self::Active),
                "REVOKED" => Ok(Self::Revoked),
                _ => Err(format!("unknown memory status {name:?}")),
            },
            StatusRepr::Code(code) => Err(format!("unknown memory status code {code}")),
        }
    }
}

/// Inputs to one policy proof.
///
/// `memory_commitment` is caller text: a decimal field element, or any
/// other string (for example a hex digest), which is hashed onto the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProveInput {
    /// Commitment the statement binds to. Public.
    pub memory_commitment: String,
    /// Public sensitivity tag.
    pub is_finance: bool,
    /// Public sensitivity tag.
    pub is_health: bool,
    /// Public sensitivity tag. Personal records are never released.
    pub is_personal: bool,
    /// Newest key epoch. Public.
    pub current_key_version: u64,
    /// Oldest acceptable key epoch. Public.
    pub min_key_version: u64,
    /// Private.
    pub memory_status: MemoryStatus,
    /// Epoch of the key that encrypted the record. Private.
    pub key_version: u64,
    /// Commitment preimage. Derived from the commitment when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_content: Option<String>,
    /// Commitment salt. Derived from the commitment when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

impl ProveInput {
    /// `memory_commitment` encoded onto the field.
    pub fn commitment_field(&self) -> FieldElement {
        FieldElement::encode_str(&self.memory_commitment)
    }
}

/// The four booleans of the access predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyOutcome {
    /// The overall decision.
    pub allowed_for_agent: bool,
    /// `memoryStatus == ACTIVE`.
    pub status_valid: bool,
    /// `minKeyVersion <= keyVersion <= currentKeyVersion`.
    pub key_version_valid: bool,
    /// `!isPersonal`.
    pub pattern_matched: bool,
}

impl PolicyOutcome {
    /// Evaluate the predicate in software.
    pub fn evaluate(input: &ProveInput) -> Self {
        let status_valid = input.memory_status == MemoryStatus::Active;
        let key_version_valid = input.min_key_version <= input.key_version
            && input.key_version <= input.current_key_version;
        let pattern_matched = !input.is_personal;
        Self {
            allowed_for_agent: status_valid && key_version_valid && pattern_matched,
            status_valid,
            key_version_valid,
            pattern_matched,
        }
    }

    /// Whether the checks the legacy circuit cannot express both hold.
    pub fn passes_validity_checks(&self) -> bool {
        self.status_valid && self.key_version_valid
    }
}

/// Errors from proof policy enforcement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// Simulated proof rejected in production mode.
    #[error("simulated proof rejected: production mode requires a real proof backend ({backend})")]
    SimulatedProofRejected {
        /// The proof backend that was rejected.
        backend: String,
    },
}

/// The kind of backend that produced a proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofBackend {
    /// Deterministic SHA-256 fabrication. No cryptographic meaning.
    Simulated,
    /// Groth16 over BN254.
    Groth16,
}

impl ProofBackend {
    /// Whether this backend provides real cryptographic security.
    pub fn is_real(self) -> bool {
        matches!(self, ProofBackend::Groth16)
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            ProofBackend::Simulated => "simulated-sha256",
            ProofBackend::Groth16 => "groth16",
        }
    }
}

/// Proof policy mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    /// Reject simulated proofs unconditionally.
    Production,
    /// Accept simulated proofs (local development and tests).
    Development,
}

/// Runtime rule for which proof backends a verifier accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofPolicy {
    mode: PolicyMode,
}

impl ProofPolicy {
    /// Create a policy with the given mode.
    pub fn new(mode: PolicyMode) -> Self {
        Self { mode }
    }

    /// Rejects simulated proofs.
    pub fn production() -> Self {
        Self::new(PolicyMode::Production)
    }

    /// Accepts simulated proofs.
    pub fn development() -> Self {
        Self::new(PolicyMode::Development)
    }

    /// Parse `production`/`prod` or `development`/`dev`, any case.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" | "prod" => Some(Self::production()),
            "development" | "dev" => Some(Self::development()),
            _ => None,
        }
    }

    /// Policy for a build with no explicit setting: production in release
    /// builds, development in debug builds.
    pub fn build_default() -> Self {
        if cfg!(not(debug_assertions)) {
            Self::production()
        } else {
            Self::development()
        }
    }

    /// `MEMPROOF_PROOF_POLICY` if set to a recognized value, else
    /// [`ProofPolicy::build_default`].
    pub fn from_environment() -> Self {
        std::env::var("MEMPROOF_PROOF_POLICY")
            .ok()
            .and_then(|v| Self::parse(&v))
            .unwrap_or_else(Self::build_default)
    }

    /// Whether `backend` is acceptable under this policy.
    pub fn validate(&self, backend: ProofBackend) -> Result<(), PolicyError> {
        match (self.mode, backend.is_real()) {
            (PolicyMode::Production, false) => Err(PolicyError::SimulatedProofRejected {
                backend: backend.name().to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Current policy mode.
    pub fn mode(&self) -> PolicyMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ProveInput {
        ProveInput {
            memory_commitment: "12345".into(),
            is_finance: true,
            is_health: false,
            is_personal: false,
            current_key_version: 3,
            min_key_version: 1,
            memory_status: MemoryStatus::Active,
            key_version: 2,
            memory_content: None,
            salt: None,
        }
    }

    #[test]
    fn active_current_key_not_personal_is_allowed() {
        let out = PolicyOutcome::evaluate(&input());
        assert!(out.allowed_for_agent);
        assert!(out.status_valid && out.key_version_valid && out.pattern_matched);
    }

    #[test]
    fn deleted_and_revoked_are_blocked() {
        for status in [MemoryStatus::Deleted, MemoryStatus::Revoked] {
            let mut i = input();
            i.memory_status = status;
            let out = PolicyOutcome::evaluate(&i);
            assert!(!out.status_valid);
            assert!(!out.allowed_for_agent);
            assert!(!out.passes_validity_checks());
        }
    }

    #[test]
    fn key_version_window_is_inclusive() {
        for (kv, ok) in [(0, false), (1, true), (3, true), (4, false)] {
            let mut i = input();
            i.key_version = kv;
            assert_eq!(PolicyOutcome::evaluate(&i).key_version_valid, ok, "kv={kv}");
        }
    }

    #[test]
    fn personal_records_are_blocked_but_valid() {
        let mut i = input();
        i.is_personal = true;
        let out = PolicyOutcome::evaluate(&i);
        assert!(!out.pattern_matched);
        assert!(!out.allowed_for_agent);
        assert!(out.passes_validity_checks());
    }

    #[test]
    fn status_codes_match_circuit_encoding() {
        assert_eq!(MemoryStatus::Deleted.code(), 0);
        assert_eq!(MemoryStatus::Active.code(), 1);
        assert_eq!(MemoryStatus::Revoked.to_field(), FieldElement::from_u64(2));
    }

    #[test]
    fn prove_input_wire_format_is_camel_case() {
        let json = serde_json::json!({
            "memoryCommitment": "abc",
            "isFinance": false,
            "isHealth": true,
            "isPersonal": false,
            "currentKeyVersion": 5,
            "minKeyVersion": 2,
            "memoryStatus": "REVOKED",
            "keyVersion": 4,
            "salt": "7"
        });
        let i: ProveInput = serde_json::from_value(json).unwrap();
        assert_eq!(i.memory_status, MemoryStatus::Revoked);
        assert_eq!(i.salt.as_deref(), Some("7"));
        assert!(i.memory_content.is_none());
        assert_eq!(i.commitment_field(), FieldElement::encode_str("abc"));
    }

    #[test]
    fn status_accepts_codes_and_names() {
        let s: MemoryStatus = serde_json::from_str("0").unwrap();
        assert_eq!(s, MemoryStatus::Deleted);
        let s: MemoryStatus = serde_json::from_str("\"active\"").unwrap();
        assert_eq!(s, MemoryStatus::Active);
        assert!(serde_json::from_str::<MemoryStatus>("7").is_err());
        assert_eq!(serde_json::to_string(&MemoryStatus::Revoked).unwrap(), "\"REVOKED\"");
    }

    #[test]
    fn production_rejects_simulated() {
        let policy = ProofPolicy::production();
        assert!(matches!(
            policy.validate(ProofBackend::Simulated),
            Err(PolicyError::SimulatedProofRejected { .. })
        ));
        assert!(policy.validate(ProofBackend::Groth16).is_ok());
    }

    #[test]
    fn development_accepts_everything() {
        let policy = ProofPolicy::development();
        assert!(policy.validate(ProofBackend::Simulated).is_ok());
        assert!(policy.validate(ProofBackend::Groth16).is_ok());
    }

    #[test]
    fn parse_accepts_short_and_long_names() {
        assert_eq!(ProofPolicy::parse("PROD"), Some(ProofPolicy::production()));
        assert_eq!(ProofPolicy::parse("development"), Some(ProofPolicy::development()));
        assert_eq!(ProofPolicy::parse("lenient"), None);
    }

    #[test]
    fn backend_names() {
        assert_eq!(ProofBackend::Simulated.name(), "simulated-sha256");
        assert_eq!(ProofBackend::Groth16.name(), "groth16");
        assert!(!ProofBackend::Simulated.is_real());
    }

    #[test]
    fn release_build_defaults_to_production() {
        if cfg!(not(debug_assertions)) {
            assert_eq!(ProofPolicy::build_default().mode(), PolicyMode::Production);
        } else {
            assert_eq!(ProofPolicy::build_default().mode(), PolicyMode::Development);
        }
    }
}
