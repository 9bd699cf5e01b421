//! # Public Signal Layouts
//!
//! snarkjs orders public signals as circuit outputs followed by public
//! inputs. The current circuit's vector has ten entries:
//!
//! ```text
//! 0 allowedForAgent   1 commitment      2 statusValid    3 keyVersionValid
//! 4 memoryCommitment  5 isFinance       6 isHealth       7 isPersonal
//! 8 currentKeyVersion 9 minKeyVersion
//! ```
//!
//! The legacy circuit has no status or key-version checks and emits six:
//!
//! ```text
//! 0 allowedForAgent   1 commitment      2 memoryCommitment
//! 3 isFinance         4 isHealth        5 isPersonal
//! ```
//!
//! Every [`ProofResult`](crate::ProofResult) carries the ten-entry layout.
//! Legacy results are spliced into it, and [`PolicySignals::to_legacy`]
//! recovers the six entries the legacy verification key expects.

use memproof_core::FieldElement;

use crate::circuit::CircuitVersion;
use crate::policy::{PolicyOutcome, ProveInput};
use crate::traits::VerifyError;

/// Index of `allowedForAgent`.
pub const ALLOWED_FOR_AGENT: usize = 0;
/// Index of `commitment`.
pub const COMMITMENT: usize = 1;
/// Index of `statusValid`.
pub const STATUS_VALID: usize = 2;
/// Index of `keyVersionValid`.
pub const KEY_VERSION_VALID: usize = 3;
/// Index of `memoryCommitment`.
pub const MEMORY_COMMITMENT: usize = 4;
/// Index of `isFinance`.
pub const IS_FINANCE: usize = 5;
/// Index of `isHealth`.
pub const IS_HEALTH: usize = 6;
/// Index of `isPersonal`.
pub const IS_PERSONAL: usize = 7;
/// Index of `currentKeyVersion`.
pub const CURRENT_KEY_VERSION: usize = 8;
/// Index of `minKeyVersion`.
pub const MIN_KEY_VERSION: usize = 9;
/// Length of the current layout.
pub const V2_LEN: usize = 10;

/// Length of the legacy layout.
pub const V1_LEN: usize = 6;

/// Current-layout indices that make up the legacy vector, in legacy order.
const V1_FROM_V2: [usize; V1_LEN] = [
    ALLOWED_FOR_AGENT,
    COMMITMENT,
    MEMORY_COMMITMENT,
    IS_FINANCE,
    IS_HEALTH,
    IS_PERSONAL,
];

/// The public signals of one policy proof, decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicySignals {
    /// The overall decision.
    pub allowed_for_agent: bool,
    /// `Poseidon(memoryContent, salt)` as computed by the prover.
    pub commitment: FieldElement,
    /// `memoryStatus == ACTIVE`.
    pub status_valid: bool,
    /// Key epoch within the window.
    pub key_version_valid: bool,
    /// The public commitment the statement binds to.
    pub memory_commitment: FieldElement,
    /// Sensitivity tag.
    pub is_finance: bool,
    /// Sensitivity tag.
    pub is_health: bool,
    /// Sensitivity tag.
    pub is_personal: bool,
    /// Newest key epoch.
    pub current_key_version: u64,
    /// Oldest acceptable key epoch.
    pub min_key_version: u64,
}

impl PolicySignals {
    /// Signals for `input` given a decided `outcome` and the computed
    /// commitment.
    pub fn for_input(input: &ProveInput, outcome: &PolicyOutcome, commitment: FieldElement) -> Self {
        Self {
            allowed_for_agent: outcome.allowed_for_agent,
            commitment,
            status_valid: outcome.status_valid,
            key_version_valid: outcome.key_version_valid,
            memory_commitment: input.commitment_field(),
            is_finance: input.is_finance,
            is_health: input.is_health,
            is_personal: input.is_personal,
            current_key_version: input.current_key_version,
            min_key_version: input.min_key_version,
        }
    }

    /// Decode a current-layout vector.
    pub fn parse(signals: &[String]) -> Result<Self, VerifyError> {
        if signals.len() != V2_LEN {
            return Err(VerifyError::MalformedSignals(format!(
                "expected {V2_LEN} public signals, got {}",
                signals.len()
            )));
        }
        let fields = signals
            .iter()
            .map(|s| FieldElement::parse(s))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| VerifyError::MalformedSignals(e.to_string()))?;
        Ok(Self {
            allowed_for_agent: flag(&fields, ALLOWED_FOR_AGENT)?,
            commitment: fields[COMMITMENT],
            status_valid: flag(&fields, STATUS_VALID)?,
            key_version_valid: flag(&fields, KEY_VERSION_VALID)?,
            memory_commitment: fields[MEMORY_COMMITMENT],
            is_finance: flag(&fields, IS_FINANCE)?,
            is_health: flag(&fields, IS_HEALTH)?,
            is_personal: flag(&fields, IS_PERSONAL)?,
            current_key_version: integer(&fields, CURRENT_KEY_VERSION)?,
            min_key_version: integer(&fields, MIN_KEY_VERSION)?,
        })
    }

    /// Decode a legacy vector and splice in the validity flags the legacy
    /// circuit cannot prove.
    pub fn from_legacy(
        signals: &[String],
        status_valid: bool,
        key_version_valid: bool,
        current_key_version: u64,
        min_key_version: u64,
    ) -> Result<Self, VerifyError> {
        if signals.len() != V1_LEN {
            return Err(VerifyError::MalformedSignals(format!(
                "expected {V1_LEN} legacy public signals, got {}",
                signals.len()
            )));
        }
        let mut full = vec![String::new(); V2_LEN];
        for (legacy_idx, &v2_idx) in V1_FROM_V2.iter().enumerate() {
            full[v2_idx] = signals[legacy_idx].clone();
        }
        full[STATUS_VALID] = u64::from(status_valid).to_string();
        full[KEY_VERSION_VALID] = u64::from(key_version_valid).to_string();
        full[CURRENT_KEY_VERSION] = current_key_version.to_string();
        full[MIN_KEY_VERSION] = min_key_version.to_string();
        Self::parse(&full)
    }

    /// Encode as the current layout.
    pub fn to_strings(&self) -> Vec<String> {
        let mut out = vec![String::new(); V2_LEN];
        out[ALLOWED_FOR_AGENT] = bool_str(self.allowed_for_agent);
        out[COMMITMENT] = self.commitment.to_decimal();
        out[STATUS_VALID] = bool_str(self.status_valid);
        out[KEY_VERSION_VALID] = bool_str(self.key_version_valid);
        out[MEMORY_COMMITMENT] = self.memory_commitment.to_decimal();
        out[IS_FINANCE] = bool_str(self.is_finance);
        out[IS_HEALTH] = bool_str(self.is_health);
        out[IS_PERSONAL] = bool_str(self.is_personal);
        out[CURRENT_KEY_VERSION] = self.current_key_version.to_string();
        out[MIN_KEY_VERSION] = self.min_key_version.to_string();
        out
    }

    /// The subset the legacy verification key checks.
    pub fn to_legacy(&self) -> Vec<String> {
        let full = self.to_strings();
        V1_FROM_V2.iter().map(|&i| full[i].clone()).collect()
    }

    /// The signals the verification key of `version` expects.
    pub fn for_version(&self, version: CircuitVersion) -> Vec<String> {
        match version {
            CircuitVersion::V1 => self.to_legacy(),
            CircuitVersion::V2 => self.to_strings(),
        }
    }

    /// The predicate booleans these signals assert.
    pub fn outcome(&self) -> PolicyOutcome {
        PolicyOutcome {
            allowed_for_agent: self.allowed_for_agent,
            status_valid: self.status_valid,
            key_version_valid: self.key_version_valid,
            pattern_matched: !self.is_personal,
        }
    }

    /// Whether `allowedForAgent` follows from the other flags.
    pub fn is_consistent(&self) -> bool {
        self.allowed_for_agent == (self.status_valid && self.key_version_valid && !self.is_personal)
    }
}

fn bool_str(b: bool) -> String {
    u64::from(b).to_string()
}

fn flag(fields: &[FieldElement], idx: usize) -> Result<bool, VerifyError> {
    fields[idx].to_bool().ok_or_else(|| {
        VerifyError::MalformedSignals(format!("signal {idx} is not a boolean: {}", fields[idx]))
    })
}

fn integer(fields: &[FieldElement], idx: usize) -> Result<u64, VerifyError> {
    fields[idx].to_u64().ok_or_else(|| {
        VerifyError::MalformedSignals(format!("signal {idx} is not a key version: {}", fields[idx]))
    })
}
