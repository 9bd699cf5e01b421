//! Proof engine configuration.
//!
//! Read once at bootstrap. Defaults suit a checkout with circuits compiled
//! into `./circuits`; override via environment variables or explicit
//! construction for tests.

use std::path::PathBuf;

use memproof_crypto::smt::{DEFAULT_DEPTH, MAX_DEPTH};

use crate::policy::ProofPolicy;

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Root holding `v1/` and `v2/` artifact triads.
    pub circuits_dir: PathBuf,
    /// Depth of every owner's commitment tree.
    pub tree_depth: u8,
    /// snarkjs executable.
    pub snarkjs_bin: PathBuf,
    /// Whether simulated proofs verify.
    pub proof_policy: ProofPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("circuits")
    }
}

impl EngineConfig {
    /// Defaults with an explicit circuits root.
    pub fn new(circuits_dir: impl Into<PathBuf>) -> Self {
        Self {
            circuits_dir: circuits_dir.into(),
            tree_depth: DEFAULT_DEPTH,
            snarkjs_bin: PathBuf::from("snarkjs"),
            proof_policy: ProofPolicy::build_default(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `MEMPROOF_CIRCUITS_DIR` (default: `circuits`)
    /// - `MEMPROOF_TREE_DEPTH` (default: 20, valid 1..=32)
    /// - `MEMPROOF_SNARKJS_BIN` (default: `snarkjs`)
    /// - `MEMPROOF_PROOF_POLICY` (`production` | `development`; default by build profile)
    pub fn from_env() -> Result<Self, ConfigError> {
        let tree_depth = match std::env::var("MEMPROOF_TREE_DEPTH") {
            Ok(raw) => parse_depth(&raw)?,
            Err(_) => DEFAULT_DEPTH,
        };
        let proof_policy = match std::env::var("MEMPROOF_PROOF_POLICY") {
            Ok(raw) => ProofPolicy::parse(&raw)
                .ok_or_else(|| ConfigError::InvalidValue("MEMPROOF_PROOF_POLICY".into(), raw))?,
            Err(_) => ProofPolicy::build_default(),
        };
        Ok(Self {
            circuits_dir: env_path("MEMPROOF_CIRCUITS_DIR", "circuits"),
            tree_depth,
            snarkjs_bin: env_path("MEMPROOF_SNARKJS_BIN", "snarkjs"),
            proof_policy,
        })
    }

    /// Override the tree depth.
    pub fn with_tree_depth(mut self, depth: u8) -> Self {
        self.tree_depth = depth;
        self
    }

    /// Override the snarkjs executable.
    pub fn with_snarkjs_bin(mut self, bin: impl Into<PathBuf>) -> Self {
        self.snarkjs_bin = bin.into();
        self
    }

    /// Override the proof policy.
    pub fn with_proof_policy(mut self, policy: ProofPolicy) -> Self {
        self.proof_policy = policy;
        self
    }
}

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var_os(var)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn parse_depth(raw: &str) -> Result<u8, ConfigError> {
    match raw.trim().parse::<u8>() {
        Ok(d) if (1..=MAX_DEPTH).contains(&d) => Ok(d),
        _ => Err(ConfigError::InvalidValue(
            "MEMPROOF_TREE_DEPTH".into(),
            raw.to_string(),
        )),
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable holds an unusable value.
    #[error("invalid value for {0}: {1:?}")]
    InvalidValue(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyMode;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.circuits_dir, PathBuf::from("circuits"));
        assert_eq!(cfg.tree_depth, 20);
        assert_eq!(cfg.snarkjs_bin, PathBuf::from("snarkjs"));
    }

    #[test]
    fn builders_override() {
        let cfg = EngineConfig::new("/tmp/c")
            .with_tree_depth(8)
            .with_snarkjs_bin("/opt/snarkjs")
            .with_proof_policy(ProofPolicy::production());
        assert_eq!(cfg.tree_depth, 8);
        assert_eq!(cfg.proof_policy.mode(), PolicyMode::Production);
        assert_eq!(cfg.snarkjs_bin, PathBuf::from("/opt/snarkjs"));
    }

    #[test]
    fn depth_must_be_in_range() {
        assert_eq!(parse_depth("16"), Ok(16));
        assert_eq!(parse_depth(" 32 "), Ok(32));
        assert!(parse_depth("0").is_err());
        assert!(parse_depth("33").is_err());
        assert!(parse_depth("deep").is_err());
    }

    #[test]
    fn env_path_uses_default_when_var_absent() {
        assert_eq!(
            env_path("MEMPROOF_NONEXISTENT_VAR_12345", "fallback"),
            PathBuf::from("fallback")
        );
    }
}
