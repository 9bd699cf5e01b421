//! # Bootstrap Context
//!
//! Everything that must exist before the first request, built once and in
//! order:
//!
//! 1. Poseidon parameters (fatal on failure)
//! 2. Circuit resolution
//! 3. Tree registry, prover and verifier sharing one hasher handle
//!
//! The context is passed to whatever layer needs it; there are no
//! process-wide singletons.

use std::sync::Arc;

use memproof_crypto::{CryptoError, Hasher, TreeError, TreeRegistry};
use thiserror::Error;

use crate::circuit::{CircuitArtifacts, CircuitMode, CircuitResolver};
use crate::config::EngineConfig;
use crate::prover::PolicyProver;
use crate::snarkjs::SnarkjsBackend;
use crate::traits::SnarkBackend;
use crate::verifier::PolicyVerifier;

/// Errors that abort startup.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// The hash primitive could not be initialized.
    #[error("hasher initialization failed: {0}")]
    Hasher(#[from] CryptoError),

    /// The configured tree depth is unusable.
    #[error("tree registry initialization failed: {0}")]
    Registry(#[from] TreeError),
}

/// Initialized engine state.
#[derive(Debug, Clone)]
pub struct ProofContext {
    /// Shared Poseidon handle.
    pub hasher: Hasher,
    /// Per-owner commitment trees.
    pub registry: TreeRegistry,
    /// Policy prover for the resolved mode.
    pub prover: PolicyProver,
    /// Policy verifier with every available verification key.
    pub verifier: PolicyVerifier,
    /// Mode chosen at startup.
    pub mode: CircuitMode,
    /// Every complete triad found.
    pub available: Vec<CircuitArtifacts>,
}

impl ProofContext {
    /// Bootstrap with the snarkjs backend named in `config`.
    pub fn bootstrap(config: &EngineConfig) -> Result<Self, BootstrapError> {
        let backend = Arc::new(SnarkjsBackend::new(config.snarkjs_bin.clone()));
        Self::bootstrap_with_backend(config, backend)
    }

    /// Bootstrap with an explicit proving backend.
    pub fn bootstrap_with_backend(
        config: &EngineConfig,
        backend: Arc<dyn SnarkBackend>,
    ) -> Result<Self, BootstrapError> {
        let hasher = Hasher::initialize()?;

        let available = CircuitResolver::available(&config.circuits_dir);
        let mode = CircuitResolver::select(&config.circuits_dir, &available);

        let registry = TreeRegistry::new(hasher.clone(), config.tree_depth)?;
        let prover = PolicyProver::new(hasher.clone(), mode.clone(), Arc::clone(&backend));
        let verifier = PolicyVerifier::from_artifacts(config.proof_policy, backend, &available);

        tracing::info!(
            mode = %mode,
            backend_versions = ?verifier.versions(),
            tree_depth = config.tree_depth,
            proof_policy = ?config.proof_policy.mode(),
            "memproof engine ready"
        );

        Ok(Self {
            hasher,
            registry,
            prover,
            verifier,
            mode,
            available,
        })
    }
}
