//! # memproof-zkp: Policy Proof Engine
//!
//! Proves and verifies the access predicate over a committed record:
//!
//! ```text
//! allowedForAgent = (memoryStatus == ACTIVE)
//!                && (minKeyVersion <= keyVersion <= currentKeyVersion)
//!                && !isPersonal
//! ```
//!
//! ## Architecture
//!
//! - [`CircuitResolver`] picks the proving mode once at startup: the
//!   current circuit, the legacy circuit, or simulation.
//! - [`PolicyProver`] hands witnesses to a [`SnarkBackend`] (snarkjs by
//!   default) and always returns an answer, degrading to a simulated
//!   result on any prover failure.
//! - [`PolicyVerifier`] pairing-checks real proofs natively on BN254 and
//!   applies the [`ProofPolicy`] to simulated ones.
//! - [`ProofContext`] wires the hasher, tree registry, prover and verifier
//!   together in dependency order.
//!
//! ## Real vs. Simulated
//!
//! [`ProofResult`] is a tagged union. Simulated results carry a
//! deterministic placeholder with no cryptographic meaning but the same
//! public-signal layout and the same policy booleans a real circuit would
//! produce for the same input.

pub mod circuit;
pub mod config;
pub mod context;
pub mod groth16;
pub mod policy;
pub mod prover;
pub mod signals;
pub mod simulated;
pub mod snarkjs;
pub mod traits;
pub mod verifier;

// Re-export primary types.
pub use circuit::{CircuitArtifacts, CircuitMode, CircuitResolver, CircuitVersion};
pub use config::{ConfigError, EngineConfig};
pub use context::{BootstrapError, ProofContext};
pub use groth16::Groth16Proof;
pub use policy::{MemoryStatus, PolicyMode, PolicyOutcome, ProofBackend, ProofPolicy, ProveInput};
pub use prover::{PolicyProver, ProofMetadata, ProofResult};
pub use signals::PolicySignals;
pub use simulated::SimulationReason;
pub use snarkjs::SnarkjsBackend;
pub use traits::{ProofError, SnarkBackend, VerifyError, Witness};
pub use verifier::{PolicyVerifier, ProofClaim, VerificationResult};
