//! # snarkjs Backend
//!
//! Proves by running `snarkjs groth16 fullprove` (witness generation and
//! proving in one step) in a scratch directory. Verifies natively with
//! arkworks, so verification needs no external process.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use crate::circuit::CircuitArtifacts;
use crate::groth16::{verify_snarkjs, Groth16Proof};
use crate::traits::{ProofError, SnarkBackend, VerifyError, Witness};

/// External snarkjs prover.
#[derive(Debug, Clone)]
pub struct SnarkjsBackend {
    bin: PathBuf,
}

impl SnarkjsBackend {
    /// Use the snarkjs executable at `bin` (a bare name is looked up on `PATH`).
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    /// The configured executable.
    pub fn bin(&self) -> &Path {
        &self.bin
    }
}

impl SnarkBackend for SnarkjsBackend {
    fn name(&self) -> &'static str {
        "snarkjs"
    }

    fn prove(
        &self,
        witness: &Witness,
        artifacts: &CircuitArtifacts,
    ) -> Result<(Groth16Proof, Vec<String>), ProofError> {
        let scratch = tempfile::tempdir()?;
        let input_path = scratch.path().join("input.json");
        let proof_path = scratch.path().join("proof.json");
        let public_path = scratch.path().join("public.json");

        let input = serde_json::to_vec(witness)
            .map_err(|e| ProofError::InvalidInputs(e.to_string()))?;
        std::fs::write(&input_path, input)?;

        let started = Instant::now();
        let output = Command::new(&self.bin)
            .arg("groth16")
            .arg("fullprove")
            .arg(&input_path)
            .arg(&artifacts.wasm)
            .arg(&artifacts.zkey)
            .arg(&proof_path)
            .arg(&public_path)
            .output()?;
        tracing::debug!(
            version = %artifacts.version,
            elapsed_ms = started.elapsed().as_millis() as u64,
            status = %output.status,
            "snarkjs fullprove finished"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProofError::GenerationFailed(format!(
                "snarkjs exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let proof: Groth16Proof = read_output(&proof_path)?;
        let signals: Vec<String> = read_output(&public_path)?;
        Ok((proof, signals))
    }

    fn verify(
        &self,
        verification_key: &serde_json::Value,
        public_signals: &[String],
        proof: &Groth16Proof,
    ) -> Result<bool, VerifyError> {
        verify_snarkjs(verification_key, public_signals, proof)
    }
}

fn read_output<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ProofError> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ProofError::MalformedOutput(format!("{}: {e}", path.display())))
}
