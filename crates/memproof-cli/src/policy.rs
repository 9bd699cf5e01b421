//! # Policy Subcommand
//!
//! Proves the access predicate for a request file and verifies stored
//! results. The engine is bootstrapped from [`EngineConfig`], so circuit
//! resolution and the proof policy follow the same environment variables
//! as an embedding service.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use memproof_core::persist::read_json;
use memproof_zkp::{EngineConfig, ProofContext, ProofResult, ProveInput};

/// Arguments for the `memproof policy` subcommand.
#[derive(Args, Debug)]
pub struct PolicyArgs {
    #[command(subcommand)]
    pub command: PolicyCommand,
}

/// Policy subcommands.
#[derive(Subcommand, Debug)]
pub enum PolicyCommand {
    /// Prove a request and print the result.
    Prove {
        /// Request JSON (camelCase `ProveInput`).
        #[arg(long)]
        input: PathBuf,
        /// Write the result here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Exit with 1 when the proof is simulated.
        #[arg(long)]
        require_real: bool,
    },

    /// Verify a result produced by `policy prove`.
    Verify {
        /// Result JSON.
        #[arg(long)]
        result: PathBuf,
    },
}

/// Execute the policy subcommand.
pub fn run_policy(args: &PolicyArgs, config: &EngineConfig) -> Result<u8> {
    match &args.command {
        PolicyCommand::Prove {
            input,
            out,
            require_real,
        } => cmd_prove(config, input, out.as_deref(), *require_real),
        PolicyCommand::Verify { result } => cmd_verify(config, result),
    }
}

fn cmd_prove(
    config: &EngineConfig,
    input: &Path,
    out: Option<&Path>,
    require_real: bool,
) -> Result<u8> {
    let request: ProveInput = read_json(input)
        .with_context(|| format!("failed to read request {}", input.display()))?;
    let ctx = ProofContext::bootstrap(config).context("engine bootstrap failed")?;

    let result = ctx.prover.prove(&request);
    let meta = result.metadata();
    tracing::info!(
        is_real_proof = meta.is_real_proof,
        backend = meta.backend.name(),
        allowed = result.outcome().allowed_for_agent,
        "policy proof produced"
    );
    crate::emit(&result, out)?;

    if require_real && !meta.is_real_proof {
        tracing::error!("proof is simulated and --require-real was given");
        return Ok(1);
    }
    Ok(0)
}

fn cmd_verify(config: &EngineConfig, path: &Path) -> Result<u8> {
    let result: ProofResult = read_json(path)
        .with_context(|| format!("failed to read result {}", path.display()))?;
    let ctx = ProofContext::bootstrap(config).context("engine bootstrap failed")?;

    let verdict = ctx.verifier.verify_result(&result);
    crate::emit(&verdict, None)?;
    Ok(if verdict.valid { 0 } else { 1 })
}
