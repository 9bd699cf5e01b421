//! # memproof CLI entry point
//!
//! Parses command-line arguments, loads the engine configuration and
//! dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use memproof_cli::circuits::{run_circuits, CircuitsArgs};
use memproof_cli::policy::{run_policy, PolicyArgs};
use memproof_cli::tree::{run_tree, TreeArgs};
use memproof_zkp::{EngineConfig, ProofPolicy};

/// memproof: commitment trees and policy proofs for agent memory.
///
/// Engine settings come from `MEMPROOF_*` environment variables; the
/// global flags below override them.
#[derive(Parser, Debug)]
#[command(name = "memproof", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Root holding `v1/` and `v2/` circuit artifacts.
    #[arg(long, global = true)]
    circuits_dir: Option<PathBuf>,

    /// Proof policy: `production` or `development`.
    #[arg(long, global = true)]
    proof_policy: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Per-owner commitment trees (init, insert, revoke, prove, verify).
    Tree(TreeArgs),

    /// Prove or verify the memory access policy.
    Policy(PolicyArgs),

    /// Show installed circuit artifacts and the selected mode.
    Circuits(CircuitsArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    // Logs go to stderr; stdout carries JSON output.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = engine_config(&cli).and_then(|config| {
        tracing::debug!(
            circuits_dir = %config.circuits_dir.display(),
            tree_depth = config.tree_depth,
            "configuration loaded"
        );
        match &cli.command {
            Commands::Tree(args) => run_tree(args),
            Commands::Policy(args) => run_policy(args, &config),
            Commands::Circuits(args) => run_circuits(args, &config),
        }
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn engine_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = EngineConfig::from_env().context("invalid MEMPROOF_* environment")?;
    if let Some(dir) = &cli.circuits_dir {
        config.circuits_dir = dir.clone();
    }
    if let Some(raw) = &cli.proof_policy {
        let policy = ProofPolicy::parse(raw).ok_or_else(|| anyhow!("unknown proof policy {raw:?}"))?;
        config = config.with_proof_policy(policy);
    }
    Ok(config)
}
