//! # Circuits Subcommand
//!
//! Reports which artifact triads are installed and which one the engine
//! would use.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use memproof_zkp::{CircuitArtifacts, CircuitMode, CircuitResolver, EngineConfig};

/// Arguments for the `memproof circuits` subcommand.
#[derive(Args, Debug)]
pub struct CircuitsArgs {
    /// Print JSON instead of a summary.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CircuitsReport {
    selected: CircuitMode,
    available: Vec<CircuitArtifacts>,
}

/// Execute the circuits subcommand. Always succeeds: a missing circuit
/// means simulated mode, not an error.
pub fn run_circuits(args: &CircuitsArgs, config: &EngineConfig) -> Result<u8> {
    let report = CircuitsReport {
        selected: CircuitResolver::resolve(&config.circuits_dir),
        available: CircuitResolver::available(&config.circuits_dir),
    };

    if args.json {
        crate::emit(&report, None)?;
        return Ok(0);
    }

    println!("circuits root: {}", config.circuits_dir.display());
    for a in &report.available {
        println!("  {}  {}", a.version, a.zkey.display());
    }
    if report.available.is_empty() {
        println!("  (no complete triads)");
    }
    println!("selected: {}", report.selected);
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_simulated_for_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::new(dir.path());
        assert_eq!(run_circuits(&CircuitsArgs { json: true }, &config).unwrap(), 0);
        assert_eq!(run_circuits(&CircuitsArgs { json: false }, &config).unwrap(), 0);
    }
}
