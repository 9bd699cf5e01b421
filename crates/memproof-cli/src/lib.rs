//! # memproof-cli: CLI Tool for memproof
//!
//! Provides the `memproof` command-line interface.
//!
//! ## Subcommands
//!
//! - `memproof tree`: per-owner commitment trees stored in a JSON state file.
//! - `memproof policy`: prove and verify the access predicate.
//! - `memproof circuits`: show which circuit triads are installed.
//!
//! ```bash
//! memproof tree init --state trees.json --depth 20
//! memproof tree insert --state trees.json --owner alice 0xabc123
//! memproof tree prove --state trees.json --owner alice 0xabc123 > proof.json
//! memproof tree verify --proof proof.json
//! memproof policy prove --input request.json > result.json
//! memproof policy verify --result result.json
//! ```
//!
//! Commands return an exit code: `0` for success or a valid proof, `1` for
//! an invalid proof or any error.

pub mod circuits;
pub mod policy;
pub mod tree;

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

/// Print `value` as pretty JSON to stdout, or write it to `out`.
pub fn emit<T: Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => memproof_core::persist::write_json(path, value)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            println!("{}", serde_json::to_string_pretty(value)?);
            Ok(())
        }
    }
}
