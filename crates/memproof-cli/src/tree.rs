//! # Tree Subcommand
//!
//! Commitment trees for any number of owners, persisted in one JSON state
//! file. Each invocation loads the file into a [`TreeRegistry`], applies
//! one operation and writes the file back atomically.
//!
//! Commitments are caller strings: decimal field elements are used as is,
//! anything else (a hex digest, a record id) is hashed onto the field.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};

use memproof_core::persist::{read_json, write_json};
use memproof_core::FieldElement;
use memproof_crypto::smt::DEFAULT_DEPTH;
use memproof_crypto::{Hasher, MerkleProof, TreeRegistry, TreeState};

/// Owner used when `--owner` is omitted.
pub const DEFAULT_OWNER: &str = "default";

/// On-disk registry snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryFile {
    /// Depth of every tree.
    pub depth: u8,
    /// One snapshot per owner.
    pub owners: BTreeMap<String, TreeState>,
}

/// Arguments for the `memproof tree` subcommand.
#[derive(Args, Debug)]
pub struct TreeArgs {
    #[command(subcommand)]
    pub command: TreeCommand,
}

/// Tree subcommands.
#[derive(Subcommand, Debug)]
pub enum TreeCommand {
    /// Create an empty state file.
    Init {
        /// State file to create.
        #[arg(long)]
        state: PathBuf,
        /// Tree depth (capacity 2^depth per owner).
        #[arg(long, default_value_t = DEFAULT_DEPTH)]
        depth: u8,
        /// Overwrite an existing state file.
        #[arg(long)]
        force: bool,
    },

    /// Append commitments to an owner's tree.
    Insert {
        /// State file.
        #[arg(long)]
        state: PathBuf,
        /// Tree owner.
        #[arg(long, default_value = DEFAULT_OWNER)]
        owner: String,
        /// Commitments, in insertion order.
        #[arg(required = true, value_name = "COMMITMENT")]
        commitments: Vec<String>,
    },

    /// Replace a commitment with its revocation marker.
    Revoke {
        /// State file.
        #[arg(long)]
        state: PathBuf,
        /// Tree owner.
        #[arg(long, default_value = DEFAULT_OWNER)]
        owner: String,
        /// Commitment to revoke.
        #[arg(value_name = "COMMITMENT")]
        commitment: String,
    },

    /// Print an inclusion proof.
    Prove {
        /// State file.
        #[arg(long)]
        state: PathBuf,
        /// Tree owner.
        #[arg(long, default_value = DEFAULT_OWNER)]
        owner: String,
        /// Commitment to prove.
        #[arg(value_name = "COMMITMENT")]
        commitment: String,
        /// Write the proof here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Check an inclusion proof file. Needs no state.
    Verify {
        /// Proof file.
        #[arg(long)]
        proof: PathBuf,
        /// Expected root; defaults to the root inside the proof.
        #[arg(long)]
        root: Option<String>,
    },

    /// Print an owner's current root.
    Root {
        /// State file.
        #[arg(long)]
        state: PathBuf,
        /// Tree owner.
        #[arg(long, default_value = DEFAULT_OWNER)]
        owner: String,
    },

    /// Print totals across owners.
    Stats {
        /// State file.
        #[arg(long)]
        state: PathBuf,
    },
}

/// Execute the tree subcommand.
pub fn run_tree(args: &TreeArgs) -> Result<u8> {
    let hasher = Hasher::initialize().context("failed to initialize Poseidon")?;

    match &args.command {
        TreeCommand::Init {
            state,
            depth,
            force,
        } => cmd_init(&hasher, state, *depth, *force),

        TreeCommand::Insert {
            state,
            owner,
            commitments,
        } => {
            let registry = load(&hasher, state)?;
            let leaves: Vec<FieldElement> =
                commitments.iter().map(|c| FieldElement::encode_str(c)).collect();
            let result = registry.insert_batch(owner, leaves);
            // Persist whatever was committed, even on a partial failure.
            save(&registry, state)?;
            let outcomes = result.context("insert failed")?;
            for (c, o) in commitments.iter().zip(&outcomes) {
                println!("OK: inserted {c} at index {} root={}", o.index, o.new_root);
            }
            Ok(0)
        }

        TreeCommand::Revoke {
            state,
            owner,
            commitment,
        } => {
            let registry = load(&hasher, state)?;
            let out = registry
                .revoke(owner, &FieldElement::encode_str(commitment))
                .context("revoke failed")?;
            save(&registry, state)?;
            println!(
                "OK: revoked index {} marker={} root={}",
                out.index, out.marker, out.new_root
            );
            Ok(0)
        }

        TreeCommand::Prove {
            state,
            owner,
            commitment,
            out,
        } => {
            let registry = load(&hasher, state)?;
            let proof = registry
                .generate_proof(owner, &FieldElement::encode_str(commitment))
                .context("no proof")?;
            crate::emit(&proof, out.as_deref())?;
            Ok(0)
        }

        TreeCommand::Verify { proof, root } => {
            let proof: MerkleProof = read_json(proof)
                .with_context(|| format!("failed to read proof {}", proof.display()))?;
            let expected = match root {
                Some(r) => FieldElement::parse(r).context("invalid --root")?,
                None => proof.root,
            };
            if proof.verify_against(&hasher, &expected) {
                println!("OK: proof valid for leaf index {} root={expected}", proof.leaf_index);
                Ok(0)
            } else {
                println!("INVALID: proof does not reach root={expected}");
                Ok(1)
            }
        }

        TreeCommand::Root { state, owner } => {
            let registry = load(&hasher, state)?;
            if !registry.has_owner(owner) {
                bail!("no tree for owner {owner:?}");
            }
            println!("{}", registry.get_root(owner)?);
            Ok(0)
        }

        TreeCommand::Stats { state } => {
            let registry = load(&hasher, state)?;
            crate::emit(&registry.stats(), None)?;
            Ok(0)
        }
    }
}

fn cmd_init(hasher: &Hasher, state: &Path, depth: u8, force: bool) -> Result<u8> {
    if state.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", state.display());
    }
    let registry = TreeRegistry::new(hasher.clone(), depth).context("invalid depth")?;
    save(&registry, state)?;
    println!("OK: initialized {} depth={depth}", state.display());
    Ok(0)
}

/// Load a state file into a registry.
pub fn load(hasher: &Hasher, path: &Path) -> Result<TreeRegistry> {
    let file: RegistryFile =
        read_json(path).with_context(|| format!("failed to read state {}", path.display()))?;
    let registry = TreeRegistry::new(hasher.clone(), file.depth)?;
    for (owner, state) in &file.owners {
        registry
            .import_tree(owner, state)
            .with_context(|| format!("corrupt tree for owner {owner:?}"))?;
    }
    Ok(registry)
}

/// Write a registry back to its state file.
pub fn save(registry: &TreeRegistry, path: &Path) -> Result<()> {
    let owners = registry
        .owners()
        .into_iter()
        .filter_map(|o| registry.export_tree(&o).map(|s| (o, s)))
        .collect();
    let file = RegistryFile {
        depth: registry.depth(),
        owners,
    };
    write_json(path, &file).with_context(|| format!("failed to write state {}", path.display()))
}
