//! # Tree Registry
//!
//! One [`SparseMerkleTree`] per owner, created on first use.
//!
//! The registry map sits behind a `parking_lot::RwLock`; each owner's tree
//! sits behind its own `Arc<RwLock<_>>`. Mutations for one owner serialize
//! on that owner's lock while other owners proceed in parallel. Proof
//! generation and root reads take the read lock, so they see a consistent
//! tree and never interleave with a half-applied insert.
//!
//! No lock is held across an `.await`; callers in async code may use the
//! registry directly.

use std::collections::HashMap;
use std::sync::Arc;

use memproof_core::FieldElement;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{BatchInsertError, TreeError};
use crate::poseidon::Hasher;
use crate::smt::{InsertOutcome, MerkleProof, SparseMerkleTree, TreeState};

/// Shared handle to one owner's tree.
pub type SharedTree = Arc<RwLock<SparseMerkleTree>>;

/// Aggregate counters across all owners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    /// Owners with a tree.
    pub total_owners: usize,
    /// Occupied slots summed over every tree.
    pub total_leaves: u64,
    /// Depth of every tree in the registry.
    pub depth: u8,
}

/// Result of revoking a commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationOutcome {
    /// The leaf now occupying the revoked commitment's slot.
    pub marker: FieldElement,
    /// Slot of the revoked commitment.
    pub index: u64,
    /// Root before revocation.
    pub old_root: FieldElement,
    /// Root after revocation.
    pub new_root: FieldElement,
}

/// Lazily populated map from owner id to tree.
#[derive(Debug, Clone)]
pub struct TreeRegistry {
    hasher: Hasher,
    depth: u8,
    trees: Arc<RwLock<HashMap<String, SharedTree>>>,
}

impl TreeRegistry {
    /// Create an empty registry whose trees all have `depth`.
    ///
    /// The depth is validated here so a bad configuration fails at startup
    /// rather than on the first insert.
    pub fn new(hasher: Hasher, depth: u8) -> Result<Self, TreeError> {
        // Building one throwaway tree validates depth and exercises the hasher.
        SparseMerkleTree::new(hasher.clone(), depth)?;
        Ok(Self {
            hasher,
            depth,
            trees: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Depth of every tree in the registry.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// The owner's tree, created empty on first access.
    pub fn get_tree(&self, owner: &str) -> Result<SharedTree, TreeError> {
        if let Some(tree) = self.trees.read().get(owner) {
            return Ok(Arc::clone(tree));
        }

        let mut trees = self.trees.write();
        // Another writer may have created it between the two locks.
        if let Some(tree) = trees.get(owner) {
            return Ok(Arc::clone(tree));
        }
        let tree = Arc::new(RwLock::new(SparseMerkleTree::new(
            self.hasher.clone(),
            self.depth,
        )?));
        trees.insert(owner.to_string(), Arc::clone(&tree));
        tracing::debug!(owner, depth = self.depth, "created commitment tree");
        Ok(tree)
    }

    /// Whether `owner` has a tree yet. Never creates one.
    pub fn has_owner(&self, owner: &str) -> bool {
        self.trees.read().contains_key(owner)
    }

    /// Owner ids with a tree, sorted.
    pub fn owners(&self) -> Vec<String> {
        let mut owners: Vec<String> = self.trees.read().keys().cloned().collect();
        owners.sort();
        owners
    }

    /// Append a commitment to the owner's tree.
    pub fn insert_commitment(
        &self,
        owner: &str,
        commitment: FieldElement,
    ) -> Result<InsertOutcome, TreeError> {
        let tree = self.get_tree(owner)?;
        let outcome = tree.write().insert(commitment)?;
        tracing::info!(
            owner,
            index = outcome.index,
            root = %outcome.new_root,
            "commitment inserted"
        );
        Ok(outcome)
    }

    /// Append several commitments under one lock acquisition.
    ///
    /// Same partial-commit semantics as [`SparseMerkleTree::insert_batch`].
    pub fn insert_batch(
        &self,
        owner: &str,
        commitments: Vec<FieldElement>,
    ) -> Result<Vec<InsertOutcome>, BatchInsertError> {
        let tree = self
            .get_tree(owner)
            .map_err(|source| BatchInsertError {
                committed: 0,
                source,
            })?;
        let result = tree.write().insert_batch(commitments);
        match &result {
            Ok(outcomes) => {
                tracing::info!(owner, count = outcomes.len(), "commitment batch inserted")
            }
            Err(e) => tracing::warn!(
                owner,
                committed = e.committed,
                error = %e.source,
                "commitment batch stopped partway"
            ),
        }
        result
    }

    /// Replace `commitment` with its revocation marker.
    ///
    /// # Errors
    ///
    /// [`TreeError::LeafNotFound`] if the owner has no such commitment,
    /// including when the owner has no tree at all. A revoked commitment
    /// cannot be revoked twice.
    pub fn revoke(
        &self,
        owner: &str,
        commitment: &FieldElement,
    ) -> Result<RevocationOutcome, TreeError> {
        let tree = self
            .existing_tree(owner)
            .ok_or_else(|| TreeError::LeafNotFound(commitment.to_decimal()))?;
        let marker = self.hasher.revocation_marker(commitment)?;
        let outcome = tree.write().update_leaf(commitment, marker)?;
        tracing::info!(
            owner,
            index = outcome.index,
            root = %outcome.new_root,
            "commitment revoked"
        );
        Ok(RevocationOutcome {
            marker,
            index: outcome.index,
            old_root: outcome.old_root,
            new_root: outcome.new_root,
        })
    }

    /// Inclusion proof for `commitment` in the owner's tree.
    pub fn generate_proof(
        &self,
        owner: &str,
        commitment: &FieldElement,
    ) -> Result<MerkleProof, TreeError> {
        let tree = self
            .existing_tree(owner)
            .ok_or_else(|| TreeError::LeafNotFound(commitment.to_decimal()))?;
        let proof = tree.read().generate_proof(commitment)?;
        Ok(proof)
    }

    /// Current root of the owner's tree. An owner without a tree gets one.
    pub fn get_root(&self, owner: &str) -> Result<FieldElement, TreeError> {
        let tree = self.get_tree(owner)?;
        let root = tree.read().root();
        Ok(root)
    }

    /// Check a proof with the registry's hasher.
    pub fn verify_proof(&self, proof: &MerkleProof) -> bool {
        proof.verify(&self.hasher)
    }

    /// Totals across owners. Individual commitments are never exposed.
    pub fn stats(&self) -> RegistryStats {
        let trees = self.trees.read();
        RegistryStats {
            total_owners: trees.len(),
            total_leaves: trees.values().map(|t| t.read().len()).sum(),
            depth: self.depth,
        }
    }

    /// Snapshot of the owner's tree, if it exists.
    pub fn export_tree(&self, owner: &str) -> Option<TreeState> {
        self.existing_tree(owner).map(|t| t.read().snapshot())
    }

    /// Install `state` as the owner's tree, replacing any existing one.
    ///
    /// Also the restore half of snapshot/restore for callers that need an
    /// atomic batch.
    ///
    /// # Errors
    ///
    /// [`TreeError::CorruptState`] if the snapshot is inconsistent or its
    /// depth differs from the registry's.
    pub fn import_tree(&self, owner: &str, state: &TreeState) -> Result<(), TreeError> {
        if state.depth != self.depth {
            return Err(TreeError::CorruptState(format!(
                "snapshot depth {} does not match registry depth {}",
                state.depth, self.depth
            )));
        }
        let tree = SparseMerkleTree::from_state(self.hasher.clone(), state)?;
        let leaves = tree.len();
        self.trees
            .write()
            .insert(owner.to_string(), Arc::new(RwLock::new(tree)));
        tracing::info!(owner, leaves, "commitment tree imported");
        Ok(())
    }

    fn existing_tree(&self, owner: &str) -> Option<SharedTree> {
        self.trees.read().get(owner).cloned()
    }
}
