//! # Sparse Merkle Tree
//!
//! A fixed-depth binary Poseidon tree that accumulates one owner's
//! commitments. Leaves are appended left to right; empty subtrees are never
//! materialized and are represented by per-level zero hashes:
//!
//! ```text
//! zero[0] = 0
//! zero[i] = Poseidon(zero[i-1], zero[i-1])
//! ```
//!
//! ## Invariants
//!
//! - `root == nodes[(depth, 0)]` once anything was inserted, else
//!   `root == zero[depth]`.
//! - `0 <= next_index <= 2^depth`.
//! - Folding any leaf with its authentication path (absent siblings read
//!   as the level's zero hash) reproduces `root`.
//! - Every mutation computes the full leaf-to-root path before writing, so
//!   an error leaves the tree untouched.
//!
//! ## Revocation
//!
//! [`SparseMerkleTree::update_leaf`] swaps a leaf in place. Replacing a
//! commitment with its revocation marker makes the old commitment
//! unprovable while size and capacity stay the same.

use std::collections::{BTreeMap, HashMap};

use memproof_core::FieldElement;
use serde::{Deserialize, Serialize};

use crate::error::{BatchInsertError, TreeError};
use crate::poseidon::Hasher;

/// Depth used when the caller does not choose one (~1M leaves).
pub const DEFAULT_DEPTH: u8 = 20;

/// Largest supported depth.
pub const MAX_DEPTH: u8 = 32;

/// Result of a successful insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOutcome {
    /// Slot the leaf was written to.
    pub index: u64,
    /// Root before the insert.
    pub old_root: FieldElement,
    /// Root after the insert.
    pub new_root: FieldElement,
}

/// Result of a successful in-place leaf replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    /// Slot that was rewritten.
    pub index: u64,
    /// Root before the update.
    pub old_root: FieldElement,
    /// Root after the update.
    pub new_root: FieldElement,
}

/// Inclusion proof for one leaf against one root.
///
/// Self-contained: verification needs only the proof and a hasher, never
/// the tree that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleProof {
    /// The proven leaf.
    pub leaf: FieldElement,
    /// Slot of the leaf.
    pub leaf_index: u64,
    /// Sibling hashes, leaf level first.
    pub siblings: Vec<FieldElement>,
    /// Position of the path node at each level: `0` left child, `1` right child.
    pub path_indices: Vec<u8>,
    /// Root the proof claims membership in.
    pub root: FieldElement,
}

impl MerkleProof {
    /// Recompute the root from the leaf and the path.
    ///
    /// Returns `None` for a structurally malformed proof: mismatched
    /// lengths, a depth above [`MAX_DEPTH`], a path bit other than `0`/`1`,
    /// or path bits that disagree with `leaf_index`.
    pub fn compute_root(&self, hasher: &Hasher) -> Option<FieldElement> {
        let depth = self.siblings.len();
        if depth != self.path_indices.len() || depth > MAX_DEPTH as usize {
            return None;
        }
        if depth < 64 && self.leaf_index >> depth != 0 {
            return None;
        }

        let mut current = self.leaf;
        for (level, (sibling, bit)) in self.siblings.iter().zip(&self.path_indices).enumerate() {
            if u64::from(*bit) != (self.leaf_index >> level) & 1 {
                return None;
            }
            current = match bit {
                0 => hasher.hash2(&current, sibling).ok()?,
                1 => hasher.hash2(sibling, &current).ok()?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Whether the path folds to [`MerkleProof::root`].
    ///
    /// Pure: any party holding the proof and the expected root can check it.
    pub fn verify(&self, hasher: &Hasher) -> bool {
        self.compute_root(hasher) == Some(self.root)
    }

    /// Whether the path folds to `expected_root`, ignoring the root the
    /// proof carries.
    pub fn verify_against(&self, hasher: &Hasher, expected_root: &FieldElement) -> bool {
        self.compute_root(hasher).as_ref() == Some(expected_root)
    }
}

/// Textual snapshot of a tree.
///
/// Large integers are decimal strings; nodes are keyed `"level-index"`.
///
/// ```json
/// {"depth":4,"nextIndex":"1","root":"…","leaves":[["…","0"]],
///  "nodes":[["0-0","…"],…],"zeroHashes":["0",…]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeState {
    /// Tree depth.
    pub depth: u8,
    /// Next free slot.
    pub next_index: String,
    /// Current root.
    pub root: FieldElement,
    /// `[leaf, index]` pairs in slot order.
    pub leaves: Vec<(FieldElement, String)>,
    /// `["level-index", hash]` pairs in (level, index) order.
    pub nodes: Vec<(String, FieldElement)>,
    /// One zero hash per level, `0..=depth`.
    pub zero_hashes: Vec<FieldElement>,
}

/// One owner's commitment accumulator.
#[derive(Debug, Clone)]
pub struct SparseMerkleTree {
    hasher: Hasher,
    depth: u8,
    next_index: u64,
    root: FieldElement,
    leaves: HashMap<FieldElement, u64>,
    nodes: BTreeMap<(u8, u64), FieldElement>,
    zero_hashes: Vec<FieldElement>,
}

/// Node writes for one leaf-to-root path, plus the resulting root.
type PathUpdate = (Vec<((u8, u64), FieldElement)>, FieldElement);

impl SparseMerkleTree {
    /// Create an empty tree of the given depth.
    ///
    /// # Errors
    ///
    /// [`TreeError::InvalidDepth`] unless `1 <= depth <= 32`.
    pub fn new(hasher: Hasher, depth: u8) -> Result<Self, TreeError> {
        if depth == 0 || depth > MAX_DEPTH {
            return Err(TreeError::InvalidDepth(depth));
        }
        let zero_hashes = compute_zero_hashes(&hasher, depth)?;
        let root = zero_hashes[depth as usize];
        Ok(Self {
            hasher,
            depth,
            next_index: 0,
            root,
            leaves: HashMap::new(),
            nodes: BTreeMap::new(),
            zero_hashes,
        })
    }

    /// Create an empty tree of [`DEFAULT_DEPTH`].
    pub fn with_default_depth(hasher: Hasher) -> Result<Self, TreeError> {
        Self::new(hasher, DEFAULT_DEPTH)
    }

    /// Current root.
    pub fn root(&self) -> FieldElement {
        self.root
    }

    /// Tree depth.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Number of occupied slots.
    pub fn len(&self) -> u64 {
        self.next_index
    }

    /// Whether no leaf was ever inserted.
    pub fn is_empty(&self) -> bool {
        self.next_index == 0
    }

    /// Total slots, `2^depth`.
    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    /// Whether every slot is occupied.
    pub fn is_full(&self) -> bool {
        self.next_index == self.capacity()
    }

    /// Whether `leaf` is currently in the tree.
    pub fn contains(&self, leaf: &FieldElement) -> bool {
        self.leaves.contains_key(leaf)
    }

    /// Slot of `leaf`, if present.
    pub fn index_of(&self, leaf: &FieldElement) -> Option<u64> {
        self.leaves.get(leaf).copied()
    }

    /// The zero hash of each level, `0..=depth`.
    pub fn zero_hashes(&self) -> &[FieldElement] {
        &self.zero_hashes
    }

    /// The hasher this tree was built with.
    pub fn hasher(&self) -> &Hasher {
        &self.hasher
    }

    /// Append `leaf` at the next free slot.
    ///
    /// # Errors
    ///
    /// [`TreeError::CapacityExceeded`] when full, [`TreeError::DuplicateLeaf`]
    /// when `leaf` is already present. Both are checked before any write.
    pub fn insert(&mut self, leaf: FieldElement) -> Result<InsertOutcome, TreeError> {
        if self.is_full() {
            return Err(TreeError::CapacityExceeded {
                capacity: self.capacity(),
            });
        }
        if self.leaves.contains_key(&leaf) {
            return Err(TreeError::DuplicateLeaf(leaf.to_decimal()));
        }

        let index = self.next_index;
        let (updates, new_root) = self.compute_path(index, leaf)?;

        let old_root = self.root;
        self.apply_path(updates, new_root);
        self.leaves.insert(leaf, index);
        self.next_index += 1;

        Ok(InsertOutcome {
            index,
            old_root,
            new_root,
        })
    }

    /// Insert leaves one after another.
    ///
    /// Not atomic: on failure the leaves before the failing one stay
    /// committed, and [`BatchInsertError::committed`] says how many. Take a
    /// [`snapshot`](Self::snapshot) first if the batch must be all or
    /// nothing.
    pub fn insert_batch<I>(&mut self, leaves: I) -> Result<Vec<InsertOutcome>, BatchInsertError>
    where
        I: IntoIterator<Item = FieldElement>,
    {
        let mut outcomes = Vec::new();
        for leaf in leaves {
            match self.insert(leaf) {
                Ok(outcome) => outcomes.push(outcome),
                Err(source) => {
                    return Err(BatchInsertError {
                        committed: outcomes.len(),
                        source,
                    })
                }
            }
        }
        Ok(outcomes)
    }

    /// Build the inclusion proof for `leaf` against the current root.
    ///
    /// # Errors
    ///
    /// [`TreeError::LeafNotFound`] if `leaf` is not in the tree.
    pub fn generate_proof(&self, leaf: &FieldElement) -> Result<MerkleProof, TreeError> {
        let leaf_index = self
            .index_of(leaf)
            .ok_or_else(|| TreeError::LeafNotFound(leaf.to_decimal()))?;

        let mut siblings = Vec::with_capacity(self.depth as usize);
        let mut path_indices = Vec::with_capacity(self.depth as usize);
        let mut index = leaf_index;
        for level in 0..self.depth {
            path_indices.push((index & 1) as u8);
            siblings.push(self.node_or_zero(level, index ^ 1));
            index >>= 1;
        }

        Ok(MerkleProof {
            leaf: *leaf,
            leaf_index,
            siblings,
            path_indices,
            root: self.root,
        })
    }

    /// Check a proof against this tree's hasher. The proof's own root is
    /// used; no tree state is read.
    pub fn verify_proof(&self, proof: &MerkleProof) -> bool {
        proof.verify(&self.hasher)
    }

    /// Replace `old_leaf` with `new_leaf` in the same slot.
    ///
    /// # Errors
    ///
    /// [`TreeError::LeafNotFound`] if `old_leaf` is absent,
    /// [`TreeError::AlreadyExists`] if `new_leaf` is already present.
    pub fn update_leaf(
        &mut self,
        old_leaf: &FieldElement,
        new_leaf: FieldElement,
    ) -> Result<UpdateOutcome, TreeError> {
        let index = self
            .index_of(old_leaf)
            .ok_or_else(|| TreeError::LeafNotFound(old_leaf.to_decimal()))?;
        if self.leaves.contains_key(&new_leaf) {
            return Err(TreeError::AlreadyExists(new_leaf.to_decimal()));
        }

        let (updates, new_root) = self.compute_path(index, new_leaf)?;

        let old_root = self.root;
        self.apply_path(updates, new_root);
        self.leaves.remove(old_leaf);
        self.leaves.insert(new_leaf, index);

        Ok(UpdateOutcome {
            index,
            old_root,
            new_root,
        })
    }

    /// Serialize the whole state.
    pub fn snapshot(&self) -> TreeState {
        let mut leaves: Vec<(FieldElement, u64)> =
            self.leaves.iter().map(|(leaf, idx)| (*leaf, *idx)).collect();
        leaves.sort_by_key(|(_, idx)| *idx);

        TreeState {
            depth: self.depth,
            next_index: self.next_index.to_string(),
            root: self.root,
            leaves: leaves
                .into_iter()
                .map(|(leaf, idx)| (leaf, idx.to_string()))
                .collect(),
            nodes: self
                .nodes
                .iter()
                .map(|((level, idx), hash)| (format!("{level}-{idx}"), *hash))
                .collect(),
            zero_hashes: self.zero_hashes.clone(),
        }
    }

    /// Rebuild a tree from a snapshot.
    ///
    /// The snapshot's zero hashes are recomputed with `hasher`, so a state
    /// written with a different hash primitive is rejected rather than
    /// silently producing proofs that never verify. Every node is then
    /// rehashed from the leaves; the stored node map and root must match
    /// the rebuilt ones exactly.
    ///
    /// # Errors
    ///
    /// [`TreeError::InvalidDepth`] or [`TreeError::CorruptState`].
    pub fn from_state(hasher: Hasher, state: &TreeState) -> Result<Self, TreeError> {
        let mut tree = Self::new(hasher, state.depth)?;

        if state.zero_hashes != tree.zero_hashes {
            return Err(corrupt("zero hashes do not match the hash primitive"));
        }

        let next_index: u64 = state
            .next_index
            .parse()
            .map_err(|_| corrupt(format!("invalid nextIndex {:?}", state.next_index)))?;
        if next_index > tree.capacity() {
            return Err(corrupt(format!(
                "nextIndex {next_index} exceeds capacity {}",
                tree.capacity()
            )));
        }

        let mut stored = BTreeMap::new();
        for (key, hash) in &state.nodes {
            let (level, idx) = parse_node_key(key)?;
            if level > state.depth || idx >= 1u64 << (state.depth - level) {
                return Err(corrupt(format!("node key {key:?} outside the tree")));
            }
            if stored.insert((level, idx), *hash).is_some() {
                return Err(corrupt(format!("duplicate node key {key:?}")));
            }
        }

        let mut slots = BTreeMap::new();
        for (leaf, idx) in &state.leaves {
            let idx: u64 = idx
                .parse()
                .map_err(|_| corrupt(format!("invalid leaf index {idx:?}")))?;
            if idx >= next_index || slots.insert(idx, *leaf).is_some() {
                return Err(corrupt(format!("leaf index {idx} is out of order")));
            }
        }
        if slots.len() as u64 != next_index {
            return Err(corrupt(format!(
                "{} leaves recorded but nextIndex is {next_index}",
                slots.len()
            )));
        }

        // Slots are exactly 0..next_index, so replaying them in order
        // rebuilds every node.
        for (idx, leaf) in slots {
            if tree.leaves.insert(leaf, idx).is_some() {
                return Err(corrupt(format!("duplicate leaf {leaf}")));
            }
            let (updates, new_root) = tree.compute_path(idx, leaf)?;
            tree.apply_path(updates, new_root);
        }
        tree.next_index = next_index;

        if let Some(((level, idx), _)) = tree
            .nodes
            .iter()
            .find(|(key, hash)| stored.get(*key) != Some(*hash))
        {
            return Err(corrupt(format!(
                "node {level}-{idx} does not match the hash of its children"
            )));
        }
        if stored.len() != tree.nodes.len() {
            return Err(corrupt("node map holds nodes outside the populated range"));
        }
        if tree.root != state.root {
            return Err(corrupt("root does not match the leaves"));
        }

        Ok(tree)
    }

    fn node_or_zero(&self, level: u8, index: u64) -> FieldElement {
        self.nodes
            .get(&(level, index))
            .copied()
            .unwrap_or(self.zero_hashes[level as usize])
    }

    /// Hash `leaf` up from slot `index` without writing anything.
    fn compute_path(&self, index: u64, leaf: FieldElement) -> Result<PathUpdate, TreeError> {
        let mut updates = Vec::with_capacity(self.depth as usize + 1);
        updates.push(((0, index), leaf));

        let mut current = leaf;
        let mut idx = index;
        for level in 0..self.depth {
            let sibling = self.node_or_zero(level, idx ^ 1);
            current = if idx & 1 == 1 {
                self.hasher.hash2(&sibling, &current)?
            } else {
                self.hasher.hash2(&current, &sibling)?
            };
            idx >>= 1;
            updates.push(((level + 1, idx), current));
        }
        Ok((updates, current))
    }

    fn apply_path(&mut self, updates: Vec<((u8, u64), FieldElement)>, new_root: FieldElement) {
        self.nodes.extend(updates);
        self.root = new_root;
    }
}

fn compute_zero_hashes(hasher: &Hasher, depth: u8) -> Result<Vec<FieldElement>, TreeError> {
    let mut zeros = Vec::with_capacity(depth as usize + 1);
    zeros.push(FieldElement::zero());
    for level in 1..=depth as usize {
        let below = zeros[level - 1];
        zeros.push(hasher.hash2(&below, &below)?);
    }
    Ok(zeros)
}

fn parse_node_key(key: &str) -> Result<(u8, u64), TreeError> {
    let (level, idx) = key
        .split_once('-')
        .ok_or_else(|| corrupt(format!("invalid node key {key:?}")))?;
    let level = level
        .parse()
        .map_err(|_| corrupt(format!("invalid node level in {key:?}")))?;
    let idx = idx
        .parse()
        .map_err(|_| corrupt(format!("invalid node index in {key:?}")))?;
    Ok((level, idx))
}

fn corrupt(msg: impl Into<String>) -> TreeError {
    TreeError::CorruptState(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hasher() -> Hasher {
        Hasher::initialize().unwrap()
    }

    fn leaf(s: &str) -> FieldElement {
        FieldElement::encode_str(s)
    }

    fn tree(depth: u8) -> SparseMerkleTree {
        SparseMerkleTree::new(hasher(), depth).unwrap()
    }

    #[test]
    fn rejects_out_of_range_depth() {
        assert_eq!(
            SparseMerkleTree::new(hasher(), 0).unwrap_err(),
            TreeError::InvalidDepth(0)
        );
        assert_eq!(
            SparseMerkleTree::new(hasher(), 33).unwrap_err(),
            TreeError::InvalidDepth(33)
        );
    }

    #[test]
    fn empty_root_is_top_zero_hash() {
        let h = hasher();
        let t = SparseMerkleTree::new(h.clone(), 3).unwrap();
        let z1 = h.hash2(&FieldElement::zero(), &FieldElement::zero()).unwrap();
        let z2 = h.hash2(&z1, &z1).unwrap();
        let z3 = h.hash2(&z2, &z2).unwrap();
        assert_eq!(t.zero_hashes(), &[FieldElement::zero(), z1, z2, z3]);
        assert_eq!(t.root(), z3);
        assert!(t.is_empty());
    }

    #[test]
    fn default_depth_is_twenty() {
        let t = SparseMerkleTree::with_default_depth(hasher()).unwrap();
        assert_eq!(t.depth(), 20);
        assert_eq!(t.capacity(), 1 << 20);
    }

    #[test]
    fn insert_matches_hand_computed_root() {
        let h = hasher();
        let mut t = SparseMerkleTree::new(h.clone(), 2).unwrap();
        let a = leaf("a");
        let b = leaf("b");
        t.insert(a).unwrap();
        let out = t.insert(b).unwrap();

        let z1 = h.hash2(&FieldElement::zero(), &FieldElement::zero()).unwrap();
        let ab = h.hash2(&a, &b).unwrap();
        let expected = h.hash2(&ab, &z1).unwrap();
        assert_eq!(out.new_root, expected);
        assert_eq!(t.root(), expected);
        assert_eq!(out.index, 1);
    }

    #[test]
    fn insert_reports_old_and_new_root() {
        let mut t = tree(4);
        let before = t.root();
        let out = t.insert(leaf("a")).unwrap();
        assert_eq!(out.old_root, before);
        assert_eq!(out.new_root, t.root());
        assert_ne!(out.old_root, out.new_root);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn duplicate_leaf_is_rejected_without_mutation() {
        let mut t = tree(4);
        t.insert(leaf("a")).unwrap();
        let root = t.root();
        let err = t.insert(leaf("a")).unwrap_err();
        assert!(matches!(err, TreeError::DuplicateLeaf(_)));
        assert_eq!(t.root(), root);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn fills_to_capacity_then_fails() {
        let mut t = tree(3);
        for i in 0..8 {
            t.insert(FieldElement::from_u64(i + 1)).unwrap();
        }
        assert!(t.is_full());
        let root = t.root();
        assert_eq!(
            t.insert(FieldElement::from_u64(100)).unwrap_err(),
            TreeError::CapacityExceeded { capacity: 8 }
        );
        assert_eq!(t.root(), root);
        for i in 0..8 {
            let p = t.generate_proof(&FieldElement::from_u64(i + 1)).unwrap();
            assert!(t.verify_proof(&p));
        }
    }

    #[test]
    fn proof_shape_follows_leaf_index() {
        let mut t = tree(4);
        for s in ["a", "b", "c", "d", "e", "f"] {
            t.insert(leaf(s)).unwrap();
        }
        let p = t.generate_proof(&leaf("f")).unwrap();
        assert_eq!(p.leaf_index, 5);
        assert_eq!(p.path_indices, vec![1, 0, 1, 0]);
        assert_eq!(p.siblings.len(), 4);
        assert_eq!(p.siblings[0], leaf("e"));
        assert_eq!(p.siblings[3], t.zero_hashes()[3]);
        assert!(t.verify_proof(&p));
    }

    #[test]
    fn missing_leaf_has_no_proof() {
        let t = tree(4);
        assert!(matches!(
            t.generate_proof(&leaf("ghost")),
            Err(TreeError::LeafNotFound(_))
        ));
    }

    #[test]
    fn tampered_proofs_fail() {
        let h = hasher();
        let mut t = SparseMerkleTree::new(h.clone(), 4).unwrap();
        t.insert(leaf("a")).unwrap();
        t.insert(leaf("b")).unwrap();
        let proof = t.generate_proof(&leaf("a")).unwrap();
        assert!(proof.verify(&h));

        for level in 0..proof.siblings.len() {
            let mut bad = proof.clone();
            bad.siblings[level] = FieldElement::from_u64(12345);
            assert!(!bad.verify(&h), "sibling {level} tamper accepted");
        }

        let mut bad_root = proof.clone();
        bad_root.root = FieldElement::from_u64(1);
        assert!(!bad_root.verify(&h));

        let mut flipped = proof.clone();
        flipped.path_indices[0] = 1;
        assert!(!flipped.verify(&h));

        let mut wrong_leaf = proof.clone();
        wrong_leaf.leaf = leaf("b");
        assert!(!wrong_leaf.verify(&h));
    }

    #[test]
    fn malformed_proofs_fail_closed() {
        let h = hasher();
        let mut t = SparseMerkleTree::new(h.clone(), 4).unwrap();
        t.insert(leaf("a")).unwrap();
        let proof = t.generate_proof(&leaf("a")).unwrap();

        let mut short = proof.clone();
        short.siblings.pop();
        assert!(!short.verify(&h));

        let mut bad_bit = proof.clone();
        bad_bit.path_indices[2] = 2;
        assert!(!bad_bit.verify(&h));

        let mut bad_index = proof.clone();
        bad_index.leaf_index = 16;
        assert!(!bad_index.verify(&h));
    }

    #[test]
    fn proofs_go_stale_after_later_inserts() {
        let h = hasher();
        let mut t = SparseMerkleTree::new(h.clone(), 4).unwrap();
        t.insert(leaf("a")).unwrap();
        let old = t.generate_proof(&leaf("a")).unwrap();
        t.insert(leaf("b")).unwrap();

        assert!(old.verify(&h));
        assert!(!old.verify_against(&h, &t.root()));
        assert!(t.generate_proof(&leaf("a")).unwrap().verify_against(&h, &t.root()));
    }

    #[test]
    fn update_leaf_swaps_in_place() {
        let h = hasher();
        let mut t = SparseMerkleTree::new(h.clone(), 4).unwrap();
        t.insert(leaf("a")).unwrap();
        t.insert(leaf("b")).unwrap();
        let old_proof = t.generate_proof(&leaf("a")).unwrap();

        let marker = h.revocation_marker(&leaf("a")).unwrap();
        let out = t.update_leaf(&leaf("a"), marker).unwrap();

        assert_eq!(out.index, 0);
        assert_ne!(out.old_root, out.new_root);
        assert_eq!(t.len(), 2);
        assert!(!t.contains(&leaf("a")));
        assert!(!old_proof.verify_against(&h, &t.root()));
        assert!(matches!(
            t.generate_proof(&leaf("a")),
            Err(TreeError::LeafNotFound(_))
        ));
        let fresh = t.generate_proof(&marker).unwrap();
        assert_eq!(fresh.leaf_index, 0);
        assert!(fresh.verify_against(&h, &t.root()));
        assert!(t.generate_proof(&leaf("b")).unwrap().verify(&h));
    }

    #[test]
    fn update_leaf_error_paths() {
        let mut t = tree(4);
        t.insert(leaf("a")).unwrap();
        t.insert(leaf("b")).unwrap();
        let root = t.root();
        assert!(matches!(
            t.update_leaf(&leaf("zzz"), leaf("c")),
            Err(TreeError::LeafNotFound(_))
        ));
        assert!(matches!(
            t.update_leaf(&leaf("a"), leaf("b")),
            Err(TreeError::AlreadyExists(_))
        ));
        assert_eq!(t.root(), root);
    }

    #[test]
    fn batch_insert_is_not_atomic() {
        let mut t = tree(4);
        let err = t
            .insert_batch(vec![leaf("a"), leaf("b"), leaf("a"), leaf("c")])
            .unwrap_err();
        assert_eq!(err.committed, 2);
        assert!(matches!(err.source, TreeError::DuplicateLeaf(_)));
        assert_eq!(t.len(), 2);
        assert!(!t.contains(&leaf("c")));
    }

    #[test]
    fn batch_insert_returns_every_outcome() {
        let mut t = tree(4);
        let outs = t.insert_batch(["x", "y", "z"].map(leaf)).unwrap();
        assert_eq!(outs.len(), 3);
        assert_eq!(outs[2].new_root, t.root());
        assert_eq!(outs[1].new_root, outs[2].old_root);
    }

    #[test]
    fn snapshot_restores_identical_tree() {
        let h = hasher();
        let mut t = SparseMerkleTree::new(h.clone(), 5).unwrap();
        for s in ["a", "b", "c"] {
            t.insert(leaf(s)).unwrap();
        }
        let marker = h.revocation_marker(&leaf("b")).unwrap();
        t.update_leaf(&leaf("b"), marker).unwrap();

        let json = serde_json::to_string(&t.snapshot()).unwrap();
        let state: TreeState = serde_json::from_str(&json).unwrap();
        let mut restored = SparseMerkleTree::from_state(h.clone(), &state).unwrap();

        assert_eq!(restored.root(), t.root());
        assert_eq!(restored.len(), 3);
        assert_eq!(
            restored.generate_proof(&leaf("c")).unwrap(),
            t.generate_proof(&leaf("c")).unwrap()
        );
        let a = restored.insert(leaf("d")).unwrap();
        let b = t.insert(leaf("d")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn snapshot_wire_format_uses_strings() {
        let mut t = tree(2);
        t.insert(FieldElement::from_u64(7)).unwrap();
        let value = serde_json::to_value(t.snapshot()).unwrap();
        assert_eq!(value["depth"], 2);
        assert_eq!(value["nextIndex"], "1");
        assert_eq!(value["leaves"][0][0], "7");
        assert_eq!(value["leaves"][0][1], "0");
        assert_eq!(value["nodes"][0][0], "0-0");
        assert_eq!(value["zeroHashes"][0], "0");
        assert_eq!(value["zeroHashes"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn corrupt_states_are_rejected() {
        let h = hasher();
        let mut t = SparseMerkleTree::new(h.clone(), 3).unwrap();
        t.insert(leaf("a")).unwrap();
        let good = t.snapshot();

        let mut bad_root = good.clone();
        bad_root.root = FieldElement::from_u64(3);
        assert!(matches!(
            SparseMerkleTree::from_state(h.clone(), &bad_root),
            Err(TreeError::CorruptState(_))
        ));

        let mut bad_count = good.clone();
        bad_count.next_index = "2".into();
        assert!(matches!(
            SparseMerkleTree::from_state(h.clone(), &bad_count),
            Err(TreeError::CorruptState(_))
        ));

        let mut bad_key = good.clone();
        bad_key.nodes[0].0 = "zero".into();
        assert!(matches!(
            SparseMerkleTree::from_state(h.clone(), &bad_key),
            Err(TreeError::CorruptState(_))
        ));

        let mut bad_zero = good;
        bad_zero.zero_hashes[1] = FieldElement::from_u64(1);
        assert!(matches!(
            SparseMerkleTree::from_state(h, &bad_zero),
            Err(TreeError::CorruptState(_))
        ));
    }

    fn with_node(state: &TreeState, key: &str, hash: FieldElement) -> TreeState {
        let mut out = state.clone();
        match out.nodes.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = hash,
            None => out.nodes.push((key.to_string(), hash)),
        }
        out
    }

    #[test]
    fn internal_nodes_are_rehashed_on_restore() {
        let h = hasher();
        let mut t = SparseMerkleTree::new(h.clone(), 3).unwrap();
        for s in ["a", "b", "c", "d"] {
            t.insert(leaf(s)).unwrap();
        }
        let good = t.snapshot();
        assert!(SparseMerkleTree::from_state(h.clone(), &good).is_ok());

        let stale = with_node(&good, "1-1", FieldElement::from_u64(42));
        assert!(matches!(
            SparseMerkleTree::from_state(h.clone(), &stale),
            Err(TreeError::CorruptState(_))
        ));

        let stray = with_node(&good, "1-3", FieldElement::from_u64(42));
        assert!(matches!(
            SparseMerkleTree::from_state(h.clone(), &stray),
            Err(TreeError::CorruptState(_))
        ));

        let mut missing = good.clone();
        missing.nodes.retain(|(k, _)| k != "2-0");
        assert!(matches!(
            SparseMerkleTree::from_state(h, &missing),
            Err(TreeError::CorruptState(_))
        ));
    }

    #[test]
    fn restore_after_revocation_keeps_proofs_valid() {
        let h = hasher();
        let mut t = SparseMerkleTree::new(h.clone(), 3).unwrap();
        for s in ["a", "b", "c"] {
            t.insert(leaf(s)).unwrap();
        }
        let marker = h.revocation_marker(&leaf("b")).unwrap();
        t.update_leaf(&leaf("b"), marker).unwrap();

        let restored = SparseMerkleTree::from_state(h.clone(), &t.snapshot()).unwrap();
        assert_eq!(restored.root(), t.root());
        for l in [leaf("a"), marker, leaf("c")] {
            assert!(restored.generate_proof(&l).unwrap().verify(&h));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn every_inserted_leaf_proves_against_current_root(
            values in proptest::collection::hash_set(any::<u64>(), 1..24)
        ) {
            let h = hasher();
            let mut t = SparseMerkleTree::new(h.clone(), 5).unwrap();
            let leaves: Vec<FieldElement> = values.into_iter().map(FieldElement::from_u64).collect();
            for l in &leaves {
                t.insert(*l).unwrap();
            }
            for l in &leaves {
                let proof = t.generate_proof(l).unwrap();
                prop_assert!(proof.verify_against(&h, &t.root()));
            }
        }
    }
}
