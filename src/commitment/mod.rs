//! Secret commitment scheme authorizing fills
//!
//! Two variants, selected per order:
//! - Single hash lock: the order commits to `keccak256(secret)`; exactly one
//!   fill can ever open it.
//! - Merkle partial fill: the order commits to a root over
//!   `keccak256(secret_i)` leaves, one secret per slice. A fill presents its
//!   slice secret plus an inclusion proof.
//!
//! Internal nodes hash their children in sorted order, so proofs are
//! independent of sibling position and reproducible across implementations.
//! One-time use of each secret is enforced by the per-order registry, checked
//! and updated inside the matching engine's critical section.

use crate::chain::Secret;
use crate::error::{ResolverError, ResolverResult};

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::collections::HashSet;

/// A 32-byte Keccak-256 digest
pub type Hash32 = [u8; 32];

/// Sibling hashes proving a leaf's inclusion under a Merkle root
pub type MerkleProof = Vec<Hash32>;

/// Keccak-256 of arbitrary bytes
pub fn keccak256(data: &[u8]) -> Hash32 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash an internal node from two children in canonical sorted order
fn hash_pair(a: &Hash32, b: &Hash32) -> Hash32 {
    let mut hasher = Keccak256::new();
    if a <= b {
        hasher.update(a);
        hasher.update(b);
    } else {
        hasher.update(b);
        hasher.update(a);
    }
    hasher.finalize().into()
}

/// Per-order commitment, exactly one variant by construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Commitment {
    /// Single-secret order: `keccak256(secret)`
    HashLock(Hash32),
    /// Partial-fill order: root over per-slice secret hashes
    MerkleRoot(Hash32),
}

impl Commitment {
    /// Validate the secret (and proof, for Merkle orders) against this
    /// commitment. Returns the leaf digest that the caller must record in the
    /// order's secret registry on acceptance.
    pub fn authorize(
        &self,
        secret: &Secret,
        proof: Option<&MerkleProof>,
    ) -> ResolverResult<Hash32> {
        let leaf = keccak256(secret);
        match self {
            Commitment::HashLock(lock) => {
                if leaf != *lock {
                    return Err(ResolverError::InvalidSecret);
                }
                Ok(leaf)
            }
            Commitment::MerkleRoot(root) => {
                let proof = proof.ok_or(ResolverError::InvalidSecret)?;
                if !verify_merkle_proof(&leaf, proof, root) {
                    return Err(ResolverError::InvalidSecret);
                }
                Ok(leaf)
            }
        }
    }

    /// The hash lock a swap escrow is keyed to for a fill of this order.
    /// For Merkle orders each slice escrow locks to its own leaf.
    pub fn slice_lock(&self, leaf: Hash32) -> Hash32 {
        match self {
            Commitment::HashLock(lock) => *lock,
            Commitment::MerkleRoot(_) => leaf,
        }
    }
}

/// Verify an inclusion proof by folding sibling hashes up to the root
pub fn verify_merkle_proof(leaf: &Hash32, proof: &MerkleProof, root: &Hash32) -> bool {
    let mut computed = *leaf;
    for sibling in proof {
        computed = hash_pair(&computed, sibling);
    }
    computed == *root
}

/// Append-only set of consumed secret digests for one order
#[derive(Debug, Default, Clone)]
pub struct SecretRegistry {
    used: HashSet<Hash32>,
}

impl SecretRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a digest, rejecting reuse. Membership is permanent.
    pub fn consume(&mut self, digest: Hash32) -> ResolverResult<()> {
        if !self.used.insert(digest) {
            return Err(ResolverError::SecretAlreadyUsed);
        }
        Ok(())
    }

    pub fn contains(&self, digest: &Hash32) -> bool {
        self.used.contains(digest)
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

/// Merkle tree over pre-committed slice secrets
///
/// Built by resolvers (and makers) that manage partial-fill orders; produces
/// the root the order commits to and the inclusion proof each fill presents.
pub struct MerkleTree {
    layers: Vec<Vec<Hash32>>,
}

impl MerkleTree {
    /// Build a tree with `keccak256(secret_i)` leaves
    pub fn from_secrets(secrets: &[Secret]) -> ResolverResult<Self> {
        if secrets.is_empty() {
            return Err(ResolverError::InvalidOrder(
                "Merkle order requires at least one slice secret".to_string(),
            ));
        }
        let leaves: Vec<Hash32> = secrets.iter().map(|s| keccak256(s)).collect();
        Ok(Self::from_leaves(leaves))
    }

    fn from_leaves(leaves: Vec<Hash32>) -> Self {
        let mut layers = vec![leaves];
        while layers.last().map(|l| l.len()).unwrap_or(0) > 1 {
            let prev = layers.last().unwrap();
            let mut next = Vec::with_capacity((prev.len() + 1) / 2);
            for pair in prev.chunks(2) {
                match pair {
                    [a, b] => next.push(hash_pair(a, b)),
                    // Odd node is carried up unhashed
                    [a] => next.push(*a),
                    _ => unreachable!(),
                }
            }
            layers.push(next);
        }
        Self { layers }
    }

    pub fn root(&self) -> Hash32 {
        self.layers.last().unwrap()[0]
    }

    pub fn leaf_count(&self) -> usize {
        self.layers[0].len()
    }

    /// Inclusion proof for the leaf at `index`
    pub fn proof(&self, index: usize) -> ResolverResult<MerkleProof> {
        if index >= self.leaf_count() {
            return Err(ResolverError::Internal(format!(
                "leaf index {} out of range ({} leaves)",
                index,
                self.leaf_count()
            )));
        }

        let mut proof = Vec::new();
        let mut idx = index;
        for layer in &self.layers[..self.layers.len() - 1] {
            let sibling = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
            if sibling < layer.len() {
                proof.push(layer[sibling]);
            }
            idx /= 2;
        }
        Ok(proof)
    }
}
