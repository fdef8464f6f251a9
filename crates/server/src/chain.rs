//! Commit chain reconstruction.
//!
//! Commits link `base_commit -> merged_commit`; the children of a commit
//! are the commits whose base hash equals its merged hash. Chains are
//! rebuilt frontier by frontier with an explicit visited set, so cyclic or
//! duplicated hash data terminates instead of recursing forever.

use corral_core::{MAX_CHAIN_DEPTH, MIN_HASH_PREFIX};
use corral_metadata::models::CommitRow;
use corral_metadata::{MetadataError, MetadataStore};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid chain seed: {0}")]
    InvalidSeed(String),

    #[error(transparent)]
    Store(#[from] MetadataError),
}

/// What to build the chain from.
#[derive(Debug, Clone)]
pub struct ChainSeed {
    /// Base hash prefix; at least [`MIN_HASH_PREFIX`] characters.
    pub base_prefix: Option<String>,
    /// Restrict matches to one repository. With no prefix, every root of
    /// the repository seeds its own tree.
    pub repo_id: Option<i64>,
    pub max_depth: Option<u32>,
}

/// One commit in a rebuilt chain, denormalized for display.
#[derive(Debug, Serialize)]
pub struct ChainNode {
    /// Short (7-char) base hash, or "root" for the synthetic root.
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub habitat_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suitability_score: Option<f64>,
    pub children: Vec<ChainNode>,
}

/// A rebuilt chain plus its aggregate metrics.
#[derive(Debug, Serialize)]
pub struct ChainTree {
    pub root: ChainNode,
    /// All nodes including the synthetic root.
    pub total_nodes: usize,
    pub chain_depth: usize,
    /// Commit nodes only.
    pub total_commit_nodes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Rebuild the chain for a seed.
pub async fn build_chain(
    store: &dyn MetadataStore,
    seed: &ChainSeed,
) -> Result<ChainTree, ChainError> {
    let max_depth = seed
        .max_depth
        .unwrap_or(MAX_CHAIN_DEPTH)
        .clamp(1, MAX_CHAIN_DEPTH) as usize;

    let seed_commits = match (&seed.base_prefix, seed.repo_id) {
        (Some(prefix), repo_id) => {
            let prefix = prefix.trim();
            if prefix.len() < MIN_HASH_PREFIX {
                return Err(ChainError::InvalidSeed(format!(
                    "hash prefix must be at least {MIN_HASH_PREFIX} characters"
                )));
            }
            if !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ChainError::InvalidSeed(
                    "hash prefix must be hexadecimal".to_string(),
                ));
            }
            let mut commits = store.find_by_base_prefix(prefix).await?;
            if let Some(repo_id) = repo_id {
                commits.retain(|c| c.repo_id == repo_id);
            }
            commits
        }
        (None, Some(repo_id)) => {
            let roots = store.list_root_hashes(repo_id).await?;
            store.list_by_base_in(&roots, Some(repo_id)).await?
        }
        (None, None) => {
            return Err(ChainError::InvalidSeed(
                "either a hash prefix or a repo id is required".to_string(),
            ));
        }
    };

    if seed_commits.is_empty() {
        return Ok(ChainTree {
            root: synthetic_root(Vec::new()),
            total_nodes: 1,
            chain_depth: 0,
            total_commit_nodes: 0,
            note: Some("no commits matched the seed".to_string()),
        });
    }

    // Level-by-level descent. `visited` holds commit ids already placed in
    // the tree; a hash cycle in the data ends the walk instead of looping.
    let mut visited: HashSet<i64> = seed_commits.iter().map(|c| c.id).collect();
    let mut levels: Vec<Vec<CommitRow>> = vec![seed_commits];
    let repo_filter = seed.repo_id;

    for _ in 1..max_depth {
        let frontier: Vec<String> = levels
            .last()
            .map(|level| level.iter().map(|c| c.merged_commit.clone()).collect())
            .unwrap_or_default();
        if frontier.is_empty() {
            break;
        }

        let mut next = store.list_by_base_in(&frontier, repo_filter).await?;
        next.retain(|c| visited.insert(c.id));
        if next.is_empty() {
            break;
        }
        levels.push(next);
    }

    // children keyed by the parent's merged hash, consumed bottom-up.
    let statuses = {
        let ids: Vec<i64> = levels.iter().flatten().map(|c| c.id).collect();
        store.get_statuses_batch(&ids).await?
    };

    let mut children_of: HashMap<String, Vec<ChainNode>> = HashMap::new();
    for level in levels.iter().skip(1).rev() {
        let mut grouped: HashMap<String, Vec<ChainNode>> = HashMap::new();
        for commit in level {
            let children = children_of.remove(&commit.merged_commit).unwrap_or_default();
            let status = statuses.get(&commit.id).map(|s| s.status.clone());
            grouped
                .entry(commit.base_commit.clone())
                .or_default()
                .push(commit_node(commit, status, children));
        }
        for (base, nodes) in grouped {
            children_of.entry(base).or_default().extend(nodes);
        }
    }

    let trees: Vec<ChainNode> = levels[0]
        .iter()
        .map(|commit| {
            let children = children_of.remove(&commit.merged_commit).unwrap_or_default();
            let status = statuses.get(&commit.id).map(|s| s.status.clone());
            commit_node(commit, status, children)
        })
        .collect();

    let root = synthetic_root(trees);
    let (total_nodes, chain_depth) = measure(&root);
    Ok(ChainTree {
        total_commit_nodes: total_nodes - 1,
        total_nodes,
        chain_depth,
        root,
        note: None,
    })
}

fn commit_node(commit: &CommitRow, status: Option<String>, children: Vec<ChainNode>) -> ChainNode {
    ChainNode {
        hash: short(&commit.base_commit),
        merged_hash: Some(short(&commit.merged_commit)),
        commit_id: Some(commit.id),
        status,
        habitat_score: Some(commit.habitat_score),
        difficulty_score: commit.difficulty_score,
        suitability_score: commit.suitability_score,
        children,
    }
}

fn synthetic_root(children: Vec<ChainNode>) -> ChainNode {
    ChainNode {
        hash: "root".to_string(),
        merged_hash: None,
        commit_id: None,
        status: None,
        habitat_score: None,
        difficulty_score: None,
        suitability_score: None,
        children,
    }
}

fn short(hash: &str) -> String {
    hash.chars().take(MIN_HASH_PREFIX).collect()
}

/// Post-order walk: (node count, depth below and including this node).
fn measure(node: &ChainNode) -> (usize, usize) {
    let mut total = 1;
    let mut depth = 0;
    for child in &node.children {
        let (child_total, child_depth) = measure(child);
        total += child_total;
        depth = depth.max(child_depth);
    }
    (total, depth + usize::from(node.commit_id.is_some()))
}
