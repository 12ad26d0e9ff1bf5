//! Breadth-first ancestry walking over commit parent sets.
//!
//! `is_ancestor` answers "is `candidate` reachable by following `parents`
//! edges starting at `descendant`?" one generation at a time: all commits at
//! distance 1 are checked before any commit at distance 2 is fetched. This
//! keeps memory proportional to the width of a single generation rather
//! than the full history, and lets a fast-forward check on a deep, narrow
//! history terminate quickly without walking every ancestor.
use crate::Error;
use async_trait::async_trait;
use chunk_store::Hash;
use noms_values::{ParentSet, ValueType};
use std::collections::HashSet;

/// Returns `true` if `target_type` is registered under the same descriptor
/// as [`ValueType::Commit`].
///
/// Every ref the ancestry walker follows is supposed to point at a commit,
/// but `target_type` is deserialized straight off an untrusted chunk's bytes
/// — nothing upstream of here guarantees it. Checking through the registry
/// (rather than a plain `==`) is what makes that guarantee an actual type
/// check against the same descriptors [`crate::DataStore::write_value`]
/// assigns, instead of a structural coincidence of two enums matching.
fn is_commit_ref_type(target_type: &ValueType) -> bool {
    match (
        noms_values::types::descriptor_of(ValueType::Commit),
        noms_values::types::descriptor_of(target_type.clone()),
    ) {
        (Some(commit), Some(found)) => commit.hash == found.hash,
        _ => false,
    }
}

/// A source of commit parent sets, abstracted so the walker can be tested
/// without a full [`crate::DataStore`].
#[async_trait]
pub trait CommitSource: Send + Sync {
    /// Returns the parent set of the commit at `hash`.
    async fn parents_of(&self, hash: Hash) -> Result<ParentSet, Error>;
}

/// Returns whether `candidate` is `descendant` itself or one of its
/// ancestors, reachable by following `parents` edges.
///
/// Walks the commit graph one generation at a time (BFS), so that `render`
/// order never depends on which sibling branch happens to be visited first
/// — a property the original spec's fast-forward check depends on for
/// determinism. A commit already visited in an earlier generation is never
/// re-fetched, even if reachable via more than one path (merge commits).
pub async fn is_ancestor<S: CommitSource>(
    source: &S,
    candidate: Hash,
    descendant: Hash,
) -> Result<bool, Error> {
    if candidate == descendant {
        return Ok(true);
    }

    let mut visited: HashSet<Hash> = HashSet::new();
    visited.insert(descendant);

    let frontier = source.parents_of(descendant).await?;
    is_ancestor_of_frontier(source, candidate, frontier, visited).await
}

/// Like [`is_ancestor`], but starting the walk from an already-known
/// `frontier` of parents rather than fetching the parents of a descendant
/// hash.
///
/// Used by the commit protocol to check whether a not-yet-written commit
/// (whose parent set is already in memory, since the caller is the one
/// constructing it) descends from a given existing head, without first
/// having to write that commit just to look its parents back up.
pub async fn is_ancestor_of_frontier<S: CommitSource>(
    source: &S,
    candidate: Hash,
    mut frontier: ParentSet,
    mut visited: HashSet<Hash>,
) -> Result<bool, Error> {
    loop {
        if frontier.is_empty() {
            return Ok(false);
        }
        for r in frontier.iter() {
            if !is_commit_ref_type(&r.target_type) {
                return Err(Error::TypeMismatch {
                    expected: ValueType::Commit,
                    found: r.target_type.clone(),
                });
            }
        }
        if frontier.iter().any(|r| r.target_hash == candidate) {
            return Ok(true);
        }

        let mut next = ParentSet::new();
        for r in frontier.iter() {
            if visited.insert(r.target_hash) {
                let parents = source.parents_of(r.target_hash).await?;
                next = next.union(parents);
            }
        }
        frontier = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noms_values::RefValue;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    struct FakeGraph {
        parents: Mutex<HashMap<Hash, ParentSet>>,
    }

    impl FakeGraph {
        fn new() -> Self {
            Self {
                parents: Mutex::new(HashMap::new()),
            }
        }

        async fn set_parents(&self, commit: Hash, parents: Vec<Hash>) {
            let set: ParentSet = parents.into_iter().map(RefValue::to_commit).collect();
            self.parents.lock().await.insert(commit, set);
        }

        async fn set_parents_raw(&self, commit: Hash, parents: ParentSet) {
            self.parents.lock().await.insert(commit, parents);
        }
    }

    #[async_trait]
    impl CommitSource for FakeGraph {
        async fn parents_of(&self, hash: Hash) -> Result<ParentSet, Error> {
            Ok(self
                .parents
                .lock()
                .await
                .get(&hash)
                .cloned()
                .unwrap_or_default())
        }
    }

    fn h(label: &str) -> Hash {
        Hash::of_bytes(label.as_bytes())
    }

    #[tokio::test]
    async fn a_commit_is_its_own_ancestor() {
        let graph = FakeGraph::new();
        let c = h("c");
        assert!(is_ancestor(&graph, c, c).await.unwrap());
    }

    #[tokio::test]
    async fn direct_parent_is_an_ancestor() {
        let graph = FakeGraph::new();
        let (root, child) = (h("root"), h("child"));
        graph.set_parents(child, vec![root]).await;
        assert!(is_ancestor(&graph, root, child).await.unwrap());
    }

    #[tokio::test]
    async fn unrelated_commit_is_not_an_ancestor() {
        let graph = FakeGraph::new();
        let (root, other) = (h("root"), h("other"));
        assert!(!is_ancestor(&graph, other, root).await.unwrap());
    }

    #[tokio::test]
    async fn deep_chain_is_walked_generation_by_generation() {
        let graph = FakeGraph::new();
        let gen0 = h("gen0");
        let gen1 = h("gen1");
        let gen2 = h("gen2");
        let gen3 = h("gen3");
        graph.set_parents(gen1, vec![gen0]).await;
        graph.set_parents(gen2, vec![gen1]).await;
        graph.set_parents(gen3, vec![gen2]).await;

        assert!(is_ancestor(&graph, gen0, gen3).await.unwrap());
        assert!(!is_ancestor(&graph, gen3, gen0).await.unwrap());
    }

    #[tokio::test]
    async fn merge_commit_sees_ancestor_through_either_parent() {
        let graph = FakeGraph::new();
        let root = h("root");
        let left = h("left");
        let right = h("right");
        let merge = h("merge");
        graph.set_parents(left, vec![root]).await;
        graph.set_parents(right, vec![root]).await;
        graph.set_parents(merge, vec![left, right]).await;

        assert!(is_ancestor(&graph, root, merge).await.unwrap());
        assert!(is_ancestor(&graph, left, merge).await.unwrap());
        assert!(is_ancestor(&graph, right, merge).await.unwrap());
    }

    #[tokio::test]
    async fn shared_ancestor_reached_through_two_paths_is_fetched_once() {
        // Both `left` and `right` share `root` as a parent; the walker must
        // not choke on visiting `root` twice in the same generation.
        let graph = FakeGraph::new();
        let root = h("root");
        let left = h("left");
        let right = h("right");
        let merge = h("merge");
        graph.set_parents(left, vec![root]).await;
        graph.set_parents(right, vec![root]).await;
        graph.set_parents(merge, vec![left, right]).await;

        assert!(is_ancestor(&graph, root, merge).await.unwrap());
    }

    #[tokio::test]
    async fn a_parent_ref_whose_declared_type_is_not_commit_is_rejected() {
        let graph = FakeGraph::new();
        let (root, child) = (h("root"), h("child"));
        let bad_parent = RefValue {
            target_hash: root,
            target_type: ValueType::String,
        };
        let parents: ParentSet = std::iter::once(bad_parent).collect();
        graph.set_parents_raw(child, parents).await;

        let err = is_ancestor(&graph, root, child).await.unwrap_err();
        match err {
            Error::TypeMismatch { expected, found } => {
                assert_eq!(expected, ValueType::Commit);
                assert_eq!(found, ValueType::String);
            }
            other => panic!("expected TypeMismatch, got {:?}", other),
        }
    }
}
