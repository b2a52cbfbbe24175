//! In-memory node store.

use super::{apply_patch, LabelPatch, NodeClient, NodeError, NodeSnapshot};
use async_trait::async_trait;
use nl_common::NodeName;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Node store held in process memory.
///
/// Counts every successful patch and can be told to fail the next few
/// fetches or patches, which makes it suitable for exercising retry paths.
#[derive(Debug, Default)]
pub struct InMemoryNodeStore {
    nodes: Mutex<BTreeMap<NodeName, NodeSnapshot>>,
    patches: AtomicUsize,
    fail_gets: AtomicUsize,
    fail_patches: AtomicUsize,
}

impl InMemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(self, node: NodeSnapshot) -> Self {
        self.insert(node);
        self
    }

    fn nodes(&self) -> MutexGuard<'_, BTreeMap<NodeName, NodeSnapshot>> {
        self.nodes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, node: NodeSnapshot) {
        self.nodes().insert(node.name.clone(), node);
    }

    pub fn node(&self, name: &NodeName) -> Option<NodeSnapshot> {
        self.nodes().get(name).cloned()
    }

    /// Mutate a stored node in place, as an external writer would.
    pub fn update<F: FnOnce(&mut NodeSnapshot)>(&self, name: &NodeName, f: F) -> bool {
        match self.nodes().get_mut(name) {
            Some(node) => {
                f(node);
                true
            }
            None => false,
        }
    }

    /// Number of patches that were applied.
    pub fn patch_count(&self) -> usize {
        self.patches.load(Ordering::SeqCst)
    }

    pub fn fail_next_gets(&self, count: usize) {
        self.fail_gets.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_patches(&self, count: usize) {
        self.fail_patches.store(count, Ordering::SeqCst);
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl NodeClient for InMemoryNodeStore {
    async fn get_node(&self, name: &NodeName) -> Result<NodeSnapshot, NodeError> {
        if Self::take_failure(&self.fail_gets) {
            return Err(NodeError::Fetch("injected fetch failure".to_string()));
        }
        self.node(name).ok_or_else(|| NodeError::NotFound {
            node: name.to_string(),
        })
    }

    async fn patch_labels(&self, name: &NodeName, patch: &LabelPatch) -> Result<(), NodeError> {
        if Self::take_failure(&self.fail_patches) {
            return Err(NodeError::Write("injected patch failure".to_string()));
        }
        let mut nodes = self.nodes();
        let node = nodes.get_mut(name).ok_or_else(|| NodeError::NotFound {
            node: name.to_string(),
        })?;
        apply_patch(node, patch)?;
        self.patches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_and_patch() {
        let store = InMemoryNodeStore::new().with_node(NodeSnapshot::new("node-a"));
        let name = NodeName::new("node-a");
        let node = store.get_node(&name).await.unwrap();

        let mut updated = node.labels.clone();
        updated.insert("k".to_string(), "v".to_string());
        store
            .patch_labels(&name, &LabelPatch::new(node.labels, updated))
            .await
            .unwrap();

        assert_eq!(store.patch_count(), 1);
        assert_eq!(store.node(&name).unwrap().labels["k"], "v");
    }

    #[tokio::test]
    async fn test_missing_node() {
        let store = InMemoryNodeStore::new();
        let err = store.get_node(&NodeName::new("ghost")).await.unwrap_err();
        assert!(matches!(err, NodeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_change_conflicts() {
        let store = InMemoryNodeStore::new().with_node(NodeSnapshot::new("node-a"));
        let name = NodeName::new("node-a");
        let node = store.get_node(&name).await.unwrap();

        store.update(&name, |n| {
            n.labels.insert("other".to_string(), "x".to_string());
        });

        let err = store
            .patch_labels(&name, &LabelPatch::new(node.labels, BTreeMap::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Conflict { .. }));
        assert_eq!(store.patch_count(), 0);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let store = InMemoryNodeStore::new().with_node(NodeSnapshot::new("node-a"));
        let name = NodeName::new("node-a");
        store.fail_next_gets(1);
        assert!(store.get_node(&name).await.is_err());
        assert!(store.get_node(&name).await.is_ok());
    }
}
