//! Node resource access.
//!
//! The labeller reads a node's labels and annotations and writes labels back
//! through a conditional patch: the write only applies if the labels are
//! still exactly what was read.

mod file;
mod memory;

pub use file::FileNodeStore;
pub use memory::InMemoryNodeStore;

use async_trait::async_trait;
use nl_common::NodeName;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// JSON pointer of the label map inside a node resource.
pub const LABELS_PATH: &str = "/metadata/labels";

/// Node store failures. All of them are retried by the reconcile loop.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("node {node} not found")]
    NotFound { node: String },

    #[error("failed to fetch node: {0}")]
    Fetch(String),

    #[error("labels on node {node} changed since they were read")]
    Conflict { node: String },

    #[error("failed to patch node: {0}")]
    Write(String),
}

impl From<NodeError> for nl_common::Error {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::NotFound { node } => nl_common::Error::NodeNotFound { node },
            NodeError::Fetch(msg) => nl_common::Error::NodeFetch(msg),
            NodeError::Conflict { node } => nl_common::Error::NodeConflict { node },
            NodeError::Write(msg) => nl_common::Error::NodeWrite(msg),
        }
    }
}

/// The parts of a node resource the labeller reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: NodeName,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl NodeSnapshot {
    pub fn new(name: impl Into<NodeName>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn has_annotation(&self, key: &str) -> bool {
        self.annotations.contains_key(key)
    }
}

/// One RFC 6902 operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Test { path: String, value: Value },
    Replace { path: String, value: Value },
}

/// Compare-and-swap update of a node's label map.
///
/// Serializes as a JSON Patch document: a `test` of the original labels
/// followed by a `replace` with the updated ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "Vec<PatchOperation>")]
pub struct LabelPatch {
    pub original: BTreeMap<String, String>,
    pub updated: BTreeMap<String, String>,
}

impl LabelPatch {
    pub fn new(original: BTreeMap<String, String>, updated: BTreeMap<String, String>) -> Self {
        Self { original, updated }
    }

    /// Whether applying the patch would change anything.
    pub fn is_noop(&self) -> bool {
        self.original == self.updated
    }

    pub fn operations(&self) -> Vec<PatchOperation> {
        vec![
            PatchOperation::Test {
                path: LABELS_PATH.to_string(),
                value: labels_value(&self.original),
            },
            PatchOperation::Replace {
                path: LABELS_PATH.to_string(),
                value: labels_value(&self.updated),
            },
        ]
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<LabelPatch> for Vec<PatchOperation> {
    fn from(patch: LabelPatch) -> Self {
        patch.operations()
    }
}

fn labels_value(labels: &BTreeMap<String, String>) -> Value {
    Value::Object(
        labels
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// Orchestration client used to read and patch the node.
#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn get_node(&self, name: &NodeName) -> Result<NodeSnapshot, NodeError>;

    /// Apply `patch`; fails with [`NodeError::Conflict`] when the stored
    /// labels no longer equal `patch.original`.
    async fn patch_labels(&self, name: &NodeName, patch: &LabelPatch) -> Result<(), NodeError>;
}

/// Apply `patch` to a stored snapshot, enforcing the `test` operation.
pub(crate) fn apply_patch(node: &mut NodeSnapshot, patch: &LabelPatch) -> Result<(), NodeError> {
    if node.labels != patch.original {
        return Err(NodeError::Conflict {
            node: node.name.to_string(),
        });
    }
    node.labels = patch.updated.clone();
    Ok(())
}
