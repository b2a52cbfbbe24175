//! File-backed node store.
//!
//! Holds one node as a JSON document. Writes go through a temporary file in
//! the same directory followed by a rename, so readers never observe a
//! partially written node.

use super::{apply_patch, LabelPatch, NodeClient, NodeError, NodeSnapshot};
use async_trait::async_trait;
use nl_common::NodeName;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug)]
pub struct FileNodeStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileNodeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self, name: &NodeName) -> Result<NodeSnapshot, NodeError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(NodeError::NotFound {
                    node: name.to_string(),
                })
            }
            Err(e) => {
                return Err(NodeError::Fetch(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        let node: NodeSnapshot = serde_json::from_str(&content)
            .map_err(|e| NodeError::Fetch(format!("{}: {}", self.path.display(), e)))?;
        if &node.name != name {
            return Err(NodeError::NotFound {
                node: name.to_string(),
            });
        }
        Ok(node)
    }

    /// Write `node` atomically.
    pub fn write(&self, node: &NodeSnapshot) -> Result<(), NodeError> {
        let write_err = |e: std::io::Error| NodeError::Write(format!("{}: {}", self.path.display(), e));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let file = File::create(&temp_path).map_err(write_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, node)
            .map_err(|e| NodeError::Write(e.to_string()))?;
        writer.flush().map_err(write_err)?;
        fs::rename(&temp_path, &self.path).map_err(write_err)?;
        debug!(path = %self.path.display(), node = %node.name, "node file written");
        Ok(())
    }
}

#[async_trait]
impl NodeClient for FileNodeStore {
    async fn get_node(&self, name: &NodeName) -> Result<NodeSnapshot, NodeError> {
        self.read(name)
    }

    async fn patch_labels(&self, name: &NodeName, patch: &LabelPatch) -> Result<(), NodeError> {
        let _guard = self.write_lock.lock().await;
        let mut node = self.read(name)?;
        apply_patch(&mut node, patch)?;
        self.write(&node)
    }
}
