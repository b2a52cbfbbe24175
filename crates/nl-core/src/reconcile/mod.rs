//! Label reconcile loop.
//!
//! One cycle fetches the node, recomputes the labels it should carry and
//! patches it only when something changed. Cycles are driven by a jittered
//! resync timer and by configuration changes; both enqueue the node on a
//! deduplicating queue drained by a fixed pool of workers.
//!
//! ```text
//!  timer ─┐
//!         ├─> WorkQueue ──> worker ──> execute() ──> NodeClient::patch_labels
//!  config ┘        ^                       │
//!                  └── add_rate_limited ───┘ (on error)
//! ```

pub mod queue;
pub mod rate_limit;
pub mod timer;

use crate::capabilities::{CapabilitySource, DerivedCapabilities};
use crate::events::{EventRecorder, NodeEvent, TracingRecorder};
use crate::labels::{build_labels, merge_labels};
use crate::node::{LabelPatch, NodeClient};
use crate::probe::{RealtimeCheck, StaticRealtime};
use nl_common::labels::SKIP_NODE_ANNOTATION;
use nl_common::{ManagedLabels, NodeName};
use nl_config::{ClusterConfig, ReconcileConfig};
use queue::WorkQueue;
use rate_limit::RetryLimiter;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// What a single cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// The skip annotation is set; labels left alone.
    Skipped,
    /// Labels already matched; no write.
    Unchanged,
    /// A patch was applied.
    Patched,
}

/// Keeps one node's managed labels in line with the host's capabilities.
pub struct NodeLabeller {
    node: NodeName,
    client: Arc<dyn NodeClient>,
    capabilities: Mutex<Box<dyn CapabilitySource>>,
    realtime: Arc<dyn RealtimeCheck>,
    cluster: Arc<ClusterConfig>,
    recorder: Arc<dyn EventRecorder>,
    managed: ManagedLabels,
    queue: Arc<WorkQueue<NodeName>>,
    interval: Duration,
    jitter_factor: f64,
}

impl NodeLabeller {
    pub fn new(
        node: NodeName,
        client: Arc<dyn NodeClient>,
        capabilities: Box<dyn CapabilitySource>,
        cluster: Arc<ClusterConfig>,
    ) -> Self {
        let config = ReconcileConfig::default();
        Self {
            node,
            client,
            capabilities: Mutex::new(capabilities),
            realtime: Arc::new(StaticRealtime(false)),
            cluster,
            recorder: Arc::new(TracingRecorder),
            managed: ManagedLabels::new(),
            queue: WorkQueue::new(RetryLimiter::from_config(&config)),
            interval: Duration::from_secs(config.interval_secs),
            jitter_factor: config.jitter_factor,
        }
    }

    pub fn with_realtime(mut self, realtime: Arc<dyn RealtimeCheck>) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn EventRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Apply timer and retry settings. Replaces the work queue.
    pub fn with_reconcile_config(mut self, config: &ReconcileConfig) -> Self {
        self.queue = WorkQueue::new(RetryLimiter::from_config(config));
        self.interval = Duration::from_secs(config.interval_secs);
        self.jitter_factor = config.jitter_factor;
        self
    }

    pub fn node(&self) -> &NodeName {
        &self.node
    }

    pub fn queue(&self) -> &Arc<WorkQueue<NodeName>> {
        &self.queue
    }

    fn load_capabilities(&self) -> Result<DerivedCapabilities, nl_common::Error> {
        let mut source = self
            .capabilities
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        source.load().map_err(Into::into)
    }

    /// Run one reconcile cycle for the node.
    pub async fn execute(&self) -> Result<CycleOutcome, nl_common::Error> {
        let original = self.client.get_node(&self.node).await?;

        let skipped = original.has_annotation(SKIP_NODE_ANNOTATION);
        let updated = if skipped {
            debug!(node = %self.node, "skip annotation set, leaving labels untouched");
            original.labels.clone()
        } else {
            let derived = self.load_capabilities()?;
            let obsolete = self.cluster.obsolete_models();
            let realtime = self.realtime.is_realtime_capable().await;
            let output = build_labels(&derived, &obsolete, realtime);
            for advisory in output.advisories {
                self.recorder
                    .record(NodeEvent::new(self.node.as_str(), advisory));
            }
            merge_labels(&original.labels, &output.labels, &self.managed)
        };

        let patch = LabelPatch::new(original.labels, updated);
        if patch.is_noop() {
            debug!(node = %self.node, "labels already converged");
            return Ok(if skipped {
                CycleOutcome::Skipped
            } else {
                CycleOutcome::Unchanged
            });
        }

        let added = patch
            .updated
            .keys()
            .filter(|k| !patch.original.contains_key(*k))
            .count();
        let removed = patch
            .original
            .keys()
            .filter(|k| !patch.updated.contains_key(*k))
            .count();
        self.client.patch_labels(&self.node, &patch).await?;
        info!(node = %self.node, added, removed, "node labels updated");
        Ok(CycleOutcome::Patched)
    }

    /// Take one key off the queue and reconcile it. Returns `false` once the
    /// queue has shut down.
    pub async fn process_next(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };

        match self.execute().await {
            Ok(outcome) => {
                debug!(node = %key, ?outcome, "reconcile cycle finished");
                self.queue.forget(&key);
            }
            Err(e) => {
                error!(
                    node = %key,
                    error = %e,
                    code = e.code(),
                    retryable = e.is_retryable(),
                    retries = self.queue.num_requeues(&key),
                    "reconcile failed, requeueing"
                );
                self.queue.add_rate_limited(key.clone());
            }
        }

        self.queue.done(&key);
        true
    }

    fn log_startup_facts(&self) {
        match self.load_capabilities() {
            Ok(derived) if derived.tsc.is_none() => {
                info!(node = %self.node, "host has no tsc counter, continuing without tsc frequency label");
            }
            Ok(_) => {}
            Err(e) => warn!(node = %self.node, error = %e, "initial capability load failed"),
        }
    }

    /// Run the loop with `threadiness` workers until `stop` turns true.
    ///
    /// Returns after the in-flight cycles finish.
    pub async fn run(self: Arc<Self>, threadiness: usize, mut stop: watch::Receiver<bool>) {
        info!(node = %self.node, workers = threadiness, "starting node labeller");
        self.log_startup_facts();

        let timer = {
            let queue = Arc::clone(&self.queue);
            let node = self.node.clone();
            tokio::spawn(timer::run_jittered(
                self.interval,
                self.jitter_factor,
                stop.clone(),
                move || queue.add(node.clone()),
            ))
        };

        let watcher = {
            let queue = Arc::clone(&self.queue);
            let node = self.node.clone();
            let mut changes = self.cluster.subscribe();
            let mut stop = stop.clone();
            tokio::spawn(async move {
                loop {
                    if *stop.borrow() {
                        return;
                    }
                    tokio::select! {
                        changed = changes.changed() => {
                            if changed.is_err() {
                                return;
                            }
                            debug!(node = %node, "cluster configuration changed");
                            queue.add(node.clone());
                        }
                        changed = stop.changed() => {
                            if changed.is_err() || *stop.borrow() {
                                return;
                            }
                        }
                    }
                }
            })
        };

        let workers: Vec<_> = (0..threadiness.max(1))
            .map(|_| {
                let labeller = Arc::clone(&self);
                tokio::spawn(async move { while labeller.process_next().await {} })
            })
            .collect();

        while !*stop.borrow() {
            if stop.changed().await.is_err() {
                break;
            }
        }

        info!(node = %self.node, "stopping node labeller");
        self.queue.shutdown();
        for handle in workers.into_iter().chain([timer, watcher]) {
            if let Err(e) = handle.await {
                error!(error = %e, "labeller task panicked");
            }
        }
    }
}
