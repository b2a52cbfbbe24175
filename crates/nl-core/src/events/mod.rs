//! Node advisory events.
//!
//! The label builder returns advisories as plain values; the reconcile loop
//! stamps them with the node and time and hands them to an [`EventRecorder`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Standard advisory reasons.
pub mod reasons {
    pub const HOST_MODEL_IS_OBSOLETE: &str = "HostModelIsObsolete";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Normal,
    Warning,
}

/// An event the builder wants surfaced, before it is tied to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
}

impl Advisory {
    pub fn warning(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            event_type: EventType::Warning,
            reason: reason.into(),
            message: message.into(),
        }
    }

    /// The host CPU model is on the cluster's obsolete list.
    pub fn obsolete_host_model(model: &str, obsolete: &[&str]) -> Self {
        Self::warning(
            reasons::HOST_MODEL_IS_OBSOLETE,
            format!(
                "This node has {} host-model cpu that is included in ObsoleteCPUModels: {}",
                model,
                obsolete.join(", ")
            ),
        )
    }
}

/// An advisory attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEvent {
    pub id: Uuid,
    pub node: String,
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl NodeEvent {
    pub fn new(node: impl Into<String>, advisory: Advisory) -> Self {
        Self {
            id: Uuid::new_v4(),
            node: node.into(),
            event_type: advisory.event_type,
            reason: advisory.reason,
            message: advisory.message,
            timestamp: Utc::now(),
        }
    }
}

/// Sink for node events.
pub trait EventRecorder: Send + Sync {
    fn record(&self, event: NodeEvent);
}

/// Writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRecorder;

impl EventRecorder for TracingRecorder {
    fn record(&self, event: NodeEvent) {
        match event.event_type {
            EventType::Warning => warn!(
                node = %event.node,
                reason = %event.reason,
                event_id = %event.id,
                "{}", event.message
            ),
            EventType::Normal => info!(
                node = %event.node,
                reason = %event.reason,
                event_id = %event.id,
                "{}", event.message
            ),
        }
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    events: Mutex<Vec<NodeEvent>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NodeEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count_reason(&self, reason: &str) -> usize {
        self.events().iter().filter(|e| e.reason == reason).count()
    }
}

impl EventRecorder for MemoryRecorder {
    fn record(&self, event: NodeEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
