//! Host probes that shell out to system tools.

pub mod realtime;
pub mod tool_runner;

pub use realtime::{ProbeError, RealtimeCheck, RealtimeProbe, StaticRealtime};
pub use tool_runner::{ToolConfig, ToolError, ToolOutput, ToolRunner, ToolSpec};
