//! Realtime scheduling detection.
//!
//! A host can run realtime guests when the kernel places no limit on the
//! realtime scheduling runtime, i.e. `kernel.sched_rt_runtime_us = -1`.

use super::tool_runner::{ToolConfig, ToolError, ToolRunner, ToolSpec};
use async_trait::async_trait;
use nl_config::RealtimeProbeConfig;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors running the realtime probe. Always downgraded to "not capable".
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("{command} exited with status {code:?}: {stderr}")]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl From<ProbeError> for nl_common::Error {
    fn from(err: ProbeError) -> Self {
        nl_common::Error::Probe(err.to_string())
    }
}

/// Source of the realtime capability fact.
#[async_trait]
pub trait RealtimeCheck: Send + Sync {
    async fn is_realtime_capable(&self) -> bool;
}

/// Fixed answer, for disabled probes and tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticRealtime(pub bool);

#[async_trait]
impl RealtimeCheck for StaticRealtime {
    async fn is_realtime_capable(&self) -> bool {
        self.0
    }
}

/// Queries the kernel setting through the tool runner.
#[derive(Debug, Clone)]
pub struct RealtimeProbe {
    runner: ToolRunner,
    command: String,
    args: Vec<String>,
    setting: String,
    timeout: Duration,
}

impl RealtimeProbe {
    /// The runner only accepts the configured command.
    pub fn new(config: &RealtimeProbeConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        Self {
            runner: ToolRunner::new(ToolConfig {
                default_timeout: timeout,
                allowed_commands: [config.command.clone()].into_iter().collect(),
                ..ToolConfig::default()
            }),
            command: config.command.clone(),
            args: vec![config.setting.clone()],
            setting: config.setting.clone(),
            timeout,
        }
    }

    /// Stdout followed by stderr on success.
    pub async fn query(&self) -> Result<String, ProbeError> {
        let spec = ToolSpec::new(self.command.clone(), self.args.clone()).with_timeout(self.timeout);
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(ProbeError::NonZeroExit {
                command: self.command.clone(),
                code: output.exit_code,
                stderr: output.stderr_str().trim().to_string(),
            });
        }
        Ok(format!("{}{}", output.stdout_str(), output.stderr_str()))
    }

    /// Whether `output` reports an unlimited realtime runtime.
    pub fn is_unlimited(&self, output: &str) -> bool {
        output.trim() == format!("{} = -1", self.setting)
    }
}

#[async_trait]
impl RealtimeCheck for RealtimeProbe {
    async fn is_realtime_capable(&self) -> bool {
        match self.query().await {
            Ok(output) => {
                let capable = self.is_unlimited(&output);
                debug!(output = %output.trim(), capable, "realtime probe");
                capable
            }
            Err(e) => {
                warn!(error = %e, "realtime probe failed, treating host as not realtime capable");
                false
            }
        }
    }
}
