//! Bounded async execution of host tools.
//!
//! Host probes shell out to small utilities (`sysctl` and friends). Every
//! invocation runs with:
//!
//! - A per-command timeout; the child is killed when it expires
//! - An output cap: each stream is read up to the cap and the remainder is
//!   discarded as it arrives, so a chatty tool neither grows memory nor
//!   blocks on a full pipe
//! - Command validation (no shell metacharacters, optional allowlist)

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Default timeout per command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default maximum captured bytes per stream (64KiB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// Errors that can occur during tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("command failed to spawn: {0}")]
    SpawnFailed(String),

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid command path: {0}")]
    InvalidPath(String),

    #[error("command not in allowlist: {0}")]
    NotAllowed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output from a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub command: String,
    pub args: Vec<String>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub truncated: bool,
    pub duration: Duration,
}

impl ToolOutput {
    /// Stdout as a string (lossy UTF-8 conversion).
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Configuration for the tool runner.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub default_timeout: Duration,
    pub max_output_bytes: usize,
    /// Allowed commands (empty = all allowed).
    pub allowed_commands: HashSet<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            allowed_commands: HashSet::new(),
        }
    }
}

/// A tool invocation.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub command: String,
    pub args: Vec<String>,
    /// Override timeout (None = use default).
    pub timeout: Option<Duration>,
}

impl ToolSpec {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolRunner {
    config: ToolConfig,
}

impl ToolRunner {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ToolConfig::default())
    }

    /// Run the tool described by `spec`.
    #[instrument(skip(self), fields(cmd = %spec.command))]
    pub async fn run(&self, spec: &ToolSpec) -> Result<ToolOutput, ToolError> {
        self.validate_command(&spec.command)?;
        let timeout = spec.timeout.unwrap_or(self.config.default_timeout);

        debug!(
            args = ?spec.args,
            timeout_ms = timeout.as_millis() as u64,
            "running tool"
        );

        let start = Instant::now();
        let mut child = Command::new(&spec.command)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ToolError::CommandNotFound(spec.command.clone())
                } else {
                    ToolError::SpawnFailed(e.to_string())
                }
            })?;

        let limit = self.config.max_output_bytes;
        let stdout = read_capped(child.stdout.take(), limit);
        let stderr = read_capped(child.stderr.take(), limit);
        let collect = async { tokio::try_join!(stdout, stderr, child.wait()) };

        // On timeout the child is dropped on return, which kills it.
        let ((stdout, stdout_cut), (stderr, stderr_cut), status) =
            match tokio::time::timeout(timeout, collect).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(timeout_ms = timeout.as_millis() as u64, "tool timed out");
                    return Err(ToolError::Timeout(timeout));
                }
            };

        let duration = start.elapsed();
        let truncated = stdout_cut || stderr_cut;

        debug!(
            exit_code = ?status.code(),
            duration_ms = duration.as_millis() as u64,
            truncated,
            "tool execution complete"
        );

        Ok(ToolOutput {
            command: spec.command.clone(),
            args: spec.args.clone(),
            stdout,
            stderr,
            exit_code: status.code(),
            truncated,
            duration,
        })
    }

    fn validate_command(&self, cmd: &str) -> Result<(), ToolError> {
        if cmd.is_empty() {
            return Err(ToolError::InvalidPath("empty command".to_string()));
        }

        if !self.config.allowed_commands.is_empty() {
            let basename = Path::new(cmd)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(cmd);

            if !self.config.allowed_commands.contains(cmd)
                && !self.config.allowed_commands.contains(basename)
            {
                return Err(ToolError::NotAllowed(cmd.to_string()));
            }
        }

        if cmd.contains(['|', '&', ';', '$', '`', '\n', '\r']) {
            return Err(ToolError::InvalidPath(format!(
                "command contains shell metacharacters: {}",
                cmd
            )));
        }

        if cmd.starts_with('/') && !Path::new(cmd).exists() {
            return Err(ToolError::CommandNotFound(cmd.to_string()));
        }

        Ok(())
    }
}

/// Read at most `limit` bytes from `stream`, discarding the rest. The flag
/// is set when anything was discarded.
async fn read_capped<R>(stream: Option<R>, limit: usize) -> std::io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return Ok((Vec::new(), false));
    };
    let mut buf = Vec::new();
    let mut capped = stream.take(limit as u64);
    capped.read_to_end(&mut buf).await?;
    let mut rest = capped.into_inner();
    let discarded = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await?;
    Ok((buf, discarded > 0))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn spec(command: &str, args: &[&str]) -> ToolSpec {
        ToolSpec::new(command, args.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn test_echo_captures_stdout() {
        let runner = ToolRunner::with_defaults();
        let output = runner.run(&spec("echo", &["hello"])).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout_str().trim(), "hello");
        assert!(!output.truncated);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_reported() {
        let runner = ToolRunner::with_defaults();
        let output = runner.run(&spec("false", &[])).await.unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code, Some(1));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let runner = ToolRunner::with_defaults();
        let err = runner
            .run(&spec("sleep", &["5"]).with_timeout(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let runner = ToolRunner::new(ToolConfig {
            max_output_bytes: 4,
            ..ToolConfig::default()
        });
        let output = runner.run(&spec("echo", &["abcdefgh"])).await.unwrap();
        assert_eq!(output.stdout, b"abcd");
        assert!(output.truncated);
    }

    #[tokio::test]
    async fn test_large_output_is_drained_not_buffered() {
        let runner = ToolRunner::new(ToolConfig {
            max_output_bytes: 16,
            ..ToolConfig::default()
        });
        // Well past a pipe buffer; the child must not block on a full pipe.
        let output = runner
            .run(&spec("sh", &["-c", "head -c 4000000 /dev/zero; echo done >&2"]))
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.len(), 16);
        assert_eq!(output.stderr_str().trim(), "done");
        assert!(output.truncated);
    }

    #[tokio::test]
    async fn test_output_at_the_cap_is_not_truncated() {
        let runner = ToolRunner::new(ToolConfig {
            max_output_bytes: 6,
            ..ToolConfig::default()
        });
        let output = runner.run(&spec("echo", &["hello"])).await.unwrap();
        assert_eq!(output.stdout, b"hello\n");
        assert!(!output.truncated);
    }

    #[tokio::test]
    async fn test_rejects_metacharacters() {
        let runner = ToolRunner::with_defaults();
        let err = runner.run(&spec("echo;rm", &[])).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_allowlist() {
        let runner = ToolRunner::new(ToolConfig {
            allowed_commands: ["sysctl".to_string()].into_iter().collect(),
            ..ToolConfig::default()
        });
        let err = runner.run(&spec("echo", &["x"])).await.unwrap_err();
        assert!(matches!(err, ToolError::NotAllowed(_)));
    }

    #[tokio::test]
    async fn test_missing_command() {
        let runner = ToolRunner::with_defaults();
        let err = runner
            .run(&spec("definitely-not-a-real-tool-xyz", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::CommandNotFound(_)));
    }
}
