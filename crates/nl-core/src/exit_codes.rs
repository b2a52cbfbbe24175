//! Exit codes for the `node-labeller` CLI.
//!
//! - 0: success
//! - 10-19: user/environment errors (fixable by the operator)
//! - 20-29: internal errors

use nl_common::ErrorCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Ok = 0,

    /// Invalid arguments.
    ArgsError = 10,

    /// Configuration missing, unparsable or invalid.
    ConfigError = 11,

    /// Capability descriptors could not be read, parsed or derived.
    CapabilityError = 12,

    /// Node resource could not be fetched or patched.
    NodeError = 13,

    /// Internal error (bug).
    InternalError = 20,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Ok
    }

    pub fn is_user_error(self) -> bool {
        (10..20).contains(&self.as_i32())
    }

    /// Name used in JSON error output.
    pub fn code_name(self) -> &'static str {
        match self {
            ExitCode::Ok => "OK",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::CapabilityError => "ERR_CAPABILITY",
            ExitCode::NodeError => "ERR_NODE",
            ExitCode::InternalError => "ERR_INTERNAL",
        }
    }

    /// Exit code for a failed operation.
    pub fn for_error(err: &nl_common::Error) -> Self {
        match err {
            // Reading descriptors surfaces as I/O; node stores map their own.
            nl_common::Error::Io(_) => ExitCode::CapabilityError,
            _ => match err.category() {
                ErrorCategory::Config => ExitCode::ConfigError,
                ErrorCategory::Capability | ErrorCategory::Probe => ExitCode::CapabilityError,
                ErrorCategory::Node => ExitCode::NodeError,
                ErrorCategory::Io => ExitCode::InternalError,
            },
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
