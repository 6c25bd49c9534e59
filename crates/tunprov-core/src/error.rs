//! Error types for the tunnel provisioning engine
//!
//! Every user-facing failure that originates in an external command carries
//! the rendered command line and its captured output, so operators can
//! diagnose the run without re-executing anything.

use thiserror::Error;

/// Result type alias for provisioning operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the provisioning engine
#[derive(Error, Debug)]
pub enum Error {
    /// The desired state collected from the environment is invalid.
    /// Reported before any external command runs.
    #[error("invalid tunnel configuration: {}", .0.join("; "))]
    InvalidSpec(Vec<String>),

    /// An external command could not be started at all
    #[error("command failed to start: {0}")]
    Spawn(String),

    /// An external command exited non-zero in hard mode
    #[error("command exited with non-zero status ({status}): `{command}`\n{output}")]
    CommandFailed {
        /// Rendered command line
        command: String,
        /// Exit status, or "unknown" when the process was killed by a signal
        status: String,
        /// Combined stdout/stderr
        output: String,
    },

    /// Tunnel creation failed and the output does not look like an
    /// existing-tunnel case
    #[error(
        "failed to create tunnel \"{name}\": `{command}` exited with status {status} \
         and its output does not match an existing-tunnel case\n{output}"
    )]
    TunnelCreateFailed {
        /// Requested tunnel name
        name: String,
        /// Rendered command line
        command: String,
        /// Exit status label
        status: String,
        /// Combined stdout/stderr
        output: String,
    },

    /// Filesystem errors while inspecting or writing artifacts
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a spawn error
    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::Spawn(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
