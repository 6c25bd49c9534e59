// # Tunnel CLI Trait
//
// Defines the interface to the external tunneling tool.
//
// The tool offers no structured success/failure signal beyond an exit code
// and free text, so every operation returns the captured [`CmdOutput`]
// verbatim and classification is left to the caller (see
// [`crate::outcome`]). An `Err` from these methods means the process could
// not be started at all; a non-zero exit is NOT an error at this layer.
//
// ## Implementations
//
// - Cloudflared: `tunprov-cloudflared` crate (spawns the real binary)
// - Test doubles: `tests/common` scripted CLI

use async_trait::async_trait;

use crate::Error;
use crate::outcome::CmdOutput;

/// Interface to the external tunneling tool
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Constraints
///
/// Implementations are parameter-to-argument-vector translators only. They
/// must not retry, must not classify output, and must not write files. All
/// sequencing and interpretation is owned by the engine.
#[async_trait]
pub trait TunnelCli: Send + Sync {
    /// Create a tunnel with the given name
    async fn create(&self, name: &str) -> Result<CmdOutput, Error>;

    /// List all tunnels in structured (JSON) form
    async fn list_json(&self) -> Result<CmdOutput, Error>;

    /// Query free-form info for a single tunnel
    async fn info(&self, name: &str) -> Result<CmdOutput, Error>;

    /// Route one DNS hostname to the named tunnel
    async fn route_dns(&self, name: &str, domain: &str) -> Result<CmdOutput, Error>;

    /// Fetch an opaque run token for the named tunnel from the remote API
    async fn fetch_token(&self, name: &str) -> Result<CmdOutput, Error>;
}
