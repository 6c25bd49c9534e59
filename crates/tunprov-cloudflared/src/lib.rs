// # cloudflared CLI Adapter
//
// Implements the [`TunnelCli`] trait by spawning the real `cloudflared`
// binary. This crate is a parameter-to-argument-vector translator only:
//
// - One process per operation, run to completion, output captured
// - A non-zero exit is returned to the caller, never raised here
// - An `Err` means the process could not be started at all
// - No retries, no classification, no file writing
//
// The binary location defaults to `cloudflared` on `PATH` and can be
// overridden with the `CLOUDFLARED_BIN` environment variable.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::info;

use tunprov_core::outcome::CmdOutput;
use tunprov_core::traits::TunnelCli;
use tunprov_core::Error;

/// Environment variable overriding the `cloudflared` binary location
pub const BINARY_VAR: &str = "CLOUDFLARED_BIN";

/// Default binary name, resolved via `PATH`
pub const DEFAULT_BINARY: &str = "cloudflared";

/// `cloudflared` process adapter
#[derive(Debug, Clone)]
pub struct CloudflaredCli {
    binary: PathBuf,
}

impl CloudflaredCli {
    /// Create an adapter using `CLOUDFLARED_BIN` or the default binary name
    pub fn new() -> Self {
        let binary = std::env::var(BINARY_VAR)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_BINARY.to_string());
        Self {
            binary: PathBuf::from(binary),
        }
    }

    /// Create an adapter for an explicit binary path
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<CmdOutput, Error> {
        let rendered = render_command(&self.binary.display().to_string(), args);
        info!("$ {rendered}");

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|err| {
                Error::spawn(format!("{} ({})", err, self.binary.display()))
            })?;

        Ok(CmdOutput {
            command: rendered,
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl Default for CloudflaredCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TunnelCli for CloudflaredCli {
    async fn create(&self, name: &str) -> Result<CmdOutput, Error> {
        self.run(&["tunnel", "create", name]).await
    }

    async fn list_json(&self) -> Result<CmdOutput, Error> {
        self.run(&["tunnel", "list", "--output", "json"]).await
    }

    async fn info(&self, name: &str) -> Result<CmdOutput, Error> {
        self.run(&["tunnel", "info", name]).await
    }

    async fn route_dns(&self, name: &str, domain: &str) -> Result<CmdOutput, Error> {
        self.run(&["tunnel", "route", "dns", name, domain]).await
    }

    async fn fetch_token(&self, name: &str) -> Result<CmdOutput, Error> {
        self.run(&["tunnel", "token", name]).await
    }
}

/// Render a command line for logs and error reports, quoting arguments that
/// need it
fn render_command(binary: &str, args: &[&str]) -> String {
    let mut parts = vec![binary.to_string()];
    parts.extend(args.iter().map(|arg| quote_arg(arg)));
    parts.join(" ")
}

fn quote_arg(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '/' | '\\' | '-'));
    if plain {
        arg.to_string()
    } else {
        format!("\"{}\"", arg.replace('"', "\\\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_arguments_stay_unquoted() {
        assert_eq!(
            render_command("cloudflared", &["tunnel", "create", "my-tunnel"]),
            "cloudflared tunnel create my-tunnel"
        );
    }

    #[test]
    fn arguments_with_spaces_or_quotes_are_quoted() {
        assert_eq!(quote_arg("has space"), "\"has space\"");
        assert_eq!(quote_arg("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(quote_arg(""), "\"\"");
    }

    #[test]
    fn binary_override_is_honored() {
        let cli = CloudflaredCli::with_binary("/opt/bin/cloudflared");
        assert_eq!(cli.binary, PathBuf::from("/opt/bin/cloudflared"));
    }

    #[tokio::test]
    async fn spawn_failure_is_reported_with_the_binary_name() {
        let cli = CloudflaredCli::with_binary("/nonexistent/cloudflared-for-sure");
        let err = cli.list_json().await.unwrap_err();
        assert!(err.to_string().contains("cloudflared-for-sure"));
    }
}
