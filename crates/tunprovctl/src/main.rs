// # tunprovctl - Tunnel Provisioning CLI
//
// One-shot command: read the desired tunnel state from environment
// variables, create-or-reuse the tunnel, route DNS for every domain, and
// write the ingress config and credential bundle to the working directory.
//
// This binary is a thin integration layer only. All provisioning logic
// lives in tunprov-core; the real `cloudflared` adapter lives in
// tunprov-cloudflared.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `CLOUDFLARED_TUNNEL_NAME`: the tunnel name (wins over the suffixed family)
// - `CLOUDFLARED_TUNNEL_NAME_<SUFFIX>`: suffixed tunnel-name family; exactly
//   one distinct value is accepted when the singular variable is unset
// - `CLOUDFLARED_TUNNEL_DOMAIN_<SUFFIX>`: one domain per suffix, routed in
//   numeric-aware suffix order
// - `SSH_PORT`: local port for `ssh`-prefixed hostnames (default 2222)
// - `CLOUDFLARED_DEFAULT_SERVICE`: default ingress service
//   (default http://127.0.0.1:80)
// - `CLOUDFLARED_HOME`, `CLOUDFLARED_CONFIG`: extra credential search
//   locations
// - `CLOUDFLARED_BIN`: cloudflared binary override
// - `TUNPROV_LOG_LEVEL`: trace | debug | info | warn | error (default info)
//
// ## Example
//
// ```bash
// export CLOUDFLARED_TUNNEL_NAME=my-app
// export CLOUDFLARED_TUNNEL_DOMAIN_00=ssh.my-app.example.com
// export CLOUDFLARED_TUNNEL_DOMAIN_01=my-app.example.com
//
// tunprovctl --yes
// ```

use anyhow::Result;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use tunprov_cloudflared::CloudflaredCli;
use tunprov_core::{
    OsCredentialStore, ProvisionEngine, ProvisionOptions, ProvisioningResult, TunnelSpec,
    collect_spec,
};

/// Exit codes for the different termination scenarios
#[derive(Debug, Clone, Copy)]
enum RunExitCode {
    /// Full success, or run cancelled at the confirmation prompt
    Success = 0,
    /// Invalid desired state or broken configuration; nothing was executed
    ConfigError = 1,
    /// Tunnel creation hard-failed; no artifacts were written
    ProvisionError = 2,
    /// One or more DNS routes hard-failed after all were attempted
    DnsPartialFailure = 3,
}

impl From<RunExitCode> for ExitCode {
    fn from(code: RunExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Command-line arguments (configuration itself is environment-only)
struct Args {
    auto_yes: bool,
}

impl Args {
    fn parse() -> Result<Self, String> {
        let mut auto_yes = false;
        for arg in std::env::args().skip(1) {
            match arg.as_str() {
                "--yes" | "-y" => auto_yes = true,
                "--help" | "-h" => {
                    println!(
                        "usage: tunprovctl [--yes]\n\n\
                         Provisions the tunnel described by CLOUDFLARED_TUNNEL_* environment\n\
                         variables and writes cloudflared-config.yml and\n\
                         cloudflared-credentials.json to the working directory.\n\n\
                         options:\n  -y, --yes   skip the confirmation prompt"
                    );
                    std::process::exit(0);
                }
                other => return Err(format!("unknown argument: {other}")),
            }
        }
        Ok(Self { auto_yes })
    }
}

fn main() -> ExitCode {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            return RunExitCode::ConfigError.into();
        }
    };

    let log_level = match std::env::var("TUNPROV_LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return RunExitCode::ConfigError.into();
    }

    let env: Vec<(String, String)> = std::env::vars().collect();

    let spec = match collect_spec(env.clone()) {
        Ok(spec) => spec,
        Err(rejection) => {
            for warning in &rejection.warnings {
                warn!("{warning}");
            }
            error!("invalid tunnel configuration:");
            for message in &rejection.errors {
                error!("- {message}");
            }
            error!(
                "expected one tunnel name and at least one domain. Example: \
                 CLOUDFLARED_TUNNEL_NAME + CLOUDFLARED_TUNNEL_DOMAIN_00, \
                 CLOUDFLARED_TUNNEL_DOMAIN_01."
            );
            return RunExitCode::ConfigError.into();
        }
    };

    for warning in &spec.warnings {
        warn!("{warning}");
    }

    info!("tunnel name: \"{}\"", spec.name);
    info!("dns record(s): {}", spec.domains.len());
    for entry in &spec.domains {
        info!("- [{}] {}", entry.suffix, entry.domain);
    }

    if args.auto_yes {
        info!("auto-confirm enabled by --yes");
    } else {
        let question = format!(
            "Create tunnel \"{}\" and route {} DNS record(s)? (yes/no): ",
            spec.name,
            spec.domains.len()
        );
        match ask_for_confirmation(&question) {
            Ok(true) => {}
            Ok(false) => {
                info!("cancelled by user.");
                return RunExitCode::Success.into();
            }
            Err(e) => {
                error!("cannot read confirmation: {}", e);
                return RunExitCode::ConfigError.into();
            }
        }
    }

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            error!("cannot determine working directory: {}", e);
            return RunExitCode::ConfigError.into();
        }
    };
    let options = ProvisionOptions::from_env(&env, &cwd);

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return RunExitCode::ProvisionError.into();
        }
    };

    rt.block_on(async {
        let engine = ProvisionEngine::new(
            Box::new(CloudflaredCli::new()),
            Box::new(OsCredentialStore::new()),
            options,
        );

        match engine.provision(&spec).await {
            Ok(result) => {
                report(&spec, &result);
                if result.dns_failed > 0 {
                    RunExitCode::DnsPartialFailure
                } else {
                    RunExitCode::Success
                }
            }
            Err(e) => {
                error!("{e}");
                RunExitCode::ProvisionError
            }
        }
    })
    .into()
}

fn report(spec: &TunnelSpec, result: &ProvisioningResult) {
    info!("config written: {}", result.config_file_path.display());
    info!(
        "credentials written: {}",
        result.credentials_file_path.display()
    );
    info!(
        "summary: tunnel=\"{}\" tunnel_created={}, dns_success={}, dns_failed={}",
        spec.name,
        u8::from(result.tunnel_created),
        result.dns_success,
        result.dns_failed
    );
}

/// Blocking yes/no prompt on the terminal
fn ask_for_confirmation(question: &str) -> io::Result<bool> {
    print!("{question}");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    let normalized = answer.trim().to_lowercase();
    Ok(normalized == "y" || normalized == "yes")
}
