//! Provisioning options derived from the environment
//!
//! Everything here is resolved once, before the engine runs: the SSH
//! ingress port, the default ingress service, the candidate directories
//! credential discovery inspects, and where the two artifacts are written.

use std::path::{Path, PathBuf};

/// Optional SSH ingress port variable
pub const SSH_PORT_VAR: &str = "SSH_PORT";
/// Optional default ingress service variable
pub const DEFAULT_SERVICE_VAR: &str = "CLOUDFLARED_DEFAULT_SERVICE";
/// Optional credential-directory override
pub const CRED_HOME_VAR: &str = "CLOUDFLARED_HOME";
/// Optional tool-config override; a `.yml`/`.yaml` value means "its parent"
pub const CRED_CONFIG_VAR: &str = "CLOUDFLARED_CONFIG";

/// Fallback SSH ingress port when `SSH_PORT` is unset or invalid
pub const DEFAULT_SSH_PORT: u16 = 2222;
/// Fallback ingress service when `CLOUDFLARED_DEFAULT_SERVICE` is unset
pub const DEFAULT_SERVICE: &str = "http://127.0.0.1:80";

/// Resolved provisioning options; read-only after construction
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    /// Port `ssh`-prefixed hostnames are routed to
    pub ssh_port: u16,
    /// Service every other hostname is routed to
    pub default_service: String,
    /// Candidate directories for credential discovery, insertion-ordered
    pub search_dirs: Vec<PathBuf>,
    /// Home directory used for `~/` expansion in tool output
    pub home: Option<PathBuf>,
    /// Directory the two artifacts are written to
    pub output_dir: PathBuf,
}

impl ProvisionOptions {
    /// Resolve options from an environment mapping and a working directory
    pub fn from_env(env: &[(String, String)], cwd: &Path) -> Self {
        let lookup = |name: &str| -> Option<String> {
            env.iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let home = dirs::home_dir()
            .or_else(|| lookup("HOME").map(PathBuf::from))
            .or_else(|| lookup("USERPROFILE").map(PathBuf::from));

        Self {
            ssh_port: parse_ssh_port(lookup(SSH_PORT_VAR).as_deref()),
            default_service: lookup(DEFAULT_SERVICE_VAR)
                .unwrap_or_else(|| DEFAULT_SERVICE.to_string()),
            search_dirs: credential_search_dirs(&lookup, home.as_deref(), cwd),
            home,
            output_dir: cwd.to_path_buf(),
        }
    }
}

/// Parse the SSH port, falling back to the default for anything that is not
/// an integer in 1..=65535
pub fn parse_ssh_port(raw: Option<&str>) -> u16 {
    match raw {
        Some(value) => match value.trim().parse::<u16>() {
            Ok(port) if port > 0 => port,
            _ => DEFAULT_SSH_PORT,
        },
        None => DEFAULT_SSH_PORT,
    }
}

/// Candidate directories the credential file may land in, de-duplicated in
/// insertion order: home config directory, environment-declared overrides,
/// then the working directory
fn credential_search_dirs(
    lookup: &dyn Fn(&str) -> Option<String>,
    home: Option<&Path>,
    cwd: &Path,
) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    let mut push = |dir: PathBuf| {
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    };

    if let Some(home) = home {
        push(home.join(".cloudflared"));
    }
    if let Some(env_home) = lookup("HOME") {
        push(Path::new(&env_home).join(".cloudflared"));
    }
    if let Some(profile) = lookup("USERPROFILE") {
        push(Path::new(&profile).join(".cloudflared"));
    }
    if let Some(override_dir) = lookup(CRED_HOME_VAR) {
        push(PathBuf::from(override_dir));
    }
    if let Some(config) = lookup(CRED_CONFIG_VAR) {
        let config_path = PathBuf::from(&config);
        let is_yaml = config.ends_with(".yml") || config.ends_with(".yaml");
        if is_yaml {
            if let Some(parent) = config_path.parent() {
                push(parent.to_path_buf());
            }
        } else {
            push(config_path);
        }
    }
    push(cwd.to_path_buf());

    dirs
}
