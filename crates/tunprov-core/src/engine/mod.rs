//! Provisioning engine
//!
//! Makes the external tunneling service's state match the desired
//! specification: create-or-reuse the named tunnel, route DNS for each
//! domain, resolve the credential material produced as a side effect of
//! creation, and write the two output artifacts.
//!
//! ## Control flow
//!
//! ```text
//! snapshot -> existence resolve -> create (tolerant) -> credential
//! discovery (or token fallback) -> DNS routes (tolerant, no
//! short-circuit) -> artifact writing
//! ```
//!
//! Fully sequential: one external command runs to completion before the
//! next begins. A hard failure during tunnel creation aborts the run with
//! no artifacts written; a per-domain DNS failure is recorded and the loop
//! continues, and artifacts are written regardless of per-domain outcomes.

use chrono::Utc;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

use crate::bundle::{self, BundleContext};
use crate::desired::TunnelSpec;
use crate::discovery::{CredentialArtifact, CredentialDiscovery, CredentialSnapshot};
use crate::error::{Error, Result};
use crate::ingress;
use crate::options::ProvisionOptions;
use crate::outcome::{Classification, PhraseMatcher, classify};
use crate::resolver;
use crate::scan;
use crate::traits::{CredentialStore, TunnelCli};

/// Terminal state of one provisioning run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningResult {
    /// Whether this run created the tunnel (false when reused)
    pub tunnel_created: bool,
    /// Domains routed successfully, already-exists included
    pub dns_success: usize,
    /// Domains whose route hard-failed
    pub dns_failed: usize,
    /// Where the ingress config was written
    pub config_file_path: PathBuf,
    /// Where the credential bundle was written
    pub credentials_file_path: PathBuf,
}

/// The provisioning engine
///
/// Owns all sequencing and interpretation; its collaborators are injected
/// behind traits so the engine can be exercised without a real tool or
/// filesystem.
pub struct ProvisionEngine {
    cli: Box<dyn TunnelCli>,
    store: Box<dyn CredentialStore>,
    options: ProvisionOptions,
    create_phrases: PhraseMatcher,
    dns_phrases: PhraseMatcher,
}

impl ProvisionEngine {
    /// Create an engine with the built-in phrase lists
    pub fn new(
        cli: Box<dyn TunnelCli>,
        store: Box<dyn CredentialStore>,
        options: ProvisionOptions,
    ) -> Self {
        Self {
            cli,
            store,
            options,
            create_phrases: PhraseMatcher::tunnel_create(),
            dns_phrases: PhraseMatcher::dns_route(),
        }
    }

    /// Replace the tunnel-creation already-exists phrase list
    pub fn with_create_phrases(mut self, phrases: PhraseMatcher) -> Self {
        self.create_phrases = phrases;
        self
    }

    /// Replace the DNS-route already-exists phrase list
    pub fn with_dns_phrases(mut self, phrases: PhraseMatcher) -> Self {
        self.dns_phrases = phrases;
        self
    }

    /// Run the full provisioning flow for a validated specification
    pub async fn provision(&self, spec: &TunnelSpec) -> Result<ProvisioningResult> {
        let before = CredentialSnapshot::capture(&*self.store, &self.options.search_dirs).await;

        let existing_id = resolver::resolve_tunnel_id(&*self.cli, &spec.name).await?;
        let already_exists = existing_id.is_some();

        info!("create tunnel: \"{}\"", spec.name);
        if already_exists {
            info!("tunnel already exists per tunnel list, skipping create");
        }

        let mut create_output = String::new();
        let mut tunnel_created = false;
        if !already_exists {
            let created = self.cli.create(&spec.name).await?;
            created.echo();
            create_output = created.combined();

            match classify(&created, &self.create_phrases) {
                Classification::Success => tunnel_created = true,
                Classification::AlreadyExists => {
                    info!("tunnel already exists, treating as success");
                }
                Classification::HardFailure => {
                    return Err(Error::TunnelCreateFailed {
                        name: spec.name.clone(),
                        command: created.command.clone(),
                        status: created.status_label(),
                        output: created.combined(),
                    });
                }
            }
        }

        let resolved_id = if already_exists {
            existing_id
        } else {
            resolver::resolve_tunnel_id(&*self.cli, &spec.name).await?
        };
        let tunnel_id = resolved_id.or_else(|| scan::extract_uuid(&create_output));

        let (artifact, source_path) = self
            .resolve_credentials(spec, &before, tunnel_id.as_deref(), &create_output)
            .await?;

        // Prefer the id the tool reported; fall back to the one embedded in
        // the credential document
        let resolved_tunnel_id = tunnel_id.unwrap_or_else(|| artifact.tunnel_id.clone());
        let tunnel_ref = if resolved_tunnel_id.is_empty() {
            spec.name.clone()
        } else {
            resolved_tunnel_id.clone()
        };

        let (dns_success, dns_failed) = self.route_domains(spec).await?;

        let config_text = ingress::render(
            &tunnel_ref,
            &spec.domain_names(),
            self.options.ssh_port,
            &self.options.default_service,
        );
        let config_file_path = self.options.output_dir.join(ingress::CONFIG_FILE_NAME);
        fs::write(&config_file_path, &config_text).await?;

        let bundle_text = bundle::render(&BundleContext {
            artifact: &artifact,
            spec,
            tunnel_id: &resolved_tunnel_id,
            tunnel_ref: &tunnel_ref,
            source_path: source_path.as_deref(),
            config_text: &config_text,
            config_file_name: ingress::CONFIG_FILE_NAME,
            provisioned_at: Utc::now(),
        })?;
        let credentials_file_path = self.options.output_dir.join(bundle::CREDENTIALS_FILE_NAME);
        fs::write(&credentials_file_path, &bundle_text).await?;

        match &source_path {
            Some(path) => info!("credentials source: {}", path.display()),
            None => info!("credentials source: not found locally (used token fallback)"),
        }
        info!("config output: {}", config_file_path.display());

        Ok(ProvisioningResult {
            tunnel_created,
            dns_success,
            dns_failed,
            config_file_path,
            credentials_file_path,
        })
    }

    /// Locate the credential file, or synthesize an artifact from a remote
    /// token fetch when every discovery strategy misses
    async fn resolve_credentials(
        &self,
        spec: &TunnelSpec,
        before: &CredentialSnapshot,
        tunnel_id: Option<&str>,
        create_output: &str,
    ) -> Result<(CredentialArtifact, Option<PathBuf>)> {
        let discovery = CredentialDiscovery::new(
            &*self.store,
            &self.options.search_dirs,
            self.options.home.as_deref(),
        );
        let conventional = self.options.output_dir.join(bundle::CREDENTIALS_FILE_NAME);

        if let Some(found) = discovery
            .locate(create_output, before, tunnel_id, &conventional)
            .await
        {
            return Ok((found.artifact, Some(found.path)));
        }

        warn!("credentials .json not found locally, trying tunnel token fallback");
        let token = self.fetch_token(&spec.name).await?;
        Ok((
            CredentialArtifact::fallback(tunnel_id.unwrap_or_default(), &token),
            None,
        ))
    }

    /// Fetch an opaque run token; an unusable response yields an empty token
    async fn fetch_token(&self, name: &str) -> Result<String> {
        let fetched = self.cli.fetch_token(name).await?;
        fetched.echo();
        if !fetched.succeeded() {
            return Ok(String::new());
        }

        let output = fetched.combined();
        if let Some(token) = scan::extract_token(&output) {
            return Ok(token);
        }
        Ok(output
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string())
    }

    /// Route every domain, tolerating already-exists, never short-circuiting
    async fn route_domains(&self, spec: &TunnelSpec) -> Result<(usize, usize)> {
        let total = spec.domains.len();
        let mut dns_success = 0usize;
        let mut dns_failed = 0usize;

        for (index, entry) in spec.domains.iter().enumerate() {
            info!(
                "[dns {}/{}] tunnel=\"{}\" domain=\"{}\"",
                index + 1,
                total,
                spec.name,
                entry.domain
            );
            let routed = self.cli.route_dns(&spec.name, &entry.domain).await?;
            routed.echo();

            match classify(&routed, &self.dns_phrases) {
                Classification::Success => dns_success += 1,
                Classification::AlreadyExists => {
                    info!(
                        "dns record already exists for {}, treating as success",
                        entry.domain
                    );
                    dns_success += 1;
                }
                Classification::HardFailure => {
                    dns_failed += 1;
                    warn!(
                        "failed dns route [{}] {}: `{}` returned status {}",
                        entry.suffix,
                        entry.domain,
                        routed.command,
                        routed.status_label()
                    );
                }
            }
        }

        Ok((dns_success, dns_failed))
    }
}
