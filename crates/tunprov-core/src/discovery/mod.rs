// # Credential Discovery Engine
//
// Locates the credential file the external tool writes as a side effect of
// tunnel creation. The tool gives no structured return value identifying
// the file, so discovery runs a chain of fallback strategies, first success
// wins:
//
// 1. Path extraction from the creation command's output text
// 2. Before/after snapshot diff over the candidate directories
// 3. Probe for a file named after the known tunnel identifier
// 4. Content scan for a document whose embedded identifier matches
// 5. The conventional file in the working directory
//
// Every candidate is open-validated (a JSON object carrying both the
// identifier and the secret field) before acceptance. A miss is not an
// error: the caller synthesizes a minimal artifact from a remote token
// fetch instead, because credential files are an implementation detail of
// the tool's local storage and may not exist in containerized environments.

pub mod snapshot;

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::scan;
use crate::traits::CredentialStore;

pub use snapshot::CredentialSnapshot;

/// JSON field carrying the tunnel identifier in a credential document
pub const ID_FIELD: &str = "TunnelID";
/// JSON field carrying the tunnel secret in a credential document
pub const SECRET_FIELD: &str = "TunnelSecret";
/// JSON field carrying the account tag
pub const ACCOUNT_FIELD: &str = "AccountTag";
/// JSON field carrying the endpoint
pub const ENDPOINT_FIELD: &str = "Endpoint";
/// JSON field carrying an opaque run token (fallback synthesis only)
pub const TOKEN_FIELD: &str = "TunnelToken";

/// Credential material required to run the tunnel's client process
///
/// Sourced either from a discovered file or synthesized from a token fetch.
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialArtifact {
    /// Tunnel identifier (may be empty when nothing resolved one)
    pub tunnel_id: String,
    /// Tunnel secret; empty for a synthesized artifact
    pub tunnel_secret: String,
    /// Account tag; empty for a synthesized artifact
    pub account_tag: String,
    /// Service endpoint; usually empty
    pub endpoint: String,
    /// Opaque run token; set only by fallback synthesis
    pub tunnel_token: Option<String>,
    /// The full discovered document, unknown fields included, so they
    /// survive into the output bundle. Empty for a synthesized artifact.
    pub raw: Map<String, Value>,
}

impl CredentialArtifact {
    /// Build an artifact from a discovered credential document
    pub fn from_document(doc: Map<String, Value>) -> Self {
        let text = |field: &str| {
            doc.get(field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string()
        };
        Self {
            tunnel_id: text(ID_FIELD),
            tunnel_secret: text(SECRET_FIELD),
            account_tag: text(ACCOUNT_FIELD),
            endpoint: text(ENDPOINT_FIELD),
            tunnel_token: None,
            raw: doc,
        }
    }

    /// Synthesize a minimal artifact from a remote token fetch; secret and
    /// account tag are deliberately left empty
    pub fn fallback(tunnel_id: &str, tunnel_token: &str) -> Self {
        Self {
            tunnel_id: tunnel_id.trim().to_string(),
            tunnel_secret: String::new(),
            account_tag: String::new(),
            endpoint: String::new(),
            tunnel_token: (!tunnel_token.is_empty()).then(|| tunnel_token.to_string()),
            raw: Map::new(),
        }
    }

    /// The artifact's base fields as a credential-shaped JSON object
    pub fn skeleton(&self) -> Map<String, Value> {
        let mut doc = Map::new();
        doc.insert(ACCOUNT_FIELD.into(), Value::String(self.account_tag.clone()));
        doc.insert(SECRET_FIELD.into(), Value::String(self.tunnel_secret.clone()));
        doc.insert(ID_FIELD.into(), Value::String(self.tunnel_id.clone()));
        doc.insert(ENDPOINT_FIELD.into(), Value::String(self.endpoint.clone()));
        if let Some(token) = &self.tunnel_token {
            doc.insert(TOKEN_FIELD.into(), Value::String(token.clone()));
        }
        doc
    }
}

/// A credential file that passed open-validation, with its parsed document
#[derive(Debug, Clone)]
pub struct DiscoveredCredential {
    /// Where the file was found
    pub path: PathBuf,
    /// The parsed artifact
    pub artifact: CredentialArtifact,
}

/// Parse text as a credential-shaped document: a JSON object carrying both
/// the identifier and the secret field
pub fn parse_credential_document(text: &str) -> Option<Map<String, Value>> {
    let doc: Map<String, Value> = match serde_json::from_str(text) {
        Ok(Value::Object(doc)) => doc,
        _ => return None,
    };
    (doc.contains_key(ID_FIELD) && doc.contains_key(SECRET_FIELD)).then_some(doc)
}

/// Parse text as any JSON object (content-scan relaxation)
fn parse_json_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(text) {
        Ok(Value::Object(doc)) => Some(doc),
        _ => None,
    }
}

/// The discovery engine itself: candidate directories plus the filesystem
/// view they are inspected through
pub struct CredentialDiscovery<'a> {
    store: &'a dyn CredentialStore,
    search_dirs: &'a [PathBuf],
    home: Option<&'a Path>,
}

impl<'a> CredentialDiscovery<'a> {
    /// Create a discovery engine over the given directories
    pub fn new(
        store: &'a dyn CredentialStore,
        search_dirs: &'a [PathBuf],
        home: Option<&'a Path>,
    ) -> Self {
        Self {
            store,
            search_dirs,
            home,
        }
    }

    /// Run the strategy chain. `None` means "not found", which the caller
    /// treats as a cue for token synthesis, never as a failure.
    pub async fn locate(
        &self,
        creation_output: &str,
        before: &CredentialSnapshot,
        tunnel_id: Option<&str>,
        conventional_path: &Path,
    ) -> Option<DiscoveredCredential> {
        if let Some(found) = self.from_output_paths(creation_output).await {
            debug!("credentials found via output path: {}", found.path.display());
            return Some(found);
        }

        let after = CredentialSnapshot::capture(self.store, self.search_dirs).await;

        if let Some(found) = self.from_snapshot_diff(before, &after).await {
            debug!("credentials found via snapshot diff: {}", found.path.display());
            return Some(found);
        }

        if let Some(id) = tunnel_id.filter(|id| !id.is_empty()) {
            if let Some(found) = self.from_id_probe(id).await {
                debug!("credentials found via id probe: {}", found.path.display());
                return Some(found);
            }
            if let Some(found) = self.from_content_scan(id, &after).await {
                debug!("credentials found via content scan: {}", found.path.display());
                return Some(found);
            }
        }

        if self.store.exists(conventional_path).await {
            if let Some(found) = self.validate(conventional_path).await {
                debug!(
                    "credentials found at conventional path: {}",
                    found.path.display()
                );
                return Some(found);
            }
        }

        None
    }

    /// Strategy 1: paths mentioned in the creation command's output
    async fn from_output_paths(&self, creation_output: &str) -> Option<DiscoveredCredential> {
        for candidate in scan::extract_json_paths(creation_output, self.home) {
            if !self.store.exists(&candidate).await {
                continue;
            }
            if let Some(found) = self.validate(&candidate).await {
                return Some(found);
            }
        }
        None
    }

    /// Strategy 2: files that appeared or were rewritten between snapshots
    async fn from_snapshot_diff(
        &self,
        before: &CredentialSnapshot,
        after: &CredentialSnapshot,
    ) -> Option<DiscoveredCredential> {
        for (candidate, _) in after.changed_since(before) {
            if let Some(found) = self.validate(&candidate).await {
                return Some(found);
            }
        }
        None
    }

    /// Strategy 3: `<tunnel_id>.json` in each candidate directory
    async fn from_id_probe(&self, tunnel_id: &str) -> Option<DiscoveredCredential> {
        for dir in self.search_dirs {
            let candidate = dir.join(format!("{tunnel_id}.json"));
            if !self.store.exists(&candidate).await {
                continue;
            }
            if let Some(found) = self.validate(&candidate).await {
                return Some(found);
            }
        }
        None
    }

    /// Strategy 4: any JSON document whose embedded identifier matches.
    ///
    /// Multiple matches are possible when unrelated tunnels share a
    /// directory; the most-recently-modified one wins and the ambiguity is
    /// logged rather than silently ignored.
    async fn from_content_scan(
        &self,
        tunnel_id: &str,
        after: &CredentialSnapshot,
    ) -> Option<DiscoveredCredential> {
        let mut matches: Vec<(PathBuf, Map<String, Value>)> = Vec::new();

        let mut candidates: Vec<_> = after.files().map(|(p, m)| (p.to_path_buf(), m)).collect();
        candidates.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(&right.0)));

        for (candidate, _) in candidates {
            let Ok(text) = self.store.read_to_string(&candidate).await else {
                continue;
            };
            let Some(doc) = parse_json_object(&text) else {
                continue;
            };
            let embedded = doc
                .get(ID_FIELD)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim();
            if embedded == tunnel_id {
                matches.push((candidate, doc));
            }
        }

        if matches.len() > 1 {
            let others: Vec<String> = matches[1..]
                .iter()
                .map(|(path, _)| path.display().to_string())
                .collect();
            warn!(
                "multiple credential files match tunnel id {}; using most recently \
                 modified \"{}\", ignoring: {}",
                tunnel_id,
                matches[0].0.display(),
                others.join(", ")
            );
        }

        matches.into_iter().next().map(|(path, doc)| DiscoveredCredential {
            path,
            artifact: CredentialArtifact::from_document(doc),
        })
    }

    /// Open-validate one candidate file
    async fn validate(&self, path: &Path) -> Option<DiscoveredCredential> {
        let text = self.store.read_to_string(path).await.ok()?;
        let doc = parse_credential_document(&text)?;
        Some(DiscoveredCredential {
            path: path.to_path_buf(),
            artifact: CredentialArtifact::from_document(doc),
        })
    }
}
