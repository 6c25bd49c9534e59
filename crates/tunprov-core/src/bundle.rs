//! Enriched credential bundle
//!
//! Merges the discovered (or synthesized) credential artifact with run
//! metadata and a copy of the generated ingress config, then embeds a
//! base64 encoding of its own serialization so downstream tooling can
//! transport the whole bundle as a single opaque value.
//!
//! The self-reference is built in two steps: construct the payload without
//! the encoded field, serialize once, encode that serialization, add the
//! encoded field, serialize again. The structure is never recursive.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::path::Path;

use crate::desired::TunnelSpec;
use crate::discovery::CredentialArtifact;
use crate::error::Error;

/// File name of the written credential bundle
pub const CREDENTIALS_FILE_NAME: &str = "cloudflared-credentials.json";

/// Everything the bundle is assembled from
pub struct BundleContext<'a> {
    /// Discovered or synthesized credential material
    pub artifact: &'a CredentialArtifact,
    /// The validated tunnel specification
    pub spec: &'a TunnelSpec,
    /// Resolved tunnel identifier (may be empty)
    pub tunnel_id: &'a str,
    /// Reference used in the ingress config (identifier, or name as fallback)
    pub tunnel_ref: &'a str,
    /// Where the credential file was found; `None` when synthesized
    pub source_path: Option<&'a Path>,
    /// Generated ingress config text
    pub config_text: &'a str,
    /// File name the ingress config was written under
    pub config_file_name: &'a str,
    /// Run timestamp
    pub provisioned_at: DateTime<Utc>,
}

/// Render the bundle as pretty JSON with a trailing newline
pub fn render(ctx: &BundleContext<'_>) -> Result<String, Error> {
    // Discovered fields win over the skeleton, unknown fields ride along
    let mut payload = ctx.artifact.skeleton();
    for (key, value) in &ctx.artifact.raw {
        payload.insert(key.clone(), value.clone());
    }
    payload.insert(
        crate::discovery::ID_FIELD.into(),
        Value::String(ctx.tunnel_id.to_string()),
    );

    payload.insert("tunnel_name".into(), Value::String(ctx.spec.name.clone()));
    payload.insert("tunnel_ref".into(), Value::String(ctx.tunnel_ref.to_string()));
    let domains = ctx.spec.domain_names();
    payload.insert(
        "tunnel_domain".into(),
        Value::String(domains.first().cloned().unwrap_or_default()),
    );
    payload.insert(
        "tunnel_domains".into(),
        Value::Array(domains.into_iter().map(Value::String).collect()),
    );
    payload.insert(
        "cloudflared_config_yml".into(),
        Value::String(ctx.config_text.to_string()),
    );
    payload.insert(
        "cloudflared_config_file".into(),
        Value::String(ctx.config_file_name.to_string()),
    );
    payload.insert(
        "source_credentials_file".into(),
        Value::String(
            ctx.source_path
                .map(|path| path.display().to_string())
                .unwrap_or_default(),
        ),
    );
    payload.insert(
        "credentials_source".into(),
        Value::String(
            if ctx.source_path.is_some() {
                "file"
            } else {
                "token-fallback"
            }
            .to_string(),
        ),
    );
    payload.insert(
        "provisioned_at".into(),
        Value::String(ctx.provisioned_at.to_rfc3339()),
    );

    let serialized = to_pretty(&payload)?;
    let encoded = BASE64.encode(serialized.as_bytes());

    let mut with_snapshot = payload;
    with_snapshot.insert("base64".into(), Value::String(encoded));
    to_pretty(&with_snapshot)
}

fn to_pretty(doc: &Map<String, Value>) -> Result<String, Error> {
    let mut text = serde_json::to_string_pretty(&Value::Object(doc.clone()))?;
    text.push('\n');
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desired::DomainEntry;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn spec() -> TunnelSpec {
        TunnelSpec {
            name: "demo".to_string(),
            domains: vec![
                DomainEntry {
                    suffix: "00".into(),
                    domain: "ssh.example.com".into(),
                },
                DomainEntry {
                    suffix: "01".into(),
                    domain: "app.example.com".into(),
                },
            ],
            warnings: Vec::new(),
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap()
    }

    #[test]
    fn base64_field_decodes_to_the_pre_snapshot_serialization() {
        let artifact = CredentialArtifact::fallback("abc", "eyJ.tok.sig");
        let spec = spec();
        let rendered = render(&BundleContext {
            artifact: &artifact,
            spec: &spec,
            tunnel_id: "abc",
            tunnel_ref: "abc",
            source_path: None,
            config_text: "tunnel: abc\n",
            config_file_name: "cloudflared-config.yml",
            provisioned_at: at(),
        })
        .unwrap();

        let doc: Value = serde_json::from_str(&rendered).unwrap();
        let encoded = doc.get("base64").and_then(Value::as_str).unwrap();
        let decoded = BASE64.decode(encoded).unwrap();
        let decoded_text = String::from_utf8(decoded).unwrap();

        // The snapshot is exactly the bundle minus its own base64 field
        let mut without = doc.as_object().unwrap().clone();
        without.remove("base64");
        let expected = format!(
            "{}\n",
            serde_json::to_string_pretty(&Value::Object(without)).unwrap()
        );
        assert_eq!(decoded_text, expected);
    }

    #[test]
    fn discovered_fields_and_metadata_are_merged() {
        let doc = crate::discovery::parse_credential_document(
            r#"{"TunnelID":"old-id","TunnelSecret":"s","AccountTag":"acct","Extra":"kept"}"#,
        )
        .unwrap();
        let artifact = CredentialArtifact::from_document(doc);
        let spec = spec();
        let source = PathBuf::from("/home/u/.cloudflared/abc.json");
        let rendered = render(&BundleContext {
            artifact: &artifact,
            spec: &spec,
            tunnel_id: "resolved-id",
            tunnel_ref: "resolved-id",
            source_path: Some(&source),
            config_text: "tunnel: resolved-id\n",
            config_file_name: "cloudflared-config.yml",
            provisioned_at: at(),
        })
        .unwrap();
        let doc: Value = serde_json::from_str(&rendered).unwrap();

        // The resolved identifier overrides the discovered one
        assert_eq!(doc["TunnelID"], "resolved-id");
        assert_eq!(doc["TunnelSecret"], "s");
        assert_eq!(doc["Extra"], "kept");
        assert_eq!(doc["tunnel_name"], "demo");
        assert_eq!(doc["tunnel_domain"], "ssh.example.com");
        assert_eq!(
            doc["tunnel_domains"],
            serde_json::json!(["ssh.example.com", "app.example.com"])
        );
        assert_eq!(doc["source_credentials_file"], "/home/u/.cloudflared/abc.json");
        assert_eq!(doc["credentials_source"], "file");
        assert!(doc["cloudflared_config_yml"].as_str().unwrap().contains("tunnel:"));
    }

    #[test]
    fn fallback_bundle_notes_the_token_source() {
        let artifact = CredentialArtifact::fallback("abc", "eyJ.tok.sig");
        let spec = spec();
        let rendered = render(&BundleContext {
            artifact: &artifact,
            spec: &spec,
            tunnel_id: "abc",
            tunnel_ref: "abc",
            source_path: None,
            config_text: "",
            config_file_name: "cloudflared-config.yml",
            provisioned_at: at(),
        })
        .unwrap();
        let doc: Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(doc["credentials_source"], "token-fallback");
        assert_eq!(doc["source_credentials_file"], "");
        assert_eq!(doc["TunnelToken"], "eyJ.tok.sig");
        assert_eq!(doc["TunnelSecret"], "");
    }
}
