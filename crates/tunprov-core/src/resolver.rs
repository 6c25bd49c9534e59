//! Tunnel existence resolution
//!
//! Determines whether a tunnel with the desired name already exists, and
//! its identifier. The structured listing is authoritative; when it fails
//! or cannot be parsed, a free-text info query is scanned for a UUID-shaped
//! token instead. "Does not exist yet" is a normal answer, not an error.

use serde_json::Value;
use tracing::warn;

use crate::Error;
use crate::scan;
use crate::traits::TunnelCli;

/// Identifier fields a structured listing entry may carry
const ID_KEYS: [&str; 4] = ["ID", "id", "TunnelID", "tunnelId"];
/// Name fields a structured listing entry may carry
const NAME_KEYS: [&str; 3] = ["Name", "name", "TunnelName"];

/// Resolve the identifier of an existing tunnel by exact name match.
///
/// `Ok(None)` means no tunnel with that name exists (or it exists without a
/// usable identifier, which callers treat the same way).
pub async fn resolve_tunnel_id(
    cli: &dyn TunnelCli,
    name: &str,
) -> Result<Option<String>, Error> {
    let listing = cli.list_json().await?;
    listing.echo();

    if listing.succeeded() {
        match serde_json::from_str::<Value>(&listing.stdout) {
            Ok(Value::Array(entries)) => {
                if let Some(entry) = entries.iter().find(|entry| entry_name(entry) == name) {
                    return Ok(entry_id(entry).filter(|id| !id.is_empty()));
                }
            }
            _ => {
                warn!("cannot parse structured tunnel list output");
            }
        }
    }

    let info = cli.info(name).await?;
    info.echo();
    if info.succeeded() {
        return Ok(scan::extract_uuid(&info.combined()));
    }

    Ok(None)
}

fn entry_name(entry: &Value) -> &str {
    NAME_KEYS
        .iter()
        .find_map(|key| entry.get(key).and_then(Value::as_str))
        .unwrap_or_default()
        .trim()
}

fn entry_id(entry: &Value) -> Option<String> {
    ID_KEYS
        .iter()
        .find_map(|key| entry.get(key).and_then(Value::as_str))
        .map(|id| id.trim().to_string())
}
