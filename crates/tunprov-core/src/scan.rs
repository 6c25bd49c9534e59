//! Free-text scanning over command output
//!
//! The external tool reports identifiers, tokens, and file locations only as
//! prose. These helpers pull the interesting shapes out of that prose:
//! UUID-shaped tunnel identifiers, JWT-shaped run tokens, and filesystem
//! paths ending in the credential extension.

use std::path::{Path, PathBuf};

/// Extract the first UUID-shaped token (8-4-4-4-12 hex), lowercased
pub fn extract_uuid(text: &str) -> Option<String> {
    text.split(|c: char| !(c.is_ascii_hexdigit() || c == '-'))
        .find(|token| is_uuid(token))
        .map(|token| token.to_ascii_lowercase())
}

fn is_uuid(token: &str) -> bool {
    const GROUP_LENS: [usize; 5] = [8, 4, 4, 4, 12];
    let groups: Vec<&str> = token.split('-').collect();
    groups.len() == GROUP_LENS.len()
        && groups
            .iter()
            .zip(GROUP_LENS)
            .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Extract the first JWT-shaped token (`eyJ` prefix, three dot-separated
/// base64url segments)
pub fn extract_token(text: &str) -> Option<String> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        .map(|token| token.trim_matches('.'))
        .find(|token| is_jwt(token))
        .map(|token| token.to_string())
}

fn is_jwt(token: &str) -> bool {
    if !token.starts_with("eyJ") {
        return false;
    }
    let segments: Vec<&str> = token.split('.').collect();
    segments.len() == 3
        && segments.iter().all(|s| {
            !s.is_empty()
                && s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        })
}

/// Extract filesystem path candidates ending in `.json` from free text.
///
/// Accepts absolute paths, drive-letter paths, and home-relative (`~/`)
/// paths, in bare or quoted form. Surrounding quote and bracket characters
/// and trailing sentence punctuation are stripped before the shape check.
/// `~/` is expanded against `home` when available. Order of first appearance
/// is preserved; duplicates are dropped.
pub fn extract_json_paths(text: &str, home: Option<&Path>) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = Vec::new();

    for line in text.lines() {
        for raw in line.split([' ', '\t', '"', '\'']) {
            let cleaned = clean_path_candidate(raw);
            if !cleaned.to_ascii_lowercase().ends_with(".json") {
                continue;
            }
            let resolved = match path_shape(cleaned) {
                PathShape::Absolute | PathShape::DriveLetter => PathBuf::from(cleaned),
                PathShape::HomeRelative => match home {
                    Some(home) => home.join(&cleaned[2..]),
                    None => continue,
                },
                PathShape::NotAPath => continue,
            };
            if !found.contains(&resolved) {
                found.push(resolved);
            }
        }
    }

    found
}

enum PathShape {
    Absolute,
    DriveLetter,
    HomeRelative,
    NotAPath,
}

fn path_shape(candidate: &str) -> PathShape {
    let bytes = candidate.as_bytes();
    if candidate.starts_with('/') {
        PathShape::Absolute
    } else if candidate.starts_with("~/") {
        PathShape::HomeRelative
    } else if bytes.len() > 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
    {
        PathShape::DriveLetter
    } else {
        PathShape::NotAPath
    }
}

fn clean_path_candidate(raw: &str) -> &str {
    // Decorations can nest ("`/tmp/a.json`." ends in punctuation after a
    // backtick), so strip until nothing changes.
    let mut candidate = raw.trim();
    loop {
        let stripped = candidate
            .trim_matches(|c| matches!(c, '`' | '(' | ')' | '"' | '\''))
            .trim_end_matches(['.', ',', ';', ':']);
        if stripped == candidate {
            return candidate;
        }
        candidate = stripped;
    }
}
