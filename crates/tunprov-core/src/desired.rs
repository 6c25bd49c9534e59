//! Desired-state collection
//!
//! Turns the process environment into a validated tunnel specification.
//! One singular name variable wins over a family of suffix-indexed name
//! variables; domains are keyed by suffix and processed in numeric-aware
//! suffix order so DNS routing is deterministic. Pure: no I/O, no side
//! effects.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use crate::error::Error;

/// Singular tunnel-name variable; wins over the suffixed family when set
pub const TUNNEL_NAME_VAR: &str = "CLOUDFLARED_TUNNEL_NAME";
/// Prefix of suffix-indexed tunnel-name variables
pub const TUNNEL_NAME_PREFIX: &str = "CLOUDFLARED_TUNNEL_NAME_";
/// Prefix of suffix-indexed domain variables
pub const TUNNEL_DOMAIN_PREFIX: &str = "CLOUDFLARED_TUNNEL_DOMAIN_";

/// One domain to route, keyed by the environment suffix that declared it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainEntry {
    /// Suffix of the declaring variable (e.g. "00")
    pub suffix: String,
    /// Hostname to route
    pub domain: String,
}

/// Non-fatal observations made while collecting the desired state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecWarning {
    /// A name variable was set but blank
    EmptyName(String),
    /// A domain variable was set but blank
    EmptyDomain(String),
    /// A suffixed name variable was shadowed by the singular variable
    IgnoredName(String),
}

impl fmt::Display for SpecWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecWarning::EmptyName(key) => {
                write!(f, "empty tunnel-name variable ignored: {key}")
            }
            SpecWarning::EmptyDomain(key) => {
                write!(f, "empty domain variable ignored: {key}")
            }
            SpecWarning::IgnoredName(key) => {
                write!(
                    f,
                    "prefixed tunnel-name variable ignored because {TUNNEL_NAME_VAR} is set: {key}"
                )
            }
        }
    }
}

/// Validated tunnel specification
///
/// Exists only when validation passed: exactly one resolved name and at
/// least one domain, domains in ascending numeric-aware suffix order.
/// Read-only after construction.
#[derive(Debug, Clone)]
pub struct TunnelSpec {
    /// Resolved tunnel name
    pub name: String,
    /// Domains in deterministic routing order
    pub domains: Vec<DomainEntry>,
    /// Non-fatal observations, for operator display
    pub warnings: Vec<SpecWarning>,
}

impl TunnelSpec {
    /// Domains as plain hostnames, in routing order
    pub fn domain_names(&self) -> Vec<String> {
        self.domains.iter().map(|d| d.domain.clone()).collect()
    }
}

/// Validation failure: every error, plus the warnings gathered before
/// rejection so the operator still sees them
#[derive(Debug, Clone)]
pub struct SpecRejection {
    /// Validation errors, each naming its offending sources
    pub errors: Vec<String>,
    /// Warnings gathered before rejection
    pub warnings: Vec<SpecWarning>,
}

impl From<SpecRejection> for Error {
    fn from(rejection: SpecRejection) -> Self {
        Error::InvalidSpec(rejection.errors)
    }
}

/// Collect and validate the desired tunnel state from an environment mapping
pub fn collect_spec<I>(env: I) -> Result<TunnelSpec, SpecRejection>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut singular_name: Option<String> = None;
    let mut prefixed_names: Vec<(String, String)> = Vec::new();
    let mut domains_by_suffix: HashMap<String, String> = HashMap::new();
    let mut warnings: Vec<SpecWarning> = Vec::new();

    for (key, value) in env {
        let value = value.trim().to_string();

        if key == TUNNEL_NAME_VAR {
            if value.is_empty() {
                warnings.push(SpecWarning::EmptyName(key));
            } else {
                singular_name = Some(value);
            }
            continue;
        }

        if key.starts_with(TUNNEL_NAME_PREFIX) {
            if value.is_empty() {
                warnings.push(SpecWarning::EmptyName(key));
            } else {
                prefixed_names.push((key, value));
            }
            continue;
        }

        if let Some(suffix) = key.strip_prefix(TUNNEL_DOMAIN_PREFIX) {
            if value.is_empty() {
                warnings.push(SpecWarning::EmptyDomain(key));
            } else {
                domains_by_suffix.insert(suffix.to_string(), value);
            }
        }
    }

    let mut domains: Vec<DomainEntry> = domains_by_suffix
        .into_iter()
        .map(|(suffix, domain)| DomainEntry { suffix, domain })
        .collect();
    domains.sort_by(|left, right| natural_cmp(&left.suffix, &right.suffix));

    let mut unique_prefixed: Vec<&str> = Vec::new();
    for (_, name) in &prefixed_names {
        if !unique_prefixed.contains(&name.as_str()) {
            unique_prefixed.push(name);
        }
    }

    let mut errors: Vec<String> = Vec::new();
    let mut name = String::new();

    if let Some(singular) = singular_name {
        for (key, prefixed) in &prefixed_names {
            if *prefixed != singular {
                warnings.push(SpecWarning::IgnoredName(key.clone()));
            }
        }
        name = singular;
    } else if unique_prefixed.len() == 1 {
        name = unique_prefixed[0].to_string();
    } else if unique_prefixed.len() > 1 {
        let sources = prefixed_names
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        errors.push(format!(
            "found multiple prefixed tunnel names; only one tunnel is allowed. \
             Current values: {sources}"
        ));
    }

    if name.is_empty() && unique_prefixed.is_empty() {
        errors.push(format!(
            "missing tunnel name. Set {TUNNEL_NAME_VAR}, or set one unique value \
             in {TUNNEL_NAME_PREFIX}00."
        ));
    }

    if domains.is_empty() {
        errors.push(format!(
            "missing domain list. Set at least one variable with prefix {TUNNEL_DOMAIN_PREFIX}."
        ));
    }

    if errors.is_empty() {
        Ok(TunnelSpec {
            name,
            domains,
            warnings,
        })
    } else {
        Err(SpecRejection { errors, warnings })
    }
}

/// Numeric-aware string ordering: digit runs compare as numbers, everything
/// else compares case-insensitively ("2" < "10", "00" < "01" < "10")
pub fn natural_cmp(left: &str, right: &str) -> Ordering {
    let left_bytes = left.as_bytes();
    let right_bytes = right.as_bytes();
    let (mut i, mut j) = (0usize, 0usize);

    while i < left_bytes.len() && j < right_bytes.len() {
        let lc = left_bytes[i];
        let rc = right_bytes[j];

        if lc.is_ascii_digit() && rc.is_ascii_digit() {
            let li = i;
            while i < left_bytes.len() && left_bytes[i].is_ascii_digit() {
                i += 1;
            }
            let rj = j;
            while j < right_bytes.len() && right_bytes[j].is_ascii_digit() {
                j += 1;
            }

            let left_num = left[li..i].trim_start_matches('0');
            let right_num = right[rj..j].trim_start_matches('0');
            let by_value = left_num
                .len()
                .cmp(&right_num.len())
                .then_with(|| left_num.cmp(right_num));
            if by_value != Ordering::Equal {
                return by_value;
            }
            // Equal values: fewer leading zeros first, for a total order
            let by_width = (i - li).cmp(&(j - rj));
            if by_width != Ordering::Equal {
                return by_width;
            }
        } else {
            let lc = lc.to_ascii_lowercase();
            let rc = rc.to_ascii_lowercase();
            if lc != rc {
                return lc.cmp(&rc);
            }
            i += 1;
            j += 1;
        }
    }

    (left_bytes.len() - i).cmp(&(right_bytes.len() - j))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn one_name_and_one_domain_is_valid() {
        let spec = collect_spec(env(&[
            ("CLOUDFLARED_TUNNEL_NAME", "demo"),
            ("CLOUDFLARED_TUNNEL_DOMAIN_00", "app.example.com"),
        ]))
        .expect("valid spec");

        assert_eq!(spec.name, "demo");
        assert_eq!(spec.domain_names(), vec!["app.example.com"]);
        assert!(spec.warnings.is_empty());
    }

    #[test]
    fn suffixes_sort_numeric_aware() {
        let spec = collect_spec(env(&[
            ("CLOUDFLARED_TUNNEL_NAME", "demo"),
            ("CLOUDFLARED_TUNNEL_DOMAIN_10", "c.example.com"),
            ("CLOUDFLARED_TUNNEL_DOMAIN_2", "b.example.com"),
            ("CLOUDFLARED_TUNNEL_DOMAIN_1", "a.example.com"),
        ]))
        .expect("valid spec");

        let suffixes: Vec<&str> = spec.domains.iter().map(|d| d.suffix.as_str()).collect();
        assert_eq!(suffixes, vec!["1", "2", "10"]);
    }

    #[test]
    fn zero_padded_suffixes_keep_ascending_order() {
        let spec = collect_spec(env(&[
            ("CLOUDFLARED_TUNNEL_NAME", "demo"),
            ("CLOUDFLARED_TUNNEL_DOMAIN_10", "c.example.com"),
            ("CLOUDFLARED_TUNNEL_DOMAIN_01", "b.example.com"),
            ("CLOUDFLARED_TUNNEL_DOMAIN_00", "a.example.com"),
        ]))
        .expect("valid spec");

        let suffixes: Vec<&str> = spec.domains.iter().map(|d| d.suffix.as_str()).collect();
        assert_eq!(suffixes, vec!["00", "01", "10"]);
    }

    #[test]
    fn singular_name_wins_and_divergent_prefixed_names_warn() {
        let spec = collect_spec(env(&[
            ("CLOUDFLARED_TUNNEL_NAME", "primary"),
            ("CLOUDFLARED_TUNNEL_NAME_00", "other"),
            ("CLOUDFLARED_TUNNEL_NAME_01", "primary"),
            ("CLOUDFLARED_TUNNEL_DOMAIN_00", "app.example.com"),
        ]))
        .expect("valid spec");

        assert_eq!(spec.name, "primary");
        assert_eq!(
            spec.warnings,
            vec![SpecWarning::IgnoredName(
                "CLOUDFLARED_TUNNEL_NAME_00".to_string()
            )]
        );
    }

    #[test]
    fn single_distinct_prefixed_name_is_accepted() {
        let spec = collect_spec(env(&[
            ("CLOUDFLARED_TUNNEL_NAME_00", "demo"),
            ("CLOUDFLARED_TUNNEL_NAME_01", "demo"),
            ("CLOUDFLARED_TUNNEL_DOMAIN_00", "app.example.com"),
        ]))
        .expect("valid spec");
        assert_eq!(spec.name, "demo");
    }

    #[test]
    fn conflicting_prefixed_names_error_names_all_sources() {
        let rejection = collect_spec(env(&[
            ("CLOUDFLARED_TUNNEL_NAME_00", "one"),
            ("CLOUDFLARED_TUNNEL_NAME_01", "two"),
            ("CLOUDFLARED_TUNNEL_DOMAIN_00", "app.example.com"),
        ]))
        .unwrap_err();

        assert_eq!(rejection.errors.len(), 1);
        assert!(rejection.errors[0].contains("CLOUDFLARED_TUNNEL_NAME_00=one"));
        assert!(rejection.errors[0].contains("CLOUDFLARED_TUNNEL_NAME_01=two"));
    }

    #[test]
    fn missing_name_and_missing_domains_are_both_reported() {
        let rejection = collect_spec(env(&[("UNRELATED", "x")])).unwrap_err();
        assert_eq!(rejection.errors.len(), 2);
        assert!(rejection.errors[0].contains("missing tunnel name"));
        assert!(rejection.errors[1].contains("missing domain list"));
    }

    #[test]
    fn blank_values_warn_and_do_not_count() {
        let rejection = collect_spec(env(&[
            ("CLOUDFLARED_TUNNEL_NAME", "  "),
            ("CLOUDFLARED_TUNNEL_DOMAIN_00", ""),
        ]))
        .unwrap_err();

        assert!(
            rejection
                .warnings
                .contains(&SpecWarning::EmptyName("CLOUDFLARED_TUNNEL_NAME".into()))
        );
        assert!(rejection.warnings.contains(&SpecWarning::EmptyDomain(
            "CLOUDFLARED_TUNNEL_DOMAIN_00".into()
        )));
        assert_eq!(rejection.errors.len(), 2);
    }

    #[test]
    fn values_are_trimmed() {
        let spec = collect_spec(env(&[
            ("CLOUDFLARED_TUNNEL_NAME", " demo \n"),
            ("CLOUDFLARED_TUNNEL_DOMAIN_00", " app.example.com "),
        ]))
        .expect("valid spec");
        assert_eq!(spec.name, "demo");
        assert_eq!(spec.domains[0].domain, "app.example.com");
    }

    #[test]
    fn natural_cmp_mixes_digits_and_letters() {
        assert_eq!(natural_cmp("a2", "a10"), Ordering::Less);
        assert_eq!(natural_cmp("A2", "a2"), Ordering::Equal);
        assert_eq!(natural_cmp("b1", "a2"), Ordering::Greater);
        assert_eq!(natural_cmp("1", "01"), Ordering::Less);
    }
}
