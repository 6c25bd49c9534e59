//! Command outcome capture and idempotency classification
//!
//! The external tool has no structured idempotency status: a re-run of a
//! creation-style command fails with free text such as "already exists".
//! Classification is therefore a best-effort predicate set over an untyped
//! side channel. The phrase lists are injectable so they can be extended
//! without touching control flow.

use tracing::info;

use crate::error::Error;

/// Captured result of one external command invocation
///
/// Owned transiently; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdOutput {
    /// Rendered command line, for logs and error reports
    pub command: String,
    /// Exit status; `None` when the process was terminated by a signal
    pub status: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CmdOutput {
    /// Whether the command exited zero
    pub fn succeeded(&self) -> bool {
        self.status == Some(0)
    }

    /// Exit status rendered for logs ("unknown" for signal deaths)
    pub fn status_label(&self) -> String {
        match self.status {
            Some(code) => code.to_string(),
            None => "unknown".to_string(),
        }
    }

    /// Combined stdout + stderr, trimmed
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
            .trim()
            .to_string()
    }

    /// Echo captured output to the operator console.
    ///
    /// Called before classification so the raw tool output is visible even
    /// when a failure is later reinterpreted as an idempotent no-op.
    pub fn echo(&self) {
        if !self.stdout.trim().is_empty() {
            info!("stdout:\n{}", self.stdout.trim_end());
        }
        if !self.stderr.trim().is_empty() {
            info!("stderr:\n{}", self.stderr.trim_end());
        }
        info!("exit: {}", self.status_label());
    }

    /// Hard execution mode: a non-zero exit becomes an error carrying the
    /// command line and captured output.
    pub fn require_success(self) -> Result<Self, Error> {
        if self.succeeded() {
            Ok(self)
        } else {
            Err(Error::CommandFailed {
                command: self.command.clone(),
                status: self.status_label(),
                output: self.combined(),
            })
        }
    }
}

/// Classified outcome of a tolerant command invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Exit zero
    Success,
    /// Non-zero exit whose output indicates the desired state already held
    AlreadyExists,
    /// Non-zero exit with no already-exists signal
    HardFailure,
}

/// Case-insensitive substring predicate set over command output
///
/// Creation text and DNS-route text use distinct phrase lists; both can be
/// extended without changing the engine.
#[derive(Debug, Clone)]
pub struct PhraseMatcher {
    phrases: Vec<String>,
}

impl PhraseMatcher {
    /// Build a matcher from an arbitrary phrase list
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .collect(),
        }
    }

    /// Phrases the tool emits when a tunnel with the requested name exists
    pub fn tunnel_create() -> Self {
        Self::new([
            "already exists",
            "already been created",
            "tunnel with this name already exists",
            "same tunnel",
        ])
    }

    /// Phrases the tool emits when a DNS route is already configured
    pub fn dns_route() -> Self {
        Self::new([
            "already exists",
            "already configured",
            "record with that host already exists",
            "conflict",
        ])
    }

    /// Whether any phrase occurs in `output` (case-insensitive)
    pub fn matches(&self, output: &str) -> bool {
        let normalized = output.to_lowercase();
        self.phrases.iter().any(|p| normalized.contains(p))
    }
}

/// Classify a tolerant invocation against an already-exists phrase list
pub fn classify(output: &CmdOutput, already_exists: &PhraseMatcher) -> Classification {
    if output.succeeded() {
        Classification::Success
    } else if already_exists.matches(&output.combined()) {
        Classification::AlreadyExists
    } else {
        Classification::HardFailure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(status: Option<i32>, stdout: &str, stderr: &str) -> CmdOutput {
        CmdOutput {
            command: "cloudflared tunnel create demo".to_string(),
            status,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn zero_exit_is_success_regardless_of_text() {
        let out = output(Some(0), "tunnel already exists", "");
        assert_eq!(
            classify(&out, &PhraseMatcher::tunnel_create()),
            Classification::Success
        );
    }

    #[test]
    fn already_exists_phrase_is_matched_case_insensitively() {
        let out = output(Some(1), "", "failed: a tunnel with this name ALREADY EXISTS");
        assert_eq!(
            classify(&out, &PhraseMatcher::tunnel_create()),
            Classification::AlreadyExists
        );
    }

    #[test]
    fn dns_conflict_counts_as_already_exists() {
        let out = output(Some(1), "", "API error 81053: conflict");
        assert_eq!(
            classify(&out, &PhraseMatcher::dns_route()),
            Classification::AlreadyExists
        );
    }

    #[test]
    fn unmatched_failure_is_hard() {
        let out = output(Some(1), "", "connection refused");
        assert_eq!(
            classify(&out, &PhraseMatcher::dns_route()),
            Classification::HardFailure
        );
    }

    #[test]
    fn custom_phrases_extend_the_classifier() {
        let matcher = PhraseMatcher::new(["duplicate hostname"]);
        let out = output(Some(1), "Duplicate Hostname detected", "");
        assert_eq!(classify(&out, &matcher), Classification::AlreadyExists);
    }

    #[test]
    fn require_success_carries_command_and_output() {
        let err = output(Some(3), "partial", "boom")
            .require_success()
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("cloudflared tunnel create demo"));
        assert!(message.contains('3'));
        assert!(message.contains("boom"));
    }

    #[test]
    fn signal_death_renders_unknown_status() {
        let out = output(None, "", "");
        assert_eq!(out.status_label(), "unknown");
        assert!(!out.succeeded());
    }
}
