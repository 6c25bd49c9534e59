//! Test doubles and common utilities for the provisioning contract tests
//!
//! `ScriptedCli` answers each tunnel operation from a queue of canned
//! outputs (with optional sticky fallbacks) and records every call, so the
//! tests can assert both the sequencing and the tolerance behavior of the
//! engine without a real external tool.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tunprov_core::outcome::CmdOutput;
use tunprov_core::traits::TunnelCli;
use tunprov_core::{Error, ProvisionOptions};

/// A canned zero-exit output
pub fn ok(stdout: &str) -> CmdOutput {
    CmdOutput {
        command: String::new(),
        status: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

/// A canned non-zero output with the given stderr text
pub fn fail(status: i32, stderr: &str) -> CmdOutput {
    CmdOutput {
        command: String::new(),
        status: Some(status),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

#[derive(Default)]
struct ScriptedCliInner {
    queues: Mutex<HashMap<String, VecDeque<CmdOutput>>>,
    sticky: Mutex<HashMap<String, CmdOutput>>,
    calls: Mutex<Vec<String>>,
}

/// A TunnelCli double driven entirely by canned outputs
#[derive(Clone, Default)]
pub struct ScriptedCli {
    inner: Arc<ScriptedCliInner>,
}

impl ScriptedCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one response for an operation ("create", "list", "info",
    /// "route_dns", "fetch_token"); queued responses are consumed in order
    pub fn script(&self, op: &str, output: CmdOutput) {
        self.inner
            .queues
            .lock()
            .unwrap()
            .entry(op.to_string())
            .or_default()
            .push_back(output);
    }

    /// Sticky response used whenever the queue for an operation is empty
    pub fn always(&self, op: &str, output: CmdOutput) {
        self.inner
            .sticky
            .lock()
            .unwrap()
            .insert(op.to_string(), output);
    }

    /// Every call made so far, in order, rendered as "op args..."
    pub fn calls(&self) -> Vec<String> {
        self.inner.calls.lock().unwrap().clone()
    }

    /// Calls for one operation only
    pub fn calls_for(&self, op: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(op))
            .collect()
    }

    fn take(&self, op: &str, rendered: String) -> CmdOutput {
        self.inner.calls.lock().unwrap().push(rendered.clone());

        let queued = self
            .inner
            .queues
            .lock()
            .unwrap()
            .get_mut(op)
            .and_then(VecDeque::pop_front);
        let mut output = match queued {
            Some(output) => output,
            None => self
                .inner
                .sticky
                .lock()
                .unwrap()
                .get(op)
                .cloned()
                .unwrap_or_else(|| panic!("no scripted response for operation `{op}`")),
        };
        output.command = rendered;
        output
    }
}

#[async_trait]
impl TunnelCli for ScriptedCli {
    async fn create(&self, name: &str) -> Result<CmdOutput, Error> {
        Ok(self.take("create", format!("create {name}")))
    }

    async fn list_json(&self) -> Result<CmdOutput, Error> {
        Ok(self.take("list", "list".to_string()))
    }

    async fn info(&self, name: &str) -> Result<CmdOutput, Error> {
        Ok(self.take("info", format!("info {name}")))
    }

    async fn route_dns(&self, name: &str, domain: &str) -> Result<CmdOutput, Error> {
        Ok(self.take("route_dns", format!("route_dns {name} {domain}")))
    }

    async fn fetch_token(&self, name: &str) -> Result<CmdOutput, Error> {
        Ok(self.take("fetch_token", format!("fetch_token {name}")))
    }
}

/// Options pointing discovery at a virtual directory and artifact output at
/// a real temporary directory
pub fn test_options(search_dir: &Path, output_dir: &Path) -> ProvisionOptions {
    ProvisionOptions {
        ssh_port: 2222,
        default_service: "http://127.0.0.1:80".to_string(),
        search_dirs: vec![search_dir.to_path_buf()],
        home: None,
        output_dir: output_dir.to_path_buf(),
    }
}

/// A minimal valid credential document for the given tunnel id
pub fn credential_json(tunnel_id: &str) -> String {
    format!(
        "{{\"AccountTag\":\"acct\",\"TunnelSecret\":\"s3cret\",\"TunnelID\":\"{tunnel_id}\",\"Endpoint\":\"\"}}"
    )
}

/// Environment pairs for a spec with one name and the given domains
pub fn spec_env(name: &str, domains: &[&str]) -> Vec<(String, String)> {
    let mut env = vec![("CLOUDFLARED_TUNNEL_NAME".to_string(), name.to_string())];
    for (index, domain) in domains.iter().enumerate() {
        env.push((
            format!("CLOUDFLARED_TUNNEL_DOMAIN_{index:02}"),
            domain.to_string(),
        ));
    }
    env
}
