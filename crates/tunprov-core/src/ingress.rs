//! Ingress configuration rendering
//!
//! Produces the line-oriented config the tunnel client consumes at startup:
//! one hostname-to-service rule per domain, in spec order, with a fixed
//! catch-all rule last. Hostnames beginning with the reserved `ssh` prefix
//! are routed to the local SSH port instead of the default service.

/// File name of the written ingress config
pub const CONFIG_FILE_NAME: &str = "cloudflared-config.yml";

/// Where the client container mounts the credential file
const CREDENTIALS_MOUNT_PATH: &str = "/etc/cloudflared/credentials.json";

/// Reserved hostname prefix routed to the local SSH service
const SSH_HOSTNAME_PREFIX: &str = "ssh";

const SSH_COMMENT: &str =
    "  # SSH over Cloudflare Tunnel (requires DNS record + Cloudflare Access policy).";

/// Render the ingress config for a tunnel reference and its domains.
///
/// Blank domains are skipped. The SSH explanatory comment is emitted once,
/// before the first SSH rule.
pub fn render(tunnel_ref: &str, domains: &[String], ssh_port: u16, default_service: &str) -> String {
    let mut lines = vec![
        format!("tunnel: {}", tunnel_ref.trim()),
        format!("credentials-file: {CREDENTIALS_MOUNT_PATH}"),
        String::new(),
        "ingress:".to_string(),
    ];

    let mut has_ssh_comment = false;
    for domain in domains {
        let hostname = domain.trim();
        if hostname.is_empty() {
            continue;
        }
        let service = service_for(hostname, ssh_port, default_service);
        if service.starts_with("ssh://") && !has_ssh_comment {
            lines.push(SSH_COMMENT.to_string());
            has_ssh_comment = true;
        }
        lines.push(format!("  - hostname: {hostname}"));
        lines.push(format!("    service: {service}"));
    }
    lines.push("  - service: http_status:404".to_string());
    lines.push(String::new());

    lines.join("\n")
}

fn service_for(hostname: &str, ssh_port: u16, default_service: &str) -> String {
    if hostname.to_lowercase().starts_with(SSH_HOSTNAME_PREFIX) {
        format!("ssh://127.0.0.1:{ssh_port}")
    } else {
        default_service.to_string()
    }
}
