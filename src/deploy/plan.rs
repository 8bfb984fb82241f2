// ABOUTME: Static infrastructure plan: server sizing, inbound firewall rules, cloud-init and DNS records
// ABOUTME: Plain data handed to whatever provisions the host; no cloud API calls happen here

use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;

use super::error::{DeployError, Result};
use crate::config::{ResolvedValue, VariableMap};
use crate::template::TemplateEngine;

pub const ANY_IPV4: &str = "0.0.0.0/0";
pub const ANY_IPV6: &str = "::/0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerSpec {
    pub server_type: String,
    pub location: String,
    pub image: String,
    pub backups: bool,
    pub shutdown_before_deletion: bool,
}

impl Default for ServerSpec {
    fn default() -> Self {
        Self {
            server_type: "cpx11".to_string(),
            location: "ash".to_string(),
            image: "docker-ce".to_string(),
            backups: false,
            shutdown_before_deletion: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// Inbound rule open to every IPv4 and IPv6 source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirewallRule {
    pub port: u16,
    pub protocol: Protocol,
    pub description: String,
    pub source_ips: Vec<String>,
}

impl FirewallRule {
    pub fn inbound(port: u16, protocol: Protocol, description: &str) -> Self {
        Self {
            port,
            protocol,
            description: description.to_string(),
            source_ips: vec![ANY_IPV4.to_string(), ANY_IPV6.to_string()],
        }
    }
}

pub fn default_firewall_rules() -> Vec<FirewallRule> {
    vec![
        FirewallRule::inbound(22, Protocol::Tcp, "ssh"),
        FirewallRule::inbound(80, Protocol::Tcp, "http"),
        FirewallRule::inbound(443, Protocol::Tcp, "https"),
        FirewallRule::inbound(25565, Protocol::Tcp, "minecraft"),
        FirewallRule::inbound(51820, Protocol::Udp, "wireguard tunnel"),
        FirewallRule::inbound(21820, Protocol::Udp, "wireguard tunnel"),
    ]
}

const CLOUD_INIT_TEMPLATE: &str = r#"#cloud-config
hostname: {{HOSTNAME}}
fqdn: {{HOSTNAME}}.{{DOMAIN}}
locale: {{LOCALE}}
timezone: {{TIMEZONE}}
users:
  - name: {{USER}}
    groups: users, admin, docker
    sudo: ALL=(ALL) NOPASSWD:ALL
    shell: /bin/bash
    ssh_authorized_keys:
      - '{{PUBLIC_KEY}}'
package_update: true
package_upgrade: true
package_reboot_if_required: false
write_files:
  - path: /etc/ssh/sshd_config.d/ssh-hardening.conf
    content: |
      PermitRootLogin no
      PasswordAuthentication no
      KbdInteractiveAuthentication no
      ChallengeResponseAuthentication no
      MaxAuthTries 2
      AllowTcpForwarding no
      X11Forwarding no
      AllowAgentForwarding no
      AuthorizedKeysFile .ssh/authorized_keys
      AllowUsers {{USER}}
"#;

/// Inputs for the first-boot cloud-config document.
#[derive(Debug, Clone)]
pub struct CloudInit {
    pub hostname: String,
    pub user: String,
    pub locale: String,
    pub timezone: String,
}

impl Default for CloudInit {
    fn default() -> Self {
        Self {
            hostname: "stack".to_string(),
            user: "deploy".to_string(),
            locale: "en_US.UTF-8".to_string(),
            timezone: "Etc/UTC".to_string(),
        }
    }
}

impl CloudInit {
    /// Render the cloud-config. The result is secret if the key or domain is.
    pub fn render(
        &self,
        engine: &TemplateEngine,
        public_key: &ResolvedValue,
        domain: &ResolvedValue,
    ) -> Result<ResolvedValue> {
        let mut variables = VariableMap::new();
        variables.insert("HOSTNAME".into(), ResolvedValue::plain(&self.hostname));
        variables.insert("USER".into(), ResolvedValue::plain(&self.user));
        variables.insert("LOCALE".into(), ResolvedValue::plain(&self.locale));
        variables.insert("TIMEZONE".into(), ResolvedValue::plain(&self.timezone));
        variables.insert("PUBLIC_KEY".into(), public_key.clone());
        variables.insert("DOMAIN".into(), domain.clone());

        let rendered = engine.render(CLOUD_INIT_TEMPLATE, &variables, None)?;
        let secret = public_key.is_secret() || domain.is_secret();
        Ok(ResolvedValue::new(rendered, secret))
    }
}

/// Cloud-config for `user` with SSH locked down to key logins.
pub fn cloud_init(
    engine: &TemplateEngine,
    user: &str,
    public_key: &ResolvedValue,
    domain: &ResolvedValue,
) -> Result<ResolvedValue> {
    CloudInit {
        user: user.to_string(),
        ..CloudInit::default()
    }
    .render(engine, public_key, domain)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsRecord {
    pub domain: String,
    pub subdomain: Option<String>,
    pub record_type: String,
    pub content: String,
}

/// Base and wildcard `A` records pointing `domain` at `ipv4`.
pub fn dns_records(domain: &str, ipv4: &str) -> Result<Vec<DnsRecord>> {
    let address: Ipv4Addr = ipv4
        .parse()
        .map_err(|_| DeployError::InvalidAddress(ipv4.to_string()))?;

    let record = |subdomain: Option<&str>| DnsRecord {
        domain: domain.to_string(),
        subdomain: subdomain.map(str::to_string),
        record_type: "A".to_string(),
        content: address.to_string(),
    };
    Ok(vec![record(None), record(Some("*"))])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let spec = ServerSpec::default();
        assert_eq!(spec.server_type, "cpx11");
        assert_eq!(spec.location, "ash");
        assert_eq!(spec.image, "docker-ce");
        assert!(!spec.backups);
        assert!(spec.shutdown_before_deletion);
    }

    #[test]
    fn test_firewall_rules() {
        let rules = default_firewall_rules();
        let ports: Vec<(u16, Protocol)> = rules.iter().map(|r| (r.port, r.protocol)).collect();
        assert_eq!(
            ports,
            vec![
                (22, Protocol::Tcp),
                (80, Protocol::Tcp),
                (443, Protocol::Tcp),
                (25565, Protocol::Tcp),
                (51820, Protocol::Udp),
                (21820, Protocol::Udp),
            ]
        );
        assert!(rules
            .iter()
            .all(|r| r.source_ips == vec![ANY_IPV4.to_string(), ANY_IPV6.to_string()]));
    }

    #[test]
    fn test_cloud_init_hardening() {
        let engine = TemplateEngine::new();
        let doc = cloud_init(
            &engine,
            "ops",
            &ResolvedValue::secret("ssh-ed25519 AAAA ops@host"),
            &ResolvedValue::plain("example.com"),
        )
        .unwrap();

        assert!(doc.is_secret());
        let text = doc.expose();
        assert!(text.starts_with("#cloud-config\n"));
        assert!(text.contains("fqdn: stack.example.com"));
        assert!(text.contains("  - name: ops"));
        assert!(text.contains("- 'ssh-ed25519 AAAA ops@host'"));
        assert!(text.contains("PermitRootLogin no"));
        assert!(text.contains("PasswordAuthentication no"));
        assert!(text.contains("AllowUsers ops"));
    }

    #[test]
    fn test_dns_records() {
        let records = dns_records("example.com", "203.0.113.7").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].subdomain, None);
        assert_eq!(records[1].subdomain.as_deref(), Some("*"));
        assert!(records
            .iter()
            .all(|r| r.record_type == "A" && r.content == "203.0.113.7"));

        assert!(matches!(
            dns_records("example.com", "not-an-ip"),
            Err(DeployError::InvalidAddress(_))
        ));
    }
}
