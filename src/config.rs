//! Enterprise configuration module
//! Typed configuration for the simulated enterprise, loaded once and validated once

use anyhow::Context;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Top-level enterprise configuration consumed by the generators.
///
/// The YAML layout mirrors the on-disk `enterprise.yaml` produced by the
/// init tooling; all network fields carry defaults so a minimal file with
/// just a domain and a user count is enough to run.
#[derive(Debug, Clone, Deserialize)]
pub struct EnterpriseConfig {
    /// Enterprise mail/AD domain, e.g. "example.com"
    pub domain: String,
    /// Total number of user identities to simulate
    pub total_users: usize,
    /// Network address pools
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Network address pools for the simulated enterprise.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Internal client subnets in CIDR notation
    #[serde(default = "default_internal_subnets")]
    pub internal_subnets: Vec<String>,
    /// Egress NAT addresses seen by external services
    #[serde(default)]
    pub egress_ips: Vec<String>,
    /// Web proxy address, if the enterprise routes through one
    #[serde(default)]
    pub proxy_ip: Option<String>,
    /// VPN client pools in CIDR notation
    #[serde(default)]
    pub vpn_subnets: Vec<String>,
}

fn default_internal_subnets() -> Vec<String> {
    vec!["10.0.0.0/8".to_string()]
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            internal_subnets: default_internal_subnets(),
            egress_ips: Vec::new(),
            proxy_ip: None,
            vpn_subnets: Vec::new(),
        }
    }
}

impl EnterpriseConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// Any failure here is fatal to session start: the caller gets the
    /// error and no partial run is attempted.
    pub fn from_yaml(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read enterprise config: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse enterprise config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.domain.is_empty() {
            anyhow::bail!("Enterprise domain must not be empty");
        }

        if self.total_users == 0 {
            anyhow::bail!("Total users must be greater than 0");
        }

        if self.network.internal_subnets.is_empty() {
            anyhow::bail!("At least one internal subnet is required");
        }

        for subnet in &self.network.internal_subnets {
            crate::net::parse_cidr(subnet)
                .with_context(|| format!("Invalid internal subnet: {}", subnet))?;
        }

        for subnet in &self.network.vpn_subnets {
            crate::net::parse_cidr(subnet)
                .with_context(|| format!("Invalid VPN subnet: {}", subnet))?;
        }

        Ok(())
    }
}

impl fmt::Display for EnterpriseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EnterpriseConfig {{ domain: {}, users: {}, subnets: {} }}",
            self.domain,
            self.total_users,
            self.network.internal_subnets.len()
        )
    }
}
