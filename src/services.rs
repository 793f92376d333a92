//! Cloud service catalog module
//! Read-only typed views over loaded service definitions and the generic internet site list

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

/// Trust classification for a cloud service, driving the default action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Sanctioned,
    Unsanctioned,
    Blocked,
}

/// Optional per-service traffic shaping overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrafficOverride {
    /// Mean accesses per user per hour
    #[serde(default)]
    pub access_count_per_hour: Option<f64>,
    /// Mean bytes transferred per user per access
    #[serde(default)]
    pub bandwidth_per_user: Option<u64>,
}

/// A single cloud service definition from the catalog.
///
/// Loaded from YAML by the configuration layer; the generators treat it as
/// read-only.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDefinition {
    pub name: String,
    pub status: ServiceStatus,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_risk_level")]
    pub risk_level: String,
    /// Wildcard domain patterns, e.g. "*.dropbox.com"
    #[serde(default)]
    pub domains: Vec<String>,
    /// Published IP ranges in CIDR notation
    #[serde(default)]
    pub ip_ranges: Vec<String>,
    #[serde(default)]
    pub traffic_override: Option<TrafficOverride>,
}

fn default_category() -> String {
    "other".to_string()
}

fn default_risk_level() -> String {
    "low".to_string()
}

impl ServiceDefinition {
    /// True when the service's own status forces action=blocked.
    pub fn is_blocked(&self) -> bool {
        self.status == ServiceStatus::Blocked
    }
}

/// The loaded service catalog with per-tier views.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    services: Vec<ServiceDefinition>,
}

impl ServiceCatalog {
    pub fn new(services: Vec<ServiceDefinition>) -> Self {
        Self { services }
    }

    /// Load every `*.yaml` definition under a catalog directory.
    ///
    /// A missing directory is fatal; an individual malformed file is fatal
    /// too, with the offending path in the error.
    pub fn from_yaml_dir(dir: &Path) -> anyhow::Result<Self> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read service catalog directory: {}", dir.display()))?;

        let mut services = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read service definition: {}", path.display()))?;
            let service: ServiceDefinition = serde_yaml::from_str(&raw)
                .with_context(|| format!("Failed to parse service definition: {}", path.display()))?;
            services.push(service);
        }

        // Stable order regardless of directory iteration order
        services.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self { services })
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// All services, unfiltered.
    pub fn all(&self) -> &[ServiceDefinition] {
        &self.services
    }

    /// Services in a given trust tier.
    pub fn tier(&self, status: ServiceStatus) -> Vec<&ServiceDefinition> {
        self.services.iter().filter(|s| s.status == status).collect()
    }
}

/// A well-known non-enterprise site used for generic internet traffic.
#[derive(Debug, Clone, Copy)]
pub struct InternetSite {
    pub domain: &'static str,
    pub category: &'static str,
}

/// Fixed catalog of popular sites for the generic-internet traffic class.
/// All traffic to these is action=allowed.
pub const INTERNET_SITES: &[InternetSite] = &[
    InternetSite { domain: "cnn.com", category: "News" },
    InternetSite { domain: "bbc.co.uk", category: "News" },
    InternetSite { domain: "reuters.com", category: "News" },
    InternetSite { domain: "reddit.com", category: "Social Media" },
    InternetSite { domain: "twitter.com", category: "Social Media" },
    InternetSite { domain: "linkedin.com", category: "Social Media" },
    InternetSite { domain: "github.com", category: "Development" },
    InternetSite { domain: "stackoverflow.com", category: "Development" },
    InternetSite { domain: "wikipedia.org", category: "Reference" },
    InternetSite { domain: "weather.com", category: "Reference" },
    InternetSite { domain: "amazon.com", category: "Shopping" },
    InternetSite { domain: "ebay.com", category: "Shopping" },
];

/// Sentinel service name for generic internet traffic; formatters omit the
/// application field when they see it.
pub const INTERNET_SERVICE_NAME: &str = "Internet";
