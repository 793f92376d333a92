//! Event synthesis module
//! Builds fully-populated traffic events from identities and the service catalog

use crate::identity::Identity;
use crate::net::AddrAllocator;
use crate::services::{
    ServiceCatalog, ServiceDefinition, ServiceStatus, INTERNET_SERVICE_NAME, INTERNET_SITES,
};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::net::Ipv4Addr;

/// Probability that an event is cloud-service traffic rather than generic
/// internet browsing.
const CLOUD_TRAFFIC_PROBABILITY: f64 = 0.7;

/// Cumulative tier probabilities: sanctioned 60%, unsanctioned +30%,
/// blocked remainder.
const SANCTIONED_CUMULATIVE: f64 = 0.6;
const UNSANCTIONED_CUMULATIVE: f64 = 0.9;

/// Fixed set of realistic browser user agents.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Referrers occasionally attached to browsing events.
const REFERRERS: &[&str] = &[
    "https://www.google.com/",
    "https://www.bing.com/",
    "https://duckduckgo.com/",
];

/// Gateway decision for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Allowed,
    Blocked,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allowed => "allowed",
            Action::Blocked => "blocked",
        }
    }

    /// HTTP status consistent with the decision.
    pub fn status_code(&self) -> u16 {
        match self {
            Action::Allowed => 200,
            Action::Blocked => 403,
        }
    }
}

/// One synthesized web-gateway traffic event.
///
/// Constructed, formatted, and discarded; never mutated after construction.
#[derive(Debug, Clone)]
pub struct TrafficEvent {
    pub timestamp: DateTime<Utc>,
    pub source_ip: Ipv4Addr,
    pub destination_ip: Ipv4Addr,
    pub source_port: u16,
    pub destination_port: u16,
    pub username: String,
    pub user_domain: String,
    pub url: String,
    pub method: &'static str,
    pub status_code: u16,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub duration_ms: u64,
    pub user_agent: String,
    pub referrer: Option<String>,
    pub action: Action,
    pub category: String,
    pub risk_level: String,
    pub service_name: String,
    pub protocol: &'static str,
}

/// Central event synthesis algorithm: a sequence of weighted random picks
/// over identities, traffic classes, and services.
pub struct EventSynthesizer {
    allocator: AddrAllocator,
    catalog: ServiceCatalog,
    user_domain: String,
}

impl EventSynthesizer {
    pub fn new(allocator: AddrAllocator, catalog: ServiceCatalog, user_domain: &str) -> Self {
        Self {
            allocator,
            catalog,
            user_domain: user_domain.to_string(),
        }
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    /// Synthesize one event at `timestamp` for a user drawn uniformly from
    /// the active pool.
    pub fn synthesize<R: Rng>(
        &self,
        rng: &mut R,
        timestamp: DateTime<Utc>,
        identities: &[Identity],
    ) -> TrafficEvent {
        // identities is never empty for a started session
        let identity = identities.choose(rng).expect("identity pool is empty");

        let cloud_traffic = !self.catalog.is_empty() && rng.gen_bool(CLOUD_TRAFFIC_PROBABILITY);
        let choice = if cloud_traffic {
            self.select_service(rng)
        } else {
            None
        };
        let (domain, action, category, risk_level, service_name, ip_ranges) = match choice {
            Some(service) => {
                let domain = service
                    .domains
                    .choose(rng)
                    .map(|d| strip_wildcard(d))
                    .unwrap_or_else(|| format!("{}.example.com", service.name.to_lowercase()));
                let action = if service.is_blocked() {
                    Action::Blocked
                } else {
                    Action::Allowed
                };
                (
                    domain,
                    action,
                    service.category.clone(),
                    service.risk_level.clone(),
                    service.name.clone(),
                    service.ip_ranges.clone(),
                )
            }
            None => {
                let site = INTERNET_SITES.choose(rng).unwrap_or(&INTERNET_SITES[0]);
                (
                    site.domain.to_string(),
                    Action::Allowed,
                    site.category.to_string(),
                    "low".to_string(),
                    INTERNET_SERVICE_NAME.to_string(),
                    Vec::new(),
                )
            }
        };

        let method = select_method(rng);
        let (bytes_sent, bytes_received) = if method == "GET" {
            (rng.gen_range(200..=2000), rng.gen_range(1000..=100_000))
        } else {
            (rng.gen_range(1000..=50_000), rng.gen_range(200..=5000))
        };

        let protocol = "https";
        let source_ip = identity
            .ip_address
            .unwrap_or_else(|| self.allocator.internal_ip(rng));

        TrafficEvent {
            timestamp,
            source_ip,
            destination_ip: self.allocator.destination_ip(rng, &ip_ranges),
            source_port: self.allocator.source_port(rng),
            destination_port: self.allocator.destination_port(protocol),
            username: identity.email.clone(),
            user_domain: self.user_domain.clone(),
            url: format!("https://{}/", domain),
            method,
            status_code: action.status_code(),
            bytes_sent,
            bytes_received,
            duration_ms: rng.gen_range(50..=2000),
            user_agent: USER_AGENTS.choose(rng).unwrap_or(&USER_AGENTS[0]).to_string(),
            referrer: if rng.gen_bool(0.25) {
                Some(REFERRERS.choose(rng).unwrap_or(&REFERRERS[0]).to_string())
            } else {
                None
            },
            action,
            category,
            risk_level,
            service_name,
            protocol,
        }
    }

    /// Pick a service: tier by the 60/30/10 split, then uniform within the
    /// tier. An empty tier falls back to the full catalog.
    fn select_service<R: Rng>(&self, rng: &mut R) -> Option<&ServiceDefinition> {
        let roll: f64 = rng.gen();
        let status = if roll < SANCTIONED_CUMULATIVE {
            ServiceStatus::Sanctioned
        } else if roll < UNSANCTIONED_CUMULATIVE {
            ServiceStatus::Unsanctioned
        } else {
            ServiceStatus::Blocked
        };

        let tier = self.catalog.tier(status);
        match tier.choose(rng) {
            Some(service) => Some(*service),
            None => self.catalog.all().choose(rng),
        }
    }
}

/// Weighted HTTP method table: GET 85%, POST 10%, PUT 3%, DELETE 2%.
fn select_method<R: Rng>(rng: &mut R) -> &'static str {
    let roll: f64 = rng.gen();
    if roll < 0.85 {
        "GET"
    } else if roll < 0.95 {
        "POST"
    } else if roll < 0.98 {
        "PUT"
    } else {
        "DELETE"
    }
}

/// Strip a leading wildcard marker from a domain pattern.
fn strip_wildcard(pattern: &str) -> String {
    pattern
        .strip_prefix("*.")
        .unwrap_or(pattern)
        .trim_start_matches('*')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityPool;
    use crate::services::ServiceCatalog;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn test_identities(count: usize) -> Vec<Identity> {
        IdentityPool::new("example.com", None, Some(11))
            .generate(count)
            .unwrap()
    }

    fn service(name: &str, status: ServiceStatus, domains: &[&str]) -> ServiceDefinition {
        ServiceDefinition {
            name: name.to_string(),
            status,
            category: "Cloud Storage".to_string(),
            risk_level: "medium".to_string(),
            domains: domains.iter().map(|d| d.to_string()).collect(),
            ip_ranges: Vec::new(),
            traffic_override: None,
        }
    }

    fn synthesizer(services: Vec<ServiceDefinition>) -> EventSynthesizer {
        EventSynthesizer::new(
            AddrAllocator::new(&[]).unwrap(),
            ServiceCatalog::new(services),
            "example.com",
        )
    }

    #[test]
    fn test_action_status_code_consistency() {
        let synth = synthesizer(vec![
            service("Dropbox", ServiceStatus::Unsanctioned, &["*.dropbox.com"]),
            service("Tor Gateway", ServiceStatus::Blocked, &["*.torproject.org"]),
        ]);
        let identities = test_identities(5);
        let mut rng = StdRng::seed_from_u64(2024);

        for _ in 0..500 {
            let event = synth.synthesize(&mut rng, Utc::now(), &identities);
            match event.action {
                Action::Allowed => assert_eq!(event.status_code, 200),
                Action::Blocked => assert_eq!(event.status_code, 403),
            }
        }
    }

    #[test]
    fn test_blocked_service_forces_blocked_action() {
        let synth = synthesizer(vec![service(
            "Tor Gateway",
            ServiceStatus::Blocked,
            &["*.torproject.org"],
        )]);
        let identities = test_identities(5);
        let mut rng = StdRng::seed_from_u64(5);

        let mut saw_cloud = false;
        for _ in 0..500 {
            let event = synth.synthesize(&mut rng, Utc::now(), &identities);
            if event.service_name != INTERNET_SERVICE_NAME {
                saw_cloud = true;
                assert_eq!(event.action, Action::Blocked);
                assert_eq!(event.status_code, 403);
            } else {
                assert_eq!(event.action, Action::Allowed);
            }
        }
        assert!(saw_cloud, "no cloud events in 500 draws");
    }

    #[test]
    fn test_unsanctioned_scenario_dropbox() {
        let synth = synthesizer(vec![service(
            "Dropbox",
            ServiceStatus::Unsanctioned,
            &["*.dropbox.com"],
        )]);
        let identities = test_identities(5);
        let mut rng = StdRng::seed_from_u64(6);

        let mut saw_dropbox = false;
        for _ in 0..200 {
            let event = synth.synthesize(&mut rng, Utc::now(), &identities);
            assert!(event.username.ends_with("@example.com"));
            if event.service_name == "Dropbox" {
                saw_dropbox = true;
                let host = event
                    .url
                    .strip_prefix("https://")
                    .unwrap()
                    .trim_end_matches('/');
                assert!(host.ends_with("dropbox.com"), "host: {}", host);
                assert!(!host.contains('*'));
            }
        }
        assert!(saw_dropbox);
    }

    #[test]
    fn test_empty_tier_falls_back_to_full_pool() {
        // Only sanctioned services exist; blocked-tier rolls must still
        // resolve to a service.
        let synth = synthesizer(vec![service(
            "Office 365",
            ServiceStatus::Sanctioned,
            &["*.office.com"],
        )]);
        let identities = test_identities(3);
        let mut rng = StdRng::seed_from_u64(8);

        for _ in 0..300 {
            let event = synth.synthesize(&mut rng, Utc::now(), &identities);
            if event.service_name != INTERNET_SERVICE_NAME {
                assert_eq!(event.service_name, "Office 365");
            }
        }
    }

    #[test]
    fn test_internet_only_when_catalog_empty() {
        let synth = synthesizer(Vec::new());
        let identities = test_identities(3);
        let mut rng = StdRng::seed_from_u64(9);

        for _ in 0..100 {
            let event = synth.synthesize(&mut rng, Utc::now(), &identities);
            assert_eq!(event.service_name, INTERNET_SERVICE_NAME);
            assert_eq!(event.action, Action::Allowed);
        }
    }

    #[test]
    fn test_byte_ranges_by_method() {
        let synth = synthesizer(vec![service(
            "Dropbox",
            ServiceStatus::Unsanctioned,
            &["*.dropbox.com"],
        )]);
        let identities = test_identities(3);
        let mut rng = StdRng::seed_from_u64(10);

        for _ in 0..500 {
            let event = synth.synthesize(&mut rng, Utc::now(), &identities);
            if event.method == "GET" {
                assert!((200..=2000).contains(&event.bytes_sent));
                assert!((1000..=100_000).contains(&event.bytes_received));
            } else {
                assert!((1000..=50_000).contains(&event.bytes_sent));
                assert!((200..=5000).contains(&event.bytes_received));
            }
            assert!((50..=2000).contains(&event.duration_ms));
            assert_eq!(event.protocol, "https");
            assert_eq!(event.destination_port, 443);
            assert!(event.source_port >= 49152);
        }
    }

    #[test]
    fn test_method_distribution_shape() {
        let mut rng = StdRng::seed_from_u64(77);
        let mut gets = 0;
        let n = 10_000;
        for _ in 0..n {
            if select_method(&mut rng) == "GET" {
                gets += 1;
            }
        }
        let ratio = gets as f64 / n as f64;
        assert!((0.82..0.88).contains(&ratio), "GET ratio {}", ratio);
    }

    #[test]
    fn test_strip_wildcard() {
        assert_eq!(strip_wildcard("*.dropbox.com"), "dropbox.com");
        assert_eq!(strip_wildcard("dropbox.com"), "dropbox.com");
        assert_eq!(strip_wildcard("*cdn.example.net"), "cdn.example.net");
    }

    #[test]
    fn test_identity_ip_used_as_source() {
        let synth = synthesizer(Vec::new());
        let mut identities = test_identities(1);
        let fixed: Ipv4Addr = "10.1.2.3".parse().unwrap();
        identities[0].ip_address = Some(fixed);

        let mut rng = StdRng::seed_from_u64(4);
        let event = synth.synthesize(&mut rng, Utc::now(), &identities);
        assert_eq!(event.source_ip, fixed);
    }
}
