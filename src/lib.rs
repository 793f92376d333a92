//! Traffic Forge Library
//! Synthetic web-gateway traffic log generation for CASB/SIEM pipeline testing

pub mod config;
pub mod event;
pub mod format;
pub mod identity;
pub mod net;
pub mod output;
pub mod services;
pub mod session;
pub mod stats;

// Re-export commonly used types
pub use config::EnterpriseConfig;
pub use event::{Action, EventSynthesizer, TrafficEvent};
pub use format::{CefFormatter, LeefFormatter, LogFormatter};
pub use identity::{Identity, IdentityPool};
pub use services::{ServiceCatalog, ServiceDefinition, ServiceStatus};
pub use session::{BatchDriver, CancelToken, RealtimeDriver};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constant() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "traffic_forge");
    }
}
