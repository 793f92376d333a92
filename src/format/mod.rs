//! Log formatting module
//! Serializes traffic events into vendor wire formats (LEEF, CEF)

pub mod cef;
pub mod leef;

use crate::event::TrafficEvent;

pub use cef::CefFormatter;
pub use leef::LeefFormatter;

/// Emulated gateway vendor identity carried in every log header.
pub const VENDOR: &str = "McAfee";
pub const PRODUCT: &str = "Web Gateway";
pub const PRODUCT_VERSION: &str = "10.15.0.623";

/// A vendor log format. Both implementations consume the same event type,
/// so field-set parity between formats is structural, not accidental.
pub trait LogFormatter: Send {
    /// Short tag used in output file names ("leef", "cef").
    fn tag(&self) -> &'static str;

    /// Serialize one event to a single line with no embedded newlines.
    fn format_event(&self, event: &TrafficEvent) -> String;
}

/// Look up a formatter by its tag.
pub fn formatter_for(tag: &str) -> anyhow::Result<Box<dyn LogFormatter>> {
    match tag {
        "leef" => Ok(Box::new(LeefFormatter::new())),
        "cef" => Ok(Box::new(CefFormatter::new())),
        _ => anyhow::bail!("Unknown log format: {} (expected leef or cef)", tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatter_lookup() {
        assert_eq!(formatter_for("leef").unwrap().tag(), "leef");
        assert_eq!(formatter_for("cef").unwrap().tag(), "cef");
        assert!(formatter_for("json").is_err());
    }
}
