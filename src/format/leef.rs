//! LEEF (Log Event Extended Format) formatter
//! Pipe-delimited header, tab-separated key=value extension fields

use crate::event::TrafficEvent;
use crate::format::{LogFormatter, PRODUCT, PRODUCT_VERSION, VENDOR};
use crate::services::INTERNET_SERVICE_NAME;
use std::fmt::Write;

const LEEF_VERSION: &str = "2.0";

/// Event ID for web traffic events in the emulated gateway's schema.
const WEB_TRAFFIC_EVENT_ID: &str = "302";

/// LEEF formatter for the emulated web gateway.
#[derive(Debug, Default)]
pub struct LeefFormatter;

impl LeefFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl LogFormatter for LeefFormatter {
    fn tag(&self) -> &'static str {
        "leef"
    }

    /// Format one event:
    /// `LEEF:2.0|McAfee|Web Gateway|10.15.0.623|302|` followed by
    /// tab-separated key=value pairs in fixed order.
    fn format_event(&self, event: &TrafficEvent) -> String {
        let mut line = String::with_capacity(512);
        let _ = write!(
            line,
            "LEEF:{}|{}|{}|{}|{}|",
            LEEF_VERSION, VENDOR, PRODUCT, PRODUCT_VERSION, WEB_TRAFFIC_EVENT_ID
        );

        let dev_time = event.timestamp.format("%b %d %Y %H:%M:%S%.3f");

        let mut fields: Vec<String> = vec![
            format!("devTime={}", dev_time),
            format!("src={}", event.source_ip),
            format!("dst={}", event.destination_ip),
            format!("srcPort={}", event.source_port),
            format!("dstPort={}", event.destination_port),
            format!("usrName={}", escape_value(&event.username)),
            format!("domain={}", escape_value(&event.user_domain)),
            format!("request={}", escape_value(&event.url)),
            format!("method={}", event.method),
            format!("proto={}", event.protocol),
            format!("status={}", event.status_code),
            format!("action={}", event.action.as_str()),
            format!("cat={}", escape_value(&event.category)),
            format!("riskLevel={}", escape_value(&event.risk_level)),
            format!("bytesIn={}", event.bytes_received),
            format!("bytesOut={}", event.bytes_sent),
            format!("responseTime={}", event.duration_ms),
            format!("userAgent={}", escape_value(&event.user_agent)),
        ];

        // Application name only for actual cloud services
        if event.service_name != INTERNET_SERVICE_NAME {
            fields.push(format!("app={}", escape_value(&event.service_name)));
        }
        if let Some(referrer) = &event.referrer {
            fields.push(format!("referrer={}", escape_value(referrer)));
        }

        line.push_str(&fields.join("\t"));
        line
    }
}

/// Escape LEEF value text: backslash, pipe, and line breaks would otherwise
/// break the delimiter contract downstream parsers rely on.
fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '|' => out.push_str("\\|"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Action;
    use chrono::TimeZone;
    use chrono::Utc;

    fn sample_event() -> TrafficEvent {
        TrafficEvent {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 15).unwrap(),
            source_ip: "10.1.2.3".parse().unwrap(),
            destination_ip: "162.125.4.5".parse().unwrap(),
            source_port: 51234,
            destination_port: 443,
            username: "maria.garcia@example.com".to_string(),
            user_domain: "example.com".to_string(),
            url: "https://dropbox.com/".to_string(),
            method: "GET",
            status_code: 200,
            bytes_sent: 1200,
            bytes_received: 45000,
            duration_ms: 320,
            user_agent: "Mozilla/5.0 Test".to_string(),
            referrer: None,
            action: Action::Allowed,
            category: "Cloud Storage".to_string(),
            risk_level: "medium".to_string(),
            service_name: "Dropbox".to_string(),
            protocol: "https",
        }
    }

    #[test]
    fn test_escape_value() {
        assert_eq!(escape_value("plain"), "plain");
        assert_eq!(escape_value("a|b"), "a\\|b");
        assert_eq!(escape_value("a\\b"), "a\\\\b");
        assert_eq!(escape_value("line\nbreak"), "line\\nbreak");
        assert_eq!(escape_value("cr\rhere"), "cr\\rhere");
    }

    #[test]
    fn test_header_and_timestamp() {
        let line = LeefFormatter::new().format_event(&sample_event());
        assert!(line.starts_with("LEEF:2.0|McAfee|Web Gateway|10.15.0.623|302|"));
        assert!(line.contains("devTime=Mar 05 2024 14:30:15.000"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_field_order_and_count() {
        let line = LeefFormatter::new().format_event(&sample_event());
        let body = line.splitn(6, '|').nth(5).unwrap();
        let keys: Vec<&str> = body
            .split('\t')
            .map(|f| f.split('=').next().unwrap())
            .collect();

        assert_eq!(
            keys,
            vec![
                "devTime",
                "src",
                "dst",
                "srcPort",
                "dstPort",
                "usrName",
                "domain",
                "request",
                "method",
                "proto",
                "status",
                "action",
                "cat",
                "riskLevel",
                "bytesIn",
                "bytesOut",
                "responseTime",
                "userAgent",
                "app",
            ]
        );
    }

    #[test]
    fn test_special_characters_round_trip() {
        let mut event = sample_event();
        event.url = "https://dropbox.com/path|with\\chars".to_string();
        let line = LeefFormatter::new().format_event(&event);

        assert!(line.contains("request=https://dropbox.com/path\\|with\\\\chars"));

        // The extension body still splits into the documented field count
        let body = line.splitn(6, '|').nth(5).unwrap();
        assert_eq!(body.split('\t').count(), 19);
    }

    #[test]
    fn test_internet_traffic_omits_app() {
        let mut event = sample_event();
        event.service_name = INTERNET_SERVICE_NAME.to_string();
        let line = LeefFormatter::new().format_event(&event);
        assert!(!line.contains("app="));
    }

    #[test]
    fn test_referrer_included_when_present() {
        let mut event = sample_event();
        event.referrer = Some("https://www.google.com/".to_string());
        let line = LeefFormatter::new().format_event(&event);
        assert!(line.ends_with("referrer=https://www.google.com/"));
    }

    #[test]
    fn test_blocked_event_fields() {
        let mut event = sample_event();
        event.action = Action::Blocked;
        event.status_code = 403;
        let line = LeefFormatter::new().format_event(&event);
        assert!(line.contains("action=blocked"));
        assert!(line.contains("status=403"));
    }

    #[test]
    fn test_millisecond_precision() {
        let mut event = sample_event();
        event.timestamp = Utc.timestamp_opt(1709649015, 123_000_000).unwrap();
        let line = LeefFormatter::new().format_event(&event);
        assert!(line.contains(".123\t") || line.contains(".123"), "{}", line);
    }
}
