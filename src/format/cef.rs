//! CEF (Common Event Format) formatter
//! Pipe-delimited header, space-separated key=value extension fields

use crate::event::{Action, TrafficEvent};
use crate::format::{LogFormatter, PRODUCT, PRODUCT_VERSION, VENDOR};
use crate::services::INTERNET_SERVICE_NAME;
use std::fmt::Write;

const CEF_VERSION: &str = "0";

/// Signature ID for web traffic events; mirrors the LEEF event ID.
const WEB_TRAFFIC_SIGNATURE_ID: &str = "302";

const EVENT_NAME: &str = "Web Traffic";

/// CEF formatter, sibling of the LEEF one over the same event model.
#[derive(Debug, Default)]
pub struct CefFormatter;

impl CefFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl LogFormatter for CefFormatter {
    fn tag(&self) -> &'static str {
        "cef"
    }

    /// Format one event:
    /// `CEF:0|McAfee|Web Gateway|10.15.0.623|302|Web Traffic|<sev>|`
    /// followed by space-separated key=value extensions.
    fn format_event(&self, event: &TrafficEvent) -> String {
        let mut line = String::with_capacity(512);
        let _ = write!(
            line,
            "CEF:{}|{}|{}|{}|{}|{}|{}|",
            CEF_VERSION,
            escape_header(VENDOR),
            escape_header(PRODUCT),
            escape_header(PRODUCT_VERSION),
            WEB_TRAFFIC_SIGNATURE_ID,
            EVENT_NAME,
            severity(event.action)
        );

        let mut extensions: Vec<String> = vec![
            format!("rt={}", event.timestamp.timestamp_millis()),
            format!("src={}", event.source_ip),
            format!("dst={}", event.destination_ip),
            format!("spt={}", event.source_port),
            format!("dpt={}", event.destination_port),
            format!("suser={}", escape_extension(&event.username)),
            format!("sntdom={}", escape_extension(&event.user_domain)),
            format!("request={}", escape_extension(&event.url)),
            format!("requestMethod={}", event.method),
            format!("app={}", event.protocol.to_uppercase()),
            format!("outcome={}", event.status_code),
            format!("act={}", event.action.as_str()),
            format!("cat={}", escape_extension(&event.category)),
            format!("cs1Label=riskLevel cs1={}", escape_extension(&event.risk_level)),
            format!("in={}", event.bytes_received),
            format!("out={}", event.bytes_sent),
            format!("cn1Label=durationMs cn1={}", event.duration_ms),
            format!(
                "requestClientApplication={}",
                escape_extension(&event.user_agent)
            ),
        ];

        if event.service_name != INTERNET_SERVICE_NAME {
            extensions.push(format!(
                "destinationServiceName={}",
                escape_extension(&event.service_name)
            ));
        }
        if let Some(referrer) = &event.referrer {
            extensions.push(format!("requestContext={}", escape_extension(referrer)));
        }

        line.push_str(&extensions.join(" "));
        line
    }
}

/// Map the gateway decision to the CEF 0-10 severity scale.
fn severity(action: Action) -> u8 {
    match action {
        Action::Allowed => 3,
        Action::Blocked => 6,
    }
}

/// Header fields use `|` as delimiter, so `|` and `\` must be escaped.
fn escape_header(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '|' => out.push_str("\\|"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Extension values use `=` as delimiter; backslashes and line breaks are
/// escaped as well.
fn escape_extension(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '=' => out.push_str("\\="),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}
