//! Endpoint-exposure check: classify the transport and, for network
//! transports, the bind address, TLS posture and default port.

use std::path::Path;

use serde::Serialize;

use super::patterns;
use super::walk;
use super::CheckStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Generic network transport; SSE and WebSocket signals classify here too.
    Http,
    Stdio,
    Unknown,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Http => "http",
            Transport::Stdio => "stdio",
            Transport::Unknown => "unknown",
        }
    }

    fn is_network(&self) -> bool {
        matches!(self, Transport::Http)
    }
}

#[derive(Debug, Serialize)]
pub struct ExposureReport {
    pub status: CheckStatus,
    pub transport: Transport,
    /// `0.0.0.0`, `127.0.0.1` or empty; only present for network transports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_configured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_port: Option<u32>,
}

pub fn check(root: &Path) -> ExposureReport {
    let mut stdio_count = 0usize;
    let mut network_count = 0usize;
    let mut has_bind_all = false;
    let mut has_bind_localhost = false;
    let mut has_tls = false;
    let mut detected_port: Option<u32> = None;

    for path in walk::source_files(root) {
        let Some(content) = walk::read_text(&path) else {
            continue;
        };

        if patterns::STDIO_TRANSPORT.iter().any(|p| p.is_match(&content)) {
            stdio_count += 1;
        }
        if patterns::NETWORK_TRANSPORT.iter().any(|p| p.is_match(&content)) {
            network_count += 1;
        }

        has_bind_all |= patterns::BIND_ALL.is_match(&content);
        has_bind_localhost |= patterns::BIND_LOCALHOST.is_match(&content);
        has_tls |= patterns::TLS.iter().any(|p| p.is_match(&content));

        // Every file with a port match overwrites; the last one visited
        // wins.
        if let Some(port) = extract_port(&content) {
            detected_port = Some(port);
        }
    }

    let transport = if network_count > stdio_count {
        Transport::Http
    } else if stdio_count > 0 {
        Transport::Stdio
    } else {
        Transport::Unknown
    };

    let (bind_address, tls_configured, default_port) = if transport.is_network() {
        let bind = if has_bind_all {
            "0.0.0.0"
        } else if has_bind_localhost {
            "127.0.0.1"
        } else {
            ""
        };
        (Some(bind.to_string()), Some(has_tls), detected_port)
    } else {
        (None, None, None)
    };

    let status = match transport {
        Transport::Stdio | Transport::Unknown => CheckStatus::Pass,
        Transport::Http => {
            if has_bind_all && !has_tls {
                // Listening on every interface with no TLS in sight.
                CheckStatus::Critical
            } else if has_bind_all || !has_tls {
                CheckStatus::Warning
            } else {
                CheckStatus::Pass
            }
        }
    };

    ExposureReport {
        status,
        transport,
        bind_address,
        tls_configured,
        default_port,
    }
}

/// First numeric capture group of the port pattern.
fn extract_port(content: &str) -> Option<u32> {
    let caps = patterns::PORT.captures(content)?;
    (1..caps.len())
        .filter_map(|i| caps.get(i))
        .find_map(|m| m.as_str().parse::<u32>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn scan_fixture(files: &[(&str, &str)]) -> ExposureReport {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        check(dir.path())
    }

    #[test]
    fn bind_all_without_tls_is_critical() {
        let report = scan_fixture(&[(
            "server.js",
            r#"const app = express(); app.listen(3000, "0.0.0.0");"#,
        )]);

        assert_eq!(report.transport, Transport::Http);
        assert_eq!(report.bind_address.as_deref(), Some("0.0.0.0"));
        assert_eq!(report.tls_configured, Some(false));
        assert_eq!(report.default_port, Some(3000));
        assert_eq!(report.status, CheckStatus::Critical);
    }

    #[test]
    fn stdio_transport_passes() {
        let report = scan_fixture(&[(
            "index.ts",
            "const transport = new StdioServerTransport();",
        )]);
        assert_eq!(report.transport, Transport::Stdio);
        assert_eq!(report.status, CheckStatus::Pass);
        assert!(report.bind_address.is_none());
        assert!(report.tls_configured.is_none());
    }

    #[test]
    fn localhost_with_tls_passes() {
        let report = scan_fixture(&[(
            "server.js",
            "http.createServer(); listen({ host: '127.0.0.1' }); const tls = require('tls');",
        )]);
        assert_eq!(report.transport, Transport::Http);
        assert_eq!(report.bind_address.as_deref(), Some("127.0.0.1"));
        assert_eq!(report.tls_configured, Some(true));
        assert_eq!(report.status, CheckStatus::Pass);
    }

    #[test]
    fn localhost_without_tls_is_warning() {
        let report = scan_fixture(&[(
            "server.js",
            "const app = express(); app.listen(8080, '127.0.0.1');",
        )]);
        assert_eq!(report.status, CheckStatus::Warning);
    }

    #[test]
    fn no_transport_signals_is_unknown_and_passes() {
        let report = scan_fixture(&[("util.ts", "export const add = (a, b) => a + b;")]);
        assert_eq!(report.transport, Transport::Unknown);
        assert_eq!(report.status, CheckStatus::Pass);
    }

    #[test]
    fn network_signals_must_outnumber_stdio_signals() {
        // One file of each: 1 network vs 1 stdio means stdio wins.
        let report = scan_fixture(&[
            ("net.ts", "app.listen(3000);"),
            ("stdio.ts", "new StdioServerTransport();"),
        ]);
        assert_eq!(report.transport, Transport::Stdio);
    }

    #[test]
    fn port_is_extracted_from_assignment_forms() {
        assert_eq!(extract_port("const PORT = 9090"), Some(9090));
        assert_eq!(extract_port("--port 7777"), Some(7777));
        assert_eq!(extract_port("nothing here"), None);
    }

    #[test]
    fn every_port_declaring_file_is_considered() {
        // Two files declare ports; the last one visited wins, and walk
        // order is filesystem-dependent, so the result must be one of the
        // declared ports rather than silently sticking to the first hit.
        let report = scan_fixture(&[
            ("server.js", r#"const app = express(); app.listen(3000, "0.0.0.0");"#),
            ("legacy.js", "const PORT = 8080\n"),
        ]);

        assert_eq!(report.transport, Transport::Http);
        let port = report.default_port.expect("a port should be detected");
        assert!(port == 3000 || port == 8080, "unexpected port {port}");
    }
}
