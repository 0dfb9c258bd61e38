// Diagnostic capture parsing: netstat, lsof, and tcpdump text dumps.
//
// Each dialect gets a cheap format check before any extraction runs, so a
// mismatched upload fails loudly instead of producing an empty graph.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::analysis::AnalysisError;

/// How many leading lines the format validators inspect.
const VALIDATION_WINDOW: usize = 20;

static TIMESTAMP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{2}:\d{2}:\d{2}\.\d+").expect("valid regex"));
static DOTTED_QUAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\.\d+\.\d+\.\d+").expect("valid regex"));
static VALID_ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+\.\d+\.\d+$").expect("valid regex"));
static ADDR_PORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+\.\d+\.\d+\.\d+):(\d+)").expect("valid regex"));
static WILDCARD_PORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:0\.0\.0\.0|::):(\d+)").expect("valid regex"));
static LSOF_SOCKET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:TCP|UDP)\s+(\d+\.\d+\.\d+\.\d+):(\d+)(?:->(\d+\.\d+\.\d+\.\d+):(\d+))?")
        .expect("valid regex")
});
static TCPDUMP_FLOW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"IP\s+(\d+\.\d+\.\d+\.\d+)\.(\d+)\s+>\s+(\d+\.\d+\.\d+\.\d+)\.(\d+)")
        .expect("valid regex")
});

/// Supported diagnostic text dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Dialect {
    Netstat,
    Lsof,
    Tcpdump,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Netstat => "netstat",
            Dialect::Lsof => "lsof",
            Dialect::Tcpdump => "tcpdump",
        }
    }

    /// Guess the dialect from a file name, mirroring the upload picker:
    /// `tcpdump`/`.pcap` beats `lsof` beats `netstat`.
    pub fn guess_from_name(name: &str) -> Option<Dialect> {
        let name = name.to_ascii_lowercase();
        if name.contains("tcpdump") || name.contains(".pcap") {
            Some(Dialect::Tcpdump)
        } else if name.contains("lsof") {
            Some(Dialect::Lsof)
        } else if name.contains("netstat") {
            Some(Dialect::Netstat)
        } else {
            None
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport protocol of an observed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }

    /// Protocol from the leading token of a netstat line. Folds address-family
    /// variants (`tcp6`, `udp6`) onto their base protocol.
    fn from_leading_token(text: &str) -> Option<Protocol> {
        // Fallible prefix take: byte 3 can fall inside a multibyte character
        // on localized header lines.
        let prefix = text.trim_start().get(..3)?;
        if prefix.eq_ignore_ascii_case("tcp") {
            Some(Protocol::Tcp)
        } else if prefix.eq_ignore_ascii_case("udp") {
            Some(Protocol::Udp)
        } else {
            None
        }
    }
}

/// One observed (source, destination, protocol, port) tuple. Transient parser
/// output; addresses are raw strings, not yet matched against the inventory.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    pub source_addr: String,
    pub dest_addr: String,
    pub protocol: Option<Protocol>,
    pub source_port: Option<String>,
    pub dest_port: Option<String>,
}

/// Everything one capture yielded: edge-forming observations plus every valid
/// address that appeared, in first-seen order.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub observations: Vec<RawObservation>,
    pub addresses: Vec<String>,
    /// Membership index over `addresses`.
    seen: HashSet<String>,
}

impl ParseOutcome {
    /// Record an address if it passes the validity predicate and is new.
    pub fn note_address(&mut self, address: &str) {
        if is_valid_address(address) && !self.seen.contains(address) {
            self.seen.insert(address.to_string());
            self.addresses.push(address.to_string());
        }
    }
}

/// An address counts for the graph iff it is a dotted quad and neither
/// loopback (`127.*`) nor all-zeros (`0.*`).
pub fn is_valid_address(address: &str) -> bool {
    VALID_ADDRESS_RE.is_match(address)
        && !address.starts_with("127.")
        && !address.starts_with("0.")
}

/// Check that the content plausibly matches the declared dialect. Only the
/// first few lines are inspected; extraction never runs on a failed check.
pub fn validate_format(content: &str, dialect: Dialect) -> bool {
    let window: Vec<&str> = content.lines().take(VALIDATION_WINDOW).collect();
    match dialect {
        // Header words, or a data line leading with the protocol token. The
        // token must lead the line: lsof and tcpdump content also contains
        // TCP/UDP words, but never at the start of a line.
        Dialect::Netstat => window.iter().any(|line| {
            line.contains("Proto")
                || line.contains("Active")
                || Protocol::from_leading_token(line).is_some()
        }),
        // The column header and at least one socket line. netstat content has
        // protocol words but no COMMAND header; tcpdump has neither.
        Dialect::Lsof => {
            window.iter().any(|line| {
                line.contains("COMMAND") && line.contains("PID") && line.contains("USER")
            }) && window
                .iter()
                .any(|line| line.contains("TCP") || line.contains("UDP"))
        }
        Dialect::Tcpdump => window
            .iter()
            .any(|line| TIMESTAMP_RE.is_match(line) && DOTTED_QUAD_RE.is_match(line)),
    }
}

/// Parse a capture into observations and discovered addresses.
///
/// Lines are independent; a line that does not match its dialect's data
/// pattern is skipped without error.
pub fn parse_capture(content: &str, dialect: Dialect) -> Result<ParseOutcome, AnalysisError> {
    if !validate_format(content, dialect) {
        return Err(AnalysisError::FormatMismatch { dialect });
    }

    let mut outcome = ParseOutcome::default();
    for line in content.lines() {
        match dialect {
            Dialect::Netstat => extract_netstat_line(line, &mut outcome),
            Dialect::Lsof => extract_lsof_line(line, &mut outcome),
            Dialect::Tcpdump => extract_tcpdump_line(line, &mut outcome),
        }
    }
    Ok(outcome)
}

/// Split an `address:port` column. Wildcard listeners (`0.0.0.0:80`, `:::80`)
/// parse to the all-zeros sentinel so the port stays observable even though
/// the address never becomes a graph peer.
fn parse_ip_port(column: &str) -> Option<(String, String)> {
    if let Some(caps) = ADDR_PORT_RE.captures(column) {
        return Some((caps[1].to_string(), caps[2].to_string()));
    }
    let caps = WILDCARD_PORT_RE.captures(column)?;
    Some(("0.0.0.0".to_string(), caps[1].to_string()))
}

// netstat: `tcp  0  0  <local addr:port>  <foreign addr:port>  STATE`
fn extract_netstat_line(line: &str, outcome: &mut ParseOutcome) {
    let line = line.trim();
    let Some(protocol) = Protocol::from_leading_token(line) else {
        return;
    };
    let columns: Vec<&str> = line.split_whitespace().collect();
    if columns.len() < 5 {
        return;
    }
    let Some((local_addr, local_port)) = parse_ip_port(columns[3]) else {
        return;
    };
    let Some((foreign_addr, foreign_port)) = parse_ip_port(columns[4]) else {
        return;
    };

    outcome.note_address(&local_addr);
    outcome.note_address(&foreign_addr);
    if is_valid_address(&local_addr) && is_valid_address(&foreign_addr) {
        outcome.observations.push(RawObservation {
            source_addr: local_addr,
            dest_addr: foreign_addr,
            protocol: Some(protocol),
            source_port: Some(local_port),
            dest_port: Some(foreign_port),
        });
    }
}

// lsof: `... TCP 10.0.0.5:8080->10.0.0.9:54321 (ESTABLISHED)`; a line
// without the `->` arm is a listening socket and yields an address hint only.
fn extract_lsof_line(line: &str, outcome: &mut ParseOutcome) {
    let Some(caps) = LSOF_SOCKET_RE.captures(line) else {
        return;
    };
    let protocol = if line.contains("TCP") {
        Protocol::Tcp
    } else {
        Protocol::Udp
    };
    let source_addr = caps[1].to_string();
    let source_port = caps[2].to_string();
    outcome.note_address(&source_addr);

    let (Some(dest_addr), Some(dest_port)) = (caps.get(3), caps.get(4)) else {
        return;
    };
    outcome.note_address(dest_addr.as_str());
    if is_valid_address(&source_addr) && is_valid_address(dest_addr.as_str()) {
        outcome.observations.push(RawObservation {
            source_addr,
            dest_addr: dest_addr.as_str().to_string(),
            protocol: Some(protocol),
            source_port: Some(source_port),
            dest_port: Some(dest_port.as_str().to_string()),
        });
    }
}

// tcpdump: `IP 10.0.0.5.54321 > 10.0.0.10.22: ...`; UDP iff the line carries
// the token anywhere (tcpdump prints it per packet), else TCP.
fn extract_tcpdump_line(line: &str, outcome: &mut ParseOutcome) {
    let Some(caps) = TCPDUMP_FLOW_RE.captures(line) else {
        return;
    };
    let protocol = if line.to_ascii_lowercase().contains("udp") {
        Protocol::Udp
    } else {
        Protocol::Tcp
    };
    let source_addr = caps[1].to_string();
    let dest_addr = caps[3].to_string();

    outcome.note_address(&source_addr);
    outcome.note_address(&dest_addr);
    if is_valid_address(&source_addr) && is_valid_address(&dest_addr) {
        outcome.observations.push(RawObservation {
            source_addr,
            dest_addr,
            protocol: Some(protocol),
            source_port: Some(caps[2].to_string()),
            dest_port: Some(caps[4].to_string()),
        });
    }
}
