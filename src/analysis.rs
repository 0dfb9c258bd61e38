// Connection annotation: service naming, client/server role inference, and
// duplicate collapsing. Output order follows capture order.

use serde::Serialize;
use std::collections::HashSet;

use crate::capture::{self, Dialect, ParseOutcome, Protocol, RawObservation};

/// Service names for ports that identify a service on sight.
pub const WELL_KNOWN_PORTS: &[(u16, &str)] = &[
    (22, "ssh"),
    (25, "smtp"),
    (53, "dns"),
    (80, "http"),
    (110, "pop3"),
    (143, "imap"),
    (443, "https"),
    (3306, "mysql"),
    (5432, "postgres"),
    (6379, "redis"),
    (8080, "http-alt"),
    (9100, "node-exporter"),
    (27017, "mongodb"),
];

pub fn service_for_port(port: &str) -> Option<&'static str> {
    let number: u16 = port.parse().ok()?;
    WELL_KNOWN_PORTS
        .iter()
        .find(|(candidate, _)| *candidate == number)
        .map(|(_, name)| *name)
}

/// Which side of the observation the source host played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Server,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Server => "server",
        }
    }
}

/// A parsed observation enriched with role and service labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedConnection {
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

/// Attach role and service labels to one observation.
///
/// A well-known destination port means the source is a client of that
/// service; a well-known source port means the source is serving it. The
/// destination wins when both ports are recognizable. The canonical `port`
/// is the recognized one, or whichever side reported a port at all.
pub fn annotate(observation: RawObservation) -> AnnotatedConnection {
    let RawObservation {
        source_addr,
        dest_addr,
        protocol,
        source_port,
        dest_port,
    } = observation;

    let dest_service = dest_port.as_deref().and_then(service_for_port);
    let source_service = source_port.as_deref().and_then(service_for_port);

    let (role, port, service) = if let Some(name) = dest_service {
        (Some(Role::Client), dest_port, Some(name.to_string()))
    } else if let Some(name) = source_service {
        (Some(Role::Server), source_port, Some(name.to_string()))
    } else {
        (None, source_port.or(dest_port), None)
    };

    AnnotatedConnection {
        source: source_addr,
        target: dest_addr,
        protocol,
        port,
        role,
        service,
    }
}

/// Identity of a connection: endpoints, protocol, and the canonical port.
/// Role and service are derived and never part of the key. The graph builder
/// reuses this after endpoint resolution, so both dedup passes agree.
pub fn dedup_key(
    source: &str,
    target: &str,
    protocol: Option<Protocol>,
    port: Option<&str>,
) -> String {
    format!(
        "{}|{}|{}|{}",
        source,
        target,
        protocol.map(|p| p.as_str()).unwrap_or(""),
        port.unwrap_or("")
    )
}

pub fn connection_key(connection: &AnnotatedConnection) -> String {
    dedup_key(
        &connection.source,
        &connection.target,
        connection.protocol,
        connection.port.as_deref(),
    )
}

/// Drop repeat observations, keeping the first of each key.
pub fn dedup_connections(connections: Vec<AnnotatedConnection>) -> Vec<AnnotatedConnection> {
    let mut seen = HashSet::new();
    connections
        .into_iter()
        .filter(|connection| seen.insert(connection_key(connection)))
        .collect()
}

/// Final product of one analysis pass. The serialized shape is the contract
/// of the exported JSON, consumed by the server auto-create workflow.
#[derive(Debug, Default, Serialize)]
pub struct AnalysisResult {
    pub connections: Vec<AnnotatedConnection>,
    pub discovered_ips: Vec<String>,
}

/// Parse, annotate, and deduplicate a capture in one step.
pub fn analyze(content: &str, dialect: Dialect) -> Result<AnalysisResult, AnalysisError> {
    Ok(annotate_outcome(capture::parse_capture(content, dialect)?))
}

pub fn annotate_outcome(outcome: ParseOutcome) -> AnalysisResult {
    let annotated = outcome.observations.into_iter().map(annotate).collect();
    AnalysisResult {
        connections: dedup_connections(annotated),
        discovered_ips: outcome.addresses,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("content does not look like {dialect} output; pick the matching capture type")]
    FormatMismatch { dialect: Dialect },
    #[error("could not read capture file {path}: {source}")]
    UnreadableCapture {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
