// Topology graph: inventory servers become nodes on a radial layout; edges
// come either from group membership (fallback) or from analyzed captures.

use ratatui::style::Color;
use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;

use crate::analysis::{self, AnalysisResult, Role};
use crate::capture::Protocol;
use crate::inventory::{Group, Server, ServerStatus};
use crate::theme;

/// World coordinate space of the map, independent of terminal size.
pub const CANVAS_WIDTH: f64 = 900.0;
pub const CANVAS_HEIGHT: f64 = 700.0;
/// Gap between the layout circle and the canvas border.
pub const LAYOUT_MARGIN: f64 = 80.0;
/// Node disc radius in world units, before zoom.
pub const NODE_RADIUS: f64 = 32.0;

/// A server placed on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub ip: String,
    pub status: ServerStatus,
    pub x: f64,
    pub y: f64,
    pub group_id: Option<String>,
    /// Group ring color, resolved once at rebuild.
    pub ring: Color,
}

/// A drawn link between two nodes. `from`/`to` hold node ids when the
/// endpoint matched the inventory, raw addresses otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub protocol: Option<Protocol>,
    pub role: Option<Role>,
    pub port: Option<String>,
    pub service: Option<String>,
}

impl Edge {
    /// An unannotated link, as used for group fallback edges.
    pub fn plain(from: &str, to: &str) -> Edge {
        Edge {
            from: from.to_string(),
            to: to.to_string(),
            protocol: None,
            role: None,
            port: None,
            service: None,
        }
    }

    /// Midpoint caption: role, protocol, then service name or bare port.
    /// Empty for plain edges, which are drawn without a caption.
    pub fn label(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(role) = self.role {
            parts.push(role.as_str());
        }
        if let Some(protocol) = self.protocol {
            parts.push(protocol.as_str());
        }
        if let Some(service) = self.service.as_deref() {
            parts.push(service);
        } else if let Some(port) = self.port.as_deref() {
            parts.push(port);
        }
        parts.join("/")
    }
}

/// Where the current edge set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeOrigin {
    #[default]
    None,
    GroupFallback,
    Observed,
}

impl EdgeOrigin {
    pub fn label(&self) -> &'static str {
        match self {
            EdgeOrigin::None => "no links",
            EdgeOrigin::GroupFallback => "group fallback",
            EdgeOrigin::Observed => "observed",
        }
    }
}

#[derive(Debug, Default)]
pub struct TopologyGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub origin: EdgeOrigin,
    ip_index: HashMap<String, String>,
}

impl TopologyGraph {
    /// Rebuild nodes and fallback edges from an inventory snapshot. Any
    /// previously observed edges are discarded.
    pub fn rebuild(&mut self, servers: &[Server], groups: &[Group]) {
        self.nodes = layout_nodes(servers, groups);
        self.ip_index = self
            .nodes
            .iter()
            .map(|node| (node.ip.clone(), node.id.clone()))
            .collect();
        self.edges = group_fallback_edges(&self.nodes);
        self.origin = if self.edges.is_empty() {
            EdgeOrigin::None
        } else {
            EdgeOrigin::GroupFallback
        };
    }

    /// Replace the edge set with analyzed connections. An empty result is a
    /// no-op (the fallback stays) and reports `false`.
    pub fn apply_analysis(&mut self, result: &AnalysisResult) -> bool {
        if result.connections.is_empty() {
            return false;
        }
        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for connection in &result.connections {
            let from = self.resolve(&connection.source);
            let to = self.resolve(&connection.target);
            let key =
                analysis::dedup_key(&from, &to, connection.protocol, connection.port.as_deref());
            if !seen.insert(key) {
                continue;
            }
            edges.push(Edge {
                from,
                to,
                protocol: connection.protocol,
                role: connection.role,
                port: connection.port.clone(),
                service: connection.service.clone(),
            });
        }
        self.edges = edges;
        self.origin = EdgeOrigin::Observed;
        true
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn contains_ip(&self, address: &str) -> bool {
        self.ip_index.contains_key(address)
    }

    fn resolve(&self, address: &str) -> String {
        match self.ip_index.get(address) {
            Some(id) => id.clone(),
            None => {
                tracing::debug!(%address, "no inventory match for endpoint, keeping raw address");
                address.to_string()
            }
        }
    }
}

/// Place each server on a circle centered in the canvas, in inventory order
/// starting at three o'clock.
fn layout_nodes(servers: &[Server], groups: &[Group]) -> Vec<Node> {
    let count = servers.len();
    let radius = CANVAS_WIDTH.min(CANVAS_HEIGHT) / 2.0 - LAYOUT_MARGIN;
    let center_x = CANVAS_WIDTH / 2.0;
    let center_y = CANVAS_HEIGHT / 2.0;

    servers
        .iter()
        .enumerate()
        .map(|(index, server)| {
            let angle = (index as f64 / count as f64) * 2.0 * PI;
            let ring = server
                .group_id
                .as_deref()
                .and_then(|id| groups.iter().find(|group| group.id == id))
                .and_then(|group| theme::parse_hex_color(&group.color))
                .unwrap_or(theme::RING_DEFAULT);
            Node {
                id: server.id.clone(),
                label: server.hostname.clone(),
                ip: server.ip_address.clone(),
                status: server.status,
                x: center_x + radius * angle.cos(),
                y: center_y + radius * angle.sin(),
                group_id: server.group_id.clone(),
                ring,
            }
        })
        .collect()
}

/// Link every pair of nodes sharing a group, in inventory order. Used until
/// a capture shows real traffic.
fn group_fallback_edges(nodes: &[Node]) -> Vec<Edge> {
    let mut grouped: Vec<(&str, Vec<&Node>)> = Vec::new();
    for node in nodes {
        let Some(group) = node.group_id.as_deref() else {
            continue;
        };
        match grouped.iter_mut().find(|(id, _)| *id == group) {
            Some((_, members)) => members.push(node),
            None => grouped.push((group, vec![node])),
        }
    }

    let mut edges = Vec::new();
    for (_, members) in &grouped {
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                edges.push(Edge::plain(&members[i].id, &members[j].id));
            }
        }
    }
    edges
}
