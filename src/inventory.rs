// CMDB inventory snapshot: servers and server groups, loaded from JSON.

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

/// Health of an inventoried server, as recorded by the monitoring side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Online,
    Warning,
    Offline,
}

/// One inventoried host. Unknown JSON fields (metrics, timestamps) are
/// ignored so richer CMDB exports load as-is.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Server {
    pub id: String,
    pub hostname: String,
    pub ip_address: String,
    pub status: ServerStatus,
    #[serde(default)]
    pub group_id: Option<String>,
}

/// A named server group with a display color (`#rrggbb`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub color: String,
}

pub fn load_servers(path: &Path) -> anyhow::Result<Vec<Server>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading inventory file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("parsing inventory file {}", path.display()))
}

pub fn load_groups(path: &Path) -> anyhow::Result<Vec<Group>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading group file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("parsing group file {}", path.display()))
}

/// Built-in inventory for `--demo` runs.
pub fn demo_servers() -> Vec<Server> {
    let entry = |id: &str, hostname: &str, ip: &str, status, group: &str| Server {
        id: id.to_string(),
        hostname: hostname.to_string(),
        ip_address: ip.to_string(),
        status,
        group_id: Some(group.to_string()),
    };
    vec![
        entry("1", "web-server-01", "192.168.1.100", ServerStatus::Online, "g-web"),
        entry("2", "db-server-01", "192.168.1.101", ServerStatus::Online, "g-data"),
        entry("3", "app-server-01", "192.168.1.102", ServerStatus::Warning, "g-web"),
        entry("4", "backup-server-01", "192.168.1.103", ServerStatus::Offline, "g-data"),
    ]
}

pub fn demo_groups() -> Vec<Group> {
    vec![
        Group {
            id: "g-web".to_string(),
            name: "Web Tier".to_string(),
            color: "#3b82f6".to_string(),
        },
        Group {
            id: "g-data".to_string(),
            name: "Data Tier".to_string(),
            color: "#8b5cf6".to_string(),
        },
    ]
}
