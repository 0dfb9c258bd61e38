// Application state management

use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::analysis::{self, AnalysisError, AnalysisResult};
use crate::capture::Dialect;
use crate::graph::TopologyGraph;
use crate::inventory::{self, Group, Server};
use crate::live;
use crate::view::Viewport;

pub mod event;

/// Event poll interval for the main loop in milliseconds
pub const TICK_MS: u64 = 200;

/// How long a status-bar notice stays visible
const NOTICE_TTL: Duration = Duration::from_secs(6);

/// Where the inventory snapshot comes from
#[derive(Debug, Clone)]
pub enum InventorySource {
    /// JSON files re-read on the refresh period
    Files { servers: PathBuf, groups: PathBuf },
    /// Built-in sample inventory
    Demo,
}

/// A capture file plus the dialect to parse it as
#[derive(Debug, Clone)]
pub struct CaptureSource {
    pub path: PathBuf,
    pub dialect: Dialect,
}

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub inventory: InventorySource,
    pub capture: Option<CaptureSource>,
    /// Inventory re-read period in seconds; 0 disables re-reading
    pub refresh_secs: u64,
    pub export_path: PathBuf,
}

/// What produced the current analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisSource {
    Capture(Dialect),
    Live,
}

impl fmt::Display for AnalysisSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisSource::Capture(dialect) => write!(f, "{dialect} capture"),
            AnalysisSource::Live => f.write_str("live sockets"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A transient status-bar message
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    raised: Instant,
}

/// Main application state
pub struct AppState {
    /// Whether the application is running
    pub running: bool,

    /// Resolved configuration
    pub config: AppConfig,

    /// Current inventory snapshot
    pub servers: Vec<Server>,
    pub groups: Vec<Group>,

    /// Topology built from the snapshot and the latest analysis
    pub graph: TopologyGraph,

    /// Map pan/zoom state
    pub viewport: Viewport,

    /// Last analysis output, kept for the export command
    pub last_analysis: Option<AnalysisResult>,

    /// What produced `last_analysis`
    pub analysis_source: Option<AnalysisSource>,

    /// Currently selected edge index (connection list panel)
    pub selected_edge: Option<usize>,

    /// List state for the connection list (enables scrolling)
    pub edge_list_state: ListState,

    /// Current status-bar notice, if any
    pub notice: Option<Notice>,

    /// Map widget area from the last draw, for mouse hit testing
    pub map_area: Rect,

    /// Last time the inventory files were (re)checked
    last_inventory_check: Instant,
}

impl AppState {
    /// Load the inventory and build the initial graph.
    pub fn new(config: AppConfig) -> anyhow::Result<AppState> {
        let (servers, groups) = load_inventory(&config.inventory)?;
        let mut graph = TopologyGraph::default();
        graph.rebuild(&servers, &groups);
        tracing::info!(
            servers = servers.len(),
            groups = groups.len(),
            "inventory loaded"
        );

        Ok(AppState {
            running: true,
            config,
            servers,
            groups,
            graph,
            viewport: Viewport::default(),
            last_analysis: None,
            analysis_source: None,
            selected_edge: None,
            edge_list_state: ListState::default(),
            notice: None,
            map_area: Rect::default(),
            last_inventory_check: Instant::now(),
        })
    }

    /// Update state on each tick: expire the notice, re-read the inventory
    /// when the refresh period elapsed.
    pub fn on_tick(&mut self) {
        let now = Instant::now();

        if let Some(notice) = &self.notice {
            if now.duration_since(notice.raised) >= NOTICE_TTL {
                self.notice = None;
            }
        }

        let refresh = Duration::from_secs(self.config.refresh_secs);
        if !refresh.is_zero() && now.duration_since(self.last_inventory_check) >= refresh {
            self.reload_inventory();
        }
    }

    /// Re-read the inventory. An unchanged snapshot leaves the graph alone,
    /// observed edges included; a changed one rebuilds it from scratch.
    pub fn reload_inventory(&mut self) {
        self.last_inventory_check = Instant::now();
        match load_inventory(&self.config.inventory) {
            Ok((servers, groups)) => {
                if servers == self.servers && groups == self.groups {
                    return;
                }
                tracing::info!(servers = servers.len(), "inventory changed, rebuilding graph");
                self.servers = servers;
                self.groups = groups;
                self.graph.rebuild(&self.servers, &self.groups);
                self.clamp_edge_selection();
                self.info("inventory updated");
            }
            Err(error) => {
                // Keep the previous snapshot on failure.
                tracing::warn!(error = %error, "inventory reload failed");
                self.warn(format!("inventory reload failed: {error:#}"));
            }
        }
    }

    /// Parse and apply the configured capture file.
    pub fn analyze_capture(&mut self) {
        let Some(source) = self.config.capture.clone() else {
            self.warn("no capture file configured (start with --capture)");
            return;
        };

        let content = match std::fs::read_to_string(&source.path) {
            Ok(content) => content,
            Err(io_error) => {
                let error = AnalysisError::UnreadableCapture {
                    path: source.path.display().to_string(),
                    source: io_error,
                };
                tracing::warn!(error = %error, "capture read failed");
                self.error(error.to_string());
                return;
            }
        };

        match analysis::analyze(&content, source.dialect) {
            Ok(result) => self.finish_analysis(result, AnalysisSource::Capture(source.dialect)),
            Err(error) => {
                tracing::warn!(error = %error, "capture analysis failed");
                self.error(error.to_string());
            }
        }
    }

    /// Sample the local machine's sockets and apply them.
    pub fn analyze_live(&mut self) {
        match live::sample_local_sockets() {
            Ok(outcome) => {
                self.finish_analysis(analysis::annotate_outcome(outcome), AnalysisSource::Live)
            }
            Err(error) => {
                tracing::warn!(error = %error, "socket sampling failed");
                self.error(format!("socket sampling failed: {error:#}"));
            }
        }
    }

    fn finish_analysis(&mut self, result: AnalysisResult, source: AnalysisSource) {
        let connections = result.connections.len();
        let discovered = result.discovered_ips.len();
        let applied = self.graph.apply_analysis(&result);
        self.last_analysis = Some(result);
        self.analysis_source = Some(source);
        self.clamp_edge_selection();

        if applied {
            tracing::info!(connections, discovered, source = %source, "analysis applied");
            self.info(format!(
                "{source}: {connections} connections, {discovered} addresses"
            ));
        } else {
            self.warn(format!("{source}: no connections found, keeping group links"));
        }
    }

    /// Write the last analysis as JSON to the export path.
    pub fn export_analysis(&mut self) {
        let Some(result) = &self.last_analysis else {
            self.warn("nothing to export yet; run an analysis first");
            return;
        };

        let written = serde_json::to_string_pretty(result)
            .map_err(anyhow::Error::from)
            .and_then(|json| {
                std::fs::write(&self.config.export_path, json).map_err(anyhow::Error::from)
            });
        match written {
            Ok(()) => {
                let path = self.config.export_path.display().to_string();
                tracing::info!(path = %path, "analysis exported");
                self.info(format!("exported to {path}"));
            }
            Err(error) => {
                tracing::warn!(error = %error, "export failed");
                self.error(format!("export failed: {error}"));
            }
        }
    }

    /// Whether a discovered address matches an inventoried server.
    pub fn is_known_address(&self, address: &str) -> bool {
        self.graph.contains_ip(address)
    }

    /// Move edge selection up (decrease index)
    pub fn select_previous_edge(&mut self) {
        if self.graph.edges.is_empty() {
            self.selected_edge = None;
            self.edge_list_state.select(None);
            return;
        }

        match self.selected_edge {
            None => {
                // Start at the last edge
                let idx = self.graph.edges.len() - 1;
                self.selected_edge = Some(idx);
                self.edge_list_state.select(Some(idx));
            }
            Some(idx) => {
                if idx > 0 {
                    self.selected_edge = Some(idx - 1);
                    self.edge_list_state.select(Some(idx - 1));
                }
            }
        }
    }

    /// Move edge selection down (increase index)
    pub fn select_next_edge(&mut self) {
        if self.graph.edges.is_empty() {
            self.selected_edge = None;
            self.edge_list_state.select(None);
            return;
        }

        match self.selected_edge {
            None => {
                self.selected_edge = Some(0);
                self.edge_list_state.select(Some(0));
            }
            Some(idx) => {
                if idx < self.graph.edges.len() - 1 {
                    self.selected_edge = Some(idx + 1);
                    self.edge_list_state.select(Some(idx + 1));
                }
            }
        }
    }

    /// Keep the selection valid after the edge set changed.
    fn clamp_edge_selection(&mut self) {
        if let Some(idx) = self.selected_edge {
            if idx >= self.graph.edges.len() {
                let last = self.graph.edges.len().checked_sub(1);
                self.selected_edge = last;
                self.edge_list_state.select(last);
            }
        }
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.raise(NoticeLevel::Info, text);
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        self.raise(NoticeLevel::Warning, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.raise(NoticeLevel::Error, text);
    }

    fn raise(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.notice = Some(Notice {
            level,
            text: text.into(),
            raised: Instant::now(),
        });
    }
}

fn load_inventory(source: &InventorySource) -> anyhow::Result<(Vec<Server>, Vec<Group>)> {
    match source {
        InventorySource::Demo => Ok((inventory::demo_servers(), inventory::demo_groups())),
        InventorySource::Files { servers, groups } => Ok((
            inventory::load_servers(servers)?,
            inventory::load_groups(groups)?,
        )),
    }
}

#[cfg(test)]
pub(crate) fn demo_state() -> AppState {
    AppState::new(AppConfig {
        inventory: InventorySource::Demo,
        capture: None,
        refresh_secs: 0,
        export_path: PathBuf::from("netatlas-analysis.json"),
    })
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeOrigin;
    use proptest::prelude::*;
    use std::io::Write;

    const CAPTURE: &str = "\
Proto Recv-Q Send-Q Local Address           Foreign Address         State
tcp        0      0 192.168.1.100:51342     192.168.1.101:5432      ESTABLISHED
tcp        0      0 192.168.1.100:80        203.0.113.5:40012       ESTABLISHED
";

    fn state_with_capture(content: &str, dialect: Dialect) -> (AppState, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let mut app = demo_state();
        app.config.capture = Some(CaptureSource {
            path: file.path().to_path_buf(),
            dialect,
        });
        (app, file)
    }

    #[test]
    fn test_capture_analysis_updates_graph() {
        let (mut app, _file) = state_with_capture(CAPTURE, Dialect::Netstat);
        assert_eq!(app.graph.origin, EdgeOrigin::GroupFallback);

        app.analyze_capture();
        assert_eq!(app.graph.origin, EdgeOrigin::Observed);
        assert_eq!(app.graph.edges.len(), 2);
        assert_eq!(app.notice.as_ref().unwrap().level, NoticeLevel::Info);
        assert_eq!(
            app.analysis_source,
            Some(AnalysisSource::Capture(Dialect::Netstat))
        );
        assert_eq!(app.last_analysis.as_ref().unwrap().connections.len(), 2);
    }

    #[test]
    fn test_missing_capture_file_leaves_graph_alone() {
        let mut app = demo_state();
        app.config.capture = Some(CaptureSource {
            path: PathBuf::from("/nonexistent/netstat.txt"),
            dialect: Dialect::Netstat,
        });

        app.analyze_capture();
        assert_eq!(app.graph.origin, EdgeOrigin::GroupFallback);
        assert_eq!(app.notice.as_ref().unwrap().level, NoticeLevel::Error);
        assert!(app.last_analysis.is_none());
    }

    #[test]
    fn test_mismatched_dialect_leaves_graph_alone() {
        let (mut app, _file) = state_with_capture(CAPTURE, Dialect::Tcpdump);

        app.analyze_capture();
        assert_eq!(app.graph.origin, EdgeOrigin::GroupFallback);
        assert_eq!(app.notice.as_ref().unwrap().level, NoticeLevel::Error);
        assert!(app.last_analysis.is_none());
    }

    #[test]
    fn test_empty_capture_keeps_fallback_edges() {
        let (mut app, _file) =
            state_with_capture("Proto Recv-Q Send-Q Local Address\n", Dialect::Netstat);
        let fallback = app.graph.edges.clone();

        app.analyze_capture();
        assert_eq!(app.graph.origin, EdgeOrigin::GroupFallback);
        assert_eq!(app.graph.edges, fallback);
        assert_eq!(app.notice.as_ref().unwrap().level, NoticeLevel::Warning);
        // The (empty) result is still recorded for export.
        assert!(app.last_analysis.is_some());
    }

    #[test]
    fn test_analyze_without_capture_warns() {
        let mut app = demo_state();
        app.analyze_capture();
        assert_eq!(app.notice.as_ref().unwrap().level, NoticeLevel::Warning);
    }

    #[test]
    fn test_export_without_analysis_warns() {
        let mut app = demo_state();
        app.export_analysis();
        assert_eq!(app.notice.as_ref().unwrap().level, NoticeLevel::Warning);
    }

    #[test]
    fn test_export_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _file) = state_with_capture(CAPTURE, Dialect::Netstat);
        app.config.export_path = dir.path().join("analysis.json");

        app.analyze_capture();
        app.export_analysis();

        let exported = std::fs::read_to_string(&app.config.export_path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&exported).unwrap();
        assert_eq!(value["connections"].as_array().unwrap().len(), 2);
        assert_eq!(value["connections"][0]["target"], "192.168.1.101");
        assert_eq!(value["discovered_ips"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_notice_expires_on_tick() {
        let mut app = demo_state();
        app.info("short-lived");
        app.notice.as_mut().unwrap().raised = Instant::now() - NOTICE_TTL;

        app.on_tick();
        assert!(app.notice.is_none());
    }

    #[test]
    fn test_inventory_reload_only_rebuilds_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let servers_path = dir.path().join("servers.json");
        let groups_path = dir.path().join("groups.json");
        std::fs::write(
            &servers_path,
            r#"[
                {"id": "1", "hostname": "a", "ip_address": "192.168.1.100", "status": "online", "group_id": "g"},
                {"id": "2", "hostname": "b", "ip_address": "192.168.1.101", "status": "online", "group_id": "g"}
            ]"#,
        )
        .unwrap();
        std::fs::write(
            &groups_path,
            r##"[{"id": "g", "name": "G", "color": "#3b82f6"}]"##,
        )
        .unwrap();

        let mut app = AppState::new(AppConfig {
            inventory: InventorySource::Files {
                servers: servers_path.clone(),
                groups: groups_path,
            },
            capture: None,
            refresh_secs: 0,
            export_path: dir.path().join("out.json"),
        })
        .unwrap();

        app.graph.apply_analysis(&crate::analysis::AnalysisResult {
            connections: vec![crate::analysis::annotate(crate::capture::RawObservation {
                source_addr: "192.168.1.100".to_string(),
                dest_addr: "192.168.1.101".to_string(),
                protocol: Some(crate::capture::Protocol::Tcp),
                source_port: None,
                dest_port: Some("5432".to_string()),
            })],
            discovered_ips: Vec::new(),
        });
        assert_eq!(app.graph.origin, EdgeOrigin::Observed);

        // Same files on disk: observed edges must survive the re-read.
        app.reload_inventory();
        assert_eq!(app.graph.origin, EdgeOrigin::Observed);

        // A real change resets the graph to the fallback state.
        std::fs::write(
            &servers_path,
            r#"[
                {"id": "1", "hostname": "a-renamed", "ip_address": "192.168.1.100", "status": "online", "group_id": "g"},
                {"id": "2", "hostname": "b", "ip_address": "192.168.1.101", "status": "online", "group_id": "g"}
            ]"#,
        )
        .unwrap();
        app.reload_inventory();
        assert_eq!(app.graph.origin, EdgeOrigin::GroupFallback);
        assert_eq!(app.servers[0].hostname, "a-renamed");
    }

    #[test]
    fn test_failed_reload_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let servers_path = dir.path().join("servers.json");
        let groups_path = dir.path().join("groups.json");
        std::fs::write(
            &servers_path,
            r#"[{"id": "1", "hostname": "a", "ip_address": "192.168.1.100", "status": "online"}]"#,
        )
        .unwrap();
        std::fs::write(&groups_path, "[]").unwrap();

        let mut app = AppState::new(AppConfig {
            inventory: InventorySource::Files {
                servers: servers_path.clone(),
                groups: groups_path,
            },
            capture: None,
            refresh_secs: 0,
            export_path: dir.path().join("out.json"),
        })
        .unwrap();

        std::fs::write(&servers_path, "not json").unwrap();
        app.reload_inventory();
        assert_eq!(app.servers.len(), 1);
        assert_eq!(app.notice.as_ref().unwrap().level, NoticeLevel::Warning);
    }

    #[test]
    fn test_edge_selection_navigation() {
        let mut app = demo_state();
        // Demo inventory yields two fallback edges.
        assert_eq!(app.graph.edges.len(), 2);

        app.select_next_edge();
        assert_eq!(app.selected_edge, Some(0));
        app.select_next_edge();
        assert_eq!(app.selected_edge, Some(1));
        app.select_next_edge();
        assert_eq!(app.selected_edge, Some(1));

        app.select_previous_edge();
        assert_eq!(app.selected_edge, Some(0));
        app.select_previous_edge();
        assert_eq!(app.selected_edge, Some(0));

        // From None going up, start at the last edge.
        app.selected_edge = None;
        app.select_previous_edge();
        assert_eq!(app.selected_edge, Some(1));
    }

    #[test]
    fn test_selection_clamps_when_edges_shrink() {
        let (mut app, _file) = state_with_capture(CAPTURE, Dialect::Netstat);
        app.select_next_edge();
        app.select_next_edge();
        assert_eq!(app.selected_edge, Some(1));

        // Analysis replaces two fallback edges with two observed ones; the
        // selection stays put. An inventory wipe then clears it.
        app.analyze_capture();
        assert_eq!(app.selected_edge, Some(1));

        app.graph.rebuild(&[], &[]);
        app.clamp_edge_selection();
        assert_eq!(app.selected_edge, None);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Any sequence of selection moves keeps the index inside the edge
        /// list, starting from any state.
        #[test]
        fn prop_edge_selection_stays_in_bounds(moves in prop::collection::vec(any::<bool>(), 0..32)) {
            let mut app = demo_state();
            for down in moves {
                if down {
                    app.select_next_edge();
                } else {
                    app.select_previous_edge();
                }
                if let Some(idx) = app.selected_edge {
                    prop_assert!(idx < app.graph.edges.len());
                }
            }
        }
    }
}
