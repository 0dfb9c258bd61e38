// Color palette for the topology map and panels.

use ratatui::style::Color;

use crate::capture::Protocol;
use crate::inventory::ServerStatus;

// Edge strokes by protocol.
pub const EDGE_TCP: Color = Color::Rgb(59, 130, 246);
pub const EDGE_UDP: Color = Color::Rgb(139, 92, 246);
pub const EDGE_UNKNOWN: Color = Color::Rgb(100, 116, 139);

// Node fill by server status.
pub const STATUS_ONLINE: Color = Color::Rgb(34, 197, 94);
pub const STATUS_WARNING: Color = Color::Rgb(245, 158, 11);
pub const STATUS_OFFLINE: Color = Color::Rgb(239, 68, 68);

// Ring color for nodes without a group.
pub const RING_DEFAULT: Color = Color::Rgb(100, 116, 139);

// Text on the dark canvas.
pub const LABEL: Color = Color::Rgb(226, 232, 240);
pub const CAPTION: Color = Color::Rgb(148, 163, 184);
pub const EDGE_LABEL: Color = Color::Gray;

// Chrome.
pub const ACCENT: Color = Color::Rgb(59, 130, 246);
pub const PANEL_BORDER: Color = Color::Rgb(100, 116, 139);
pub const HIGHLIGHT_BG: Color = Color::Rgb(30, 41, 59);

// Notices.
pub const NOTICE_INFO: Color = Color::Rgb(34, 197, 94);
pub const NOTICE_WARNING: Color = Color::Rgb(245, 158, 11);
pub const NOTICE_ERROR: Color = Color::Rgb(239, 68, 68);

pub fn status_color(status: ServerStatus) -> Color {
    match status {
        ServerStatus::Online => STATUS_ONLINE,
        ServerStatus::Warning => STATUS_WARNING,
        ServerStatus::Offline => STATUS_OFFLINE,
    }
}

pub fn protocol_color(protocol: Option<Protocol>) -> Color {
    match protocol {
        Some(Protocol::Udp) => EDGE_UDP,
        Some(Protocol::Tcp) => EDGE_TCP,
        None => EDGE_UNKNOWN,
    }
}

/// Parse a `#rrggbb` group color; anything else falls back to the default ring.
pub fn parse_hex_color(value: &str) -> Option<Color> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color::Rgb(r, g, b))
}
