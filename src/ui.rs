// UI rendering module

use crate::app::AppState;
use crate::graph::{EdgeOrigin, CANVAS_HEIGHT, CANVAS_WIDTH, NODE_RADIUS};
use crate::theme;
use crate::view::Viewport;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Circle, Context, Line as CanvasLine},
        Block, BorderType, Borders, List, ListItem, Paragraph,
    },
    Frame,
};
use unicode_width::UnicodeWidthStr;

/// World-unit offsets of the caption lines under each node
const CAPTION_HOSTNAME_DY: f64 = 45.0;
const CAPTION_IP_DY: f64 = 60.0;

/// Dash length of group-fallback edges in world units
const DASH_LENGTH: f64 = 6.0;

/// Longest hostname rendered under a node before truncation
const NODE_LABEL_MAX: usize = 15;

/// Main UI drawing function
pub fn draw(f: &mut Frame, app: &mut AppState) {
    let size = f.area();

    // Main layout: header, body, status bar
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Body
            Constraint::Length(3), // Status bar
        ])
        .split(size);

    render_header(f, chunks[0], app);

    // Body: map + side panels
    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(68), // Topology map
            Constraint::Percentage(32), // Side panels
        ])
        .split(chunks[1]);

    render_map(f, body_chunks[0], app);

    let side_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(60), // Connection list
            Constraint::Percentage(40), // Discovered addresses
        ])
        .split(body_chunks[1]);

    render_edge_list(f, side_chunks[0], app);
    render_discovered(f, side_chunks[1], app);

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &AppState) {
    let online = app
        .servers
        .iter()
        .filter(|server| server.status == crate::inventory::ServerStatus::Online)
        .count();
    let source = match &app.analysis_source {
        Some(source) => source.to_string(),
        None => "no analysis yet".to_string(),
    };

    let text = Line::from(vec![
        Span::styled(
            " netatlas ",
            Style::default()
                .fg(theme::ACCENT)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(
                "| {} servers ({} online) | links: {} ({}) | zoom {}% | {}",
                app.servers.len(),
                online,
                app.graph.edges.len(),
                app.graph.origin.label(),
                app.viewport.zoom_percent(),
                source,
            ),
            Style::default().fg(theme::LABEL),
        ),
    ]);

    let header = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(theme::PANEL_BORDER)),
        )
        .alignment(Alignment::Left);

    f.render_widget(header, area);
}

fn render_map(f: &mut Frame, area: Rect, app: &mut AppState) {
    // Split: summary line + canvas
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(0)])
        .split(area);

    let summary = Paragraph::new(Line::from(vec![Span::styled(
        format!(
            " nodes: {} | links: {} | discovered: {}",
            app.graph.nodes.len(),
            app.graph.edges.len(),
            app.last_analysis
                .as_ref()
                .map(|result| result.discovered_ips.len())
                .unwrap_or(0),
        ),
        Style::default().fg(theme::CAPTION),
    )]))
    .block(
        Block::default()
            .borders(Borders::TOP | Borders::LEFT | Borders::RIGHT)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme::PANEL_BORDER))
            .title(Span::styled(
                " Topology Map ",
                Style::default()
                    .fg(theme::ACCENT)
                    .add_modifier(Modifier::BOLD),
            )),
    );
    f.render_widget(summary, chunks[0]);

    // Record the canvas area for mouse hit testing.
    app.map_area = chunks[1];

    // Horizontal world units per terminal cell, for centering printed text.
    let units_x = CANVAS_WIDTH / f64::from(chunks[1].width.saturating_sub(2).max(1));

    let graph = &app.graph;
    let viewport = app.viewport.clone();
    let dashed = graph.origin == EdgeOrigin::GroupFallback;

    let canvas = Canvas::default()
        .block(
            Block::default()
                .borders(Borders::BOTTOM | Borders::LEFT | Borders::RIGHT)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(theme::PANEL_BORDER)),
        )
        .marker(Marker::Braille)
        .x_bounds([0.0, CANVAS_WIDTH])
        .y_bounds([0.0, CANVAS_HEIGHT])
        .paint(move |ctx| {
            // Edges first, so node discs draw over their endpoints.
            for edge in &graph.edges {
                let (Some(from), Some(to)) = (graph.node(&edge.from), graph.node(&edge.to))
                else {
                    // An endpoint outside the inventory has no position.
                    continue;
                };
                let (x1, y1) = project(&viewport, from.x, from.y);
                let (x2, y2) = project(&viewport, to.x, to.y);
                let color = theme::protocol_color(edge.protocol);

                if dashed {
                    draw_dashed_line(ctx, x1, y1, x2, y2, color, viewport.scale());
                } else {
                    ctx.draw(&CanvasLine { x1, y1, x2, y2, color });
                }

                let label = edge.label();
                if !label.is_empty() {
                    let (mx, my) = ((x1 + x2) / 2.0, (y1 + y2) / 2.0);
                    print_centered(
                        ctx,
                        mx,
                        my,
                        units_x,
                        label,
                        Style::default().fg(theme::EDGE_LABEL),
                    );
                }
            }

            for node in &graph.nodes {
                let (x, y) = project(&viewport, node.x, node.y);

                // Status disc with the group ring around it.
                ctx.draw(&Circle {
                    x,
                    y,
                    radius: NODE_RADIUS * viewport.scale(),
                    color: theme::status_color(node.status),
                });
                ctx.draw(&Circle {
                    x,
                    y,
                    radius: (NODE_RADIUS + 4.0) * viewport.scale(),
                    color: node.ring,
                });
                ctx.print(
                    x,
                    y,
                    Span::styled(
                        "S",
                        Style::default()
                            .fg(theme::status_color(node.status))
                            .add_modifier(Modifier::BOLD),
                    ),
                );

                let (label_x, label_y) =
                    project(&viewport, node.x, node.y + CAPTION_HOSTNAME_DY);
                print_centered(
                    ctx,
                    label_x,
                    label_y,
                    units_x,
                    truncate_label(&node.label),
                    Style::default()
                        .fg(theme::LABEL)
                        .add_modifier(Modifier::BOLD),
                );

                let (ip_x, ip_y) = project(&viewport, node.x, node.y + CAPTION_IP_DY);
                print_centered(
                    ctx,
                    ip_x,
                    ip_y,
                    units_x,
                    node.ip.clone(),
                    Style::default().fg(theme::CAPTION),
                );
            }

            if graph.nodes.is_empty() {
                print_centered(
                    ctx,
                    CANVAS_WIDTH / 2.0,
                    CANVAS_HEIGHT / 2.0,
                    units_x,
                    "inventory is empty".to_string(),
                    Style::default()
                        .fg(theme::CAPTION)
                        .add_modifier(Modifier::ITALIC),
                );
            }
        });

    f.render_widget(canvas, chunks[1]);
}

/// World coordinates to canvas coordinates: apply the viewport, then flip
/// the y axis (the canvas grows upward).
fn project(viewport: &Viewport, x: f64, y: f64) -> (f64, f64) {
    let (vx, vy) = viewport.apply(x, y);
    (vx, CANVAS_HEIGHT - vy)
}

/// Draw a line as dash segments. Dash length follows the zoom level so the
/// pattern stays visually stable.
fn draw_dashed_line(
    ctx: &mut Context,
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    color: Color,
    scale: f64,
) {
    let dx = x2 - x1;
    let dy = y2 - y1;
    let length = (dx * dx + dy * dy).sqrt();
    if length < f64::EPSILON {
        return;
    }

    let step = (DASH_LENGTH * scale / length).min(0.5);
    let mut t = 0.0;
    while t < 1.0 {
        let end = (t + step).min(1.0);
        ctx.draw(&CanvasLine {
            x1: x1 + dx * t,
            y1: y1 + dy * t,
            x2: x1 + dx * end,
            y2: y1 + dy * end,
            color,
        });
        t += 2.0 * step;
    }
}

/// Print text centered on an x position, compensating for cell width.
fn print_centered(ctx: &mut Context, x: f64, y: f64, units_x: f64, text: String, style: Style) {
    let width = text.width() as f64;
    ctx.print(x - width / 2.0 * units_x, y, Span::styled(text, style));
}

fn truncate_label(label: &str) -> String {
    if label.chars().count() > NODE_LABEL_MAX {
        label.chars().take(NODE_LABEL_MAX).collect()
    } else {
        label.to_string()
    }
}

fn render_edge_list(f: &mut Frame, area: Rect, app: &mut AppState) {
    let mut items = Vec::new();
    for (idx, edge) in app.graph.edges.iter().enumerate() {
        let from = endpoint_name(app, &edge.from);
        let to = endpoint_name(app, &edge.to);
        let label = edge.label();
        let annotation = if label.is_empty() {
            String::new()
        } else {
            format!("  [{label}]")
        };

        items.push(ListItem::new(Line::from(vec![
            Span::styled(format!("{:2}.", idx + 1), Style::default().fg(theme::CAPTION)),
            Span::styled(
                format!(" {from} → {to}"),
                Style::default().fg(theme::protocol_color(edge.protocol)),
            ),
            Span::styled(annotation, Style::default().fg(theme::EDGE_LABEL)),
        ])));
    }

    let title = format!(" Connections ({}) ", app.graph.edges.len());
    let list = List::new(items)
        .block(
            Block::default()
                .title(Span::styled(
                    title,
                    Style::default()
                        .fg(theme::ACCENT)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(theme::PANEL_BORDER)),
        )
        .highlight_style(Style::default().bg(theme::HIGHLIGHT_BG));

    f.render_stateful_widget(list, area, &mut app.edge_list_state);
}

/// Hostname of an edge endpoint, or the raw address when unresolved.
fn endpoint_name<'a>(app: &'a AppState, id: &'a str) -> &'a str {
    app.graph
        .node(id)
        .map(|node| node.label.as_str())
        .unwrap_or(id)
}

fn render_discovered(f: &mut Frame, area: Rect, app: &AppState) {
    let addresses = app
        .last_analysis
        .as_ref()
        .map(|result| result.discovered_ips.as_slice())
        .unwrap_or(&[]);

    let mut items = Vec::new();
    for address in addresses {
        let mut spans = vec![Span::styled(
            format!(" {address}"),
            Style::default().fg(theme::LABEL),
        )];
        // Addresses without an inventory entry are auto-create candidates.
        if !app.is_known_address(address) {
            spans.push(Span::styled(
                " (new)",
                Style::default()
                    .fg(theme::STATUS_WARNING)
                    .add_modifier(Modifier::BOLD),
            ));
        }
        items.push(ListItem::new(Line::from(spans)));
    }

    if items.is_empty() {
        items.push(ListItem::new(Line::from(Span::styled(
            " run an analysis (a / l)",
            Style::default()
                .fg(theme::CAPTION)
                .add_modifier(Modifier::ITALIC),
        ))));
    }

    let title = format!(" Discovered IPs ({}) ", addresses.len());
    let list = List::new(items).block(
        Block::default()
            .title(Span::styled(
                title,
                Style::default()
                    .fg(theme::ACCENT)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme::PANEL_BORDER)),
    );

    f.render_widget(list, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &AppState) {
    use crate::app::NoticeLevel;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme::PANEL_BORDER));

    // A pending notice takes over the whole bar.
    if let Some(notice) = &app.notice {
        let color = match notice.level {
            NoticeLevel::Info => theme::NOTICE_INFO,
            NoticeLevel::Warning => theme::NOTICE_WARNING,
            NoticeLevel::Error => theme::NOTICE_ERROR,
        };
        let bar = Paragraph::new(Line::from(Span::styled(
            format!(" {}", notice.text),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )))
        .block(block)
        .alignment(Alignment::Left);
        f.render_widget(bar, area);
        return;
    }

    // Calculate available width for hints (subtract borders and padding)
    let available_width = area.width.saturating_sub(4);

    // Key hints with priority levels (lower number = higher priority)
    struct Hint {
        priority: u8,
        key: &'static str,
        desc: &'static str,
    }

    let hints = [
        Hint { priority: 1, key: "Q:", desc: "quit | " },
        Hint { priority: 1, key: "A:", desc: "analyze | " },
        Hint { priority: 1, key: "L:", desc: "live | " },
        Hint { priority: 2, key: "E:", desc: "export | " },
        Hint { priority: 2, key: "R:", desc: "reload | " },
        Hint { priority: 2, key: "+/-/0:", desc: "zoom | " },
        Hint { priority: 3, key: "arrows/drag:", desc: "pan | " },
        Hint { priority: 3, key: "J/K:", desc: "select | " },
        Hint { priority: 3, key: "wheel:", desc: "zoom" },
    ];

    let mut spans = vec![Span::raw(" ")];
    let mut current_length = 1;

    // Pack hints by priority until the bar is full.
    for priority in 1..=3 {
        for hint in &hints {
            if hint.priority == priority {
                let hint_length = hint.key.len() + hint.desc.len();
                if current_length + hint_length <= available_width as usize {
                    spans.push(Span::styled(
                        hint.key,
                        Style::default()
                            .fg(theme::ACCENT)
                            .add_modifier(Modifier::BOLD),
                    ));
                    spans.push(Span::styled(
                        hint.desc,
                        Style::default().fg(theme::CAPTION),
                    ));
                    current_length += hint_length;
                }
            }
        }
    }

    let bar = Paragraph::new(Line::from(spans))
        .block(block)
        .alignment(Alignment::Left);
    f.render_widget(bar, area);
}
