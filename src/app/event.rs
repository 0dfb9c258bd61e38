// Keyboard and mouse event handling
//
// Translates terminal input into state updates. Mouse interaction is scoped
// to the map widget area recorded during the last draw.

use super::AppState;
use crossterm::event::{KeyCode, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::{Position, Rect};

use crate::graph::{CANVAS_HEIGHT, CANVAS_WIDTH};

/// Keyboard pan step in map units
const PAN_STEP: f64 = 40.0;

/// Handle keyboard events and update application state
///
/// Returns `true` if the application should continue running,
/// `false` if it should exit.
///
/// # Key Bindings
/// - `q`, `Q`, `Esc` - Quit the application
/// - `a`, `A` - Analyze the configured capture file
/// - `l`, `L` - Snapshot live local sockets
/// - `e`, `E` - Export the last analysis as JSON
/// - `r`, `R` - Re-read the inventory files now
/// - `+`, `=` - Zoom in
/// - `-`, `_` - Zoom out
/// - `0` - Reset pan and zoom
/// - Arrow keys - Pan the map
/// - `j`, `k` - Move the connection list selection
pub fn handle_key_event(app: &mut AppState, key: KeyCode) -> bool {
    match key {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
            app.running = false;
            false
        }
        KeyCode::Char('a') | KeyCode::Char('A') => {
            app.analyze_capture();
            true
        }
        KeyCode::Char('l') | KeyCode::Char('L') => {
            app.analyze_live();
            true
        }
        KeyCode::Char('e') | KeyCode::Char('E') => {
            app.export_analysis();
            true
        }
        KeyCode::Char('r') | KeyCode::Char('R') => {
            app.reload_inventory();
            true
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            app.viewport.zoom_in();
            true
        }
        KeyCode::Char('-') | KeyCode::Char('_') => {
            app.viewport.zoom_out();
            true
        }
        KeyCode::Char('0') => {
            app.viewport.reset();
            true
        }
        // Arrows nudge the map the way a drag in that direction would
        KeyCode::Up => {
            app.viewport.pan(0.0, -PAN_STEP);
            true
        }
        KeyCode::Down => {
            app.viewport.pan(0.0, PAN_STEP);
            true
        }
        KeyCode::Left => {
            app.viewport.pan(-PAN_STEP, 0.0);
            true
        }
        KeyCode::Right => {
            app.viewport.pan(PAN_STEP, 0.0);
            true
        }
        KeyCode::Char('j') | KeyCode::Char('J') => {
            app.select_next_edge();
            true
        }
        KeyCode::Char('k') | KeyCode::Char('K') => {
            app.select_previous_edge();
            true
        }
        _ => true,
    }
}

/// Handle mouse events: wheel zoom and drag panning, both limited to the
/// map area. Releasing the button or leaving the map ends a drag.
pub fn handle_mouse_event(app: &mut AppState, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => {
            if canvas_point(app.map_area, mouse.column, mouse.row).is_some() {
                app.viewport.zoom_in();
            }
        }
        MouseEventKind::ScrollDown => {
            if canvas_point(app.map_area, mouse.column, mouse.row).is_some() {
                app.viewport.zoom_out();
            }
        }
        MouseEventKind::Down(MouseButton::Left) => {
            if let Some((x, y)) = canvas_point(app.map_area, mouse.column, mouse.row) {
                app.viewport.begin_drag(x, y);
            }
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            match canvas_point(app.map_area, mouse.column, mouse.row) {
                Some((x, y)) => app.viewport.drag_to(x, y),
                None => app.viewport.end_drag(),
            }
        }
        MouseEventKind::Up(MouseButton::Left) => app.viewport.end_drag(),
        _ => {}
    }
}

/// Map a terminal cell inside the map widget to canvas coordinates.
fn canvas_point(area: Rect, column: u16, row: u16) -> Option<(f64, f64)> {
    if !area.contains(Position::new(column, row)) {
        return None;
    }
    // World units per terminal cell. Scaling the cell offset keeps the
    // result exact when the canvas divides the widget evenly.
    let units_x = CANVAS_WIDTH / f64::from(area.width.max(1));
    let units_y = CANVAS_HEIGHT / f64::from(area.height.max(1));
    Some((
        f64::from(column - area.x) * units_x,
        f64::from(row - area.y) * units_y,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{demo_state, NoticeLevel};
    use crossterm::event::KeyModifiers;

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::empty(),
        }
    }

    #[test]
    fn test_quit_keys() {
        for key in [KeyCode::Char('q'), KeyCode::Char('Q'), KeyCode::Esc] {
            let mut app = demo_state();
            assert!(app.running);
            let result = handle_key_event(&mut app, key);
            assert!(!result);
            assert!(!app.running);
        }
    }

    #[test]
    fn test_unknown_key_keeps_running() {
        let mut app = demo_state();
        assert!(handle_key_event(&mut app, KeyCode::Char('x')));
        assert!(app.running);
    }

    #[test]
    fn test_analyze_key_without_capture_warns() {
        let mut app = demo_state();
        handle_key_event(&mut app, KeyCode::Char('a'));
        assert_eq!(app.notice.as_ref().unwrap().level, NoticeLevel::Warning);
    }

    #[test]
    fn test_zoom_keys_and_reset() {
        let mut app = demo_state();
        handle_key_event(&mut app, KeyCode::Char('+'));
        handle_key_event(&mut app, KeyCode::Char('+'));
        assert_eq!(app.viewport.zoom_percent(), 121);

        handle_key_event(&mut app, KeyCode::Char('-'));
        assert_eq!(app.viewport.zoom_percent(), 109);

        handle_key_event(&mut app, KeyCode::Char('0'));
        assert_eq!(app.viewport.zoom_percent(), 100);
    }

    #[test]
    fn test_arrow_keys_pan() {
        let mut app = demo_state();
        handle_key_event(&mut app, KeyCode::Right);
        handle_key_event(&mut app, KeyCode::Down);
        assert_eq!(app.viewport.apply(0.0, 0.0), (PAN_STEP, PAN_STEP));

        handle_key_event(&mut app, KeyCode::Left);
        handle_key_event(&mut app, KeyCode::Up);
        assert_eq!(app.viewport.apply(0.0, 0.0), (0.0, 0.0));
    }

    #[test]
    fn test_list_navigation_keys() {
        let mut app = demo_state();
        handle_key_event(&mut app, KeyCode::Char('j'));
        assert_eq!(app.selected_edge, Some(0));
        handle_key_event(&mut app, KeyCode::Char('j'));
        assert_eq!(app.selected_edge, Some(1));
        handle_key_event(&mut app, KeyCode::Char('k'));
        assert_eq!(app.selected_edge, Some(0));
    }

    #[test]
    fn test_canvas_point_mapping() {
        let area = Rect::new(0, 0, 90, 70);
        assert_eq!(canvas_point(area, 45, 35), Some((450.0, 350.0)));
        // Odd columns map exactly too: one cell is ten whole canvas units.
        assert_eq!(canvas_point(area, 46, 35), Some((460.0, 350.0)));
        assert_eq!(canvas_point(area, 0, 0), Some((0.0, 0.0)));
        assert_eq!(canvas_point(area, 90, 35), None);
        assert_eq!(canvas_point(area, 45, 70), None);
    }

    #[test]
    fn test_wheel_zoom_only_over_map() {
        let mut app = demo_state();
        app.map_area = Rect::new(0, 0, 90, 70);

        handle_mouse_event(&mut app, mouse(MouseEventKind::ScrollUp, 10, 10));
        assert_eq!(app.viewport.zoom_percent(), 110);

        // Outside the map area nothing changes.
        handle_mouse_event(&mut app, mouse(MouseEventKind::ScrollUp, 100, 10));
        assert_eq!(app.viewport.zoom_percent(), 110);

        handle_mouse_event(&mut app, mouse(MouseEventKind::ScrollDown, 10, 10));
        assert_eq!(app.viewport.zoom_percent(), 99);
    }

    #[test]
    fn test_drag_pans_and_leaving_cancels() {
        let mut app = demo_state();
        app.map_area = Rect::new(0, 0, 90, 70);

        handle_mouse_event(&mut app, mouse(MouseEventKind::Down(MouseButton::Left), 45, 35));
        assert!(app.viewport.dragging());

        // One cell right is ten canvas units at this area size.
        handle_mouse_event(&mut app, mouse(MouseEventKind::Drag(MouseButton::Left), 46, 35));
        assert_eq!(app.viewport.apply(0.0, 0.0), (10.0, 0.0));

        // Dragging off the map ends the gesture and freezes the offset.
        handle_mouse_event(&mut app, mouse(MouseEventKind::Drag(MouseButton::Left), 95, 35));
        assert!(!app.viewport.dragging());
        assert_eq!(app.viewport.apply(0.0, 0.0), (10.0, 0.0));
    }

    #[test]
    fn test_button_release_ends_drag() {
        let mut app = demo_state();
        app.map_area = Rect::new(0, 0, 90, 70);

        handle_mouse_event(&mut app, mouse(MouseEventKind::Down(MouseButton::Left), 45, 35));
        handle_mouse_event(&mut app, mouse(MouseEventKind::Up(MouseButton::Left), 45, 35));
        assert!(!app.viewport.dragging());
    }

    #[test]
    fn test_drag_without_press_is_ignored() {
        let mut app = demo_state();
        app.map_area = Rect::new(0, 0, 90, 70);

        handle_mouse_event(&mut app, mouse(MouseEventKind::Drag(MouseButton::Left), 45, 35));
        assert_eq!(app.viewport.apply(0.0, 0.0), (0.0, 0.0));
    }
}
