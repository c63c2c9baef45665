use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::{App, Focus};

/// Rows moved per mouse wheel notch.
const WHEEL_STEP: isize = 3;

/// Handle a key event.
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    if key.kind == KeyEventKind::Release {
        return;
    }
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return;
    }
    match app.focus {
        Focus::SearchInput => handle_search_key(app, key),
        Focus::Tree => handle_tree_key(app, key),
    }
}

fn handle_search_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.explorer.clear_search();
            app.leave_search_input();
        }
        KeyCode::Enter | KeyCode::Down | KeyCode::Tab => app.leave_search_input(),
        KeyCode::Backspace => app.search_delete_char(),
        KeyCode::Char(c) if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
            app.search_input_char(c)
        }
        _ => {}
    }
}

fn handle_tree_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let page = app.explorer.viewport.height.max(1) as isize;
    match key.code {
        KeyCode::Char('q') if !ctrl => app.quit(),
        KeyCode::Char('/') => app.focus_search(),
        KeyCode::Char('p') if ctrl => app.focus_search(),
        KeyCode::Char('n') if ctrl => app.next_project(),
        KeyCode::Char('r') if !ctrl => app.explorer.refresh(),
        KeyCode::Esc if app.explorer.in_search_mode() => app.explorer.clear_search(),
        KeyCode::PageUp => app.explorer.scroll(-page),
        KeyCode::PageDown => app.explorer.scroll(page),
        KeyCode::Home => app.explorer.jump(false),
        KeyCode::End => app.explorer.jump(true),
        _ => {
            app.explorer.handle_key(key);
        }
    }
}

/// Handle a mouse event: clicks inside the tree activate a row, the wheel
/// scrolls the tree.
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent) {
    let area = app.tree_area;
    let inside = mouse.column >= area.x
        && mouse.column < area.x + area.width
        && mouse.row >= area.y
        && mouse.row < area.y + area.height;
    if !inside {
        return;
    }
    match mouse.kind {
        MouseEventKind::Down(crossterm::event::MouseButton::Left) => {
            let index = app.explorer.viewport.offset + (mouse.row - area.y) as usize;
            app.focus = Focus::Tree;
            app.explorer.click_row(index);
        }
        MouseEventKind::ScrollUp => app.explorer.scroll(-WHEEL_STEP),
        MouseEventKind::ScrollDown => app.explorer.scroll(WHEEL_STEP),
        _ => {}
    }
}
