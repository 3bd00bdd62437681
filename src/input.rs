//! Key bindings: arrows and vim-style hjkl; Shift swipes instead of moving the cursor.

use crate::swipe::SwipeDirection;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MoveCursor(SwipeDirection),
    Swipe(SwipeDirection),
    /// Pick up the drop under the cursor; the next direction swipes it.
    Select,
    Pause,
    Restart,
    Quit,
    None,
}

fn arrow(code: KeyCode) -> Option<SwipeDirection> {
    match code {
        KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('H') => Some(SwipeDirection::Left),
        KeyCode::Right | KeyCode::Char('l') | KeyCode::Char('L') => Some(SwipeDirection::Right),
        KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('K') => Some(SwipeDirection::Up),
        KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('J') => Some(SwipeDirection::Down),
        _ => None,
    }
}

/// Map key event to action.
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    if !(modifiers.is_empty() || modifiers == KeyModifiers::SHIFT) {
        return Action::None;
    }
    let shifted = modifiers == KeyModifiers::SHIFT || matches!(code, KeyCode::Char(c) if c.is_ascii_uppercase());
    if let Some(dir) = arrow(code) {
        return if shifted {
            Action::Swipe(dir)
        } else {
            Action::MoveCursor(dir)
        };
    }
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('p') | KeyCode::Char('P') => Action::Pause,
        KeyCode::Char('r') | KeyCode::Char('R') => Action::Restart,
        KeyCode::Enter | KeyCode::Char(' ') => Action::Select,
        _ => Action::None,
    }
}
