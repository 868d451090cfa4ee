//! Input processing layer: raw key byte → viewer action.
//!
//! Pure logic, no I/O. The input worker reads single bytes in raw mode, so
//! control keys arrive as their control codes (Ctrl-D = 0x04, Ctrl-U = 0x15,
//! Ctrl-C = 0x03).

/// Actions produced by key input processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Action {
    Quit,
    ScrollDown,
    ScrollUp,
    HalfPageDown,
    HalfPageUp,
    JumpToTop,
    JumpToBottom,
    /// Open the search prompt; `forward` selects the initial direction.
    Search { forward: bool },
    SearchNext,
    SearchPrev,
}

/// Map a raw key to an `Action`. Returns `None` for unbound keys.
pub(super) fn map_key(key: char) -> Option<Action> {
    match key {
        'q' | '\x03' => Some(Action::Quit),
        'j' => Some(Action::ScrollDown),
        'k' => Some(Action::ScrollUp),
        '\x04' => Some(Action::HalfPageDown),
        '\x15' => Some(Action::HalfPageUp),
        'g' => Some(Action::JumpToTop),
        'G' => Some(Action::JumpToBottom),
        '/' => Some(Action::Search { forward: true }),
        '?' => Some(Action::Search { forward: false }),
        'n' => Some(Action::SearchNext),
        'N' => Some(Action::SearchPrev),
        _ => None,
    }
}
