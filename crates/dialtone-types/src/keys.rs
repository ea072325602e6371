//! Reserved keypad codes.
//!
//! Reset and enter-music are global escape hatches; the call flow checks them
//! before any mode-specific interpretation of a key press.

/// Returns to the main menu from any state.
pub const RESET: &str = "0";

/// Leaves a chat mode for the music menu.
pub const ENTER_MUSIC: &str = "9";

/// Main menu choices.
pub const MENU_VOICE_CHAT: &str = "1";
pub const MENU_TEXT_ENTRY: &str = "2";
pub const MENU_MUSIC: &str = "3";

/// Play-history navigation, relative to the history cursor.
pub const HISTORY_PREVIOUS: &str = "4";
pub const HISTORY_REPLAY: &str = "5";
pub const HISTORY_NEXT: &str = "6";

/// Playback controls.
pub const PAUSE: &str = "1";
pub const RESUME: &str = "1";

/// Multi-tap text entry: submits the buffered message.
pub const TEXT_SUBMIT: char = '#';

/// Multi-tap text entry: ends a letter group so the same key can be reused.
pub const TEXT_SEPARATOR: char = '*';

/// Direction of a play-history navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMove {
    Previous,
    Replay,
    Next,
}

impl HistoryMove {
    /// Maps a navigation key to a move, if it is one.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            HISTORY_PREVIOUS => Some(Self::Previous),
            HISTORY_REPLAY => Some(Self::Replay),
            HISTORY_NEXT => Some(Self::Next),
            _ => None,
        }
    }
}
