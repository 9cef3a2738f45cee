//! Keyboard shortcut labels shown in the footer and help line.

pub const SUBMIT: &str = "Enter";
pub const CLEAR: &str = "Esc";
pub const TOGGLE_GROUP: &str = "Space";
pub const TAB_FOCUS: &str = "Tab";
pub const RERUN: &str = "Ctrl+R";
pub const THEME: &str = "F2";
pub const QUIT: &str = "F10/Ctrl+C";
pub const NAV: &str = "Up/Down";
