pub mod components;
pub mod listing;
pub mod shortcuts;
pub mod tui;
