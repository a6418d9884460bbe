//! TUI (Terminal User Interface) module
//!
//! Key handling and pane state live in [`app::App`], separated from rendering
//! for testability. The chat screen is deliberately thin: a conversations
//! pane, an online-users pane, and the message window with its input line.

pub mod app;
pub mod ui;

pub use app::{App, Pane};
pub use ui::ui;
