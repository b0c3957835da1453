//! Command implementations for the CLI.

mod log;
mod models;
mod scan;

pub use log::cmd_log;
pub use models::cmd_models;
pub use scan::{cmd_scan, detect_meters};

/// Get terminal width, defaulting to 80 if detection fails.
pub(crate) fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80)
}
