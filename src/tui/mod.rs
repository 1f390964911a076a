//! TUI debugger for the LS-8 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register and flag view
//! - Hex memory view with PC and SP highlighted
//! - Step/run/breakpoint controls
//! - Disassembly view and PRN output pane

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
