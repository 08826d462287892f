//! Everything that touches the debuggee's side of the world.
//!
//! Sub-modules:
//! - [`launcher`]: runs the configured init command that makes the engine connect.

pub mod launcher;

pub use launcher::{run_init_command, spawn_init_command, LaunchReports};
