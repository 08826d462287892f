//! Debugger client: session lifecycle, stepping state machine and editor bridge.

pub mod breakpoint;
pub mod dispatcher;
pub mod editor;
pub mod render;
pub mod session;

pub use breakpoint::LineBreakpoint;
pub use dispatcher::{assignment_target, Debugger, DebuggerState, EditorCommand};
pub use editor::Editor;
pub use session::{PendingSession, Session};
