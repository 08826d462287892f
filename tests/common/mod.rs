#![allow(dead_code)]

use dbgp_debugger::{Config, DebuggerError, Editor};
use std::net::{SocketAddr, TcpListener};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    OpenFile(String),
    GotoLine(u32),
    Message(String),
    Error(String),
}

/// Editor double that records every call in order.
#[derive(Debug, Default)]
pub struct RecordingEditor {
    pub events: Vec<EditorEvent>,
}

impl RecordingEditor {
    pub fn messages(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EditorEvent::Message(m) => Some(m.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EditorEvent::Error(m) => Some(m.as_str()),
                _ => None,
            })
            .collect()
    }

    /// `(file, line)` for each open_file/goto_line pair.
    pub fn jumps(&self) -> Vec<(String, u32)> {
        self.events
            .windows(2)
            .filter_map(|w| match w {
                [EditorEvent::OpenFile(f), EditorEvent::GotoLine(l)] => Some((f.clone(), *l)),
                _ => None,
            })
            .collect()
    }
}

impl Editor for RecordingEditor {
    fn open_file(&mut self, path: &str) {
        self.events.push(EditorEvent::OpenFile(path.to_string()));
    }

    fn goto_line(&mut self, line: u32) {
        self.events.push(EditorEvent::GotoLine(line));
    }

    fn message(&mut self, text: &str) {
        self.events.push(EditorEvent::Message(text.to_string()));
    }

    fn error(&mut self, err: &DebuggerError) {
        self.events.push(EditorEvent::Error(err.to_string()));
    }
}

/// A loopback address nothing is listening on right now.
pub fn free_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral listener");
    listener.local_addr().expect("ephemeral address")
}

/// Config listening on a fresh loopback port with `file:///` as the base path.
pub fn test_config(breakpoints: &[&str]) -> (Config, SocketAddr) {
    let addr = free_addr();
    let config = Config {
        base_path: "file:///".to_string(),
        breakpoints: breakpoints.iter().map(|b| b.to_string()).collect(),
        listen: addr.to_string(),
        accept_timeout_secs: 5,
        ..Config::default()
    };
    (config, addr)
}

/// Twelve lines; line 3 assigns `$b`.
pub const APP_SOURCE: &str = "<?php\n$a = 1;\n$b = $a + 1;\necho $b;\n\nfunction f() {\n    return 1;\n}\n\n$c = f();\n\necho $c;\n";
