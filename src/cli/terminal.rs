//! An [`Editor`] that prints to the terminal.

use crate::debugger::Editor;
use crate::DebuggerError;
use colored::Colorize;
use std::path::PathBuf;

/// Prints stop locations with the source line when the file is readable locally.
pub struct TerminalEditor {
    root: PathBuf,
    current_file: Option<String>,
}

impl TerminalEditor {
    /// `root` is where engine paths (already stripped of the base path) are looked up.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            current_file: None,
        }
    }

    fn source_line(&self, line: u32) -> Option<String> {
        let file = self.current_file.as_ref()?;
        let text = std::fs::read_to_string(self.root.join(file)).ok()?;
        text.lines()
            .nth(line.checked_sub(1)? as usize)
            .map(|l| l.trim_end().to_string())
    }
}

impl Editor for TerminalEditor {
    fn open_file(&mut self, path: &str) {
        if self.current_file.as_deref() == Some(path) {
            return;
        }
        println!("{} {}", "open".cyan().bold(), path);
        self.current_file = Some(path.to_string());
    }

    fn goto_line(&mut self, line: u32) {
        let file = self.current_file.as_deref().unwrap_or("?");
        match self.source_line(line) {
            Some(text) => println!("{} {}:{}  {}", "=>".green().bold(), file, line, text.dimmed()),
            None => println!("{} {}:{}", "=>".green().bold(), file, line),
        }
    }

    fn message(&mut self, text: &str) {
        println!("{}", text);
    }

    fn error(&mut self, err: &DebuggerError) {
        eprintln!("{} {}", "error:".red().bold(), err);
    }
}
