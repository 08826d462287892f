//! Plain-text rendering of stacks, variable dumps and breakpoint lists.

use crate::config::Config;
use crate::protocol::{Breakpoint, Property, StackFrame};
use itertools::Itertools;
use std::fmt::Write;

const INDENT: &str = "    ";

/// Outermost frame first, innermost (level 0) last.
pub fn render_stack(frames: &[StackFrame], config: &Config) -> String {
    let mut out = String::from("=== stack ===\n");
    let mut ordered: Vec<&StackFrame> = frames.iter().collect();
    ordered.sort_by_key(|f| std::cmp::Reverse(f.level));
    for frame in ordered {
        let _ = writeln!(
            out,
            "{} {}:{} {}",
            frame.level,
            config.strip_base_path(&frame.filename),
            frame.line,
            frame.location
        );
    }
    out.push_str("=============");
    out
}

/// One line per property, children indented beneath their parent.
pub fn render_properties(props: &[Property]) -> String {
    let mut out = String::new();
    write_properties(&mut out, props, 0);
    out.trim_end().to_string()
}

fn write_properties(out: &mut String, props: &[Property], depth: usize) {
    let pad = INDENT.repeat(depth);
    for (i, p) in props.iter().enumerate() {
        let value = p
            .value()
            .unwrap_or_else(|e| format!("error:{}", e));
        let label = if p.class_name.is_empty() {
            p.name.clone()
        } else {
            format!("{} {}", p.class_name, p.name)
        };
        let _ = writeln!(out, "{}{:2} {}:{} = {}", pad, i + 1, label, p.kind, value);
        write_properties(out, &p.children, depth + 1);
    }
}

pub fn render_breakpoints(breakpoints: &[Breakpoint], config: &Config) -> String {
    let mut out = String::from("=== breakpoints ===\n");
    for (i, b) in breakpoints.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:2} {}:{} {} {} hits={} id={}",
            i + 1,
            config.strip_base_path(&b.filename),
            b.line,
            b.kind,
            b.state,
            b.hit_count,
            b.id
        );
    }
    out.trim_end().to_string()
}

/// Short single-line form for a status bar.
pub fn summarize_breakpoints(breakpoints: &[Breakpoint], config: &Config) -> String {
    if breakpoints.is_empty() {
        return "no breakpoints".to_string();
    }
    format!(
        "breakpoints: {}",
        breakpoints
            .iter()
            .map(|b| format!("{}:{}", config.strip_base_path(&b.filename), b.line))
            .join(", ")
    )
}
