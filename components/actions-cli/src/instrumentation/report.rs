//! Human-readable rendering of unhandled errors.
//!
//! The report is meant for the error log, not for a debugger: long lines are
//! wrapped, oversized messages are cut, frames belonging to the argument
//! parser are collapsed and span field values are left out.

// Local crates
use crate::errors::errors::UnhandledError;

// External crates
use lazy_static::lazy_static;
use regex::Regex;
use std::backtrace::BacktraceStatus;
use tracing_error::SpanTraceStatus;

/// Column at which help text and reports are wrapped.
pub const MAX_CONTENT_WIDTH: usize = 120;

lazy_static! {
    static ref FRAME_SYMBOL: Regex = Regex::new(r"^\s*\d+: (?P<symbol>.+)$").unwrap();
    static ref FRAME_LOCATION: Regex = Regex::new(r"^\s*at (?P<location>.+)$").unwrap();
    /// Sources of the argument parser, as laid out in the cargo registry.
    static ref CLAP_SOURCES: Regex =
        Regex::new(r"[/\\]clap(_builder|_derive|_lex)?-[^/\\]+[/\\]").unwrap();
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub line_wrap: usize,
    pub truncate_vals: usize,
    pub suppressed_paths: Vec<Regex>,
    pub show_vals: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            line_wrap: MAX_CONTENT_WIDTH,
            truncate_vals: 10 * MAX_CONTENT_WIDTH,
            suppressed_paths: vec![CLAP_SOURCES.clone()],
            show_vals: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Frame {
    symbol: String,
    location: Option<String>,
}

impl Frame {
    fn is_suppressed(&self, options: &ReportOptions) -> bool {
        self.location.as_deref().is_some_and(|location| {
            options
                .suppressed_paths
                .iter()
                .any(|pattern| pattern.is_match(location))
        })
    }
}

/// Render `error` as a multi-line report.
pub fn format_report(error: &UnhandledError, options: &ReportOptions) -> String {
    let mut lines = Vec::new();

    let backtrace = error.backtrace();
    if backtrace.status() == BacktraceStatus::Captured {
        lines.push("Stack backtrace (most recent call first):".to_string());
        lines.extend(render_frames(&backtrace.to_string(), options));
    } else {
        lines.push("Stack backtrace unavailable".to_string());
    }

    if error.span_trace().status() == SpanTraceStatus::CAPTURED {
        lines.push(String::new());
        lines.push("Span trace (innermost first):".to_string());
        error.span_trace().with_spans(|metadata, fields| {
            lines.push(format!("  in {}::{}", metadata.target(), metadata.name()));
            if options.show_vals && !fields.is_empty() {
                lines.push(format!("      with {}", truncate(fields, options.truncate_vals)));
            }
            if let (Some(file), Some(line)) = (metadata.file(), metadata.line()) {
                lines.push(format!("      at {file}:{line}"));
            }
            true
        });
    }

    lines.push(String::new());
    let mut chain = error.error().chain();
    if let Some(top) = chain.next() {
        lines.push(format!("Error: {}", truncate(&top.to_string(), options.truncate_vals)));
    }
    for cause in chain {
        lines.push(format!(
            "Caused by: {}",
            truncate(&cause.to_string(), options.truncate_vals)
        ));
    }

    lines
        .iter()
        .flat_map(|line| line.split('\n'))
        .flat_map(|line| wrap(line, options.line_wrap))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turn a rendered `std::backtrace::Backtrace` into report lines, collapsing
/// runs of suppressed frames into a single marker.
fn render_frames(rendered: &str, options: &ReportOptions) -> Vec<String> {
    let mut lines = Vec::new();
    let mut hidden = 0;

    for frame in parse_frames(rendered) {
        if frame.is_suppressed(options) {
            hidden += 1;
            continue;
        }
        if hidden > 0 {
            lines.push(hidden_marker(hidden));
            hidden = 0;
        }
        lines.push(format!("  {}", frame.symbol));
        if let Some(location) = frame.location {
            lines.push(format!("      at {location}"));
        }
    }
    if hidden > 0 {
        lines.push(hidden_marker(hidden));
    }

    lines
}

fn hidden_marker(count: usize) -> String {
    format!("  ... {count} frame{} hidden ...", if count == 1 { "" } else { "s" })
}

fn parse_frames(rendered: &str) -> Vec<Frame> {
    let mut frames: Vec<Frame> = Vec::new();

    for line in rendered.lines() {
        if let Some(caps) = FRAME_SYMBOL.captures(line) {
            frames.push(Frame {
                symbol: caps["symbol"].trim().to_string(),
                location: None,
            });
        } else if let Some(caps) = FRAME_LOCATION.captures(line) {
            if let Some(frame) = frames.last_mut() {
                frame.location.get_or_insert_with(|| caps["location"].trim().to_string());
            }
        }
    }

    frames
}

fn truncate(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let mut cut: String = value.chars().take(limit).collect();
    cut.push_str("...");
    cut
}

fn wrap(line: &str, width: usize) -> Vec<String> {
    const INDENT: &str = "    ";

    let chars: Vec<char> = line.chars().collect();
    if width == 0 || chars.len() <= width {
        return vec![line.to_string()];
    }

    let mut wrapped = vec![chars[..width].iter().collect::<String>()];
    let continuation = width.saturating_sub(INDENT.len()).max(1);
    let mut start = width;
    while start < chars.len() {
        let end = (start + continuation).min(chars.len());
        wrapped.push(format!("{INDENT}{}", chars[start..end].iter().collect::<String>()));
        start = end;
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;

    const RENDERED: &str = "   0: datahub_actions::actions::commands::run_pipelines
             at ./src/actions/commands.rs:40:9
   1: clap_builder::parser::parser::Parser::get_matches_with
             at /home/user/.cargo/registry/src/index.crates.io-6f17d22bba15001f/clap_builder-4.5.51/src/parser/parser.rs:81:13
   2: clap_builder::builder::command::Command::try_get_matches_from_mut
             at /home/user/.cargo/registry/src/index.crates.io-6f17d22bba15001f/clap_builder-4.5.51/src/builder/command.rs:812:9
   3: datahub_actions::entrypoint::entrypoint::run_with
             at ./src/entrypoint/entrypoint.rs:88:5
   4: std::rt::lang_start
";

    #[test]
    fn frames_are_parsed_with_locations() {
        let frames = parse_frames(RENDERED);

        assert_eq!(frames.len(), 5);
        assert_eq!(
            frames[0].location.as_deref(),
            Some("./src/actions/commands.rs:40:9")
        );
        assert_eq!(frames[4].location, None);
    }

    #[test]
    fn argument_parser_frames_are_collapsed() {
        let lines = render_frames(RENDERED, &ReportOptions::default());
        let joined = lines.join("\n");

        assert!(!joined.contains("clap_builder"));
        assert!(joined.contains("... 2 frames hidden ..."));
        assert!(joined.contains("datahub_actions::entrypoint::entrypoint::run_with"));
        assert!(joined.contains("std::rt::lang_start"));
    }

    #[test]
    fn long_lines_are_wrapped_at_the_configured_width() {
        let line = "x".repeat(300);
        let wrapped = wrap(&line, 120);

        assert!(wrapped.iter().all(|l| l.chars().count() <= 120));
        assert_eq!(
            wrapped.iter().map(|l| l.trim_start().len()).sum::<usize>(),
            300
        );
    }

    #[test]
    fn values_are_truncated() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }

    #[test]
    fn report_contains_the_error_chain() {
        let error = UnhandledError::capture(
            anyhow::anyhow!("connection refused").context("failed to start pipeline"),
        );
        let report = format_report(&error, &ReportOptions::default());

        assert!(report.starts_with("Stack backtrace (most recent call first):"));
        assert!(report.contains("Error: failed to start pipeline"));
        assert!(report.contains("Caused by: connection refused"));
        assert!(report.lines().all(|line| line.chars().count() <= MAX_CONTENT_WIDTH));
    }

    #[test]
    fn oversized_messages_are_cut() {
        let error = UnhandledError::capture(anyhow::anyhow!("{}", "y".repeat(5_000)));
        let report = format_report(&error, &ReportOptions::default());
        let message_chars: usize = report
            .lines()
            .skip_while(|line| !line.starts_with("Error: "))
            .map(|line| line.chars().filter(|c| *c == 'y').count())
            .sum();

        assert_eq!(message_chars, 10 * MAX_CONTENT_WIDTH);
    }
}
