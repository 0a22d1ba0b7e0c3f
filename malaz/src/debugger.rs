//! Traceback analysis with heuristic fix suggestions

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::tools::PathSandbox;

/// Result text when the trace has no recognizable frame
pub const UNPARSEABLE: &str = "Could not parse exception details";

const SOURCE_UNAVAILABLE: &str = "<source unavailable>";

static FRAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"File "(.*?)", line (\d+)"#).expect("frame pattern is valid"));
static ATTRIBUTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"has no attribute '(\w+)'").expect("attribute pattern is valid"));
static KEY_ERROR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"KeyError: '(\w+)'").expect("key error pattern is valid"));

/// One `File "...", line N` frame of a traceback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub file: String,
    pub line: usize,
}

/// Extract every frame, outermost first
pub fn parse_frames(trace: &str) -> Vec<Frame> {
    FRAME_RE
        .captures_iter(trace)
        .filter_map(|caps| {
            let line = caps[2].parse().ok()?;
            Some(Frame {
                file: caps[1].to_string(),
                line,
            })
        })
        .collect()
}

/// Fix suggestions for the error kinds recognized in `trace`
pub fn suggestions(trace: &str) -> Vec<String> {
    let mut out = Vec::new();

    if trace.contains("NoneType")
        && trace.contains("has no attribute")
        && let Some(caps) = ATTRIBUTE_RE.captures(trace)
    {
        out.push(format!(
            "Check if variable is None before accessing attribute '{}'",
            &caps[1]
        ));
    }

    if trace.contains("IndexError") {
        out.push("Check list length before accessing index".to_string());
    }

    if let Some(caps) = KEY_ERROR_RE.captures(trace) {
        out.push(format!("Check if key '{}' exists in dictionary", &caps[1]));
    }

    out
}

/// Reads offending source lines through the sandbox
pub struct CodeDebugger<'a> {
    sandbox: &'a PathSandbox,
}

impl<'a> CodeDebugger<'a> {
    pub fn new(sandbox: &'a PathSandbox) -> Self {
        Self { sandbox }
    }

    /// Analyze a traceback and render the debug report
    ///
    /// The reported frame is the innermost one whose file lies inside the
    /// project and can be read; otherwise the innermost frame is reported
    /// without its source line.
    pub fn analyze_exception(&self, trace: &str) -> String {
        debug!(trace_len = %trace.len(), "CodeDebugger::analyze_exception: called");
        let frames = parse_frames(trace);
        let Some(innermost) = frames.last() else {
            debug!("CodeDebugger::analyze_exception: no frames");
            return UNPARSEABLE.to_string();
        };

        let (frame, code) = frames
            .iter()
            .rev()
            .find_map(|frame| self.source_line(frame).map(|code| (frame, code)))
            .unwrap_or_else(|| {
                debug!("CodeDebugger::analyze_exception: no readable frame inside project");
                (innermost, SOURCE_UNAVAILABLE.to_string())
            });

        let suggestions = suggestions(trace);
        let fixes = if suggestions.is_empty() {
            "- No specific suggestions".to_string()
        } else {
            suggestions
                .iter()
                .map(|s| format!("- {}", s))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "Exception in {}, line {}:\nCode: {}\n\nPossible fixes:\n{}",
            frame.file, frame.line, code, fixes
        )
    }

    fn source_line(&self, frame: &Frame) -> Option<String> {
        let path = self.sandbox.resolve(&frame.file).ok()?;
        let content = std::fs::read_to_string(path.as_path()).ok()?;
        let line = content.lines().nth(frame.line.checked_sub(1)?)?;
        Some(line.trim().to_string())
    }
}
