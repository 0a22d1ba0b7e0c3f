//! Structural code review for Python sources
//!
//! The reviewer works on indentation and keywords only. It flags functions
//! whose body has more than [`MAX_FUNCTION_STATEMENTS`] top-level statements
//! and modules, classes or functions without a docstring.

use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Functions with more direct body statements than this are flagged
pub const MAX_FUNCTION_STATEMENTS: usize = 30;

/// Report text when nothing was flagged
pub const NO_ISSUES: &str = "No issues found. Code follows best practices.";

static DEF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:async\s+)?def\s+(\w+)").expect("def pattern is valid"));
static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^class\s+(\w+)").expect("class pattern is valid"));
static STRING_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^[rRuUbBfF]{0,2}("|')"#).expect("string pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub line: usize,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Function,
    Class,
}

impl BlockKind {
    fn label(&self) -> &'static str {
        match self {
            BlockKind::Function => "function",
            BlockKind::Class => "class",
        }
    }
}

/// A source line outside any multi-line string literal
#[derive(Debug, Clone)]
struct SourceLine<'a> {
    number: usize,
    indent: usize,
    text: &'a str,
}

#[derive(Debug)]
struct Block {
    kind: BlockKind,
    name: String,
    line: usize,
    statements: usize,
    has_docstring: bool,
}

/// Runs the structural checks and renders the report
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeReviewer;

impl CodeReviewer {
    /// Review a file on disk; `display_name` heads the report
    pub fn review_file(&self, path: &Path, display_name: &str) -> std::io::Result<String> {
        debug!(?path, "CodeReviewer::review_file: called");
        let code = std::fs::read_to_string(path)?;
        Ok(self.review_code(&code, display_name))
    }

    /// Review source text and render the report
    pub fn review_code(&self, code: &str, file_name: &str) -> String {
        let findings = self.findings(code);
        debug!(%file_name, finding_count = %findings.len(), "CodeReviewer::review_code: called");
        if findings.is_empty() {
            return NO_ISSUES.to_string();
        }

        let mut report = format!("Code Review for {}:\n", file_name);
        for finding in &findings {
            report.push_str(&format!("\nLine {} ({}): {}", finding.line, finding.severity, finding.message));
        }
        report
    }

    /// Length findings first, then docstring findings with the module first
    pub fn findings(&self, code: &str) -> Vec<Finding> {
        let lines = significant_lines(code);
        let blocks = collect_blocks(&lines);
        let mut findings = Vec::new();

        for block in blocks.iter().filter(|b| b.kind == BlockKind::Function) {
            if block.statements > MAX_FUNCTION_STATEMENTS {
                findings.push(Finding {
                    line: block.line,
                    severity: Severity::Medium,
                    message: format!(
                        "Function '{}' is too long ({} lines). Consider refactoring.",
                        block.name, block.statements
                    ),
                });
            }
        }

        let module_documented = lines
            .first()
            .is_some_and(|l| l.indent == 0 && STRING_START_RE.is_match(l.text));
        if !module_documented {
            findings.push(Finding {
                line: 1,
                severity: Severity::Low,
                message: "Missing docstring for module".to_string(),
            });
        }

        for block in blocks.iter().filter(|b| !b.has_docstring) {
            findings.push(Finding {
                line: block.line,
                severity: Severity::Low,
                message: format!("Missing docstring for {} '{}'", block.kind.label(), block.name),
            });
        }

        findings
    }
}

/// Non-blank, non-comment lines that do not continue a triple-quoted string
fn significant_lines(code: &str) -> Vec<SourceLine<'_>> {
    let mut out = Vec::new();
    let mut in_string: Option<&str> = None;

    for (idx, raw) in code.lines().enumerate() {
        let text = raw.trim_start();
        let indent = raw.len() - text.len();

        if let Some(delim) = in_string {
            if text.matches(delim).count() % 2 == 1 {
                in_string = None;
            }
            continue;
        }

        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        for delim in ["\"\"\"", "'''"] {
            if text.matches(delim).count() % 2 == 1 {
                in_string = Some(delim);
                break;
            }
        }

        out.push(SourceLine {
            number: idx + 1,
            indent,
            text,
        });
    }
    out
}

fn collect_blocks(lines: &[SourceLine<'_>]) -> Vec<Block> {
    let mut blocks = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let (kind, name) = if let Some(caps) = DEF_RE.captures(line.text) {
            (BlockKind::Function, caps[1].to_string())
        } else if let Some(caps) = CLASS_RE.captures(line.text) {
            (BlockKind::Class, caps[1].to_string())
        } else {
            continue;
        };

        let Some((header_end, inline_body)) = find_header_end(lines, i) else {
            debug!(%name, line = %line.number, "collect_blocks: unterminated header");
            continue;
        };

        let body: Vec<&SourceLine<'_>> = lines[header_end + 1..]
            .iter()
            .take_while(|l| l.indent > line.indent)
            .collect();

        let (statements, has_docstring) = match body.first() {
            _ if !inline_body.is_empty() => (1, STRING_START_RE.is_match(inline_body)),
            Some(first) => {
                let body_indent = first.indent;
                let statements = body
                    .iter()
                    .filter(|l| l.indent == body_indent && !l.text.starts_with([')', ']', '}']))
                    .count();
                (statements, STRING_START_RE.is_match(first.text))
            }
            None => (0, false),
        };

        debug!(%name, line = %line.number, %statements, %has_docstring, "collect_blocks: block found");
        blocks.push(Block {
            kind,
            name,
            line: line.number,
            statements,
            has_docstring,
        });
    }
    blocks
}

/// Line index of the colon closing the header that starts at `start`, and
/// any code following that colon on the same line
///
/// Signatures may span lines only inside brackets. Colons inside brackets or
/// quotes belong to annotations, defaults and literals.
fn find_header_end<'a>(lines: &[SourceLine<'a>], start: usize) -> Option<(usize, &'a str)> {
    let mut depth: i32 = 0;
    for (j, line) in lines.iter().enumerate().skip(start) {
        if j > start && depth <= 0 {
            return None;
        }
        let text = strip_comment(line.text);
        let mut quote: Option<char> = None;
        for (pos, ch) in text.char_indices() {
            match (quote, ch) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"' | '\'') => quote = Some(ch),
                (None, '(' | '[' | '{') => depth += 1,
                (None, ')' | ']' | '}') => depth -= 1,
                (None, ':') if depth <= 0 => return Some((j, text[pos + 1..].trim())),
                _ => {}
            }
        }
    }
    None
}

fn strip_comment(text: &str) -> &str {
    text.split(" #").next().unwrap_or(text).trim_end()
}
