//! Code search over the project's source files

use std::path::Path;

use grep_regex::RegexMatcher;
use grep_searcher::sinks::UTF8;
use grep_searcher::{BinaryDetection, SearcherBuilder};
use tracing::debug;

use super::{PathSandbox, ToolError};

/// File suffixes that count as source code
pub const SOURCE_EXTENSIONS: &[&str] = &["py", "js", "ts", "java", "go", "rs", "c", "cpp", "h"];

/// Result text when nothing matched
pub const NO_MATCHES: &str = "No matches found";

pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

/// Search every source file in the sandbox for `pattern`
///
/// Each hit renders as `rel/path:line: trimmed text`. Files are visited in
/// name order so results are stable.
pub fn search_code(sandbox: &PathSandbox, pattern: &str, max_results: usize) -> Result<String, ToolError> {
    debug!(root = ?sandbox.root(), %pattern, %max_results, "search_code: called");
    let matcher = RegexMatcher::new(pattern).map_err(|e| {
        debug!(%e, "search_code: invalid regex pattern");
        ToolError::InvalidPattern(e.to_string())
    })?;

    let mut searcher = SearcherBuilder::new()
        .binary_detection(BinaryDetection::quit(b'\x00'))
        .line_number(true)
        .build();

    let files = sandbox
        .walk()
        .filter(|(entry, _)| entry.file_type().is_file() && is_source_file(entry.path()));

    let mut results: Vec<String> = Vec::new();
    for (_, path) in files {
        if results.len() >= max_results {
            debug!("search_code: max results reached");
            break;
        }

        let display_path = sandbox.relative_display(path.as_path());

        let search_result = searcher.search_path(
            &matcher,
            path.as_path(),
            UTF8(|line_num, line| {
                results.push(format!("{}:{}: {}", display_path, line_num, line.trim()));
                Ok(results.len() < max_results)
            }),
        );

        if let Err(e) = search_result {
            debug!(path = %display_path, %e, "search_code: skipping unreadable file");
        }
    }

    debug!(match_count = %results.len(), "search_code: done");
    if results.is_empty() {
        Ok(NO_MATCHES.to_string())
    } else {
        Ok(results.join("\n"))
    }
}
