//! Regex-based structural extraction for Python and Rust sources

use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

use crate::project::detect_dependencies;
use crate::tools::{PathSandbox, ToolError};

static PY_IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*import\s+(.+?)\s*$").expect("import pattern is valid"));
static PY_FROM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*from\s+(\S+)\s+import\s+(.+?)\s*$").expect("from pattern is valid"));
static PY_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*class\s+(\w+)").expect("class pattern is valid"));
static PY_DEF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:async\s+)?def\s+(\w+)").expect("def pattern is valid"));
static RS_USE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+([^;]+);").expect("use pattern is valid"));
static RS_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(struct|enum|trait|union)\s+(\w+)").expect("type pattern is valid")
});
static RS_FN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+\S+\s+)?fn\s+(\w+)")
        .expect("fn pattern is valid")
});

/// Languages the analyzer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Language {
    Python,
    Rust,
}

impl Language {
    fn of(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("py") => Some(Language::Python),
            Some("rs") => Some(Language::Rust),
            _ => None,
        }
    }
}

/// Structural summary, serialized as the `analyze_code` result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CodeAnalysis {
    pub dependencies: Vec<String>,
    pub classes: Vec<String>,
    pub functions: Vec<String>,
    pub imports: Vec<String>,
}

impl CodeAnalysis {
    fn extract(&mut self, rel: &str, language: Language, content: &str) {
        for line in content.lines() {
            match language {
                Language::Python => self.extract_python(rel, line),
                Language::Rust => self.extract_rust(rel, line),
            }
        }
    }

    fn extract_python(&mut self, rel: &str, line: &str) {
        if let Some(caps) = PY_FROM_RE.captures(line) {
            self.imports.push(format!("{}: from {} import {}", rel, &caps[1], &caps[2]));
        } else if let Some(caps) = PY_IMPORT_RE.captures(line) {
            for name in caps[1].split(',').map(str::trim).filter(|n| !n.is_empty()) {
                self.imports.push(format!("{}: import {}", rel, name));
            }
        } else if let Some(caps) = PY_CLASS_RE.captures(line) {
            self.classes.push(format!("{}: class {}", rel, &caps[1]));
        } else if let Some(caps) = PY_DEF_RE.captures(line) {
            self.functions.push(format!("{}: function {}", rel, &caps[1]));
        }
    }

    fn extract_rust(&mut self, rel: &str, line: &str) {
        if let Some(caps) = RS_USE_RE.captures(line) {
            self.imports.push(format!("{}: use {}", rel, caps[1].trim()));
        } else if let Some(caps) = RS_TYPE_RE.captures(line) {
            self.classes.push(format!("{}: {} {}", rel, &caps[1], &caps[2]));
        } else if let Some(caps) = RS_FN_RE.captures(line) {
            self.functions.push(format!("{}: function {}", rel, &caps[1]));
        }
    }
}

/// Analyzes one file or every Python and Rust file in the project
pub struct CodeAnalyzer<'a> {
    sandbox: &'a PathSandbox,
}

impl<'a> CodeAnalyzer<'a> {
    pub fn new(sandbox: &'a PathSandbox) -> Self {
        Self { sandbox }
    }

    /// Build the structural summary
    pub fn analyze(&self, file_path: Option<&str>) -> Result<CodeAnalysis, ToolError> {
        debug!(?file_path, "CodeAnalyzer::analyze: called");
        let root = self.sandbox.root();

        let files: Vec<PathBuf> = match file_path {
            Some(rel) => {
                let path = self.sandbox.resolve(rel)?;
                if !path.as_path().is_file() {
                    debug!(%path, "CodeAnalyzer::analyze: file not found");
                    return Err(ToolError::NotFound { path: rel.to_string() });
                }
                vec![path.into_path_buf()]
            }
            None => self
                .sandbox
                .walk()
                .filter(|(entry, _)| entry.file_type().is_file() && Language::of(entry.path()).is_some())
                .map(|(_, path)| path.into_path_buf())
                .collect(),
        };

        let mut analysis = CodeAnalysis {
            dependencies: detect_dependencies(root),
            ..Default::default()
        };

        for file in &files {
            let Some(language) = Language::of(file) else {
                debug!(?file, "CodeAnalyzer::analyze: unsupported language");
                continue;
            };
            let content = match std::fs::read_to_string(file) {
                Ok(c) => c,
                Err(e) => {
                    debug!(?file, %e, "CodeAnalyzer::analyze: skipping unreadable file");
                    continue;
                }
            };
            let rel = self.sandbox.relative_display(file);
            analysis.extract(&rel, language, &content);
        }

        debug!(file_count = %files.len(), "CodeAnalyzer::analyze: done");
        Ok(analysis)
    }

    /// Pretty JSON for the engine
    pub fn analyze_json(&self, file_path: Option<&str>) -> Result<String, ToolError> {
        Ok(serde_json::to_string_pretty(&self.analyze(file_path)?)?)
    }
}
