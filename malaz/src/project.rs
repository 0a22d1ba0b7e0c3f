//! Project structure summarization for the system prompt

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::tools::PathSandbox;

/// Marker files and the ecosystem each one signals, in report order
const DEPENDENCY_MARKERS: &[(&str, &str)] = &[
    ("requirements.txt", "Python"),
    ("package.json", "Node.js"),
    ("go.mod", "Go"),
    ("Cargo.toml", "Rust"),
];

/// How many package.json dependency names a summary keeps
const PACKAGE_DEPENDENCY_LIMIT: usize = 5;

/// Snapshot of the project tree
#[derive(Debug, Clone, Serialize)]
pub struct ProjectStructure {
    pub path: PathBuf,
    pub directories: Vec<String>,
    pub files: Vec<FileInfo>,
    pub dependencies: Vec<String>,
}

/// One file in the project tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub path: String,
    pub size: u64,
    pub kind: FileKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileKind {
    Python,
    Javascript,
    Json,
    #[serde(rename = "package.json")]
    PackageJson,
    PythonDependencies,
    File,
}

impl FileKind {
    fn classify(name: &str) -> Self {
        if name == "package.json" {
            FileKind::PackageJson
        } else if name == "requirements.txt" {
            FileKind::PythonDependencies
        } else if name.ends_with(".py") {
            FileKind::Python
        } else if name.ends_with(".js") {
            FileKind::Javascript
        } else if name.ends_with(".json") {
            FileKind::Json
        } else {
            FileKind::File
        }
    }
}

/// Ecosystems detected from marker files in `root`
pub fn detect_dependencies(root: &Path) -> Vec<String> {
    DEPENDENCY_MARKERS
        .iter()
        .filter(|(marker, _)| root.join(marker).exists())
        .map(|(_, ecosystem)| ecosystem.to_string())
        .collect()
}

/// Walk the sandbox root and summarize its directories and files
///
/// Hidden directories are skipped. Entries are sorted by name so the
/// summary is stable between runs.
pub fn load_project_structure(sandbox: &PathSandbox) -> ProjectStructure {
    let root = sandbox.root();
    debug!(?root, "load_project_structure: called");
    let mut directories = Vec::new();
    let mut files = Vec::new();

    for (entry, path) in sandbox.walk() {
        let rel_path = sandbox.relative_display(path.as_path());

        if entry.file_type().is_dir() {
            directories.push(rel_path);
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        let kind = FileKind::classify(&name);
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let summary = match kind {
            FileKind::Python => Some(python_file_summary(path.as_path())),
            _ => None,
        };
        let dependencies = match kind {
            FileKind::PackageJson => package_dependencies(path.as_path()),
            _ => Vec::new(),
        };

        files.push(FileInfo {
            path: rel_path,
            size,
            kind,
            summary,
            dependencies,
        });
    }

    debug!(dir_count = %directories.len(), file_count = %files.len(), "load_project_structure: done");
    ProjectStructure {
        path: root.to_path_buf(),
        directories,
        files,
        dependencies: detect_dependencies(root),
    }
}

/// First top-level class or function of a Python file
fn python_file_summary(path: &Path) -> String {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            debug!(?path, %e, "python_file_summary: unreadable");
            return format!("Error reading file: {}", e);
        }
    };

    for line in content.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("class ") {
            let name = rest.split([':', '(']).next().unwrap_or(rest).trim();
            return format!("Class: {}", name);
        }
        if let Some(rest) = line.strip_prefix("def ") {
            let name = rest.split('(').next().unwrap_or(rest).trim();
            return format!("Function: {}", name);
        }
    }
    "No classes/functions found".to_string()
}

/// First dependency names of a package.json, runtime before dev
fn package_dependencies(path: &Path) -> Vec<String> {
    let parsed: Result<serde_json::Value, String> = fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|c| serde_json::from_str(&c).map_err(|e| e.to_string()));

    match parsed {
        Ok(package) => ["dependencies", "devDependencies"]
            .iter()
            .filter_map(|section| package.get(section).and_then(|d| d.as_object()))
            .flat_map(|deps| deps.keys().cloned())
            .take(PACKAGE_DEPENDENCY_LIMIT)
            .collect(),
        Err(e) => {
            debug!(?path, %e, "package_dependencies: unreadable package.json");
            vec![format!("Error: {}", e)]
        }
    }
}

/// Render the structure as prompt text, each list capped at `max_files`
pub fn format_context(structure: &ProjectStructure, max_files: usize) -> String {
    debug!(%max_files, "format_context: called");
    let mut context = format!("Project: {}\n", structure.path.display());

    if !structure.dependencies.is_empty() {
        context.push_str(&format!("Dependencies: {}\n", structure.dependencies.join(", ")));
    }

    context.push_str("\nDirectory Structure:\n");
    let dirs: Vec<String> = structure
        .directories
        .iter()
        .take(max_files)
        .map(|d| format!("- {}", d))
        .collect();
    context.push_str(&dirs.join("\n"));

    context.push_str("\n\nImportant Files:\n");
    for file in structure.files.iter().take(max_files) {
        context.push_str(&format!("- {}", file.path));
        if let Some(summary) = &file.summary {
            context.push_str(&format!(" ({})", summary));
        }
        context.push('\n');
    }

    context
}
