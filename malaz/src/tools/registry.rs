//! ToolRegistry - the fixed catalogue of invocable tools

use std::collections::HashMap;
use tracing::debug;

use crate::llm::ToolDefinition;
use crate::scaffold;

/// Every tool the engine can call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    CreateFile,
    ModifyFile,
    RunShell,
    SearchCode,
    AnalyzeCode,
    ScaffoldProject,
    CodeReview,
    AutoDebug,
    VcsCommit,
}

impl ToolKind {
    /// All kinds, in catalogue order
    pub const ALL: [ToolKind; 9] = [
        ToolKind::CreateFile,
        ToolKind::ModifyFile,
        ToolKind::RunShell,
        ToolKind::SearchCode,
        ToolKind::AnalyzeCode,
        ToolKind::ScaffoldProject,
        ToolKind::CodeReview,
        ToolKind::AutoDebug,
        ToolKind::VcsCommit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::CreateFile => "create_file",
            ToolKind::ModifyFile => "modify_file",
            ToolKind::RunShell => "run_shell",
            ToolKind::SearchCode => "search_code",
            ToolKind::AnalyzeCode => "analyze_code",
            ToolKind::ScaffoldProject => "scaffold_project",
            ToolKind::CodeReview => "code_review",
            ToolKind::AutoDebug => "auto_debug",
            ToolKind::VcsCommit => "vcs_commit",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::CreateFile => "Create a new file with specified content",
            ToolKind::ModifyFile => "Modify existing file using diff patches",
            ToolKind::RunShell => "Execute shell command in project directory",
            ToolKind::SearchCode => "Search codebase for pattern",
            ToolKind::AnalyzeCode => "Analyze code structure and dependencies",
            ToolKind::ScaffoldProject => "Create a new project from template",
            ToolKind::CodeReview => "Perform code review on a file",
            ToolKind::AutoDebug => "Analyze and debug error trace",
            ToolKind::VcsCommit => "Commit changes to version control",
        }
    }

    /// JSON-schema parameter object advertised to the engine
    pub fn input_schema(&self) -> serde_json::Value {
        match self {
            ToolKind::CreateFile => serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "content": {"type": "string"}
                },
                "required": ["file_path", "content"]
            }),
            ToolKind::ModifyFile => serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "patches": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "old_line": {"type": "string"},
                                "new_line": {"type": "string"}
                            }
                        }
                    }
                },
                "required": ["file_path", "patches"]
            }),
            ToolKind::RunShell => serde_json::json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string"}
                },
                "required": ["command"]
            }),
            ToolKind::SearchCode => serde_json::json!({
                "type": "object",
                "properties": {
                    "pattern": {"type": "string"}
                },
                "required": ["pattern"]
            }),
            ToolKind::AnalyzeCode => serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"}
                }
            }),
            ToolKind::ScaffoldProject => serde_json::json!({
                "type": "object",
                "properties": {
                    "template": {
                        "type": "string",
                        "enum": scaffold::template_names()
                    },
                    "project_path": {"type": "string"}
                },
                "required": ["template", "project_path"]
            }),
            ToolKind::CodeReview => serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"}
                },
                "required": ["file_path"]
            }),
            ToolKind::AutoDebug => serde_json::json!({
                "type": "object",
                "properties": {
                    "error_trace": {"type": "string"}
                },
                "required": ["error_trace"]
            }),
            ToolKind::VcsCommit => serde_json::json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string"}
                }
            }),
        }
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.input_schema())
    }
}

/// Catalogue built once at startup
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
    by_name: HashMap<&'static str, ToolKind>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        debug!("ToolRegistry::new: called");
        let definitions = ToolKind::ALL.iter().map(ToolKind::definition).collect();
        let by_name = ToolKind::ALL.iter().map(|kind| (kind.name(), *kind)).collect();
        Self { definitions, by_name }
    }

    /// Tool definitions in catalogue order
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Look up a tool by the name the engine used
    pub fn lookup(&self, name: &str) -> Option<ToolKind> {
        let kind = self.by_name.get(name).copied();
        debug!(%name, found = %kind.is_some(), "ToolRegistry::lookup: called");
        kind
    }

    /// `(name, description)` pairs for display
    pub fn list(&self) -> Vec<(&str, &str)> {
        self.definitions
            .iter()
            .map(|d| (d.name.as_str(), d.description.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
