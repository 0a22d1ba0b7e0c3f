//! ToolDispatcher - runs tool calls and renders their results as text

use serde_json::Value;
use tracing::{debug, info, warn};

use super::search;
use super::{
    CommandExecutor, CommandSanitizer, Patch, PatchApplier, PathSandbox, ToolError, ToolKind, ToolRegistry,
};
use crate::analysis::CodeAnalyzer;
use crate::config::ToolsConfig;
use crate::debugger::CodeDebugger;
use crate::llm::{Message, ToolCall, ToolDefinition};
use crate::review::CodeReviewer;
use crate::scaffold::Scaffolder;
use crate::vcs::{DEFAULT_COMMIT_MESSAGE, VcsIntegration};

/// The textual answer to one tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocationResult {
    pub tool_call_id: String,
    pub name: String,
    pub content: String,
}

impl ToolInvocationResult {
    /// Tool-role message tagged with the originating call id
    pub fn to_message(&self) -> Message {
        Message::tool(&self.tool_call_id, &self.name, &self.content)
    }
}

/// Maps tool names to handlers bound to one project root
pub struct ToolDispatcher {
    sandbox: PathSandbox,
    registry: ToolRegistry,
    sanitizer: CommandSanitizer,
    executor: CommandExecutor,
    applier: PatchApplier,
    reviewer: CodeReviewer,
    config: ToolsConfig,
}

impl ToolDispatcher {
    pub fn new(sandbox: PathSandbox, config: ToolsConfig) -> Self {
        debug!(root = ?sandbox.root(), ?config, "ToolDispatcher::new: called");
        Self {
            sandbox,
            registry: ToolRegistry::new(),
            sanitizer: CommandSanitizer::new(),
            executor: CommandExecutor::new(config.command_timeout()),
            applier: PatchApplier,
            reviewer: CodeReviewer,
            config,
        }
    }

    pub fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Catalogue offered to the engine
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions().to_vec()
    }

    /// Run a tool call from the engine, parsing its JSON argument text
    pub async fn invoke_call(&self, call: &ToolCall) -> ToolInvocationResult {
        debug!(id = %call.id, name = %call.name, "ToolDispatcher::invoke_call: called");
        let content = match call.parse_arguments() {
            Ok(args) => self.invoke(&call.name, &args).await,
            Err(e) => {
                warn!(id = %call.id, name = %call.name, %e, "ToolDispatcher::invoke_call: invalid argument JSON");
                ToolError::InvalidArguments(e.to_string()).render()
            }
        };
        ToolInvocationResult {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content,
        }
    }

    /// Run a tool and render any failure as text
    pub async fn invoke(&self, name: &str, args: &Value) -> String {
        match self.dispatch(name, args).await {
            Ok(text) => {
                debug!(%name, "ToolDispatcher::invoke: tool succeeded");
                text
            }
            Err(e) if e.is_security() => {
                warn!(%name, error = %e, "ToolDispatcher::invoke: refused by security check");
                e.render()
            }
            Err(e) => {
                debug!(%name, error = %e, "ToolDispatcher::invoke: tool failed");
                e.render()
            }
        }
    }

    /// Run a tool and return the typed result
    pub async fn dispatch(&self, name: &str, args: &Value) -> Result<String, ToolError> {
        debug!(%name, ?args, "ToolDispatcher::dispatch: called");
        let Some(kind) = self.registry.lookup(name) else {
            debug!(%name, "ToolDispatcher::dispatch: unknown tool");
            return Err(ToolError::UnknownTool { name: name.to_string() });
        };

        info!(tool = %name, "ToolDispatcher::dispatch: running tool");
        match kind {
            ToolKind::CreateFile => self.create_file(str_arg(args, "file_path")?, str_arg(args, "content")?).await,
            ToolKind::ModifyFile => self.modify_file(str_arg(args, "file_path")?, patches_arg(args)?).await,
            ToolKind::RunShell => self.run_shell(str_arg(args, "command")?).await,
            ToolKind::SearchCode => self.search_code(str_arg(args, "pattern")?),
            ToolKind::AnalyzeCode => self.analyze_code(opt_str_arg(args, "file_path")),
            ToolKind::ScaffoldProject => {
                self.scaffold_project(str_arg(args, "template")?, str_arg(args, "project_path")?)
                    .await
            }
            ToolKind::CodeReview => self.code_review(str_arg(args, "file_path")?),
            ToolKind::AutoDebug => Ok(self.auto_debug(str_arg(args, "error_trace")?)),
            ToolKind::VcsCommit => {
                self.vcs_commit(opt_str_arg(args, "message").unwrap_or(DEFAULT_COMMIT_MESSAGE))
                    .await
            }
        }
    }

    /// Write `content` to a new or existing file, creating parent directories
    pub async fn create_file(&self, file_path: &str, content: &str) -> Result<String, ToolError> {
        debug!(%file_path, content_len = %content.len(), "ToolDispatcher::create_file: called");
        let path = self.sandbox.resolve(file_path)?;
        if let Some(parent) = path.as_path().parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path.as_path(), content).await?;
        Ok(format!("File created: {}", file_path))
    }

    /// Apply exact-line patches to an existing file
    pub async fn modify_file(&self, file_path: &str, patches: Vec<Option<Patch>>) -> Result<String, ToolError> {
        debug!(%file_path, patch_count = %patches.len(), "ToolDispatcher::modify_file: called");
        let path = self.sandbox.resolve(file_path)?;
        if !path.as_path().is_file() {
            debug!("ToolDispatcher::modify_file: file not found");
            return Err(ToolError::NotFound {
                path: file_path.to_string(),
            });
        }

        let outcome = self.applier.apply_to_file(path.as_path(), &patches).await?;
        if outcome.is_partial() {
            debug!(?outcome, "ToolDispatcher::modify_file: partial patch application");
        }
        Ok(format!(
            "File modified: {} ({}/{} changes applied)",
            file_path, outcome.applied, outcome.total
        ))
    }

    /// Run a developer shell command in the project root
    ///
    /// Unsanitized unless `sanitize-shell` is enabled.
    pub async fn run_shell(&self, command: &str) -> Result<String, ToolError> {
        debug!(%command, sanitize = %self.config.sanitize_shell, "ToolDispatcher::run_shell: called");
        let command = if self.config.sanitize_shell {
            self.sanitizer.sanitize(command)?
        } else {
            command.to_string()
        };
        let result = self.executor.execute(&command, self.sandbox.root()).await?;
        Ok(result.render(self.config.max_output_chars))
    }

    pub fn search_code(&self, pattern: &str) -> Result<String, ToolError> {
        search::search_code(&self.sandbox, pattern, self.config.search_max_results)
    }

    pub fn analyze_code(&self, file_path: Option<&str>) -> Result<String, ToolError> {
        CodeAnalyzer::new(&self.sandbox).analyze_json(file_path)
    }

    pub async fn scaffold_project(&self, template: &str, project_path: &str) -> Result<String, ToolError> {
        Scaffolder::new(&self.sandbox).create_project(template, project_path).await
    }

    /// Review a project file; backs both the tool and `!review`
    pub fn code_review(&self, file_path: &str) -> Result<String, ToolError> {
        debug!(%file_path, "ToolDispatcher::code_review: called");
        let path = self.sandbox.resolve(file_path)?;
        if !path.as_path().is_file() {
            return Err(ToolError::NotFound {
                path: file_path.to_string(),
            });
        }
        Ok(self.reviewer.review_file(path.as_path(), file_path)?)
    }

    /// Analyze a traceback; backs both the tool and `!debug`
    pub fn auto_debug(&self, error_trace: &str) -> String {
        CodeDebugger::new(&self.sandbox).analyze_exception(error_trace)
    }

    /// Commit everything; backs both the tool and `!commit`
    pub async fn vcs_commit(&self, message: &str) -> Result<String, ToolError> {
        VcsIntegration::new(self.sandbox.root(), &self.sanitizer, &self.executor)
            .commit_changes(message)
            .await
    }
}

fn str_arg<'v>(args: &'v Value, key: &str) -> Result<&'v str, ToolError> {
    args.get(key).and_then(Value::as_str).ok_or_else(|| {
        debug!(%key, "str_arg: missing or non-string argument");
        ToolError::InvalidArguments(format!("missing required string argument '{}'", key))
    })
}

fn opt_str_arg<'v>(args: &'v Value, key: &str) -> Option<&'v str> {
    args.get(key).and_then(Value::as_str)
}

fn patches_arg(args: &Value) -> Result<Vec<Option<Patch>>, ToolError> {
    let patches = args.get("patches").and_then(Value::as_array).ok_or_else(|| {
        debug!("patches_arg: missing or non-array patches");
        ToolError::InvalidArguments("missing required array argument 'patches'".to_string())
    })?;
    Ok(patches.iter().map(Patch::from_value).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn dispatcher() -> (TempDir, ToolDispatcher) {
        let temp = tempdir().unwrap();
        let sandbox = PathSandbox::new(temp.path()).unwrap();
        (temp, ToolDispatcher::new(sandbox, ToolsConfig::default()))
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (_temp, dispatcher) = dispatcher();
        let text = dispatcher.invoke("launch_rocket", &json!({})).await;
        assert_eq!(text, "Error: Unknown tool launch_rocket");
    }

    #[tokio::test]
    async fn test_create_file_with_parents() {
        let (temp, dispatcher) = dispatcher();
        let text = dispatcher
            .invoke("create_file", &json!({"file_path": "pkg/mod.py", "content": "x = 1\n"}))
            .await;

        assert_eq!(text, "File created: pkg/mod.py");
        assert_eq!(fs::read_to_string(temp.path().join("pkg/mod.py")).unwrap(), "x = 1\n");
    }

    #[tokio::test]
    async fn test_create_file_escape() {
        let (_temp, dispatcher) = dispatcher();
        let text = dispatcher
            .invoke("create_file", &json!({"file_path": "../../etc/passwd", "content": "x"}))
            .await;

        assert_eq!(text, "Security Error: Attempt to access path outside project: ../../etc/passwd");
    }

    #[tokio::test]
    async fn test_missing_argument_is_tool_error() {
        let (_temp, dispatcher) = dispatcher();
        let text = dispatcher.invoke("create_file", &json!({"file_path": "a.txt"})).await;
        assert!(text.starts_with("Tool Error: Invalid arguments"));
        assert!(text.contains("'content'"));
    }

    #[tokio::test]
    async fn test_modify_file() {
        let (temp, dispatcher) = dispatcher();
        fs::write(temp.path().join("main.py"), "print(1)\n").unwrap();

        let text = dispatcher
            .invoke(
                "modify_file",
                &json!({"file_path": "main.py", "patches": [
                    {"old_line": "print(1)", "new_line": "print(2)"},
                    {"old_line": "absent", "new_line": "x"}
                ]}),
            )
            .await;

        assert_eq!(text, "File modified: main.py (1/2 changes applied)");
        assert_eq!(fs::read_to_string(temp.path().join("main.py")).unwrap(), "print(2)\n");
    }

    #[tokio::test]
    async fn test_modify_missing_file() {
        let (_temp, dispatcher) = dispatcher();
        let text = dispatcher
            .invoke("modify_file", &json!({"file_path": "ghost.py", "patches": []}))
            .await;
        assert_eq!(text, "Tool Error: File not found - ghost.py");
    }

    #[tokio::test]
    async fn test_run_shell() {
        let (_temp, dispatcher) = dispatcher();
        let text = dispatcher.invoke("run_shell", &json!({"command": "echo hi"})).await;
        assert_eq!(text, "Command: echo hi\nExit code: 0\nStdout:\nhi\n\n");
    }

    #[tokio::test]
    async fn test_run_shell_is_unsanitized_by_default() {
        let (temp, dispatcher) = dispatcher();
        let text = dispatcher
            .invoke("run_shell", &json!({"command": "echo data > out.txt"}))
            .await;
        assert!(text.starts_with("Command: echo data > out.txt\nExit code: 0"));
        assert!(temp.path().join("out.txt").exists());
    }

    #[tokio::test]
    async fn test_run_shell_sanitized_when_enabled() {
        let temp = tempdir().unwrap();
        let config = ToolsConfig {
            sanitize_shell: true,
            ..Default::default()
        };
        let dispatcher = ToolDispatcher::new(PathSandbox::new(temp.path()).unwrap(), config);

        let text = dispatcher.invoke("run_shell", &json!({"command": "rm -rf ."})).await;
        assert_eq!(text, "Security Error: Forbidden command detected: rm ");
    }

    #[tokio::test]
    async fn test_search_code() {
        let (temp, dispatcher) = dispatcher();
        fs::write(temp.path().join("a.py"), "def run():\n    pass\n").unwrap();

        assert_eq!(
            dispatcher.invoke("search_code", &json!({"pattern": "def run"})).await,
            "a.py:1: def run():"
        );
        assert!(
            dispatcher
                .invoke("search_code", &json!({"pattern": "("}))
                .await
                .starts_with("Tool Error: Invalid search pattern")
        );
    }

    #[tokio::test]
    async fn test_analyze_code_without_path() {
        let (temp, dispatcher) = dispatcher();
        fs::write(temp.path().join("a.py"), "class A:\n    pass\n").unwrap();

        let text = dispatcher.invoke("analyze_code", &json!({})).await;
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["classes"][0], "a.py: class A");
    }

    #[tokio::test]
    async fn test_scaffold_project() {
        let (temp, dispatcher) = dispatcher();
        let text = dispatcher
            .invoke("scaffold_project", &json!({"template": "cli_tool", "project_path": "tool"}))
            .await;

        assert_eq!(text, "Project created at tool using template 'cli_tool'");
        assert!(temp.path().join("tool/main.py").is_file());
    }

    #[tokio::test]
    async fn test_code_review_and_auto_debug() {
        let (temp, dispatcher) = dispatcher();
        fs::write(temp.path().join("m.py"), "\"\"\"Doc.\"\"\"\n").unwrap();

        assert_eq!(
            dispatcher.invoke("code_review", &json!({"file_path": "m.py"})).await,
            crate::review::NO_ISSUES
        );
        assert_eq!(
            dispatcher.invoke("auto_debug", &json!({"error_trace": "oops"})).await,
            crate::debugger::UNPARSEABLE
        );
    }

    #[tokio::test]
    async fn test_vcs_commit_without_repo() {
        let (_temp, dispatcher) = dispatcher();
        assert_eq!(
            dispatcher.invoke("vcs_commit", &json!({})).await,
            crate::vcs::NO_VCS
        );
    }

    #[tokio::test]
    async fn test_invoke_call_invalid_json() {
        let (_temp, dispatcher) = dispatcher();
        let call = ToolCall::new("call_9", "create_file", "{broken");

        let result = dispatcher.invoke_call(&call).await;
        assert_eq!(result.tool_call_id, "call_9");
        assert_eq!(result.name, "create_file");
        assert!(result.content.starts_with("Tool Error: Invalid arguments"));
    }

    #[tokio::test]
    async fn test_invoke_call_to_message() {
        let (_temp, dispatcher) = dispatcher();
        let call = ToolCall::new("call_1", "auto_debug", r#"{"error_trace": "nope"}"#);

        let message = dispatcher.invoke_call(&call).await.to_message();
        assert_eq!(message.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(message.text(), crate::debugger::UNPARSEABLE);
    }

    #[tokio::test]
    async fn test_dispatch_returns_typed_errors() {
        let (_temp, dispatcher) = dispatcher();
        let result = dispatcher.dispatch("nope", &json!({})).await;
        assert!(matches!(result, Err(ToolError::UnknownTool { .. })));
    }
}
