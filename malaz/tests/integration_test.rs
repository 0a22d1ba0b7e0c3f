//! Integration tests for Malaz
//!
//! These tests drive whole turns through the Orchestrator with a scripted
//! engine and check what reaches the project directory.

use std::fs;
use std::sync::Arc;

use malaz::config::ToolsConfig;
use malaz::llm::client::mock::MockLlmClient;
use malaz::llm::{CompletionResponse, Role, ToolCall};
use malaz::memory::{ConversationMemory, SessionMemory};
use malaz::orchestrator::{Orchestrator, TurnPhase};
use malaz::tools::{PathSandbox, ToolDispatcher};
use serde_json::json;
use tempfile::TempDir;

fn setup(responses: Vec<CompletionResponse>) -> (TempDir, Arc<MockLlmClient>, Orchestrator) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let client = Arc::new(MockLlmClient::new(responses));
    let sandbox = PathSandbox::new(temp_dir.path()).expect("Failed to create sandbox");
    let dispatcher = ToolDispatcher::new(sandbox, ToolsConfig::default());
    let orchestrator = Orchestrator::new(client.clone(), dispatcher, "Project: fixture".to_string(), 2000);
    (temp_dir, client, orchestrator)
}

// =============================================================================
// Orchestrator Protocol
// =============================================================================

#[tokio::test]
async fn test_two_tool_calls_then_one_final_call() {
    let (temp_dir, client, orchestrator) = setup(vec![
        CompletionResponse::tool_calls(vec![
            ToolCall::new("call_a", "create_file", r#"{"file_path": "src/app.py", "content": "print(1)\n"}"#),
            ToolCall::new(
                "call_b",
                "modify_file",
                r#"{"file_path": "src/app.py", "patches": [{"old_line": "print(1)", "new_line": "print(2)"}]}"#,
            ),
        ]),
        CompletionResponse::text("Created and updated src/app.py"),
    ]);
    let mut memory = SessionMemory::in_memory();

    let outcome = orchestrator
        .process_request("create app and bump the print", &mut memory)
        .await
        .expect("turn should succeed");

    assert_eq!(outcome.answer, "Created and updated src/app.py");
    assert_eq!(client.call_count(), 2, "exactly one final call after dispatch");
    assert_eq!(outcome.phases.last(), Some(&TurnPhase::Done));

    // tools ran sequentially in emitted order
    assert_eq!(
        fs::read_to_string(temp_dir.path().join("src/app.py")).unwrap(),
        "print(2)\n"
    );

    let final_request = &client.requests()[1];
    let tool_messages: Vec<_> = final_request
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .collect();
    assert_eq!(tool_messages.len(), 2);
    assert_eq!(tool_messages[0].tool_call_id.as_deref(), Some("call_a"));
    assert_eq!(tool_messages[0].text(), "File created: src/app.py");
    assert_eq!(tool_messages[1].tool_call_id.as_deref(), Some("call_b"));
    assert_eq!(tool_messages[1].text(), "File modified: src/app.py (1/1 changes applied)");

    assert_eq!(memory.history().len(), 1);
    assert_eq!(memory.history()[0].user, "create app and bump the print");
}

#[tokio::test]
async fn test_tool_failures_are_reported_to_engine_not_raised() {
    let (_temp_dir, client, orchestrator) = setup(vec![
        CompletionResponse::tool_calls(vec![
            ToolCall::new("c1", "create_file", r#"{"file_path": "../../etc/passwd", "content": "x"}"#),
            ToolCall::new("c2", "teleport", "{}"),
            ToolCall::new("c3", "modify_file", r#"{"file_path": "ghost.py", "patches": []}"#),
        ]),
        CompletionResponse::text("I could not do that"),
    ]);
    let mut memory = SessionMemory::in_memory();

    let outcome = orchestrator.process_request("break things", &mut memory).await.unwrap();

    let contents: Vec<_> = outcome.tool_results.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(
        contents,
        vec![
            "Security Error: Attempt to access path outside project: ../../etc/passwd",
            "Error: Unknown tool teleport",
            "Tool Error: File not found - ghost.py",
        ]
    );
    assert_eq!(client.call_count(), 2);
}

#[tokio::test]
async fn test_memory_carries_between_turns() {
    let (_temp_dir, client, orchestrator) = setup(vec![
        CompletionResponse::text("Nice to meet you"),
        CompletionResponse::text("You said hello"),
    ]);
    let mut memory = SessionMemory::in_memory();

    orchestrator.process_request("hello", &mut memory).await.unwrap();
    orchestrator.process_request("what did I say?", &mut memory).await.unwrap();

    let second = &client.requests()[1];
    assert_eq!(second.messages[1].role, Role::System);
    assert_eq!(
        second.messages[1].text(),
        "Conversation history:\nUser: hello\nAgent: Nice to meet you"
    );
}

// =============================================================================
// Tool Dispatcher
// =============================================================================

#[tokio::test]
async fn test_no_op_patch_keeps_content() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("a.py"), "x = 1\r\ny = 2\r\n").unwrap();
    let dispatcher = ToolDispatcher::new(PathSandbox::new(temp_dir.path()).unwrap(), ToolsConfig::default());

    let text = dispatcher
        .invoke(
            "modify_file",
            &json!({"file_path": "a.py", "patches": [{"old_line": "y = 2", "new_line": "y = 2"}]}),
        )
        .await;

    assert_eq!(text, "File modified: a.py (1/1 changes applied)");
    assert_eq!(fs::read_to_string(temp_dir.path().join("a.py")).unwrap(), "x = 1\r\ny = 2\r\n");
}

#[tokio::test]
async fn test_scaffold_then_review_and_commit_without_repo() {
    let temp_dir = TempDir::new().unwrap();
    let dispatcher = ToolDispatcher::new(PathSandbox::new(temp_dir.path()).unwrap(), ToolsConfig::default());

    let created = dispatcher
        .invoke("scaffold_project", &json!({"template": "flask_web_app", "project_path": "web"}))
        .await;
    assert_eq!(created, "Project created at web using template 'flask_web_app'");

    let again = dispatcher
        .invoke("scaffold_project", &json!({"template": "flask_web_app", "project_path": "web"}))
        .await;
    assert!(again.starts_with("Tool Error: Path already exists"));

    let review = dispatcher.invoke("code_review", &json!({"file_path": "web/app.py"})).await;
    assert!(review.starts_with("Code Review for web/app.py:"), "got: {}", review);

    assert_eq!(
        dispatcher.invoke("vcs_commit", &json!({"message": "init"})).await,
        "No version control system detected"
    );
}

#[tokio::test]
async fn test_shell_timeout_is_tool_error() {
    let temp_dir = TempDir::new().unwrap();
    let config = ToolsConfig {
        command_timeout_ms: 200,
        ..Default::default()
    };
    let dispatcher = ToolDispatcher::new(PathSandbox::new(temp_dir.path()).unwrap(), config);

    let text = dispatcher.invoke("run_shell", &json!({"command": "sleep 5"})).await;
    assert!(text.starts_with("Tool Error: Command timed out"), "got: {}", text);
}
