//! System prompt assembly

/// Render the system prompt around the project context
pub fn system_prompt(project_context: &str) -> String {
    format!(
        "You are Malaz, an expert AI coding assistant. \
         Your role is to help with software development tasks including \
         code generation, debugging, refactoring, and project management. \
         Current project context:\n\
         {}\n\n\
         When creating or modifying files, use relative paths. \
         For code changes, prefer providing exact diffs when possible. \
         Always verify paths before file operations.",
        project_context
    )
}

/// Second system message carrying recent conversation history
pub fn history_message(history_context: &str) -> String {
    format!("Conversation history:\n{}", history_context)
}
