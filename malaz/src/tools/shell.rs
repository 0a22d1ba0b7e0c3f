//! CommandExecutor - runs shell commands with a hard timeout

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tracing::debug;

use super::ToolError;

/// Default hard timeout for a shell command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on rendered output
pub const DEFAULT_MAX_OUTPUT_CHARS: usize = 30_000;

/// Outcome of a completed shell command
///
/// A non-zero exit code is data, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommandResult {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ShellCommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Render as engine-facing text, truncated to `max_chars`
    pub fn render(&self, max_chars: usize) -> String {
        let mut output = format!("Command: {}\nExit code: {}\n", self.command, self.exit_code);
        if !self.stdout.is_empty() {
            output.push_str(&format!("Stdout:\n{}\n", self.stdout));
        }
        if !self.stderr.is_empty() {
            output.push_str(&format!("Stderr:\n{}", self.stderr));
        }
        truncate_output(output, max_chars)
    }
}

/// Cut `text` to `max_chars` characters with a marker giving the full length
pub fn truncate_output(text: String, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    debug!(%total, %max_chars, "truncate_output: truncating long output");
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...\n[truncated, {} chars total]", head, total)
}

/// Runs `sh -c <command>` in a working directory
///
/// Never sanitizes; callers that build commands pass them through
/// [`super::CommandSanitizer`] first.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    timeout: Duration,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl CommandExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run with the configured timeout
    pub async fn execute(&self, command: &str, working_dir: &Path) -> Result<ShellCommandResult, ToolError> {
        self.execute_with_timeout(command, working_dir, self.timeout).await
    }

    /// Run with an explicit timeout
    ///
    /// The command runs in its own process group; on timeout the whole group
    /// is killed and the shell reaped before the error is returned.
    pub async fn execute_with_timeout(
        &self,
        command: &str,
        working_dir: &Path,
        timeout: Duration,
    ) -> Result<ShellCommandResult, ToolError> {
        debug!(%command, ?working_dir, ?timeout, "CommandExecutor::execute_with_timeout: called");

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            debug!(%e, "CommandExecutor::execute_with_timeout: failed to spawn command");
            ToolError::Io(e)
        })?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let collected = tokio::time::timeout(timeout, async {
            tokio::try_join!(child.wait(), read_pipe(stdout), read_pipe(stderr))
        })
        .await;

        let (status, stdout, stderr) = match collected {
            Ok(Ok(output)) => {
                debug!(status = ?output.0, "CommandExecutor::execute_with_timeout: command completed");
                output
            }
            Ok(Err(e)) => {
                debug!(%e, "CommandExecutor::execute_with_timeout: failed while waiting for command");
                kill_process_group(&mut child).await;
                return Err(ToolError::Io(e));
            }
            Err(_) => {
                debug!("CommandExecutor::execute_with_timeout: command timed out");
                kill_process_group(&mut child).await;
                return Err(ToolError::Timeout {
                    command: command.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
        };

        let result = ShellCommandResult {
            command: command.to_string(),
            exit_code: status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        };
        debug!(
            exit_code = %result.exit_code,
            stdout_len = %result.stdout.len(),
            stderr_len = %result.stderr.len(),
            "CommandExecutor::execute_with_timeout: output captured"
        );
        Ok(result)
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Kill every process in the child's group, then reap the shell
async fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        debug!(pid, "kill_process_group: sending SIGKILL to group");
        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            debug!(pid, %e, "kill_process_group: killpg failed");
        }
    }
    let _ = child.start_kill();
    if let Err(e) = child.wait().await {
        debug!(%e, "kill_process_group: failed to reap child");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_execute_echo() {
        let temp = tempdir().unwrap();
        let result = CommandExecutor::default().execute("echo hi", temp.path()).await.unwrap();

        assert_eq!(result.exit_code, 0);
        assert!(result.stdout.contains("hi"));
        assert!(result.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_execute_runs_in_working_dir() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("marker.txt"), "x").unwrap();

        let result = CommandExecutor::default().execute("ls", temp.path()).await.unwrap();
        assert!(result.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_data() {
        let temp = tempdir().unwrap();
        let result = CommandExecutor::default()
            .execute("echo oops >&2; exit 3", temp.path())
            .await
            .unwrap();

        assert_eq!(result.exit_code, 3);
        assert!(!result.success());
        assert!(result.stderr.contains("oops"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let temp = tempdir().unwrap();
        let executor = CommandExecutor::new(Duration::from_millis(200));

        let result = executor.execute("sleep 5", temp.path()).await;
        assert!(matches!(result, Err(ToolError::Timeout { timeout_ms: 200, .. })));
    }

    #[tokio::test]
    async fn test_timeout_kills_background_children() {
        let temp = tempdir().unwrap();
        let executor = CommandExecutor::new(Duration::from_millis(300));

        let result = executor
            .execute("(sleep 1; touch after_timeout.txt) & wait; echo done", temp.path())
            .await;
        assert!(matches!(result, Err(ToolError::Timeout { .. })));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!temp.path().join("after_timeout.txt").exists());
    }

    #[tokio::test]
    async fn test_timeout_kills_subshell() {
        let temp = tempdir().unwrap();
        let executor = CommandExecutor::new(Duration::from_millis(300));

        let result = executor
            .execute("(sleep 1; touch after_timeout.txt); echo done", temp.path())
            .await;
        assert!(matches!(result, Err(ToolError::Timeout { .. })));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!temp.path().join("after_timeout.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_working_dir_is_io_error() {
        let result = CommandExecutor::default()
            .execute("echo hi", Path::new("/nonexistent/malaz/dir"))
            .await;
        assert!(matches!(result, Err(ToolError::Io(_))));
    }

    #[test]
    fn test_render_sections() {
        let result = ShellCommandResult {
            command: "make".to_string(),
            exit_code: 2,
            stdout: "building".to_string(),
            stderr: "failed".to_string(),
        };
        assert_eq!(
            result.render(DEFAULT_MAX_OUTPUT_CHARS),
            "Command: make\nExit code: 2\nStdout:\nbuilding\nStderr:\nfailed"
        );

        let quiet = ShellCommandResult {
            command: "true".to_string(),
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(quiet.render(DEFAULT_MAX_OUTPUT_CHARS), "Command: true\nExit code: 0\n");
    }

    #[test]
    fn test_truncate_output() {
        let text = "é".repeat(50);
        let truncated = truncate_output(text, 10);
        assert!(truncated.starts_with(&"é".repeat(10)));
        assert!(truncated.ends_with("[truncated, 50 chars total]"));

        assert_eq!(truncate_output("short".to_string(), 10), "short");
    }
}
