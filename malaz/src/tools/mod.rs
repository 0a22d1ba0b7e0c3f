//! Tool system
//!
//! Everything between the engine's tool calls and the filesystem: the path
//! sandbox, the command deny-list and executor, the patch applier, the tool
//! catalogue and the dispatcher that ties them together.

mod dispatcher;
mod error;
mod patch;
mod registry;
mod sandbox;
mod sanitizer;
pub mod search;
mod shell;

pub use dispatcher::{ToolDispatcher, ToolInvocationResult};
pub use error::{SecurityError, ToolError};
pub use patch::{FileLines, Patch, PatchApplier, PatchOutcome};
pub use registry::{ToolKind, ToolRegistry};
pub use sandbox::{PathSandbox, SandboxedPath, normalize_lexically};
pub use sanitizer::{CommandSanitizer, DENY_LIST};
pub use shell::{CommandExecutor, DEFAULT_COMMAND_TIMEOUT, DEFAULT_MAX_OUTPUT_CHARS, ShellCommandResult, truncate_output};
