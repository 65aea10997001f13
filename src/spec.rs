//! Data model for a not-yet-started command: `CommandSpec` and its options.
//!
//! Grounded on `sandbox/types.rs`'s `SandboxOptions`/`RunCommandOptions`
//! (`#[derive(Debug, Default)]` options-struct convention) and `bash.rs`'s
//! `BashOptions`/`ExecOptions` pair.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;

/// Where a runner's stdin comes from.
#[derive(Debug, Clone, Default)]
pub enum StdinSource {
    #[default]
    None,
    InheritParent,
    String(String),
    Bytes(Vec<u8>),
    /// An externally-fed byte stream; consumed once.
    Readable(Arc<tokio::sync::Mutex<Receiver<Vec<u8>>>>),
    Ignore,
}

impl std::fmt::Display for StdinSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StdinSource::None => "none",
            StdinSource::InheritParent => "inherit-parent",
            StdinSource::String(_) => "string",
            StdinSource::Bytes(_) => "bytes",
            StdinSource::Readable(_) => "readable-stream-of-bytes",
            StdinSource::Ignore => "ignore",
        };
        write!(f, "{name}")
    }
}

/// How a stage's stdout/stderr is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StdioMode {
    #[default]
    Pipe,
    Inherit,
    Ignore,
}

/// Per-run configuration. Capture and mirror both default on, stdio
/// defaults to pipe, ansi is preserved by default.
#[derive(Debug, Clone)]
pub struct CommandOptions {
    pub capture: bool,
    pub mirror: bool,
    pub stdin: StdinSource,
    pub stdout: StdioMode,
    pub stderr: StdioMode,
    pub cwd: Option<String>,
    /// `None` means inherit the parent's environment untouched.
    pub env: Option<HashMap<String, String>>,
    pub timeout_ms: Option<u64>,
    pub ansi_preserve: bool,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            capture: true,
            mirror: true,
            stdin: StdinSource::None,
            stdout: StdioMode::Pipe,
            stderr: StdioMode::Pipe,
            cwd: None,
            env: None,
            timeout_ms: None,
            ansi_preserve: true,
        }
    }
}

/// An immutable, fully-resolved command ready to be started. The `command`
/// string is either shell-safe already (built through `quote`/`cmd!`) or was
/// constructed via `.command(argv...)`, which needs no quoting at all.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub command: String,
    pub options: CommandOptions,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into(), options: CommandOptions::default() }
    }

    pub fn with_options(command: impl Into<String>, options: CommandOptions) -> Self {
        Self { command: command.into(), options }
    }
}
