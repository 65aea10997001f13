//! Crate-wide error types.
//!
//! Mirrors the POSIX-styled `thiserror` taxonomy (`fs::types::FsError`,
//! `parser::types::ParseException`) rather than reaching for a single catch-all.

use thiserror::Error;

/// Failure while turning a command string into a pipeline of stages.
#[derive(Debug, Error, Clone)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "parse error at {}:{}: {}", self.line, self.column, self.message)
    }
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self { message: message.into(), line, column }
    }
}

/// Failure to start a native child process.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("no shell found on PATH among {0:?}")]
    NoShellFound(Vec<&'static str>),
    #[error("failed to spawn {program}: {source}")]
    Io { program: String, #[source] source: std::io::Error },
}

/// Top-level engine error: whatever can reject an awaited `Runner` result.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error("command exited with code {code}")]
    NonZeroExit { code: i32, exit_code: i32, message: String },
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// `code`/`exit_code` alias pair mirrors the ecosystem-parity fields
    /// a rejected await must carry per the public surface contract.
    pub fn code(&self) -> i32 {
        match self {
            EngineError::NonZeroExit { code, .. } => *code,
            _ => 1,
        }
    }
}
