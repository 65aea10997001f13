//! The event shape delivered to `on(...)` listeners and the async-iteration
//! mailbox: typed data with a stream tag, plus exit/end/error variants.

use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// The terminal, idempotently-set result of a runner.
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub signal: Option<&'static str>,
    pub timed_out: bool,
    pub ansi_preserve: bool,
}

impl ExecResult {
    pub fn stdout_string(&self) -> String {
        super::render_string(self.stdout.clone(), self.ansi_preserve)
    }

    pub fn stderr_string(&self) -> String {
        super::render_string(self.stderr.clone(), self.ansi_preserve)
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    Data { stream: Stream, bytes: Vec<u8> },
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    Exit { code: i32 },
    End(Arc<ExecResult>),
    Error(String),
}
