//! Virtual command registry and handler traits.
//!
//! Grounded on `commands::registry::CommandRegistry` (`HashMap<String,
//! Box<dyn Command>>` wrapper) and `commands::types::Command`/
//! `CommandContext`, extended with `unregister`/`enable`/`disable` and split
//! into buffered vs. streaming handler variants per the design note that
//! virtual commands come in two shapes: a plain async function returning a
//! terminal result, or a task that produces a chunk stream.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

/// Arguments and environment handed to a virtual command invocation.
#[derive(Clone)]
pub struct CommandContext {
    pub args: Vec<String>,
    pub stdin: Vec<u8>,
    /// Process-wide working directory cell. `cd` mutates this directly so
    /// subsequent stages (native or virtual) inherit the change.
    pub cwd: Arc<Mutex<String>>,
    pub env: HashMap<String, String>,
    pub is_cancelled: Arc<AtomicBool>,
}

impl CommandContext {
    pub fn is_cancelled(&self) -> bool {
        self.is_cancelled.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub async fn current_dir(&self) -> String {
        self.cwd.lock().await.clone()
    }
}

/// Terminal result of a buffered virtual command.
#[derive(Debug, Clone, Default)]
pub struct VirtualResult {
    pub code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl VirtualResult {
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self { code: 0, stdout: stdout.into(), stderr: Vec::new() }
    }

    pub fn usage_error(message: impl Into<String>) -> Self {
        Self { code: 2, stdout: Vec::new(), stderr: message.into().into_bytes() }
    }

    /// Shared unknown-flag rejection: exit code 2, stderr names the flag.
    pub fn unknown_flag(cmd: &str, flag: &str) -> Self {
        Self::usage_error(format!("{cmd}: unknown option '{flag}'\n"))
    }

    pub fn failure(code: i32, message: impl Into<String>) -> Self {
        Self { code, stdout: Vec::new(), stderr: message.into().into_bytes() }
    }
}

/// A sink a streaming command writes produced chunks into; the runner reads
/// from the paired receiver and fans each chunk out per §4.4.
pub type ChunkSink = mpsc::Sender<Vec<u8>>;

/// A virtual command that computes its whole output up front (e.g. `echo`,
/// `seq`, `cd`).
#[async_trait]
pub trait BufferedCommand: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, ctx: CommandContext) -> VirtualResult;
}

/// A virtual command that produces output incrementally and must observe
/// cancellation between chunks (e.g. `sleep`, `yes`, `tail -f`-style).
#[async_trait]
pub trait StreamingCommand: Send + Sync {
    fn name(&self) -> &'static str;
    /// Writes stdout chunks to `out`; returns the final exit code. Stderr
    /// for streaming commands is reported via the returned code plus a
    /// final stderr-shaped chunk pushed onto `out`'s paired error channel
    /// by the runner, keeping the trait to one write path.
    async fn run(&self, ctx: CommandContext, out: ChunkSink) -> i32;
}

pub enum Handler {
    Buffered(Arc<dyn BufferedCommand>),
    Streaming(Arc<dyn StreamingCommand>),
}

impl Handler {
    pub fn name(&self) -> &'static str {
        match self {
            Handler::Buffered(c) => c.name(),
            Handler::Streaming(c) => c.name(),
        }
    }
}

struct Entry {
    handler: Handler,
    enabled: bool,
}

/// Process-wide table of virtual commands. An unknown name is not an error
/// at the registry level — the runner falls back to spawning a native
/// process when `get` returns `None`.
#[derive(Default)]
pub struct VirtualCommandRegistry {
    commands: HashMap<String, Entry>,
}

impl VirtualCommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Handler) {
        let name = handler.name().to_string();
        self.commands.insert(name, Entry { handler, enabled: true });
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.commands.remove(name).is_some()
    }

    pub fn enable(&mut self, name: &str) -> bool {
        self.set_enabled(name, true)
    }

    pub fn disable(&mut self, name: &str) -> bool {
        self.set_enabled(name, false)
    }

    fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.commands.get_mut(name) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn list(&self) -> Vec<&str> {
        self.commands.keys().map(|s| s.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Returns the handler only if registered and enabled; a disabled or
    /// absent entry both route to native spawn.
    pub fn get(&self, name: &str) -> Option<&Handler> {
        self.commands.get(name).filter(|e| e.enabled).map(|e| &e.handler)
    }
}
