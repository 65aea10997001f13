//! A command execution engine: parses (or falls back to a real shell for)
//! a narrow, safe grammar subset, dispatches each stage to either a native
//! child process or an in-process virtual command, and exposes the result
//! through capture buffers, live event listeners, and a bounded
//! async-iteration mailbox.

pub mod commands;
pub mod error;
pub mod parser;
pub mod quote;
pub mod registry;
pub mod runner;
pub mod settings;
pub mod signal;
pub mod spec;
pub mod surface;

pub use error::{EngineError, ParseError, SpawnError};
pub use quote::{quote, quote_arg, Arg};
pub use registry::{BufferedCommand, ChunkSink, CommandContext, Handler, StreamingCommand, VirtualCommandRegistry, VirtualResult};
pub use runner::{Event, ExecResult, Runner, Stream};
pub use settings::ShellSettings;
pub use spec::{CommandOptions, CommandSpec, StdinSource, StdioMode};
pub use surface::{Shell, ShellOptions};
