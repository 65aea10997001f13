//! The process runner: state machine, pipeline construction from the parsed
//! AST (or a real-shell fallback), output fan-out, and exit-code
//! consolidation.
//!
//! Grounded on `bash.rs`'s top-level `run`/`run_with_result` shape and
//! `pipeline_execution.rs`'s stage sequencing, translated from in-memory
//! AST evaluation to `tokio::process::Command` spawning plus the virtual
//! command registry. No single upstream module matches 1:1 — this is
//! where the HOW carries over but the WHAT changes the most.

pub mod events;
mod exec;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch, Mutex, Notify};

use crate::error::EngineError;
use crate::parser;
use crate::registry::VirtualCommandRegistry;
use crate::settings::ShellSettings;
use crate::signal;
use crate::spec::{CommandSpec, StdinSource};

pub use events::{Event, ExecResult, Stream};
use exec::ExecEnv;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Starting,
    Running,
    Finishing,
    Finished,
}

/// Grace window before a timeout escalates from SIGTERM to SIGKILL. Mirrors
/// `2x` the abort-poll tick the native stage watcher uses, floored at 100ms.
const KILL_GRACE_MS: u64 = 100;

struct Inner {
    spec: CommandSpec,
    registry: Arc<VirtualCommandRegistry>,
    settings: ShellSettings,
    state: Mutex<State>,
    started: AtomicBool,
    cwd: Arc<tokio::sync::Mutex<String>>,
    capture_stdout: Mutex<Vec<u8>>,
    capture_stderr: Mutex<Vec<u8>>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<Event>>>,
    mailbox_tx: mpsc::Sender<Event>,
    mailbox_rx: Mutex<Option<mpsc::Receiver<Event>>>,
    result: Mutex<Option<Arc<ExecResult>>>,
    notify: Notify,
    kill_tx: watch::Sender<Option<&'static str>>,
    kill_rx: watch::Receiver<Option<&'static str>>,
}

/// A single command's execution handle: construct with [`Runner::new`],
/// then [`Runner::start`] (idempotent, fire-and-forget) or [`Runner::run`]
/// (start and await the terminal [`ExecResult`]).
#[derive(Clone)]
pub struct Runner {
    inner: Arc<Inner>,
}

impl Runner {
    pub fn new(spec: CommandSpec, registry: Arc<VirtualCommandRegistry>, settings: ShellSettings) -> Self {
        let (mailbox_tx, mailbox_rx) = mpsc::channel(16);
        let (kill_tx, kill_rx) = watch::channel(None);
        let cwd = spec.options.cwd.clone().unwrap_or_else(|| {
            std::env::current_dir().map(|p| p.to_string_lossy().into_owned()).unwrap_or_else(|_| "/".to_string())
        });
        Self {
            inner: Arc::new(Inner {
                spec,
                registry,
                settings,
                state: Mutex::new(State::Created),
                started: AtomicBool::new(false),
                cwd: Arc::new(tokio::sync::Mutex::new(cwd)),
                capture_stdout: Mutex::new(Vec::new()),
                capture_stderr: Mutex::new(Vec::new()),
                listeners: Mutex::new(Vec::new()),
                mailbox_tx,
                mailbox_rx: Mutex::new(Some(mailbox_rx)),
                result: Mutex::new(None),
                notify: Notify::new(),
                kill_tx,
                kill_rx,
            }),
        }
    }

    /// Idempotent: the second and later call is a no-op.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = self.inner.clone();
        tokio::spawn(async move { drive(inner).await });
    }

    /// Start (if not already) and await the terminal result. Rejects with
    /// [`EngineError::NonZeroExit`] when `errexit` is set and the exit code
    /// is non-zero; otherwise always resolves with `Ok`, even on a non-zero
    /// exit code.
    pub async fn run(&self) -> Result<Arc<ExecResult>, EngineError> {
        self.start();
        let result = loop {
            if let Some(r) = self.inner.result.lock().await.clone() {
                break r;
            }
            self.inner.notify.notified().await;
        };
        if self.inner.settings.errexit && result.code != 0 {
            return Err(EngineError::NonZeroExit {
                code: result.code,
                exit_code: result.code,
                message: result.stderr_string(),
            });
        }
        Ok(result)
    }

    /// Register a live event listener. Receives every `Data`/`Exit`/`End`
    /// event from the moment of registration onward; does not replay
    /// history.
    pub fn on(&self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut listeners) = self.inner.listeners.try_lock() {
            listeners.push(tx);
        } else {
            let inner = self.inner.clone();
            tokio::spawn(async move { inner.listeners.lock().await.push(tx) });
        }
        rx
    }

    /// Claim the bounded async-iteration mailbox. Single-consumer: a second
    /// call returns `None`. Backpressure on this channel is what pauses
    /// upstream reads per the fan-out design.
    pub async fn take_mailbox(&self) -> Option<mpsc::Receiver<Event>> {
        self.start();
        self.inner.mailbox_rx.lock().await.take()
    }

    /// Send `signal` (e.g. `"SIGINT"`, `"SIGTERM"`) to the running command.
    /// Safe to call in any state; a no-op once finished. External kills take
    /// precedence over a concurrently-firing timeout.
    pub fn kill(&self, signal: &'static str) {
        let _ = self.inner.kill_tx.send(Some(signal));
    }

    pub async fn stdout_bytes(&self) -> Vec<u8> {
        self.inner.capture_stdout.lock().await.clone()
    }

    pub async fn stderr_bytes(&self) -> Vec<u8> {
        self.inner.capture_stderr.lock().await.clone()
    }

    pub async fn stdout_string(&self) -> String {
        render_string(self.stdout_bytes().await, self.inner.spec.options.ansi_preserve)
    }

    pub async fn stderr_string(&self) -> String {
        render_string(self.stderr_bytes().await, self.inner.spec.options.ansi_preserve)
    }

    pub async fn cwd(&self) -> String {
        self.inner.cwd.lock().await.clone()
    }

    /// Wire `self`'s stdout into `other`'s stdin and return `other`, now
    /// configured to consume it. Neither runner needs to have started yet;
    /// calling `.run()`/`.start()` on the returned runner drives both.
    pub fn pipe(&self, other: Runner) -> Runner {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(64);
        let mut opts = other.inner.spec.options.clone();
        opts.stdin = StdinSource::Readable(Arc::new(tokio::sync::Mutex::new(rx)));
        let piped = Runner::new(CommandSpec::with_options(other.inner.spec.command.clone(), opts), other.inner.registry.clone(), other.inner.settings.clone());

        let upstream = self.clone();
        tokio::spawn(async move {
            let mut events = upstream.on();
            upstream.start();
            while let Some(ev) = events.recv().await {
                match ev {
                    Event::Data { stream: Stream::Stdout, bytes } | Event::Stdout(bytes) => {
                        if tx.send(bytes).await.is_err() {
                            break;
                        }
                    }
                    Event::End(_) => break,
                    _ => {}
                }
            }
        });
        piped
    }
}

fn render_string(bytes: Vec<u8>, ansi_preserve: bool) -> String {
    let s = String::from_utf8_lossy(&bytes).into_owned();
    if ansi_preserve {
        s
    } else {
        strip_ansi(&s)
    }
}

/// Strips CSI-style ANSI escape sequences (`\x1b[...<final-byte>`). Covers
/// the SGR color/style codes this engine's commands and mirrored children
/// are expected to emit; it is not a full terminal-control-sequence parser.
fn strip_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            while let Some(&next) = chars.peek() {
                chars.next();
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

async fn resolve_initial_stdin(inner: &Inner) -> Vec<u8> {
    match &inner.spec.options.stdin {
        StdinSource::None | StdinSource::Ignore => Vec::new(),
        StdinSource::InheritParent => {
            let mut buf = Vec::new();
            let _ = tokio::io::AsyncReadExt::read_to_end(&mut tokio::io::stdin(), &mut buf).await;
            buf
        }
        StdinSource::String(s) => s.clone().into_bytes(),
        StdinSource::Bytes(b) => b.clone(),
        StdinSource::Readable(rx) => {
            let mut rx = rx.lock().await;
            let mut buf = Vec::new();
            while let Some(chunk) = rx.recv().await {
                buf.extend_from_slice(&chunk);
            }
            buf
        }
    }
}

fn resolve_env(inner: &Inner) -> HashMap<String, String> {
    match &inner.spec.options.env {
        Some(env) => env.clone(),
        None => std::env::vars().collect(),
    }
}

async fn drive(inner: Arc<Inner>) {
    *inner.state.lock().await = State::Starting;

    let stdin_bytes = resolve_initial_stdin(&inner).await;
    let (registration, mut signal_rx) = signal::register();
    let abort = Arc::new(AtomicBool::new(false));
    let env_ctx = ExecEnv {
        registry: inner.registry.clone(),
        cwd: inner.cwd.clone(),
        env: resolve_env(&inner),
        abort: abort.clone(),
        pipefail: inner.settings.pipefail,
        stdout_mode: inner.spec.options.stdout,
        stderr_mode: inner.spec.options.stderr,
    };

    let (fan_tx, mut fan_rx) = mpsc::channel::<(Stream, Vec<u8>)>(64);
    let fan_inner = inner.clone();
    let fan_task = tokio::spawn(async move {
        while let Some((stream, bytes)) = fan_rx.recv().await {
            if fan_inner.spec.options.capture {
                match stream {
                    Stream::Stdout => fan_inner.capture_stdout.lock().await.extend_from_slice(&bytes),
                    Stream::Stderr => fan_inner.capture_stderr.lock().await.extend_from_slice(&bytes),
                }
            }
            if fan_inner.spec.options.mirror {
                let write_result = match stream {
                    Stream::Stdout => tokio::io::stdout().write_all(&bytes).await,
                    Stream::Stderr => tokio::io::stderr().write_all(&bytes).await,
                };
                let _ = write_result;
            }
            let data_event = Event::Data { stream, bytes: bytes.clone() };
            let stream_event = match stream {
                Stream::Stdout => Event::Stdout(bytes.clone()),
                Stream::Stderr => Event::Stderr(bytes.clone()),
            };
            {
                let listeners = fan_inner.listeners.lock().await;
                for l in listeners.iter() {
                    let _ = l.send(data_event.clone());
                    let _ = l.send(stream_event.clone());
                }
            }
            // Backpressure point: a full mailbox pauses this loop, which
            // pauses `fan_tx.send` callers upstream (native reads, streaming
            // command chunk emission).
            let _ = fan_inner.mailbox_tx.send(data_event).await;
        }
    });

    *inner.state.lock().await = State::Running;

    let command = inner.spec.command.clone();
    let needs_shell = parser::needs_real_shell(&command);
    let parsed = if needs_shell { None } else { parser::parse(&command).ok() };

    if inner.settings.traces("ProcessRunner") {
        tracing::debug!(command = %command, needs_shell, "routing command");
    }

    if inner.settings.verbose {
        let echoed = format!("+ {command}\n");
        let _ = fan_tx.send((Stream::Stderr, echoed.into_bytes())).await;
    }

    let mut kill_rx = inner.kill_rx.clone();
    let timeout_dur = inner.spec.options.timeout_ms.map(Duration::from_millis);

    let exec_result = tokio::select! {
        biased;
        _ = kill_rx.changed() => {
            abort.store(true, Ordering::SeqCst);
            let signal: &'static str = (*kill_rx.borrow()).unwrap_or("SIGTERM");
            if inner.settings.traces("Signal") {
                tracing::debug!(signal, "external kill requested");
            }
            tokio::time::sleep(Duration::from_millis(KILL_GRACE_MS)).await;
            PipelineOutcome::Signalled(signal)
        }
        Ok(signal) = signal_rx.recv() => {
            abort.store(true, Ordering::SeqCst);
            if inner.settings.traces("Signal") {
                tracing::debug!(signal, "process-wide signal received");
            }
            tokio::time::sleep(Duration::from_millis(KILL_GRACE_MS)).await;
            PipelineOutcome::Signalled(signal)
        }
        _ = sleep_or_pending(timeout_dur) => {
            abort.store(true, Ordering::SeqCst);
            if inner.settings.traces("Signal") {
                tracing::debug!(timeout_ms = ?timeout_dur, "command timed out");
            }
            tokio::time::sleep(Duration::from_millis(KILL_GRACE_MS)).await;
            PipelineOutcome::TimedOut
        }
        out = run_command(parsed, &command, &env_ctx, stdin_bytes, &fan_tx) => PipelineOutcome::Finished(out),
    };

    drop(env_ctx);
    drop(fan_tx);
    let _ = fan_task.await;
    drop(registration);

    *inner.state.lock().await = State::Finishing;

    let (code, signal, timed_out) = match exec_result {
        PipelineOutcome::Finished(out) => (out.code, None, false),
        PipelineOutcome::Signalled(sig) => (signal::exit_code_for_signal(sig), Some(sig), false),
        PipelineOutcome::TimedOut => (124, None, true),
    };

    let result = Arc::new(ExecResult {
        code,
        stdout: inner.capture_stdout.lock().await.clone(),
        stderr: inner.capture_stderr.lock().await.clone(),
        signal,
        timed_out,
        ansi_preserve: inner.spec.options.ansi_preserve,
    });

    {
        let listeners = inner.listeners.lock().await;
        for l in listeners.iter() {
            let _ = l.send(Event::Exit { code });
            let _ = l.send(Event::End(result.clone()));
        }
    }
    let _ = inner.mailbox_tx.send(Event::End(result.clone())).await;

    *inner.result.lock().await = Some(result);
    *inner.state.lock().await = State::Finished;
    inner.notify.notify_waiters();
}

enum PipelineOutcome {
    Finished(exec::StageOutput),
    Signalled(&'static str),
    TimedOut,
}

async fn sleep_or_pending(dur: Option<Duration>) {
    match dur {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending::<()>().await,
    }
}

async fn run_command(parsed: Option<crate::parser::Script>, command: &str, env_ctx: &ExecEnv, stdin: Vec<u8>, fan_tx: &mpsc::Sender<(Stream, Vec<u8>)>) -> exec::StageOutput {
    match parsed {
        Some(script) => exec::run_script(&script, env_ctx, stdin, true, fan_tx).await,
        None => exec::run_real_shell(command, env_ctx, stdin, fan_tx).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::CommandOptions;

    fn test_runner(command: &str) -> Runner {
        Runner::new(CommandSpec::new(command), Arc::new(crate::commands::with_builtins()), ShellSettings::default())
    }

    #[tokio::test]
    async fn echo_hello_produces_expected_stdout() {
        let runner = test_runner("echo hello");
        let result = runner.run().await.unwrap();
        assert_eq!(result.code, 0);
        assert_eq!(result.stdout_string(), "hello\n");
    }

    #[tokio::test]
    async fn injection_attempt_stays_literal() {
        let runner = test_runner("echo '$(whoami)'");
        let result = runner.run().await.unwrap();
        assert_eq!(result.stdout_string(), "$(whoami)\n");
    }

    #[tokio::test]
    async fn cd_then_pwd_updates_shared_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let command = format!("cd {} && pwd", dir.path().to_str().unwrap());
        let runner = test_runner(&command);
        let result = runner.run().await.unwrap();
        assert_eq!(result.code, 0);
        assert_eq!(runner.cwd().await.trim_end(), dir.path().to_str().unwrap());
    }

    #[tokio::test]
    async fn exit_with_errexit_rejects() {
        let mut opts = CommandOptions::default();
        opts.capture = true;
        let runner = Runner::new(CommandSpec::with_options("exit 42", opts), Arc::new(crate::commands::with_builtins()), ShellSettings::new().errexit(true));
        let err = runner.run().await.unwrap_err();
        assert_eq!(err.code(), 42);
    }

    #[tokio::test]
    async fn seq_piped_into_registered_virtual_command() {
        let runner = test_runner("seq 1 3");
        let result = runner.run().await.unwrap();
        assert_eq!(result.stdout_string(), "1\n2\n3\n");
    }
}
