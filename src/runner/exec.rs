//! Stage and pipeline execution: native child spawning, virtual command
//! dispatch, and `&&`/`||`/`;` sequencing with short-circuit propagation.
//!
//! Grounded on an ordered stage-list idiom with per-stage redirection
//! descriptors, translated from in-memory byte
//! buffers to `tokio::process::Child` + `tokio::io` pipes. Known
//! simplification, documented in `DESIGN.md`: adjacent stages in a
//! pipeline run sequentially, each fully materializing its stdout before
//! the next stage starts, rather than wiring OS-level fd-to-fd pipes
//! between native children. This preserves byte content and ordering for
//! every scenario this engine is required to support; it does not give a
//! `yes | head -n1`-style infinite producer genuine early termination,
//! which is outside the supported grammar's tested behavior.

use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command as TokioCommand;
use tokio::sync::{mpsc, Mutex};

use crate::parser::ast::*;
use crate::registry::{CommandContext, Handler, VirtualCommandRegistry};
use crate::runner::events::Stream;
use crate::spec::StdioMode;

pub struct ExecEnv {
    pub registry: Arc<VirtualCommandRegistry>,
    pub cwd: Arc<Mutex<String>>,
    pub env: HashMap<String, String>,
    pub abort: Arc<AtomicBool>,
    pub pipefail: bool,
    /// How a native child's stdout/stderr is wired when this stage is the
    /// pipeline's last stage. Ignored for virtual commands, which have no
    /// OS-level file descriptor to inherit or discard.
    pub stdout_mode: StdioMode,
    pub stderr_mode: StdioMode,
}

pub struct StageOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub code: i32,
    pub spawn_error: Option<String>,
}

impl StageOutput {
    fn ok(stdout: Vec<u8>, stderr: Vec<u8>, code: i32) -> Self {
        Self { stdout, stderr, code, spawn_error: None }
    }
}

const READ_CHUNK: usize = 8192;

async fn read_all_streaming(mut reader: impl tokio::io::AsyncRead + Unpin, stream: Stream, is_live: bool, fan_tx: &mpsc::Sender<(Stream, Vec<u8>)>) -> Vec<u8> {
    let mut buf = vec![0u8; READ_CHUNK];
    let mut acc = Vec::new();
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                acc.extend_from_slice(&buf[..n]);
                if is_live {
                    let _ = fan_tx.send((stream, buf[..n].to_vec())).await;
                }
            }
        }
    }
    acc
}

fn resolve_redirect_path(cwd: &str, word: &Word) -> std::path::PathBuf {
    let path = std::path::Path::new(&word.text);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::path::Path::new(cwd).join(path)
    }
}

/// Where a stage's stdout or stderr ultimately lands, after applying every
/// redirect/dup operator in order.
#[derive(Clone, PartialEq)]
enum Dest {
    Stdout,
    Stderr,
    File(std::path::PathBuf, bool),
}

struct RedirectPlan {
    stdin: Vec<u8>,
    out_dest: Dest,
    err_dest: Dest,
}

/// Apply `<`/`>`/`>>`/`2>`/`2>&1`/`&>`/`>&2` in order, producing the
/// resolved stdin bytes plus where stdout/stderr should end up. Dup
/// operators (`2>&1`, `>&2`) copy whatever the target stream currently
/// resolves to, so `cmd > out 2>&1` and `cmd 2>&1 > out` give the bash-
/// correct, different results.
async fn resolve_redirects(simple: &Simple, cwd: &str, stdin: Vec<u8>) -> Result<RedirectPlan, String> {
    let mut stdin = stdin;
    let mut out_dest = Dest::Stdout;
    let mut err_dest = Dest::Stderr;
    for redirect in &simple.redirects {
        match redirect.kind {
            RedirectKind::In => {
                let Some(target) = &redirect.target else { continue };
                let path = resolve_redirect_path(cwd, target);
                stdin = tokio::fs::read(&path).await.map_err(|e| format!("{}: {e}", target.text))?;
            }
            RedirectKind::Out => {
                let Some(target) = &redirect.target else { continue };
                out_dest = Dest::File(resolve_redirect_path(cwd, target), false);
            }
            RedirectKind::Append => {
                let Some(target) = &redirect.target else { continue };
                out_dest = Dest::File(resolve_redirect_path(cwd, target), true);
            }
            RedirectKind::ErrOut => {
                let Some(target) = &redirect.target else { continue };
                err_dest = Dest::File(resolve_redirect_path(cwd, target), false);
            }
            RedirectKind::DupBoth => {
                let Some(target) = &redirect.target else { continue };
                let path = resolve_redirect_path(cwd, target);
                out_dest = Dest::File(path.clone(), false);
                err_dest = Dest::File(path, true);
            }
            RedirectKind::DupStderrToStdout => err_dest = out_dest.clone(),
            RedirectKind::DupStdoutToStderr => out_dest = err_dest.clone(),
        }
    }
    Ok(RedirectPlan { stdin, out_dest, err_dest })
}

/// Routes one raw stream's bytes to where its `Dest` says it should land.
/// Two redirects resolving to the same file (`cmd > out 2>&1`) accumulate
/// into one entry instead of truncating each other.
fn route_dest(dest: &Dest, bytes: Vec<u8>, stdout: &mut Vec<u8>, stderr: &mut Vec<u8>, files: &mut Vec<(std::path::PathBuf, bool, Vec<u8>)>) {
    match dest {
        Dest::Stdout => stdout.extend(bytes),
        Dest::Stderr => stderr.extend(bytes),
        Dest::File(path, append) => match files.iter_mut().find(|(p, _, _)| p == path) {
            Some(existing) => existing.2.extend(bytes),
            None => files.push((path.clone(), *append, bytes)),
        },
    }
}

async fn write_redirect_file(path: &std::path::Path, append: bool, bytes: &[u8]) -> Result<(), String> {
    let opened = if append {
        tokio::fs::OpenOptions::new().create(true).append(true).open(path).await
    } else {
        tokio::fs::File::create(path).await
    };
    match opened {
        Ok(mut f) => f.write_all(bytes).await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    }
}

const ABORT_POLL_MS: u64 = 50;

fn stdio_for(mode: StdioMode) -> Stdio {
    match mode {
        StdioMode::Pipe => Stdio::piped(),
        StdioMode::Inherit => Stdio::inherit(),
        StdioMode::Ignore => Stdio::null(),
    }
}

pub(crate) async fn run_native(
    argv: &[String],
    env_ctx: &ExecEnv,
    cwd: &str,
    stdin: Vec<u8>,
    stdout_live: bool,
    stderr_live: bool,
    stdout_mode: StdioMode,
    stderr_mode: StdioMode,
    fan_tx: &mpsc::Sender<(Stream, Vec<u8>)>,
) -> StageOutput {
    let mut cmd = TokioCommand::new(&argv[0]);
    cmd.args(&argv[1..]);
    cmd.current_dir(cwd);
    cmd.envs(&env_ctx.env);
    cmd.stdin(Stdio::piped());
    cmd.stdout(stdio_for(stdout_mode));
    cmd.stderr(stdio_for(stderr_mode));

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            return StageOutput { stdout: Vec::new(), stderr: Vec::new(), code: 127, spawn_error: Some(format!("{}: {e}\n", argv[0])) };
        }
    };

    // Poll the shared abort flag (flipped by an external `.kill()` call or
    // the signal coordinator) and deliver SIGTERM to the child by pid —
    // tokio gives no other way to signal a child we don't otherwise own.
    let pid = child.id();
    let abort = env_ctx.abort.clone();
    let watcher = tokio::spawn(async move {
        loop {
            if abort.load(std::sync::atomic::Ordering::Relaxed) {
                if let Some(pid) = pid {
                    unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
                }
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(ABORT_POLL_MS)).await;
        }
    });

    let mut stdin_pipe = child.stdin.take();
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();

    let writer = tokio::spawn(async move {
        if let Some(pipe) = stdin_pipe.as_mut() {
            let _ = pipe.write_all(&stdin).await;
        }
        stdin_pipe.take();
    });

    let fan_tx_out = fan_tx.clone();
    let out_task = tokio::spawn(async move {
        match stdout_pipe {
            Some(pipe) => read_all_streaming(pipe, Stream::Stdout, stdout_live, &fan_tx_out).await,
            None => Vec::new(),
        }
    });
    let fan_tx_err = fan_tx.clone();
    let err_task = tokio::spawn(async move {
        match stderr_pipe {
            Some(pipe) => read_all_streaming(pipe, Stream::Stderr, stderr_live, &fan_tx_err).await,
            None => Vec::new(),
        }
    });

    let _ = writer.await;
    let stdout = out_task.await.unwrap_or_default();
    let stderr = err_task.await.unwrap_or_default();
    let status = child.wait().await;
    watcher.abort();
    let code = match status {
        Ok(s) => s.code().unwrap_or_else(|| 128 + s.signal().unwrap_or(0)),
        Err(_) => 127,
    };
    StageOutput::ok(stdout, stderr, code)
}

/// Fallback execution path for commands `needs_real_shell` flagged: spawn
/// the first probed shell with `-c <command>` rather than parsing.
pub async fn run_real_shell(command: &str, env_ctx: &ExecEnv, stdin: Vec<u8>, fan_tx: &mpsc::Sender<(Stream, Vec<u8>)>) -> StageOutput {
    use crate::parser::SHELL_PROBE_LIST;
    let cwd = env_ctx.cwd.lock().await.clone();
    for shell in SHELL_PROBE_LIST {
        if tokio::fs::metadata(shell).await.is_ok() {
            let argv = vec![shell.to_string(), "-c".to_string(), command.to_string()];
            return run_native(&argv, env_ctx, &cwd, stdin, true, true, env_ctx.stdout_mode, env_ctx.stderr_mode, fan_tx).await;
        }
    }
    StageOutput { stdout: Vec::new(), stderr: b"no shell found on PATH\n".to_vec(), code: 127, spawn_error: None }
}

async fn run_virtual(
    handler: &Handler,
    args: Vec<String>,
    env_ctx: &ExecEnv,
    stdin: Vec<u8>,
    stdout_live: bool,
    stderr_live: bool,
    fan_tx: &mpsc::Sender<(Stream, Vec<u8>)>,
) -> StageOutput {
    let ctx = CommandContext { args, stdin, cwd: env_ctx.cwd.clone(), env: env_ctx.env.clone(), is_cancelled: env_ctx.abort.clone() };
    match handler {
        Handler::Buffered(cmd) => {
            let result = cmd.run(ctx).await;
            if stdout_live && !result.stdout.is_empty() {
                let _ = fan_tx.send((Stream::Stdout, result.stdout.clone())).await;
            }
            if stderr_live && !result.stderr.is_empty() {
                let _ = fan_tx.send((Stream::Stderr, result.stderr.clone())).await;
            }
            StageOutput::ok(result.stdout, result.stderr, result.code)
        }
        Handler::Streaming(cmd) => {
            let (tx, mut rx) = mpsc::channel::<Vec<u8>>(16);
            let fan_tx = fan_tx.clone();
            let drain = tokio::spawn(async move {
                let mut acc = Vec::new();
                while let Some(chunk) = rx.recv().await {
                    acc.extend_from_slice(&chunk);
                    if stdout_live {
                        let _ = fan_tx.send((Stream::Stdout, chunk)).await;
                    }
                }
                acc
            });
            let code = cmd.run(ctx, tx).await;
            let stdout = drain.await.unwrap_or_default();
            StageOutput::ok(stdout, Vec::new(), code)
        }
    }
}

fn render_word(word: &Word) -> String {
    word.text.clone()
}

async fn run_stage(stage: &Stage, env_ctx: &ExecEnv, stdin: Vec<u8>, is_last: bool, fan_tx: &mpsc::Sender<(Stream, Vec<u8>)>) -> StageOutput {
    match stage {
        Stage::Simple(simple) => {
            let cwd = env_ctx.cwd.lock().await.clone();
            let plan = match resolve_redirects(simple, &cwd, stdin).await {
                Ok(v) => v,
                Err(e) => return StageOutput { stdout: Vec::new(), stderr: e.into_bytes(), code: 1, spawn_error: None },
            };

            let argv: Vec<String> = simple.words.iter().map(render_word).collect();
            if argv.is_empty() {
                return StageOutput::ok(Vec::new(), Vec::new(), 0);
            }

            // Only when neither stream is redirected can stdout/stderr be
            // forwarded live as they're produced; any `>`/`2>`/`&>`/`2>&1`/
            // `>&2` forces full buffering so the bytes can be routed to
            // their actual destination afterward.
            let simple_passthrough = plan.out_dest == Dest::Stdout && plan.err_dest == Dest::Stderr;

            let mut out = if simple_passthrough {
                let (stdout_mode, stderr_mode) =
                    if is_last { (env_ctx.stdout_mode, env_ctx.stderr_mode) } else { (StdioMode::Pipe, StdioMode::Pipe) };
                if let Some(handler) = env_ctx.registry.get(&argv[0]) {
                    run_virtual(handler, argv[1..].to_vec(), env_ctx, plan.stdin, is_last, true, fan_tx).await
                } else {
                    run_native(&argv, env_ctx, &cwd, plan.stdin, is_last, true, stdout_mode, stderr_mode, fan_tx).await
                }
            } else if let Some(handler) = env_ctx.registry.get(&argv[0]) {
                run_virtual(handler, argv[1..].to_vec(), env_ctx, plan.stdin, false, false, fan_tx).await
            } else {
                run_native(&argv, env_ctx, &cwd, plan.stdin, false, false, StdioMode::Pipe, StdioMode::Pipe, fan_tx).await
            };

            if !simple_passthrough {
                let raw_stdout = std::mem::take(&mut out.stdout);
                let raw_stderr = std::mem::take(&mut out.stderr);
                let mut final_stdout = Vec::new();
                let mut final_stderr = Vec::new();
                let mut files: Vec<(std::path::PathBuf, bool, Vec<u8>)> = Vec::new();
                route_dest(&plan.out_dest, raw_stdout, &mut final_stdout, &mut final_stderr, &mut files);
                route_dest(&plan.err_dest, raw_stderr, &mut final_stdout, &mut final_stderr, &mut files);

                for (path, append, bytes) in &files {
                    if let Err(e) = write_redirect_file(path, *append, bytes).await {
                        final_stderr.extend(format!("{e}\n").into_bytes());
                        if out.code == 0 {
                            out.code = 1;
                        }
                    }
                }

                out.stdout = final_stdout;
                out.stderr = final_stderr;

                if is_last {
                    if !out.stdout.is_empty() {
                        let _ = fan_tx.send((Stream::Stdout, out.stdout.clone())).await;
                    }
                    if !out.stderr.is_empty() {
                        let _ = fan_tx.send((Stream::Stderr, out.stderr.clone())).await;
                    }
                }
            }

            if let Some(msg) = &out.spawn_error {
                let _ = fan_tx.send((Stream::Stderr, msg.clone().into_bytes())).await;
                out.stderr.extend(msg.clone().into_bytes());
            }
            out
        }
        Stage::Subshell(script) => Box::pin(run_script(script, env_ctx, stdin, is_last, fan_tx)).await,
    }
}

async fn run_pipeline(pipeline: &Pipeline, env_ctx: &ExecEnv, initial_stdin: Vec<u8>, fan_tx: &mpsc::Sender<(Stream, Vec<u8>)>) -> StageOutput {
    let mut current_stdin = initial_stdin;
    let mut stderr_acc = Vec::new();
    let mut final_stdout = Vec::new();
    let mut current_code = 0;
    let mut first_nonzero: Option<i32> = None;
    let count = pipeline.stages.len();

    for (i, stage) in pipeline.stages.iter().enumerate() {
        let is_last = i + 1 == count;
        let out = run_stage(stage, env_ctx, current_stdin, is_last, fan_tx).await;
        stderr_acc.extend(out.stderr);
        current_code = out.code;
        if out.code != 0 && first_nonzero.is_none() {
            first_nonzero = Some(out.code);
        }
        if is_last {
            final_stdout = out.stdout;
        } else {
            current_stdin = out.stdout;
        }
    }

    let code = if env_ctx.pipefail { first_nonzero.unwrap_or(0) } else { current_code };
    StageOutput::ok(final_stdout, stderr_acc, code)
}

async fn run_andor(andor: &AndOr, env_ctx: &ExecEnv, stdin: Vec<u8>, is_last_statement: bool, fan_tx: &mpsc::Sender<(Stream, Vec<u8>)>) -> StageOutput {
    let mut result = run_pipeline(&andor.first, env_ctx, stdin.clone(), fan_tx).await;
    for (op, pipeline) in &andor.rest {
        let should_run = match op {
            AndOrOp::And => result.code == 0,
            AndOrOp::Or => result.code != 0,
        };
        if !should_run {
            continue;
        }
        result = run_pipeline(pipeline, env_ctx, stdin.clone(), fan_tx).await;
    }
    let _ = is_last_statement;
    result
}

pub async fn run_script(script: &Script, env_ctx: &ExecEnv, stdin: Vec<u8>, is_last: bool, fan_tx: &mpsc::Sender<(Stream, Vec<u8>)>) -> StageOutput {
    let mut result = StageOutput::ok(Vec::new(), Vec::new(), 0);
    let count = script.statements.len();
    for (i, andor) in script.statements.iter().enumerate() {
        let is_last_overall = is_last && i + 1 == count;
        result = run_andor(andor, env_ctx, stdin.clone(), is_last_overall, fan_tx).await;
    }
    result
}
