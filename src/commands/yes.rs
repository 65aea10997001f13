//! `yes` — no upstream file exists for this (the reference shell never
//! spawns an unbounded producer); grounded on the same cancellable-async-task pattern
//! as `sleep.rs` and on GNU `yes`'s documented behavior: repeat the operand
//! (or `y` with no operand), newline-terminated, yielding cooperatively so a
//! consumer's back-pressure or an abort token can stop it.

use async_trait::async_trait;

use crate::registry::{ChunkSink, CommandContext, StreamingCommand};

pub struct YesCommand;

/// Cooperative yield cadence: check cancellation and let the scheduler run
/// other tasks every N writes, matching the "no busy loops" design note.
const YIELD_EVERY: usize = 256;

#[async_trait]
impl StreamingCommand for YesCommand {
    fn name(&self) -> &'static str {
        "yes"
    }

    async fn run(&self, ctx: CommandContext, out: ChunkSink) -> i32 {
        let word = if ctx.args.is_empty() { "y".to_string() } else { ctx.args.join(" ") };
        let line = format!("{word}\n").into_bytes();

        let mut count = 0usize;
        loop {
            if ctx.is_cancelled() {
                return 130;
            }
            if out.send(line.clone()).await.is_err() {
                // consumer dropped the receiver (pipeline closed downstream)
                return 0;
            }
            count += 1;
            if count % YIELD_EVERY == 0 {
                tokio::task::yield_now().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::{mpsc, Mutex};

    fn ctx(args: &[&str], cancelled: Arc<AtomicBool>) -> CommandContext {
        CommandContext {
            args: args.iter().map(|s| s.to_string()).collect(),
            stdin: Vec::new(),
            cwd: Arc::new(Mutex::new("/".to_string())),
            env: HashMap::new(),
            is_cancelled: cancelled,
        }
    }

    #[tokio::test]
    async fn yes_emits_default_word_until_cancelled() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::channel(4);
        let c = ctx(&[], cancelled.clone());
        let handle = tokio::spawn(async move { YesCommand.run(c, tx).await });
        let first = rx.recv().await.unwrap();
        assert_eq!(first, b"y\n");
        cancelled.store(true, Ordering::Relaxed);
        while rx.recv().await.is_some() {}
        let code = handle.await.unwrap();
        assert_eq!(code, 130);
    }

    #[tokio::test]
    async fn yes_repeats_custom_word() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::channel(4);
        let c = ctx(&["hi", "there"], cancelled.clone());
        tokio::spawn(async move { YesCommand.run(c, tx).await });
        let first = rx.recv().await.unwrap();
        assert_eq!(first, b"hi there\n");
    }
}
