//! `sleep` — grounded on `commands/sleep_cmd/mod.rs`'s duration-suffix
//! regex, but executed as a cancellable async task (`tokio::time::sleep` in
//! short slices, observing the abort token) instead of a blocking
//! `std::thread::sleep`, so no busy loops and the abort token is always
//! observed. Directly backs the `sleep 30` + SIGINT → 130 scenario: the
//! pipeline must not hang past the interrupt.

use async_trait::async_trait;
use std::sync::OnceLock;
use std::time::Duration;

use crate::registry::{ChunkSink, CommandContext, StreamingCommand};

pub struct SleepCommand;

fn duration_re() -> &'static regex_lite::Regex {
    static RE: OnceLock<regex_lite::Regex> = OnceLock::new();
    RE.get_or_init(|| regex_lite::Regex::new(r"^(\d+\.?\d*)(s|m|h|d)?$").unwrap())
}

fn parse_duration(arg: &str) -> Option<f64> {
    let caps = duration_re().captures(arg)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str()) {
        Some("m") => 60.0,
        Some("h") => 3_600.0,
        Some("d") => 86_400.0,
        _ => 1.0,
    };
    Some(value * multiplier * 1000.0)
}

/// Cooperative poll interval; bounds how long cancellation takes to notice.
const POLL_MS: u64 = 50;

#[async_trait]
impl StreamingCommand for SleepCommand {
    fn name(&self) -> &'static str {
        "sleep"
    }

    async fn run(&self, ctx: CommandContext, _out: ChunkSink) -> i32 {
        let Some(arg) = ctx.args.first() else {
            return 1;
        };
        let Some(total_ms) = parse_duration(arg) else {
            return 1;
        };

        let mut remaining = total_ms;
        while remaining > 0.0 {
            if ctx.is_cancelled() {
                return 130;
            }
            let slice = remaining.min(POLL_MS as f64);
            tokio::time::sleep(Duration::from_millis(slice as u64)).await;
            remaining -= slice;
        }
        0
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

    #[test]
    fn parses_suffixed_durations() {
        assert_eq!(parse_duration("2"), Some(2000.0));
        assert_eq!(parse_duration("1.5s"), Some(1500.0));
        assert_eq!(parse_duration("2m"), Some(120_000.0));
    }

    #[tokio::test]
    async fn sleep_returns_zero_after_elapsed() {
        let (tx, _rx) = mpsc::channel(1);
        let code = SleepCommand.run(ctx(&["0.05"], Arc::new(AtomicBool::new(false))), tx).await;
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn sleep_reacts_to_cancellation() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let (tx, _rx) = mpsc::channel(1);
        let c = ctx(&["30"], cancelled.clone());
        let handle = tokio::spawn(async move { SleepCommand.run(c, tx).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancelled.store(true, Ordering::Relaxed);
        let code = handle.await.unwrap();
        assert_eq!(code, 130);
    }
}
