//! End-to-end scenarios run through the public `Shell`/`Runner` surface,
//! covering the pipeline/registration/signal paths not already exercised by
//! the unit tests living alongside `src/runner/mod.rs`.

use async_trait::async_trait;
use std::time::Duration;

use commandstream::registry::{BufferedCommand, CommandContext, Handler, VirtualResult};
use commandstream::{Shell, ShellOptions};

#[tokio::test]
async fn sort_reverse_pipeline_produces_expected_order() {
    let shell = Shell::new(ShellOptions::default());
    let runner = shell.exec("printf 'a\\nb\\nc\\n' | sort -r");
    let result = runner.run().await.unwrap();
    assert_eq!(result.code, 0);
    assert_eq!(result.stdout_string(), "c\nb\na\n");
}

struct MultiplyCommand {
    factor: i64,
}

#[async_trait]
impl BufferedCommand for MultiplyCommand {
    fn name(&self) -> &'static str {
        "multiply"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let factor = ctx.args.first().and_then(|a| a.parse::<i64>().ok()).unwrap_or(self.factor);
        let text = String::from_utf8_lossy(&ctx.stdin);
        let mut out = String::new();
        for line in text.lines() {
            let Ok(n) = line.trim().parse::<i64>() else {
                continue;
            };
            out.push_str(&format!("{}\n", n * factor));
        }
        VirtualResult::ok(out.into_bytes())
    }
}

#[tokio::test]
async fn seq_piped_into_user_registered_multiply_command() {
    let mut shell = Shell::new(ShellOptions::default());
    shell.register(Handler::Buffered(std::sync::Arc::new(MultiplyCommand { factor: 3 })));

    let runner = shell.exec("seq 1 3 | multiply 3");
    let result = runner.run().await.unwrap();
    assert_eq!(result.code, 0);
    assert_eq!(result.stdout_string(), "3\n6\n9\n");
}

#[tokio::test]
async fn stderr_redirect_to_stdout_still_dispatches_virtual_command() {
    // If `2>&1` wrongly tripped the real-shell fallback, `multiply` (a
    // virtual command with no on-disk binary) would fail with "command
    // not found" instead of running.
    let mut shell = Shell::new(ShellOptions::default());
    shell.register(Handler::Buffered(std::sync::Arc::new(MultiplyCommand { factor: 3 })));

    let runner = shell.exec("seq 1 3 | multiply 3 2>&1");
    let result = runner.run().await.unwrap();
    assert_eq!(result.code, 0);
    assert_eq!(result.stdout_string(), "3\n6\n9\n");
}

#[tokio::test]
async fn sleep_interrupted_by_sigint_exits_130_without_hanging() {
    let shell = Shell::new(ShellOptions::default());
    let runner = shell.exec("sleep 30");
    runner.start();

    tokio::time::sleep(Duration::from_millis(200)).await;
    runner.kill("SIGINT");

    let result = tokio::time::timeout(Duration::from_secs(5), runner.run())
        .await
        .expect("runner did not finish promptly after kill")
        .unwrap();

    assert_eq!(result.code, 130);
}
