//! `exit` — grounded on `interpreter/builtins/exit_cmd.rs`'s numeric
//! validation and modulo-256 exit-code wraparound. Backs the `exit 42` +
//! errexit scenario: the returned code becomes the runner's final result,
//! which `errexit` (handled by the runner) turns into an await rejection.

use async_trait::async_trait;

use crate::registry::{BufferedCommand, CommandContext, VirtualResult};

pub struct ExitCommand;

fn is_valid_numeric_arg(s: &str) -> bool {
    let s = s.strip_prefix('-').unwrap_or(s);
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn wrap_exit_code(code: i64) -> i32 {
    (((code % 256) + 256) % 256) as i32
}

#[async_trait]
impl BufferedCommand for ExitCommand {
    fn name(&self) -> &'static str {
        "exit"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        match ctx.args.first() {
            None => VirtualResult { code: 0, stdout: Vec::new(), stderr: Vec::new() },
            Some(arg) if is_valid_numeric_arg(arg) => {
                let parsed: i64 = arg.parse().unwrap_or(0);
                VirtualResult { code: wrap_exit_code(parsed), stdout: Vec::new(), stderr: Vec::new() }
            }
            Some(arg) => VirtualResult::failure(2, format!("exit: {arg}: numeric argument required\n")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn ctx(args: &[&str]) -> CommandContext {
        CommandContext {
            args: args.iter().map(|s| s.to_string()).collect(),
            stdin: Vec::new(),
            cwd: Arc::new(Mutex::new("/".to_string())),
            env: HashMap::new(),
            is_cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    #[tokio::test]
    async fn exit_with_explicit_code() {
        let r = ExitCommand.run(ctx(&["42"])).await;
        assert_eq!(r.code, 42);
    }

    #[tokio::test]
    async fn exit_wraps_modulo_256() {
        let r = ExitCommand.run(ctx(&["300"])).await;
        assert_eq!(r.code, 44);
    }

    #[tokio::test]
    async fn exit_negative_wraps_into_range() {
        let r = ExitCommand.run(ctx(&["-1"])).await;
        assert_eq!(r.code, 255);
    }

    #[tokio::test]
    async fn exit_rejects_non_numeric() {
        let r = ExitCommand.run(ctx(&["abc"])).await;
        assert_eq!(r.code, 2);
    }

    #[tokio::test]
    async fn exit_with_no_args_defaults_to_zero() {
        let r = ExitCommand.run(ctx(&[])).await;
        assert_eq!(r.code, 0);
    }
}
