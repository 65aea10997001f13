//! `pwd` — grounded on `commands/pwd/mod.rs`'s shape (no flags needed
//! beyond printing the current directory).

use async_trait::async_trait;

use crate::registry::{BufferedCommand, CommandContext, VirtualResult};

pub struct PwdCommand;

#[async_trait]
impl BufferedCommand for PwdCommand {
    fn name(&self) -> &'static str {
        "pwd"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let cwd = ctx.current_dir().await;
        VirtualResult::ok(format!("{cwd}\n").into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn pwd_prints_current_dir() {
        let ctx = CommandContext {
            args: vec![],
            stdin: Vec::new(),
            cwd: Arc::new(Mutex::new("/tmp/xyz".to_string())),
            env: HashMap::new(),
            is_cancelled: Arc::new(AtomicBool::new(false)),
        };
        let r = PwdCommand.run(ctx).await;
        assert_eq!(r.stdout, b"/tmp/xyz\n");
    }
}
