//! `env` — grounded on `commands/env/mod.rs`'s shape: with no
//! arguments, print `NAME=value` for every variable, one per line, sorted
//! for deterministic output (real `env` preserves insertion order; this
//! engine's `CommandContext::env` is a `HashMap`, so sorting is the only
//! deterministic choice available without carrying an ordered map).

use async_trait::async_trait;

use crate::registry::{BufferedCommand, CommandContext, VirtualResult};

pub struct EnvCommand;

#[async_trait]
impl BufferedCommand for EnvCommand {
    fn name(&self) -> &'static str {
        "env"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        if !ctx.args.is_empty() {
            return VirtualResult::usage_error("env: running a program via env is not supported\n");
        }
        let mut pairs: Vec<(&String, &String)> = ctx.env.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        let mut out = String::new();
        for (k, v) in pairs {
            out.push_str(k);
            out.push('=');
            out.push_str(v);
            out.push('\n');
        }
        VirtualResult::ok(out.into_bytes())
    }
}

pub struct WhichCommand;

#[async_trait]
impl BufferedCommand for WhichCommand {
    fn name(&self) -> &'static str {
        "which"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let Some(name) = ctx.args.first() else {
            return VirtualResult::usage_error("which: missing operand\n");
        };
        let path_var = ctx.env.get("PATH").cloned().unwrap_or_default();
        for dir in path_var.split(':') {
            if dir.is_empty() {
                continue;
            }
            let candidate = std::path::Path::new(dir).join(name);
            if tokio::fs::metadata(&candidate).await.map(|m| m.is_file()).unwrap_or(false) {
                return VirtualResult::ok(format!("{}\n", candidate.display()).into_bytes());
            }
        }
        VirtualResult::failure(1, String::new())
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
    async fn env_lists_sorted_vars() {
        let mut env = HashMap::new();
        env.insert("B".to_string(), "2".to_string());
        env.insert("A".to_string(), "1".to_string());
        let ctx = CommandContext { args: vec![], stdin: Vec::new(), cwd: Arc::new(Mutex::new("/".into())), env, is_cancelled: Arc::new(AtomicBool::new(false)) };
        let r = EnvCommand.run(ctx).await;
        assert_eq!(r.stdout, b"A=1\nB=2\n");
    }

    #[tokio::test]
    async fn which_reports_missing_binary() {
        let mut env = HashMap::new();
        env.insert("PATH".to_string(), "/nonexistent".to_string());
        let ctx = CommandContext { args: vec!["nope-binary".into()], stdin: Vec::new(), cwd: Arc::new(Mutex::new("/".into())), env, is_cancelled: Arc::new(AtomicBool::new(false)) };
        let r = WhichCommand.run(ctx).await;
        assert_eq!(r.code, 1);
    }
}
