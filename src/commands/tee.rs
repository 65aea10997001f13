//! `tee` — grounded on `commands/tee/mod.rs`'s `-a` flag and passthrough
//! write, adapted from `ctx.fs.write_file` to real `tokio::fs`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::registry::{BufferedCommand, CommandContext, VirtualResult};

pub struct TeeCommand;

fn resolve_path(cwd: &str, path: &str) -> PathBuf {
    if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        Path::new(cwd).join(path)
    }
}

#[async_trait]
impl BufferedCommand for TeeCommand {
    fn name(&self) -> &'static str {
        "tee"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let mut append = false;
        let mut files = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-a" | "--append" => append = true,
                s if s.starts_with('-') && s != "-" => return VirtualResult::unknown_flag("tee", s),
                other => files.push(other.to_string()),
            }
        }

        let cwd = ctx.current_dir().await;
        let mut stderr = Vec::new();
        for file in &files {
            let path = resolve_path(&cwd, file);
            let result = if append {
                tokio::fs::OpenOptions::new().create(true).append(true).open(&path).await
            } else {
                tokio::fs::File::create(&path).await
            };
            match result {
                Ok(mut f) => {
                    if let Err(e) = f.write_all(&ctx.stdin).await {
                        stderr.extend(format!("tee: {file}: {e}\n").into_bytes());
                    }
                }
                Err(e) => stderr.extend(format!("tee: {file}: {e}\n").into_bytes()),
            }
        }

        let code = if stderr.is_empty() { 0 } else { 1 };
        VirtualResult { code, stdout: ctx.stdin.clone(), stderr }
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
    async fn tee_writes_file_and_passes_through_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let ctx = CommandContext {
            args: vec![path.to_str().unwrap().to_string()],
            stdin: b"hello\n".to_vec(),
            cwd: Arc::new(Mutex::new(dir.path().to_str().unwrap().to_string())),
            env: HashMap::new(),
            is_cancelled: Arc::new(AtomicBool::new(false)),
        };
        let r = TeeCommand.run(ctx).await;
        assert_eq!(r.code, 0);
        assert_eq!(r.stdout, b"hello\n");
        let written = tokio::fs::read(&path).await.unwrap();
        assert_eq!(written, b"hello\n");
    }

    #[tokio::test]
    async fn tee_rejects_unknown_flag() {
        let ctx = CommandContext {
            args: vec!["--bogus".to_string()],
            stdin: b"hi\n".to_vec(),
            cwd: Arc::new(Mutex::new("/".to_string())),
            env: HashMap::new(),
            is_cancelled: Arc::new(AtomicBool::new(false)),
        };
        let r = TeeCommand.run(ctx).await;
        assert_eq!(r.code, 2);
    }
}
