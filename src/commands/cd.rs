//! `cd` — grounded on `interpreter/builtins/cd_cmd.rs`'s path normalization
//! and `~`/`-` resolution, adapted to mutate the runner's shared
//! process-wide cwd cell instead of `&mut InterpreterState`.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use crate::registry::{BufferedCommand, CommandContext, VirtualResult};

pub struct CdCommand;

fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push("/");
    }
    out
}

#[async_trait]
impl BufferedCommand for CdCommand {
    fn name(&self) -> &'static str {
        "cd"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let args: Vec<&str> = ctx.args.iter().map(|s| s.as_str()).filter(|a| *a != "-L" && *a != "-P").collect();
        let current = ctx.current_dir().await;

        let target = match args.first() {
            None | Some(&"") => ctx.env.get("HOME").cloned().unwrap_or_else(|| "/".to_string()),
            Some(&"-") => match ctx.env.get("OLDPWD") {
                Some(prev) => prev.clone(),
                None => return VirtualResult::failure(1, "cd: OLDPWD not set\n"),
            },
            Some(&"~") => ctx.env.get("HOME").cloned().unwrap_or_else(|| "/".to_string()),
            Some(other) => other.to_string(),
        };

        let resolved = if target.starts_with('/') {
            normalize_path(Path::new(&target))
        } else {
            normalize_path(&Path::new(&current).join(&target))
        };

        match tokio::fs::metadata(&resolved).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return VirtualResult::failure(1, format!("cd: not a directory: {}\n", resolved.display())),
            Err(_) => return VirtualResult::failure(1, format!("cd: no such file or directory: {}\n", resolved.display())),
        }

        let new_dir = resolved.to_string_lossy().to_string();
        {
            let mut cwd = ctx.cwd.lock().await;
            *cwd = new_dir.clone();
        }

        if args.first() == Some(&"-") {
            return VirtualResult::ok(format!("{new_dir}\n").into_bytes());
        }
        VirtualResult::ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn ctx(args: &[&str], cwd: &str, env: HashMap<String, String>) -> CommandContext {
        CommandContext {
            args: args.iter().map(|s| s.to_string()).collect(),
            stdin: Vec::new(),
            cwd: Arc::new(Mutex::new(cwd.to_string())),
            env,
            is_cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    #[tokio::test]
    async fn cd_updates_shared_cwd() {
        let dir = std::env::temp_dir();
        let c = ctx(&[dir.to_str().unwrap()], "/", HashMap::new());
        let cwd_cell = c.cwd.clone();
        let r = CdCommand.run(c).await;
        assert_eq!(r.code, 0);
        let new_cwd = cwd_cell.lock().await.clone();
        assert_eq!(PathBuf::from(&new_cwd), normalize_path(&dir));
    }

    #[tokio::test]
    async fn cd_nonexistent_fails() {
        let c = ctx(&["/no/such/dir/anywhere"], "/", HashMap::new());
        let r = CdCommand.run(c).await;
        assert_eq!(r.code, 1);
    }
}
