//! Filesystem-touching virtual commands (`cat`, `ls`, `mkdir`, `cp`, `mv`,
//! `rm`, `touch`, `head`, `tail`). Grounded on the *style* sampled from
//! `echo`/`seq`/`tee` (flag-parsing loop, `VirtualResult`-shaped return,
//! inline `#[cfg(test)]` table) rather than the much larger
//! POSIX-exhaustive, `InMemoryFs`-bound originals (`commands/cat`,
//! `commands/ls`, `commands/mkdir`, `commands/cp`, `commands/mv`,
//! `commands/rm`, `commands/touch`, `commands/head`, `commands/tail`);
//! these target the real filesystem via `tokio::fs` so output matches
//! whatever a native coreutils invocation of the same name would produce.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::registry::{BufferedCommand, CommandContext, VirtualResult};

fn resolve(cwd: &str, path: &str) -> PathBuf {
    if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        Path::new(cwd).join(path)
    }
}

pub struct CatCommand;

#[async_trait]
impl BufferedCommand for CatCommand {
    fn name(&self) -> &'static str {
        "cat"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let mut files = Vec::new();
        for arg in &ctx.args {
            if arg.starts_with('-') && arg != "-" {
                return VirtualResult::unknown_flag("cat", arg);
            }
            files.push(arg.as_str());
        }
        if files.is_empty() {
            return VirtualResult::ok(ctx.stdin.clone());
        }
        let cwd = ctx.current_dir().await;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        for file in files {
            if file == "-" {
                stdout.extend_from_slice(&ctx.stdin);
                continue;
            }
            match tokio::fs::read(resolve(&cwd, file)).await {
                Ok(bytes) => stdout.extend(bytes),
                Err(e) => stderr.extend(format!("cat: {file}: {e}\n").into_bytes()),
            }
        }
        let code = if stderr.is_empty() { 0 } else { 1 };
        VirtualResult { code, stdout, stderr }
    }
}

pub struct MkdirCommand;

#[async_trait]
impl BufferedCommand for MkdirCommand {
    fn name(&self) -> &'static str {
        "mkdir"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let mut parents = false;
        let mut dirs = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-p" | "--parents" => parents = true,
                s if s.starts_with('-') && s != "-" => return VirtualResult::unknown_flag("mkdir", s),
                other => dirs.push(other.to_string()),
            }
        }
        if dirs.is_empty() {
            return VirtualResult::usage_error("mkdir: missing operand\n");
        }
        let cwd = ctx.current_dir().await;
        let mut stderr = Vec::new();
        for dir in &dirs {
            let path = resolve(&cwd, dir);
            let result = if parents { tokio::fs::create_dir_all(&path).await } else { tokio::fs::create_dir(&path).await };
            if let Err(e) = result {
                stderr.extend(format!("mkdir: {dir}: {e}\n").into_bytes());
            }
        }
        let code = if stderr.is_empty() { 0 } else { 1 };
        VirtualResult { code, stdout: Vec::new(), stderr }
    }
}

pub struct TouchCommand;

#[async_trait]
impl BufferedCommand for TouchCommand {
    fn name(&self) -> &'static str {
        "touch"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let mut files = Vec::new();
        for arg in &ctx.args {
            if arg.starts_with('-') && arg != "-" {
                return VirtualResult::unknown_flag("touch", arg);
            }
            files.push(arg.as_str());
        }
        if files.is_empty() {
            return VirtualResult::usage_error("touch: missing file operand\n");
        }
        let cwd = ctx.current_dir().await;
        let mut stderr = Vec::new();
        for file in files {
            let path = resolve(&cwd, file);
            if tokio::fs::metadata(&path).await.is_ok() {
                let now = std::time::SystemTime::now();
                let outcome = match tokio::fs::OpenOptions::new().write(true).open(&path).await {
                    Ok(f) => f.into_std().await.set_modified(now),
                    Err(e) => Err(e),
                };
                if let Err(e) = outcome {
                    stderr.extend(format!("touch: {file}: {e}\n").into_bytes());
                }
            } else if let Err(e) = tokio::fs::File::create(&path).await {
                stderr.extend(format!("touch: {file}: {e}\n").into_bytes());
            }
        }
        let code = if stderr.is_empty() { 0 } else { 1 };
        VirtualResult { code, stdout: Vec::new(), stderr }
    }
}

pub struct RmCommand;

#[async_trait]
impl BufferedCommand for RmCommand {
    fn name(&self) -> &'static str {
        "rm"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let mut recursive = false;
        let mut force = false;
        let mut targets = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-r" | "-R" | "--recursive" => recursive = true,
                "-f" | "--force" => force = true,
                "-rf" | "-fr" => {
                    recursive = true;
                    force = true;
                }
                s if s.starts_with('-') && s != "-" => return VirtualResult::unknown_flag("rm", s),
                other => targets.push(other.to_string()),
            }
        }
        if targets.is_empty() && !force {
            return VirtualResult::usage_error("rm: missing operand\n");
        }
        let cwd = ctx.current_dir().await;
        let mut stderr = Vec::new();
        for target in &targets {
            let path = resolve(&cwd, target);
            let meta = tokio::fs::symlink_metadata(&path).await;
            let result = match meta {
                Ok(m) if m.is_dir() && recursive => tokio::fs::remove_dir_all(&path).await,
                Ok(m) if m.is_dir() => Err(std::io::Error::new(std::io::ErrorKind::Other, "is a directory")),
                Ok(_) => tokio::fs::remove_file(&path).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                if !force {
                    stderr.extend(format!("rm: {target}: {e}\n").into_bytes());
                }
            }
        }
        let code = if stderr.is_empty() { 0 } else { 1 };
        VirtualResult { code, stdout: Vec::new(), stderr }
    }
}

pub struct CpCommand;

async fn copy_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    let meta = tokio::fs::metadata(src).await?;
    if meta.is_dir() {
        tokio::fs::create_dir_all(dst).await?;
        let mut entries = tokio::fs::read_dir(src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            Box::pin(copy_recursive(&src.join(&name), &dst.join(&name))).await?;
        }
        Ok(())
    } else {
        tokio::fs::copy(src, dst).await.map(|_| ())
    }
}

#[async_trait]
impl BufferedCommand for CpCommand {
    fn name(&self) -> &'static str {
        "cp"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let mut recursive = false;
        let mut paths = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-r" | "-R" | "--recursive" => recursive = true,
                s if s.starts_with('-') && s != "-" => return VirtualResult::unknown_flag("cp", s),
                other => paths.push(other.to_string()),
            }
        }
        if paths.len() < 2 {
            return VirtualResult::usage_error("cp: missing destination file operand\n");
        }
        let cwd = ctx.current_dir().await;
        let dest = resolve(&cwd, paths.last().unwrap());
        let sources = &paths[..paths.len() - 1];
        let mut stderr = Vec::new();
        for src in sources {
            let src_path = resolve(&cwd, src);
            let dst_path = if sources.len() > 1 || dest.is_dir_async().await {
                dest.join(src_path.file_name().unwrap_or_default())
            } else {
                dest.clone()
            };
            let is_dir_src = tokio::fs::metadata(&src_path).await.map(|m| m.is_dir()).unwrap_or(false);
            let result = if is_dir_src {
                if !recursive {
                    stderr.extend(format!("cp: -r not specified; omitting directory '{src}'\n").into_bytes());
                    continue;
                }
                copy_recursive(&src_path, &dst_path).await
            } else {
                tokio::fs::copy(&src_path, &dst_path).await.map(|_| ())
            };
            if let Err(e) = result {
                stderr.extend(format!("cp: {src}: {e}\n").into_bytes());
            }
        }
        let code = if stderr.is_empty() { 0 } else { 1 };
        VirtualResult { code, stdout: Vec::new(), stderr }
    }
}

trait IsDirAsync {
    fn is_dir_async(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send + '_>>;
}

impl IsDirAsync for PathBuf {
    fn is_dir_async(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send + '_>> {
        Box::pin(async move { tokio::fs::metadata(self).await.map(|m| m.is_dir()).unwrap_or(false) })
    }
}

pub struct MvCommand;

#[async_trait]
impl BufferedCommand for MvCommand {
    fn name(&self) -> &'static str {
        "mv"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let mut paths = Vec::new();
        for arg in &ctx.args {
            if arg.starts_with('-') && arg != "-" {
                return VirtualResult::unknown_flag("mv", arg);
            }
            paths.push(arg.clone());
        }
        if paths.len() < 2 {
            return VirtualResult::usage_error("mv: missing destination file operand\n");
        }
        let cwd = ctx.current_dir().await;
        let dest = resolve(&cwd, paths.last().unwrap());
        let sources = &paths[..paths.len() - 1];
        let mut stderr = Vec::new();
        for src in sources {
            let src_path = resolve(&cwd, src);
            let dst_path = if sources.len() > 1 || dest.is_dir_async().await {
                dest.join(src_path.file_name().unwrap_or_default())
            } else {
                dest.clone()
            };
            if let Err(e) = tokio::fs::rename(&src_path, &dst_path).await {
                stderr.extend(format!("mv: {src}: {e}\n").into_bytes());
            }
        }
        let code = if stderr.is_empty() { 0 } else { 1 };
        VirtualResult { code, stdout: Vec::new(), stderr }
    }
}

pub struct LsCommand;

#[async_trait]
impl BufferedCommand for LsCommand {
    fn name(&self) -> &'static str {
        "ls"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let mut long = false;
        let mut all = false;
        let mut targets = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-l" => long = true,
                "-a" | "-A" => all = true,
                "-la" | "-al" => { long = true; all = true; }
                other if !other.starts_with('-') => targets.push(other.to_string()),
                s => return VirtualResult::unknown_flag("ls", s),
            }
        }
        let cwd = ctx.current_dir().await;
        if targets.is_empty() {
            targets.push(".".to_string());
        }
        let mut stdout = String::new();
        let mut stderr = Vec::new();
        for target in &targets {
            let path = resolve(&cwd, target);
            let mut entries = match tokio::fs::read_dir(&path).await {
                Ok(e) => e,
                Err(e) => {
                    stderr.extend(format!("ls: {target}: {e}\n").into_bytes());
                    continue;
                }
            };
            let mut names = Vec::new();
            while let Ok(Some(entry)) = entries.next_entry().await {
                let name = entry.file_name().to_string_lossy().to_string();
                if !all && name.starts_with('.') {
                    continue;
                }
                names.push((name, entry.metadata().await.ok()));
            }
            names.sort_by(|a, b| a.0.cmp(&b.0));
            for (name, meta) in names {
                if long {
                    let kind = meta.map(|m| if m.is_dir() { 'd' } else { '-' }).unwrap_or('?');
                    stdout.push_str(&format!("{kind} {name}\n"));
                } else {
                    stdout.push_str(&name);
                    stdout.push('\n');
                }
            }
        }
        let code = if stderr.is_empty() { 0 } else { 1 };
        VirtualResult { code, stdout: stdout.into_bytes(), stderr }
    }
}

pub struct HeadCommand;

#[async_trait]
impl BufferedCommand for HeadCommand {
    fn name(&self) -> &'static str {
        "head"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let mut n = 10usize;
        let mut files = Vec::new();
        let mut iter = ctx.args.iter().peekable();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-n" => {
                    let Some(v) = iter.next() else {
                        return VirtualResult::usage_error("head: option requires an argument -- 'n'\n");
                    };
                    match v.parse() {
                        Ok(parsed) => n = parsed,
                        Err(_) => return VirtualResult::usage_error(format!("head: invalid number of lines: '{v}'\n")),
                    }
                }
                s if s.starts_with("-n") && s.len() > 2 => match s[2..].parse() {
                    Ok(parsed) => n = parsed,
                    Err(_) => return VirtualResult::usage_error(format!("head: invalid number of lines: '{}'\n", &s[2..])),
                },
                s if s.starts_with('-') && s != "-" => return VirtualResult::unknown_flag("head", s),
                other => files.push(other.to_string()),
            }
        }
        let input = if files.is_empty() {
            ctx.stdin.clone()
        } else {
            let cwd = ctx.current_dir().await;
            match tokio::fs::read(resolve(&cwd, &files[0])).await {
                Ok(b) => b,
                Err(e) => return VirtualResult::failure(1, format!("head: {}: {e}\n", files[0])),
            }
        };
        let text = String::from_utf8_lossy(&input);
        let out: String = text.lines().take(n).map(|l| format!("{l}\n")).collect();
        VirtualResult::ok(out.into_bytes())
    }
}

pub struct TailCommand;

#[async_trait]
impl BufferedCommand for TailCommand {
    fn name(&self) -> &'static str {
        "tail"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let mut n = 10usize;
        let mut files = Vec::new();
        let mut iter = ctx.args.iter().peekable();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-n" => {
                    let Some(v) = iter.next() else {
                        return VirtualResult::usage_error("tail: option requires an argument -- 'n'\n");
                    };
                    match v.parse() {
                        Ok(parsed) => n = parsed,
                        Err(_) => return VirtualResult::usage_error(format!("tail: invalid number of lines: '{v}'\n")),
                    }
                }
                s if s.starts_with("-n") && s.len() > 2 => match s[2..].parse() {
                    Ok(parsed) => n = parsed,
                    Err(_) => return VirtualResult::usage_error(format!("tail: invalid number of lines: '{}'\n", &s[2..])),
                },
                s if s.starts_with('-') && s != "-" => return VirtualResult::unknown_flag("tail", s),
                other => files.push(other.to_string()),
            }
        }
        let input = if files.is_empty() {
            ctx.stdin.clone()
        } else {
            let cwd = ctx.current_dir().await;
            match tokio::fs::read(resolve(&cwd, &files[0])).await {
                Ok(b) => b,
                Err(e) => return VirtualResult::failure(1, format!("tail: {}: {e}\n", files[0])),
            }
        };
        let text = String::from_utf8_lossy(&input);
        let lines: Vec<&str> = text.lines().collect();
        let start = lines.len().saturating_sub(n);
        let out: String = lines[start..].iter().map(|l| format!("{l}\n")).collect();
        VirtualResult::ok(out.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn ctx(args: &[&str], stdin: &[u8], cwd: &str) -> CommandContext {
        CommandContext {
            args: args.iter().map(|s| s.to_string()).collect(),
            stdin: stdin.to_vec(),
            cwd: Arc::new(Mutex::new(cwd.to_string())),
            env: HashMap::new(),
            is_cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    #[tokio::test]
    async fn cat_without_args_echoes_stdin() {
        let r = CatCommand.run(ctx(&[], b"hi\n", "/")).await;
        assert_eq!(r.stdout, b"hi\n");
    }

    #[tokio::test]
    async fn mkdir_and_rm_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        let r = MkdirCommand.run(ctx(&[sub.to_str().unwrap()], b"", dir.path().to_str().unwrap())).await;
        assert_eq!(r.code, 0);
        assert!(sub.is_dir());
        let r = RmCommand.run(ctx(&["-r", sub.to_str().unwrap()], b"", dir.path().to_str().unwrap())).await;
        assert_eq!(r.code, 0);
        assert!(!sub.exists());
    }

    #[tokio::test]
    async fn head_limits_lines() {
        let r = HeadCommand.run(ctx(&["-n", "2"], b"a\nb\nc\n", "/")).await;
        assert_eq!(r.stdout, b"a\nb\n");
    }

    #[tokio::test]
    async fn tail_keeps_last_lines() {
        let r = TailCommand.run(ctx(&["-n", "2"], b"a\nb\nc\n", "/")).await;
        assert_eq!(r.stdout, b"b\nc\n");
    }

    #[tokio::test]
    async fn ls_lists_directory_entries() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::File::create(dir.path().join("a.txt")).await.unwrap();
        let r = LsCommand.run(ctx(&[], b"", dir.path().to_str().unwrap())).await;
        assert_eq!(r.stdout, b"a.txt\n");
    }

    #[tokio::test]
    async fn cat_rejects_unknown_flag() {
        let r = CatCommand.run(ctx(&["--bogus"], b"", "/")).await;
        assert_eq!(r.code, 2);
    }

    #[tokio::test]
    async fn mkdir_rejects_unknown_flag() {
        let r = MkdirCommand.run(ctx(&["-x", "/tmp/whatever"], b"", "/")).await;
        assert_eq!(r.code, 2);
    }

    #[tokio::test]
    async fn ls_rejects_unknown_flag() {
        let r = LsCommand.run(ctx(&["-z"], b"", "/")).await;
        assert_eq!(r.code, 2);
    }

    #[tokio::test]
    async fn mv_rejects_unknown_flag() {
        let r = MvCommand.run(ctx(&["-x", "a", "b"], b"", "/")).await;
        assert_eq!(r.code, 2);
    }

    #[tokio::test]
    async fn head_rejects_non_numeric_n() {
        let r = HeadCommand.run(ctx(&["-n", "nope"], b"a\nb\n", "/")).await;
        assert_eq!(r.code, 2);
    }

    #[tokio::test]
    async fn tail_rejects_overflowing_n() {
        let r = TailCommand.run(ctx(&["-n", "99999999999999999999"], b"a\nb\n", "/")).await;
        assert_eq!(r.code, 2);
    }
}
