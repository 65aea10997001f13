//! Line-oriented virtual commands (`sort`, `uniq`, `wc`, `grep`). Grounded
//! on the *style* sampled from `echo`/`seq` rather than the much larger
//! `commands/sort`, `commands/uniq`, `commands/wc`, `commands/grep`
//! originals; these read stdin (or a file argument) and never touch an
//! in-memory filesystem abstraction.

use async_trait::async_trait;
use std::cmp::Ordering;

use crate::registry::{BufferedCommand, CommandContext, VirtualResult};

async fn read_input(ctx: &CommandContext, files: &[String]) -> Result<Vec<u8>, String> {
    if files.is_empty() {
        return Ok(ctx.stdin.clone());
    }
    let cwd = ctx.current_dir().await;
    let path = if std::path::Path::new(&files[0]).is_absolute() {
        std::path::PathBuf::from(&files[0])
    } else {
        std::path::Path::new(&cwd).join(&files[0])
    };
    tokio::fs::read(&path).await.map_err(|e| format!("{}: {e}\n", files[0]))
}

pub struct SortCommand;

#[async_trait]
impl BufferedCommand for SortCommand {
    fn name(&self) -> &'static str {
        "sort"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let mut reverse = false;
        let mut numeric = false;
        let mut unique = false;
        let mut files = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-r" => reverse = true,
                "-n" => numeric = true,
                "-u" => unique = true,
                s if s.starts_with('-') && s.len() > 1 && s[1..].chars().all(|c| "rnu".contains(c)) => {
                    reverse |= s.contains('r');
                    numeric |= s.contains('n');
                    unique |= s.contains('u');
                }
                s if s.starts_with('-') && s != "-" => return VirtualResult::unknown_flag("sort", s),
                other => files.push(other.to_string()),
            }
        }
        let input = match read_input(&ctx, &files).await {
            Ok(b) => b,
            Err(e) => return VirtualResult::failure(1, format!("sort: {e}")),
        };
        let text = String::from_utf8_lossy(&input);
        let mut lines: Vec<&str> = text.lines().collect();

        if numeric {
            lines.sort_by(|a, b| {
                let na: f64 = a.trim().parse().unwrap_or(0.0);
                let nb: f64 = b.trim().parse().unwrap_or(0.0);
                na.partial_cmp(&nb).unwrap_or(Ordering::Equal)
            });
        } else {
            lines.sort();
        }
        if reverse {
            lines.reverse();
        }
        if unique {
            lines.dedup();
        }

        let mut out: String = lines.iter().map(|l| format!("{l}\n")).collect();
        if out.is_empty() && !input.is_empty() {
            out = String::new();
        }
        VirtualResult::ok(out.into_bytes())
    }
}

pub struct UniqCommand;

#[async_trait]
impl BufferedCommand for UniqCommand {
    fn name(&self) -> &'static str {
        "uniq"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let mut count = false;
        let mut duplicates_only = false;
        let mut unique_only = false;
        let mut ignore_case = false;
        let mut files = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-c" => count = true,
                "-d" => duplicates_only = true,
                "-u" => unique_only = true,
                "-i" => ignore_case = true,
                s if s.starts_with('-') && s.len() > 1 && s[1..].chars().all(|c| "cdui".contains(c)) => {
                    count |= s.contains('c');
                    duplicates_only |= s.contains('d');
                    unique_only |= s.contains('u');
                    ignore_case |= s.contains('i');
                }
                s if s.starts_with('-') && s != "-" => return VirtualResult::unknown_flag("uniq", s),
                other => files.push(other.to_string()),
            }
        }
        let input = match read_input(&ctx, &files).await {
            Ok(b) => b,
            Err(e) => return VirtualResult::failure(1, format!("uniq: {e}")),
        };
        let text = String::from_utf8_lossy(&input);
        let key = |s: &str| if ignore_case { s.to_lowercase() } else { s.to_string() };

        let mut groups: Vec<(String, usize)> = Vec::new();
        for line in text.lines() {
            match groups.last_mut() {
                Some((last, n)) if key(last) == key(line) => *n += 1,
                _ => groups.push((line.to_string(), 1)),
            }
        }

        let mut out = String::new();
        for (line, n) in groups {
            if duplicates_only && n < 2 {
                continue;
            }
            if unique_only && n > 1 {
                continue;
            }
            if count {
                out.push_str(&format!("{n:>7} {line}\n"));
            } else {
                out.push_str(&format!("{line}\n"));
            }
        }
        VirtualResult::ok(out.into_bytes())
    }
}

pub struct WcCommand;

#[async_trait]
impl BufferedCommand for WcCommand {
    fn name(&self) -> &'static str {
        "wc"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let mut lines_only = false;
        let mut words_only = false;
        let mut bytes_only = false;
        let mut files = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-l" => lines_only = true,
                "-w" => words_only = true,
                "-c" => bytes_only = true,
                s if s.starts_with('-') && s != "-" => return VirtualResult::unknown_flag("wc", s),
                other => files.push(other.to_string()),
            }
        }
        let input = match read_input(&ctx, &files).await {
            Ok(b) => b,
            Err(e) => return VirtualResult::failure(1, format!("wc: {e}")),
        };
        let text = String::from_utf8_lossy(&input);
        let lines = text.lines().count();
        let words = text.split_whitespace().count();
        let bytes = input.len();

        let out = if lines_only {
            format!("{lines}\n")
        } else if words_only {
            format!("{words}\n")
        } else if bytes_only {
            format!("{bytes}\n")
        } else {
            format!("{lines:>7} {words:>7} {bytes:>7}\n")
        };
        VirtualResult::ok(out.into_bytes())
    }
}

pub struct GrepCommand;

#[async_trait]
impl BufferedCommand for GrepCommand {
    fn name(&self) -> &'static str {
        "grep"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let mut invert = false;
        let mut ignore_case = false;
        let mut count_only = false;
        let mut pattern = None;
        let mut files = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-v" => invert = true,
                "-i" => ignore_case = true,
                "-c" => count_only = true,
                s if s.starts_with('-') && s != "-" && pattern.is_none() => return VirtualResult::unknown_flag("grep", s),
                other if pattern.is_none() => pattern = Some(other.to_string()),
                other => files.push(other.to_string()),
            }
        }
        let Some(pattern) = pattern else {
            return VirtualResult::usage_error("grep: missing pattern\n");
        };
        let flags = if ignore_case { "(?i)" } else { "" };
        let re = match regex_lite::Regex::new(&format!("{flags}{pattern}")) {
            Ok(r) => r,
            Err(e) => return VirtualResult::failure(2, format!("grep: invalid pattern: {e}\n")),
        };
        let input = match read_input(&ctx, &files).await {
            Ok(b) => b,
            Err(e) => return VirtualResult::failure(2, format!("grep: {e}")),
        };
        let text = String::from_utf8_lossy(&input);

        let mut matched_lines = Vec::new();
        for line in text.lines() {
            let is_match = re.is_match(line);
            if is_match != invert {
                matched_lines.push(line);
            }
        }

        let out = if count_only {
            format!("{}\n", matched_lines.len())
        } else {
            matched_lines.iter().map(|l| format!("{l}\n")).collect()
        };
        let code = if matched_lines.is_empty() { 1 } else { 0 };
        VirtualResult { code, stdout: out.into_bytes(), stderr: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn ctx(args: &[&str], stdin: &[u8]) -> CommandContext {
        CommandContext {
            args: args.iter().map(|s| s.to_string()).collect(),
            stdin: stdin.to_vec(),
            cwd: Arc::new(Mutex::new("/".to_string())),
            env: HashMap::new(),
            is_cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    #[tokio::test]
    async fn sort_reverse_numeric() {
        let r = SortCommand.run(ctx(&["-rn"], b"1\n3\n2\n")).await;
        assert_eq!(r.stdout, b"3\n2\n1\n");
    }

    #[tokio::test]
    async fn sort_lexical_matches_scenario() {
        let r = SortCommand.run(ctx(&["-r"], b"a\nb\nc\n")).await;
        assert_eq!(r.stdout, b"c\nb\na\n");
    }

    #[tokio::test]
    async fn uniq_counts_runs() {
        let r = UniqCommand.run(ctx(&["-c"], b"a\na\nb\n")).await;
        assert_eq!(String::from_utf8(r.stdout).unwrap(), "      2 a\n      1 b\n");
    }

    #[tokio::test]
    async fn wc_counts_lines_words_bytes() {
        let r = WcCommand.run(ctx(&[], b"a b\nc\n")).await;
        assert_eq!(String::from_utf8(r.stdout).unwrap().trim(), "2       3       6");
    }

    #[tokio::test]
    async fn grep_filters_matching_lines() {
        let r = GrepCommand.run(ctx(&["b"], b"a\nb\nbc\n")).await;
        assert_eq!(r.stdout, b"b\nbc\n");
        assert_eq!(r.code, 0);
    }

    #[tokio::test]
    async fn grep_no_matches_returns_one() {
        let r = GrepCommand.run(ctx(&["zzz"], b"a\nb\n")).await;
        assert_eq!(r.code, 1);
    }

    #[tokio::test]
    async fn sort_rejects_unknown_flag() {
        let r = SortCommand.run(ctx(&["--bogus"], b"a\n")).await;
        assert_eq!(r.code, 2);
    }

    #[tokio::test]
    async fn uniq_rejects_unknown_flag() {
        let r = UniqCommand.run(ctx(&["-z"], b"a\n")).await;
        assert_eq!(r.code, 2);
    }

    #[tokio::test]
    async fn wc_rejects_unknown_flag() {
        let r = WcCommand.run(ctx(&["-x"], b"a\n")).await;
        assert_eq!(r.code, 2);
    }

    #[tokio::test]
    async fn grep_rejects_unknown_flag() {
        let r = GrepCommand.run(ctx(&["-z", "a"], b"a\n")).await;
        assert_eq!(r.code, 2);
    }
}
