//! `_write_multiline_content` — the external-helpers compatibility shim:
//! base64-decodes a body into a file so callers whose own flag parsing
//! chokes on complex multiline payloads (embedded quotes, newlines,
//! control characters) can hand the engine a safe, flat argument instead.
//!
//! Grounded on `fs/types.rs`'s base64 codec *pattern* (decode-then-write),
//! redone with the `base64` crate per the "never hand-roll what the
//! ecosystem provides" rule, and `tempfile` for the backing file mentioned
//! in the sibling example repos' dependency lists.

use async_trait::async_trait;
use base64::Engine;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::registry::{BufferedCommand, CommandContext, VirtualResult};

pub struct WriteMultilineCommand;

#[async_trait]
impl BufferedCommand for WriteMultilineCommand {
    fn name(&self) -> &'static str {
        "_write_multiline_content"
    }

    /// Usage: `_write_multiline_content <path> <base64-body>`. Writes the
    /// decoded body to `<path>` (relative paths resolve against the
    /// runner's current working directory).
    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let [path_arg, body_arg] = match ctx.args.as_slice() {
            [p, b] => [p.clone(), b.clone()],
            _ => return VirtualResult::usage_error("_write_multiline_content: expected <path> <base64-body>\n"),
        };

        let decoded = match base64::engine::general_purpose::STANDARD.decode(body_arg.trim()) {
            Ok(d) => d,
            Err(e) => return VirtualResult::failure(1, format!("_write_multiline_content: invalid base64: {e}\n")),
        };

        let cwd = ctx.current_dir().await;
        let path = if Path::new(&path_arg).is_absolute() { path_arg.clone().into() } else { Path::new(&cwd).join(&path_arg) };

        match tokio::fs::File::create(&path).await {
            Ok(mut f) => match f.write_all(&decoded).await {
                Ok(()) => VirtualResult::ok(Vec::new()),
                Err(e) => VirtualResult::failure(1, format!("_write_multiline_content: {e}\n")),
            },
            Err(e) => VirtualResult::failure(1, format!("_write_multiline_content: {e}\n")),
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

    #[tokio::test]
    async fn decodes_and_writes_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let body = base64::engine::general_purpose::STANDARD.encode(b"line one\nline two\n");
        let ctx = CommandContext {
            args: vec![path.to_str().unwrap().to_string(), body],
            stdin: Vec::new(),
            cwd: Arc::new(Mutex::new(dir.path().to_str().unwrap().to_string())),
            env: HashMap::new(),
            is_cancelled: Arc::new(AtomicBool::new(false)),
        };
        let r = WriteMultilineCommand.run(ctx).await;
        assert_eq!(r.code, 0);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"line one\nline two\n");
    }
}
