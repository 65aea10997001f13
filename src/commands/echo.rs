//! `echo` — grounded on `commands/echo/mod.rs`'s flag parsing and escape
//! processing, reused near-verbatim minus the in-memory filesystem context.

use async_trait::async_trait;

use crate::registry::{BufferedCommand, CommandContext, VirtualResult};

pub struct EchoCommand;

struct EscapeResult {
    output: String,
    stop: bool,
}

fn process_escapes(input: &str) -> EscapeResult {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '\\' || i + 1 >= chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let next = chars[i + 1];
        match next {
            '\\' => { out.push('\\'); i += 2; }
            'n' => { out.push('\n'); i += 2; }
            't' => { out.push('\t'); i += 2; }
            'r' => { out.push('\r'); i += 2; }
            'a' => { out.push('\u{7}'); i += 2; }
            'b' => { out.push('\u{8}'); i += 2; }
            'f' => { out.push('\u{c}'); i += 2; }
            'v' => { out.push('\u{b}'); i += 2; }
            'e' => { out.push('\u{1b}'); i += 2; }
            'c' => return EscapeResult { output: out, stop: true },
            '0' => {
                let mut j = i + 2;
                let mut digits = String::new();
                while j < chars.len() && digits.len() < 3 && chars[j].is_digit(8) {
                    digits.push(chars[j]);
                    j += 1;
                }
                let code = u8::from_str_radix(&digits, 8).unwrap_or(0);
                out.push(code as char);
                i = j;
            }
            'x' => {
                let mut j = i + 2;
                let mut digits = String::new();
                while j < chars.len() && digits.len() < 2 && chars[j].is_ascii_hexdigit() {
                    digits.push(chars[j]);
                    j += 1;
                }
                if digits.is_empty() {
                    out.push('\\');
                    out.push('x');
                    i += 2;
                } else {
                    let code = u8::from_str_radix(&digits, 16).unwrap_or(0);
                    out.push(code as char);
                    i = j;
                }
            }
            'u' => {
                let mut j = i + 2;
                let mut digits = String::new();
                while j < chars.len() && digits.len() < 4 && chars[j].is_ascii_hexdigit() {
                    digits.push(chars[j]);
                    j += 1;
                }
                if let Ok(code) = u32::from_str_radix(&digits, 16) {
                    if let Some(c) = char::from_u32(code) {
                        out.push(c);
                    }
                    i = j;
                } else {
                    out.push('\\');
                    out.push('u');
                    i += 2;
                }
            }
            'U' => {
                let mut j = i + 2;
                let mut digits = String::new();
                while j < chars.len() && digits.len() < 8 && chars[j].is_ascii_hexdigit() {
                    digits.push(chars[j]);
                    j += 1;
                }
                if let Ok(code) = u32::from_str_radix(&digits, 16) {
                    if let Some(c) = char::from_u32(code) {
                        out.push(c);
                    }
                    i = j;
                } else {
                    out.push('\\');
                    out.push('U');
                    i += 2;
                }
            }
            other => {
                out.push('\\');
                out.push(other);
                i += 2;
            }
        }
    }
    EscapeResult { output: out, stop: false }
}

#[async_trait]
impl BufferedCommand for EchoCommand {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let mut trailing_newline = true;
        let mut interpret_escapes = false;
        let mut args = ctx.args.iter();
        let mut rest: Vec<&str> = Vec::new();
        for arg in args.by_ref() {
            match arg.as_str() {
                "-n" => trailing_newline = false,
                "-e" => interpret_escapes = true,
                "-E" => interpret_escapes = false,
                "-ne" | "-en" => {
                    trailing_newline = false;
                    interpret_escapes = true;
                }
                "--" => break,
                _ => {
                    rest.push(arg);
                    break;
                }
            }
        }
        rest.extend(args.map(|s| s.as_str()));
        let joined = rest.join(" ");

        let mut output = if interpret_escapes {
            let r = process_escapes(&joined);
            if r.stop {
                return VirtualResult::ok(r.output.into_bytes());
            }
            r.output
        } else {
            joined
        };
        if trailing_newline {
            output.push('\n');
        }
        VirtualResult::ok(output.into_bytes())
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
    async fn echoes_with_trailing_newline() {
        let r = EchoCommand.run(ctx(&["hello"])).await;
        assert_eq!(r.stdout, b"hello\n");
        assert_eq!(r.code, 0);
    }

    #[tokio::test]
    async fn dash_n_suppresses_newline() {
        let r = EchoCommand.run(ctx(&["-n", "hello"])).await;
        assert_eq!(r.stdout, b"hello");
    }

    #[tokio::test]
    async fn dash_e_interprets_escapes() {
        let r = EchoCommand.run(ctx(&["-e", "a\\tb"])).await;
        assert_eq!(r.stdout, b"a\tb\n");
    }

    #[tokio::test]
    async fn joins_multiple_args_with_space() {
        let r = EchoCommand.run(ctx(&["a", "b", "c"])).await;
        assert_eq!(r.stdout, b"a b c\n");
    }
}
