//! `seq` — grounded on `commands/seq/mod.rs`'s range/precision/width logic.
//! Backs the `seq 1 3 | multiply 3` scenario directly.

use async_trait::async_trait;

use crate::registry::{BufferedCommand, CommandContext, VirtualResult};

pub struct SeqCommand;

const MAX_ITERATIONS: usize = 100_000;

fn parse_num(s: &str) -> Option<f64> {
    s.parse::<f64>().ok()
}

fn precision_of(s: &str) -> usize {
    match s.split_once('.') {
        Some((_, frac)) => frac.len(),
        None => 0,
    }
}

fn format_num(value: f64, precision: usize, width: usize, pad_zero: bool) -> String {
    let mut s = if precision > 0 {
        format!("{:.*}", precision, value)
    } else {
        format!("{}", value.round() as i64)
    };
    if pad_zero && s.len() < width {
        let negative = s.starts_with('-');
        let digits = if negative { &s[1..] } else { &s[..] };
        let pad = width.saturating_sub(if negative { digits.len() + 1 } else { digits.len() });
        let padded = format!("{}{}", "0".repeat(pad), digits);
        s = if negative { format!("-{padded}") } else { padded };
    }
    s
}

#[async_trait]
impl BufferedCommand for SeqCommand {
    fn name(&self) -> &'static str {
        "seq"
    }

    async fn run(&self, ctx: CommandContext) -> VirtualResult {
        let mut separator = "\n".to_string();
        let mut equal_width = false;
        let mut nums: Vec<String> = Vec::new();
        let mut iter = ctx.args.iter().peekable();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-s" => {
                    let Some(sep) = iter.next() else {
                        return VirtualResult::usage_error("seq: option requires an argument -- 's'\n");
                    };
                    separator = sep.clone();
                }
                "-w" => equal_width = true,
                "--" => {
                    nums.extend(iter.by_ref().cloned());
                    break;
                }
                s if s.starts_with("-s") && s.len() > 2 => separator = s[2..].to_string(),
                s if s == "-sw" || s == "-ws" => equal_width = true,
                s if s.starts_with('-') && s != "-" && parse_num(s).is_none() => {
                    return VirtualResult::unknown_flag("seq", s);
                }
                _ => nums.push(arg.clone()),
            }
        }

        let (first, increment, last) = match nums.len() {
            1 => (1.0, 1.0, match parse_num(&nums[0]) {
                Some(v) => v,
                None => return VirtualResult::failure(1, format!("seq: invalid argument: {}\n", nums[0])),
            }),
            2 => {
                let a = match parse_num(&nums[0]) {
                    Some(v) => v,
                    None => return VirtualResult::failure(1, format!("seq: invalid argument: {}\n", nums[0])),
                };
                let b = match parse_num(&nums[1]) {
                    Some(v) => v,
                    None => return VirtualResult::failure(1, format!("seq: invalid argument: {}\n", nums[1])),
                };
                (a, 1.0, b)
            }
            3 => {
                let a = match parse_num(&nums[0]) {
                    Some(v) => v,
                    None => return VirtualResult::failure(1, format!("seq: invalid argument: {}\n", nums[0])),
                };
                let step = match parse_num(&nums[1]) {
                    Some(v) => v,
                    None => return VirtualResult::failure(1, format!("seq: invalid argument: {}\n", nums[1])),
                };
                let b = match parse_num(&nums[2]) {
                    Some(v) => v,
                    None => return VirtualResult::failure(1, format!("seq: invalid argument: {}\n", nums[2])),
                };
                (a, step, b)
            }
            0 => return VirtualResult::usage_error("seq: missing operand\n"),
            _ => return VirtualResult::usage_error("seq: too many arguments\n"),
        };

        if increment == 0.0 {
            return VirtualResult::failure(1, "seq: invalid Zero increment value\n");
        }

        let precision = nums.iter().map(|s| precision_of(s)).max().unwrap_or(0);
        let max_width = nums.iter().map(|s| format_num(parse_num(s).unwrap_or(0.0), precision, 0, false).trim_start_matches('-').len()).max().unwrap_or(1);

        let mut out = Vec::new();
        let mut value = first;
        let mut count = 0usize;
        loop {
            if increment > 0.0 && value > last {
                break;
            }
            if increment < 0.0 && value < last {
                break;
            }
            out.push(format_num(value, precision, max_width, equal_width));
            count += 1;
            if count > MAX_ITERATIONS {
                return VirtualResult::failure(1, "seq: too many iterations\n");
            }
            value += increment;
        }

        let mut stdout = out.join(&separator);
        if !out.is_empty() {
            stdout.push('\n');
        }
        VirtualResult::ok(stdout.into_bytes())
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
    async fn seq_one_to_three() {
        let r = SeqCommand.run(ctx(&["1", "3"])).await;
        assert_eq!(String::from_utf8(r.stdout).unwrap(), "1\n2\n3\n");
    }

    #[tokio::test]
    async fn seq_single_arg_starts_at_one() {
        let r = SeqCommand.run(ctx(&["3"])).await;
        assert_eq!(String::from_utf8(r.stdout).unwrap(), "1\n2\n3\n");
    }

    #[tokio::test]
    async fn seq_with_step() {
        let r = SeqCommand.run(ctx(&["1", "2", "7"])).await;
        assert_eq!(String::from_utf8(r.stdout).unwrap(), "1\n3\n5\n7\n");
    }

    #[tokio::test]
    async fn seq_custom_separator() {
        let r = SeqCommand.run(ctx(&["-s", ",", "1", "3"])).await;
        assert_eq!(String::from_utf8(r.stdout).unwrap(), "1,2,3\n");
    }

    #[tokio::test]
    async fn seq_descending() {
        let r = SeqCommand.run(ctx(&["3", "-1", "1"])).await;
        assert_eq!(String::from_utf8(r.stdout).unwrap(), "3\n2\n1\n");
    }

    #[tokio::test]
    async fn seq_zero_increment_errors() {
        let r = SeqCommand.run(ctx(&["1", "0", "3"])).await;
        assert_eq!(r.code, 1);
    }

    #[tokio::test]
    async fn seq_rejects_unknown_flag() {
        let r = SeqCommand.run(ctx(&["--bogus", "3"])).await;
        assert_eq!(r.code, 2);
    }
}
