//! Shell parser: lexer + recursive-descent parser for the supported grammar
//! subset, plus the `needs_real_shell` fallback rule.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::*;
pub use lexer::{Lexer, LexerError, Token, TokenType};
pub use parser::{needs_real_shell, parse, SHELL_PROBE_LIST};
