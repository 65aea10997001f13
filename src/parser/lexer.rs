//! Hand-written lexer for the supported grammar subset.
//!
//! Grounded on `parser::lexer`'s `Token`/`TokenType` struct shape and
//! char-by-char scanning idiom, narrowed to the small token set this
//! engine's grammar needs.

use crate::parser::ast::QuoteKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Word,
    Pipe,
    AndAnd,
    OrOr,
    Semicolon,
    LParen,
    RParen,
    Less,
    Great,
    DGreat,
    /// `2>`
    ErrGreat,
    /// `2>&1`
    DupStderrToStdout,
    /// `&>`
    AndGreat,
    /// `>&2`
    GreatAnd2,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub value: String,
    pub quote: QuoteKind,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("lexer error at {line}:{column}: {message}")]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

pub struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    _src: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { chars: src.chars().collect(), pos: 0, line: 1, column: 1, _src: src }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.advance();
        }
    }

    fn is_word_boundary(c: char) -> bool {
        matches!(c, ' ' | '\t' | '\n' | '|' | '&' | ';' | '(' | ')' | '<' | '>')
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_blanks();
            while matches!(self.peek(), Some('\n')) {
                self.advance();
                self.skip_blanks();
            }
            let (line, column) = (self.line, self.column);
            let Some(c) = self.peek() else {
                tokens.push(Token { token_type: TokenType::Eof, value: String::new(), quote: QuoteKind::Unquoted, line, column });
                break;
            };
            match c {
                '|' => {
                    self.advance();
                    if self.peek() == Some('|') {
                        self.advance();
                        tokens.push(Token { token_type: TokenType::OrOr, value: "||".into(), quote: QuoteKind::Unquoted, line, column });
                    } else {
                        tokens.push(Token { token_type: TokenType::Pipe, value: "|".into(), quote: QuoteKind::Unquoted, line, column });
                    }
                }
                '&' => {
                    self.advance();
                    if self.peek() == Some('&') {
                        self.advance();
                        tokens.push(Token { token_type: TokenType::AndAnd, value: "&&".into(), quote: QuoteKind::Unquoted, line, column });
                    } else if self.peek() == Some('>') {
                        self.advance();
                        tokens.push(Token { token_type: TokenType::AndGreat, value: "&>".into(), quote: QuoteKind::Unquoted, line, column });
                    } else {
                        return Err(LexerError { message: "background `&` is not supported by the built-in parser".into(), line, column });
                    }
                }
                ';' => {
                    self.advance();
                    tokens.push(Token { token_type: TokenType::Semicolon, value: ";".into(), quote: QuoteKind::Unquoted, line, column });
                }
                '(' => {
                    self.advance();
                    tokens.push(Token { token_type: TokenType::LParen, value: "(".into(), quote: QuoteKind::Unquoted, line, column });
                }
                ')' => {
                    self.advance();
                    tokens.push(Token { token_type: TokenType::RParen, value: ")".into(), quote: QuoteKind::Unquoted, line, column });
                }
                '2' if self.peek_at(1) == Some('>') && self.peek_at(2) == Some('&') && self.peek_at(3) == Some('1') => {
                    self.advance();
                    self.advance();
                    self.advance();
                    self.advance();
                    tokens.push(Token { token_type: TokenType::DupStderrToStdout, value: "2>&1".into(), quote: QuoteKind::Unquoted, line, column });
                }
                '2' if self.peek_at(1) == Some('>') => {
                    self.advance();
                    self.advance();
                    tokens.push(Token { token_type: TokenType::ErrGreat, value: "2>".into(), quote: QuoteKind::Unquoted, line, column });
                }
                '>' if self.peek_at(1) == Some('&') && self.peek_at(2) == Some('2') => {
                    self.advance();
                    self.advance();
                    self.advance();
                    tokens.push(Token { token_type: TokenType::GreatAnd2, value: ">&2".into(), quote: QuoteKind::Unquoted, line, column });
                }
                '>' => {
                    self.advance();
                    if self.peek() == Some('>') {
                        self.advance();
                        tokens.push(Token { token_type: TokenType::DGreat, value: ">>".into(), quote: QuoteKind::Unquoted, line, column });
                    } else {
                        tokens.push(Token { token_type: TokenType::Great, value: ">".into(), quote: QuoteKind::Unquoted, line, column });
                    }
                }
                '<' => {
                    self.advance();
                    tokens.push(Token { token_type: TokenType::Less, value: "<".into(), quote: QuoteKind::Unquoted, line, column });
                }
                _ => {
                    let word = self.scan_word(line, column)?;
                    tokens.push(word);
                }
            }
        }
        Ok(tokens)
    }

    fn scan_word(&mut self, line: usize, column: usize) -> Result<Token, LexerError> {
        let mut value = String::new();
        let mut quote = QuoteKind::Unquoted;
        let mut any_quoted = false;
        while let Some(c) = self.peek() {
            match c {
                '\'' => {
                    any_quoted = true;
                    if quote == QuoteKind::Unquoted && value.is_empty() {
                        quote = QuoteKind::Single;
                    } else if quote != QuoteKind::Single {
                        quote = QuoteKind::Unquoted;
                    }
                    self.advance();
                    loop {
                        match self.advance() {
                            Some('\'') => break,
                            Some(ch) => value.push(ch),
                            None => {
                                return Err(LexerError { message: "unterminated single quote".into(), line, column });
                            }
                        }
                    }
                }
                '"' => {
                    any_quoted = true;
                    if quote == QuoteKind::Unquoted && value.is_empty() {
                        quote = QuoteKind::Double;
                    } else if quote != QuoteKind::Double {
                        quote = QuoteKind::Unquoted;
                    }
                    self.advance();
                    loop {
                        match self.advance() {
                            Some('"') => break,
                            Some('\\') => match self.advance() {
                                Some(next) if matches!(next, '"' | '\\' | '$' | '`') => value.push(next),
                                Some(next) => {
                                    value.push('\\');
                                    value.push(next);
                                }
                                None => return Err(LexerError { message: "unterminated double quote".into(), line, column }),
                            },
                            Some(ch) => value.push(ch),
                            None => return Err(LexerError { message: "unterminated double quote".into(), line, column }),
                        }
                    }
                }
                '\\' => {
                    self.advance();
                    match self.advance() {
                        Some(next) => value.push(next),
                        None => return Err(LexerError { message: "trailing backslash".into(), line, column }),
                    }
                }
                c if Self::is_word_boundary(c) => break,
                c => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        if value.is_empty() && !any_quoted {
            return Err(LexerError { message: format!("unexpected character {:?}", self.peek()), line, column });
        }
        Ok(Token { token_type: TokenType::Word, value, quote, line, column })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenType> {
        Lexer::new(src).tokenize().unwrap().into_iter().map(|t| t.token_type).collect()
    }

    #[test]
    fn tokenizes_simple_command() {
        assert_eq!(kinds("echo hello"), vec![TokenType::Word, TokenType::Word, TokenType::Eof]);
    }

    #[test]
    fn tokenizes_pipe_and_andor() {
        use TokenType::*;
        assert_eq!(kinds("a | b && c || d"), vec![Word, Pipe, Word, AndAnd, Word, OrOr, Word, Eof]);
    }

    #[test]
    fn tokenizes_redirects() {
        use TokenType::*;
        assert_eq!(kinds("cmd > out"), vec![Word, Great, Word, Eof]);
        assert_eq!(kinds("cmd >> out"), vec![Word, DGreat, Word, Eof]);
        assert_eq!(kinds("cmd < in"), vec![Word, Less, Word, Eof]);
        assert_eq!(kinds("cmd 2>&1"), vec![Word, DupStderrToStdout, Eof]);
    }

    #[test]
    fn tokenizes_stderr_redirect_forms() {
        use TokenType::*;
        assert_eq!(kinds("cmd 2> err.txt"), vec![Word, ErrGreat, Word, Eof]);
        assert_eq!(kinds("cmd &> both.txt"), vec![Word, AndGreat, Word, Eof]);
        assert_eq!(kinds("cmd >&2"), vec![Word, GreatAnd2, Eof]);
    }

    #[test]
    fn tracks_quote_kind() {
        let tokens = Lexer::new("'hello world'").tokenize().unwrap();
        assert_eq!(tokens[0].quote, QuoteKind::Single);
        assert_eq!(tokens[0].value, "hello world");
    }

    #[test]
    fn rejects_background_ampersand() {
        assert!(Lexer::new("sleep 1 &").tokenize().is_err());
    }
}
