//! Character-level scanner for the scripting language.
//!
//! The interpreter never builds a syntax tree; it executes straight off this
//! lexer, re-seeking the cursor to resolve loops and gotos.  The lexer
//! therefore exposes [`Lexer::move_to`] alongside the usual read/peek pair,
//! and every token carries the [`Location`] it started at so the interpreter
//! can come back to it.
//!
//! Scanning rules:
//!
//! - Space, tab, and carriage return are skipped; newline is a significant
//!   token (the statement separator).
//! - `#` starts a comment running to end of line.  (`//` is floor division,
//!   not a comment.)
//! - Identifiers are `[A-Za-z_][A-Za-z0-9_]*`, case-sensitive; reserved words
//!   are recognised after scanning.
//! - Numbers are `digit+ ('.' digit+)?`; anything that scans like a number but
//!   does not parse is an `InvalidNumberFormat` error.
//! - Strings accept `"` or `'` enclosures with escapes `\n \r \t \\` and the
//!   enclosure character; unknown escapes pass the character through.
//! - Two-character operators (`==` `!=` `<=` `>=` `**` `//`) are attempted
//!   before their one-character prefixes.

use crate::error::{ErrorKind, ScriptError};
use crate::value::Value;

// ── Location ──────────────────────────────────────────────────────────────────

/// An immutable cursor position in source text.
///
/// `offset` is a byte index and is the only field that matters for re-seeking;
/// `line` and `column` (0-based) ride along for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Location {
    /// Build a [`ScriptError`] at this position (converting to 1-based).
    pub fn error(&self, kind: ErrorKind, message: impl Into<String>) -> ScriptError {
        ScriptError::new(kind, message, self.line + 1, self.column + 1)
    }
}

// ── Token ─────────────────────────────────────────────────────────────────────

/// Lexical classification of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Unknown,
    Literal,
    Identifier,

    // Statement keywords
    If,
    Elif,
    Else,
    End,
    For,
    To,
    Goto,
    Exit,

    // Symbols
    Newline,
    Colon,
    Comma,
    Assign,
    LParen,
    RParen,

    // Arithmetic operators
    Plus,
    Minus,
    Star,
    Slash,
    SlashSlash,
    Percent,
    StarStar,

    // Comparison operators
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    // Logical operators
    Or,
    And,
    Not,

    Eof,
}

impl TokenKind {
    /// Does this token open a block that a matching `end` closes?
    pub fn opens_block(self) -> bool {
        matches!(self, TokenKind::If | TokenKind::For)
    }

    /// Is this token usable as an expression operator?
    pub fn is_operator(self) -> bool {
        matches!(
            self,
            TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::SlashSlash
                | TokenKind::Percent
                | TokenKind::StarStar
                | TokenKind::Eq
                | TokenKind::Ne
                | TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::Le
                | TokenKind::Ge
                | TokenKind::Or
                | TokenKind::And
                | TokenKind::Not
        )
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TokenKind::Unknown => "unknown token",
            TokenKind::Literal => "literal",
            TokenKind::Identifier => "identifier",
            TokenKind::If => "'if'",
            TokenKind::Elif => "'elif'",
            TokenKind::Else => "'else'",
            TokenKind::End => "'end'",
            TokenKind::For => "'for'",
            TokenKind::To => "'to'",
            TokenKind::Goto => "'goto'",
            TokenKind::Exit => "'exit'",
            TokenKind::Newline => "newline",
            TokenKind::Colon => "':'",
            TokenKind::Comma => "','",
            TokenKind::Assign => "'='",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::SlashSlash => "'//'",
            TokenKind::Percent => "'%'",
            TokenKind::StarStar => "'**'",
            TokenKind::Eq => "'=='",
            TokenKind::Ne => "'!='",
            TokenKind::Lt => "'<'",
            TokenKind::Gt => "'>'",
            TokenKind::Le => "'<='",
            TokenKind::Ge => "'>='",
            TokenKind::Or => "'or'",
            TokenKind::And => "'and'",
            TokenKind::Not => "'not'",
            TokenKind::Eof => "end of input",
        };
        f.write_str(s)
    }
}

/// A scanned token.  Only the current token and one lookahead exist at any
/// time; tokens are never retained beyond that.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub value: Option<Value>,
    pub location: Location,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, location: Location) -> Self {
        Token {
            kind,
            text: text.into(),
            value: None,
            location,
        }
    }

    fn literal(value: Value, text: impl Into<String>, location: Location) -> Self {
        Token {
            kind: TokenKind::Literal,
            text: text.into(),
            value: Some(value),
            location,
        }
    }
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

/// On-demand tokenizer with one token of lookahead and a re-seekable cursor.
#[derive(Debug)]
pub struct Lexer {
    src: String,
    loc: Location,
    token: Token,
    ahead: Option<Token>,
    /// Number of tokens scanned so far (diagnostics only).
    pub tokens_read: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            src: source.to_owned(),
            loc: Location::default(),
            token: Token::new(TokenKind::Unknown, "", Location::default()),
            ahead: None,
            tokens_read: 0,
        }
    }

    /// The most recently read token.
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Advance past the next lexical unit and return it.
    pub fn read_token(&mut self) -> Result<&Token, ScriptError> {
        self.token = match self.ahead.take() {
            Some(t) => t,
            None => self.scan_token()?,
        };
        Ok(&self.token)
    }

    /// One-token lookahead, computed lazily and memoised so a malformed token
    /// ahead does not fail the current statement early.
    pub fn peek(&mut self) -> Result<&Token, ScriptError> {
        if self.ahead.is_none() {
            self.ahead = Some(self.scan_token()?);
        }
        Ok(self.ahead.as_ref().unwrap())
    }

    /// Reposition the cursor, invalidating the lookahead cache.
    pub fn move_to(&mut self, location: Location) {
        self.loc = location;
        self.token = Token::new(TokenKind::Unknown, "", location);
        self.ahead = None;
    }

    /// Tokenize a whole string standalone.  Used by the interactive runner to
    /// count block nesting in a line before deciding whether to execute it.
    pub fn split_tokens(source: &str) -> Result<Vec<Token>, ScriptError> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let t = lexer.read_token()?.clone();
            if t.kind == TokenKind::Eof {
                break;
            }
            tokens.push(t);
        }
        Ok(tokens)
    }

    // ── Character primitives ──────────────────────────────────────────────────

    fn current_char(&self) -> Option<char> {
        self.src[self.loc.offset..].chars().next()
    }

    fn next_char(&self) -> Option<char> {
        let mut it = self.src[self.loc.offset..].chars();
        it.next();
        it.next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current_char() {
            self.loc.offset += c.len_utf8();
            if c == '\n' {
                self.loc.line += 1;
                self.loc.column = 0;
            } else {
                self.loc.column += 1;
            }
        }
    }

    // ── Scanning ──────────────────────────────────────────────────────────────

    fn scan_token(&mut self) -> Result<Token, ScriptError> {
        while matches!(self.current_char(), Some(' ' | '\t' | '\r')) {
            self.advance();
        }
        self.tokens_read += 1;

        let start = self.loc;
        let token = match self.current_char() {
            None => Token::new(TokenKind::Eof, "", start),
            Some('#') => self.scan_comment(start),
            Some(c) if c.is_alphabetic() || c == '_' => self.scan_identifier(start),
            Some(c) if c.is_ascii_digit() => self.scan_number(start)?,
            Some(c @ ('"' | '\'')) => self.scan_string(start, c)?,
            Some(_) => self.scan_operator(start),
        };
        Ok(token)
    }

    fn scan_comment(&mut self, start: Location) -> Token {
        while !matches!(self.current_char(), Some('\n') | None) {
            self.advance();
        }
        match self.current_char() {
            Some('\n') => {
                self.advance();
                Token::new(TokenKind::Newline, "\n", start)
            }
            _ => Token::new(TokenKind::Eof, "", start),
        }
    }

    fn scan_identifier(&mut self, start: Location) -> Token {
        let mut text = String::new();
        while let Some(c) = self.current_char() {
            if c.is_alphanumeric() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let kind = match text.as_str() {
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "end" => TokenKind::End,
            "for" => TokenKind::For,
            "to" => TokenKind::To,
            "goto" => TokenKind::Goto,
            "exit" => TokenKind::Exit,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            _ => TokenKind::Identifier,
        };
        Token::new(kind, text, start)
    }

    fn scan_number(&mut self, start: Location) -> Result<Token, ScriptError> {
        let mut text = String::new();
        while let Some(c) = self.current_char() {
            if c.is_ascii_digit() || c == '.' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match text.parse::<f64>() {
            Ok(n) => Ok(Token::literal(Value::Number(n), text, start)),
            Err(_) => Err(start.error(
                ErrorKind::InvalidNumberFormat,
                format!("invalid number format '{text}'"),
            )),
        }
    }

    fn scan_string(&mut self, start: Location, enclosure: char) -> Result<Token, ScriptError> {
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.current_char() {
                None => {
                    return Err(start.error(
                        ErrorKind::InvalidStringLiteral,
                        "end of input while scanning string literal",
                    ))
                }
                Some('\n') => {
                    return Err(start.error(
                        ErrorKind::InvalidStringLiteral,
                        "newline while scanning string literal",
                    ))
                }
                Some('\\') => {
                    self.advance();
                    match self.current_char() {
                        Some('n') => text.push('\n'),
                        Some('r') => text.push('\r'),
                        Some('t') => text.push('\t'),
                        Some('\\') => text.push('\\'),
                        Some(c) if c == enclosure => text.push(enclosure),
                        // Unknown escapes pass the character through unchanged.
                        Some(c) => text.push(c),
                        None => {
                            return Err(start.error(
                                ErrorKind::InvalidStringLiteral,
                                "end of input while scanning string literal",
                            ))
                        }
                    }
                    self.advance();
                }
                Some(c) if c == enclosure => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }
        Ok(Token::literal(Value::Text(text.clone()), text, start))
    }

    fn scan_operator(&mut self, start: Location) -> Token {
        let c = self.current_char().unwrap_or('\0');
        let next = self.next_char();

        // Two-character operators must win over their one-character prefixes.
        let (kind, len) = match (c, next) {
            ('=', Some('=')) => (TokenKind::Eq, 2),
            ('!', Some('=')) => (TokenKind::Ne, 2),
            ('<', Some('=')) => (TokenKind::Le, 2),
            ('>', Some('=')) => (TokenKind::Ge, 2),
            ('*', Some('*')) => (TokenKind::StarStar, 2),
            ('/', Some('/')) => (TokenKind::SlashSlash, 2),
            ('\n', _) => (TokenKind::Newline, 1),
            (':', _) => (TokenKind::Colon, 1),
            (',', _) => (TokenKind::Comma, 1),
            ('=', _) => (TokenKind::Assign, 1),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('%', _) => (TokenKind::Percent, 1),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            ('<', _) => (TokenKind::Lt, 1),
            ('>', _) => (TokenKind::Gt, 1),
            _ => (TokenKind::Unknown, 1),
        };

        let mut text = String::new();
        for _ in 0..len {
            if let Some(ch) = self.current_char() {
                text.push(ch);
            }
            self.advance();
        }
        Token::new(kind, text, start)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
