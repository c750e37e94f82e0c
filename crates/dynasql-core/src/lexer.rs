//! Tokenizer for the SQL dialect.
//!
//! A single left-to-right pass produces typed tokens carrying the original
//! lexeme and its position. Match priority follows the dialect definition:
//! whitespace (skipped), keywords (case-insensitive, whole word), backtick
//! quoted identifiers, bare identifiers, numbers, quoted strings, multi-char
//! operators, then single-char operators and punctuation.

use std::fmt;

use crate::error::LexError;

/// Reserved words of the dialect, matched case-insensitively as whole words.
///
/// Identifiers colliding with these must be backtick-quoted.
pub const KEYWORDS: &[&str] = &[
    "ALL_NEW",
    "ALL_OLD",
    "AND",
    "ASC",
    "BETWEEN",
    "BINARY",
    "CHECK",
    "CREATE",
    "DELETE",
    "DESC",
    "FALSE",
    "FROM",
    "GLOBAL",
    "HASH",
    "IN",
    "INDEX",
    "INSERT",
    "INTO",
    "LIMIT",
    "LOCAL",
    "NONE",
    "NOT",
    "NULL",
    "NUMBER",
    "OFFSET",
    "OR",
    "PROJECTION",
    "PROVISIONED",
    "RANGE",
    "READ",
    "REPLACE",
    "RETURNING",
    "SECONDARY",
    "SELECT",
    "STRING",
    "TABLE",
    "THROUGHPUT",
    "TRUE",
    "UPDATED_NEW",
    "UPDATED_OLD",
    "USE",
    "VALUES",
    "WHERE",
    "WRITE",
];

/// Returns `true` if `word` is reserved (case-insensitive).
#[must_use]
pub fn is_keyword(word: &str) -> bool {
    KEYWORDS
        .iter()
        .any(|kw| kw.eq_ignore_ascii_case(word))
}

/// Token category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A reserved word.
    Keyword,
    /// A bare identifier.
    Ident,
    /// A backtick-quoted identifier (backticks already stripped).
    QuotedIdent,
    /// A numeric literal; the lexeme is the exact source text.
    Number,
    /// A string literal (quotes stripped, escapes applied).
    String,
    /// A comparison or arithmetic operator.
    Operator,
    /// Structural punctuation.
    Punct,
    /// End of input.
    Eof,
}

/// A single token with its source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token category.
    pub kind: TokenKind,
    /// The token text. Keywords keep their original case; quoted strings and
    /// identifiers are already unquoted.
    pub lexeme: String,
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub col: usize,
}

impl Token {
    /// Returns `true` if this is the given keyword (case-insensitive).
    #[must_use]
    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.lexeme.eq_ignore_ascii_case(word)
    }

    /// Returns `true` if this is the given operator or punctuation lexeme.
    #[must_use]
    pub fn is_symbol(&self, sym: &str) -> bool {
        matches!(self.kind, TokenKind::Operator | TokenKind::Punct) && self.lexeme == sym
    }

    /// Returns `true` if this token can serve as an identifier.
    #[must_use]
    pub fn is_ident(&self) -> bool {
        matches!(self.kind, TokenKind::Ident | TokenKind::QuotedIdent)
    }

    /// Returns `true` if this is a bare identifier equal to `word`,
    /// compared case-insensitively.
    ///
    /// Used for the handful of word literals (`KEY`, `KEYS`, `ONLY`, `ALL`,
    /// `INCLUDE`, `document`) that are not reserved.
    #[must_use]
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Ident && self.lexeme.eq_ignore_ascii_case(word)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "end of statement"),
            TokenKind::String => write!(f, "string '{}'", self.lexeme),
            _ => write!(f, "'{}'", self.lexeme),
        }
    }
}

/// Tokenize a full statement.
///
/// The returned stream always ends with a single `Eof` token.
///
/// # Errors
///
/// Returns `LexError` with the position of the first unrecognized character.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(input).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();

        let (line, col) = (self.line, self.col);
        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                line,
                col,
            });
        };

        let tok = match c {
            '`' => self.read_quoted_ident(line, col)?,
            '\'' | '"' => self.read_string(line, col)?,
            c if is_ident_start(c) => self.read_word(line, col),
            c if c.is_ascii_digit() => self.read_number(line, col),
            '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => {
                self.read_number(line, col)
            }
            '+' | '-' if self.starts_signed_number() => self.read_number(line, col),
            _ => self.read_symbol(line, col)?,
        };
        Ok(tok)
    }

    /// A sign starts a number only when digits (or a decimal point followed
    /// by digits) come right after it.
    fn starts_signed_number(&self) -> bool {
        match self.peek_at(1) {
            Some(d) if d.is_ascii_digit() => true,
            Some('.') => self.peek_at(2).is_some_and(|d| d.is_ascii_digit()),
            _ => false,
        }
    }

    fn read_word(&mut self, line: usize, col: usize) -> Token {
        let mut lexeme = String::new();
        while self.peek().is_some_and(is_ident_continue) {
            lexeme.push(self.bump().unwrap_or_default());
        }
        let kind = if is_keyword(&lexeme) {
            TokenKind::Keyword
        } else {
            TokenKind::Ident
        };
        Token {
            kind,
            lexeme,
            line,
            col,
        }
    }

    fn read_quoted_ident(&mut self, line: usize, col: usize) -> Result<Token, LexError> {
        self.bump(); // opening backtick
        let mut lexeme = String::new();
        loop {
            match self.bump() {
                Some('`') => break,
                Some(c) => lexeme.push(c),
                None => {
                    return Err(LexError {
                        found: '`',
                        line,
                        col,
                    });
                }
            }
        }
        Ok(Token {
            kind: TokenKind::QuotedIdent,
            lexeme,
            line,
            col,
        })
    }

    fn read_string(&mut self, line: usize, col: usize) -> Result<Token, LexError> {
        let quote = self.bump().unwrap_or('\'');
        let mut lexeme = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => break,
                Some('\\') => {
                    // Standard escapes; anything else passes through verbatim.
                    match self.bump() {
                        Some('n') => lexeme.push('\n'),
                        Some('t') => lexeme.push('\t'),
                        Some('r') => lexeme.push('\r'),
                        Some('0') => lexeme.push('\0'),
                        Some(c) => lexeme.push(c),
                        None => {
                            return Err(LexError {
                                found: quote,
                                line,
                                col,
                            });
                        }
                    }
                }
                Some(c) => lexeme.push(c),
                None => {
                    return Err(LexError {
                        found: quote,
                        line,
                        col,
                    });
                }
            }
        }
        Ok(Token {
            kind: TokenKind::String,
            lexeme,
            line,
            col,
        })
    }

    fn read_number(&mut self, line: usize, col: usize) -> Token {
        let mut lexeme = String::new();
        if matches!(self.peek(), Some('+' | '-')) {
            lexeme.push(self.bump().unwrap_or_default());
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            lexeme.push(self.bump().unwrap_or_default());
        }
        // Fractional part requires digits after the point.
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            lexeme.push(self.bump().unwrap_or_default());
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                lexeme.push(self.bump().unwrap_or_default());
            }
        }
        // Exponent requires digits, optionally signed.
        if matches!(self.peek(), Some('e' | 'E')) {
            let digits_at = match self.peek_at(1) {
                Some('+' | '-') => 2,
                _ => 1,
            };
            if self.peek_at(digits_at).is_some_and(|c| c.is_ascii_digit()) {
                lexeme.push(self.bump().unwrap_or_default());
                if digits_at == 2 {
                    lexeme.push(self.bump().unwrap_or_default());
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    lexeme.push(self.bump().unwrap_or_default());
                }
            }
        }
        Token {
            kind: TokenKind::Number,
            lexeme,
            line,
            col,
        }
    }

    fn read_symbol(&mut self, line: usize, col: usize) -> Result<Token, LexError> {
        let c = self.bump().unwrap_or_default();

        // Two-character operators first.
        let two = match (c, self.peek()) {
            ('<', Some('>')) => Some("<>"),
            ('<', Some('=')) => Some("<="),
            ('>', Some('=')) => Some(">="),
            ('!', Some('=')) => Some("!="),
            _ => None,
        };
        if let Some(op) = two {
            self.bump();
            return Ok(Token {
                kind: TokenKind::Operator,
                lexeme: op.to_owned(),
                line,
                col,
            });
        }

        let kind = match c {
            '=' | '<' | '>' | '+' | '-' | '*' | '/' | '%' => TokenKind::Operator,
            ':' | '?' | ',' | '.' | '(' | ')' | '[' | ']' | '{' | '}' | ';' => TokenKind::Punct,
            _ => {
                return Err(LexError {
                    found: c,
                    line,
                    col,
                });
            }
        };
        Ok(Token {
            kind,
            lexeme: c.to_string(),
            line,
            col,
        })
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
