//! Tokenizer for USDA text

use cardgen_core::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    /// Literal without a fraction or exponent, kept exact
    Integer(i128),
    Number(f64),
    String(String),
    Asset(String),
    Path(String),
    Punct(char),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

/// Split USDA source into tokens.
///
/// The `#usda 1.0` header must be the first line; its version string is
/// returned alongside the tokens of the rest of the file.
pub fn tokenize(source: &str, file: &str) -> Result<(String, Vec<Token>)> {
    let mut lexer = Lexer::new(source, file);
    let version = lexer.header()?;
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok((version, tokens))
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    file: &'a str,
}

impl<'a> Lexer<'a> {
    fn new(source: &str, file: &'a str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            file,
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            file: self.file.to_string(),
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn starts_with(&self, pattern: &str) -> bool {
        pattern
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn bump(&mut self) -> Option<char> {
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

    fn header(&mut self) -> Result<String> {
        if !self.starts_with("#usda") {
            return Err(self.error("missing #usda header"));
        }
        for _ in 0..5 {
            self.bump();
        }
        let mut version = String::new();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            version.push(c);
            self.bump();
        }
        Ok(version.trim().to_string())
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => self.skip_line(),
                Some('/') if self.peek_at(1) == Some('/') => self.skip_line(),
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.bump();
                    self.bump();
                    loop {
                        if self.starts_with("*/") {
                            self.bump();
                            self.bump();
                            break;
                        }
                        if self.bump().is_none() {
                            return Err(self.error("unterminated block comment"));
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.bump() {
            if c == '\n' {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_trivia()?;
        let (line, column) = (self.line, self.column);
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(None),
        };

        let kind = match c {
            '"' | '\'' => TokenKind::String(self.string(c)?),
            '@' => TokenKind::Asset(self.asset()?),
            '<' => TokenKind::Path(self.path()?),
            c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number()?,
            c if c.is_alphabetic() || c == '_' => TokenKind::Ident(self.ident()),
            '(' | ')' | '[' | ']' | '{' | '}' | '=' | ',' | ';' | ':' => {
                self.bump();
                TokenKind::Punct(c)
            }
            other => return Err(self.error(format!("unexpected character '{}'", other))),
        };

        Ok(Some(Token { kind, line, column }))
    }

    fn string(&mut self, quote: char) -> Result<String> {
        let triple: String = std::iter::repeat(quote).take(3).collect();
        let is_triple = self.starts_with(&triple);
        let delimiter_len = if is_triple { 3 } else { 1 };
        for _ in 0..delimiter_len {
            self.bump();
        }

        let mut out = String::new();
        loop {
            if is_triple && self.starts_with(&triple) {
                for _ in 0..3 {
                    self.bump();
                }
                return Ok(out);
            }
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote && !is_triple => return Ok(out),
                Some('\n') if !is_triple => return Err(self.error("newline in string")),
                Some('\\') => {
                    let escaped = self
                        .bump()
                        .ok_or_else(|| self.error("unterminated escape"))?;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn asset(&mut self) -> Result<String> {
        let is_triple = self.starts_with("@@@");
        let delimiter = if is_triple { "@@@" } else { "@" };
        for _ in 0..delimiter.len() {
            self.bump();
        }
        let mut out = String::new();
        loop {
            if self.starts_with(delimiter) {
                for _ in 0..delimiter.len() {
                    self.bump();
                }
                return Ok(out);
            }
            match self.bump() {
                None | Some('\n') => return Err(self.error("unterminated asset path")),
                Some(c) => out.push(c),
            }
        }
    }

    fn path(&mut self) -> Result<String> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('>') => return Ok(out),
                None | Some('\n') => return Err(self.error("unterminated prim path")),
                Some(c) => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Result<TokenKind> {
        let mut text = String::new();
        if let Some(sign @ ('-' | '+')) = self.peek() {
            text.push(sign);
            self.bump();
        }
        if self.peek().map_or(false, |c| c.is_alphabetic()) {
            let word = self.ident();
            return match word.as_str() {
                "inf" => Ok(TokenKind::Number(if text == "-" {
                    f64::NEG_INFINITY
                } else {
                    f64::INFINITY
                })),
                "nan" => Ok(TokenKind::Number(f64::NAN)),
                _ => Err(self.error(format!("invalid number '{}{}'", text, word))),
            };
        }
        while let Some(c) = self.peek() {
            let exponent_sign =
                (c == '-' || c == '+') && matches!(text.chars().last(), Some('e' | 'E'));
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || exponent_sign {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let is_integer = text.contains(|c: char| c.is_ascii_digit())
            && !text.contains(['.', 'e', 'E']);
        if is_integer {
            if let Ok(n) = text.parse::<i128>() {
                return Ok(TokenKind::Integer(n));
            }
        }
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| self.error(format!("invalid number '{}'", text)))
    }

    fn ident(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == ':' || c == '.' {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        out
    }
}
