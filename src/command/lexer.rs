//! Command-line lexer.
//!
//! Splits message text into typed tokens:
//! - Words: anything separated by whitespace
//! - Quoted strings: `"a b"` or `'a b'` with `\"`, `\'`, `\\` escapes
//! - Flags: `-v`, `-abc` (combined short flags)
//! - Option names: `--name`, `--name=value`
//!
//! Tokenizing never fails. An unmatched opening quote is emitted as a
//! one-character word and the rest of the text is tokenized normally.

use std::fmt;

/// Kind of a lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Word,
    QuotedString,
    Flag,
    OptionName,
}

/// A single token with its byte offset in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub raw_offset: usize,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, raw_offset: usize) -> Self {
        Self {
            kind,
            value: value.into(),
            raw_offset,
        }
    }

    /// Words and quoted strings both carry plain argument text.
    pub fn is_text(&self) -> bool {
        matches!(self.kind, TokenKind::Word | TokenKind::QuotedString)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Word => write!(f, "{}", self.value),
            TokenKind::QuotedString => write!(f, "{:?}", self.value),
            TokenKind::Flag => write!(f, "-{}", self.value),
            TokenKind::OptionName => write!(f, "--{}", self.value),
        }
    }
}

/// Tokenize `text` into an ordered token sequence.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(c) = text[pos..].chars().next() {
        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }

        if is_quote(c) {
            match scan_quoted(&text[pos..], c) {
                Some((content, consumed)) => {
                    tokens.push(Token::new(TokenKind::QuotedString, content, pos));
                    pos += consumed;
                }
                None => {
                    tokens.push(Token::new(TokenKind::Word, c.to_string(), pos));
                    pos += c.len_utf8();
                }
            }
            continue;
        }

        let end = text[pos..]
            .find(char::is_whitespace)
            .map_or(text.len(), |i| pos + i);
        push_bare(&mut tokens, &text[pos..end], pos);
        pos = end;
    }

    tokens
}

fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

/// Scan a quoted span starting at `input[0]`.
///
/// Returns the unescaped content and the number of bytes consumed including
/// both quotes, or `None` if the quote is never closed.
fn scan_quoted(input: &str, quote: char) -> Option<(String, usize)> {
    let mut content = String::new();
    let mut chars = input.char_indices().skip(1);

    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some((_, next)) if next == quote || next == '\\' => content.push(next),
                Some((_, next)) => {
                    content.push('\\');
                    content.push(next);
                }
                None => return None,
            }
        } else if c == quote {
            return Some((content, i + c.len_utf8()));
        } else {
            content.push(c);
        }
    }

    None
}

/// Classify an unquoted, whitespace-free chunk.
fn push_bare(tokens: &mut Vec<Token>, word: &str, offset: usize) {
    if let Some(rest) = word.strip_prefix("--") {
        if rest.is_empty() {
            tokens.push(Token::new(TokenKind::Word, word, offset));
            return;
        }
        match rest.split_once('=') {
            Some((name, _)) if name.is_empty() => {
                tokens.push(Token::new(TokenKind::Word, word, offset));
            }
            Some((name, value)) => {
                tokens.push(Token::new(TokenKind::OptionName, name, offset));
                tokens.push(Token::new(TokenKind::Word, value, offset + 2 + name.len() + 1));
            }
            None => tokens.push(Token::new(TokenKind::OptionName, rest, offset)),
        }
    } else if let Some(rest) = word.strip_prefix('-') {
        if rest.is_empty() || looks_numeric(rest) {
            tokens.push(Token::new(TokenKind::Word, word, offset));
        } else {
            tokens.push(Token::new(TokenKind::Flag, rest, offset));
        }
    } else {
        tokens.push(Token::new(TokenKind::Word, word, offset));
    }
}

/// `-5` and `-0.5` are negative numbers, not flags.
fn looks_numeric(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_digit() || c == '.') && s.parse::<f64>().is_ok()
}
