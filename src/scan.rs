//! Character scanning shared by the path and formula lexers.
use std::iter::Peekable;
use std::str::Chars;

/// A token with its byte range in the source it was scanned from.
#[derive(Debug, Clone)]
pub struct Token<T> {
    pub ttype: T,
    pub pos_start: usize,
    pub pos_end: usize,
}

impl<T> Token<T> {
    pub fn new(ttype: T, pos_start: usize, pos_end: usize) -> Token<T> {
        Token {
            ttype,
            pos_start,
            pos_end,
        }
    }
}

/// A character cursor that tracks its byte offset.
pub(crate) struct Scanner<'a> {
    chars: Peekable<Chars<'a>>,
    position: usize,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            position: 0,
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn advance(&mut self) -> Option<char> {
        let char = self.chars.next();
        if let Some(c) = char {
            self.position += c.len_utf8();
        }
        char
    }

    pub(crate) fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    pub(crate) fn skip_whitespace(&mut self) {
        while let Some(' ' | '\t' | '\r' | '\n') = self.peek() {
            self.advance();
        }
    }

    /// Collects `first` and every following character accepted by `keep`.
    pub(crate) fn read_while(&mut self, first: char, keep: impl Fn(char) -> bool) -> String {
        let mut text = String::new();
        text.push(first);
        while let Some(&c) = self.peek() {
            if !keep(c) {
                break;
            }
            text.push(c);
            self.advance();
        }
        text
    }
}

pub(crate) fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Names start with a letter of any script or `_`.
pub(crate) fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

pub(crate) fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
