use crate::scan::{is_identifier_char, is_identifier_start, is_whitespace, Scanner};

/// The tokens of the formula language.
#[derive(Debug, PartialEq, Clone)]
pub enum TokenType {
    // == Special Tokens ==
    Eof,
    Whitespace,
    /// A character outside the formula grammar.
    Unknown(char),
    /// A number with more than one `.`, kept whole for the error message.
    Malformed(String),

    // == Literals ==
    /// A function name, letter or `_` first.
    Identifier(String),
    /// Digits only, kept as written.
    Integer(String),
    /// Digits with a single `.`, kept as written.
    Float(String),

    // == Operators ==
    Plus,
    Minus,
    Asterisk,
    Slash,

    // == Punctuation ==
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
}

/// A token with its byte range in the formula source.
pub type Token = crate::scan::Token<TokenType>;

pub struct Lexer<'a> {
    scanner: Scanner<'a>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            scanner: Scanner::new(input),
        }
    }

    pub fn lex(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.ttype == TokenType::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    pub fn next_token(&mut self) -> Token {
        let start_pos = self.scanner.position();

        let ttype = if let Some(char) = self.scanner.advance() {
            match char {
                '+' => TokenType::Plus,
                '-' => TokenType::Minus,
                '*' => TokenType::Asterisk,
                '/' => TokenType::Slash,
                '(' => TokenType::LParen,
                ')' => TokenType::RParen,
                '{' => TokenType::LBrace,
                '}' => TokenType::RBrace,
                ',' => TokenType::Comma,
                c if is_whitespace(c) => {
                    self.scanner.skip_whitespace();
                    TokenType::Whitespace
                }
                c if is_identifier_start(c) => {
                    TokenType::Identifier(self.scanner.read_while(c, is_identifier_char))
                }
                c if c.is_ascii_digit() => self.read_number(c),
                c => TokenType::Unknown(c),
            }
        } else {
            TokenType::Eof
        };

        Token::new(ttype, start_pos, self.scanner.position())
    }

    fn read_number(&mut self, first_char: char) -> TokenType {
        let number = self
            .scanner
            .read_while(first_char, |c| c.is_ascii_digit() || c == '.');
        match number.matches('.').count() {
            0 => TokenType::Integer(number),
            1 => TokenType::Float(number),
            _ => TokenType::Malformed(number),
        }
    }
}
