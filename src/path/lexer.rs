use crate::scan::{is_identifier_char, is_identifier_start, is_whitespace, Scanner};

/// The tokens of the path language.
#[derive(Debug, PartialEq, Clone)]
pub enum TokenType {
    // == Special Tokens ==
    Eof,
    /// Spaces, tabs, carriage returns and newlines between tokens.
    Whitespace,
    /// A character outside the path grammar, such as `'`, `?` or `,`.
    Unknown(char),

    // == Literals ==
    /// A property name. Starts with a letter (any script) or `_`.
    Identifier(String),
    /// A run of ASCII digits, kept as text until the parser knows its sign.
    Integer(String),

    // == Punctuation ==
    /// Root: `$`
    Dollar,
    /// Child: `.`
    Dot,
    /// Descendant: `..`
    DoubleDot,
    /// Left Bracket: `[`
    LBracket,
    /// Right Bracket: `]`
    RBracket,
    /// Slice separator: `:`
    Colon,
    /// Wildcard: `*`
    Asterisk,
    /// Negative index or slice bound: `-`
    Minus,
}

/// A token with its byte range in the path source.
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

    /// Scans the whole input. The last token is always [`TokenType::Eof`].
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
                '$' => TokenType::Dollar,
                '[' => TokenType::LBracket,
                ']' => TokenType::RBracket,
                ':' => TokenType::Colon,
                '*' => TokenType::Asterisk,
                '-' => TokenType::Minus,
                '.' => {
                    if self.scanner.peek() == Some(&'.') {
                        self.scanner.advance();
                        TokenType::DoubleDot
                    } else {
                        TokenType::Dot
                    }
                }
                c if is_whitespace(c) => {
                    self.scanner.skip_whitespace();
                    TokenType::Whitespace
                }
                c if is_identifier_start(c) => {
                    TokenType::Identifier(self.scanner.read_while(c, is_identifier_char))
                }
                c if c.is_ascii_digit() => {
                    TokenType::Integer(self.scanner.read_while(c, |c| c.is_ascii_digit()))
                }
                c => TokenType::Unknown(c),
            }
        } else {
            TokenType::Eof
        };

        Token::new(ttype, start_pos, self.scanner.position())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_tokens(input: &str, expected: Vec<TokenType>) {
        let tokens: Vec<TokenType> = Lexer::new(input)
            .lex()
            .into_iter()
            .map(|t| t.ttype)
            .filter(|t| !matches!(t, TokenType::Whitespace))
            .collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn test_eof() {
        assert_tokens("", vec![TokenType::Eof]);
    }

    #[test]
    fn test_punctuation() {
        assert_tokens(
            "$.[]:*-..",
            vec![
                TokenType::Dollar,
                TokenType::Dot,
                TokenType::LBracket,
                TokenType::RBracket,
                TokenType::Colon,
                TokenType::Asterisk,
                TokenType::Minus,
                TokenType::DoubleDot,
                TokenType::Eof,
            ],
        );
    }

    #[test]
    fn test_identifiers_and_integers() {
        assert_tokens(
            "$.hobbies[12] ..名前_1",
            vec![
                TokenType::Dollar,
                TokenType::Dot,
                TokenType::Identifier("hobbies".to_string()),
                TokenType::LBracket,
                TokenType::Integer("12".to_string()),
                TokenType::RBracket,
                TokenType::DoubleDot,
                TokenType::Identifier("名前_1".to_string()),
                TokenType::Eof,
            ],
        );
    }

    #[test]
    fn test_unknown_characters_do_not_stop_the_scan() {
        assert_tokens(
            "$['a']",
            vec![
                TokenType::Dollar,
                TokenType::LBracket,
                TokenType::Unknown('\''),
                TokenType::Identifier("a".to_string()),
                TokenType::Unknown('\''),
                TokenType::RBracket,
                TokenType::Eof,
            ],
        );
    }

    #[test]
    fn test_positions_are_byte_offsets() {
        let tokens = Lexer::new("$.é").lex();
        assert_eq!((tokens[2].pos_start, tokens[2].pos_end), (2, 4));
        assert_eq!(tokens[3].pos_start, 4);
    }
}
