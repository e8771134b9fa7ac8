use super::lexer::{Lexer, Token, TokenType};
use super::Step;
use crate::error::PathError;
use miette::{NamedSource, SourceSpan};
use std::sync::Arc;

/// A recursive descent parser for the path language.
#[derive(Debug)]
pub struct Parser {
    source: Arc<NamedSource<String>>,
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(source_text: &str) -> Self {
        let source = Arc::new(NamedSource::new("path", source_text.to_string()));
        let tokens: Vec<Token> = Lexer::new(source_text)
            .lex()
            .into_iter()
            .filter(|t| !matches!(t.ttype, TokenType::Whitespace))
            .collect();

        Self {
            source,
            tokens,
            position: 0,
        }
    }

    /// Path ::= "$" { Step } EOF
    pub fn parse_path(&mut self) -> Result<Vec<Step>, PathError> {
        self.expect(TokenType::Dollar, "`$`")?;
        let mut steps = Vec::new();
        loop {
            let step = match self.current().ttype.clone() {
                TokenType::Dot => self.parse_child()?,
                TokenType::DoubleDot => self.parse_descendant()?,
                TokenType::LBracket => self.parse_bracket()?,
                TokenType::Eof => break,
                _ => return self.err_unexpected("`.`, `..`, `[` or the end of the path"),
            };
            steps.push(step);
        }
        Ok(steps)
    }

    /// Child ::= "." ( Name | "*" )
    fn parse_child(&mut self) -> Result<Step, PathError> {
        self.expect(TokenType::Dot, "`.`")?;
        if self.match_token(&TokenType::Asterisk) {
            return Ok(Step::Wildcard);
        }
        self.parse_name("a property name or `*`").map(Step::Property)
    }

    /// Descendant ::= ".." Name
    fn parse_descendant(&mut self) -> Result<Step, PathError> {
        self.expect(TokenType::DoubleDot, "`..`")?;
        self.parse_name("a property name").map(Step::Recursive)
    }

    /// Name ::= Identifier | Integer
    fn parse_name(&mut self, expected: &str) -> Result<String, PathError> {
        match &self.current().ttype {
            TokenType::Identifier(name) | TokenType::Integer(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => self.err_unexpected(expected),
        }
    }

    /// Bracket ::= "[" Slot [ ":" Slot [ ":" Slot ] ] "]"
    ///
    /// A single non-empty slot is an index; any colon makes a slice.
    fn parse_bracket(&mut self) -> Result<Step, PathError> {
        self.expect(TokenType::LBracket, "`[`")?;

        let mut slots = vec![self.parse_slot()?];
        while self.check(&TokenType::Colon) {
            if slots.len() == 3 {
                return self.err_unexpected("`]`");
            }
            self.advance();
            slots.push(self.parse_slot()?);
        }
        if let [None] = slots.as_slice() {
            return self.err_unexpected("an index or a slice");
        }
        self.expect(TokenType::RBracket, "`]`")?;

        Ok(match slots.as_slice() {
            [Some(index)] => Step::Index(*index),
            [from, to] => Step::Slice {
                from: *from,
                to: *to,
                step: None,
            },
            [from, to, step] => Step::Slice {
                from: *from,
                to: *to,
                step: *step,
            },
            _ => return self.err_unexpected("`]`"),
        })
    }

    /// Slot ::= [ [ "-" ] Integer ]
    fn parse_slot(&mut self) -> Result<Option<i64>, PathError> {
        let start = self.current().pos_start;
        let negative = self.match_token(&TokenType::Minus);
        let token = self.current().clone();
        match token.ttype {
            TokenType::Integer(digits) => {
                self.advance();
                let text = if negative { format!("-{digits}") } else { digits };
                text.parse::<i64>().map(Some).map_err(|_| PathError::InvalidIndex {
                    src: (*self.source).clone(),
                    span: (start, token.pos_end - start).into(),
                    reason: format!("`{text}` does not fit in a 64-bit index"),
                })
            }
            _ if negative => self.err_unexpected("digits after `-`"),
            _ => Ok(None),
        }
    }

    // === Helper Methods ===

    fn current(&self) -> &Token {
        // The token list always ends with Eof and `advance` never moves past it.
        &self.tokens[self.position]
    }

    fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    fn expect(&mut self, expected: TokenType, description: &str) -> Result<(), PathError> {
        if self.check(&expected) {
            self.advance();
            Ok(())
        } else {
            self.err_unexpected(description)
        }
    }

    fn match_token(&mut self, ttype: &TokenType) -> bool {
        if self.check(ttype) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, ttype: &TokenType) -> bool {
        std::mem::discriminant(&self.current().ttype) == std::mem::discriminant(ttype)
    }

    fn err_unexpected<T>(&self, expected: &str) -> Result<T, PathError> {
        let token = self.current();
        let src = (*self.source).clone();
        let span: SourceSpan = (token.pos_start, token.pos_end - token.pos_start).into();
        Err(match token.ttype {
            TokenType::Eof => PathError::UnexpectedEof {
                src,
                span,
                expected: expected.to_string(),
            },
            TokenType::Unknown(found) => PathError::IllegalCharacter { src, span, found },
            _ => PathError::UnexpectedToken {
                src,
                span,
                expected: expected.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(path: &str) -> Result<Vec<Step>, PathError> {
        Parser::new(path).parse_path()
    }

    #[test]
    fn test_root_only() {
        assert_eq!(parse("$").unwrap(), vec![]);
        assert_eq!(parse("  $  ").unwrap(), vec![]);
    }

    #[test]
    fn test_child_and_descendant() {
        assert_eq!(
            parse("$.classes.1..hobbies.*").unwrap(),
            vec![
                Step::Property("classes".to_string()),
                Step::Property("1".to_string()),
                Step::Recursive("hobbies".to_string()),
                Step::Wildcard,
            ]
        );
    }

    #[test]
    fn test_brackets() {
        assert_eq!(parse("$[3]").unwrap(), vec![Step::Index(3)]);
        assert_eq!(parse("$[-1]").unwrap(), vec![Step::Index(-1)]);
        assert_eq!(
            parse("$[:]").unwrap(),
            vec![Step::Slice {
                from: None,
                to: None,
                step: None
            }]
        );
        assert_eq!(
            parse("$[1:-1:2]").unwrap(),
            vec![Step::Slice {
                from: Some(1),
                to: Some(-1),
                step: Some(2)
            }]
        );
        assert_eq!(
            parse("$[ -2 : ]").unwrap(),
            vec![Step::Slice {
                from: Some(-2),
                to: None,
                step: None
            }]
        );
    }

    #[test]
    fn test_missing_root() {
        assert!(matches!(parse(".a"), Err(PathError::UnexpectedToken { .. })));
        assert!(matches!(parse(""), Err(PathError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_empty_brackets() {
        assert!(matches!(parse("$[]"), Err(PathError::UnexpectedToken { .. })));
    }

    #[test]
    fn test_bracket_wildcard_is_rejected() {
        let Err(PathError::UnexpectedToken { span, .. }) = parse("$.a[*]") else {
            panic!("`[*]` must not compile");
        };
        assert_eq!(span.offset(), 4);
    }

    #[test]
    fn test_unterminated_bracket() {
        assert!(matches!(parse("$.a[1"), Err(PathError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_too_many_colons() {
        assert!(matches!(
            parse("$[1:2:3:4]"),
            Err(PathError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_unsupported_syntax_is_illegal() {
        assert!(matches!(
            parse("$['a']"),
            Err(PathError::IllegalCharacter { found: '\'', .. })
        ));
        assert!(matches!(
            parse("$[?(@.a)]"),
            Err(PathError::IllegalCharacter { found: '?', .. })
        ));
        assert!(matches!(
            parse("$[0,1]"),
            Err(PathError::IllegalCharacter { found: ',', .. })
        ));
    }

    #[test]
    fn test_index_overflow() {
        assert!(matches!(
            parse("$[99999999999999999999]"),
            Err(PathError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn test_dangling_minus() {
        assert!(matches!(parse("$[-]"), Err(PathError::UnexpectedToken { .. })));
    }
}
