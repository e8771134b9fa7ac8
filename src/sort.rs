//! Lexical re-emission of JSON text.
//!
//! [`sort_json`] rewrites a document compactly with the members of every object ordered
//! by their key as written. Scalars are copied byte for byte, so numbers keep their
//! formatting and strings keep their escapes.
use crate::error::SortError;
use miette::NamedSource;
use std::ops::Range;

#[derive(Debug, PartialEq, Clone)]
enum TokenType {
    Eof,
    Whitespace,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    String,
    Number,
    /// `true`, `false` or `null`
    Literal,
    /// A lexing failure, with what went wrong.
    Invalid(&'static str),
}

#[derive(Debug, Clone)]
struct Token {
    ttype: TokenType,
    pos_start: usize,
    pos_end: usize,
}

struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn lex(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = matches!(token.ttype, TokenType::Eof | TokenType::Invalid(_));
            if token.ttype != TokenType::Whitespace {
                tokens.push(token);
            }
            if done {
                break;
            }
        }
        tokens
    }

    fn next_token(&mut self) -> Token {
        let Some((start, char)) = self.chars.next() else {
            let end = self.input.len();
            return Token {
                ttype: TokenType::Eof,
                pos_start: end,
                pos_end: end,
            };
        };

        let ttype = match char {
            '{' => TokenType::LBrace,
            '}' => TokenType::RBrace,
            '[' => TokenType::LBracket,
            ']' => TokenType::RBracket,
            ',' => TokenType::Comma,
            ':' => TokenType::Colon,
            '"' => self.read_string(),
            ' ' | '\t' | '\r' | '\n' => {
                self.skip_while(|c| matches!(c, ' ' | '\t' | '\r' | '\n'));
                TokenType::Whitespace
            }
            c if c == '-' || c.is_ascii_digit() => {
                self.skip_while(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
                let end = self.offset();
                if is_json_number(&self.input[start..end]) {
                    TokenType::Number
                } else {
                    TokenType::Invalid("malformed number")
                }
            }
            c if c.is_ascii_alphabetic() => {
                self.skip_while(|c| c.is_ascii_alphabetic());
                let end = self.offset();
                match &self.input[start..end] {
                    "true" | "false" | "null" => TokenType::Literal,
                    _ => TokenType::Invalid("expected `true`, `false` or `null`"),
                }
            }
            _ => TokenType::Invalid("unexpected character"),
        };

        Token {
            ttype,
            pos_start: start,
            pos_end: self.offset(),
        }
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.input.len(), |&(i, _)| i)
    }

    fn skip_while(&mut self, keep: impl Fn(char) -> bool) {
        while self.chars.next_if(|&(_, c)| keep(c)).is_some() {}
    }

    fn read_string(&mut self) -> TokenType {
        while let Some((_, c)) = self.chars.next() {
            match c {
                '"' => return TokenType::String,
                '\\' => {
                    if self.chars.next().is_none() {
                        break;
                    }
                }
                _ => {}
            }
        }
        TokenType::Invalid("unterminated string")
    }
}

/// Number ::= [ "-" ] ( "0" | Digit19 { Digit } ) [ "." Digit { Digit } ] [ ( "e" | "E" ) [ "+" | "-" ] Digit { Digit } ]
fn is_json_number(text: &str) -> bool {
    fn digits(bytes: &[u8], mut i: usize) -> usize {
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        i
    }

    let bytes = text.as_bytes();
    let mut i = usize::from(bytes.first() == Some(&b'-'));
    match bytes.get(i) {
        Some(b'0') => i += 1,
        Some(b'1'..=b'9') => i = digits(bytes, i),
        _ => return false,
    }
    if bytes.get(i) == Some(&b'.') {
        let end = digits(bytes, i + 1);
        if end == i + 1 {
            return false;
        }
        i = end;
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let end = digits(bytes, i);
        if end == i {
            return false;
        }
        i = end;
    }
    i == bytes.len()
}

/// How deep objects and arrays may nest, the same limit serde_json applies.
const MAX_DEPTH: usize = 128;

/// A parsed value, pointing back into the source.
enum Fragment {
    Scalar(Range<usize>),
    Array(Vec<Fragment>),
    Object(Vec<(Range<usize>, Fragment)>),
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            tokens: Lexer::new(input).lex(),
            position: 0,
            depth: 0,
        }
    }

    /// Document ::= ( Object | Array ) EOF
    fn parse_document(&mut self) -> Result<Fragment, SortError> {
        let fragment = match self.current().ttype.clone() {
            TokenType::LBrace => self.parse_object()?,
            TokenType::LBracket => self.parse_array()?,
            _ => return self.err("expected `{` or `[`"),
        };
        self.expect(TokenType::Eof, "expected the end of the document")?;
        Ok(fragment)
    }

    /// Value ::= Object | Array | String | Number | Literal
    fn parse_value(&mut self) -> Result<Fragment, SortError> {
        let token = self.current().clone();
        match token.ttype {
            TokenType::LBrace => self.parse_object(),
            TokenType::LBracket => self.parse_array(),
            TokenType::String | TokenType::Number | TokenType::Literal => {
                self.advance();
                Ok(Fragment::Scalar(token.pos_start..token.pos_end))
            }
            _ => self.err("expected a value"),
        }
    }

    /// Object ::= "{" [ String ":" Value { "," String ":" Value } ] "}"
    fn parse_object(&mut self) -> Result<Fragment, SortError> {
        self.enter()?;
        self.expect(TokenType::LBrace, "expected `{`")?;
        let mut members = Vec::new();
        if !self.match_token(&TokenType::RBrace) {
            loop {
                let key = self.current().clone();
                self.expect(TokenType::String, "expected a string key")?;
                self.expect(TokenType::Colon, "expected `:`")?;
                members.push((key.pos_start..key.pos_end, self.parse_value()?));
                if self.match_token(&TokenType::Comma) {
                    continue;
                }
                self.expect(TokenType::RBrace, "expected `,` or `}`")?;
                break;
            }
        }
        self.depth -= 1;
        Ok(Fragment::Object(members))
    }

    /// Array ::= "[" [ Value { "," Value } ] "]"
    fn parse_array(&mut self) -> Result<Fragment, SortError> {
        self.enter()?;
        self.expect(TokenType::LBracket, "expected `[`")?;
        let mut items = Vec::new();
        if !self.match_token(&TokenType::RBracket) {
            loop {
                items.push(self.parse_value()?);
                if self.match_token(&TokenType::Comma) {
                    continue;
                }
                self.expect(TokenType::RBracket, "expected `,` or `]`")?;
                break;
            }
        }
        self.depth -= 1;
        Ok(Fragment::Array(items))
    }

    fn enter(&mut self) -> Result<(), SortError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return self.err("nesting too deep");
        }
        Ok(())
    }

    fn current(&self) -> &Token {
        // The lexer always stops at Eof or at the first invalid token.
        &self.tokens[self.position]
    }

    fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    fn expect(&mut self, expected: TokenType, message: &str) -> Result<(), SortError> {
        if self.match_token(&expected) {
            Ok(())
        } else {
            self.err(message)
        }
    }

    fn match_token(&mut self, ttype: &TokenType) -> bool {
        if std::mem::discriminant(&self.current().ttype) == std::mem::discriminant(ttype) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn err<T>(&self, message: &str) -> Result<T, SortError> {
        let token = self.current();
        let message = match token.ttype {
            TokenType::Invalid(reason) => reason,
            _ => message,
        };
        Err(SortError::Syntax {
            src: NamedSource::new("json", self.input.to_string()),
            span: (token.pos_start, token.pos_end - token.pos_start).into(),
            message: message.to_string(),
        })
    }
}

fn emit(fragment: &mut Fragment, input: &str, out: &mut String) {
    match fragment {
        Fragment::Scalar(range) => out.push_str(&input[range.clone()]),
        Fragment::Array(items) => {
            out.push('[');
            for (i, item) in items.iter_mut().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                emit(item, input, out);
            }
            out.push(']');
        }
        Fragment::Object(members) => {
            members.sort_by(|(a, _), (b, _)| input[a.clone()].cmp(&input[b.clone()]));
            out.push('{');
            for (i, (key, value)) in members.iter_mut().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&input[key.clone()]);
                out.push(':');
                emit(value, input, out);
            }
            out.push('}');
        }
    }
}

/// Re-emits `input` compactly with object members sorted by key.
///
/// Members with equal keys keep their relative order; arrays keep theirs. The
/// document must be an object or an array.
///
/// ```
/// let sorted = tagjson::sort::sort_json(r#"{"b": 1, "a": [3, {"d": 1.50, "c": null}]}"#).unwrap();
/// assert_eq!(sorted, r#"{"a":[3,{"c":null,"d":1.50}],"b":1}"#);
/// ```
pub fn sort_json(input: &str) -> Result<String, SortError> {
    let mut fragment = Parser::new(input).parse_document()?;
    let mut out = String::with_capacity(input.len());
    emit(&mut fragment, input, &mut out);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_objects_are_sorted() {
        let sorted = sort_json(r#"{"z": {"y": 1, "x": 2}, "a": []}"#).unwrap();
        assert_eq!(sorted, r#"{"a":[],"z":{"x":2,"y":1}}"#);
    }

    #[test]
    fn test_duplicate_keys_keep_order() {
        let sorted = sort_json(r#"{"k": 2, "a": 0, "k": 1}"#).unwrap();
        assert_eq!(sorted, r#"{"a":0,"k":2,"k":1}"#);
    }

    #[test]
    fn test_scalars_are_verbatim() {
        let sorted = sort_json(r#"[1.0e3, -0.50, "\"q\" é", true, false, null]"#).unwrap();
        assert_eq!(sorted, r#"[1.0e3,-0.50,"\"q\" é",true,false,null]"#);
    }

    #[test]
    fn test_top_level_must_be_container() {
        assert!(sort_json("42").is_err());
        assert!(sort_json("").is_err());
    }

    #[test]
    fn test_errors() {
        assert!(sort_json(r#"{"a" 1}"#).is_err());
        assert!(sort_json(r#"{"a": 1,}"#).is_err());
        assert!(sort_json(r#"[1 2]"#).is_err());
        assert!(sort_json(r#"{"a": tru}"#).is_err());
        assert!(sort_json(r#"{"a": "open}"#).is_err());
        assert!(sort_json(r#"{} {}"#).is_err());
    }

    #[test]
    fn test_number_grammar() {
        for number in ["0", "-0", "12", "-0.50", "1.0e3", "2E+10", "3e-2"] {
            assert!(is_json_number(number), "{number} is a JSON number");
        }
        for number in ["01", "-", "1.", ".5", "1e", "1e+", "--1", "1.2.3", "1-2", "0x1"] {
            assert!(!is_json_number(number), "{number} is not a JSON number");
        }
        assert!(sort_json("[01]").is_err());
        assert!(sort_json(r#"{"a": 1.}"#).is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let fits = format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert_eq!(sort_json(&fits).unwrap(), fits);

        let deep = format!("{}{}", "[".repeat(MAX_DEPTH + 1), "]".repeat(MAX_DEPTH + 1));
        let Err(SortError::Syntax { message, span, .. }) = sort_json(&deep) else {
            panic!("expected a syntax error");
        };
        assert_eq!(message, "nesting too deep");
        assert_eq!(span.offset(), MAX_DEPTH);
    }

    #[test]
    fn test_error_message_names_the_lexing_problem() {
        let Err(SortError::Syntax { message, .. }) = sort_json(r#"["abc"#) else {
            panic!("expected a syntax error");
        };
        assert_eq!(message, "unterminated string");
    }
}
