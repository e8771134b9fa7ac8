use super::ast::{BinaryOp, Expr, ExprKind, Span};
use super::functions;
use super::lexer::{Lexer, Token, TokenType};
use crate::error::FormulaError;
use miette::{NamedSource, SourceSpan};
use std::sync::Arc;

/// A partially built operator chain.
///
/// Operators are attached as they are read. A new operator that binds tighter than the
/// one at the top takes over that operator's right operand, so precedence comes out of
/// the tree shape instead of separate grammar levels.
enum Pending {
    Operand(Expr),
    Binary {
        op: BinaryOp,
        op_span: Span,
        lhs: Box<Pending>,
        rhs: Option<Box<Pending>>,
    },
}

impl Pending {
    fn attach(self, op: BinaryOp, op_span: Span) -> Pending {
        match self {
            Pending::Binary {
                op: current,
                op_span: current_span,
                lhs,
                rhs: Some(rhs),
            } if op.precedence() > current.precedence() => Pending::Binary {
                op: current,
                op_span: current_span,
                lhs,
                rhs: Some(Box::new(rhs.attach(op, op_span))),
            },
            other => Pending::Binary {
                op,
                op_span,
                lhs: Box::new(other),
                rhs: None,
            },
        }
    }

    /// Places `operand` in the open slot on the right edge. Hands it back when there is none.
    fn fill(&mut self, operand: Expr) -> Result<(), Expr> {
        match self {
            Pending::Operand(_) => Err(operand),
            Pending::Binary { rhs: rhs @ None, .. } => {
                *rhs = Some(Box::new(Pending::Operand(operand)));
                Ok(())
            }
            Pending::Binary { rhs: Some(rhs), .. } => rhs.fill(operand),
        }
    }

    /// The operator whose right operand is still missing.
    fn open_operator(&self) -> Option<Span> {
        match self {
            Pending::Operand(_) => None,
            Pending::Binary { op_span, rhs: None, .. } => Some(*op_span),
            Pending::Binary { rhs: Some(rhs), .. } => rhs.open_operator(),
        }
    }

    fn finish(self) -> Option<Expr> {
        match self {
            Pending::Operand(expr) => Some(expr),
            Pending::Binary { op, lhs, rhs, .. } => {
                let lhs = lhs.finish()?;
                let rhs = rhs?.finish()?;
                let span = lhs.span.to(rhs.span);
                Some(Expr::new(
                    ExprKind::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    span,
                ))
            }
        }
    }
}

/// How deep a formula may nest. Every operator in a chain and every parenthesis or call
/// around it adds a level, which bounds the recursion of parsing, evaluation and rendering.
pub const MAX_DEPTH: usize = 256;

/// Parser for arithmetic formulas such as `MIN(1+2, {x}) * 3`.
#[derive(Debug)]
pub struct Parser {
    source: Arc<NamedSource<String>>,
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    pub fn new(source_text: &str) -> Self {
        let source = Arc::new(NamedSource::new("formula", source_text.to_string()));
        let tokens: Vec<Token> = Lexer::new(source_text)
            .lex()
            .into_iter()
            .filter(|t| !matches!(t.ttype, TokenType::Whitespace))
            .collect();

        Self {
            source,
            tokens,
            position: 0,
            depth: 0,
        }
    }

    /// Formula ::= Chain EOF
    pub fn parse_formula(&mut self) -> Result<Expr, FormulaError> {
        let expr = self.parse_chain(&[TokenType::Eof])?;
        self.expect(TokenType::Eof, "the end of the formula")?;
        Ok(expr)
    }

    /// Chain ::= Operand { Operator Operand }
    ///
    /// Stops in front of any of `closers` without consuming it.
    fn parse_chain(&mut self, closers: &[TokenType]) -> Result<Expr, FormulaError> {
        let start = self.current().clone();
        let entry_depth = self.depth;
        self.descend(&start)?;
        let mut chain: Option<Pending> = None;
        loop {
            let token = self.current().clone();
            if closers.iter().any(|closer| same_kind(closer, &token.ttype)) {
                break;
            }
            let op = match token.ttype {
                TokenType::Plus => Some(BinaryOp::Add),
                TokenType::Minus => Some(BinaryOp::Sub),
                TokenType::Asterisk => Some(BinaryOp::Mul),
                TokenType::Slash => Some(BinaryOp::Div),
                _ => None,
            };
            if let Some(op) = op {
                self.descend(&token)?;
                self.advance();
                chain = Some(self.push_operator(chain, op, &token)?);
                continue;
            }
            let operand = self.parse_operand()?;
            chain = Some(self.push_operand(chain, operand, &token)?);
        }

        let Some(chain) = chain else {
            return self.err_syntax(&start, "expected an expression");
        };
        if let Some(op_span) = chain.open_operator() {
            return Err(self.syntax(op_span, "this operator has no right operand"));
        }
        self.depth = entry_depth;
        match chain.finish() {
            Some(expr) => Ok(expr),
            None => self.err_syntax(&start, "incomplete expression"),
        }
    }

    fn push_operator(
        &self,
        chain: Option<Pending>,
        op: BinaryOp,
        token: &Token,
    ) -> Result<Pending, FormulaError> {
        let op_span = Span::new(token.pos_start, token.pos_end);
        match chain {
            None => Err(self.syntax(op_span, "an operator cannot start an expression")),
            Some(chain) if chain.open_operator().is_some() => {
                Err(self.syntax(op_span, "expected an operand, found an operator"))
            }
            Some(chain) => Ok(chain.attach(op, op_span)),
        }
    }

    fn push_operand(
        &self,
        chain: Option<Pending>,
        operand: Expr,
        token: &Token,
    ) -> Result<Pending, FormulaError> {
        match chain {
            None => Ok(Pending::Operand(operand)),
            Some(mut chain) => match chain.fill(operand) {
                Ok(()) => Ok(chain),
                Err(operand) => Err(self.syntax(
                    Span::new(token.pos_start, operand.end()),
                    "expected an operator between operands",
                )),
            },
        }
    }

    /// Operand ::= Number | Ref | Call | "(" Chain ")"
    fn parse_operand(&mut self) -> Result<Expr, FormulaError> {
        let token = self.current().clone();
        match &token.ttype {
            TokenType::Integer(text) | TokenType::Float(text) => {
                self.advance();
                let value = text.parse::<f64>().map_err(|_| {
                    self.syntax(token_span(&token), format!("`{text}` is not a number"))
                })?;
                if !value.is_finite() {
                    return self.err_syntax(&token, &format!("`{text}` is too large"));
                }
                Ok(Expr::new(
                    ExprKind::Const {
                        value,
                        src: text.clone(),
                    },
                    token_span(&token),
                ))
            }
            TokenType::LBrace => self.parse_ref(),
            TokenType::Identifier(_) => self.parse_call(),
            TokenType::LParen => {
                self.advance();
                let inner = self.parse_chain(&[TokenType::RParen, TokenType::Eof])?;
                let close = self.expect(TokenType::RParen, "`)`")?;
                Ok(Expr::new(
                    ExprKind::Group(Box::new(inner)),
                    Span::new(token.pos_start, close.pos_end),
                ))
            }
            TokenType::Malformed(text) => {
                self.err_syntax(&token, &format!("`{text}` has more than one decimal point"))
            }
            TokenType::Unknown(c) => self.err_syntax(&token, &format!("unexpected character `{c}`")),
            TokenType::Eof => self.err_syntax(&token, "the formula ended early"),
            _ => self.err_syntax(&token, "expected a number, `{name}`, a function call or `(`"),
        }
    }

    /// Ref ::= "{" Identifier "}"
    fn parse_ref(&mut self) -> Result<Expr, FormulaError> {
        let open = self.expect(TokenType::LBrace, "`{`")?;
        let name = match &self.current().ttype {
            TokenType::Identifier(name) => name.clone(),
            _ => {
                let token = self.current().clone();
                return self.err_syntax(&token, "expected a variable name");
            }
        };
        self.advance();
        let close = self.expect(TokenType::RBrace, "`}`")?;
        Ok(Expr::new(
            ExprKind::Ref(name),
            Span::new(open.pos_start, close.pos_end),
        ))
    }

    /// Call ::= Identifier "(" [ Chain { "," Chain } ] ")"
    fn parse_call(&mut self) -> Result<Expr, FormulaError> {
        let name_token = self.current().clone();
        let TokenType::Identifier(written) = &name_token.ttype else {
            return self.err_syntax(&name_token, "expected a function name");
        };
        let name = written.to_ascii_uppercase();
        self.advance();
        self.expect(TokenType::LParen, "`(` after a function name")?;

        let Some(function) = functions::lookup(&name) else {
            return Err(FormulaError::UnknownFunction {
                src: (*self.source).clone(),
                span: source_span(token_span(&name_token)),
                name,
            });
        };

        let mut args = Vec::new();
        if !self.check(&TokenType::RParen) {
            let closers = [TokenType::Comma, TokenType::RParen, TokenType::Eof];
            args.push(self.parse_chain(&closers)?);
            while self.match_token(&TokenType::Comma) {
                args.push(self.parse_chain(&closers)?);
            }
        }
        let close = self.expect(TokenType::RParen, "`,` or `)`")?;
        let span = Span::new(name_token.pos_start, close.pos_end);

        function
            .validate(&args)
            .map_err(|message| FormulaError::Arity {
                src: (*self.source).clone(),
                span: source_span(span),
                name: name.clone(),
                message,
            })?;
        Ok(Expr::new(ExprKind::Call { name, args }, span))
    }

    // === Helper Methods ===

    /// Goes one nesting level deeper, failing at `token` past [`MAX_DEPTH`].
    fn descend(&mut self, token: &Token) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return self.err_syntax(
                token,
                &format!("the formula nests more than {MAX_DEPTH} levels deep"),
            );
        }
        Ok(())
    }

    fn current(&self) -> &Token {
        // The token list always ends with Eof and `advance` never moves past it.
        &self.tokens[self.position]
    }

    fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    /// Consumes a token of the given kind and returns it.
    fn expect(&mut self, expected: TokenType, description: &str) -> Result<Token, FormulaError> {
        let token = self.current().clone();
        if same_kind(&token.ttype, &expected) {
            self.advance();
            Ok(token)
        } else {
            self.err_syntax(&token, &format!("expected {description}"))
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
        same_kind(&self.current().ttype, ttype)
    }

    fn syntax(&self, span: Span, message: impl Into<String>) -> FormulaError {
        FormulaError::Syntax {
            src: (*self.source).clone(),
            span: source_span(span),
            message: message.into(),
        }
    }

    fn err_syntax<T>(&self, token: &Token, message: &str) -> Result<T, FormulaError> {
        Err(self.syntax(token_span(token), message))
    }
}

fn same_kind(a: &TokenType, b: &TokenType) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

fn token_span(token: &Token) -> Span {
    Span::new(token.pos_start, token.pos_end)
}

fn source_span(span: Span) -> SourceSpan {
    (span.pos, span.end - span.pos).into()
}
