use std::fmt;

/// Byte range of a node in the formula source.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Span {
    pub pos: usize,
    pub end: usize,
}

impl Span {
    pub fn new(pos: usize, end: usize) -> Self {
        Self { pos, end }
    }

    pub fn to(self, other: Span) -> Span {
        Span::new(self.pos, other.end)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    /// Higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ExprKind {
    /// A number literal and the text it was written as.
    Const { value: f64, src: String },
    /// `{name}`
    Ref(String),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// A function call. The name is stored upper-cased.
    Call { name: String, args: Vec<Expr> },
    /// A parenthesised expression.
    Group(Box<Expr>),
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn pos(&self) -> usize {
        self.span.pos
    }

    pub fn end(&self) -> usize {
        self.span.end
    }

    /// Strips any number of enclosing parentheses.
    pub fn ungrouped(&self) -> &Expr {
        match &self.kind {
            ExprKind::Group(inner) => inner.ungrouped(),
            _ => self,
        }
    }
}

/// Renders a form that parses back to an equivalent tree. Every binary operation is
/// parenthesised, so grouping never depends on precedence.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Const { value, .. } => write!(f, "{value}"),
            ExprKind::Ref(name) => write!(f, "{{{name}}}"),
            ExprKind::Binary { op, lhs, rhs } => write!(f, "({lhs}{op}{rhs})"),
            ExprKind::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            ExprKind::Group(inner) => match inner.kind {
                ExprKind::Binary { .. } | ExprKind::Group(_) => write!(f, "{inner}"),
                _ => write!(f, "({inner})"),
            },
        }
    }
}
