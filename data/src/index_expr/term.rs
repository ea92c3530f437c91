use super::sym::Symbol;
use std::fmt;

macro_rules! b( ($e:expr) => { Box::new($e) } );

/// Integer arithmetic available on index expressions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    FloorDiv,
    CeilDiv,
    Rem,
    Min,
    Max,
}

/// Comparisons available on index expressions. They evaluate to 1 or 0.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

pub(crate) fn floor_div(a: i64, b: i64) -> Option<i64> {
    if b == 0 {
        return None;
    }
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) { Some(q - 1) } else { Some(q) }
}

pub(crate) fn ceil_div(a: i64, b: i64) -> Option<i64> {
    if b == 0 {
        return None;
    }
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) == (b < 0)) { Some(q + 1) } else { Some(q) }
}

impl BinOp {
    /// Evaluates the operation on two integers. None on division by zero or
    /// overflow.
    pub fn eval(self, a: i64, b: i64) -> Option<i64> {
        match self {
            BinOp::Add => a.checked_add(b),
            BinOp::Sub => a.checked_sub(b),
            BinOp::Mul => a.checked_mul(b),
            BinOp::FloorDiv => floor_div(a, b),
            BinOp::CeilDiv => ceil_div(a, b),
            BinOp::Rem => floor_div(a, b).map(|q| a - b * q),
            BinOp::Min => Some(a.min(b)),
            BinOp::Max => Some(a.max(b)),
        }
    }

    /// Builds the term for `a op b`, folding neutral elements.
    pub fn term(self, a: Term, b: Term) -> Term {
        match (self, &a, &b) {
            (BinOp::Add, Term::Val(0), _) => b,
            (BinOp::Add | BinOp::Sub, _, Term::Val(0)) => a,
            (BinOp::Mul, Term::Val(1), _) => b,
            (BinOp::Mul | BinOp::FloorDiv | BinOp::CeilDiv, _, Term::Val(1)) => a,
            _ => Term::Bin(self, b!(a), b!(b)),
        }
    }
}

impl CmpOp {
    pub fn eval(self, a: i64, b: i64) -> bool {
        match self {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// Expression computing a runtime index value.
///
/// Terms only appear inside symbol and dim index expressions: as soon as all
/// the leaves are integers the index expression is folded to a literal.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Term {
    Val(i64),
    Sym(Symbol),
    Bin(BinOp, Box<Term>, Box<Term>),
    Cmp(CmpOp, Box<Term>, Box<Term>),
    Select(Box<Term>, Box<Term>, Box<Term>),
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Term::Val(v) => write!(f, "{v}"),
            Term::Sym(s) => write!(f, "{s}"),
            Term::Bin(BinOp::Add, a, b) => write!(f, "({a} + {b})"),
            Term::Bin(BinOp::Sub, a, b) => write!(f, "({a} - {b})"),
            Term::Bin(BinOp::Mul, a, b) => write!(f, "({a} * {b})"),
            Term::Bin(BinOp::Rem, a, b) => write!(f, "({a} mod {b})"),
            Term::Bin(BinOp::FloorDiv, a, b) => write!(f, "floordiv({a}, {b})"),
            Term::Bin(BinOp::CeilDiv, a, b) => write!(f, "ceildiv({a}, {b})"),
            Term::Bin(BinOp::Min, a, b) => write!(f, "min({a}, {b})"),
            Term::Bin(BinOp::Max, a, b) => write!(f, "max({a}, {b})"),
            Term::Cmp(op, a, b) => write!(f, "({a} {} {b})", op.symbol()),
            Term::Select(c, a, b) => write!(f, "select({c}, {a}, {b})"),
        }
    }
}
