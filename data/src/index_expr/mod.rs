//! Index expressions: the values shape inference computes with.
//!
//! An index expression represents one dimension-sized quantity. It is either
//! a compile-time integer (a literal), a value only known at runtime (a
//! symbol, invariant in the current scope, or a dim, which may vary like a
//! loop index), a questionmark (a runtime value during a pure analysis, when
//! nothing can be materialized), or undefined (extraction failed).
//!
//! Arithmetic between literals folds to a literal. Arithmetic involving
//! anything else never produces a literal.

use crate::{TVec, TensilResult, DYNAMIC};
use std::fmt;
use std::ops;

mod sym;
mod term;

pub use sym::Symbol;
pub use term::{BinOp, CmpOp, Term};

/// Dimensions of one tensor, as index expressions.
pub type DimsExpr = TVec<IndexExpr>;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum IndexExprKind {
    Undefined,
    Literal,
    Questionmark,
    Symbol,
    Dim,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum IndexExpr {
    #[default]
    Undefined,
    Literal(i64),
    Questionmark,
    Symbol(Term),
    Dim(Term),
}

use IndexExpr::{Dim, Literal, Questionmark, Undefined};

impl IndexExpr {
    pub fn symbol(sym: Symbol) -> IndexExpr {
        IndexExpr::Symbol(Term::Sym(sym))
    }

    pub fn dim(sym: Symbol) -> IndexExpr {
        Dim(Term::Sym(sym))
    }

    pub fn kind(&self) -> IndexExprKind {
        match self {
            Undefined => IndexExprKind::Undefined,
            Literal(_) => IndexExprKind::Literal,
            Questionmark => IndexExprKind::Questionmark,
            IndexExpr::Symbol(_) => IndexExprKind::Symbol,
            Dim(_) => IndexExprKind::Dim,
        }
    }

    #[inline]
    pub fn is_defined(&self) -> bool {
        !matches!(self, Undefined)
    }

    #[inline]
    pub fn is_literal(&self) -> bool {
        matches!(self, Literal(_))
    }

    #[inline]
    pub fn is_questionmark(&self) -> bool {
        matches!(self, Questionmark)
    }

    #[inline]
    pub fn is_symbol(&self) -> bool {
        matches!(self, IndexExpr::Symbol(_))
    }

    #[inline]
    pub fn is_dim(&self) -> bool {
        matches!(self, Dim(_))
    }

    #[inline]
    pub fn literal(&self) -> Option<i64> {
        if let Literal(v) = self { Some(*v) } else { None }
    }

    pub fn is_literal_and_equal(&self, v: i64) -> bool {
        self.literal() == Some(v)
    }

    pub fn to_i64(&self) -> TensilResult<i64> {
        self.literal()
            .ok_or_else(|| anyhow::format_err!("{self} is not a compile-time literal"))
    }

    /// Integer form used in tensor types: the literal value, or `DYNAMIC`.
    pub fn dim_value(&self) -> i64 {
        self.literal().unwrap_or(DYNAMIC)
    }

    /// The runtime term behind a symbol or a dim.
    pub fn term(&self) -> Option<&Term> {
        match self {
            IndexExpr::Symbol(t) | Dim(t) => Some(t),
            _ => None,
        }
    }

    /// Reinterprets a dim as a symbol. Other kinds are left untouched.
    pub fn into_symbol(self) -> IndexExpr {
        match self {
            Dim(t) => IndexExpr::Symbol(t),
            it => it,
        }
    }

    /// Reinterprets a symbol as a dim. Other kinds are left untouched.
    pub fn into_dim(self) -> IndexExpr {
        match self {
            IndexExpr::Symbol(t) => Dim(t),
            it => it,
        }
    }

    fn into_term(self) -> Term {
        match self {
            Literal(v) => Term::Val(v),
            IndexExpr::Symbol(t) | Dim(t) => t,
            Undefined | Questionmark => unreachable!("{self:?} has no runtime term"),
        }
    }

    fn binary(self, rhs: IndexExpr, op: BinOp) -> IndexExpr {
        match (self, rhs) {
            (Undefined, _) | (_, Undefined) => Undefined,
            (Literal(a), Literal(b)) => op.eval(a, b).map(Literal).unwrap_or(Undefined),
            (Questionmark, _) | (_, Questionmark) => Questionmark,
            (a, b) => {
                let dim = a.is_dim() || b.is_dim();
                let term = op.term(a.into_term(), b.into_term());
                if dim { Dim(term) } else { IndexExpr::Symbol(term) }
            }
        }
    }

    pub fn floor_div(self, rhs: impl Into<IndexExpr>) -> IndexExpr {
        self.binary(rhs.into(), BinOp::FloorDiv)
    }

    pub fn ceil_div(self, rhs: impl Into<IndexExpr>) -> IndexExpr {
        self.binary(rhs.into(), BinOp::CeilDiv)
    }

    pub fn rem(self, rhs: impl Into<IndexExpr>) -> IndexExpr {
        self.binary(rhs.into(), BinOp::Rem)
    }

    pub fn min(self, rhs: impl Into<IndexExpr>) -> IndexExpr {
        self.binary(rhs.into(), BinOp::Min)
    }

    pub fn max(self, rhs: impl Into<IndexExpr>) -> IndexExpr {
        self.binary(rhs.into(), BinOp::Max)
    }

    /// Compares two index expressions. Literal 1 or 0 when both sides are
    /// literals, a runtime predicate otherwise.
    pub fn cmp(&self, op: CmpOp, rhs: &IndexExpr) -> IndexExpr {
        match (self, rhs) {
            (Undefined, _) | (_, Undefined) => Undefined,
            (Literal(a), Literal(b)) => Literal(op.eval(*a, *b) as i64),
            (Questionmark, _) | (_, Questionmark) => Questionmark,
            (a, b) => {
                let dim = a.is_dim() || b.is_dim();
                let term = Term::Cmp(
                    op,
                    Box::new(a.clone().into_term()),
                    Box::new(b.clone().into_term()),
                );
                if dim { Dim(term) } else { IndexExpr::Symbol(term) }
            }
        }
    }

    /// `cond ? then : otherwise`.
    pub fn select(cond: &IndexExpr, then: &IndexExpr, otherwise: &IndexExpr) -> IndexExpr {
        if let Literal(c) = cond {
            return if *c != 0 { then.clone() } else { otherwise.clone() };
        }
        if !cond.is_defined() || !then.is_defined() || !otherwise.is_defined() {
            return Undefined;
        }
        if then == otherwise {
            return then.clone();
        }
        if cond.is_questionmark() || then.is_questionmark() || otherwise.is_questionmark() {
            return Questionmark;
        }
        let dim = cond.is_dim() || then.is_dim() || otherwise.is_dim();
        let term = Term::Select(
            Box::new(cond.clone().into_term()),
            Box::new(then.clone().into_term()),
            Box::new(otherwise.clone().into_term()),
        );
        if dim { Dim(term) } else { IndexExpr::Symbol(term) }
    }
}

/// Collapses dimensions to the integer form of a tensor type.
pub fn dims_to_shape(dims: &[IndexExpr]) -> TVec<i64> {
    dims.iter().map(IndexExpr::dim_value).collect()
}

/// Literal index expressions for a fully static shape.
pub fn literal_dims(shape: &[i64]) -> DimsExpr {
    shape.iter().map(|&d| Literal(d)).collect()
}

impl fmt::Display for IndexExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Undefined => write!(f, "undefined"),
            Literal(v) => write!(f, "{v}"),
            Questionmark => write!(f, "?"),
            IndexExpr::Symbol(t) => write!(f, "{t}"),
            Dim(t) => write!(f, "{t}"),
        }
    }
}

macro_rules! from_i {
    ($i: ty) => {
        impl From<$i> for IndexExpr {
            fn from(v: $i) -> IndexExpr {
                Literal(v as _)
            }
        }
    };
}

from_i!(i32);
from_i!(i64);
from_i!(usize);

macro_rules! arith {
    ($trait: ident, $method: ident, $assign_trait: ident, $assign_method: ident, $op: expr) => {
        impl<I: Into<IndexExpr>> ops::$trait<I> for IndexExpr {
            type Output = IndexExpr;
            fn $method(self, rhs: I) -> IndexExpr {
                self.binary(rhs.into(), $op)
            }
        }

        impl<'a> ops::$trait<&'a IndexExpr> for IndexExpr {
            type Output = IndexExpr;
            fn $method(self, rhs: &'a IndexExpr) -> IndexExpr {
                self.binary(rhs.clone(), $op)
            }
        }

        impl<I: Into<IndexExpr>> ops::$assign_trait<I> for IndexExpr {
            fn $assign_method(&mut self, rhs: I) {
                *self = std::mem::take(self).binary(rhs.into(), $op)
            }
        }

        impl<'a> ops::$assign_trait<&'a IndexExpr> for IndexExpr {
            fn $assign_method(&mut self, rhs: &'a IndexExpr) {
                *self = std::mem::take(self).binary(rhs.clone(), $op)
            }
        }
    };
}

arith!(Add, add, AddAssign, add_assign, BinOp::Add);
arith!(Sub, sub, SubAssign, sub_assign, BinOp::Sub);
arith!(Mul, mul, MulAssign, mul_assign, BinOp::Mul);

impl ops::Neg for IndexExpr {
    type Output = IndexExpr;
    fn neg(self) -> IndexExpr {
        Literal(0).binary(self, BinOp::Sub)
    }
}

impl num_traits::Zero for IndexExpr {
    fn zero() -> IndexExpr {
        Literal(0)
    }
    fn is_zero(&self) -> bool {
        self.is_literal_and_equal(0)
    }
}

impl num_traits::One for IndexExpr {
    fn one() -> IndexExpr {
        Literal(1)
    }
}

impl std::iter::Sum for IndexExpr {
    fn sum<I: Iterator<Item = IndexExpr>>(iter: I) -> IndexExpr {
        iter.fold(Literal(0), |acc, it| acc + it)
    }
}
