#[macro_use]
mod macros;

/// A Smallvec instantiation with 4 embeddable values.
///
/// Used about everywhere for operands, results and tensor dimensions: ranks
/// above 4 are rare in the graphs we deal with.
pub type TVec<T> = smallvec::SmallVec<[T; 4]>;

/// Result type used by all the tensil crates.
pub type TensilResult<T> = anyhow::Result<T>;

/// Extent of a tensor dimension that is only known at runtime.
pub const DYNAMIC: i64 = -1;

pub mod prelude {
    pub use crate::index_expr::{
        dims_to_shape, literal_dims, BinOp, CmpOp, DimsExpr, IndexExpr, IndexExprKind, Symbol,
        Term,
    };
    pub use crate::tvec;
    pub use crate::{TVec, TensilResult, DYNAMIC};
}

pub mod internal {
    pub use crate::prelude::*;
    pub use anyhow::{bail, ensure, format_err, Context};
    pub use itertools::Itertools;
    pub use smallvec as tensil_smallvec;
    pub use std::borrow::Cow;
    pub use std::fmt;
    pub use std::sync::Arc;
}

pub use anyhow;
pub use itertools;

mod index_expr;
