//! Extraction of index expressions from values and attributes.
//!
//! `IndexExprBuilder` reads shapes, integer array attributes and 1D integer
//! array operands and turns them into index expressions. What it does when
//! a quantity is only known at runtime depends on its `Realization`: during
//! analysis nothing can be materialized and a questionmark comes back, while
//! code generation emits an instruction and hands back a symbol naming its
//! result. The algorithms do not depend on the realization in use.
use crate::types::Value;
use tensil_data::internal::*;

mod analysis;
mod codegen;

pub use analysis::ForAnalysis;
pub use codegen::{Emitter, ForCodegen, Instr};

/// Phase-specific access to runtime quantities.
pub trait Realization {
    /// Compile-time content of an integer array value, if any.
    fn get_const(&self, value: &Value) -> Option<Arc<[i64]>> {
        value.konst.clone()
    }

    /// Materializes element `index` of a 1D integer array value.
    fn get_val(&self, array: &Value, index: usize) -> Option<Symbol>;

    /// Materializes the runtime extent of dimension `axis` of `value`.
    fn get_shape_val(&self, value: &Value, axis: usize) -> Option<Symbol>;
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Form {
    Symbol,
    Dim,
}

impl Form {
    fn wrap(self, sym: Option<Symbol>) -> IndexExpr {
        match (self, sym) {
            (_, None) => IndexExpr::Questionmark,
            (Form::Symbol, Some(s)) => IndexExpr::symbol(s),
            (Form::Dim, Some(s)) => IndexExpr::dim(s),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct IndexExprBuilder<R: Realization> {
    realization: R,
}

impl<R: Realization> IndexExprBuilder<R> {
    pub fn new(realization: R) -> IndexExprBuilder<R> {
        IndexExprBuilder { realization }
    }

    pub fn realization(&self) -> &R {
        &self.realization
    }

    pub fn has_shape_and_rank(&self, value: &Value) -> bool {
        value.ty.has_rank()
    }

    /// Rank of a ranked value. Callers must check `has_shape_and_rank`
    /// first.
    pub fn shaped_type_rank(&self, value: &Value) -> usize {
        assert!(self.has_shape_and_rank(value), "{} has no rank", value.id);
        value.ty.rank().unwrap_or_default()
    }

    pub fn get_array_attribute_size(&self, attr: &[i64]) -> usize {
        attr.len()
    }

    /// Number of elements of a 1D array operand, when known at compile
    /// time.
    pub fn get_array_size(&self, array: &Value) -> Option<usize> {
        if let Some(konst) = self.realization.get_const(array) {
            return Some(konst.len());
        }
        match array.ty.shape() {
            Some([d]) if *d != DYNAMIC => Some(*d as usize),
            _ => None,
        }
    }

    /// Element `i` of an integer array attribute, undefined past the end.
    pub fn get_int_from_array_as_literal(&self, attr: &[i64], i: usize) -> IndexExpr {
        attr.get(i).map(|&v| IndexExpr::Literal(v)).unwrap_or_default()
    }

    /// Element `i` of an integer array attribute, `out_of_bound` past the
    /// end.
    pub fn get_int_from_array_as_literal_or(
        &self,
        attr: &[i64],
        i: usize,
        out_of_bound: i64,
    ) -> IndexExpr {
        IndexExpr::Literal(attr.get(i).copied().unwrap_or(out_of_bound))
    }

    /// The first `len` elements of an integer array attribute, the whole
    /// array when `len` is None.
    pub fn get_int_from_array_as_literals(&self, attr: &[i64], len: Option<usize>) -> DimsExpr {
        let len = len.unwrap_or(attr.len());
        assert!(len <= attr.len(), "requested {len} elements from an array attribute of {}", attr.len());
        literal_dims(&attr[..len])
    }

    fn get_int_from_array(&self, array: &Value, i: usize, form: Form) -> IndexExpr {
        if let Some(konst) = self.realization.get_const(array) {
            return konst.get(i).map(|&v| IndexExpr::Literal(v)).unwrap_or_default();
        }
        if self.get_array_size(array).is_some_and(|size| i >= size) {
            return IndexExpr::Undefined;
        }
        form.wrap(self.realization.get_val(array, i))
    }

    /// Scalar integer operand (rank 0 or a single element array).
    pub fn get_int_as_symbol(&self, value: &Value) -> IndexExpr {
        self.get_int_from_array(value, 0, Form::Symbol)
    }

    pub fn get_int_as_dim(&self, value: &Value) -> IndexExpr {
        self.get_int_from_array(value, 0, Form::Dim)
    }

    pub fn get_int_from_array_as_symbol(&self, array: &Value, i: usize) -> IndexExpr {
        self.get_int_from_array(array, i, Form::Symbol)
    }

    pub fn get_int_from_array_as_symbol_or(&self, array: &Value, i: usize, out_of_bound: i64) -> IndexExpr {
        match self.get_int_from_array(array, i, Form::Symbol) {
            IndexExpr::Undefined => IndexExpr::Literal(out_of_bound),
            it => it,
        }
    }

    pub fn get_int_from_array_as_dim(&self, array: &Value, i: usize) -> IndexExpr {
        self.get_int_from_array(array, i, Form::Dim)
    }

    fn get_ints_from_array(&self, array: &Value, len: Option<usize>, form: Form) -> Option<DimsExpr> {
        let size = self.get_array_size(array);
        let len = match (len, size) {
            (Some(len), Some(size)) => {
                assert!(len <= size, "requested {len} elements from an array of {size}");
                len
            }
            (Some(len), None) => len,
            (None, Some(size)) => size,
            (None, None) => return None,
        };
        Some((0..len).map(|i| self.get_int_from_array(array, i, form)).collect())
    }

    /// The first `len` elements of a 1D array operand, all of them when
    /// `len` is None. None when the array length is needed but unknown.
    pub fn get_int_from_array_as_symbols(&self, array: &Value, len: Option<usize>) -> Option<DimsExpr> {
        self.get_ints_from_array(array, len, Form::Symbol)
    }

    pub fn get_int_from_array_as_dims(&self, array: &Value, len: Option<usize>) -> Option<DimsExpr> {
        self.get_ints_from_array(array, len, Form::Dim)
    }

    pub fn is_literal_shape(&self, value: &Value) -> bool {
        value.ty.shape().is_some_and(|s| s.iter().all(|&d| d != DYNAMIC))
    }

    pub fn get_shape_as_literal(&self, value: &Value, axis: usize) -> IndexExpr {
        match value.ty.shape().and_then(|s| s.get(axis)) {
            Some(&d) if d != DYNAMIC => IndexExpr::Literal(d),
            _ => IndexExpr::Undefined,
        }
    }

    fn get_shape(&self, value: &Value, axis: usize, form: Form) -> IndexExpr {
        assert!(self.has_shape_and_rank(value), "{} has no rank", value.id);
        match value.ty.shape().and_then(|s| s.get(axis)) {
            None => IndexExpr::Undefined,
            Some(&d) if d != DYNAMIC => IndexExpr::Literal(d),
            Some(_) => form.wrap(self.realization.get_shape_val(value, axis)),
        }
    }

    pub fn get_shape_as_symbol(&self, value: &Value, axis: usize) -> IndexExpr {
        self.get_shape(value, axis, Form::Symbol)
    }

    pub fn get_shape_as_dim(&self, value: &Value, axis: usize) -> IndexExpr {
        self.get_shape(value, axis, Form::Dim)
    }

    pub fn get_shape_as_literals(&self, value: &Value) -> DimsExpr {
        (0..self.shaped_type_rank(value)).map(|i| self.get_shape_as_literal(value, i)).collect()
    }

    pub fn get_shape_as_symbols(&self, value: &Value) -> DimsExpr {
        (0..self.shaped_type_rank(value)).map(|i| self.get_shape_as_symbol(value, i)).collect()
    }

    pub fn get_shape_as_dims(&self, value: &Value) -> DimsExpr {
        (0..self.shaped_type_rank(value)).map(|i| self.get_shape_as_dim(value, i)).collect()
    }
}
