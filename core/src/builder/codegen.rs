use super::Realization;
use crate::types::{Value, ValueId};
use std::cell::RefCell;
use std::fmt;
use tensil_data::prelude::*;

/// Instruction materializing a runtime quantity.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Instr {
    /// Runtime extent of dimension `axis` of `value`.
    Dim { value: ValueId, axis: usize },
    /// Element `index` of the 1D integer array `array`.
    Extract { array: ValueId, index: usize },
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Instr::Dim { value, axis } => write!(f, "dim {value}, {axis}"),
            Instr::Extract { array, index } => write!(f, "extract {array}[{index}]"),
        }
    }
}

/// Sink for materialization instructions.
///
/// Asking twice for the same quantity gives back the same symbol.
#[derive(Debug, Default)]
pub struct Emitter {
    instrs: RefCell<Vec<Instr>>,
}

impl Emitter {
    pub fn symbol(index: usize) -> Symbol {
        Symbol::new(format!("s{index}"))
    }

    pub fn emit(&self, instr: Instr) -> Symbol {
        let mut instrs = self.instrs.borrow_mut();
        let index = match instrs.iter().position(|i| *i == instr) {
            Some(existing) => existing,
            None => {
                trace!("s{} = {}", instrs.len(), instr);
                instrs.push(instr);
                instrs.len() - 1
            }
        };
        Emitter::symbol(index)
    }

    pub fn instructions(&self) -> Vec<Instr> {
        self.instrs.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.instrs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.borrow().is_empty()
    }
}

/// Realization used while generating code: runtime quantities are
/// materialized through an `Emitter`.
#[derive(Clone, Copy, Debug, new)]
pub struct ForCodegen<'e> {
    emitter: &'e Emitter,
}

impl Realization for ForCodegen<'_> {
    fn get_val(&self, array: &Value, index: usize) -> Option<Symbol> {
        Some(self.emitter.emit(Instr::Extract { array: array.id, index }))
    }

    fn get_shape_val(&self, value: &Value, axis: usize) -> Option<Symbol> {
        Some(self.emitter.emit(Instr::Dim { value: value.id, axis }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::builder::IndexExprBuilder;
    use crate::types::{DatumType, TensorType};

    #[test]
    fn runtime_dims_are_materialized_once() {
        let emitter = Emitter::default();
        let b = IndexExprBuilder::new(ForCodegen::new(&emitter));
        let v = Value::new(ValueId(4), TensorType::ranked(DatumType::F32, &[DYNAMIC, 3]), None);
        let dims = b.get_shape_as_dims(&v);
        assert_eq!(dims[0], IndexExpr::dim(Symbol::new("s0")));
        assert_eq!(dims[1], 3.into());
        assert_eq!(b.get_shape_as_symbol(&v, 0), IndexExpr::symbol(Symbol::new("s0")));
        assert_eq!(emitter.instructions(), vec![Instr::Dim { value: ValueId(4), axis: 0 }]);
        let doubled = dims[0].clone() * 2;
        assert_eq!(doubled.to_string(), "(s0 * 2)");
    }

    #[test]
    fn runtime_array_elements() {
        let emitter = Emitter::default();
        let b = IndexExprBuilder::new(ForCodegen::new(&emitter));
        let split = Value::new(ValueId(2), TensorType::ranked(DatumType::I64, &[2]), None);
        let parts = b.get_int_from_array_as_symbols(&split, None).unwrap();
        assert!(parts.iter().all(IndexExpr::is_symbol));
        assert_eq!(emitter.len(), 2);
        assert_eq!(emitter.instructions()[1].to_string(), "extract %2[1]");
        assert_eq!(b.get_int_from_array_as_symbol(&split, 2), IndexExpr::Undefined);
    }
}
