//! Operation contract.
use std::fmt;

use downcast_rs::Downcast;

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::types::{TensorType, Value};
use tensil_data::internal::*;

pub fn check_input_arity(inputs: &[&Value], expected: usize) -> TensilResult<()> {
    if inputs.len() != expected {
        bail!("Wrong input number. Op expects {}, node has {}.", expected, inputs.len())
    } else {
        Ok(())
    }
}

/// Result types being written by one `infer_shapes` call.
///
/// Starts from the current result types. Each result can be written at most
/// once per call.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultTypes {
    types: TVec<TensorType>,
    updated: TVec<bool>,
}

impl ResultTypes {
    pub fn new(current: TVec<TensorType>) -> ResultTypes {
        let updated = tvec!(false; current.len());
        ResultTypes { types: current, updated }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn current(&self, output: usize) -> &TensorType {
        &self.types[output]
    }

    pub fn update_type(&mut self, output: usize, ty: impl Into<TensorType>) {
        assert!(!self.updated[output], "result #{output} written twice");
        self.types[output] = ty.into();
        self.updated[output] = true;
    }

    pub fn is_updated(&self, output: usize) -> bool {
        self.updated[output]
    }

    pub fn into_types(self) -> TVec<TensorType> {
        self.types
    }
}

/// Shape inference contract of an operation.
///
/// The driver calls `canonicalize` (optionally, once), then `verify`, then
/// `infer_shapes`, in program order. Both `verify` and `infer_shapes` must
/// succeed without touching anything when an operand they need is not
/// ranked yet.
pub trait Op: fmt::Debug + dyn_clone::DynClone + Downcast + Send + Sync + 'static {
    fn name(&self) -> Cow<'_, str>;

    fn nboutputs(&self) -> usize {
        1
    }

    /// Normalizes the op attributes. Returns true if anything changed.
    fn canonicalize(&mut self, _inputs: &[&Value]) -> TensilResult<bool> {
        Ok(false)
    }

    fn verify(&self, _inputs: &[&Value], _outputs: &[&Value]) -> TensilResult<()> {
        Ok(())
    }

    fn infer_shapes(&self, inputs: &[&Value], outputs: &mut ResultTypes) -> TensilResult<()>;

    /// A diagnostic for this op, as an error.
    fn diagnostic(&self, kind: DiagnosticKind) -> anyhow::Error {
        anyhow::Error::new(Diagnostic::new(self.name().into_owned(), kind))
    }

    /// A diagnostic with a free form message, as an error.
    fn op_error(&self, msg: String) -> anyhow::Error {
        self.diagnostic(DiagnosticKind::OpError(msg))
    }
}

downcast_rs::impl_downcast!(Op);
dyn_clone::clone_trait_object!(Op);

impl<O: Op> From<O> for Box<dyn Op> {
    fn from(it: O) -> Box<dyn Op> {
        Box::new(it)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::DatumType;

    #[test]
    #[should_panic]
    fn results_are_written_once() {
        let mut results = ResultTypes::new(tvec!(TensorType::None, TensorType::None));
        results.update_type(1, TensorType::ranked(DatumType::F32, &[2]));
        assert!(!results.is_updated(0));
        assert!(results.is_updated(1));
        results.update_type(1, TensorType::ranked(DatumType::F32, &[3]));
    }
}
