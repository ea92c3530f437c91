use crate::ops::{all_ranked, first_datum_type};
use tensil_core::internal::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Element-wise binary operation with multidirectional broadcasting.
#[derive(Debug, Clone, Copy, new, PartialEq, Eq, Hash)]
pub struct Binary(pub BinaryOp);

impl Op for Binary {
    fn name(&self) -> Cow<'_, str> {
        match self.0 {
            BinaryOp::Add => "onnx.Add",
            BinaryOp::Sub => "onnx.Sub",
            BinaryOp::Mul => "onnx.Mul",
            BinaryOp::Div => "onnx.Div",
        }
        .into()
    }

    fn verify(&self, inputs: &[&Value], _outputs: &[&Value]) -> TensilResult<()> {
        check_input_arity(inputs, 2)?;
        if let (Some(a), Some(b)) = (inputs[0].ty.datum_type(), inputs[1].ty.datum_type()) {
            if a != b {
                return Err(self.op_error(format!("operands element types differ: {a} and {b}")));
            }
        }
        Ok(())
    }

    fn infer_shapes(&self, inputs: &[&Value], outputs: &mut ResultTypes) -> TensilResult<()> {
        if !all_ranked(inputs) {
            return Ok(());
        }
        let dt = first_datum_type(inputs)?;
        let mut helper = BroadcastShapeHelper::default();
        compute_shape_and_update_type(&mut helper, inputs, outputs, dt, None)
            .map_err(|e| self.op_error(e.to_string()))
    }
}
