use super::{check_rank, ranked};
use crate::traits::verify_same_operands_and_result_layout;
use tensil_core::internal::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementWiseKind {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    Log,
    Exp,
    Relu,
    Tanh,
    Sigmoid,
    Softmax,
    BatchNorm,
}

impl ElementWiseKind {
    pub fn name(&self) -> &'static str {
        use ElementWiseKind::*;
        match self {
            Add => "Add",
            Sub => "Sub",
            Mul => "Mul",
            Div => "Div",
            Min => "Min",
            Max => "Max",
            Log => "Log",
            Exp => "Exp",
            Relu => "Relu",
            Tanh => "Tanh",
            Sigmoid => "Sigmoid",
            Softmax => "Softmax",
            BatchNorm => "BatchNorm",
        }
    }

    pub fn arity(&self) -> usize {
        use ElementWiseKind::*;
        match self {
            Add | Sub | Mul | Div | Min | Max => 2,
            Log | Exp | Relu | Tanh | Sigmoid | Softmax => 1,
            BatchNorm => 3,
        }
    }

    /// BatchNorm scale and shift are 1D while its input is not.
    pub fn same_layout(&self) -> bool {
        *self != ElementWiseKind::BatchNorm
    }
}

/// Operation producing a tensor of the exact type of its first operand,
/// layout included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, new)]
pub struct ElementWise(pub ElementWiseKind);

impl Op for ElementWise {
    fn name(&self) -> Cow<'_, str> {
        format!("zhigh.{}", self.0.name()).into()
    }

    fn verify(&self, inputs: &[&Value], outputs: &[&Value]) -> TensilResult<()> {
        check_input_arity(inputs, self.0.arity())?;
        if self.0.same_layout() {
            verify_same_operands_and_result_layout(self, inputs, outputs)?;
        }
        Ok(())
    }

    fn infer_shapes(&self, inputs: &[&Value], outputs: &mut ResultTypes) -> TensilResult<()> {
        check_input_arity(inputs, self.0.arity())?;
        let Some(input) = ranked(inputs[0]) else {
            debug!("{}: first operand not ranked yet", self.name());
            return Ok(());
        };
        outputs.update_type(0, input.clone());
        Ok(())
    }
}

/// Mean over H and W of an NHWC tensor: `[N, 1, 1, C]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MeanReduce2d;

impl Op for MeanReduce2d {
    fn name(&self) -> Cow<'_, str> {
        "zhigh.MeanReduce2D".into()
    }

    fn verify(&self, inputs: &[&Value], _outputs: &[&Value]) -> TensilResult<()> {
        check_input_arity(inputs, 1)?;
        match ranked(inputs[0]) {
            Some(input) => check_rank(self, 0, input, 4),
            None => Ok(()),
        }
    }

    fn infer_shapes(&self, inputs: &[&Value], outputs: &mut ResultTypes) -> TensilResult<()> {
        check_input_arity(inputs, 1)?;
        let Some(input) = ranked(inputs[0]) else { return Ok(()) };
        ensure!(input.rank() == 4, "Input must be NHWC");
        let shape = [input.dim(0), 1, 1, input.dim(3)];
        outputs.update_type(
            0,
            RankedTensorType::new(input.datum_type, &shape).with_encoding(input.encoding.clone()),
        );
        Ok(())
    }
}
