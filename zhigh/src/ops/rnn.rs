//! Recurrent layers on stickified weights.
//!
//! Operand shapes (D is the number of directions, H the hidden size, G the
//! number of gates):
//!
//! | operand        | shape        |
//! |----------------|--------------|
//! | input          | `[S, B, I]`  |
//! | input_weights  | `[D, I, GH]` |
//! | input_bias     | `[D, GH]`    |
//! | hidden_weights | `[D, H, GH]` |
//! | hidden_bias    | `[D, GH]`    |
use super::{check_dim, check_rank, commit_with_layout, ranked};
use crate::layout::DataLayout;
use tensil_core::internal::*;

/// Attributes shared by the recurrent ops.
#[derive(Debug, Clone, PartialEq, Eq, Hash, new)]
pub struct RnnAttributes {
    pub hidden_size: i64,
    pub direction: String,
    /// -1 returns every step, anything else only the last one.
    pub return_all_steps: i64,
}

impl RnnAttributes {
    pub fn from_attributes(attrs: &Attributes) -> TensilResult<RnnAttributes> {
        Ok(RnnAttributes {
            hidden_size: attrs.get_attr("hidden_size")?,
            direction: attrs.get_attr_opt("direction")?.unwrap_or_else(|| "forward".to_string()),
            return_all_steps: attrs.get_attr_opt("return_all_steps")?.unwrap_or(-1),
        })
    }

    pub fn all_steps(&self) -> bool {
        self.return_all_steps == -1
    }
}

/// Operand positions of the weights and biases of a recurrent op.
struct Weights {
    input_weights: usize,
    input_bias: usize,
    hidden_weights: usize,
    hidden_bias: usize,
}

fn verify_hidden_size(
    op: &dyn Op,
    gates: i64,
    hidden_size: i64,
    at: &Weights,
    inputs: &[&Value],
) -> TensilResult<()> {
    let gates_size = hidden_size.checked_mul(gates).filter(|_| hidden_size > 0).ok_or_else(|| {
        op.diagnostic(DiagnosticKind::InvalidAttribute {
            attribute: "hidden_size".into(),
            value: hidden_size.to_string(),
            expected: format!("a positive size, at most {}", i64::MAX / gates),
        })
    })?;
    if let Some(w) = ranked(inputs[at.input_weights]) {
        check_rank(op, at.input_weights, w, 3)?;
        check_dim(op, at.input_weights, w, 2, gates_size)?;
    }
    if let Some(r) = ranked(inputs[at.hidden_weights]) {
        check_rank(op, at.hidden_weights, r, 3)?;
        check_dim(op, at.hidden_weights, r, 1, hidden_size)?;
        check_dim(op, at.hidden_weights, r, 2, gates_size)?;
    }
    for bias in [at.input_bias, at.hidden_bias] {
        if let Some(b) = ranked(inputs[bias]) {
            check_rank(op, bias, b, 2)?;
            check_dim(op, bias, b, 1, gates_size)?;
        }
    }
    Ok(())
}

/// Output dims of a recurrent op. The hidden state is `[S, D, B, H]`, or
/// `[1, D, B, H]` for the last step only. The LSTM cell state is always
/// `[1, D, B, H]`.
#[derive(Debug, Clone, new)]
pub struct RnnShapeHelper {
    hidden_weights: usize,
    all_steps: bool,
    with_cell_state: bool,
    #[new(default)]
    outputs: OutputDims,
}

impl ShapeHelper for RnnShapeHelper {
    fn compute_shape<R: Realization>(
        &mut self,
        builder: &IndexExprBuilder<R>,
        operands: &[&Value],
    ) -> TensilResult<()> {
        let input = operands[0];
        let hidden_weights = operands[self.hidden_weights];
        let s = builder.get_shape_as_symbol(input, 0);
        let b = builder.get_shape_as_symbol(input, 1);
        let d = builder.get_shape_as_symbol(hidden_weights, 0);
        let h = builder.get_shape_as_symbol(hidden_weights, 1);
        let steps = if self.all_steps { s } else { 1.into() };
        self.outputs.set(0, tvec!(steps, d.clone(), b.clone(), h.clone()));
        if self.with_cell_state {
            self.outputs.set(1, tvec!(1.into(), d, b, h));
        }
        Ok(())
    }

    fn outputs(&self) -> &OutputDims {
        &self.outputs
    }
}

fn infer_rnn(
    op: &dyn Op,
    mut helper: RnnShapeHelper,
    inputs: &[&Value],
    outputs: &mut ResultTypes,
) -> TensilResult<()> {
    let (Some(input), Some(_)) = (ranked(inputs[0]), ranked(inputs[helper.hidden_weights])) else {
        debug!("{}: input or hidden weights not ranked yet", op.name());
        return Ok(());
    };
    commit_with_layout(&mut helper, inputs, outputs, input.datum_type, DataLayout::_4DS)
}

/// LSTM layer. Operands: input, h0, c0, input_weights, input_bias,
/// hidden_weights, hidden_bias. Results: hidden state and cell state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, new)]
pub struct Lstm {
    pub attributes: RnnAttributes,
}

impl Lstm {
    const WEIGHTS: Weights = Weights { input_weights: 3, input_bias: 4, hidden_weights: 5, hidden_bias: 6 };

    pub fn from_attributes(attrs: &Attributes) -> TensilResult<Lstm> {
        Ok(Lstm::new(RnnAttributes::from_attributes(attrs)?))
    }
}

impl Op for Lstm {
    fn name(&self) -> Cow<'_, str> {
        "zhigh.LSTM".into()
    }

    fn nboutputs(&self) -> usize {
        2
    }

    fn verify(&self, inputs: &[&Value], _outputs: &[&Value]) -> TensilResult<()> {
        check_input_arity(inputs, 7)?;
        verify_hidden_size(self, 4, self.attributes.hidden_size, &Self::WEIGHTS, inputs)
    }

    fn infer_shapes(&self, inputs: &[&Value], outputs: &mut ResultTypes) -> TensilResult<()> {
        check_input_arity(inputs, 7)?;
        let helper = RnnShapeHelper::new(Self::WEIGHTS.hidden_weights, self.attributes.all_steps(), true);
        infer_rnn(self, helper, inputs, outputs)
    }
}

/// GRU layer. Operands: input, h0, input_weights, input_bias,
/// hidden_weights, hidden_bias. Result: hidden state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, new)]
pub struct Gru {
    pub attributes: RnnAttributes,
}

impl Gru {
    const WEIGHTS: Weights = Weights { input_weights: 2, input_bias: 3, hidden_weights: 4, hidden_bias: 5 };

    pub fn from_attributes(attrs: &Attributes) -> TensilResult<Gru> {
        Ok(Gru::new(RnnAttributes::from_attributes(attrs)?))
    }
}

impl Op for Gru {
    fn name(&self) -> Cow<'_, str> {
        "zhigh.GRU".into()
    }

    fn verify(&self, inputs: &[&Value], _outputs: &[&Value]) -> TensilResult<()> {
        check_input_arity(inputs, 6)?;
        verify_hidden_size(self, 3, self.attributes.hidden_size, &Self::WEIGHTS, inputs)
    }

    fn infer_shapes(&self, inputs: &[&Value], outputs: &mut ResultTypes) -> TensilResult<()> {
        check_input_arity(inputs, 6)?;
        let helper = RnnShapeHelper::new(Self::WEIGHTS.hidden_weights, self.attributes.all_steps(), false);
        infer_rnn(self, helper, inputs, outputs)
    }
}
