use crate::ops::{all_ranked, first_datum_type, resolve_axis};
use tensil_core::internal::*;

/// Concatenation of tensors along one axis.
#[derive(Debug, Clone, new, PartialEq, Eq, Hash)]
pub struct Concat {
    pub axis: i64,
}

impl Concat {
    pub fn from_attributes(attrs: &Attributes) -> TensilResult<Concat> {
        Ok(Concat::new(attrs.get_attr("axis")?))
    }

    fn out_of_range(&self, rank: usize) -> DiagnosticKind {
        let rank = rank as i64;
        DiagnosticKind::AttributeOutOfRange {
            attribute: "axis".into(),
            value: self.axis,
            range: (-rank, rank - 1),
        }
    }
}

impl Op for Concat {
    fn name(&self) -> Cow<'_, str> {
        "onnx.Concat".into()
    }

    fn canonicalize(&mut self, inputs: &[&Value]) -> TensilResult<bool> {
        if self.axis >= 0 {
            return Ok(false);
        }
        let Some(rank) = inputs.first().and_then(|v| v.ty.rank()) else { return Ok(false) };
        match resolve_axis(self.axis, rank) {
            Some(axis) => {
                self.axis = axis as i64;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn verify(&self, inputs: &[&Value], _outputs: &[&Value]) -> TensilResult<()> {
        if inputs.is_empty() || !all_ranked(inputs) {
            return Ok(());
        }
        let common = inputs[0].ty.shape().unwrap_or_default();
        let rank = common.len();
        let axis = resolve_axis(self.axis, rank).ok_or_else(|| self.diagnostic(self.out_of_range(rank)))?;
        for (ix, input) in inputs.iter().enumerate() {
            let shape = input.ty.shape().unwrap_or_default();
            if shape.len() != rank {
                return Err(self.diagnostic(DiagnosticKind::UnexpectedRank {
                    operand: ix,
                    rank: shape.len(),
                    expected: rank,
                }));
            }
            for dim in (0..rank).filter(|&d| d != axis) {
                if shape[dim] != DYNAMIC && common[dim] != DYNAMIC && shape[dim] != common[dim] {
                    return Err(self.diagnostic(DiagnosticKind::UnexpectedDimensionValue {
                        operand: ix,
                        dim,
                        value: shape[dim],
                        expected: common[dim],
                    }));
                }
            }
        }
        Ok(())
    }

    fn infer_shapes(&self, inputs: &[&Value], outputs: &mut ResultTypes) -> TensilResult<()> {
        if inputs.is_empty() || !all_ranked(inputs) {
            debug!("{}: operands not ranked yet", self.name());
            return Ok(());
        }
        let dt = first_datum_type(inputs)?;
        let mut helper = ConcatShapeHelper::new(self.axis);
        compute_shape_and_update_type(&mut helper, inputs, outputs, dt, None)
            .map_err(|e| match e.downcast_ref::<Diagnostic>() {
                Some(_) => e,
                None => self.op_error(e.to_string()),
            })
    }
}

/// Output shape of a concatenation.
///
/// Non-axis dims come from the first operand, overridden by any literal
/// seen on a later one. The axis dim is the sum of the operands ones.
#[derive(Debug, Clone, Default)]
pub struct ConcatShapeHelper {
    axis: i64,
    outputs: OutputDims,
}

impl ConcatShapeHelper {
    pub fn new(axis: i64) -> ConcatShapeHelper {
        ConcatShapeHelper { axis, outputs: OutputDims::default() }
    }
}

impl ShapeHelper for ConcatShapeHelper {
    fn compute_shape<R: Realization>(
        &mut self,
        builder: &IndexExprBuilder<R>,
        operands: &[&Value],
    ) -> TensilResult<()> {
        let (first, others) = operands.split_first().context("Concat needs at least one operand")?;
        let rank = builder.shaped_type_rank(first);
        let axis = resolve_axis(self.axis, rank)
            .with_context(|| format!("axis {} out of range for rank {rank}", self.axis))?;
        let mut dims: TVec<DimsExpr> = tvec!(builder.get_shape_as_dims(first));
        let mut total = builder.get_shape_as_dim(first, axis);
        for other in others {
            ensure!(builder.shaped_type_rank(other) == rank, "operands rank mismatch");
            total += builder.get_shape_as_dim(other, axis);
            dims.push(builder.get_shape_as_dims(other));
        }
        let mut output = merge_literal_or_first(&dims);
        output[axis] = total;
        trace!("concat on axis {axis}: {}", output.iter().join(", "));
        self.outputs.set(0, output);
        Ok(())
    }

    fn outputs(&self) -> &OutputDims {
        &self.outputs
    }
}
