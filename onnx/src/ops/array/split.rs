use crate::ops::{first_datum_type, resolve_axis};
use tensil_core::internal::*;

/// Split of a tensor into `outputs` parts along one axis.
///
/// Part sizes come from the optional second operand, or are all equal.
#[derive(Debug, Clone, new, PartialEq, Eq, Hash)]
pub struct Split {
    pub axis: i64,
    pub outputs: usize,
}

impl Split {
    pub fn from_attributes(attrs: &Attributes, outputs: usize) -> TensilResult<Split> {
        ensure!(outputs > 0, "Split needs at least one result");
        let axis = attrs.get_attr_opt("axis")?.unwrap_or(0);
        if let Some(n) = attrs.get_attr_opt::<usize>("num_outputs")? {
            ensure!(n == outputs, "num_outputs is {n}, node has {outputs} results");
        }
        Ok(Split::new(axis, outputs))
    }

    fn split_operand<'v>(inputs: &[&'v Value]) -> Option<&'v Value> {
        inputs.get(1).copied().filter(|v| !v.is_none())
    }
}

impl Op for Split {
    fn name(&self) -> Cow<'_, str> {
        "onnx.Split".into()
    }

    fn nboutputs(&self) -> usize {
        self.outputs
    }

    fn canonicalize(&mut self, inputs: &[&Value]) -> TensilResult<bool> {
        if self.axis >= 0 {
            return Ok(false);
        }
        let Some(rank) = inputs.first().and_then(|v| v.ty.rank()) else { return Ok(false) };
        Ok(resolve_axis(self.axis, rank).map(|axis| self.axis = axis as i64).is_some())
    }

    fn verify(&self, inputs: &[&Value], _outputs: &[&Value]) -> TensilResult<()> {
        ensure!((1..=2).contains(&inputs.len()), "Split expects one or two operands");
        if self.outputs == 0 {
            return Err(self.op_error("requires at least one result".into()));
        }
        let Some(shape) = inputs[0].ty.shape() else { return Ok(()) };
        let rank = shape.len();
        let axis = resolve_axis(self.axis, rank).ok_or_else(|| {
            let rank = rank as i64;
            self.diagnostic(DiagnosticKind::AttributeOutOfRange {
                attribute: "axis".into(),
                value: self.axis,
                range: (-rank, rank - 1),
            })
        })?;
        let Some(split) = Self::split_operand(inputs) else {
            let dim = shape[axis];
            if dim != DYNAMIC && dim % self.outputs as i64 != 0 {
                return Err(self.op_error(format!(
                    "dimension {dim} of axis {axis} can not be split evenly in {} parts",
                    self.outputs
                )));
            }
            return Ok(());
        };
        if let Some(sizes) = split.konst() {
            if sizes.len() != self.outputs {
                return Err(self.op_error(format!(
                    "split has {} entries for {} results",
                    sizes.len(),
                    self.outputs
                )));
            }
            let total = sizes
                .iter()
                .try_fold(0i64, |acc, &s| acc.checked_add(s))
                .ok_or_else(|| self.op_error(format!("split sizes {sizes:?} overflow")))?;
            if shape[axis] != DYNAMIC && total != shape[axis] {
                return Err(self.diagnostic(DiagnosticKind::UnexpectedDimensionValue {
                    operand: 0,
                    dim: axis,
                    value: shape[axis],
                    expected: total,
                }));
            }
        }
        Ok(())
    }

    fn infer_shapes(&self, inputs: &[&Value], outputs: &mut ResultTypes) -> TensilResult<()> {
        if !inputs[0].ty.has_rank() {
            debug!("{}: input not ranked yet", self.name());
            return Ok(());
        }
        let dt = first_datum_type(inputs)?;
        let mut helper = SplitShapeHelper::new(self.axis, self.outputs);
        compute_shape_and_update_type(&mut helper, inputs, outputs, dt, None)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SplitShapeHelper {
    axis: i64,
    parts: usize,
    outputs: OutputDims,
}

impl SplitShapeHelper {
    pub fn new(axis: i64, parts: usize) -> SplitShapeHelper {
        SplitShapeHelper { axis, parts, outputs: OutputDims::default() }
    }
}

impl ShapeHelper for SplitShapeHelper {
    fn compute_shape<R: Realization>(
        &mut self,
        builder: &IndexExprBuilder<R>,
        operands: &[&Value],
    ) -> TensilResult<()> {
        ensure!(self.parts > 0, "Split needs at least one result");
        let input = operands[0];
        let rank = builder.shaped_type_rank(input);
        let axis = resolve_axis(self.axis, rank)
            .with_context(|| format!("axis {} out of range for rank {rank}", self.axis))?;
        let dims = builder.get_shape_as_dims(input);
        let sizes: DimsExpr = match Split::split_operand(operands) {
            Some(split) => {
                if let Some(len) = builder.get_array_size(split) {
                    ensure!(len == self.parts, "split has {len} entries for {} results", self.parts);
                }
                builder
                    .get_int_from_array_as_symbols(split, Some(self.parts))
                    .context("Reading split sizes")?
            }
            None => {
                let size = dims[axis].clone().floor_div(self.parts as i64);
                tvec!(size; self.parts)
            }
        };
        for (ix, size) in sizes.into_iter().enumerate() {
            let mut output = dims.clone();
            output[axis] = size;
            self.outputs.set(ix, output);
        }
        Ok(())
    }

    fn outputs(&self) -> &OutputDims {
        &self.outputs
    }
}
