use super::{commit_with_layout, invalid_layout, ranked};
use crate::layout::{get_ztensor_layout, DataLayout};
use tensil_core::internal::*;

use DataLayout::{_1D, _2D, _2DS, _3DS};

/// Matrix product with optional bias, on 2D or stacked (3DS) operands.
///
/// Operands are `X`, `Y` and `B`, the latter possibly a none value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MatMul;

impl MatMul {
    /// Bias layout accepted for a given (X, Y) layout pair.
    fn bias_layout(x: DataLayout, y: DataLayout) -> Option<DataLayout> {
        match (x, y) {
            (_2D, _2D) => Some(_1D),
            (_3DS, _3DS) => Some(_2DS),
            (_3DS, _2D) => Some(_1D),
            _ => None,
        }
    }
}

impl Op for MatMul {
    fn name(&self) -> Cow<'_, str> {
        "zhigh.MatMul".into()
    }

    fn verify(&self, inputs: &[&Value], _outputs: &[&Value]) -> TensilResult<()> {
        check_input_arity(inputs, 3)?;
        let (x, y, b) = (inputs[0], inputs[1], inputs[2]);
        if !x.ty.has_rank() || !y.ty.has_rank() {
            return Ok(());
        }
        let x_layout = get_ztensor_layout(&x.ty);
        let y_layout = get_ztensor_layout(&y.ty);
        if !matches!(x_layout, _2D | _3DS) {
            return Err(self.diagnostic(invalid_layout(0, x, &[_2D, _3DS])));
        }
        let Some(bias) = Self::bias_layout(x_layout, y_layout) else {
            let expected: &[DataLayout] = if x_layout == _2D { &[_2D] } else { &[_3DS, _2D] };
            return Err(self.diagnostic(invalid_layout(1, y, expected)));
        };
        if !b.is_none() && get_ztensor_layout(&b.ty) != bias {
            return Err(self.diagnostic(invalid_layout(2, b, &[bias])));
        }
        Ok(())
    }

    fn infer_shapes(&self, inputs: &[&Value], outputs: &mut ResultTypes) -> TensilResult<()> {
        check_input_arity(inputs, 3)?;
        let (Some(x), Some(_)) = (ranked(inputs[0]), ranked(inputs[1])) else {
            debug!("{}: operands not ranked yet", self.name());
            return Ok(());
        };
        // the output has the rank of X
        let layout = match x.rank() {
            2 => _2D,
            3 => _3DS,
            _ => DataLayout::Undefined,
        };
        commit_with_layout(&mut MatMulShapeHelper::default(), inputs, outputs, x.datum_type, layout)
    }
}

/// Output dims of a matrix product: `[N, P]` for 2D operands, `[S, N, P]`
/// when X is stacked.
#[derive(Debug, Clone, Default)]
pub struct MatMulShapeHelper {
    outputs: OutputDims,
}

impl ShapeHelper for MatMulShapeHelper {
    fn compute_shape<R: Realization>(
        &mut self,
        builder: &IndexExprBuilder<R>,
        operands: &[&Value],
    ) -> TensilResult<()> {
        let x = builder.get_shape_as_dims(operands[0]);
        let y = builder.get_shape_as_dims(operands[1]);
        let p = y.last().cloned().context("Y must have rank 2 or 3")?;
        let output: DimsExpr = match (x.len(), y.len()) {
            (2, 2) => tvec!(x[0].clone(), p),
            (3, 2) | (3, 3) => tvec!(x[0].clone(), x[1].clone(), p),
            (xr, yr) => bail!("Unsupported ranks for MatMul: X has rank {xr}, Y has rank {yr}"),
        };
        self.outputs.set(0, output);
        Ok(())
    }

    fn outputs(&self) -> &OutputDims {
        &self.outputs
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layout::ZTensorEncoding;
    use DataLayout::NHWC;

    fn value(id: usize, shape: &[i64], layout: DataLayout) -> Value {
        let ty = RankedTensorType::new(DatumType::F32, shape);
        let ty = if layout.is_defined() { ty.with_encoding(Some(ZTensorEncoding::arc(layout))) } else { ty };
        Value::new(ValueId(id), ty.into(), None)
    }

    fn shape_for(layout: DataLayout) -> &'static [i64] {
        match layout {
            _1D => &[4],
            _2D | _2DS => &[3, 4],
            _ => &[2, 3, 4],
        }
    }

    fn verify(x: DataLayout, y: DataLayout, b: Option<DataLayout>) -> bool {
        let x = value(0, shape_for(x), x);
        let y = value(1, shape_for(y), y);
        let b = match b {
            Some(b) => value(2, shape_for(b), b),
            None => Value::new(ValueId(2), TensorType::None, None),
        };
        MatMul.verify(&[&x, &y, &b], &[]).is_ok()
    }

    #[test]
    fn verify_matrix() {
        let mut accepted = vec![];
        for x in [_2D, _3DS, NHWC] {
            for y in [_2D, _3DS, NHWC] {
                for b in [None, Some(_1D), Some(_2DS)] {
                    if verify(x, y, b) {
                        accepted.push((x, y, b));
                    }
                }
            }
        }
        assert_eq!(
            accepted,
            vec![
                (_2D, _2D, None),
                (_2D, _2D, Some(_1D)),
                (_3DS, _2D, None),
                (_3DS, _2D, Some(_1D)),
                (_3DS, _3DS, None),
                (_3DS, _3DS, Some(_2DS)),
            ]
        );
    }

    #[test]
    fn verify_reports_the_operand() {
        let x = value(0, &[2, 3, 4], _3DS);
        let y = value(1, &[3, 4], _2D);
        let b = value(2, &[3, 4], _2DS);
        let err = MatMul.verify(&[&x, &y, &b], &[]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Diagnostic>().unwrap().kind,
            DiagnosticKind::InvalidLayout { operand: 2, layout: "2DS".into(), expected: "1D".into() }
        );
    }

    fn infer(x: &Value, y: &Value) -> TensorType {
        let b = Value::new(ValueId(2), TensorType::None, None);
        let mut results = ResultTypes::new(tvec!(TensorType::Unranked(DatumType::F32)));
        MatMul.infer_shapes(&[x, y, &b], &mut results).unwrap();
        results.current(0).clone()
    }

    #[test]
    fn infer_2d() {
        let out = infer(&value(0, &[5, 3], _2D), &value(1, &[3, 7], _2D));
        assert_eq!(out.shape().unwrap(), &[5, 7]);
        assert_eq!(get_ztensor_layout(&out), _2D);
    }

    #[test]
    fn infer_stacked() {
        let out = infer(&value(0, &[4, 5, 3], _3DS), &value(1, &[4, 3, DYNAMIC], _3DS));
        assert_eq!(out.shape().unwrap(), &[4, 5, DYNAMIC]);
        assert_eq!(get_ztensor_layout(&out), _3DS);
        let out = infer(&value(0, &[4, 5, 3], _3DS), &value(1, &[3, 7], _2D));
        assert_eq!(out.shape().unwrap(), &[4, 5, 7]);
        assert_eq!(get_ztensor_layout(&out), _3DS);
    }

    #[test]
    fn infer_rejects_other_ranks() {
        let b = Value::new(ValueId(2), TensorType::None, None);
        let (x, y) = (value(0, &[1, 4, 5, 3], NHWC), value(1, &[3, 7], _2D));
        let mut results = ResultTypes::new(tvec!(TensorType::Unranked(DatumType::F32)));
        assert!(MatMul.infer_shapes(&[&x, &y, &b], &mut results).is_err());
        assert!(!results.is_updated(0));
    }

    #[test]
    fn infer_defers_on_unranked() {
        let y = Value::new(ValueId(1), TensorType::Unranked(DatumType::F32), None);
        assert_eq!(infer(&value(0, &[5, 3], _2D), &y), TensorType::Unranked(DatumType::F32));
    }
}
