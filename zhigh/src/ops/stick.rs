//! Conversions between plain tensors and accelerator layouts.
use super::{check_rank, commit_with_layout, datum_type, ranked};
use crate::layout::{get_ztensor_layout, DataLayout, ZTensorEncoding};
use tensil_core::internal::*;

/// Output dim `i` is input dim `perm[i]`.
static NCHW_TO_NHWC: [usize; 4] = [0, 2, 3, 1];
static NHWC_TO_NCHW: [usize; 4] = [0, 3, 1, 2];

fn permute(dims: &[IndexExpr], perm: &[usize]) -> DimsExpr {
    perm.iter().map(|&p| dims[p].clone()).collect()
}

/// Dims of a tensor converted to or from NHWC. Other layouts keep the dims.
#[derive(Debug, Clone, Default)]
pub struct StickShapeHelper {
    perm: Option<&'static [usize]>,
    outputs: OutputDims,
}

impl ShapeHelper for StickShapeHelper {
    fn compute_shape<R: Realization>(
        &mut self,
        builder: &IndexExprBuilder<R>,
        operands: &[&Value],
    ) -> TensilResult<()> {
        let input = operands.first().context("Stick needs an input")?;
        let dims = builder.get_shape_as_dims(input);
        let output = match self.perm {
            Some(perm) => {
                ensure!(dims.len() == 4, "Input must have rank 4");
                permute(&dims, perm)
            }
            None => dims,
        };
        self.outputs.set(0, output);
        Ok(())
    }

    fn outputs(&self) -> &OutputDims {
        &self.outputs
    }
}

/// Conversion of a plain tensor to an accelerator layout.
///
/// Without an explicit layout, the layout is picked from the input rank.
/// Converting to NHWC reads the input as NCHW.
#[derive(Debug, Clone, new, PartialEq, Eq, Hash)]
pub struct Stick {
    pub layout: Option<DataLayout>,
}

impl Stick {
    pub fn from_attributes(attrs: &Attributes) -> TensilResult<Stick> {
        let layout = attrs.get_attr_opt::<String>("layout")?.map(|l| l.parse()).transpose()?;
        Ok(Stick::new(layout))
    }

    pub fn data_layout(&self, rank: usize) -> TensilResult<DataLayout> {
        match self.layout {
            Some(layout) => Ok(layout),
            None => DataLayout::by_rank(rank),
        }
    }

    /// Result type for an input of type `input`, as computed when the
    /// operation is built.
    pub fn result_type(&self, input: &TensorType) -> TensilResult<TensorType> {
        let ranked = match input {
            TensorType::None => return Ok(TensorType::None),
            TensorType::Unranked(dt) => return Ok(TensorType::Unranked(*dt)),
            TensorType::Ranked(r) => r,
        };
        let layout = self.data_layout(ranked.rank())?;
        let shape = if layout.is_nhwc() {
            ensure!(ranked.rank() == 4, "Input must have rank 4");
            NCHW_TO_NHWC.iter().map(|&p| ranked.dim(p)).collect()
        } else {
            ranked.shape.clone()
        };
        Ok(RankedTensorType::new(ranked.datum_type, &shape)
            .with_encoding(Some(ZTensorEncoding::arc(layout)))
            .into())
    }
}

impl Op for Stick {
    fn name(&self) -> Cow<'_, str> {
        "zhigh.Stick".into()
    }

    fn verify(&self, inputs: &[&Value], _outputs: &[&Value]) -> TensilResult<()> {
        check_input_arity(inputs, 1)?;
        let Some(input) = ranked(inputs[0]) else { return Ok(()) };
        let layout = self.data_layout(input.rank()).map_err(|e| self.op_error(e.to_string()))?;
        if layout.is_nhwc() {
            check_rank(self, 0, input, 4)?;
        }
        Ok(())
    }

    fn infer_shapes(&self, inputs: &[&Value], outputs: &mut ResultTypes) -> TensilResult<()> {
        check_input_arity(inputs, 1)?;
        let Some(input) = ranked(inputs[0]) else {
            debug!("{}: input not ranked yet", self.name());
            return Ok(());
        };
        let layout = self.data_layout(input.rank())?;
        let perm = layout.is_nhwc().then_some(&NCHW_TO_NHWC[..]);
        let mut helper = StickShapeHelper { perm, ..StickShapeHelper::default() };
        commit_with_layout(&mut helper, inputs, outputs, input.datum_type, layout)
    }
}

/// Conversion of an accelerator tensor back to a plain tensor. An NHWC
/// input comes back as NCHW.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Unstick;

impl Unstick {
    pub fn result_type(&self, input: &TensorType) -> TensilResult<TensorType> {
        let Some(ranked) = input.as_ranked() else {
            return Ok(input.datum_type().map(TensorType::Unranked).unwrap_or_default());
        };
        let shape = if get_ztensor_layout(input).is_nhwc() {
            ensure!(ranked.rank() == 4, "Input must have rank 4");
            NHWC_TO_NCHW.iter().map(|&p| ranked.dim(p)).collect()
        } else {
            ranked.shape.clone()
        };
        Ok(TensorType::ranked(ranked.datum_type, &shape))
    }
}

impl Op for Unstick {
    fn name(&self) -> Cow<'_, str> {
        "zhigh.Unstick".into()
    }

    fn verify(&self, inputs: &[&Value], _outputs: &[&Value]) -> TensilResult<()> {
        check_input_arity(inputs, 1)?;
        match ranked(inputs[0]) {
            Some(input) if get_ztensor_layout(&inputs[0].ty).is_nhwc() => check_rank(self, 0, input, 4),
            _ => Ok(()),
        }
    }

    fn infer_shapes(&self, inputs: &[&Value], outputs: &mut ResultTypes) -> TensilResult<()> {
        check_input_arity(inputs, 1)?;
        let Some(input) = ranked(inputs[0]) else {
            debug!("{}: input not ranked yet", self.name());
            return Ok(());
        };
        let perm = get_ztensor_layout(&inputs[0].ty).is_nhwc().then_some(&NHWC_TO_NCHW[..]);
        let mut helper = StickShapeHelper { perm, ..StickShapeHelper::default() };
        compute_shape_and_update_type(&mut helper, inputs, outputs, input.datum_type, None)
    }
}

/// Dims of the concatenation of `gates` gate tensors on their last axis.
/// Taken from the first ranked gate.
#[derive(Debug, Clone, new)]
pub struct GatesShapeHelper {
    gates: usize,
    #[new(default)]
    outputs: OutputDims,
}

impl ShapeHelper for GatesShapeHelper {
    fn compute_shape<R: Realization>(
        &mut self,
        builder: &IndexExprBuilder<R>,
        operands: &[&Value],
    ) -> TensilResult<()> {
        let gate = operands
            .iter()
            .find(|v| builder.has_shape_and_rank(v))
            .context("No ranked gate")?;
        let mut dims = builder.get_shape_as_dims(gate);
        let last = dims.last_mut().context("Gate must have rank at least 1")?;
        *last = last.clone() * self.gates as i64;
        self.outputs.set(0, dims);
        Ok(())
    }

    fn outputs(&self) -> &OutputDims {
        &self.outputs
    }
}

fn infer_gates(
    op: &dyn Op,
    gates: usize,
    layout: DataLayout,
    inputs: &[&Value],
    outputs: &mut ResultTypes,
) -> TensilResult<()> {
    check_input_arity(inputs, gates)?;
    if !inputs.iter().any(|v| v.ty.has_rank()) {
        debug!("{}: no gate ranked yet", op.name());
        return Ok(());
    }
    let dt = match outputs.current(0).datum_type() {
        Some(dt) => dt,
        None => datum_type(inputs[0])?,
    };
    commit_with_layout(&mut GatesShapeHelper::new(gates), inputs, outputs, dt, layout)
}

/// Stickification of the four LSTM gates (forget, input, cell, output)
/// into one FICO tensor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StickForLstm;

impl Op for StickForLstm {
    fn name(&self) -> Cow<'_, str> {
        "zhigh.StickForLSTM".into()
    }

    fn infer_shapes(&self, inputs: &[&Value], outputs: &mut ResultTypes) -> TensilResult<()> {
        infer_gates(self, 4, DataLayout::FICO, inputs, outputs)
    }
}

/// Stickification of the three GRU gates (update, reset, hidden) into one
/// ZRH tensor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StickForGru;

impl Op for StickForGru {
    fn name(&self) -> Cow<'_, str> {
        "zhigh.StickForGRU".into()
    }

    fn infer_shapes(&self, inputs: &[&Value], outputs: &mut ResultTypes) -> TensilResult<()> {
        infer_gates(self, 3, DataLayout::ZRH, inputs, outputs)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    fn infer(op: &dyn Op, inputs: &[TensorType]) -> TensilResult<TensorType> {
        let values: Vec<Value> =
            inputs.iter().enumerate().map(|(ix, ty)| Value::new(ValueId(ix), ty.clone(), None)).collect();
        let refs: Vec<&Value> = values.iter().collect();
        let mut results = ResultTypes::new(tvec!(TensorType::Unranked(DatumType::F32)));
        op.infer_shapes(&refs, &mut results)?;
        Ok(results.current(0).clone())
    }

    fn zten(shape: &[i64], layout: DataLayout) -> TensorType {
        RankedTensorType::new(DatumType::F32, shape).with_encoding(Some(ZTensorEncoding::arc(layout))).into()
    }

    #[test]
    fn stick_defaults_rank_4_to_nhwc() {
        let out = infer(&Stick::new(None), &[TensorType::ranked(DatumType::F32, &[1, 3, 5, 7])]).unwrap();
        assert_eq!(out, zten(&[1, 5, 7, 3], DataLayout::NHWC));
    }

    #[test]
    fn stick_keeps_dims_for_other_layouts() {
        let out = infer(&Stick::new(None), &[TensorType::ranked(DatumType::F32, &[DYNAMIC, 4])]).unwrap();
        assert_eq!(out, zten(&[DYNAMIC, 4], DataLayout::_2D));
        let out = infer(&Stick::new(Some(DataLayout::_3DS)), &[TensorType::ranked(DatumType::F32, &[2, 3, 4])])
            .unwrap();
        assert_eq!(out, zten(&[2, 3, 4], DataLayout::_3DS));
    }

    #[test]
    fn stick_defers_on_unranked() {
        let out = infer(&Stick::new(None), &[TensorType::Unranked(DatumType::F32)]).unwrap();
        assert_eq!(out, TensorType::Unranked(DatumType::F32));
        assert_eq!(
            Stick::new(None).result_type(&TensorType::Unranked(DatumType::F16)).unwrap(),
            TensorType::Unranked(DatumType::F16)
        );
    }

    #[test]
    fn stick_from_attributes() {
        let attrs = Attributes::default().with("layout", "3ds");
        assert_eq!(Stick::from_attributes(&attrs).unwrap(), Stick::new(Some(DataLayout::_3DS)));
        assert_eq!(Stick::from_attributes(&Attributes::default()).unwrap(), Stick::new(None));
        assert!(Stick::from_attributes(&Attributes::default().with("layout", "XYZ")).is_err());
    }

    #[test]
    fn stick_to_nhwc_needs_rank_4() {
        let input = Value::new(ValueId(0), TensorType::ranked(DatumType::F32, &[2, 3, 4]), None);
        let err = Stick::new(Some(DataLayout::NHWC)).verify(&[&input], &[]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Diagnostic>().unwrap().kind,
            DiagnosticKind::UnexpectedRank { operand: 0, rank: 3, expected: 4 }
        );
        assert!(Stick::new(None).verify(&[&input], &[]).is_ok());
    }

    #[test]
    fn unstick_nhwc() {
        let out = infer(&Unstick, &[zten(&[1, 5, 7, 3], DataLayout::NHWC)]).unwrap();
        assert_eq!(out, TensorType::ranked(DatumType::F32, &[1, 3, 5, 7]));
        assert!(out.encoding().is_none());
        let out = infer(&Unstick, &[zten(&[2, 6], DataLayout::_2D)]).unwrap();
        assert_eq!(out, TensorType::ranked(DatumType::F32, &[2, 6]));
    }

    #[test]
    fn stick_for_lstm_uses_first_ranked_gate() {
        let gates = [
            TensorType::Unranked(DatumType::F32),
            TensorType::ranked(DatumType::F32, &[1, 5, 6]),
            TensorType::Unranked(DatumType::F32),
            TensorType::Unranked(DatumType::F32),
        ];
        let out = infer(&StickForLstm, &gates).unwrap();
        assert_eq!(out, zten(&[1, 5, 24], DataLayout::FICO));
    }

    #[test]
    fn stick_for_gru() {
        let gate = TensorType::ranked(DatumType::F32, &[1, 5, DYNAMIC]);
        let out = infer(&StickForGru, &[gate.clone(), gate.clone(), gate]).unwrap();
        assert_eq!(out, zten(&[1, 5, DYNAMIC], DataLayout::ZRH));
        let out = infer(&StickForGru, &vec![TensorType::Unranked(DatumType::F32); 3]).unwrap();
        assert_eq!(out, TensorType::Unranked(DatumType::F32));
    }

    proptest! {
        #[test]
        fn unstick_inverts_stick(shape in proptest::collection::vec(1i64..64, 4)) {
            let input = TensorType::ranked(DatumType::F32, &shape);
            let sticked = infer(&Stick::new(None), &[input.clone()]).unwrap();
            let unsticked = infer(&Unstick, &[sticked.clone()]).unwrap();
            prop_assert_eq!(unsticked.shape(), input.shape());
            let built = Unstick.result_type(&Stick::new(None).result_type(&input).unwrap()).unwrap();
            prop_assert_eq!(built, input);
        }
    }
}
