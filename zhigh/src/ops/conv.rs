//! 2D convolution and pooling on NHWC tensors.
use super::{check_dim, check_rank, ranked};
use tensil_core::internal::*;

/// Spatial padding policy of the accelerator convolutions and pools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PaddingType {
    /// Output extent is `ceil(input / stride)`.
    Same,
    /// No padding: output extent is `ceil((input - kernel + 1) / stride)`.
    Valid,
}

impl PaddingType {
    pub fn parse(s: &str) -> Option<PaddingType> {
        if s.eq_ignore_ascii_case("SAME_PADDING") {
            Some(PaddingType::Same)
        } else if s.eq_ignore_ascii_case("VALID_PADDING") {
            Some(PaddingType::Valid)
        } else {
            None
        }
    }

    pub fn output_dim(&self, input: IndexExpr, kernel: IndexExpr, stride: IndexExpr) -> IndexExpr {
        match self {
            PaddingType::Same => input.ceil_div(stride),
            PaddingType::Valid => (input - kernel + 1).ceil_div(stride),
        }
    }
}

/// Attributes shared by the convolution and the pools.
#[derive(Debug, Clone, PartialEq, Eq, Hash, new)]
pub struct Window {
    pub kernel_shape: TVec<i64>,
    pub strides: TVec<i64>,
    pub padding_type: String,
}

impl Window {
    pub fn from_attributes(attrs: &Attributes) -> TensilResult<Window> {
        Ok(Window {
            kernel_shape: attrs.get_attr_ints("kernel_shape")?,
            strides: attrs.get_attr_opt("strides")?.unwrap_or_else(|| tvec!(1, 1)),
            padding_type: attrs.get_attr_opt("padding_type")?.unwrap_or_else(|| "VALID_PADDING".to_string()),
        })
    }

    fn verify(&self, op: &dyn Op) -> TensilResult<()> {
        if PaddingType::parse(&self.padding_type).is_none() {
            return Err(op.diagnostic(DiagnosticKind::InvalidAttribute {
                attribute: "padding_type".into(),
                value: self.padding_type.clone(),
                expected: "SAME_PADDING or VALID_PADDING".into(),
            }));
        }
        for (name, values) in [("kernel_shape", &self.kernel_shape), ("strides", &self.strides)] {
            if values.len() != 2 {
                return Err(op.diagnostic(DiagnosticKind::InvalidAttribute {
                    attribute: name.into(),
                    value: format!("[{}]", values.iter().join(", ")),
                    expected: "two values".into(),
                }));
            }
        }
        Ok(())
    }

    /// `[N, OH, OW]` for an NHWC input.
    fn spatial_dims<R: Realization>(
        &self,
        builder: &IndexExprBuilder<R>,
        input: &Value,
    ) -> TensilResult<DimsExpr> {
        let padding = PaddingType::parse(&self.padding_type)
            .with_context(|| format!("Unsupported padding type {}", self.padding_type))?;
        ensure!(builder.shaped_type_rank(input) == 4, "Input must be NHWC");
        ensure!(builder.get_array_attribute_size(&self.kernel_shape) == 2, "kernel_shape must have two values");
        let mut dims: DimsExpr = tvec!(builder.get_shape_as_dim(input, 0));
        for axis in 0..2 {
            let extent = builder.get_shape_as_dim(input, axis + 1);
            let kernel = builder.get_int_from_array_as_literal(&self.kernel_shape, axis);
            let stride = builder.get_int_from_array_as_literal_or(&self.strides, axis, 1);
            dims.push(padding.output_dim(extent, kernel, stride));
        }
        Ok(dims)
    }
}

/// 2D convolution. Operands: input `[N, H, W, C]`, kernel `[KH, KW, C, K]`
/// and bias `[K]` (possibly none).
#[derive(Debug, Clone, PartialEq, Eq, Hash, new)]
pub struct Conv2d {
    pub window: Window,
    pub act_func: String,
}

impl Conv2d {
    pub fn from_attributes(attrs: &Attributes) -> TensilResult<Conv2d> {
        Ok(Conv2d {
            window: Window::from_attributes(attrs)?,
            act_func: attrs.get_attr_opt("act_func")?.unwrap_or_else(|| "ACT_NONE".to_string()),
        })
    }
}

impl Op for Conv2d {
    fn name(&self) -> Cow<'_, str> {
        "zhigh.Conv2D".into()
    }

    fn verify(&self, inputs: &[&Value], _outputs: &[&Value]) -> TensilResult<()> {
        check_input_arity(inputs, 3)?;
        self.window.verify(self)?;
        if !["ACT_NONE", "ACT_RELU"].iter().any(|f| f.eq_ignore_ascii_case(&self.act_func)) {
            return Err(self.diagnostic(DiagnosticKind::InvalidAttribute {
                attribute: "act_func".into(),
                value: self.act_func.clone(),
                expected: "ACT_NONE or ACT_RELU".into(),
            }));
        }
        let Some(kernel) = ranked(inputs[1]) else { return Ok(()) };
        check_rank(self, 1, kernel, 4)?;
        if let Some(bias) = ranked(inputs[2]) {
            check_rank(self, 2, bias, 1)?;
            check_dim(self, 2, bias, 0, kernel.dim(3))?;
        }
        check_dim(self, 1, kernel, 0, self.window.kernel_shape[0])?;
        check_dim(self, 1, kernel, 1, self.window.kernel_shape[1])?;
        Ok(())
    }

    fn infer_shapes(&self, inputs: &[&Value], outputs: &mut ResultTypes) -> TensilResult<()> {
        check_input_arity(inputs, 3)?;
        let (Some(input), Some(_)) = (ranked(inputs[0]), ranked(inputs[1])) else {
            debug!("{}: input or kernel not ranked yet", self.name());
            return Ok(());
        };
        let mut helper = Conv2dShapeHelper::new(self);
        compute_shape_and_update_type(&mut helper, inputs, outputs, input.datum_type, input.encoding.clone())
    }
}

/// Output dims of a convolution: `[N, OH, OW, K]`.
#[derive(Debug, Clone, new)]
pub struct Conv2dShapeHelper<'a> {
    op: &'a Conv2d,
    #[new(default)]
    outputs: OutputDims,
}

impl ShapeHelper for Conv2dShapeHelper<'_> {
    fn compute_shape<R: Realization>(
        &mut self,
        builder: &IndexExprBuilder<R>,
        operands: &[&Value],
    ) -> TensilResult<()> {
        let mut dims = self.op.window.spatial_dims(builder, operands[0])?;
        ensure!(builder.shaped_type_rank(operands[1]) == 4, "Kernel must be HWCK");
        dims.push(builder.get_shape_as_dim(operands[1], 3));
        self.outputs.set(0, dims);
        Ok(())
    }

    fn outputs(&self) -> &OutputDims {
        &self.outputs
    }
}

/// A 2D pooling operation on an NHWC input.
pub trait Pool2d: Op {
    fn window(&self) -> &Window;
}

/// Output dims of a pooling: `[N, OH, OW, C]`.
#[derive(Debug, Clone, new)]
pub struct PoolingShapeHelper<'a, P: Pool2d> {
    op: &'a P,
    #[new(default)]
    outputs: OutputDims,
}

impl<P: Pool2d> ShapeHelper for PoolingShapeHelper<'_, P> {
    fn compute_shape<R: Realization>(
        &mut self,
        builder: &IndexExprBuilder<R>,
        operands: &[&Value],
    ) -> TensilResult<()> {
        let mut dims = self.op.window().spatial_dims(builder, operands[0])?;
        dims.push(builder.get_shape_as_dim(operands[0], 3));
        self.outputs.set(0, dims);
        Ok(())
    }

    fn outputs(&self) -> &OutputDims {
        &self.outputs
    }
}

fn verify_pool<P: Pool2d>(op: &P, inputs: &[&Value]) -> TensilResult<()> {
    check_input_arity(inputs, 1)?;
    op.window().verify(op)?;
    match ranked(inputs[0]) {
        Some(input) => check_rank(op, 0, input, 4),
        None => Ok(()),
    }
}

fn infer_pool<P: Pool2d>(op: &P, inputs: &[&Value], outputs: &mut ResultTypes) -> TensilResult<()> {
    check_input_arity(inputs, 1)?;
    let Some(input) = ranked(inputs[0]) else {
        debug!("{}: input not ranked yet", op.name());
        return Ok(());
    };
    let mut helper = PoolingShapeHelper::new(op);
    compute_shape_and_update_type(&mut helper, inputs, outputs, input.datum_type, input.encoding.clone())
}

macro_rules! pool {
    ($id:ident, $name:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, new)]
        pub struct $id {
            pub window: Window,
        }

        impl $id {
            pub fn from_attributes(attrs: &Attributes) -> TensilResult<$id> {
                Ok($id::new(Window::from_attributes(attrs)?))
            }
        }

        impl Pool2d for $id {
            fn window(&self) -> &Window {
                &self.window
            }
        }

        impl Op for $id {
            fn name(&self) -> Cow<'_, str> {
                $name.into()
            }

            fn verify(&self, inputs: &[&Value], _outputs: &[&Value]) -> TensilResult<()> {
                verify_pool(self, inputs)
            }

            fn infer_shapes(&self, inputs: &[&Value], outputs: &mut ResultTypes) -> TensilResult<()> {
                infer_pool(self, inputs, outputs)
            }
        }
    };
}

pool!(MaxPool2d, "zhigh.MaxPool2D");
pool!(AvgPool2d, "zhigh.AvgPool2D");

#[cfg(test)]
mod test {
    use super::*;
    use crate::layout::{get_ztensor_layout, DataLayout, ZTensorEncoding};

    fn nhwc(id: usize, shape: &[i64]) -> Value {
        let ty = RankedTensorType::new(DatumType::F32, shape)
            .with_encoding(Some(ZTensorEncoding::arc(DataLayout::NHWC)));
        Value::new(ValueId(id), ty.into(), None)
    }

    fn plain(id: usize, shape: &[i64]) -> Value {
        Value::new(ValueId(id), TensorType::ranked(DatumType::F32, shape), None)
    }

    fn conv(padding: &str, act: &str) -> Conv2d {
        Conv2d::new(Window::new(tvec!(3, 3), tvec!(2, 2), padding.into()), act.into())
    }

    fn infer(op: &dyn Op, inputs: &[&Value]) -> TensorType {
        let mut results = ResultTypes::new(tvec!(TensorType::default()));
        op.infer_shapes(inputs, &mut results).unwrap();
        results.current(0).clone()
    }

    #[test]
    fn padding_output_dims() {
        assert_eq!(PaddingType::Same.output_dim(7.into(), 3.into(), 2.into()), IndexExpr::Literal(4));
        assert_eq!(PaddingType::Valid.output_dim(7.into(), 3.into(), 2.into()), IndexExpr::Literal(3));
        assert_eq!(PaddingType::Valid.output_dim(8.into(), 3.into(), 1.into()), IndexExpr::Literal(6));
        assert_eq!(PaddingType::parse("same_padding"), Some(PaddingType::Same));
        assert_eq!(PaddingType::parse("SAME"), None);
    }

    #[test]
    fn conv_shapes() {
        let (x, k, b) = (nhwc(0, &[1, 7, 8, 3]), plain(1, &[3, 3, 3, 16]), plain(2, &[16]));
        let out = infer(&conv("SAME_PADDING", "ACT_NONE"), &[&x, &k, &b]);
        assert_eq!(out.shape().unwrap(), &[1, 4, 4, 16]);
        assert_eq!(get_ztensor_layout(&out), DataLayout::NHWC);
        let out = infer(&conv("VALID_PADDING", "ACT_RELU"), &[&x, &k, &b]);
        assert_eq!(out.shape().unwrap(), &[1, 3, 3, 16]);
    }

    #[test]
    fn conv_dynamic_extent() {
        let (x, k) = (nhwc(0, &[DYNAMIC, DYNAMIC, 8, 3]), plain(1, &[3, 3, 3, 16]));
        let b = Value::new(ValueId(2), TensorType::None, None);
        let out = infer(&conv("SAME_PADDING", "ACT_NONE"), &[&x, &k, &b]);
        assert_eq!(out.shape().unwrap(), &[DYNAMIC, DYNAMIC, 4, 16]);
    }

    #[test]
    fn conv_attributes_are_case_insensitive() {
        let (x, k, b) = (nhwc(0, &[1, 7, 8, 3]), plain(1, &[3, 3, 3, 16]), plain(2, &[16]));
        conv("Same_Padding", "act_relu").verify(&[&x, &k, &b], &[]).unwrap();
        let err = conv("FULL_PADDING", "ACT_NONE").verify(&[&x, &k, &b], &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Diagnostic>().unwrap().kind,
            DiagnosticKind::InvalidAttribute { ref attribute, .. } if attribute == "padding_type"
        ));
        assert!(conv("SAME_PADDING", "ACT_TANH").verify(&[&x, &k, &b], &[]).is_err());
    }

    #[test]
    fn conv_bias_and_kernel_shape() {
        let x = nhwc(0, &[1, 7, 8, 3]);
        let op = conv("SAME_PADDING", "ACT_NONE");
        let err = op.verify(&[&x, &plain(1, &[3, 3, 3, 16]), &plain(2, &[8])], &[]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Diagnostic>().unwrap().kind,
            DiagnosticKind::UnexpectedDimensionValue { operand: 2, dim: 0, value: 8, expected: 16 }
        );
        let err = op.verify(&[&x, &plain(1, &[3, 5, 3, 16]), &plain(2, &[16])], &[]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Diagnostic>().unwrap().kind,
            DiagnosticKind::UnexpectedDimensionValue { operand: 1, dim: 1, value: 5, expected: 3 }
        );
        op.verify(&[&x, &plain(1, &[DYNAMIC, 3, 3, DYNAMIC]), &plain(2, &[8])], &[]).unwrap();
    }

    #[test]
    fn pools_keep_channels_and_encoding() {
        let x = nhwc(0, &[2, 9, 9, 5]);
        let window = Window::new(tvec!(2, 2), tvec!(2, 2), "VALID_PADDING".into());
        let out = infer(&MaxPool2d::new(window.clone()), &[&x]);
        assert_eq!(out.shape().unwrap(), &[2, 4, 4, 5]);
        assert_eq!(get_ztensor_layout(&out), DataLayout::NHWC);
        let window = Window::new(tvec!(2, 2), tvec!(2, 2), "SAME_PADDING".into());
        let out = infer(&AvgPool2d::new(window), &[&x]);
        assert_eq!(out.shape().unwrap(), &[2, 5, 5, 5]);
    }

    #[test]
    fn pool_from_attributes() {
        let attrs = Attributes::default().with("kernel_shape", [3, 3]);
        let pool = MaxPool2d::from_attributes(&attrs).unwrap();
        assert_eq!(pool.window.strides.as_slice(), &[1, 1]);
        let x = plain(0, &[1, 6, 6, 2]);
        pool.verify(&[&x], &[]).unwrap();
        assert_eq!(infer(&pool, &[&x]).shape().unwrap(), &[1, 4, 4, 2]);
        let bad = MaxPool2d::from_attributes(&attrs.clone().with("kernel_shape", [3])).unwrap();
        assert!(bad.verify(&[&x], &[]).is_err());
    }
}
