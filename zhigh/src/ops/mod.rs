use crate::layout::{get_ztensor_layout, DataLayout, ZTensorEncoding};
use tensil_core::internal::*;

pub mod conv;
pub mod element_wise;
pub mod matmul;
pub mod rnn;
pub mod stick;

/// Result types of an auxiliary split of `input` along `axis`: one per
/// `split` entry, with the axis extent replaced by that entry.
///
/// Panics on an empty `split`.
pub fn aux_split_result_types(
    input: &TensorType,
    axis: i64,
    split: &[i64],
) -> TensilResult<TVec<TensorType>> {
    assert!(!split.is_empty(), "Unsupported split (size==0)");
    let ranked = input.as_ranked().context("Auxiliary split needs a ranked input")?;
    let axis = usize::try_from(axis)
        .ok()
        .filter(|&a| a < ranked.rank())
        .with_context(|| format!("Split axis {axis} out of range for rank {}", ranked.rank()))?;
    Ok(split
        .iter()
        .map(|&size| {
            let mut shape = ranked.shape.clone();
            shape[axis] = size;
            TensorType::ranked(ranked.datum_type, &shape)
        })
        .collect())
}

/// Ranked type of an operand, if it has one.
pub(crate) fn ranked(value: &Value) -> Option<&RankedTensorType> {
    value.ty.as_ranked()
}

pub(crate) fn datum_type(value: &Value) -> TensilResult<DatumType> {
    value.ty.datum_type().with_context(|| format!("{} has no element type", value.id))
}

/// Diagnostic for an operand whose layout is not one of `expected`.
pub(crate) fn invalid_layout(operand: usize, value: &Value, expected: &[DataLayout]) -> DiagnosticKind {
    DiagnosticKind::InvalidLayout {
        operand,
        layout: get_ztensor_layout(&value.ty).to_string(),
        expected: expected.iter().join(" or "),
    }
}

/// Runs `helper` and commits its output dims with `layout` as encoding.
pub(crate) fn commit_with_layout<H: ShapeHelper>(
    helper: &mut H,
    inputs: &[&Value],
    outputs: &mut ResultTypes,
    datum_type: DatumType,
    layout: DataLayout,
) -> TensilResult<()> {
    let encoding = layout.is_defined().then(|| ZTensorEncoding::arc(layout));
    compute_shape_and_update_type(helper, inputs, outputs, datum_type, encoding)
}

/// Checks a statically known extent against its expected value.
pub(crate) fn check_dim(
    op: &dyn Op,
    operand: usize,
    ty: &RankedTensorType,
    dim: usize,
    expected: i64,
) -> TensilResult<()> {
    let value = ty.dim(dim);
    if !ty.is_dynamic_dim(dim) && expected != DYNAMIC && value != expected {
        return Err(op.diagnostic(DiagnosticKind::UnexpectedDimensionValue {
            operand,
            dim,
            value,
            expected,
        }));
    }
    Ok(())
}

pub(crate) fn check_rank(op: &dyn Op, operand: usize, ty: &RankedTensorType, expected: usize) -> TensilResult<()> {
    if ty.rank() != expected {
        return Err(op.diagnostic(DiagnosticKind::UnexpectedRank { operand, rank: ty.rank(), expected }));
    }
    Ok(())
}
