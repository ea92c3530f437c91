//! Verification shared by the layout-preserving operations.
use crate::layout::{get_ztensor_layout, DataLayout};
use tensil_core::internal::*;

/// Checks that every operand and result carries the layout of the first
/// result. A first result without layout opts out of the check.
pub fn verify_same_operands_and_result_layout(
    op: &dyn Op,
    inputs: &[&Value],
    outputs: &[&Value],
) -> TensilResult<()> {
    if inputs.is_empty() {
        return Err(op.op_error("requires at least one operand".into()));
    }
    let Some((first, others)) = outputs.split_first() else {
        return Err(op.op_error("requires at least one result".into()));
    };
    let layout = get_ztensor_layout(&first.ty);
    if layout == DataLayout::Undefined {
        return Ok(());
    }
    if others.iter().chain(inputs.iter()).any(|v| get_ztensor_layout(&v.ty) != layout) {
        return Err(op.op_error("requires the same layout for all operands and results".into()));
    }
    Ok(())
}
