pub mod array;
pub mod einsum;
pub mod math;

use tensil_core::internal::*;

/// Normalizes a possibly negative axis for a tensor of rank `rank`. None
/// when out of `[-rank, rank)`.
pub fn resolve_axis(axis: i64, rank: usize) -> Option<usize> {
    let rank = rank as i64;
    if (-rank..rank).contains(&axis) { Some(((axis + rank) % rank) as usize) } else { None }
}

/// True when every operand is ranked. Inference is deferred otherwise.
pub(crate) fn all_ranked(inputs: &[&Value]) -> bool {
    inputs.iter().all(|v| v.ty.has_rank())
}

/// The element type of the first operand.
pub(crate) fn first_datum_type(inputs: &[&Value]) -> TensilResult<DatumType> {
    inputs
        .first()
        .and_then(|v| v.ty.datum_type())
        .ok_or_else(|| format_err!("Expected a typed first operand"))
}
