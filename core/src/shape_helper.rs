//! Per-operation shape computation.
//!
//! A shape helper computes the output dims of one operation from its
//! operands, through an `IndexExprBuilder`, and holds them until they are
//! committed to the result types.
use crate::builder::{ForAnalysis, IndexExprBuilder, Realization};
use crate::ops::ResultTypes;
use crate::types::{DatumType, RankedTensorType, TensorEncoding, Value};
use tensil_data::internal::*;

/// Output dims storage of a shape helper, one `DimsExpr` per result.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutputDims(TVec<DimsExpr>);

impl OutputDims {
    pub fn set(&mut self, output: usize, dims: DimsExpr) {
        if self.0.len() <= output {
            self.0.resize(output + 1, tvec!());
        }
        self.0[output] = dims;
    }

    pub fn get(&self, output: usize) -> &DimsExpr {
        &self.0[output]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub trait ShapeHelper {
    /// Computes the output dims. Operands must all be ranked.
    fn compute_shape<R: Realization>(
        &mut self,
        builder: &IndexExprBuilder<R>,
        operands: &[&Value],
    ) -> TensilResult<()>;

    fn outputs(&self) -> &OutputDims;

    fn output_dims(&self, output: usize) -> &DimsExpr {
        self.outputs().get(output)
    }
}

/// Merges the dims of same-rank operands: a literal seen on any operand
/// overrides the dim carried from the first one.
pub fn merge_literal_or_first(dims: &[DimsExpr]) -> DimsExpr {
    let Some((first, others)) = dims.split_first() else { return tvec!() };
    let mut merged = first.clone();
    for other in others {
        for (m, d) in merged.iter_mut().zip(other.iter()) {
            if d.is_literal() {
                trace!("merging {m} with literal {d}");
                *m = d.clone();
            }
        }
    }
    merged
}

/// Multidirectional broadcasting of the operands shapes.
#[derive(Clone, Debug, Default)]
pub struct BroadcastShapeHelper {
    outputs: OutputDims,
}

impl BroadcastShapeHelper {
    pub fn broadcast(shapes: &[DimsExpr]) -> TensilResult<DimsExpr> {
        let rank = shapes.iter().map(|s| s.len()).max().unwrap_or(0);
        let mut output: DimsExpr = tvec!();
        for i in 0..rank {
            let mut literal: Option<i64> = None;
            let mut runtime: TVec<IndexExpr> = tvec!();
            for shape in shapes {
                if i >= shape.len() {
                    continue;
                }
                match &shape[shape.len() - i - 1] {
                    IndexExpr::Literal(1) => (),
                    IndexExpr::Literal(d) => {
                        if literal.is_some_and(|prev| prev != *d) {
                            bail!(
                                "Invalid shape (broadcasting): {} is not compatible with {}",
                                d,
                                literal.unwrap_or_default()
                            )
                        }
                        literal = Some(*d)
                    }
                    other => runtime.push(other.clone()),
                }
            }
            let dim = if let Some(lit) = literal {
                lit.into()
            } else if runtime.is_empty() {
                1.into()
            } else {
                runtime.into_iter().reduce(|a, b| if a == b { a } else { a.max(b) }).unwrap_or_default()
            };
            output.push(dim);
        }
        output.reverse();
        Ok(output)
    }
}

impl ShapeHelper for BroadcastShapeHelper {
    fn compute_shape<R: Realization>(
        &mut self,
        builder: &IndexExprBuilder<R>,
        operands: &[&Value],
    ) -> TensilResult<()> {
        let shapes: TVec<DimsExpr> = operands
            .iter()
            .filter(|v| !v.is_none())
            .map(|v| builder.get_shape_as_dims(v))
            .collect();
        self.outputs.set(0, Self::broadcast(&shapes)?);
        Ok(())
    }

    fn outputs(&self) -> &OutputDims {
        &self.outputs
    }
}

/// Runs `helper` in analysis mode and commits every output it computed as
/// a ranked type with the given element type and encoding.
pub fn compute_shape_and_update_type<H: ShapeHelper>(
    helper: &mut H,
    operands: &[&Value],
    results: &mut ResultTypes,
    datum_type: DatumType,
    encoding: Option<Arc<dyn TensorEncoding>>,
) -> TensilResult<()> {
    helper.compute_shape(&IndexExprBuilder::new(ForAnalysis), operands)?;
    for output in 0..helper.outputs().len() {
        let shape = dims_to_shape(helper.output_dims(output));
        results.update_type(
            output,
            RankedTensorType::new(datum_type, &shape).with_encoding(encoding.clone()),
        );
    }
    Ok(())
}
