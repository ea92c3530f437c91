use super::Realization;
use crate::types::Value;
use tensil_data::prelude::*;

/// Realization used while analysing a graph: runtime quantities cannot be
/// materialized and show up as questionmarks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ForAnalysis;

impl Realization for ForAnalysis {
    fn get_val(&self, _array: &Value, _index: usize) -> Option<Symbol> {
        None
    }

    fn get_shape_val(&self, _value: &Value, _axis: usize) -> Option<Symbol> {
        None
    }
}
