use crate::ops::Op;
use crate::types::ValueId;
use std::fmt;
use tensil_data::internal::*;

/// A node of the graph: an operation applied to values, producing values.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: usize,
    pub name: String,
    pub op: Box<dyn Op>,
    pub inputs: TVec<ValueId>,
    pub outputs: TVec<ValueId>,
}

impl Node {
    pub fn op(&self) -> &dyn Op {
        &*self.op
    }

    pub fn op_as<O: Op>(&self) -> Option<&O> {
        self.op().downcast_ref::<O>()
    }

    pub fn op_is<O: Op>(&self) -> bool {
        self.op_as::<O>().is_some()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{} \"{}\" {}", self.id, self.name, self.op.name())
    }
}
