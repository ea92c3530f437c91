//! Computation graph and the inference driver.
use crate::config::InferenceConfig;
use crate::ops::{Op, ResultTypes};
use crate::types::{DatumType, TensorType, Value, ValueId};
use tensil_data::internal::*;

mod node;

pub use node::Node;

/// A computation graph in program order.
///
/// Nodes can only consume values that already exist when they are wired,
/// so insertion order is a topological order.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub values: Vec<Value>,
    pub inputs: Vec<ValueId>,
}

impl Graph {
    fn new_value(&mut self, ty: TensorType, konst: Option<Arc<[i64]>>) -> ValueId {
        let id = ValueId(self.values.len());
        self.values.push(Value::new(id, ty, konst));
        id
    }

    /// Adds a graph input.
    pub fn add_source(&mut self, ty: TensorType) -> ValueId {
        let id = self.new_value(ty, None);
        self.inputs.push(id);
        id
    }

    /// Adds a constant 1D integer array.
    pub fn add_const(&mut self, datum_type: DatumType, values: &[i64]) -> ValueId {
        ensure_integer(datum_type);
        let ty = TensorType::ranked(datum_type, &[values.len() as i64]);
        self.new_value(ty, Some(values.into()))
    }

    /// Adds the placeholder for an optional operand that is not provided.
    pub fn add_none(&mut self) -> ValueId {
        self.new_value(TensorType::None, None)
    }

    /// Adds a node. Its results start unranked, with the element type of
    /// the first provided input.
    pub fn wire_node(
        &mut self,
        name: impl Into<String>,
        op: impl Into<Box<dyn Op>>,
        inputs: &[ValueId],
    ) -> TensilResult<TVec<ValueId>> {
        let op = op.into();
        let mut datum_type = DatumType::F32;
        for input in inputs {
            if let Some(dt) = self.value_type(*input)?.datum_type() {
                datum_type = dt;
                break;
            }
        }
        let types = tvec!(TensorType::Unranked(datum_type); op.nboutputs());
        self.wire_node_with_types(name, op, inputs, types)
    }

    /// Adds a node with explicit initial result types.
    pub fn wire_node_with_types(
        &mut self,
        name: impl Into<String>,
        op: impl Into<Box<dyn Op>>,
        inputs: &[ValueId],
        types: TVec<TensorType>,
    ) -> TensilResult<TVec<ValueId>> {
        let op = op.into();
        let name = name.into();
        ensure!(
            types.len() == op.nboutputs(),
            "{} has {} results, got {} types",
            name,
            op.nboutputs(),
            types.len()
        );
        for input in inputs {
            self.value(*input).with_context(|| format!("Wiring {name}"))?;
        }
        let outputs: TVec<ValueId> = types.into_iter().map(|ty| self.new_value(ty, None)).collect();
        let id = self.nodes.len();
        self.nodes.push(Node { id, name, op, inputs: inputs.into(), outputs: outputs.clone() });
        Ok(outputs)
    }

    pub fn value(&self, id: ValueId) -> TensilResult<&Value> {
        self.values.get(id.0).with_context(|| format!("No value {id}"))
    }

    pub fn value_type(&self, id: ValueId) -> TensilResult<&TensorType> {
        Ok(&self.value(id)?.ty)
    }

    /// Overrides the type of a value, typically a graph input after an
    /// edit. Inference has to be run again.
    pub fn set_value_type(&mut self, id: ValueId, ty: TensorType) -> TensilResult<()> {
        let value = self.values.get_mut(id.0).with_context(|| format!("No value {id}"))?;
        value.ty = ty;
        Ok(())
    }

    pub fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    pub fn node_by_name(&self, name: impl AsRef<str>) -> TensilResult<&Node> {
        let name = name.as_ref();
        self.nodes.iter().find(|n| n.name == name).with_context(|| format!("No node found for name: \"{name}\""))
    }

    fn node_values(&self, ids: &[ValueId]) -> TensilResult<TVec<Value>> {
        ids.iter().map(|id| self.value(*id).cloned()).collect()
    }

    /// Runs the canonicalization hook of one node.
    pub fn canonicalize_node(&mut self, node: usize) -> TensilResult<bool> {
        let inputs = self.node_values(&self.nodes[node].inputs)?;
        let inputs: TVec<&Value> = inputs.iter().collect();
        let changed = self.nodes[node].op.canonicalize(&inputs)?;
        if changed {
            debug!("Canonicalized {}: {:?}", self.nodes[node], self.nodes[node].op);
        }
        Ok(changed)
    }

    /// Verifies one node.
    pub fn verify_node(&self, node: usize) -> TensilResult<()> {
        let node = &self.nodes[node];
        let inputs = self.node_values(&node.inputs)?;
        let outputs = self.node_values(&node.outputs)?;
        let inputs: TVec<&Value> = inputs.iter().collect();
        let outputs: TVec<&Value> = outputs.iter().collect();
        node.op.verify(&inputs, &outputs)
    }

    /// Infers the result types of one node. Returns true if any changed.
    pub fn infer_node(&mut self, node: usize) -> TensilResult<bool> {
        let (inputs, current) = {
            let node = &self.nodes[node];
            let current: TVec<TensorType> =
                node.outputs.iter().map(|o| self.value_type(*o).cloned()).collect::<TensilResult<_>>()?;
            (self.node_values(&node.inputs)?, current)
        };
        let inputs: TVec<&Value> = inputs.iter().collect();
        let mut results = ResultTypes::new(current.clone());
        self.nodes[node].op.infer_shapes(&inputs, &mut results)?;
        let mut changed = false;
        for (ix, (ty, before)) in results.into_types().into_iter().zip(current).enumerate() {
            if ty != before {
                let id = self.nodes[node].outputs[ix];
                debug!("{} result #{ix}: {before} -> {ty}", self.nodes[node]);
                self.values[id.0].ty = ty;
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Runs inference over the whole graph until a fixed point.
    ///
    /// Returns the number of passes performed, the last one being the one
    /// that observed no change. A node whose result types changed is
    /// verified again against them.
    pub fn analyse(&mut self, config: &InferenceConfig) -> TensilResult<usize> {
        if config.canonicalize {
            for node in 0..self.nodes.len() {
                self.canonicalize_node(node)
                    .with_context(|| format!("Canonicalizing {}", self.nodes[node]))?;
            }
        }
        for pass in 0..config.max_passes {
            let mut changed = false;
            for node in 0..self.nodes.len() {
                if config.verify {
                    self.verify_node(node).with_context(|| format!("Verifying {}", self.nodes[node]))?;
                }
                let updated = self
                    .infer_node(node)
                    .with_context(|| format!("Inferring shapes on {}", self.nodes[node]))?;
                if updated && config.verify {
                    self.verify_node(node).with_context(|| format!("Verifying {}", self.nodes[node]))?;
                }
                changed |= updated;
            }
            if !changed {
                return Ok(pass + 1);
            }
        }
        warn!("No fixed point after {} passes, stopping shape inference", config.max_passes);
        Ok(config.max_passes)
    }
}

fn ensure_integer(datum_type: DatumType) {
    assert!(datum_type.is_integer(), "integer constants only, got {datum_type}");
}
