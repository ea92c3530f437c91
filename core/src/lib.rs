//! # Tensil core
//!
//! Shape and layout inference for tensor computation graphs.
//!
//! This crate holds what every dialect shares: the (minimal) host IR the
//! inference works on, the index expression builder and its two
//! realizations, the shape helper framework, the `Op` contract and the
//! graph driver that runs canonicalization, verification and inference in
//! program order.
//!
//! ```
//! use tensil_core::prelude::*;
//!
//! let mut graph = Graph::default();
//! let x = graph.add_source(TensorType::ranked(DatumType::F32, &[2, DYNAMIC]));
//! assert_eq!(graph.value_type(x).unwrap().rank(), Some(2));
//! ```

#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate log;

pub extern crate tensil_data;

pub mod attributes;
pub mod builder;
pub mod config;
pub mod diagnostic;
pub mod model;
pub mod ops;
pub mod shape_helper;
pub mod types;

pub mod prelude {
    pub use crate::attributes::{AttrType, Attribute, Attributes};
    pub use crate::builder::{ForAnalysis, ForCodegen, IndexExprBuilder};
    pub use crate::config::InferenceConfig;
    pub use crate::diagnostic::{Diagnostic, DiagnosticKind, ErrorFn};
    pub use crate::model::{Graph, Node};
    pub use crate::ops::{Op, ResultTypes};
    pub use crate::types::{DatumType, RankedTensorType, TensorEncoding, TensorType, Value, ValueId};
    pub use tensil_data::prelude::*;
}

pub mod internal {
    pub use crate::builder::{Emitter, Instr, Realization};
    pub use crate::ops::check_input_arity;
    pub use crate::prelude::*;
    pub use crate::shape_helper::{
        compute_shape_and_update_type, merge_literal_or_first, BroadcastShapeHelper, OutputDims,
        ShapeHelper,
    };
    pub use downcast_rs as tensil_downcast_rs;
    pub use dyn_clone;
    pub use tensil_data::internal::*;
}

#[cfg(test)]
#[allow(dead_code)]
fn setup_test_logger() {
    let _ = env_logger::Builder::from_env("TENSIL_LOG").try_init();
}
