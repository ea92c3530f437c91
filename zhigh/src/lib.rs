//! # Tensil zHigh
//!
//! Shape and layout inference for the operations of the zHigh accelerator
//! dialect. Tensors of this dialect carry their physical layout as a
//! `ZTensorEncoding` on their type; the operations here verify layout
//! combinations and propagate (or fix) the layout of their results.
//!
//! ```
//! use tensil_zhigh::prelude::*;
//!
//! let mut graph = Graph::default();
//! let x = graph.add_source(TensorType::ranked(DatumType::F32, &[1, 3, 8, 8]));
//! let stick = graph.wire_node("stick", Stick::new(None), &[x]).unwrap();
//! graph.analyse(&InferenceConfig::default()).unwrap();
//! let ty = graph.value_type(stick[0]).unwrap();
//! assert_eq!(ty.shape().unwrap(), &[1, 8, 8, 3]);
//! assert_eq!(get_ztensor_layout(ty), DataLayout::NHWC);
//! ```
#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate log;

pub mod layout;
pub mod ops;
pub mod traits;

pub use tensil_core;

pub mod prelude {
    pub use crate::layout::{get_ztensor_layout, DataLayout, ZTensorEncoding};
    pub use crate::ops::conv::{AvgPool2d, Conv2d, MaxPool2d, PaddingType};
    pub use crate::ops::element_wise::{ElementWise, ElementWiseKind, MeanReduce2d};
    pub use crate::ops::matmul::MatMul;
    pub use crate::ops::rnn::{Gru, Lstm};
    pub use crate::ops::stick::{Stick, StickForGru, StickForLstm, Unstick};
    pub use crate::ops::aux_split_result_types;
    pub use tensil_core::prelude::*;
}

pub mod internal {
    pub use crate::prelude::*;
    pub use tensil_core::internal::*;
}

#[cfg(test)]
#[allow(dead_code)]
fn setup_test_logger() {
    let _ = env_logger::Builder::from_env("TENSIL_LOG").try_init();
}
