//! ONNX operators: verification and shape inference.
#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate log;

pub mod ops;

pub use tensil_core;

pub mod prelude {
    pub use crate::ops::array::{Concat, Split};
    pub use crate::ops::einsum::Einsum;
    pub use crate::ops::math::{Binary, BinaryOp};
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
