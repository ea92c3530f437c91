mod concat;
mod split;

pub use concat::{Concat, ConcatShapeHelper};
pub use split::{Split, SplitShapeHelper};
