//! Tensor types and values of the host IR.
//!
//! Only what shape inference consumes is modelled here: element types,
//! ranked/unranked tensor types with an optional encoding attribute, and
//! values that may carry a constant integer payload.
use downcast_rs::Downcast;
use std::fmt;
use std::sync::Arc;
use tensil_data::internal::*;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DatumType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F16,
    F32,
    F64,
}

impl DatumType {
    pub fn is_integer(&self) -> bool {
        matches!(self, DatumType::I8 | DatumType::I16 | DatumType::I32 | DatumType::I64)
    }
}

impl fmt::Display for DatumType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            DatumType::Bool => "i1",
            DatumType::I8 => "i8",
            DatumType::I16 => "i16",
            DatumType::I32 => "i32",
            DatumType::I64 => "i64",
            DatumType::F16 => "f16",
            DatumType::F32 => "f32",
            DatumType::F64 => "f64",
        })
    }
}

/// Physical layout information attached to a ranked tensor type.
///
/// Dialects provide the concrete encodings. Encodings are immutable once
/// built and shared between types.
pub trait TensorEncoding: fmt::Debug + fmt::Display + Downcast + Send + Sync + 'static {
    fn same_as(&self, other: &dyn TensorEncoding) -> bool;
}

downcast_rs::impl_downcast!(TensorEncoding);

#[derive(Clone, Debug)]
pub struct RankedTensorType {
    pub datum_type: DatumType,
    /// Dimension extents, `DYNAMIC` for runtime ones.
    pub shape: TVec<i64>,
    pub encoding: Option<Arc<dyn TensorEncoding>>,
}

impl RankedTensorType {
    pub fn new(datum_type: DatumType, shape: &[i64]) -> RankedTensorType {
        RankedTensorType { datum_type, shape: shape.into(), encoding: None }
    }

    pub fn with_encoding(self, encoding: Option<Arc<dyn TensorEncoding>>) -> RankedTensorType {
        RankedTensorType { encoding, ..self }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn dim(&self, axis: usize) -> i64 {
        self.shape[axis]
    }

    pub fn is_dynamic_dim(&self, axis: usize) -> bool {
        self.shape[axis] == DYNAMIC
    }

    /// The encoding, if it is of the requested concrete type.
    pub fn encoding_as<E: TensorEncoding>(&self) -> Option<&E> {
        self.encoding.as_deref().and_then(|e| e.downcast_ref::<E>())
    }
}

impl PartialEq for RankedTensorType {
    fn eq(&self, other: &RankedTensorType) -> bool {
        self.datum_type == other.datum_type
            && self.shape == other.shape
            && match (&self.encoding, &other.encoding) {
                (None, None) => true,
                (Some(a), Some(b)) => a.same_as(&**b),
                _ => false,
            }
    }
}

impl fmt::Display for RankedTensorType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "tensor<")?;
        for d in &self.shape {
            if *d == DYNAMIC {
                write!(f, "?x")?;
            } else {
                write!(f, "{d}x")?;
            }
        }
        write!(f, "{}", self.datum_type)?;
        if let Some(enc) = &self.encoding {
            write!(f, ", {enc}")?;
        }
        write!(f, ">")
    }
}

/// Type of a value: absent (optional operand not provided), unranked, or
/// ranked.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum TensorType {
    #[default]
    None,
    Unranked(DatumType),
    Ranked(RankedTensorType),
}

impl TensorType {
    pub fn ranked(datum_type: DatumType, shape: &[i64]) -> TensorType {
        TensorType::Ranked(RankedTensorType::new(datum_type, shape))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, TensorType::None)
    }

    pub fn has_rank(&self) -> bool {
        matches!(self, TensorType::Ranked(_))
    }

    pub fn as_ranked(&self) -> Option<&RankedTensorType> {
        if let TensorType::Ranked(r) = self { Some(r) } else { None }
    }

    pub fn rank(&self) -> Option<usize> {
        self.as_ranked().map(|r| r.rank())
    }

    pub fn shape(&self) -> Option<&[i64]> {
        self.as_ranked().map(|r| &*r.shape)
    }

    pub fn datum_type(&self) -> Option<DatumType> {
        match self {
            TensorType::None => None,
            TensorType::Unranked(dt) => Some(*dt),
            TensorType::Ranked(r) => Some(r.datum_type),
        }
    }

    pub fn encoding(&self) -> Option<&Arc<dyn TensorEncoding>> {
        self.as_ranked().and_then(|r| r.encoding.as_ref())
    }
}

impl From<RankedTensorType> for TensorType {
    fn from(r: RankedTensorType) -> TensorType {
        TensorType::Ranked(r)
    }
}

impl fmt::Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TensorType::None => write!(f, "none"),
            TensorType::Unranked(dt) => write!(f, "tensor<*x{dt}>"),
            TensorType::Ranked(r) => write!(f, "{r}"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ValueId(pub usize);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// An SSA value: its type, and its content when it is a known integer
/// constant (shape tensors, split sizes...).
#[derive(Clone, Debug, PartialEq, new)]
pub struct Value {
    pub id: ValueId,
    pub ty: TensorType,
    pub konst: Option<Arc<[i64]>>,
}

impl Value {
    pub fn is_none(&self) -> bool {
        self.ty.is_none()
    }

    pub fn konst(&self) -> Option<&[i64]> {
        self.konst.as_deref()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Tag(u8);

    impl fmt::Display for Tag {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "#tag<{}>", self.0)
        }
    }

    impl TensorEncoding for Tag {
        fn same_as(&self, other: &dyn TensorEncoding) -> bool {
            other.downcast_ref::<Tag>().is_some_and(|o| o == self)
        }
    }

    #[test]
    fn display() {
        let t = TensorType::ranked(DatumType::F32, &[2, DYNAMIC, 3]);
        assert_eq!(t.to_string(), "tensor<2x?x3xf32>");
        assert_eq!(TensorType::Unranked(DatumType::I64).to_string(), "tensor<*xi64>");
        assert_eq!(ValueId(3).to_string(), "%3");
    }

    #[test]
    fn encoding_takes_part_in_equality() {
        let plain = RankedTensorType::new(DatumType::F32, &[2, 3]);
        let a = plain.clone().with_encoding(Some(Arc::new(Tag(1))));
        let b = plain.clone().with_encoding(Some(Arc::new(Tag(1))));
        let c = plain.clone().with_encoding(Some(Arc::new(Tag(2))));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, plain);
        assert_eq!(a.encoding_as::<Tag>(), Some(&Tag(1)));
        assert_eq!(a.to_string(), "tensor<2x3xf32, #tag<1>>");
    }
}
