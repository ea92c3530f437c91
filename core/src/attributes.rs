//! Operation attributes.
use std::collections::BTreeMap;
use std::fmt;
use tensil_data::internal::*;

#[derive(Clone, Debug, PartialEq)]
pub enum Attribute {
    Int(i64),
    Ints(TVec<i64>),
    Float(f32),
    String(String),
}

impl Attribute {
    fn type_name(&self) -> &'static str {
        match self {
            Attribute::Int(_) => "int",
            Attribute::Ints(_) => "list of ints",
            Attribute::Float(_) => "float",
            Attribute::String(_) => "string",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Attribute::Int(i) => write!(f, "{i}"),
            Attribute::Ints(is) => write!(f, "[{}]", is.iter().join(", ")),
            Attribute::Float(x) => write!(f, "{x:?}"),
            Attribute::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for Attribute {
    fn from(i: i64) -> Attribute {
        Attribute::Int(i)
    }
}

impl From<i32> for Attribute {
    fn from(i: i32) -> Attribute {
        Attribute::Int(i as i64)
    }
}

impl From<f32> for Attribute {
    fn from(x: f32) -> Attribute {
        Attribute::Float(x)
    }
}

impl From<&str> for Attribute {
    fn from(s: &str) -> Attribute {
        Attribute::String(s.to_string())
    }
}

impl From<String> for Attribute {
    fn from(s: String) -> Attribute {
        Attribute::String(s)
    }
}

impl From<&[i64]> for Attribute {
    fn from(is: &[i64]) -> Attribute {
        Attribute::Ints(is.into())
    }
}

impl<const N: usize> From<[i64; N]> for Attribute {
    fn from(is: [i64; N]) -> Attribute {
        Attribute::Ints(is[..].into())
    }
}

impl<const N: usize> From<[i32; N]> for Attribute {
    fn from(is: [i32; N]) -> Attribute {
        Attribute::Ints(is.iter().map(|&i| i as i64).collect())
    }
}

impl From<TVec<i64>> for Attribute {
    fn from(is: TVec<i64>) -> Attribute {
        Attribute::Ints(is)
    }
}

/// Typed extraction of an attribute value.
pub trait AttrType: Sized {
    fn from_attribute(attr: &Attribute) -> TensilResult<Self>;
}

impl AttrType for i64 {
    fn from_attribute(attr: &Attribute) -> TensilResult<Self> {
        match attr {
            Attribute::Int(i) => Ok(*i),
            _ => bail!("expected int, got {}", attr.type_name()),
        }
    }
}

impl AttrType for usize {
    fn from_attribute(attr: &Attribute) -> TensilResult<Self> {
        let i = i64::from_attribute(attr)?;
        usize::try_from(i).with_context(|| format!("expected a non-negative int, got {i}"))
    }
}

impl AttrType for bool {
    fn from_attribute(attr: &Attribute) -> TensilResult<Self> {
        match i64::from_attribute(attr)? {
            0 => Ok(false),
            1 => Ok(true),
            other => bail!("expected boolean (0 or 1), got {other}"),
        }
    }
}

impl AttrType for f32 {
    fn from_attribute(attr: &Attribute) -> TensilResult<Self> {
        match attr {
            Attribute::Float(x) => Ok(*x),
            _ => bail!("expected float, got {}", attr.type_name()),
        }
    }
}

impl AttrType for String {
    fn from_attribute(attr: &Attribute) -> TensilResult<Self> {
        match attr {
            Attribute::String(s) => Ok(s.clone()),
            _ => bail!("expected string, got {}", attr.type_name()),
        }
    }
}

impl AttrType for TVec<i64> {
    fn from_attribute(attr: &Attribute) -> TensilResult<Self> {
        match attr {
            Attribute::Ints(is) => Ok(is.clone()),
            _ => bail!("expected list of ints, got {}", attr.type_name()),
        }
    }
}

/// Named attributes of one operation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attributes(BTreeMap<String, Attribute>);

impl Attributes {
    pub fn with(mut self, name: impl Into<String>, attr: impl Into<Attribute>) -> Attributes {
        self.set(name, attr);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, attr: impl Into<Attribute>) {
        self.0.insert(name.into(), attr.into());
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.0.get(name)
    }

    pub fn get_attr_opt<T: AttrType>(&self, name: &str) -> TensilResult<Option<T>> {
        self.get(name)
            .map(|attr| T::from_attribute(attr).with_context(|| format!("Attribute `{name}`")))
            .transpose()
    }

    pub fn get_attr<T: AttrType>(&self, name: &str) -> TensilResult<T> {
        self.get_attr_opt(name)?.ok_or_else(|| format_err!("Required attribute `{name}` missing"))
    }

    /// A required list of ints.
    pub fn get_attr_ints(&self, name: &str) -> TensilResult<TVec<i64>> {
        self.get_attr(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.0.iter().map(|(k, v)| (&**k, v))
    }
}
