//! Physical data layouts of the accelerator tensors.
//!
//! The layout is carried as a `ZTensorEncoding` attribute on ranked tensor
//! types. Its textual form is `<{dataLayout = "NAME"}>`.
use nom::branch::alt;
use nom::bytes::complete::{is_not, tag, take_till, take_while1};
use nom::character::complete::one_of;
use nom::combinator::{all_consuming, map};
use nom::multi::{many0, separated_list0};
use nom::sequence::{delimited, separated_pair};
use nom::{IResult, Parser};
use nom_language::error::VerboseError;
use std::fmt;
use std::str::FromStr;
use tensil_core::internal::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum DataLayout {
    #[default]
    Undefined,
    _1D,
    _2D,
    _2DS,
    _3D,
    _3DS,
    _4D,
    _4DS,
    NCHW,
    NHWC,
    HWCK,
    FICO,
    ZRH,
    BFICO,
    BZRH,
}

use DataLayout::*;

impl DataLayout {
    /// Every layout but `Undefined`.
    pub const ALL: [DataLayout; 14] =
        [_1D, _2D, _2DS, _3D, _3DS, _4D, _4DS, NCHW, NHWC, HWCK, FICO, ZRH, BFICO, BZRH];

    /// Canonical name. None for `Undefined`.
    pub fn name(&self) -> Option<&'static str> {
        Some(match self {
            Undefined => return None,
            _1D => "1D",
            _2D => "2D",
            _2DS => "2DS",
            _3D => "3D",
            _3DS => "3DS",
            _4D => "4D",
            _4DS => "4DS",
            NCHW => "NCHW",
            NHWC => "NHWC",
            HWCK => "HWCK",
            FICO => "FICO",
            ZRH => "ZRH",
            BFICO => "BFICO",
            BZRH => "BZRH",
        })
    }

    /// Layout a tensor of the given rank gets when none is requested.
    pub fn by_rank(rank: usize) -> TensilResult<DataLayout> {
        Ok(match rank {
            1 => _1D,
            2 => _2D,
            3 => _3D,
            4 => NHWC,
            _ => bail!("No default data layout for rank {rank}"),
        })
    }

    /// Rank of the tensors this layout is designed for, if fixed.
    pub fn rank(&self) -> Option<usize> {
        match self {
            Undefined => None,
            _1D => Some(1),
            _2D | _2DS => Some(2),
            _3D | _3DS => Some(3),
            _4D | _4DS | NCHW | NHWC | HWCK => Some(4),
            FICO | ZRH | BFICO | BZRH => None,
        }
    }

    pub fn is_nhwc(&self) -> bool {
        *self == NHWC
    }

    pub fn is_defined(&self) -> bool {
        *self != Undefined
    }
}

impl FromStr for DataLayout {
    type Err = tensil_core::tensil_data::anyhow::Error;

    fn from_str(s: &str) -> TensilResult<DataLayout> {
        DataLayout::ALL
            .iter()
            .copied()
            .find(|l| l.name().is_some_and(|n| n.eq_ignore_ascii_case(s)))
            .ok_or_else(|| format_err!("unexpected data layout: {s}"))
    }
}

impl fmt::Display for DataLayout {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name().unwrap_or("UNDEFINED"))
    }
}

/// Layout attribute of an accelerator tensor type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, new)]
pub struct ZTensorEncoding {
    pub data_layout: DataLayout,
}

impl ZTensorEncoding {
    /// Shared encoding for `layout`.
    pub fn arc(layout: DataLayout) -> Arc<dyn TensorEncoding> {
        Arc::new(ZTensorEncoding::new(layout))
    }

    /// Parses the attribute body, `<{dataLayout = "NAME"}>`.
    pub fn parse(input: &str) -> TensilResult<ZTensorEncoding> {
        let entries = match all_consuming(dictionary).parse(input) {
            Ok((_, entries)) => entries,
            Err(e) => bail!("Failed to parse {:?}, {:?}", input, e),
        };
        let mut data_layout = None;
        for (key, value) in entries {
            if key != "dataLayout" {
                bail!("unexpected key: {key}");
            }
            let name = match value {
                Token::Str(name) => name,
                Token::Bare(token) => bail!("expected a string value for data layout, got {token}"),
            };
            ensure!(data_layout.is_none(), "duplicate key: {key}");
            data_layout = Some(name.parse::<DataLayout>()?);
        }
        let data_layout = data_layout.context("missing key: dataLayout")?;
        Ok(ZTensorEncoding { data_layout })
    }

    /// Prints the attribute body. Printing an undefined layout is a bug.
    pub fn print(&self) -> String {
        match self.data_layout.name() {
            Some(name) => format!("<{{dataLayout = \"{name}\"}}>"),
            None => unreachable!("Unexpected data layout"),
        }
    }
}

impl fmt::Display for ZTensorEncoding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#zhigh.encoding{}", self.print())
    }
}

impl TensorEncoding for ZTensorEncoding {
    fn same_as(&self, other: &dyn TensorEncoding) -> bool {
        other.downcast_ref::<ZTensorEncoding>().is_some_and(|o| o == self)
    }
}

/// Layout of a tensor type, `Undefined` when it carries no layout.
pub fn get_ztensor_layout(ty: &TensorType) -> DataLayout {
    ty.as_ranked()
        .and_then(|r| r.encoding_as::<ZTensorEncoding>())
        .map(|e| e.data_layout)
        .unwrap_or(Undefined)
}

type R<'i, O> = IResult<&'i str, O, VerboseError<&'i str>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Token<'i> {
    Str(&'i str),
    Bare(&'i str),
}

fn spaces(i: &str) -> R<'_, ()> {
    map(many0(one_of(" \t\n\r")), |_| ()).parse(i)
}

fn stag<'i>(t: &'static str) -> impl Parser<&'i str, Output = &'i str, Error = VerboseError<&'i str>> {
    delimited(spaces, tag(t), spaces)
}

fn key(i: &str) -> R<'_, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_').parse(i)
}

fn value(i: &str) -> R<'_, Token<'_>> {
    alt((
        map(delimited(tag("\""), take_till(|c: char| c == '"'), tag("\"")), Token::Str),
        map(is_not(",}> \t\n\r"), Token::Bare),
    ))
    .parse(i)
}

fn dictionary(i: &str) -> R<'_, Vec<(&str, Token<'_>)>> {
    delimited(
        (stag("<"), stag("{")),
        separated_list0(stag(","), separated_pair(key, stag("="), value)),
        (stag("}"), stag(">")),
    )
    .parse(i)
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_is_case_insensitive() {
        let enc = ZTensorEncoding::parse("<{dataLayout = \"nhwc\"}>").unwrap();
        assert_eq!(enc.data_layout, NHWC);
        assert_eq!(enc.print(), "<{dataLayout = \"NHWC\"}>");
        let enc = ZTensorEncoding::parse(" < { dataLayout=\"3ds\" } > ").unwrap();
        assert_eq!(enc.data_layout, _3DS);
    }

    #[test]
    fn parse_errors_name_the_token() {
        let err = ZTensorEncoding::parse("<{layout = \"NHWC\"}>").unwrap_err();
        assert_eq!(err.to_string(), "unexpected key: layout");
        let err = ZTensorEncoding::parse("<{dataLayout = 4}>").unwrap_err();
        assert_eq!(err.to_string(), "expected a string value for data layout, got 4");
        let err = ZTensorEncoding::parse("<{dataLayout = \"NWHC\"}>").unwrap_err();
        assert_eq!(err.to_string(), "unexpected data layout: NWHC");
        let err = ZTensorEncoding::parse("<{dataLayout = \"NHWC\", dataLayout = \"2D\"}>").unwrap_err();
        assert_eq!(err.to_string(), "duplicate key: dataLayout");
        assert!(ZTensorEncoding::parse("<{}>").is_err());
        assert!(ZTensorEncoding::parse("{dataLayout = \"NHWC\"}").is_err());
    }

    #[test]
    #[should_panic]
    fn printing_undefined_is_a_bug() {
        ZTensorEncoding::new(Undefined).print();
    }

    #[test]
    fn defaults_by_rank() {
        assert_eq!(DataLayout::by_rank(1).unwrap(), _1D);
        assert_eq!(DataLayout::by_rank(3).unwrap(), _3D);
        assert!(DataLayout::by_rank(4).unwrap().is_nhwc());
        assert!(DataLayout::by_rank(5).is_err());
    }

    #[test]
    fn layout_of_types() {
        let plain = RankedTensorType::new(DatumType::F32, &[2]);
        assert_eq!(get_ztensor_layout(&plain.clone().into()), Undefined);
        let enc = plain.with_encoding(Some(ZTensorEncoding::arc(_1D)));
        assert_eq!(get_ztensor_layout(&enc.into()), _1D);
        assert_eq!(get_ztensor_layout(&TensorType::None), Undefined);
    }

    proptest! {
        #[test]
        fn round_trip(ix in 0usize..14, lower in any::<bool>()) {
            let layout = DataLayout::ALL[ix];
            let canonical = format!("<{{dataLayout = \"{layout}\"}}>");
            let text = if lower { canonical.replace(&layout.to_string(), &layout.to_string().to_lowercase()) } else { canonical.clone() };
            let parsed = ZTensorEncoding::parse(&text).unwrap();
            prop_assert_eq!(parsed.data_layout, layout);
            prop_assert_eq!(parsed.print(), canonical);
        }
    }
}
