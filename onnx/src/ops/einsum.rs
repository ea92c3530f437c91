//! Einsum equations: parsing, verification and signature inference.
//!
//! Subscripts are single letters. An ellipsis stands for the leading
//! broadcast dimensions of an operand; once operand ranks are known it is
//! expanded to digit labels, right aligned across operands, so every
//! dimension of every operand ends up with a one character label.
use crate::ops::{all_ranked, first_datum_type};
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{one_of, satisfy};
use nom::combinator::{all_consuming, map, opt};
use nom::multi::{many0, separated_list1};
use nom::sequence::{delimited, preceded, terminated};
use nom::{IResult, Parser};
use nom_language::error::VerboseError;
use std::collections::HashMap;
use tensil_core::diagnostic::emit;
use tensil_core::internal::*;

type R<'i, O> = IResult<&'i str, O, VerboseError<&'i str>>;

/// Per-dimension labels of one operand, one character per dimension.
pub type Subscripts = String;

#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub shape: DimsExpr,
    pub subscripts: Subscripts,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Signature {
    pub inputs: TVec<Parameter>,
    pub output: Parameter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Axis {
    Label(char),
    Ellipsis,
}

/// Subscripts of one operand as written.
type Group = Vec<Axis>;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Equation {
    inputs: Vec<Group>,
    output: Option<Group>,
}

fn spaces(i: &str) -> R<'_, ()> {
    map(many0(one_of(" \t")), |_| ()).parse(i)
}

fn axis(i: &str) -> R<'_, Axis> {
    alt((
        map(tag("..."), |_| Axis::Ellipsis),
        map(satisfy(|c| c.is_ascii_alphabetic()), Axis::Label),
    ))
    .parse(i)
}

fn group(i: &str) -> R<'_, Group> {
    preceded(spaces, many0(terminated(axis, spaces))).parse(i)
}

fn equation(i: &str) -> R<'_, Equation> {
    map(
        (separated_list1(tag(","), group), opt(preceded(tag("->"), group))),
        |(inputs, output)| Equation { inputs, output },
    )
    .parse(i)
}

impl Equation {
    fn parse(input: &str) -> Result<Equation, String> {
        match all_consuming(delimited(spaces, equation, spaces)).parse(input) {
            Ok((_, eq)) => Ok(eq),
            Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
                let offset = e.errors.first().map(|(rest, _)| input.len() - rest.len()).unwrap_or(0);
                Err(format!("invalid equation {input:?}: unexpected input at offset {offset}"))
            }
            Err(nom::Err::Incomplete(_)) => Err(format!("incomplete equation {input:?}")),
        }
    }

    fn letters(term: &Group) -> impl Iterator<Item = char> + '_ {
        term.iter().filter_map(|a| if let Axis::Label(c) = a { Some(*c) } else { None })
    }

    fn has_ellipsis(term: &Group) -> bool {
        term.contains(&Axis::Ellipsis)
    }

    /// Syntax level checks, independent of operand shapes.
    fn check(&self, num_inputs: usize) -> Result<(), String> {
        if self.inputs.len() != num_inputs {
            return Err(format!(
                "equation has {} operand subscripts, op has {} operands",
                self.inputs.len(),
                num_inputs
            ));
        }
        for group in self.inputs.iter().chain(self.output.iter()) {
            if group.iter().filter(|a| **a == Axis::Ellipsis).count() > 1 {
                return Err("more than one ellipsis in a subscript".to_string());
            }
        }
        if let Some(output) = &self.output {
            let mut seen = vec![];
            for c in Self::letters(output) {
                if seen.contains(&c) {
                    return Err(format!("output subscript {c} appears more than once"));
                }
                if !self.inputs.iter().any(|t| Self::letters(t).any(|l| l == c)) {
                    return Err(format!("output subscript {c} does not appear in the inputs"));
                }
                seen.push(c);
            }
            if Self::has_ellipsis(output) && !self.inputs.iter().any(Self::has_ellipsis) {
                return Err("output has an ellipsis, inputs do not".to_string());
            }
        }
        Ok(())
    }
}

fn digit(ix: usize) -> char {
    char::from(b'0' + ix as u8)
}

/// Expanded subscripts of the inputs and of the output.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Labels {
    inputs: TVec<Subscripts>,
    output: Subscripts,
}

fn expand(eq: &Equation, ranks: &[usize]) -> Result<Labels, String> {
    let mut ellipsis_ranks = tvec!();
    for (ix, (term, &rank)) in eq.inputs.iter().zip(ranks).enumerate() {
        let letters = Equation::letters(term).count();
        if Equation::has_ellipsis(term) {
            if rank < letters {
                return Err(format!(
                    "operand {ix} has rank {rank}, equation expects at least {letters}"
                ));
            }
            ellipsis_ranks.push(rank - letters);
        } else {
            if rank != letters {
                return Err(format!("operand {ix} has rank {rank}, equation expects {letters}"));
            }
            ellipsis_ranks.push(0);
        }
    }
    let broadcast_rank = ellipsis_ranks.iter().copied().max().unwrap_or(0);
    if broadcast_rank > 10 {
        return Err(format!("ellipsis covers {broadcast_rank} dimensions, at most 10 are supported"));
    }
    let ellipsis = |rank: usize| -> String { (broadcast_rank - rank..broadcast_rank).map(digit).collect() };
    let render = |term: &Group, rank: usize| -> String {
        term.iter()
            .map(|a| match a {
                Axis::Label(c) => c.to_string(),
                Axis::Ellipsis => ellipsis(rank),
            })
            .collect()
    };
    let inputs: TVec<Subscripts> =
        eq.inputs.iter().zip(&ellipsis_ranks).map(|(t, &r)| render(t, r)).collect();
    let output = match &eq.output {
        Some(term) => render(term, broadcast_rank),
        None => {
            let mut counts = HashMap::<char, usize>::new();
            for c in eq.inputs.iter().flat_map(Equation::letters) {
                *counts.entry(c).or_default() += 1;
            }
            let letters = counts.into_iter().filter(|(_, n)| *n == 1).map(|(c, _)| c).sorted();
            ellipsis(broadcast_rank).chars().chain(letters).collect()
        }
    };
    Ok(Labels { inputs, output })
}

/// Checks that every label has compatible extents: equal, 1, or unknown.
fn check_extents(labels: &Labels, shapes: &[&[i64]]) -> Result<(), String> {
    let mut extents = HashMap::<char, i64>::new();
    for (ix, (subscripts, shape)) in labels.inputs.iter().zip(shapes).enumerate() {
        for (dim, (label, &extent)) in subscripts.chars().zip(shape.iter()).enumerate() {
            if extent == DYNAMIC || extent == 1 {
                continue;
            }
            match extents.get(&label) {
                Some(&seen) if seen != extent => {
                    return Err(format!(
                        "operand {ix} dimension {dim} ({label}) is {extent}, incompatible with {seen}"
                    ));
                }
                _ => {
                    extents.insert(label, extent);
                }
            }
        }
    }
    Ok(())
}

fn parse_and_check(equation: &str, num_inputs: usize, error_fn: ErrorFn) -> TensilResult<Equation> {
    let eq = Equation::parse(equation).map_err(|msg| emit(error_fn, DiagnosticKind::Einsum(msg)))?;
    eq.check(num_inputs).map_err(|msg| emit(error_fn, DiagnosticKind::Einsum(msg)))?;
    Ok(eq)
}

/// Checks the equation syntax against the number of operands.
pub fn verify_equation(equation: &str, num_inputs: usize, error_fn: ErrorFn) -> TensilResult<()> {
    parse_and_check(equation, num_inputs, error_fn).map(|_| ())
}

/// Checks operand ranks against the equation, and the compatibility of
/// same-labelled dimensions. Succeeds without checking anything while an
/// operand is unranked.
pub fn verify_shapes(equation: &str, operands: &[&Value], error_fn: ErrorFn) -> TensilResult<()> {
    if !all_ranked(operands) {
        return Ok(());
    }
    let eq = parse_and_check(equation, operands.len(), error_fn)?;
    let shapes: TVec<&[i64]> = operands.iter().map(|v| v.ty.shape().unwrap_or_default()).collect();
    let ranks: TVec<usize> = shapes.iter().map(|s| s.len()).collect();
    let labels = expand(&eq, &ranks).map_err(|msg| emit(error_fn, DiagnosticKind::Einsum(msg)))?;
    check_extents(&labels, &shapes).map_err(|msg| emit(error_fn, DiagnosticKind::Einsum(msg)))
}

fn label_extent(label: char, inputs: &[Parameter]) -> IndexExpr {
    let mut runtime = None;
    for p in inputs {
        for (ix, c) in p.subscripts.chars().enumerate() {
            if c != label {
                continue;
            }
            match p.shape[ix].literal() {
                Some(1) => (),
                Some(_) => return p.shape[ix].clone(),
                None if runtime.is_none() => runtime = Some(p.shape[ix].clone()),
                None => (),
            }
        }
    }
    runtime.unwrap_or(IndexExpr::Literal(1))
}

/// Labels and dims of every operand, and of the output. Operands must all
/// be ranked.
pub fn infer_signature<R: Realization>(
    builder: &IndexExprBuilder<R>,
    equation: &str,
    operands: &[&Value],
    error_fn: ErrorFn,
) -> TensilResult<Signature> {
    let eq = parse_and_check(equation, operands.len(), error_fn)?;
    let ranks: TVec<usize> = operands.iter().map(|v| builder.shaped_type_rank(v)).collect();
    let labels = expand(&eq, &ranks).map_err(|msg| emit(error_fn, DiagnosticKind::Einsum(msg)))?;
    let shapes: TVec<&[i64]> = operands.iter().map(|v| v.ty.shape().unwrap_or_default()).collect();
    check_extents(&labels, &shapes).map_err(|msg| emit(error_fn, DiagnosticKind::Einsum(msg)))?;
    let inputs: TVec<Parameter> = operands
        .iter()
        .zip(labels.inputs)
        .map(|(v, subscripts)| Parameter { shape: builder.get_shape_as_dims(v), subscripts })
        .collect();
    let shape = labels.output.chars().map(|label| label_extent(label, &inputs)).collect();
    trace!("einsum {equation:?}: output {} {}", labels.output, DimsDisplay(&shape));
    Ok(Signature { inputs, output: Parameter { shape, subscripts: labels.output } })
}

pub fn infer_output_shape<R: Realization>(
    builder: &IndexExprBuilder<R>,
    equation: &str,
    operands: &[&Value],
    error_fn: ErrorFn,
) -> TensilResult<DimsExpr> {
    Ok(infer_signature(builder, equation, operands, error_fn)?.output.shape)
}

struct DimsDisplay<'a>(&'a DimsExpr);

impl fmt::Display for DimsDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}]", self.0.iter().join(", "))
    }
}

#[derive(Debug, Clone, new, PartialEq, Eq, Hash)]
pub struct Einsum {
    pub equation: String,
}

impl Einsum {
    pub fn from_attributes(attrs: &Attributes) -> TensilResult<Einsum> {
        Ok(Einsum::new(attrs.get_attr("equation")?))
    }

    fn error_fn(&self) -> impl Fn() -> Diagnostic + '_ {
        move || Diagnostic::op_error(self.name(), "")
    }
}

impl Op for Einsum {
    fn name(&self) -> Cow<'_, str> {
        "onnx.Einsum".into()
    }

    fn verify(&self, inputs: &[&Value], _outputs: &[&Value]) -> TensilResult<()> {
        let error_fn = self.error_fn();
        verify_equation(&self.equation, inputs.len(), &error_fn)?;
        verify_shapes(&self.equation, inputs, &error_fn)
    }

    fn infer_shapes(&self, inputs: &[&Value], outputs: &mut ResultTypes) -> TensilResult<()> {
        if !all_ranked(inputs) {
            debug!("{}: operands not ranked yet", self.name());
            return Ok(());
        }
        let dt = first_datum_type(inputs)?;
        let mut helper = EinsumShapeHelper::new(self);
        compute_shape_and_update_type(&mut helper, inputs, outputs, dt, None)
    }
}

#[derive(Debug, Clone)]
pub struct EinsumShapeHelper<'a> {
    op: &'a Einsum,
    outputs: OutputDims,
}

impl<'a> EinsumShapeHelper<'a> {
    pub fn new(op: &'a Einsum) -> EinsumShapeHelper<'a> {
        EinsumShapeHelper { op, outputs: OutputDims::default() }
    }
}

impl ShapeHelper for EinsumShapeHelper<'_> {
    fn compute_shape<R: Realization>(
        &mut self,
        builder: &IndexExprBuilder<R>,
        operands: &[&Value],
    ) -> TensilResult<()> {
        let error_fn = self.op.error_fn();
        let shape = infer_output_shape(builder, &self.op.equation, operands, &error_fn)?;
        self.outputs.set(0, shape);
        Ok(())
    }

    fn outputs(&self) -> &OutputDims {
        &self.outputs
    }
}
