//! Structured diagnostics for hard type and attribute errors.
//!
//! A diagnostic travels inside an `anyhow::Error`; callers get the
//! structure back with `err.downcast_ref::<Diagnostic>()`. Deferred
//! inference never produces one.
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum DiagnosticKind {
    /// `range` bounds are both inclusive.
    AttributeOutOfRange { attribute: String, value: i64, range: (i64, i64) },
    UnexpectedRank { operand: usize, rank: usize, expected: usize },
    UnexpectedDimensionValue { operand: usize, dim: usize, value: i64, expected: i64 },
    InvalidAttribute { attribute: String, value: String, expected: String },
    InvalidLayout { operand: usize, layout: String, expected: String },
    Einsum(String),
    OpError(String),
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use DiagnosticKind::*;
        match self {
            AttributeOutOfRange { attribute, value, range } => write!(
                f,
                "attribute `{attribute}` value is {value}, accepted range is [{}, {}]",
                range.0, range.1
            ),
            UnexpectedRank { operand, rank, expected } => {
                write!(f, "operand #{operand} has rank {rank}, expected {expected}")
            }
            UnexpectedDimensionValue { operand, dim, value, expected } => write!(
                f,
                "operand #{operand} has dimension #{dim} of value {value}, expected {expected}"
            ),
            InvalidAttribute { attribute, value, expected } => {
                write!(f, "attribute `{attribute}` is {value}, expected {expected}")
            }
            InvalidLayout { operand, layout, expected } => {
                write!(f, "operand #{operand} has layout {layout}, expected {expected}")
            }
            Einsum(msg) => write!(f, "einsum: {msg}"),
            OpError(msg) => write!(f, "{msg}"),
        }
    }
}

/// A diagnostic attached to one operation.
#[derive(Clone, Debug, PartialEq, new)]
pub struct Diagnostic {
    pub op: String,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn op_error(op: impl Into<String>, msg: impl Into<String>) -> Diagnostic {
        Diagnostic::new(op.into(), DiagnosticKind::OpError(msg.into()))
    }

    pub fn with_kind(self, kind: DiagnosticKind) -> Diagnostic {
        Diagnostic { kind, ..self }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "'{}' op {}", self.op, self.kind)
    }
}

impl std::error::Error for Diagnostic {}

/// Caller-supplied factory for a diagnostic in progress. The callee fills
/// in the detail and returns it as the error.
pub type ErrorFn<'a> = &'a dyn Fn() -> Diagnostic;

/// Completes the diagnostic from `error_fn` with `kind`.
pub fn emit(error_fn: ErrorFn, kind: DiagnosticKind) -> anyhow::Error {
    anyhow::Error::new(error_fn().with_kind(kind))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn structure_survives_anyhow() {
        let error_fn = || Diagnostic::op_error("onnx.Einsum", "");
        let err = emit(&error_fn, DiagnosticKind::Einsum("bad equation".into()));
        assert_eq!(err.to_string(), "'onnx.Einsum' op einsum: bad equation");
        let diag = err.downcast_ref::<Diagnostic>().unwrap();
        assert_eq!(diag.kind, DiagnosticKind::Einsum("bad equation".into()));
    }

    #[test]
    fn messages() {
        let d = Diagnostic::new(
            "onnx.Concat".into(),
            DiagnosticKind::AttributeOutOfRange { attribute: "axis".into(), value: 3, range: (-2, 1) },
        );
        assert_eq!(d.to_string(), "'onnx.Concat' op attribute `axis` value is 3, accepted range is [-2, 1]");
    }
}
