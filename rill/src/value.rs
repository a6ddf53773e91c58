//! Runtime value type for the scripting language.
//!
//! The language is dynamically typed with exactly two kinds of value: a
//! 64-bit float and a text string.  Operator semantics live here so the
//! interpreter can stay a pure token dispatcher.

use std::fmt;

use crate::error::{CallError, ErrorKind};

// ── Value ─────────────────────────────────────────────────────────────────────

/// A script runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
}

/// A binary operator applied through [`Value::binary_operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Pow,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Rem => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Upper bound on the byte length of a repeated text value.  Counts past this
/// fail the operation instead of attempting the allocation.
const MAX_REPEAT_LEN: usize = 1 << 26;

impl Value {
    pub const ZERO: Value = Value::Number(0.0);

    /// Render for display: default float formatting, text verbatim.
    pub fn to_display_string(&self) -> String {
        self.to_string()
    }

    /// Render for REPL echo: text is wrapped in quote marks.
    pub fn to_quoted_string(&self) -> String {
        match self {
            Value::Number(n) => format!("{n}"),
            Value::Text(s) => format!("'{s}'"),
        }
    }

    /// Number is truthy iff non-zero; text is truthy iff non-empty.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => !s.is_empty(),
        }
    }

    /// Name of the type, as returned by `typeof()`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "text",
        }
    }

    fn from_bool(b: bool) -> Value {
        Value::Number(if b { 1.0 } else { 0.0 })
    }

    /// Apply a binary operator.
    ///
    /// `*` is overloaded: with a text operand on either side the text is
    /// repeated `max(0, floor(n))` times.  `+`, `==`, and `!=` coerce a mixed
    /// number/text pair to text before operating.  Every other operator
    /// requires two numbers.
    pub fn binary_operation(&self, rhs: &Value, op: BinaryOp) -> Result<Value, CallError> {
        if op == BinaryOp::Mul {
            return match (self, rhs) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
                (Value::Text(s), Value::Number(n)) | (Value::Number(n), Value::Text(s)) => {
                    let count = n.max(0.0) as usize;
                    match s.len().checked_mul(count) {
                        Some(total) if total <= MAX_REPEAT_LEN => {
                            Ok(Value::Text(s.repeat(count)))
                        }
                        _ => Err(CallError::new(
                            ErrorKind::InvalidParameter,
                            "text repetition result is too large",
                        )),
                    }
                }
                _ => Err(CallError::new(
                    ErrorKind::NotSupportedOperation,
                    "cannot multiply two text values",
                )),
            };
        }

        // Mixed operands: the number side is rendered as text.
        let (a, b) = match (self, rhs) {
            (Value::Number(n), Value::Text(_)) => (Value::Text(n.to_string()), rhs.clone()),
            (Value::Text(_), Value::Number(n)) => (self.clone(), Value::Text(n.to_string())),
            _ => (self.clone(), rhs.clone()),
        };

        match op {
            BinaryOp::Add => Ok(match (a, b) {
                (Value::Number(x), Value::Number(y)) => Value::Number(x + y),
                (Value::Text(x), Value::Text(y)) => Value::Text(x + &y),
                _ => unreachable!("operands coerced to a common type"),
            }),
            BinaryOp::Eq => Ok(Value::from_bool(a == b)),
            BinaryOp::Ne => Ok(Value::from_bool(a != b)),
            _ => {
                let (Value::Number(x), Value::Number(y)) = (&a, &b) else {
                    return Err(CallError::new(
                        ErrorKind::NotSupportedOperation,
                        format!("operator '{op}' requires number operands"),
                    ));
                };
                let (x, y) = (*x, *y);
                match op {
                    BinaryOp::Sub => Ok(Value::Number(x - y)),
                    BinaryOp::Div => Ok(Value::Number(x / y)),
                    BinaryOp::FloorDiv => Ok(Value::Number((x / y).floor())),
                    BinaryOp::Rem => Ok(Value::Number(x % y)),
                    BinaryOp::Pow => Ok(Value::Number(x.powf(y))),
                    BinaryOp::Lt => Ok(Value::from_bool(x < y)),
                    BinaryOp::Gt => Ok(Value::from_bool(x > y)),
                    BinaryOp::Le => Ok(Value::from_bool(x <= y)),
                    BinaryOp::Ge => Ok(Value::from_bool(x >= y)),
                    BinaryOp::And => Ok(Value::from_bool(x != 0.0 && y != 0.0)),
                    BinaryOp::Or => Ok(Value::from_bool(x != 0.0 || y != 0.0)),
                    _ => Err(CallError::new(
                        ErrorKind::UnknownOperator,
                        format!("unknown binary operator '{op}'"),
                    )),
                }
            }
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::from_bool(b)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    fn text(s: &str) -> Value {
        Value::Text(s.into())
    }

    #[test]
    fn display() {
        assert_eq!(num(42.0).to_display_string(), "42");
        assert_eq!(num(3.5).to_display_string(), "3.5");
        assert_eq!(text("hi").to_display_string(), "hi");
    }

    #[test]
    fn quoted() {
        assert_eq!(num(1.5).to_quoted_string(), "1.5");
        assert_eq!(text("hi").to_quoted_string(), "'hi'");
    }

    #[test]
    fn truthiness() {
        assert!(num(1.0).is_truthy());
        assert!(!num(0.0).is_truthy());
        assert!(text("x").is_truthy());
        assert!(!text("").is_truthy());
    }

    #[test]
    fn arithmetic() {
        let a = num(10.0);
        let b = num(3.0);
        assert_eq!(a.binary_operation(&b, BinaryOp::Add), Ok(num(13.0)));
        assert_eq!(a.binary_operation(&b, BinaryOp::Sub), Ok(num(7.0)));
        assert_eq!(a.binary_operation(&b, BinaryOp::Mul), Ok(num(30.0)));
        assert_eq!(a.binary_operation(&b, BinaryOp::FloorDiv), Ok(num(3.0)));
        assert_eq!(a.binary_operation(&b, BinaryOp::Rem), Ok(num(1.0)));
        assert_eq!(
            num(2.0).binary_operation(&num(10.0), BinaryOp::Pow),
            Ok(num(1024.0))
        );
    }

    #[test]
    fn text_concat() {
        assert_eq!(
            text("foo").binary_operation(&text("bar"), BinaryOp::Add),
            Ok(text("foobar"))
        );
    }

    #[test]
    fn mixed_add_coerces_to_text() {
        assert_eq!(
            text("n=").binary_operation(&num(3.0), BinaryOp::Add),
            Ok(text("n=3"))
        );
        assert_eq!(
            num(3.0).binary_operation(&text("!"), BinaryOp::Add),
            Ok(text("3!"))
        );
    }

    #[test]
    fn text_repeat_is_commutative() {
        assert_eq!(
            text("ab").binary_operation(&num(3.0), BinaryOp::Mul),
            Ok(text("ababab"))
        );
        assert_eq!(
            num(3.0).binary_operation(&text("ab"), BinaryOp::Mul),
            Ok(text("ababab"))
        );
    }

    #[test]
    fn text_repeat_floors_at_zero() {
        assert_eq!(
            text("ab").binary_operation(&num(-2.0), BinaryOp::Mul),
            Ok(text(""))
        );
        assert_eq!(
            text("ab").binary_operation(&num(1.9), BinaryOp::Mul),
            Ok(text("ab"))
        );
    }

    #[test]
    fn text_repeat_rejects_huge_counts() {
        // Counts that overflow the count conversion entirely.
        let err = text("ab").binary_operation(&num(1e20), BinaryOp::Mul).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidParameter);
        // Counts that fit in a usize but would exhaust memory.
        let err = text("ab").binary_operation(&num(1e15), BinaryOp::Mul).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidParameter);
    }

    #[test]
    fn text_times_text_is_an_error() {
        let err = text("a").binary_operation(&text("b"), BinaryOp::Mul).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotSupportedOperation);
    }

    #[test]
    fn equality_with_coercion() {
        assert_eq!(
            text("3.5").binary_operation(&num(3.5), BinaryOp::Eq),
            Ok(num(1.0))
        );
        assert_eq!(
            text("a").binary_operation(&text("b"), BinaryOp::Ne),
            Ok(num(1.0))
        );
    }

    #[test]
    fn ordering_requires_numbers() {
        let err = text("a").binary_operation(&text("b"), BinaryOp::Lt).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotSupportedOperation);
        let err = text("1").binary_operation(&num(2.0), BinaryOp::Lt).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotSupportedOperation);
    }

    #[test]
    fn logical_ops() {
        assert_eq!(
            num(1.0).binary_operation(&num(0.0), BinaryOp::And),
            Ok(num(0.0))
        );
        assert_eq!(
            num(1.0).binary_operation(&num(0.0), BinaryOp::Or),
            Ok(num(1.0))
        );
    }
}
