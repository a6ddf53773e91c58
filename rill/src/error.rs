//! Error taxonomy for the script runtime.
//!
//! Every failure a script can provoke is classified by [`ErrorKind`] and
//! surfaced as a [`ScriptError`] carrying the 1-based source position where it
//! was detected.  The core never panics on malformed input; the host decides
//! whether to retry, report, or abandon the run.

// ── ErrorKind ─────────────────────────────────────────────────────────────────

/// Closed classification of script failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnexpectedToken,
    UnknownToken,
    MissingToken,
    UndeclaredIdentifier,
    NotSupportedOperation,
    UnknownOperator,
    InvalidNumberOfArguments,
    InvalidDataType,
    InvalidParameter,
    InvalidNumberFormat,
    InvalidStringLiteral,
    CannotFindLabel,
    MissingEnd,
    UnmatchedEnd,
}

// ── ScriptError ───────────────────────────────────────────────────────────────

/// A located script error, the terminal result of a failed run.
///
/// `line` and `column` are 1-based for human consumption.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} (line {line}, column {column})")]
pub struct ScriptError {
    pub kind: ErrorKind,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ScriptError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, line: usize, column: usize) -> Self {
        ScriptError {
            kind,
            message: message.into(),
            line,
            column,
        }
    }
}

// ── CallError ─────────────────────────────────────────────────────────────────

/// A failure raised inside a library callable or a value operation.
///
/// Carries no location; the interpreter attaches the call site's position when
/// it converts this into a [`ScriptError`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct CallError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CallError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        CallError {
            kind,
            message: message.into(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_error_display() {
        let e = ScriptError::new(ErrorKind::MissingToken, "expected ':'", 3, 7);
        assert_eq!(e.to_string(), "expected ':' (line 3, column 7)");
    }

    #[test]
    fn call_error_display() {
        let e = CallError::new(ErrorKind::InvalidNumberOfArguments, "abs: expected 1 argument");
        assert_eq!(e.to_string(), "abs: expected 1 argument");
    }
}
