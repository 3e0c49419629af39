use crate::diagnostic::{Diagnostic, ErrorKind};
use crate::lexer::Token;
use crate::value::Value;

/// Non-value outcome of evaluation.
///
/// Every `eval` boundary returns `Result<Value, Signal>`. Loop bodies catch
/// `Break` and `Continue`, call frames catch `Return`, and `try` blocks catch
/// `Throw`. `Fatal` is never caught and aborts the run.
///
/// The structured signals carry the diagnostic reported when they escape to
/// the top level of a malformed program (`return` outside a call frame, and
/// so on).
#[derive(Debug)]
pub enum Signal {
    Return {
        value: Value,
        unexpected: Box<Diagnostic>,
    },
    Break {
        unexpected: Box<Diagnostic>,
    },
    Continue {
        unexpected: Box<Diagnostic>,
    },
    /// A catchable throw: user `throw expr` or an interpreter-raised
    /// taxonomy error. Only the rendered message propagates; there is no
    /// first-class error object.
    Throw {
        message: String,
    },
    Fatal(Box<Diagnostic>),
}

/// Result type used at every interpreter boundary.
pub type EvalResult<T = Value> = Result<T, Signal>;

impl Signal {
    /// A catchable throw rendered from a diagnostic pointing at `token`.
    pub fn throw(kind: ErrorKind, message: impl Into<String>, token: &Token) -> Self {
        Self::Throw {
            message: Diagnostic::with_token(kind, message, token).to_string(),
        }
    }

    /// A catchable throw with no source location.
    pub fn bare_throw(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Throw {
            message: Diagnostic::new(kind, message).to_string(),
        }
    }

    /// An uncatchable failure pointing at `token`.
    pub fn fatal(kind: ErrorKind, message: impl Into<String>, token: &Token) -> Self {
        Self::Fatal(Box::new(Diagnostic::with_token(kind, message, token)))
    }

    pub fn return_value(value: Value, token: &Token) -> Self {
        Self::Return {
            value,
            unexpected: Box::new(Diagnostic::with_token(
                ErrorKind::ReturnError,
                "Did not expect return statement",
                token,
            )),
        }
    }

    pub fn break_signal(token: &Token) -> Self {
        Self::Break {
            unexpected: Box::new(Diagnostic::with_token(
                ErrorKind::BreakError,
                "Did not expect break statement",
                token,
            )),
        }
    }

    pub fn continue_signal(token: &Token) -> Self {
        Self::Continue {
            unexpected: Box::new(Diagnostic::with_token(
                ErrorKind::ContinueError,
                "Did not expect continue statement",
                token,
            )),
        }
    }

    /// The message reported when this signal escapes to the top level.
    #[must_use]
    pub fn top_level_message(&self) -> String {
        match self {
            Self::Return { unexpected, .. } | Self::Break { unexpected } | Self::Continue { unexpected } => {
                unexpected.to_string()
            }
            Self::Throw { message } => message.clone(),
            Self::Fatal(diag) => diag.to_string(),
        }
    }
}

impl From<Diagnostic> for Signal {
    fn from(diag: Diagnostic) -> Self {
        Self::Fatal(Box::new(diag))
    }
}
