use thiserror::Error;

/// Definitional errors: the expected document itself is broken.
///
/// Constraint failures inside a well-formed template are not errors; they
/// travel as [`crate::functions::MismatchMarker`] values and end up as
/// verdicts in the comparison report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("function \"{0}\" not defined")]
    UnknownFunction(String),

    #[error("wrong number of args for {function}: want {expected} got {got}")]
    Arity {
        function: String,
        expected: String,
        got: usize,
    },

    #[error("wrong type for argument {index} of {function}: want {expected}, got {got}")]
    ArgumentType {
        function: String,
        index: usize,
        expected: &'static str,
        got: &'static str,
    },

    /// An argument token that cannot be read as the declared type.
    #[error("cannot use {value} as {expected} argument {index} of {function}")]
    Coercion {
        function: String,
        index: usize,
        expected: &'static str,
        value: String,
    },

    // Rendered text that is not a valid YAML/JSON document.
    #[error("rendered document error: {0}")]
    Document(String),

    #[error("io error: {0}")]
    Io(String),
}

impl VerifyError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        VerifyError::Syntax {
            offset,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VerifyError>;
