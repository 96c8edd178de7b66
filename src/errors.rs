use thiserror::Error;

/// Failures raised while parsing or running an expression.
///
/// None of these ever escape `dispatch`; evaluators log them and fall back
/// to the input text.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("{0} is not defined")]
    Reference(String),

    #[error("unknown filter `{0}`")]
    UnknownFilter(String),

    #[error("an evaluator named `{0}` is already registered")]
    DuplicateEvaluator(String),
}

pub type Result<T> = std::result::Result<T, EvalError>;
