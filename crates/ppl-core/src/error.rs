//! Error taxonomy for pipeline parsing and execution.

use datafusion::error::DataFusionError;

/// Errors raised while reading, parsing, or executing a pipeline.
///
/// The executor re-wraps command failures with the failing command's
/// variant name (`[Filter] …`) while preserving the error kind, so the
/// CLI can report both what failed and why.
#[derive(Debug, thiserror::Error)]
pub enum PplError {
    /// Parse-time error; always carries the 1-indexed cleaned-line number.
    #[error("Line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// Missing input file, empty glob, or missing include file.
    #[error("{0}")]
    NotFound(String),

    /// Missing column, variable, or join key.
    #[error("{0}")]
    Key(String),

    /// Unparseable expression, unsupported operator, bad cast target,
    /// or invalid date literal.
    #[error("{0}")]
    Value(String),

    /// Sandbox violation.
    #[error("{0}")]
    Permission(String),

    /// Semantic precondition violated at execute time.
    #[error("{0}")]
    Runtime(String),

    /// `assert` found failing rows.
    #[error("{0}")]
    Assertion(String),
}

impl PplError {
    /// Rebuild the same error kind with a transformed message.
    ///
    /// Used by the executor to prefix the failing command's variant name
    /// without collapsing the taxonomy.
    pub fn map_message(self, f: impl FnOnce(String) -> String) -> Self {
        match self {
            PplError::Syntax { line, message } => PplError::Syntax {
                line,
                message: f(message),
            },
            PplError::NotFound(m) => PplError::NotFound(f(m)),
            PplError::Key(m) => PplError::Key(f(m)),
            PplError::Value(m) => PplError::Value(f(m)),
            PplError::Permission(m) => PplError::Permission(f(m)),
            PplError::Runtime(m) => PplError::Runtime(f(m)),
            PplError::Assertion(m) => PplError::Assertion(f(m)),
        }
    }
}

impl From<DataFusionError> for PplError {
    fn from(err: DataFusionError) -> Self {
        PplError::Runtime(err.to_string())
    }
}

impl From<datafusion::arrow::error::ArrowError> for PplError {
    fn from(err: datafusion::arrow::error::ArrowError) -> Self {
        PplError::Runtime(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PplError>;
