//! Compiler error types

use corpql_core::CoreError;
use thiserror::Error;

/// Error class, for callers that only need to know what went wrong in broad terms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unresolved layer, attribute or label
    Reference,
    /// Operator applied to an incompatible value kind
    Type,
    /// Ill-formed construct (bad regex position, bad date, unquantified sub-unit)
    Syntax,
    /// Disallowed function or aggregate
    NotImplemented,
    /// Input that is well-typed but cannot be compiled as a whole
    Structural,
}

/// Compiler error
#[derive(Error, Debug)]
pub enum CompileError {
    /// Unresolved label, layer or attribute
    #[error("Reference error: {0}")]
    ReferenceError(String),

    /// Type error
    #[error("Type error: {0}")]
    TypeError(String),

    /// Syntax error
    #[error("Syntax error: {0}")]
    SyntaxError(String),

    /// Unsupported function or feature
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Structurally invalid query
    #[error("Structural error: {0}")]
    Structural(String),

    /// Error from the core model
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::ReferenceError(_) => ErrorKind::Reference,
            CompileError::TypeError(_) => ErrorKind::Type,
            CompileError::SyntaxError(_) => ErrorKind::Syntax,
            CompileError::NotImplemented(_) => ErrorKind::NotImplemented,
            CompileError::Structural(_) => ErrorKind::Structural,
            CompileError::Core(CoreError::UnknownLayer(_))
            | CompileError::Core(CoreError::UnknownAttribute { .. }) => ErrorKind::Reference,
            CompileError::Core(CoreError::TypeError(_)) => ErrorKind::Type,
            CompileError::Core(CoreError::InvalidValue(_)) => ErrorKind::Syntax,
        }
    }
}

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_classify_as_references() {
        let err: CompileError = CoreError::UnknownLayer("Phrase".into()).into();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert_eq!(err.to_string(), "Unknown layer: Phrase");
    }
}
