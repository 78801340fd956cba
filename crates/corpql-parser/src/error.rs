//! Parser error types

use thiserror::Error;

/// Parser error
#[derive(Error, Debug)]
pub enum ParseError {
    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// I/O error while reading a document
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Missing required field
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// Invalid field value
    #[error("Invalid value for field '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Invalid comparator or logical operator
    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    /// Type mismatch
    #[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    /// Node object with an unrecognised key
    #[error("Unknown node type '{kind}' in {context}")]
    UnknownNode { kind: String, context: String },

    /// Generic parse error
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Result type for parser operations
pub type Result<T> = std::result::Result<T, ParseError>;
