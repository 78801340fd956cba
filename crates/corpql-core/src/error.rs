//! Error types for corpql Core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Unknown layer: {0}")]
    UnknownLayer(String),

    #[error("Unknown attribute '{attribute}' on layer {layer}")]
    UnknownAttribute { layer: String, attribute: String },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Type error: {0}")]
    TypeError(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_attribute_message() {
        let err = CoreError::UnknownAttribute {
            layer: "Token".to_string(),
            attribute: "gloss".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown attribute 'gloss' on layer Token");
    }
}
