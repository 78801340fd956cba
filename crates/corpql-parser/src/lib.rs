//! corpql Parser - JSON/YAML documents to corpql core types
//!
//! This crate converts query documents and corpus configuration files
//! into the AST and configuration structures defined in `corpql-core`.

pub mod config_parser;
pub mod error;
pub mod json_parser;
pub mod query_parser;

// Re-export main parser types
pub use config_parser::ConfigParser;
pub use error::{ParseError, Result};
pub use json_parser::JsonParser;
pub use query_parser::QueryParser;
