//! corpql Core - Core types for the corpql query compiler
//!
//! This crate provides the fundamental types shared by the parser and the compiler:
//! - Query AST (units, sequences, disjunctions, constraints, result specifications)
//! - Corpus configuration (layers, attributes, physical mapping)
//! - Compiled output (SQL text, result metadata, post-process instructions)
//! - Error types

pub mod ast;
pub mod config;
pub mod error;
pub mod output;

// Re-export commonly used types
pub use ast::{Query, QueryNode};
pub use config::CorpusConfig;
pub use error::CoreError;
pub use output::{CompiledQuery, QueryMetadata};
