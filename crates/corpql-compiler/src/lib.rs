//! corpql Compiler - query tree to SQL compiler
//!
//! This crate compiles a corpql query against a corpus configuration into a
//! single `WITH RECURSIVE` statement plus the metadata needed to read its rows.

pub mod codegen;
pub mod compiler;
pub mod context;
pub mod error;
pub mod semantic;
pub mod sql;

// Re-export main types
pub use compiler::{Compiler, CompilerOptions};
pub use error::{CompileError, ErrorKind, Result};

// Re-export codegen types
pub use codegen::{Automaton, ConstraintCompiler, Pattern, Prefilter, QueryAssembler, Symbol};

// Re-export semantic types
pub use semantic::{LabelNormalizer, LabelTable, ReferenceValidator};
