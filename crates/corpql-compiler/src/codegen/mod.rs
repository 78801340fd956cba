//! SQL generation
//!
//! The assembler drives compilation of the top-level nodes and delegates
//! constraints, sequences and result specifications to their compilers.

pub mod assembler;
pub mod constraint;
pub mod prefilter;
pub mod results;
pub mod sequence;
pub mod unit;

pub use assembler::QueryAssembler;
pub use constraint::{ConstraintCompiler, Fragment, Scope, Visibility};
pub use prefilter::Prefilter;
pub use results::{CompiledResults, ResultsCompiler};
pub use sequence::{Automaton, Pattern, SequenceCompiler, Symbol};
