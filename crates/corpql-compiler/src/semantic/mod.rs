//! Semantic analysis module
//!
//! Label normalization, the label table, and validation of result references.
//! Everything here runs before any SQL is generated.

pub mod labels;
pub mod normalize;
pub mod references;

pub use labels::{LabelInfo, LabelKind, LabelTable, Position};
pub use normalize::LabelNormalizer;
pub use references::ReferenceValidator;
