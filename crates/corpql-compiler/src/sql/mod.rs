//! SQL fragment builder
//!
//! Statements are assembled from structured parts and rendered once, either
//! compact (single line) or pretty (one clause per line).

pub mod builder;
pub mod joins;
pub mod literal;

pub use builder::{Cte, CteBody, Search, SelectBuilder, Statement};
pub use joins::{JoinEntry, JoinKey, JoinKind, Joins};
pub use literal::{number_literal, quote_literal};
