//! Abstract Syntax Tree (AST) definitions for corpql
//!
//! This module contains the node definitions for:
//! - Units, sequences, disjunctions and set objects
//! - Constraints, constraint groups and time constraints
//! - Operators
//! - Result specifications

pub mod constraint;
pub mod operator;
pub mod results;
pub mod unit;

pub use constraint::{
    Constraint, ConstraintItem, Constraints, Edge, LogicalOperator, Modifiers, Quantor,
    Reference, TimeAnchor, TimeConstraint,
};
pub use operator::{MathOperator, Operator};
pub use results::{
    AnalysisFunction, AnalysisResult, CollocationResult, FilterSpec, PlainResult, ResultSpec,
    Window,
};
pub use unit::{
    Disjunction, Query, QueryNode, Repetition, Sequence, SequenceMember, SetObject, Unit,
};
