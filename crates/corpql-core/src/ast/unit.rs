//! Unit, sequence and query AST nodes

use super::constraint::{Constraint, ConstraintItem, Constraints, Quantor, TimeConstraint};
use super::results::ResultSpec;
use serde::{Deserialize, Serialize};

/// One occurrence of a layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Layer name as declared in the corpus configuration
    pub layer: String,

    /// Query-scoped name of this occurrence
    pub label: Option<String>,

    /// Label of the enclosing unit
    pub part_of: Option<String>,

    /// EXISTS / NOT EXISTS quantifier
    pub quantor: Option<Quantor>,

    /// Constraints on this occurrence
    #[serde(default)]
    pub constraints: Vec<ConstraintItem>,
}

impl Unit {
    /// Create a new unconstrained unit of a layer
    pub fn new(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            label: None,
            part_of: None,
            quantor: None,
            constraints: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn part_of(mut self, label: impl Into<String>) -> Self {
        self.part_of = Some(label.into());
        self
    }

    pub fn with_quantor(mut self, quantor: Quantor) -> Self {
        self.quantor = Some(quantor);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(ConstraintItem::Constraint(constraint));
        self
    }

    pub fn with_group(mut self, group: Constraints) -> Self {
        self.constraints.push(ConstraintItem::Constraints(group));
        self
    }

    pub fn with_time_constraint(mut self, constraint: TimeConstraint) -> Self {
        self.constraints.push(ConstraintItem::Time(constraint));
        self
    }

    pub fn with_item(mut self, item: ConstraintItem) -> Self {
        self.constraints.push(item);
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Total number of constraint nodes under this unit
    pub fn nested_constraint_count(&self) -> usize {
        self.constraints.iter().map(ConstraintItem::nested_count).sum()
    }
}

/// Repetition range of a sequence (`max = None` is unbounded)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repetition {
    pub min: u32,
    pub max: Option<u32>,
}

impl Repetition {
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    pub fn once() -> Self {
        Self {
            min: 1,
            max: Some(1),
        }
    }

    pub fn is_once(&self) -> bool {
        self.min == 1 && self.max == Some(1)
    }

    pub fn is_bounded(&self) -> bool {
        self.max.is_some()
    }

    pub fn is_optional(&self) -> bool {
        self.min == 0
    }
}

impl Default for Repetition {
    fn default() -> Self {
        Self::once()
    }
}

/// Member of a sequence or disjunction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SequenceMember {
    Unit(Unit),
    Sequence(Sequence),
    Disjunction(Disjunction),
}

impl SequenceMember {
    pub fn label(&self) -> Option<&str> {
        match self {
            SequenceMember::Unit(unit) => unit.label(),
            SequenceMember::Sequence(sequence) => sequence.label.as_deref(),
            SequenceMember::Disjunction(disjunction) => disjunction.label.as_deref(),
        }
    }

    /// Returns true if this member can match zero tokens
    pub fn is_optional(&self) -> bool {
        match self {
            SequenceMember::Unit(_) => false,
            SequenceMember::Sequence(sequence) => {
                sequence.repetition.is_optional()
                    || sequence.members.iter().all(SequenceMember::is_optional)
            }
            SequenceMember::Disjunction(disjunction) => {
                disjunction.members.iter().any(SequenceMember::is_optional)
            }
        }
    }

    /// Smallest number of tokens this member can match
    pub fn min_width(&self) -> usize {
        match self {
            SequenceMember::Unit(_) => 1,
            SequenceMember::Sequence(sequence) => sequence.min_width(),
            SequenceMember::Disjunction(disjunction) => disjunction
                .members
                .iter()
                .map(SequenceMember::min_width)
                .min()
                .unwrap_or(0),
        }
    }
}

/// Ordered members with a repetition range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub label: Option<String>,
    pub part_of: Option<String>,
    pub members: Vec<SequenceMember>,
    #[serde(default)]
    pub repetition: Repetition,
}

impl Sequence {
    pub fn new(members: Vec<SequenceMember>) -> Self {
        Self {
            label: None,
            part_of: None,
            members,
            repetition: Repetition::once(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn part_of(mut self, label: impl Into<String>) -> Self {
        self.part_of = Some(label.into());
        self
    }

    pub fn with_repetition(mut self, min: u32, max: Option<u32>) -> Self {
        self.repetition = Repetition::new(min, max);
        self
    }

    /// Returns true if every member is a plain unit
    pub fn is_simple(&self) -> bool {
        self.members
            .iter()
            .all(|member| matches!(member, SequenceMember::Unit(_)))
    }

    /// Smallest number of tokens one match of this sequence spans
    pub fn min_width(&self) -> usize {
        let once: usize = self.members.iter().map(SequenceMember::min_width).sum();
        once * self.repetition.min as usize
    }
}

/// OR of members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disjunction {
    pub label: Option<String>,
    pub members: Vec<SequenceMember>,
}

impl Disjunction {
    pub fn new(members: Vec<SequenceMember>) -> Self {
        Self {
            label: None,
            members,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Every occurrence of a unit satisfying its constraints, collected as an array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetObject {
    pub label: String,
    pub unit: Unit,
}

/// Top-level query node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryNode {
    Unit(Unit),
    Sequence(Sequence),
    Disjunction(Disjunction),
    Set(SetObject),
    Constraint(Constraint),
    Constraints(Constraints),
    TimeConstraint(TimeConstraint),
}

/// A complete query: top-level nodes plus requested result shapes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub nodes: Vec<QueryNode>,
    #[serde(default)]
    pub results: Vec<ResultSpec>,
}

impl Query {
    pub fn new(nodes: Vec<QueryNode>) -> Self {
        Self {
            nodes,
            results: Vec::new(),
        }
    }

    pub fn with_result(mut self, result: ResultSpec) -> Self {
        self.results.push(result);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> SequenceMember {
        SequenceMember::Unit(Unit::new("Token"))
    }

    #[test]
    fn test_repetition_flags() {
        assert!(Repetition::once().is_once());
        assert!(Repetition::new(0, None).is_optional());
        assert!(!Repetition::new(0, None).is_bounded());
    }

    #[test]
    fn test_member_optional_and_width() {
        let star = SequenceMember::Sequence(Sequence::new(vec![token()]).with_repetition(0, None));
        assert!(star.is_optional());
        assert_eq!(star.min_width(), 0);

        let pair = SequenceMember::Sequence(
            Sequence::new(vec![token(), token()]).with_repetition(2, Some(3)),
        );
        assert!(!pair.is_optional());
        assert_eq!(pair.min_width(), 4);

        let alternative = SequenceMember::Disjunction(Disjunction::new(vec![token(), star]));
        assert!(alternative.is_optional());
    }

    #[test]
    fn test_simple_sequence() {
        let simple = Sequence::new(vec![token(), token()]);
        assert!(simple.is_simple());
        let nested = Sequence::new(vec![
            token(),
            SequenceMember::Disjunction(Disjunction::new(vec![token()])),
        ]);
        assert!(!nested.is_simple());
    }
}
