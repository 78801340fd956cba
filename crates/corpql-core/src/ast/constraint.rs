//! Constraint AST nodes

use super::operator::{MathOperator, Operator};
use super::unit::Unit;
use serde::{Deserialize, Serialize};

/// One side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reference {
    /// Literal string
    String(String),

    /// Regular expression pattern (PostgreSQL `~` semantics)
    Regex(String),

    /// Numeric literal
    Number(f64),

    /// Function call, restricted to the compiler's allow-list
    Function { name: String, args: Vec<Reference> },

    /// Arithmetic over number-typed operands
    Math {
        operator: MathOperator,
        left: Box<Reference>,
        right: Box<Reference>,
    },

    /// Attribute path (e.g. `lemma`, `t2.lemma`, `ufeat.Number`)
    Attribute(String),

    /// Reference to another labelled entity
    Entity(String),
}

impl Reference {
    pub fn string(value: impl Into<String>) -> Self {
        Reference::String(value.into())
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Reference::Regex(pattern.into())
    }

    pub fn attribute(path: impl Into<String>) -> Self {
        Reference::Attribute(path.into())
    }

    pub fn entity(label: impl Into<String>) -> Self {
        Reference::Entity(label.into())
    }

    pub fn function(name: impl Into<String>, args: Vec<Reference>) -> Self {
        Reference::Function {
            name: name.into(),
            args,
        }
    }

    pub fn math(operator: MathOperator, left: Reference, right: Reference) -> Self {
        Reference::Math {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Labels this reference points at explicitly (leading path component or entity)
    pub fn collect_labels<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Reference::Attribute(path) => {
                if let Some((head, _)) = path.split_once('.') {
                    out.push(head);
                }
            }
            Reference::Entity(label) => out.push(label),
            Reference::Function { args, .. } => {
                for arg in args {
                    arg.collect_labels(out);
                }
            }
            Reference::Math { left, right, .. } => {
                left.collect_labels(out);
                right.collect_labels(out);
            }
            Reference::String(_) | Reference::Regex(_) | Reference::Number(_) => {}
        }
    }
}

/// Comparison modifiers (`i` case-insensitive, `d` accent-insensitive)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub case_insensitive: bool,
    pub accent_insensitive: bool,
}

impl Modifiers {
    /// Parse a flag string such as `"i"`, `"d"` or `"id"`
    pub fn from_flags(flags: &str) -> Self {
        Self {
            case_insensitive: flags.contains('i'),
            accent_insensitive: flags.contains('d'),
        }
    }

    pub fn is_plain(&self) -> bool {
        !self.case_insensitive && !self.accent_insensitive
    }
}

/// Binary comparison of two references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub left: Reference,
    pub operator: Operator,
    pub right: Reference,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl Constraint {
    pub fn new(left: Reference, operator: Operator, right: Reference) -> Self {
        Self {
            left,
            operator,
            right,
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Logical connective of a constraint group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

impl LogicalOperator {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "AND" => Some(LogicalOperator::And),
            "OR" => Some(LogicalOperator::Or),
            "NOT" => Some(LogicalOperator::Not),
            _ => None,
        }
    }
}

/// Existential quantifier over a subtree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantor {
    Exists,
    NotExists,
}

impl Quantor {
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "EXISTS" => Some(Quantor::Exists),
            "NOT EXISTS" | "!EXISTS" => Some(Quantor::NotExists),
            _ => None,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Quantor::Exists => "EXISTS",
            Quantor::NotExists => "NOT EXISTS",
        }
    }
}

/// AND/OR/NOT group of constraint items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    pub operator: LogicalOperator,
    pub args: Vec<ConstraintItem>,
    #[serde(default)]
    pub quantor: Option<Quantor>,
}

impl Constraints {
    pub fn new(operator: LogicalOperator, args: Vec<ConstraintItem>) -> Self {
        Self {
            operator,
            args,
            quantor: None,
        }
    }

    pub fn with_quantor(mut self, quantor: Quantor) -> Self {
        self.quantor = Some(quantor);
        self
    }
}

/// Which end of a time span a time constraint compares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Edge {
    Start,
    End,
}

/// Labelled time edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeAnchor {
    pub label: String,
    pub edge: Edge,
}

impl TimeAnchor {
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            edge: Edge::Start,
        }
    }

    pub fn end(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            edge: Edge::End,
        }
    }
}

/// Temporal distance comparison between two time-anchored layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeConstraint {
    pub left: TimeAnchor,
    pub operator: Operator,
    pub right: TimeAnchor,
    /// Duration added to the right side (e.g. `"2s"`, `"-500ms"`)
    #[serde(default)]
    pub offset: Option<String>,
}

/// Anything that may appear inside a unit's constraint list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstraintItem {
    Constraint(Constraint),
    Constraints(Constraints),
    Time(TimeConstraint),
    /// Sub-unit, only valid under a quantor
    Unit(Unit),
}

impl ConstraintItem {
    /// Number of constraint nodes in this subtree (selectivity proxy)
    pub fn nested_count(&self) -> usize {
        match self {
            ConstraintItem::Constraint(_) | ConstraintItem::Time(_) => 1,
            ConstraintItem::Constraints(group) => {
                1 + group.args.iter().map(ConstraintItem::nested_count).sum::<usize>()
            }
            ConstraintItem::Unit(unit) => 1 + unit.nested_constraint_count(),
        }
    }
}

impl From<Constraint> for ConstraintItem {
    fn from(constraint: Constraint) -> Self {
        ConstraintItem::Constraint(constraint)
    }
}

impl From<Constraints> for ConstraintItem {
    fn from(group: Constraints) -> Self {
        ConstraintItem::Constraints(group)
    }
}

impl From<TimeConstraint> for ConstraintItem {
    fn from(constraint: TimeConstraint) -> Self {
        ConstraintItem::Time(constraint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantor_names() {
        assert_eq!(Quantor::from_name("NOT EXISTS"), Some(Quantor::NotExists));
        assert_eq!(Quantor::from_name("not   exists"), Some(Quantor::NotExists));
        assert_eq!(Quantor::from_name("exists"), Some(Quantor::Exists));
        assert_eq!(Quantor::from_name("FORALL"), None);
    }

    #[test]
    fn test_modifiers_from_flags() {
        let m = Modifiers::from_flags("id");
        assert!(m.case_insensitive && m.accent_insensitive);
        assert!(Modifiers::from_flags("").is_plain());
    }

    #[test]
    fn test_collect_labels() {
        let reference = Reference::math(
            MathOperator::Add,
            Reference::attribute("t1.length"),
            Reference::function("length", vec![Reference::attribute("form")]),
        );
        let mut labels = Vec::new();
        reference.collect_labels(&mut labels);
        assert_eq!(labels, vec!["t1"]);
    }

    #[test]
    fn test_nested_count() {
        let group = Constraints::new(
            LogicalOperator::And,
            vec![
                Constraint::new(
                    Reference::attribute("form"),
                    Operator::Eq,
                    Reference::string("a"),
                )
                .into(),
                Constraint::new(
                    Reference::attribute("lemma"),
                    Operator::Eq,
                    Reference::string("b"),
                )
                .into(),
            ],
        );
        assert_eq!(ConstraintItem::Constraints(group).nested_count(), 3);
    }
}
