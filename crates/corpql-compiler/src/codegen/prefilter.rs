//! Full-text prefilter
//!
//! Derives a positional `tsquery` from the fixed tokens of a sequence. The
//! expression may only widen: a constraint is dropped whenever it cannot be
//! expressed exactly, never approximated in a narrowing way.

use crate::sql::quote_literal;
use corpql_core::ast::{
    Constraint, ConstraintItem, Constraints, LogicalOperator, Operator, Reference, Unit,
};
use corpql_core::CorpusConfig;
use regex::Regex;
use std::sync::LazyLock;

/// `^literal` followed by an optional suffix from the fixed suffix table
static ANCHORED_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\^([^.^$*+?()\[\]{}|\\]+)(\.\*|\.\+|\.\?|\\w\*|\\w\+)?(\$?)$")
        .expect("valid prefix pattern")
});

/// One position of a phrase
#[derive(Debug, Clone, Copy)]
pub enum Slot<'a> {
    Token(&'a Unit),
    /// Anything of unknown width
    Gap,
}

/// tsquery operand for one token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub query: String,
    /// Only excludes lexemes; cannot stand alone in a phrase
    pub negative: bool,
    /// Matches exactly the tokens the constraints accept. Inexact terms
    /// over-match and must never be negated.
    pub exact: bool,
    compound: bool,
}

impl Term {
    fn lexeme(query: String, negative: bool, exact: bool) -> Self {
        Self {
            query,
            negative,
            exact,
            compound: false,
        }
    }

    fn wrapped(&self) -> String {
        if self.compound {
            format!("({})", self.query)
        } else {
            self.query.clone()
        }
    }
}

/// Builds prefilter expressions against the corpus' full-text vectors
pub struct Prefilter<'a> {
    config: &'a CorpusConfig,
}

impl<'a> Prefilter<'a> {
    pub fn new(config: &'a CorpusConfig) -> Self {
        Self { config }
    }

    /// Prefilters need a vector table
    pub fn is_available(&self) -> bool {
        self.config.fts_table().is_some()
    }

    /// `vec.vector @@ to_tsquery('simple', '...')`
    ///
    /// The `simple` configuration lower-cases lexemes, so the vector table
    /// must be built with the same configuration.
    pub fn condition(&self, tsquery: &str) -> String {
        format!("vec.vector @@ to_tsquery('simple', {})", quote_literal(tsquery))
    }

    /// Compose the terms of consecutive tokens into phrases joined by `&`
    pub fn tsquery(&self, slots: &[Slot<'_>]) -> Option<String> {
        let mut phrases = Vec::new();
        let mut current: Vec<Option<Term>> = Vec::new();
        for slot in slots {
            match slot {
                Slot::Token(unit) => current.push(self.unit_term(unit)),
                Slot::Gap => {
                    phrases.extend(phrase(&current));
                    current.clear();
                }
            }
        }
        phrases.extend(phrase(&current));

        if phrases.is_empty() {
            None
        } else {
            Some(phrases.join(" & "))
        }
    }

    /// Term for a single token: the AND of its eligible constraints
    pub fn unit_term(&self, unit: &Unit) -> Option<Term> {
        self.all_of(unit, &unit.constraints)
    }

    /// AND of the eligible items; dropping any item makes the result inexact
    fn all_of(&self, unit: &Unit, items: &[ConstraintItem]) -> Option<Term> {
        let terms: Vec<Term> = items
            .iter()
            .filter_map(|item| self.item_term(unit, item))
            .collect();
        let complete = terms.len() == items.len();
        conjunction(terms, complete)
    }

    fn item_term(&self, unit: &Unit, item: &ConstraintItem) -> Option<Term> {
        match item {
            ConstraintItem::Constraint(constraint) => self.constraint_term(unit, constraint),
            ConstraintItem::Constraints(group) => self.group_term(unit, group),
            ConstraintItem::Time(_) | ConstraintItem::Unit(_) => None,
        }
    }

    fn group_term(&self, unit: &Unit, group: &Constraints) -> Option<Term> {
        if group.quantor.is_some() {
            return None;
        }
        match group.operator {
            LogicalOperator::And => self.all_of(unit, &group.args),
            LogicalOperator::Or => {
                let terms = group
                    .args
                    .iter()
                    .map(|item| self.item_term(unit, item))
                    .collect::<Option<Vec<Term>>>()?;
                match terms.as_slice() {
                    [] => None,
                    [single] => Some(single.clone()),
                    _ => Some(Term {
                        negative: terms.iter().any(|t| t.negative),
                        exact: terms.iter().all(|t| t.exact),
                        query: terms.iter().map(Term::wrapped).collect::<Vec<_>>().join(" | "),
                        compound: true,
                    }),
                }
            }
            LogicalOperator::Not => {
                let terms = group
                    .args
                    .iter()
                    .map(|item| self.item_term(unit, item))
                    .collect::<Option<Vec<Term>>>()?;
                let inner = conjunction(terms, true)?;
                if !inner.exact {
                    return None;
                }
                Some(Term {
                    query: format!("!({})", inner.query),
                    negative: true,
                    exact: true,
                    compound: false,
                })
            }
        }
    }

    fn constraint_term(&self, unit: &Unit, constraint: &Constraint) -> Option<Term> {
        if !constraint.modifiers.is_plain() || !constraint.operator.is_equality() {
            return None;
        }
        let Reference::Attribute(path) = &constraint.left else {
            return None;
        };
        let attribute = match path.split_once('.') {
            Some((head, rest)) if unit.label() == Some(head) => rest,
            Some(_) => return None,
            None => path.as_str(),
        };
        let index = self.config.fts_index(attribute)?;
        let negative = constraint.operator == Operator::Ne;

        let (literal, prefix, exact) = match &constraint.right {
            Reference::String(value) if !value.is_empty() => (value.clone(), false, true),
            Reference::Regex(pattern) => {
                let captures = ANCHORED_PREFIX.captures(pattern)?;
                let literal = captures[1].to_string();
                let suffix = captures.get(2).map(|m| m.as_str());
                let anchored_end = !captures[3].is_empty();
                let (prefix, exact) = match (suffix, anchored_end) {
                    (None, true) => (false, true),
                    (None, false) | (Some(".*"), _) => (true, true),
                    // other suffixes narrow the prefix and cannot be negated exactly
                    (Some(_), _) if negative => return None,
                    (Some(_), _) => (true, false),
                };
                (literal, prefix, exact)
            }
            _ => return None,
        };

        let escaped = literal.replace('\\', "\\\\").replace('\'', "''");
        let mut query = format!("'{}{}'", index, escaped);
        if prefix {
            query.push_str(":*");
        }
        if negative {
            query.insert(0, '!');
        }
        Some(Term::lexeme(query, negative, exact))
    }
}

/// `complete` is false when ineligible conjuncts were left out
fn conjunction(terms: Vec<Term>, complete: bool) -> Option<Term> {
    let exact = complete && terms.iter().all(|t| t.exact);
    match terms.len() {
        0 => None,
        1 => terms.into_iter().next().map(|t| Term { exact, ..t }),
        _ => Some(Term {
            negative: terms.iter().all(|t| t.negative),
            exact,
            query: terms.iter().map(Term::wrapped).collect::<Vec<_>>().join(" & "),
            compound: true,
        }),
    }
}

/// `a <1> b <2> c`, skipping ineligible positions
fn phrase(slots: &[Option<Term>]) -> Option<String> {
    let present: Vec<(usize, &Term)> = slots
        .iter()
        .enumerate()
        .filter_map(|(i, term)| term.as_ref().map(|t| (i, t)))
        .collect();
    if present.iter().all(|(_, term)| term.negative) {
        return None;
    }

    match present.as_slice() {
        [] => None,
        [(_, single)] => Some(single.wrapped()),
        _ => {
            let mut text = present[0].1.wrapped();
            for pair in present.windows(2) {
                let (previous, _) = pair[0];
                let (position, term) = pair[1];
                text.push_str(&format!(" <{}> {}", position - previous, term.wrapped()));
            }
            Some(text)
        }
    }
}
