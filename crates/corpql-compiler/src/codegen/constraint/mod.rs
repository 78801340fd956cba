//! Constraint engine
//!
//! Compiles comparisons, logical groups, time constraints and quantified
//! sub-units into SQL condition text plus the joins the conditions need.

mod comparison;
mod quantifier;
mod reference;
mod time;

pub use reference::{Operand, OperandKind};
pub use time::parse_duration;

use crate::error::{CompileError, Result};
use crate::semantic::LabelTable;
use crate::sql::Joins;
use corpql_core::ast::{ConstraintItem, Constraints, LogicalOperator, Reference, Unit};
use corpql_core::config::AttributeType;
use corpql_core::CorpusConfig;
use indexmap::IndexSet;

/// Which labels a constraint may refer to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visibility {
    /// Every legal top-level reference is visible
    pub global: bool,
    /// Additional labels (the subtree of an enclosing quantifier)
    pub extra: IndexSet<String>,
}

impl Visibility {
    pub fn global() -> Self {
        Self {
            global: true,
            extra: IndexSet::new(),
        }
    }

    /// Nothing outside the scope's own label
    pub fn local() -> Self {
        Self {
            global: false,
            extra: IndexSet::new(),
        }
    }

    pub fn extended<I, S>(&self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut extra = self.extra.clone();
        extra.extend(labels.into_iter().map(Into::into));
        Self {
            global: self.global,
            extra,
        }
    }

    pub fn allows(&self, label: &str, labels: &LabelTable) -> bool {
        self.extra.contains(label) || (self.global && labels.is_legal(label))
    }
}

/// The entity a constraint list is attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    /// Label of the unit (None for bare top-level constraints)
    pub label: Option<String>,
    /// SQL alias the unit's table is joined under
    pub alias: String,
    pub layer: Option<String>,
    pub visibility: Visibility,
}

impl Scope {
    /// Scope of a labelled unit under its own alias
    pub fn unit(label: &str, alias: &str, layer: &str, visibility: Visibility) -> Self {
        Self {
            label: Some(label.to_string()),
            alias: alias.to_string(),
            layer: Some(layer.to_string()),
            visibility,
        }
    }

    /// Scope of bare top-level constraints
    pub fn global() -> Self {
        Self {
            label: None,
            alias: String::new(),
            layer: None,
            visibility: Visibility::global(),
        }
    }

    pub fn is_own(&self, label: &str) -> bool {
        self.label.as_deref() == Some(label)
    }

    /// Same unit with a different visibility
    pub fn with_visibility(&self, visibility: Visibility) -> Self {
        Self {
            visibility,
            ..self.clone()
        }
    }
}

/// Compiled conditions (implicitly AND-ed) and the joins they need
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub conditions: Vec<String>,
    /// Conditions belonging on the scope's own join (relation endpoints)
    pub on_conditions: Vec<String>,
    pub joins: Joins,
}

impl Fragment {
    pub fn condition(condition: String, joins: Joins) -> Self {
        Self {
            conditions: vec![condition],
            on_conditions: Vec::new(),
            joins,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.on_conditions.is_empty()
    }

    /// All conditions as one expression (parenthesized when compound)
    pub fn expression(&self) -> Option<String> {
        match self.conditions.len() {
            0 => None,
            1 => Some(self.conditions[0].clone()),
            _ => Some(format!("({})", self.conditions.join(" AND "))),
        }
    }

    /// Conjunction of every condition, ON conditions included
    pub fn into_where(mut self) -> (Vec<String>, Joins) {
        let mut conditions = std::mem::take(&mut self.on_conditions);
        conditions.extend(self.conditions);
        (conditions, self.joins)
    }

    fn absorb(&mut self, other: Fragment) {
        self.conditions.extend(other.conditions);
        self.on_conditions.extend(other.on_conditions);
        self.joins.merge(other.joins);
    }

    /// Fold fragments with a logical connective
    pub fn fold(operator: LogicalOperator, parts: Vec<Fragment>) -> Fragment {
        let mut joins = Joins::new();
        let mut expressions = Vec::new();
        let mut tautology = false;
        let mut folded = Fragment::default();

        if operator == LogicalOperator::And {
            for part in parts {
                folded.absorb(part);
            }
            return folded;
        }

        for part in parts {
            let (conditions, part_joins) = part.into_where();
            joins.merge(part_joins);
            match conditions.len() {
                0 => tautology = true,
                1 => expressions.extend(conditions),
                _ => expressions.push(format!("({})", conditions.join(" AND "))),
            }
        }

        folded.joins = joins;
        match operator {
            LogicalOperator::Or if tautology || expressions.is_empty() => {}
            LogicalOperator::Or if expressions.len() == 1 => folded.conditions = expressions,
            LogicalOperator::Or => {
                folded.conditions = vec![format!("({})", expressions.join(" OR "))];
            }
            LogicalOperator::Not if expressions.is_empty() => {
                folded.conditions = vec!["false".to_string()];
            }
            LogicalOperator::Not => {
                folded.conditions = vec![format!("NOT ({})", expressions.join(" AND "))];
            }
            LogicalOperator::And => folded.conditions = expressions,
        }
        folded
    }
}

/// Compiles constraint items against a scope
#[derive(Debug, Clone, Copy)]
pub struct ConstraintCompiler<'a> {
    config: &'a CorpusConfig,
    labels: &'a LabelTable,
    frame_rate: f64,
}

impl<'a> ConstraintCompiler<'a> {
    pub fn new(config: &'a CorpusConfig, labels: &'a LabelTable, frame_rate: f64) -> Self {
        Self {
            config,
            labels,
            frame_rate,
        }
    }

    pub fn config(&self) -> &'a CorpusConfig {
        self.config
    }

    pub fn labels(&self) -> &'a LabelTable {
        self.labels
    }

    /// Compile a unit's own constraint list
    ///
    /// Comparisons of a relation's entity endpoints against another entity
    /// are returned as ON conditions of the relation's join.
    pub fn compile_unit_constraints(&self, scope: &Scope, unit: &Unit) -> Result<Fragment> {
        let mut fragment = Fragment::default();
        for item in &unit.constraints {
            if let ConstraintItem::Constraint(constraint) = item {
                if self.is_relation_endpoint(scope, &constraint.left, &constraint.right)? {
                    let compiled = self.compile_constraint(scope, constraint)?;
                    fragment.on_conditions.extend(compiled.conditions);
                    fragment.joins.merge(compiled.joins);
                    continue;
                }
            }
            fragment.absorb(self.compile_item(scope, item)?);
        }
        Ok(fragment)
    }

    pub fn compile_item(&self, scope: &Scope, item: &ConstraintItem) -> Result<Fragment> {
        match item {
            ConstraintItem::Constraint(constraint) => self.compile_constraint(scope, constraint),
            ConstraintItem::Constraints(group) => self.compile_group(scope, group),
            ConstraintItem::Time(constraint) => self.compile_time(scope, constraint),
            ConstraintItem::Unit(unit) => match unit.quantor {
                Some(_) => self.compile_quantified_unit(scope, unit),
                None => Err(CompileError::SyntaxError(format!(
                    "sub-unit '{}' of layer {} needs a quantor",
                    unit.label().unwrap_or("?"),
                    unit.layer
                ))),
            },
        }
    }

    /// Compile an AND/OR/NOT group
    pub fn compile_group(&self, scope: &Scope, group: &Constraints) -> Result<Fragment> {
        if group.quantor.is_some() {
            return self.compile_quantified_group(scope, group);
        }
        let parts = group
            .args
            .iter()
            .map(|item| self.compile_item(scope, item))
            .collect::<Result<Vec<_>>>()?;
        Ok(Fragment::fold(group.operator, parts))
    }

    fn is_relation_endpoint(
        &self,
        scope: &Scope,
        left: &Reference,
        right: &Reference,
    ) -> Result<bool> {
        let (Some(layer), Reference::Attribute(path), Reference::Entity(_)) =
            (scope.layer.as_deref(), left, right)
        else {
            return Ok(false);
        };
        if !self.config.is_relation(layer) {
            return Ok(false);
        }
        let attribute = match path.split_once('.') {
            Some((head, rest)) if scope.is_own(head) => rest,
            Some(_) => return Ok(false),
            None => path.as_str(),
        };
        Ok(self
            .config
            .attribute(layer, attribute)
            .is_ok_and(|declared| declared.kind == AttributeType::Entity))
    }

    /// SQL alias of a label as seen from a scope
    fn alias_in(&self, scope: &Scope, label: &str) -> Result<String> {
        if scope.is_own(label) {
            Ok(scope.alias.clone())
        } else {
            self.check_visible(scope, label)?;
            Ok(self.labels.alias(label)?.to_string())
        }
    }

    /// Layer of a label as seen from a scope
    fn layer_in(&self, scope: &Scope, label: &str) -> Result<String> {
        match (&scope.layer, scope.is_own(label)) {
            (Some(layer), true) => Ok(layer.clone()),
            _ => Ok(self.labels.layer_of(label)?.to_string()),
        }
    }

    fn check_visible(&self, scope: &Scope, label: &str) -> Result<()> {
        self.labels.require(label)?;
        if scope.is_own(label) || scope.visibility.allows(label, self.labels) {
            Ok(())
        } else {
            Err(CompileError::ReferenceError(format!(
                "label '{}' is not visible here",
                label
            )))
        }
    }
}

/// Labels of every unit declared inside constraint items
pub(crate) fn subtree_labels(items: &[ConstraintItem], out: &mut Vec<String>) {
    for item in items {
        match item {
            ConstraintItem::Unit(unit) => {
                if let Some(label) = unit.label() {
                    out.push(label.to_string());
                }
                subtree_labels(&unit.constraints, out);
            }
            ConstraintItem::Constraints(group) => subtree_labels(&group.args, out),
            ConstraintItem::Constraint(_) | ConstraintItem::Time(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(conditions: &[&str]) -> Fragment {
        Fragment {
            conditions: conditions.iter().map(|c| c.to_string()).collect(),
            ..Fragment::default()
        }
    }

    #[test]
    fn test_fold_and_concatenates() {
        let folded = Fragment::fold(
            LogicalOperator::And,
            vec![fragment(&["a = 1"]), fragment(&["b = 2", "c = 3"])],
        );
        assert_eq!(folded.conditions, vec!["a = 1", "b = 2", "c = 3"]);
    }

    #[test]
    fn test_fold_or_and_not() {
        let or = Fragment::fold(
            LogicalOperator::Or,
            vec![fragment(&["a = 1"]), fragment(&["b = 2", "c = 3"])],
        );
        assert_eq!(or.conditions, vec!["(a = 1 OR (b = 2 AND c = 3))"]);

        let single = Fragment::fold(LogicalOperator::Or, vec![fragment(&["a = 1"])]);
        assert_eq!(single.conditions, vec!["a = 1"]);

        let not = Fragment::fold(LogicalOperator::Not, vec![fragment(&["a = 1"])]);
        assert_eq!(not.conditions, vec!["NOT (a = 1)"]);
    }

    #[test]
    fn test_or_with_unconstrained_branch_is_true() {
        let or = Fragment::fold(
            LogicalOperator::Or,
            vec![fragment(&["a = 1"]), Fragment::default()],
        );
        assert!(or.conditions.is_empty());
    }
}
