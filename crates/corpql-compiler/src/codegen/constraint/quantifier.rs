//! EXISTS / NOT EXISTS subqueries
//!
//! A quantified subtree compiles into a self-contained correlated subquery.
//! Every join and condition it produces stays inside that subquery.

use super::{subtree_labels, ConstraintCompiler, Fragment, Scope};
use crate::error::{CompileError, Result};
use crate::sql::{Joins, SelectBuilder};
use corpql_core::ast::{ConstraintItem, Constraints, LogicalOperator, Quantor, Unit};

impl ConstraintCompiler<'_> {
    /// Condition tying a child unit to the unit it is part of
    pub fn part_of_condition(
        &self,
        parent_alias: &str,
        parent_layer: &str,
        child_alias: &str,
        child_layer: &str,
    ) -> Result<String> {
        let config = self.config;
        if config.is_token(child_layer) && config.is_segment(parent_layer) {
            let column = config.id_column(parent_layer);
            return Ok(format!(
                "{}.{} = {}.{}",
                child_alias, column, parent_alias, column
            ));
        }
        if config.is_stream_anchored(parent_layer) && config.is_stream_anchored(child_layer) {
            return Ok(format!(
                "{}.char_range @> {}.char_range",
                parent_alias, child_alias
            ));
        }
        if config.is_time_anchored(parent_layer) && config.is_time_anchored(child_layer) {
            return Ok(format!(
                "{}.frame_range @> {}.frame_range",
                parent_alias, child_alias
            ));
        }
        Err(CompileError::TypeError(format!(
            "{} cannot be part of {}: no shared anchoring",
            child_layer, parent_layer
        )))
    }

    /// `{EXISTS|NOT EXISTS} (SELECT 1 FROM ...)` for a quantified sub-unit
    pub fn compile_quantified_unit(&self, scope: &Scope, unit: &Unit) -> Result<Fragment> {
        let quantor = unit.quantor.ok_or_else(|| {
            CompileError::SyntaxError(format!("unit of layer {} has no quantor", unit.layer))
        })?;
        let none = Constraints::new(LogicalOperator::And, Vec::new());
        let body = self.exists_body(scope, &[unit], &none)?;
        Ok(quantified(quantor, body))
    }

    /// Quantified constraint group: its units are joined inside the subquery,
    /// the remaining items are folded with the group's operator
    pub(super) fn compile_quantified_group(
        &self,
        scope: &Scope,
        group: &Constraints,
    ) -> Result<Fragment> {
        let quantor = group.quantor.ok_or_else(|| {
            CompileError::SyntaxError("constraint group has no quantor".to_string())
        })?;

        let mut units = Vec::new();
        let mut rest = Vec::new();
        for item in &group.args {
            match item {
                ConstraintItem::Unit(unit) if unit.quantor.is_none() => units.push(unit),
                other => rest.push(other.clone()),
            }
        }
        if units.is_empty() {
            return Err(CompileError::SyntaxError(format!(
                "{} group without a unit",
                quantor.sql()
            )));
        }

        let remainder = Constraints::new(group.operator, rest);
        let body = self.exists_body(scope, &units, &remainder)?;
        Ok(quantified(quantor, body))
    }

    fn exists_body(
        &self,
        scope: &Scope,
        units: &[&Unit],
        remainder: &Constraints,
    ) -> Result<String> {
        let mut declared = Vec::new();
        for unit in units {
            if let Some(label) = unit.label() {
                declared.push(label.to_string());
            }
            subtree_labels(&unit.constraints, &mut declared);
        }
        subtree_labels(&remainder.args, &mut declared);
        let visibility = scope.visibility.extended(declared);
        let inner = scope.with_visibility(visibility.clone());

        let mut select = SelectBuilder::new();
        let mut joins = Joins::new();
        let mut conditions = Vec::new();

        for (i, unit) in units.iter().enumerate() {
            let label = unit.label().ok_or_else(|| {
                CompileError::Structural(format!("unlabelled unit of layer {}", unit.layer))
            })?;
            let alias = self.labels.alias(label)?.to_string();
            let table = self.config.qualified_table(&unit.layer);
            if i == 0 {
                select = select.from(format!("{} {}", table, alias));
            } else {
                joins.add_anchor(&table, &alias, label);
            }

            let parent = unit
                .part_of
                .clone()
                .or_else(|| scope.label.clone())
                .ok_or_else(|| {
                    CompileError::SyntaxError(format!(
                        "quantified unit '{}' has no partOf and no enclosing unit",
                        label
                    ))
                })?;
            let parent_alias = self.alias_in(&inner, &parent)?;
            let parent_layer = self.layer_in(&inner, &parent)?;
            conditions.push(self.part_of_condition(
                &parent_alias,
                &parent_layer,
                &alias,
                &unit.layer,
            )?);

            let unit_scope = Scope::unit(label, &alias, &unit.layer, visibility.clone());
            let (unit_conditions, unit_joins) =
                self.compile_unit_constraints(&unit_scope, unit)?.into_where();
            conditions.extend(unit_conditions);
            joins.merge(unit_joins);
        }

        if !remainder.args.is_empty() {
            let (rest, rest_joins) = self.compile_group(&inner, remainder)?.into_where();
            conditions.extend(rest);
            joins.merge(rest_joins);
        }

        Ok(select.joins(joins.render()).conditions(conditions).render())
    }
}

fn quantified(quantor: Quantor, body: String) -> Fragment {
    Fragment::condition(format!("{} ({})", quantor.sql(), body), Joins::new())
}
