//! Query assembler
//!
//! Walks the top-level nodes, delegates them to the constraint engine and
//! the sequence compiler, then chooses the base table and renders
//! `fixed_parts`, the traversal CTEs and `match_list`.

use super::constraint::{Scope, Visibility};
use super::prefilter::{Prefilter, Slot};
use super::sequence::{cte, SequenceCompiler};
use super::unit::compile_unit;
use crate::context::QueryData;
use crate::error::{CompileError, Result};
use crate::sql::{Cte, JoinKind, SelectBuilder};
use corpql_core::ast::{Disjunction, Query, QueryNode, SequenceMember, SetObject, Unit};

/// Builds everything up to and including `match_list`
pub struct QueryAssembler<'c, 'a> {
    ctx: &'c mut QueryData<'a>,
}

impl<'c, 'a> QueryAssembler<'c, 'a> {
    pub fn new(ctx: &'c mut QueryData<'a>) -> Self {
        Self { ctx }
    }

    pub fn assemble(&mut self, query: &Query) -> Result<Vec<Cte>> {
        for node in &query.nodes {
            self.node(node)?;
        }
        self.correlate_segment_level(query)?;
        if self.ctx.selects.is_empty() {
            return Err(CompileError::Structural(
                "query does not match any unit".to_string(),
            ));
        }

        let fixed_parts = self.fixed_parts()?;
        let mut ctes = vec![Cte::select("fixed_parts", fixed_parts)];
        ctes.extend(cte::traversal_ctes(self.ctx));
        ctes.push(cte::match_list(self.ctx));
        Ok(ctes)
    }

    fn node(&mut self, node: &QueryNode) -> Result<()> {
        let constraints = self.ctx.constraints();
        match node {
            QueryNode::Unit(unit) if unit.quantor.is_some() => {
                let fragment = constraints.compile_quantified_unit(&Scope::global(), unit)?;
                self.ctx.add_fragment(fragment);
            }
            QueryNode::Unit(unit) => {
                compile_unit(self.ctx, unit, unit.part_of.as_deref())?;
                self.unit_prefilter(unit);
            }
            QueryNode::Sequence(sequence) => SequenceCompiler::new(self.ctx).compile(sequence)?,
            QueryNode::Disjunction(disjunction) => self.disjunction(disjunction)?,
            QueryNode::Set(set) => self.set(set)?,
            QueryNode::Constraint(constraint) => {
                let fragment = constraints.compile_constraint(&Scope::global(), constraint)?;
                self.ctx.add_fragment(fragment);
            }
            QueryNode::Constraints(group) => {
                let fragment = constraints.compile_group(&Scope::global(), group)?;
                self.ctx.add_fragment(fragment);
            }
            QueryNode::TimeConstraint(constraint) => {
                let fragment = constraints.compile_time(&Scope::global(), constraint)?;
                self.ctx.add_fragment(fragment);
            }
        }
        Ok(())
    }

    /// Top-level document-like units without `partOf` must contain the
    /// matched segment, or `fixed_parts` would pair every segment with every
    /// such unit
    fn correlate_segment_level(&mut self, query: &Query) -> Result<()> {
        let config = self.ctx.config;
        let top_units = || {
            query.nodes.iter().filter_map(|node| match node {
                QueryNode::Unit(unit) if unit.quantor.is_none() => Some(unit),
                _ => None,
            })
        };
        let Some(segment) = top_units().find(|unit| config.is_segment(&unit.layer)) else {
            return Ok(());
        };
        let Some(segment_label) = segment.label() else {
            return Ok(());
        };

        let constraints = self.ctx.constraints();
        let labels = self.ctx.labels;
        for unit in top_units() {
            let Some(label) = unit.label() else {
                continue;
            };
            let related = unit.part_of.is_some() || segment.part_of.as_deref() == Some(label);
            if related || config.is_segment(&unit.layer) || !config.is_segment_level(&unit.layer) {
                continue;
            }
            let condition = constraints.part_of_condition(
                labels.alias(label)?,
                &unit.layer,
                labels.alias(segment_label)?,
                &segment.layer,
            )?;
            tracing::debug!(unit = %label, segment = %segment_label, "correlated segment-level unit");
            self.ctx.conditions.insert(condition);
        }
        Ok(())
    }

    /// A lone token scoped to a segment filters that segment like a one-token phrase
    fn unit_prefilter(&mut self, unit: &Unit) {
        if !self.ctx.options.enable_prefilter || !self.ctx.config.is_token(&unit.layer) {
            return;
        }
        let Some(part_of) = unit.part_of.as_deref() else {
            return;
        };
        let config = self.ctx.config;
        let prefilter = Prefilter::new(config);
        let on_segment = self
            .ctx
            .labels
            .layer_of(part_of)
            .is_ok_and(|layer| config.is_segment(layer));
        if !on_segment || !prefilter.is_available() {
            return;
        }
        if let Some(tsquery) = prefilter.tsquery(&[Slot::Token(unit)]) {
            self.ctx
                .prefilters
                .entry(part_of.to_string())
                .or_default()
                .push(prefilter.condition(&tsquery));
        }
    }

    /// Self-contained subquery over one unit's table: its part-of
    /// correlation plus its own constraints
    fn unit_subquery(&self, unit: &Unit, column: String) -> Result<String> {
        let label = unit.label().ok_or_else(|| {
            CompileError::Structural(format!("unlabelled {} unit reached the compiler", unit.layer))
        })?;
        let config = self.ctx.config;
        let labels = self.ctx.labels;
        let constraints = self.ctx.constraints();
        let alias = labels.alias(label)?;

        let mut conditions = Vec::new();
        if let Some(parent) = unit.part_of.as_deref() {
            conditions.push(constraints.part_of_condition(
                labels.alias(parent)?,
                labels.layer_of(parent)?,
                alias,
                &unit.layer,
            )?);
        }
        let scope = Scope::unit(label, alias, &unit.layer, Visibility::global());
        let (own, joins) = constraints
            .compile_unit_constraints(&scope, unit)?
            .into_where();
        conditions.extend(own);

        Ok(SelectBuilder::new()
            .column(column)
            .from(format!("{} {}", config.qualified_table(&unit.layer), alias))
            .joins(joins.render())
            .conditions(conditions)
            .render())
    }

    /// Each member becomes a lateral subquery; at least one must match
    fn disjunction(&mut self, disjunction: &Disjunction) -> Result<()> {
        let label = disjunction.label.clone().ok_or_else(|| {
            CompileError::Structural("disjunction without a label reached the compiler".to_string())
        })?;

        let mut members = Vec::new();
        let mut present = Vec::new();
        for member in &disjunction.members {
            let SequenceMember::Unit(unit) = member else {
                return Err(CompileError::NotImplemented(format!(
                    "top-level disjunction '{}' may only contain units",
                    label
                )));
            };
            let member_label = unit.label().unwrap_or_default().to_string();
            let alias = self.ctx.labels.alias(&member_label)?.to_string();
            let id = self.ctx.config.id_column(&unit.layer);
            let subquery = self.unit_subquery(unit, format!("{}.{}", alias, id))?;

            self.ctx
                .joins
                .add_lateral(format!("({})", subquery), &alias, &member_label);
            self.ctx
                .selects
                .insert(alias.clone(), format!("{}.{}", alias, id));
            self.ctx.entities.insert(member_label.clone());
            present.push(format!("{}.{} IS NOT NULL", alias, id));
            members.push(member_label);
        }

        if !present.is_empty() {
            self.ctx
                .conditions
                .insert(format!("({})", present.join(" OR ")));
        }
        self.ctx.disjunctions.insert(label, members);
        Ok(())
    }

    /// Ordered id array of every unit satisfying the set's constraints
    fn set(&mut self, set: &SetObject) -> Result<()> {
        let unit = &set.unit;
        let member = unit.label().ok_or_else(|| {
            CompileError::Structural(format!("set '{}' has an unlabelled unit", set.label))
        })?;
        let alias = self.ctx.labels.alias(member)?;
        let id = self.ctx.config.id_column(&unit.layer);
        let subquery = self.unit_subquery(
            unit,
            format!("array_agg({}.{} ORDER BY {}.{})", alias, id, alias, id),
        )?;

        let set_alias = self.ctx.labels.alias(&set.label)?.to_string();
        self.ctx.selects.insert(set_alias, format!("({})", subquery));
        self.ctx.sets.insert(set.label.clone());
        Ok(())
    }

    /// Label of the unit `fixed_parts` selects from
    fn choose_base(&self) -> Result<String> {
        let config = self.ctx.config;
        let labels = self.ctx.labels;
        let anchors: Vec<(&str, &str)> = self
            .ctx
            .joins
            .iter()
            .filter(|(_, entry)| entry.anchor && entry.kind == JoinKind::Cross)
            .filter_map(|(_, entry)| entry.owner.as_deref())
            .filter_map(|owner| labels.layer_of(owner).ok().map(|layer| (owner, layer)))
            .collect();

        // first of the best-ranked segment labels
        let segment = anchors
            .iter()
            .filter(|(_, layer)| config.is_segment(layer))
            .rev()
            .max_by_key(|(label, _)| {
                let nested = labels.get(label).map_or(0, |info| info.nested_constraints);
                (labels.sequence_width_for(label), nested)
            });
        if let Some((label, _)) = segment {
            return Ok(label.to_string());
        }

        let first_of = |wanted: &str| {
            anchors
                .iter()
                .find(|(_, layer)| *layer == wanted)
                .map(|(label, _)| label.to_string())
        };
        first_of(config.document_layer())
            .or_else(|| first_of(config.token_layer()))
            .or_else(|| anchors.first().map(|(label, _)| label.to_string()))
            .ok_or_else(|| {
                CompileError::Structural("no unit can serve as the base table".to_string())
            })
    }

    fn fixed_parts(&mut self) -> Result<SelectBuilder> {
        let base = self.choose_base()?;
        let alias = self.ctx.labels.alias(&base)?.to_string();
        let (key, entry) = self.ctx.joins.remove_alias(&alias).ok_or_else(|| {
            CompileError::Structural(format!("base '{}' is not joined", base))
        })?;
        self.ctx.base = Some(base.clone());

        let segment_key = self.ctx.segment_key();
        let fts_table = self.ctx.config.fts_table();
        let mut from = format!("{} {}", key.table, key.alias);
        if let Some(fts_table) = &fts_table {
            let prefilters: Vec<(String, Vec<String>)> = self
                .ctx
                .prefilters
                .iter()
                .map(|(label, conditions)| (label.clone(), conditions.clone()))
                .collect();
            for (label, conditions) in prefilters {
                let segment = self.ctx.labels.alias(&label)?.to_string();
                let vectors = format!(
                    "(SELECT vec.{} FROM {} vec WHERE {})",
                    segment_key,
                    fts_table,
                    conditions.join(" AND ")
                );
                let vector_alias = format!("fts_vector_{}", segment);
                let correlation = format!(
                    "{}.{} = {}.{}",
                    segment, segment_key, vector_alias, segment_key
                );
                if label == base {
                    from = format!(
                        "{} AS {} JOIN {} ON {}",
                        vectors, vector_alias, from, correlation
                    );
                } else if self.ctx.joins.contains_alias(&segment) {
                    self.ctx.joins.add_deferred(vectors, &vector_alias, correlation);
                }
            }
            tracing::debug!(
                segments = self.ctx.prefilters.len(),
                "applied full-text prefilters"
            );
        }
        tracing::debug!(base = %base, table = %key.table, "chose base table");

        let mut conditions: Vec<String> = entry.conditions.into_iter().collect();
        conditions.extend(self.ctx.conditions.iter().cloned());
        Ok(SelectBuilder::new()
            .columns(
                self.ctx
                    .selects
                    .iter()
                    .map(|(alias, expression)| format!("{} AS {}", expression, alias)),
            )
            .from(from)
            .joins(self.ctx.joins.render())
            .conditions(conditions))
    }
}
