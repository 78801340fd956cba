//! Bounded repetitions of plain tokens between two fixed tokens
//!
//! `a (b c){1,3} d` needs no traversal: the distance between `a` and `d`
//! determines the number of iterations, and each repeated position is checked
//! with a `NOT EXISTS` over the tokens in between.

use super::SequenceCompiler;
use crate::codegen::constraint::{Scope, Visibility};
use crate::error::{CompileError, Result};
use corpql_core::ast::{Sequence, SequenceMember, Unit};

impl SequenceCompiler<'_, '_> {
    pub(super) fn compile_simple(
        &mut self,
        previous: &str,
        next: &str,
        sequence: &Sequence,
    ) -> Result<()> {
        let units: Vec<&Unit> = sequence
            .members
            .iter()
            .filter_map(|member| match member {
                SequenceMember::Unit(unit) => Some(unit),
                _ => None,
            })
            .collect();
        let max = sequence.repetition.max.ok_or_else(|| {
            CompileError::Structural("unbounded repetition compiled as a simple gap".to_string())
        })?;
        let length = units.len();
        let token_id = self.ctx.token_id();
        let segment_key = self.ctx.segment_key();

        let width = format!("{}.{} - {}.{} - 1", next, token_id, previous, token_id);
        if length > 1 {
            self.ctx
                .conditions
                .insert(format!("({}) % {} = 0", width, length));
        }
        self.ctx.conditions.insert(format!(
            "{} BETWEEN {} AND {}",
            width,
            sequence.repetition.min as usize * length,
            max as usize * length
        ));

        let constraints = self.ctx.constraints();
        let table = self.ctx.token_table();
        for (position, unit) in units.iter().enumerate() {
            let label = self.member_label(unit)?;
            let alias = self.ctx.labels.alias(label)?.to_string();
            let scope = Scope::unit(label, &alias, &unit.layer, Visibility::local());
            let (conditions, joins) = constraints
                .compile_unit_constraints(&scope, unit)?
                .into_where();
            if conditions.is_empty() {
                continue;
            }

            let mut filters = vec![
                format!("{}.{} = {}.{}", alias, segment_key, previous, segment_key),
                format!("{}.{} > {}.{}", alias, token_id, previous, token_id),
                format!("{}.{} < {}.{}", alias, token_id, next, token_id),
            ];
            if length > 1 {
                filters.push(format!(
                    "({}.{} - {}.{} - 1) % {} = {}",
                    alias, token_id, previous, token_id, length, position
                ));
            }
            filters.push(format!("NOT ({})", conditions.join(" AND ")));

            let mut clauses = vec![format!("SELECT 1 FROM {} {}", table, alias)];
            clauses.extend(joins.render());
            clauses.push(format!("WHERE {}", filters.join(" AND ")));
            self.ctx
                .conditions
                .insert(format!("NOT EXISTS ({})", clauses.join(" ")));
        }
        Ok(())
    }
}
