//! Units joined into `fixed_parts`

use crate::codegen::constraint::{Scope, Visibility};
use crate::context::QueryData;
use crate::error::{CompileError, Result};
use corpql_core::ast::Unit;

/// Join a unit's table, select its id and compile its constraints
///
/// `part_of` is the label the unit is correlated with, which for sequence
/// members may be inherited from the sequence.
pub fn compile_unit(ctx: &mut QueryData<'_>, unit: &Unit, part_of: Option<&str>) -> Result<()> {
    let label = unit.label().ok_or_else(|| {
        CompileError::Structural(format!("unlabelled {} unit reached the compiler", unit.layer))
    })?;
    let alias = ctx.labels.alias(label)?.to_string();
    let table = ctx.config.qualified_table(&unit.layer);
    ctx.joins.add_anchor(&table, &alias, label);
    ctx.declare_entity(label, &alias, &unit.layer);

    let constraints = ctx.constraints();
    if let Some(parent) = part_of {
        if !ctx.labels.is_legal(parent) {
            return Err(CompileError::ReferenceError(format!(
                "'{}' cannot be part of '{}', which is not matched at top level",
                label, parent
            )));
        }
        let parent_alias = ctx.labels.alias(parent)?;
        let parent_layer = ctx.labels.layer_of(parent)?;
        let condition =
            constraints.part_of_condition(parent_alias, parent_layer, &alias, &unit.layer)?;
        ctx.conditions.insert(condition);
    }

    let scope = Scope::unit(label, &alias, &unit.layer, Visibility::global());
    let mut fragment = constraints.compile_unit_constraints(&scope, unit)?;
    for condition in std::mem::take(&mut fragment.on_conditions) {
        ctx.joins.add_on_condition(&alias, condition);
    }
    ctx.add_fragment(fragment);
    Ok(())
}
