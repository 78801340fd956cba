//! Transition tables and recursive traversal CTEs
//!
//! Traversals run in registration order. Each one starts from the finished
//! rows of the traversal before it (or from `fixed_parts`) and carries every
//! column it received, so `match_list` sees all fixed tokens and all paths.

use crate::context::{Direction, QueryData, Start, Traversal};
use crate::sql::{quote_literal, Cte, SelectBuilder};

const TRANSITION_COLUMNS: [&str; 4] = ["source_state", "dest_state", "label", "sequence"];
const TRANSITION_CASTS: [&str; 4] = ["int4", "int4", "text", "text"];

/// `transition{n}` rows; accepting states get a row without destination
pub fn transition_cte(traversal: &Traversal) -> Cte {
    let automaton = &traversal.automaton;
    let mut rows: Vec<Vec<String>> = automaton
        .transitions
        .iter()
        .map(|t| {
            vec![
                t.source.to_string(),
                t.dest.to_string(),
                quote_literal(&t.symbol.label),
                quote_literal(&t.symbol.sequence),
            ]
        })
        .collect();
    rows.extend(automaton.accepting.iter().map(|state| {
        vec![
            state.to_string(),
            "NULL".to_string(),
            "NULL".to_string(),
            "NULL".to_string(),
        ]
    }));
    if rows.is_empty() {
        rows.push(vec!["NULL".to_string(); 4]);
    }

    // VALUES infers column types from the first row
    if let Some(first) = rows.first_mut() {
        for (value, cast) in first.iter_mut().zip(TRANSITION_CASTS) {
            *value = format!("{}::{}", value, cast);
        }
    }

    Cte::values(
        traversal.transition_name(),
        TRANSITION_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows,
    )
}

/// Finished rows of a traversal: rows whose state accepts
fn finished(traversal: &Traversal) -> (String, String) {
    let name = traversal.name();
    let exit = format!("{}_x", name);
    let join = format!(
        "JOIN {} {} ON {}.source_state = {}.{}_state AND {}.dest_state IS NULL",
        traversal.transition_name(),
        exit,
        exit,
        name,
        name,
        exit
    );
    (name, join)
}

/// The recursive `traversal{n}` CTE
pub fn traversal_cte(ctx: &QueryData<'_>, traversal: &Traversal) -> Cte {
    let name = traversal.name();
    let carried = ctx.carried_columns(traversal.index);
    let token_table = ctx.token_table();
    let token_id = ctx.token_id();
    let segment_key = ctx.segment_key();

    let mut columns = carried.clone();
    columns.extend(["pos", "seg", "state", "path"].map(|c| format!("{}_{}", name, c)));

    // anchor: one row per carried row and start position
    let (source, source_join) = match traversal.index.checked_sub(1) {
        Some(previous) => {
            let (source, join) = finished(&ctx.traversals[previous]);
            (source, Some(join))
        }
        None => ("fixed_parts".to_string(), None),
    };
    let start = format!("{}_a", name);
    let (start_join, start_pos) = match &traversal.start {
        Start::Anchor(column) => (
            format!(
                "JOIN {} {} ON {}.{} = {}.{}",
                token_table, start, start, token_id, source, column
            ),
            format!("{}.{}", start, token_id),
        ),
        Start::Segment(column) => (
            format!(
                "JOIN {} {} ON {}.{} = {}.{}",
                token_table, start, start, segment_key, source, column
            ),
            format!("{}.{} - 1", start, token_id),
        ),
    };
    let anchor = SelectBuilder::new()
        .columns(carried.iter().map(|c| format!("{}.{}", source, c)))
        .column(start_pos)
        .column(format!("{}.{}", start, segment_key))
        .column("0")
        .column("'[]'::jsonb")
        .from(source.clone())
        .joins(source_join)
        .join(start_join);

    // step: consume one token along a transition
    let transition = format!("{}_x", name);
    let step_token = format!("{}_t", name);
    let offset = match traversal.direction {
        Direction::Forward => "+ 1",
        Direction::Backward => "- 1",
    };
    let path = format!(
        "{}.{}_path || jsonb_build_array(jsonb_build_array({}.{}, {}.label, {}.sequence))",
        name, name, step_token, token_id, transition, transition
    );
    let alternatives: Vec<String> = traversal
        .steps
        .iter()
        .map(|(label, condition)| {
            let matched = format!("{}.label = {}", transition, quote_literal(label));
            match condition {
                Some(condition) => format!("({} AND {})", matched, condition),
                None => matched,
            }
        })
        .collect();

    let mut step = SelectBuilder::new()
        .columns(carried.iter().map(|c| format!("{}.{}", name, c)))
        .column(format!("{}.{}", step_token, token_id))
        .column(format!("{}.{}", step_token, segment_key))
        .column(format!("{}.dest_state", transition))
        .column(path)
        .from(name.clone())
        .join(format!(
            "JOIN {} {} ON {}.source_state = {}.{}_state AND {}.dest_state IS NOT NULL",
            traversal.transition_name(),
            transition,
            transition,
            name,
            name,
            transition
        ))
        .join(format!(
            "JOIN {} {} ON {}.{} = {}.{}_seg AND {}.{} = {}.{}_pos {}",
            token_table,
            step_token,
            step_token,
            segment_key,
            name,
            name,
            step_token,
            token_id,
            name,
            name,
            offset
        ))
        .joins(traversal.joins.render());
    step = match alternatives.len() {
        0 => step,
        1 => step.conditions(alternatives),
        _ => step.condition(format!("({})", alternatives.join(" OR "))),
    };
    if let Some(bound) = &traversal.bound {
        step = step.condition(format!(
            "{}.{} <= {}.{}",
            step_token, token_id, name, bound
        ));
    }

    Cte::recursive(name.clone(), columns, anchor, step)
        .with_search(format!("{}_pos", name), format!("{}_order", name))
}

/// Every traversal's transition table followed by its walk
pub fn traversal_ctes(ctx: &QueryData<'_>) -> Vec<Cte> {
    ctx.traversals
        .iter()
        .flat_map(|traversal| [transition_cte(traversal), traversal_cte(ctx, traversal)])
        .collect()
}

/// `match_list`: one row per complete match
pub fn match_list(ctx: &QueryData<'_>) -> Cte {
    let columns = ctx.match_columns();
    let select = match ctx.traversals.last() {
        Some(last) => {
            let (source, join) = finished(last);
            SelectBuilder::new()
                .columns(columns.iter().map(|c| format!("{}.{}", source, c)))
                .from(source)
                .join(join)
        }
        None => SelectBuilder::new()
            .columns(columns.iter().map(|c| format!("fixed_parts.{}", c)))
            .from("fixed_parts"),
    };
    Cte::select("match_list", select)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::sequence::{Automaton, Pattern, Symbol};
    use crate::sql::Joins;
    use indexmap::IndexMap;

    fn traversal() -> Traversal {
        let pattern = Pattern::Concat(vec![
            Pattern::repeat(Pattern::Symbol(Symbol::new("x", "star")), 0, None),
            Pattern::Symbol(Symbol::new("d", "seq")),
        ]);
        let mut steps = IndexMap::new();
        steps.insert("x".to_string(), None);
        steps.insert(
            "d".to_string(),
            Some("traversal0_t.token_id = traversal0.d".to_string()),
        );
        Traversal {
            index: 0,
            sequence: "seq".to_string(),
            automaton: Automaton::build(&pattern),
            direction: Direction::Forward,
            start: Start::Anchor("a".to_string()),
            bound: Some("d".to_string()),
            steps,
            joins: Joins::new(),
        }
    }

    #[test]
    fn test_transition_rows() {
        let sql = crate::sql::Statement::new()
            .cte(transition_cte(&traversal()))
            .render(false);
        assert!(sql.contains(
            "transition0 (source_state, dest_state, label, sequence) AS (VALUES (0::int4, 0::int4, 'x'::text, 'star'::text)"
        ));
        assert!(sql.contains("(0, 1, 'd', 'seq')"));
        assert!(sql.contains("(1, NULL, NULL, NULL)"));
    }
}
