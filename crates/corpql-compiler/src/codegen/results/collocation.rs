//! Collocation results
//!
//! Counts the values of a token attribute around each match and sets them
//! against the count expected from the attribute's batch frequency.

use super::{match_column, MATCHES};
use crate::codegen::constraint::{Scope, Visibility};
use crate::context::QueryData;
use crate::error::{CompileError, Result};
use crate::semantic::LabelKind;
use crate::sql::SelectBuilder;
use corpql_core::ast::CollocationResult;
use corpql_core::output::{AttributeDescriptor, ResultDescriptor, ResultKind};

const COLLOCATE: &str = "coll_x";

pub(super) fn compile(
    ctx: &QueryData<'_>,
    spec: &CollocationResult,
) -> Result<(Vec<String>, SelectBuilder, ResultDescriptor)> {
    let config = ctx.config;
    let token_layer = config.token_layer();
    let token_table = ctx.token_table();
    let token_id = ctx.token_id();
    let segment_key = ctx.segment_key();

    let mut select = SelectBuilder::new().from(format!("match_list {}", MATCHES));
    match (&spec.center, spec.window, &spec.space) {
        (Some(center), Some(window), _) => {
            let conditions = [
                format!("{}.{} = coll_c.{}", COLLOCATE, segment_key, segment_key),
                format!(
                    "{}.{} BETWEEN coll_c.{} - {} AND coll_c.{} + {}",
                    COLLOCATE,
                    token_id,
                    token_id,
                    window.left.abs(),
                    token_id,
                    window.right.abs()
                ),
                format!("{}.{} <> coll_c.{}", COLLOCATE, token_id, token_id),
            ];
            select = select
                .join(format!(
                    "JOIN {} coll_c ON coll_c.{} = {}",
                    token_table,
                    token_id,
                    match_column(ctx, center)?
                ))
                .join(format!(
                    "JOIN {} {} ON {}",
                    token_table,
                    COLLOCATE,
                    conditions.join(" AND ")
                ));
        }
        (_, _, Some(space)) => {
            let column = match_column(ctx, space)?;
            let info = ctx.labels.require(space)?;
            let correlation = match (info.kind, info.layer.as_deref()) {
                (LabelKind::Set, _) => format!("{}.{} = ANY({})", COLLOCATE, token_id, column),
                (LabelKind::Unit, Some(layer)) if config.is_segment(layer) => {
                    format!("{}.{} = {}", COLLOCATE, segment_key, column)
                }
                (LabelKind::Unit, Some(layer)) if config.is_stream_anchored(layer) => {
                    select = select.join(format!(
                        "JOIN {} coll_s ON coll_s.{} = {}",
                        config.qualified_table(layer),
                        config.id_column(layer),
                        column
                    ));
                    format!("coll_s.char_range @> {}.char_range", COLLOCATE)
                }
                _ => {
                    return Err(CompileError::TypeError(format!(
                        "collocation space '{}' must be a set or a stream-anchored unit",
                        space
                    )))
                }
            };
            select = select.join(format!(
                "JOIN {} {} ON {}",
                token_table, COLLOCATE, correlation
            ));
        }
        _ => {
            return Err(CompileError::Structural(format!(
                "collocation '{}' needs a center and window, or a space",
                spec.label
            )))
        }
    }

    // the collocate is a token outside the label table
    let scope = Scope {
        label: Some(COLLOCATE.to_string()),
        alias: COLLOCATE.to_string(),
        layer: Some(token_layer.to_string()),
        visibility: Visibility::local(),
    };
    let value = ctx.constraints().resolve_attribute(&scope, &spec.attribute)?;
    select = select.joins(value.joins.render());

    let frequencies = config.frequency_table(&spec.attribute);
    let batch_size = match config.batch_token_count() {
        Some(count) => count.to_string(),
        None => format!("(SELECT sum(frequency) FROM {})", frequencies),
    };
    select = select
        .join(format!(
            "JOIN {} coll_f ON coll_f.value = {}",
            frequencies, value.sql
        ))
        .group_by([value.sql.clone(), "coll_f.frequency".to_string()]);

    let payload = vec![
        value.sql,
        "count(*)".to_string(),
        format!(
            "(sum(count(*)) OVER () * coll_f.frequency)::float8 / {}",
            batch_size
        ),
    ];
    let descriptor = ResultDescriptor::new(&spec.label, ResultKind::Collocation)
        .with_attribute(AttributeDescriptor::new(&spec.attribute, value.kind.name()))
        .with_attribute(AttributeDescriptor::new("observed", "number"))
        .with_attribute(AttributeDescriptor::new("expected", "number"));
    Ok((payload, select, descriptor))
}
