//! Frequency analysis results

use super::{match_column, MATCHES};
use crate::codegen::constraint::Scope;
use crate::context::QueryData;
use crate::error::{CompileError, Result};
use crate::sql::{Joins, SelectBuilder};
use corpql_core::ast::{AnalysisFunction, AnalysisResult};
use corpql_core::output::{AttributeDescriptor, ResultDescriptor, ResultKind};

pub(super) fn compile(
    ctx: &mut QueryData<'_>,
    index: usize,
    spec: &AnalysisResult,
) -> Result<(Vec<String>, SelectBuilder, ResultDescriptor)> {
    let constraints = ctx.constraints();
    let config = ctx.config;
    let mut descriptor = ResultDescriptor::new(&spec.label, ResultKind::Analysis);
    let mut joins = Joins::new();
    let mut payload = Vec::new();
    let mut group_by = Vec::new();
    let mut columns = Vec::new();

    for path in &spec.attributes {
        let (label, _) = path.split_once('.').ok_or_else(|| {
            CompileError::ReferenceError(format!(
                "analysis attribute '{}' must start with a label",
                path
            ))
        })?;
        let layer = ctx.labels.layer_of(label)?;
        let alias = ctx.labels.alias(label)?;
        joins.add_inner(
            &config.qualified_table(layer),
            alias,
            format!(
                "{}.{} = {}",
                alias,
                config.id_column(layer),
                match_column(ctx, label)?
            ),
            Some(label),
        );

        let operand = constraints.resolve_attribute(&Scope::global(), path)?;
        joins.merge(operand.joins);
        payload.push(operand.sql.clone());
        group_by.push(operand.sql);
        columns.push(path.clone());
        descriptor =
            descriptor.with_attribute(AttributeDescriptor::new(path, operand.kind.name()));
    }

    for function in &spec.functions {
        let sql = match function {
            AnalysisFunction::Frequency => "count(*)".to_string(),
            AnalysisFunction::DistinctFrequency(label) => {
                format!("count(DISTINCT {})", match_column(ctx, label)?)
            }
            AnalysisFunction::Total(layer) => total(ctx, layer)?,
        };
        payload.push(sql);
        columns.push(function.column_name());
        descriptor =
            descriptor.with_attribute(AttributeDescriptor::new(function.column_name(), "number"));
    }

    if payload.is_empty() {
        return Err(CompileError::Structural(format!(
            "analysis '{}' requests nothing",
            spec.label
        )));
    }

    if let Some(filter) = &spec.filter {
        if !columns.contains(&filter.column) {
            return Err(CompileError::ReferenceError(format!(
                "filter of '{}' refers to unknown column '{}'",
                spec.label, filter.column
            )));
        }
        ctx.post_processes.insert(index, vec![filter.clone()]);
    }

    let select = SelectBuilder::new()
        .from(format!("match_list {}", MATCHES))
        .joins(joins.render())
        .group_by(group_by);
    Ok((payload, select, descriptor))
}

/// Number of units of a layer inside the matched segments
fn total(ctx: &QueryData<'_>, layer: &str) -> Result<String> {
    let config = ctx.config;
    config.layer(layer)?;

    let segment = ctx
        .entities
        .iter()
        .find(|label| {
            ctx.labels
                .layer_of(label)
                .is_ok_and(|l| config.is_segment(l))
        })
        .ok_or_else(|| {
            CompileError::Structural(format!(
                "total({}) needs a matched {} unit",
                layer,
                config.segment_layer()
            ))
        })?;
    let matched = format!("array_agg(DISTINCT {})", match_column(ctx, segment)?);
    let segment_key = ctx.segment_key();
    let table = config.qualified_table(layer);

    if config.is_token(layer) || config.is_segment(layer) {
        return Ok(format!(
            "(SELECT count(*) FROM {} tot WHERE tot.{} = ANY({}))",
            table, segment_key, matched
        ));
    }

    let range = if config.is_stream_anchored(layer) {
        "char_range"
    } else if config.is_time_anchored(layer) && config.is_time_anchored(config.segment_layer()) {
        "frame_range"
    } else {
        return Err(CompileError::TypeError(format!(
            "total({}) needs a layer anchored like {}",
            layer,
            config.segment_layer()
        )));
    };
    Ok(format!(
        "(SELECT count(DISTINCT tot.{}) FROM {} tot JOIN {} tot_seg ON tot_seg.{} && tot.{} \
         WHERE tot_seg.{} = ANY({}))",
        config.id_column(layer),
        table,
        config.qualified_table(config.segment_layer()),
        range,
        range,
        segment_key,
        matched
    ))
}
