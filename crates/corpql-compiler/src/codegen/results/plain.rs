//! KWIC results

use super::{match_column, MATCHES};
use crate::context::{LayoutItem, QueryData, SequenceLayout};
use crate::error::{CompileError, Result};
use crate::semantic::LabelKind;
use crate::sql::SelectBuilder;
use corpql_core::ast::PlainResult;
use corpql_core::output::{AttributeDescriptor, ResultDescriptor, ResultKind};

/// One rendered entity of a KWIC payload
struct Entity {
    sql: String,
    descriptor: AttributeDescriptor,
}

pub(super) fn compile(
    ctx: &QueryData<'_>,
    spec: &PlainResult,
) -> Result<(Vec<String>, SelectBuilder, ResultDescriptor)> {
    let layer = ctx.labels.layer_of(&spec.context)?.to_string();
    let context = match_column(ctx, &spec.context)?;

    let mut entities = Vec::new();
    for requested in &spec.entities {
        if requested == "*" {
            entities.extend(every_token(ctx)?);
        } else {
            entities.push(entity(ctx, requested)?);
        }
    }

    let mut payload = vec![
        context.clone(),
        format!(
            "jsonb_build_array({})",
            entities
                .iter()
                .map(|e| e.sql.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    ];
    let mut descriptor = ResultDescriptor::new(&spec.label, ResultKind::Plain)
        .with_attribute(AttributeDescriptor::new(&spec.context, "entity"))
        .with_attribute(
            AttributeDescriptor::new("entities", "list")
                .with_nested(entities.into_iter().map(|e| e.descriptor).collect()),
        );

    if ctx.config.is_time_anchored(&layer) {
        let id = ctx.config.id_column(&layer);
        payload.push(format!(
            "(SELECT jsonb_build_array(lower(kwic_ctx.frame_range), upper(kwic_ctx.frame_range)) \
             FROM {} kwic_ctx WHERE kwic_ctx.{} = {})",
            ctx.config.qualified_table(&layer),
            id,
            context
        ));
        descriptor =
            descriptor.with_attribute(AttributeDescriptor::new("frame_range", "frame_range"));
    }

    let select = SelectBuilder::new().from(format!("match_list {}", MATCHES));
    Ok((payload, select, descriptor))
}

/// Token entities, disjunction members and traversal paths, in declaration order
fn every_token(ctx: &QueryData<'_>) -> Result<Vec<Entity>> {
    let mut entities = Vec::new();
    for label in &ctx.entities {
        let layer = ctx.labels.layer_of(label)?;
        if ctx.config.is_token(layer) {
            entities.push(entity(ctx, label)?);
        }
    }
    for traversal in &ctx.traversals {
        entities.push(Entity {
            sql: traversal.reported_path(MATCHES),
            descriptor: AttributeDescriptor::new(traversal.sequence.clone(), "path"),
        });
    }
    Ok(entities)
}

fn entity(ctx: &QueryData<'_>, label: &str) -> Result<Entity> {
    let info = ctx.labels.require(label)?;
    match info.kind {
        LabelKind::Set => Ok(Entity {
            sql: match_column(ctx, label)?,
            descriptor: AttributeDescriptor::new(label, "entities"),
        }),
        LabelKind::Sequence => {
            let layout = ctx.sequences.get(label).ok_or_else(|| {
                CompileError::ReferenceError(format!("sequence '{}' is not top-level", label))
            })?;
            sequence(ctx, layout)
        }
        LabelKind::Disjunction => {
            let members = ctx.disjunctions.get(label).ok_or_else(|| {
                CompileError::ReferenceError(format!("disjunction '{}' is not top-level", label))
            })?;
            let mut nested = Vec::new();
            for member in members {
                nested.push(entity(ctx, member)?);
            }
            Ok(group(label, "disjunction", nested))
        }
        LabelKind::Unit => {
            let column = match_column(ctx, label)?;
            let layer = ctx.labels.layer_of(label)?;
            if ctx.config.contains_tokens(layer) {
                Ok(Entity {
                    sql: contained_tokens(ctx, layer, &column),
                    descriptor: AttributeDescriptor::new(label, "entities"),
                })
            } else {
                Ok(Entity {
                    sql: column,
                    descriptor: AttributeDescriptor::new(label, "entity"),
                })
            }
        }
    }
}

fn sequence(ctx: &QueryData<'_>, layout: &SequenceLayout) -> Result<Entity> {
    let mut nested = Vec::new();
    for item in &layout.items {
        nested.push(match item {
            LayoutItem::Anchor(label) => entity(ctx, label)?,
            LayoutItem::Span { prev, next } => Entity {
                sql: format!(
                    "(SELECT coalesce(jsonb_agg(kwic_gap ORDER BY kwic_gap), '[]'::jsonb) \
                     FROM generate_series({} + 1, {} - 1) kwic_gap)",
                    match_column(ctx, prev)?,
                    match_column(ctx, next)?
                ),
                descriptor: AttributeDescriptor::new(format!("{}..{}", prev, next), "entities"),
            },
            LayoutItem::Path(index) => {
                let traversal = ctx.traversals.get(*index).ok_or_else(|| {
                    CompileError::Structural(format!("no traversal{}", index))
                })?;
                Entity {
                    sql: traversal.reported_path(MATCHES),
                    descriptor: AttributeDescriptor::new(traversal.name(), "path"),
                }
            }
        });
    }
    Ok(group(&layout.label, "sequence", nested))
}

fn group(label: &str, kind: &str, nested: Vec<Entity>) -> Entity {
    let sql = format!(
        "jsonb_build_array({})",
        nested
            .iter()
            .map(|e| e.sql.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Entity {
        sql,
        descriptor: AttributeDescriptor::new(label, kind)
            .with_nested(nested.into_iter().map(|e| e.descriptor).collect()),
    }
}

/// Ids of the tokens a span covers
fn contained_tokens(ctx: &QueryData<'_>, layer: &str, column: &str) -> String {
    let token_id = ctx.token_id();
    format!(
        "(SELECT coalesce(jsonb_agg(kwic_tok.{} ORDER BY kwic_tok.{}), '[]'::jsonb) \
         FROM {} kwic_tok JOIN {} kwic_span ON kwic_span.{} = {} \
         WHERE kwic_span.char_range @> kwic_tok.char_range)",
        token_id,
        token_id,
        ctx.token_table(),
        ctx.config.qualified_table(layer),
        ctx.config.id_column(layer),
        column
    )
}
