//! Results compiler
//!
//! Every result specification becomes a `res{n}` CTE over `match_list`
//! producing `(rstype, payload)` rows, plus a descriptor of its payload.
//! `res0` always carries the total number of matches.

mod analysis;
mod collocation;
mod plain;

use crate::context::QueryData;
use crate::error::{CompileError, Result};
use crate::sql::{Cte, SelectBuilder};
use corpql_core::ast::ResultSpec;
use corpql_core::output::{AttributeDescriptor, ResultDescriptor, ResultKind};
use corpql_core::QueryMetadata;

/// Alias of `match_list` inside result CTEs
pub(crate) const MATCHES: &str = "ml";

/// Result CTEs in statement order and their metadata in `rstype` order
#[derive(Debug, Clone)]
pub struct CompiledResults {
    pub ctes: Vec<Cte>,
    /// Names of the CTEs in `UNION ALL` order
    pub union: Vec<String>,
    pub metadata: QueryMetadata,
}

/// Compiles result specifications against a finished context
pub struct ResultsCompiler<'c, 'a> {
    ctx: &'c mut QueryData<'a>,
}

impl<'c, 'a> ResultsCompiler<'c, 'a> {
    pub fn new(ctx: &'c mut QueryData<'a>) -> Self {
        Self { ctx }
    }

    pub fn compile(&mut self, results: &[ResultSpec]) -> Result<CompiledResults> {
        let mut ctes = Vec::new();
        let mut descriptors = vec![ResultDescriptor::new("total", ResultKind::Total)
            .with_attribute(AttributeDescriptor::new("total", "number"))];

        for (i, spec) in results.iter().enumerate() {
            let index = i + 1;
            let (payload, select, descriptor) = match spec {
                ResultSpec::Plain(plain) => plain::compile(self.ctx, plain)?,
                ResultSpec::Analysis(analysis) => analysis::compile(self.ctx, index, analysis)?,
                ResultSpec::Collocation(collocation) => {
                    collocation::compile(self.ctx, collocation)?
                }
            };
            ctes.push(result_cte(index, payload, select));
            descriptors.push(descriptor);
        }

        let total = SelectBuilder::new().from(format!("match_list {}", MATCHES));
        ctes.push(result_cte(0, vec!["count(*)".to_string()], total));

        let union = (0..=results.len()).map(|i| format!("res{}", i)).collect();
        Ok(CompiledResults {
            ctes,
            union,
            metadata: QueryMetadata {
                result_sets: descriptors,
            },
        })
    }
}

/// `res{n}`: `SELECT n::int2 AS rstype, jsonb_build_array(...) AS payload ...`
fn result_cte(index: usize, payload: Vec<String>, select: SelectBuilder) -> Cte {
    let select = select
        .column(format!("{}::int2 AS rstype", index))
        .column(format!("jsonb_build_array({}) AS payload", payload.join(", ")));
    Cte::select(format!("res{}", index), select)
}

/// `match_list` column of a label selected by `fixed_parts`
fn match_column(ctx: &QueryData<'_>, label: &str) -> Result<String> {
    let alias = ctx.labels.alias(label)?;
    if ctx.selects.contains_key(alias) {
        Ok(format!("{}.{}", MATCHES, alias))
    } else {
        Err(CompileError::ReferenceError(format!(
            "'{}' is not part of the matched rows",
            label
        )))
    }
}
