//! Main compiler interface
//!
//! Provides the high-level API for compiling corpql queries to SQL.

use crate::codegen::{QueryAssembler, ResultsCompiler};
use crate::context::QueryData;
use crate::error::{CompileError, Result};
use crate::semantic::{LabelNormalizer, LabelTable, ReferenceValidator};
use crate::sql::Statement;
use corpql_core::{CompiledQuery, CorpusConfig, Query};
use corpql_parser::QueryParser;
use serde::{Deserialize, Serialize};

/// Compiler options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Render the statement over several lines
    pub pretty: bool,

    /// Restrict segments through the full-text vector table when the
    /// corpus provides one
    pub enable_prefilter: bool,

    /// Check result specifications against the label table before
    /// generating SQL
    pub validate_references: bool,

    /// Frames per second for time constraints, overriding the corpus value
    pub frame_rate: Option<f64>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            pretty: true,
            enable_prefilter: true,
            validate_references: true,
            frame_rate: None,
        }
    }
}

/// corpql compiler
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompilerOptions,
}

impl Compiler {
    /// Create a new compiler with default options
    pub fn new() -> Self {
        Self::with_options(CompilerOptions::default())
    }

    /// Create a new compiler with custom options
    pub fn with_options(options: CompilerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile a query tree against a corpus configuration
    pub fn compile(&self, query: &Query, config: &CorpusConfig) -> Result<CompiledQuery> {
        if query.nodes.is_empty() {
            return Err(CompileError::Structural("query has no nodes".to_string()));
        }

        // Semantic analysis
        let query = LabelNormalizer::normalize(query);
        let labels = LabelTable::build(&query, config)?;
        if self.options.validate_references {
            ReferenceValidator::new(config, &labels).validate(&query)?;
        }

        // Code generation
        let mut ctx = QueryData::new(config, &self.options, &labels);
        let ctes = QueryAssembler::new(&mut ctx).assemble(&query)?;
        let results = ResultsCompiler::new(&mut ctx).compile(&query.results)?;

        let mut statement = Statement::new().ctes(ctes).ctes(results.ctes);
        for name in results.union {
            statement = statement.union_member(name);
        }
        let sql = statement.render(self.options.pretty);

        tracing::debug!(
            labels = labels.iter().count(),
            traversals = ctx.traversals.len(),
            results = results.metadata.result_sets.len(),
            "compiled query"
        );
        tracing::trace!(sql = %sql, "generated SQL");

        Ok(CompiledQuery {
            sql,
            metadata: results.metadata,
            post_processes: ctx.post_processes,
        })
    }

    /// Parse a JSON query document and compile it
    pub fn compile_document(&self, json: &str, config: &CorpusConfig) -> Result<CompiledQuery> {
        let query = QueryParser::parse(json)
            .map_err(|e| CompileError::Structural(format!("invalid query document: {}", e)))?;
        self.compile(&query, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let compiler = Compiler::new();
        assert!(compiler.options().pretty);
        assert!(compiler.options().enable_prefilter);
        assert!(compiler.options().frame_rate.is_none());
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: CompilerOptions = serde_json::from_str(r#"{"pretty": false}"#).unwrap();
        assert!(!options.pretty);
        assert!(options.validate_references);
    }

    #[test]
    fn test_empty_query_is_structural() {
        let config = CorpusConfig::new("corpus", "0");
        let err = Compiler::new()
            .compile(&Query::new(vec![]), &config)
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Structural);
    }
}
