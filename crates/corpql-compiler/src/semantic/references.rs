//! Result reference validation

use super::labels::{LabelKind, LabelTable};
use crate::error::{CompileError, Result};
use corpql_core::ast::{AnalysisFunction, Query, ResultSpec};
use corpql_core::CorpusConfig;

/// Checks that result specifications only name reachable labels
pub struct ReferenceValidator<'a> {
    config: &'a CorpusConfig,
    labels: &'a LabelTable,
}

impl<'a> ReferenceValidator<'a> {
    pub fn new(config: &'a CorpusConfig, labels: &'a LabelTable) -> Self {
        Self { config, labels }
    }

    /// Validate every result specification of the query
    pub fn validate(&self, query: &Query) -> Result<()> {
        for spec in &query.results {
            self.validate_spec(spec)?;
        }
        Ok(())
    }

    fn validate_spec(&self, spec: &ResultSpec) -> Result<()> {
        for label in spec.referenced_labels() {
            self.legal(label, spec.label())?;
        }

        match spec {
            ResultSpec::Plain(plain) => {
                let context = self.labels.require(&plain.context)?;
                if context.kind != LabelKind::Unit {
                    return Err(CompileError::TypeError(format!(
                        "context '{}' of result '{}' is not a unit",
                        plain.context, plain.label
                    )));
                }
                Ok(())
            }
            ResultSpec::Analysis(analysis) => {
                if analysis.attributes.is_empty() && analysis.functions.is_empty() {
                    return Err(CompileError::Structural(format!(
                        "analysis '{}' requests neither attributes nor functions",
                        analysis.label
                    )));
                }
                for path in &analysis.attributes {
                    let Some((label, attribute)) = path.split_once('.') else {
                        return Err(CompileError::SyntaxError(format!(
                            "analysis attribute '{}' must have the form label.attribute",
                            path
                        )));
                    };
                    let layer = self.labels.layer_of(label)?;
                    let head = attribute.split('.').next().unwrap_or(attribute);
                    self.config.attribute(layer, head)?;
                }
                for function in &analysis.functions {
                    if let AnalysisFunction::Total(layer) = function {
                        if !self.config.has_layer(layer) {
                            return Err(CompileError::ReferenceError(format!(
                                "unknown layer '{}' in total()",
                                layer
                            )));
                        }
                    }
                }
                Ok(())
            }
            ResultSpec::Collocation(collocation) => {
                match (&collocation.center, &collocation.window, &collocation.space) {
                    (Some(center), Some(_), None) => {
                        let layer = self.labels.layer_of(center)?;
                        if !self.config.is_token(layer) {
                            return Err(CompileError::TypeError(format!(
                                "collocation center '{}' is not a token",
                                center
                            )));
                        }
                    }
                    (None, None, Some(space)) => {
                        self.labels.require(space)?;
                    }
                    _ => {
                        return Err(CompileError::Structural(format!(
                            "collocation '{}' needs either center and window or space",
                            collocation.label
                        )))
                    }
                }
                self.config
                    .attribute(self.config.token_layer(), &collocation.attribute)?;
                Ok(())
            }
        }
    }

    fn legal(&self, label: &str, result: &str) -> Result<()> {
        if self.labels.is_legal(label) {
            Ok(())
        } else if self.labels.contains(label) {
            Err(CompileError::ReferenceError(format!(
                "result '{}' refers to '{}', which is not reachable from the top level",
                result, label
            )))
        } else {
            Err(CompileError::ReferenceError(format!(
                "result '{}' refers to unknown label '{}'",
                result, label
            )))
        }
    }
}
