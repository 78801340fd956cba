//! Compiled query output
//!
//! The SQL statement together with the metadata an executor needs to
//! demultiplex `(rstype, payload)` rows.

use crate::ast::FilterSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of one compilation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledQuery {
    /// Complete SQL statement (terminated by `;`)
    pub sql: String,

    /// Description of every result set in `rstype` order
    pub metadata: QueryMetadata,

    /// Row filters keyed by result index, applied after execution
    #[serde(default)]
    pub post_processes: BTreeMap<usize, Vec<FilterSpec>>,
}

/// Metadata describing the result sets of a compiled query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub result_sets: Vec<ResultDescriptor>,
}

impl QueryMetadata {
    /// Look up a result set by `rstype`
    pub fn result_set(&self, index: usize) -> Option<&ResultDescriptor> {
        self.result_sets.get(index)
    }
}

/// Shape of one result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    /// Synthetic total match count (`res0`)
    Total,
    Plain,
    Analysis,
    Collocation,
}

/// One result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDescriptor {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: ResultKind,

    pub attributes: Vec<AttributeDescriptor>,
}

impl ResultDescriptor {
    pub fn new(name: impl Into<String>, kind: ResultKind) -> Self {
        Self {
            name: name.into(),
            kind,
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// One column of a result payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub name: String,

    /// Value type (`text`, `number`, `entity`, `entities`, `frame_range`, ...)
    #[serde(rename = "type")]
    pub kind: String,

    /// Nested entity structure of KWIC payloads
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<AttributeDescriptor>,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            nested: Vec::new(),
        }
    }

    pub fn with_nested(mut self, nested: Vec<AttributeDescriptor>) -> Self {
        self.nested = nested;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_serialization() {
        let descriptor = ResultDescriptor::new("freq", ResultKind::Analysis)
            .with_attribute(AttributeDescriptor::new("lemma", "text"));
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["type"], "analysis");
        assert_eq!(json["attributes"][0]["name"], "lemma");
        assert!(json["attributes"][0].get("nested").is_none());
    }
}
