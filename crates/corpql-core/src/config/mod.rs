//! Corpus configuration
//!
//! Describes the layers of a corpus, their attributes and the tables they are
//! stored in, together with the batch/language context of one compilation.

mod layer;
mod mapping;

pub use layer::{Anchoring, AttributeConfig, AttributeType, FirstClass, LayerConfig, LayerType};
pub use mapping::{AttributeMapping, FtsMapping, LayerMapping, Mapping};

use crate::error::{CoreError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Quote a SQL identifier unless it is plain lower-case (`BNC1` -> `"BNC1"`)
pub fn quote_identifier(name: &str) -> String {
    let mut chars = name.chars();
    let plain = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Frames per second of time-anchored corpora when the configuration is silent
pub const DEFAULT_FRAME_RATE: f64 = 25.0;

/// Immutable corpus configuration for one compilation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusConfig {
    /// Database schema of the corpus
    pub schema: String,

    /// Partition suffix of the current batch (e.g. `"0"`, `"rest"`)
    pub batch: String,

    /// Language partition of multilingual corpora
    #[serde(default)]
    pub language: Option<String>,

    #[serde(default)]
    pub frame_rate: Option<f64>,

    #[serde(default)]
    pub first_class: FirstClass,

    #[serde(rename = "layer")]
    pub layers: IndexMap<String, LayerConfig>,

    #[serde(default)]
    pub mapping: Mapping,

    /// Number of tokens per batch table
    #[serde(default)]
    pub token_counts: IndexMap<String, u64>,
}

/// Where an attribute's value lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeStorage {
    /// Column on the layer table
    pub column: String,
    /// Lookup table holding the value, if any
    pub lookup: Option<Lookup>,
}

/// Lookup table of an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    /// Schema-qualified table name
    pub table: String,
    /// Key column shared with the layer table
    pub key: String,
    /// Column holding the value
    pub value: String,
}

impl CorpusConfig {
    /// Create a configuration with the default first-class layer names
    pub fn new(schema: impl Into<String>, batch: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            batch: batch.into(),
            language: None,
            frame_rate: None,
            first_class: FirstClass::default(),
            layers: IndexMap::new(),
            mapping: Mapping::default(),
            token_counts: IndexMap::new(),
        }
    }

    pub fn with_layer(mut self, name: impl Into<String>, layer: LayerConfig) -> Self {
        self.layers.insert(name.into(), layer);
        self
    }

    pub fn with_mapping(mut self, name: impl Into<String>, mapping: LayerMapping) -> Self {
        self.mapping.layers.insert(name.into(), mapping);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Get a layer by name
    pub fn layer(&self, name: &str) -> Result<&LayerConfig> {
        self.layers
            .get(name)
            .ok_or_else(|| CoreError::UnknownLayer(name.to_string()))
    }

    /// Get an attribute declaration of a layer
    pub fn attribute(&self, layer: &str, attribute: &str) -> Result<&AttributeConfig> {
        self.layer(layer)?
            .attributes
            .get(attribute)
            .ok_or_else(|| CoreError::UnknownAttribute {
                layer: layer.to_string(),
                attribute: attribute.to_string(),
            })
    }

    pub fn has_layer(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    pub fn token_layer(&self) -> &str {
        &self.first_class.token
    }

    pub fn segment_layer(&self) -> &str {
        &self.first_class.segment
    }

    pub fn document_layer(&self) -> &str {
        &self.first_class.document
    }

    pub fn is_token(&self, layer: &str) -> bool {
        layer == self.first_class.token
    }

    pub fn is_segment(&self, layer: &str) -> bool {
        layer == self.first_class.segment
    }

    /// Segment, document, or any span layer built (transitively) out of segments
    pub fn is_segment_level(&self, layer: &str) -> bool {
        let mut current = layer;
        // bounded walk; a cyclic `contains` chain is a configuration error
        for _ in 0..=self.layers.len() {
            if current == self.first_class.segment || current == self.first_class.document {
                return true;
            }
            match self.layers.get(current).and_then(|l| l.contains.as_deref()) {
                Some(next) => current = next,
                None => return false,
            }
        }
        log::warn!("cyclic 'contains' chain starting at layer {}", layer);
        false
    }

    /// Span layer whose `contains` is the token layer (excluding segments)
    pub fn contains_tokens(&self, layer: &str) -> bool {
        !self.is_segment(layer)
            && self
                .layers
                .get(layer)
                .and_then(|l| l.contains.as_deref())
                .is_some_and(|contained| contained == self.first_class.token)
    }

    pub fn is_relation(&self, layer: &str) -> bool {
        self.layers.get(layer).is_some_and(LayerConfig::is_relation)
    }

    pub fn is_time_anchored(&self, layer: &str) -> bool {
        self.layers.get(layer).is_some_and(|l| l.anchoring.time)
    }

    pub fn is_stream_anchored(&self, layer: &str) -> bool {
        // tokens and segments are always stream-anchored
        self.is_token(layer)
            || self.is_segment(layer)
            || self.layers.get(layer).is_some_and(|l| l.anchoring.stream)
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate.unwrap_or(DEFAULT_FRAME_RATE)
    }

    fn layer_mapping(&self, layer: &str) -> Option<&LayerMapping> {
        self.mapping.layers.get(layer)
    }

    fn relation_name(&self, layer: &str) -> String {
        self.layer_mapping(layer)
            .and_then(|m| m.relation.clone())
            .unwrap_or_else(|| layer.to_lowercase())
    }

    /// Suffix appended to partitioned tables (`[_{language}]{batch}`)
    pub fn partition_suffix(&self) -> String {
        match &self.language {
            Some(language) => format!("_{}{}", language, self.batch),
            None => self.batch.clone(),
        }
    }

    /// Unqualified table name of a layer in the current batch
    pub fn table(&self, layer: &str) -> String {
        let relation = self.relation_name(layer);
        let partitioned = self.layer_mapping(layer).is_some_and(|m| m.partitioned);
        if partitioned {
            format!("{}{}", relation, self.partition_suffix())
        } else {
            relation
        }
    }

    /// Schema-qualified table name of a layer in the current batch
    pub fn qualified_table(&self, layer: &str) -> String {
        self.qualify(&self.table(layer))
    }

    /// Prefix a table name with the corpus schema, quoting both as needed
    pub fn qualify(&self, table: &str) -> String {
        format!("{}.{}", quote_identifier(&self.schema), quote_identifier(table))
    }

    /// Primary key column of a layer
    pub fn id_column(&self, layer: &str) -> String {
        self.layer_mapping(layer)
            .and_then(|m| m.id_column.clone())
            .map(|column| quote_identifier(&column))
            .unwrap_or_else(|| quote_identifier(&format!("{}_id", self.relation_name(layer))))
    }

    /// Resolve where an attribute is stored
    pub fn attribute_storage(&self, layer: &str, attribute: &str) -> Result<AttributeStorage> {
        let declared = self.attribute(layer, attribute)?;
        let mapped = self
            .layer_mapping(layer)
            .and_then(|m| m.attributes.get(attribute));

        let column = mapped
            .and_then(|m| m.column.clone())
            .unwrap_or_else(|| attribute.to_string());

        let lookup = match (declared.kind, mapped.and_then(|m| m.lookup.as_deref())) {
            (AttributeType::Labels, lookup) => {
                let table = lookup
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{}_labels", attribute));
                Some(Lookup {
                    table: self.qualify(&table),
                    key: "bit".to_string(),
                    value: "label".to_string(),
                })
            }
            (_, Some(table)) => {
                let key = mapped
                    .and_then(|m| m.key.clone())
                    .unwrap_or_else(|| format!("{}_id", attribute));
                Some(Lookup {
                    table: self.qualify(table),
                    key: quote_identifier(&key),
                    value: quote_identifier(attribute),
                })
            }
            (_, None) => None,
        };

        let column = match (&lookup, declared.kind) {
            (Some(lookup), kind) if kind != AttributeType::Labels => lookup.key.clone(),
            _ => column,
        };

        Ok(AttributeStorage {
            column: quote_identifier(&column),
            lookup,
        })
    }

    /// Table holding the full-text vectors of the current batch
    pub fn fts_table(&self) -> Option<String> {
        self.mapping
            .fts
            .as_ref()
            .map(|fts| self.qualify(&format!("{}{}", fts.relation, self.partition_suffix())))
    }

    /// 1-based lexeme prefix of an attribute in the full-text vector
    pub fn fts_index(&self, attribute: &str) -> Option<usize> {
        self.mapping
            .fts
            .as_ref()
            .and_then(|fts| fts.columns.iter().position(|c| c == attribute))
            .map(|i| i + 1)
    }

    /// Per-batch frequency table of a token attribute
    pub fn frequency_table(&self, attribute: &str) -> String {
        let token_table = self.table(&self.first_class.token);
        self.qualify(&format!("freq_{}_{}", attribute, token_table))
    }

    /// Number of tokens in the current batch, if known
    pub fn batch_token_count(&self) -> Option<u64> {
        let token_table = self.table(&self.first_class.token);
        self.token_counts.get(&token_table).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CorpusConfig {
        CorpusConfig::new("bnc1", "0")
            .with_layer(
                "Token",
                LayerConfig::new(LayerType::Unit)
                    .with_attribute("form", AttributeConfig::new(AttributeType::Text))
                    .with_attribute("upos", AttributeConfig::new(AttributeType::Categorical)),
            )
            .with_layer(
                "Segment",
                LayerConfig::new(LayerType::Span).with_contains("Token"),
            )
            .with_layer(
                "Document",
                LayerConfig::new(LayerType::Span).with_contains("Segment"),
            )
            .with_layer(
                "Turn",
                LayerConfig::new(LayerType::Span).with_contains("Segment"),
            )
            .with_layer(
                "NamedEntity",
                LayerConfig::new(LayerType::Span).with_contains("Token"),
            )
            .with_mapping(
                "Token",
                LayerMapping {
                    relation: Some("token".into()),
                    partitioned: true,
                    id_column: None,
                    attributes: IndexMap::from([(
                        "form".to_string(),
                        AttributeMapping {
                            column: None,
                            lookup: Some("form".into()),
                            key: None,
                        },
                    )]),
                },
            )
    }

    #[test]
    fn test_table_names() {
        let config = config();
        assert_eq!(config.qualified_table("Token"), "bnc1.token0");
        assert_eq!(config.qualified_table("Document"), "bnc1.document");
        assert_eq!(config.id_column("Token"), "token_id");

        let config = config.with_language("en");
        assert_eq!(config.table("Token"), "token_en0");
    }

    #[test]
    fn test_identifiers_are_quoted() {
        assert_eq!(quote_identifier("token_id"), "token_id");
        assert_eq!(quote_identifier("_token0"), "_token0");
        assert_eq!(quote_identifier("Token"), "\"Token\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");

        let mut config = config();
        config.schema = "BNC1".into();
        assert_eq!(config.qualified_table("Token"), "\"BNC1\".token0");
        config.schema = "my-corpus".into();
        assert_eq!(config.qualified_table("Document"), "\"my-corpus\".document");
        assert_eq!(config.id_column("Document"), "document_id");
    }

    #[test]
    fn test_segment_level() {
        let config = config();
        assert!(config.is_segment_level("Segment"));
        assert!(config.is_segment_level("Document"));
        assert!(config.is_segment_level("Turn"));
        assert!(!config.is_segment_level("NamedEntity"));
        assert!(config.contains_tokens("NamedEntity"));
        assert!(!config.contains_tokens("Segment"));
    }

    #[test]
    fn test_attribute_storage() {
        let config = config();
        let form = config.attribute_storage("Token", "form").unwrap();
        assert_eq!(form.column, "form_id");
        let lookup = form.lookup.unwrap();
        assert_eq!(lookup.table, "bnc1.form");
        assert_eq!(lookup.value, "form");

        let upos = config.attribute_storage("Token", "upos").unwrap();
        assert_eq!(upos.column, "upos");
        assert!(upos.lookup.is_none());

        assert!(matches!(
            config.attribute_storage("Token", "gloss"),
            Err(CoreError::UnknownAttribute { .. })
        ));
    }
}
