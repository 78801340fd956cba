//! Layer definitions of a corpus configuration

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Names of the first-class layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstClass {
    pub document: String,
    pub segment: String,
    pub token: String,
}

impl Default for FirstClass {
    fn default() -> Self {
        Self {
            document: "Document".to_string(),
            segment: "Segment".to_string(),
            token: "Token".to_string(),
        }
    }
}

/// Structural kind of a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    /// Atomic layer (tokens)
    Unit,
    /// Layer spanning units of another layer
    Span,
    /// Binary relation between entities (e.g. dependencies)
    Relation,
}

/// Anchoring dimensions of a layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchoring {
    /// Character stream (`char_range`)
    #[serde(default)]
    pub stream: bool,
    /// Time line (`frame_range`)
    #[serde(default)]
    pub time: bool,
    /// Spatial box
    #[serde(default)]
    pub location: bool,
}

/// Attribute value kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    Text,
    Categorical,
    Number,
    Dict,
    Date,
    /// Bitmask of labels
    Labels,
    /// Reference to an entity of another layer
    Entity,
}

impl AttributeType {
    pub fn name(&self) -> &'static str {
        match self {
            AttributeType::Text => "text",
            AttributeType::Categorical => "categorical",
            AttributeType::Number => "number",
            AttributeType::Dict => "dict",
            AttributeType::Date => "date",
            AttributeType::Labels => "labels",
            AttributeType::Entity => "entity",
        }
    }
}

/// Attribute declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeConfig {
    #[serde(rename = "type")]
    pub kind: AttributeType,

    #[serde(default)]
    pub nullable: bool,

    /// Closed value set of categorical attributes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,

    /// Width of a labels bitmask
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbit: Option<u32>,

    /// Target layer of an entity attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl AttributeConfig {
    pub fn new(kind: AttributeType) -> Self {
        Self {
            kind,
            nullable: false,
            values: None,
            nbit: None,
            entity: None,
        }
    }
}

/// Layer declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerConfig {
    pub layer_type: LayerType,

    /// Layer this layer is made of
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,

    #[serde(default)]
    pub anchoring: Anchoring,

    #[serde(default)]
    pub attributes: IndexMap<String, AttributeConfig>,
}

impl LayerConfig {
    pub fn new(layer_type: LayerType) -> Self {
        Self {
            layer_type,
            contains: None,
            anchoring: Anchoring::default(),
            attributes: IndexMap::new(),
        }
    }

    pub fn with_contains(mut self, layer: impl Into<String>) -> Self {
        self.contains = Some(layer.into());
        self
    }

    pub fn with_anchoring(mut self, anchoring: Anchoring) -> Self {
        self.anchoring = anchoring;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attribute: AttributeConfig) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    pub fn is_relation(&self) -> bool {
        self.layer_type == LayerType::Relation
    }
}
