//! Physical mapping of layers onto tables

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Physical mapping section of a corpus configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    #[serde(rename = "layer", default)]
    pub layers: IndexMap<String, LayerMapping>,

    /// Full-text vector table used for prefiltering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fts: Option<FtsMapping>,
}

/// Table backing one layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerMapping {
    /// Table name (defaults to the lower-cased layer name)
    #[serde(default)]
    pub relation: Option<String>,

    /// Whether the table is split into per-batch partitions
    #[serde(default)]
    pub partitioned: bool,

    /// Primary key column (defaults to `{relation}_id`)
    #[serde(default)]
    pub id_column: Option<String>,

    #[serde(default)]
    pub attributes: IndexMap<String, AttributeMapping>,
}

/// Storage of one attribute
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeMapping {
    /// Column on the layer table (defaults to the attribute name)
    #[serde(default)]
    pub column: Option<String>,

    /// Lookup table holding the attribute values
    #[serde(default)]
    pub lookup: Option<String>,

    /// Key column shared by the layer table and the lookup table
    #[serde(default)]
    pub key: Option<String>,
}

/// Full-text vector table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FtsMapping {
    /// Table name (partitioned like the token table)
    pub relation: String,

    /// Token attributes encoded in the vector, in lexeme-prefix order
    pub columns: Vec<String>,
}
