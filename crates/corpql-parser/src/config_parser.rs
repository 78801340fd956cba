//! Corpus configuration parser
//!
//! Loads a `CorpusConfig` from JSON or YAML and checks that the layer graph
//! it describes is consistent.

use crate::error::{ParseError, Result};
use corpql_core::config::{AttributeType, CorpusConfig};
use std::path::Path;

/// Corpus configuration parser
pub struct ConfigParser;

impl ConfigParser {
    /// Parse a configuration from a JSON string
    pub fn from_json_str(json_str: &str) -> Result<CorpusConfig> {
        let config: CorpusConfig = serde_json::from_str(json_str)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Parse a configuration from a YAML string
    pub fn from_yaml_str(yaml_str: &str) -> Result<CorpusConfig> {
        let config: CorpusConfig = serde_yaml::from_str(yaml_str)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load a configuration file; `.yaml`/`.yml` are read as YAML, anything else as JSON
    pub fn from_path(path: impl AsRef<Path>) -> Result<CorpusConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    /// Check cross references between layers
    pub fn validate(config: &CorpusConfig) -> Result<()> {
        for (role, layer) in [
            ("firstClass.token", &config.first_class.token),
            ("firstClass.segment", &config.first_class.segment),
            ("firstClass.document", &config.first_class.document),
        ] {
            if !config.has_layer(layer) {
                return Err(ParseError::InvalidValue {
                    field: role.to_string(),
                    message: format!("layer '{}' is not declared", layer),
                });
            }
        }

        for (name, layer) in &config.layers {
            if let Some(contained) = &layer.contains {
                if !config.has_layer(contained) {
                    return Err(ParseError::InvalidValue {
                        field: format!("layer.{}.contains", name),
                        message: format!("layer '{}' is not declared", contained),
                    });
                }
            }

            for (attribute, declaration) in &layer.attributes {
                if declaration.kind != AttributeType::Entity {
                    continue;
                }
                match &declaration.entity {
                    Some(target) if config.has_layer(target) => {}
                    Some(target) => {
                        return Err(ParseError::InvalidValue {
                            field: format!("layer.{}.attributes.{}", name, attribute),
                            message: format!("entity layer '{}' is not declared", target),
                        })
                    }
                    None => {
                        return Err(ParseError::MissingField {
                            field: format!("layer.{}.attributes.{}.entity", name, attribute),
                        })
                    }
                }
            }
        }

        for (name, mapping) in &config.mapping.layers {
            if !config.has_layer(name) {
                log::warn!("mapping for undeclared layer '{}' is ignored", name);
                continue;
            }
            for attribute in mapping.attributes.keys() {
                if config.attribute(name, attribute).is_err() {
                    log::warn!(
                        "mapping for undeclared attribute '{}.{}' is ignored",
                        name,
                        attribute
                    );
                }
            }
        }

        if let Some(fts) = &config.mapping.fts {
            for column in &fts.columns {
                if config.attribute(&config.first_class.token, column).is_err() {
                    return Err(ParseError::InvalidValue {
                        field: "mapping.fts.columns".to_string(),
                        message: format!("'{}' is not a token attribute", column),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "schema": "c", "batch": "0",
        "layer": {
            "Token": {"layerType": "unit"},
            "Segment": {"layerType": "span", "contains": "Token"},
            "Document": {"layerType": "span", "contains": "Segment"}
        }
    }"#;

    #[test]
    fn test_minimal_config() {
        let config = ConfigParser::from_json_str(MINIMAL).unwrap();
        assert_eq!(config.schema, "c");
        assert!(config.mapping.fts.is_none());
    }

    #[test]
    fn test_missing_first_class_layer() {
        let json = r#"{"schema": "c", "batch": "0", "layer": {"Token": {"layerType": "unit"}}}"#;
        let err = ConfigParser::from_json_str(json).unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { ref field, .. } if field == "firstClass.segment"));
    }
}
