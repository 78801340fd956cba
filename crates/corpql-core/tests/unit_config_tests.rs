//! Unit tests for the corpus configuration model

use corpql_core::config::*;
use corpql_core::CoreError;
use serde_json::json;

fn load() -> CorpusConfig {
    serde_json::from_value(json!({
        "schema": "bnc1",
        "batch": "rest",
        "frameRate": 50,
        "layer": {
            "Token": {
                "layerType": "unit",
                "anchoring": {"stream": true},
                "attributes": {
                    "form": {"type": "text"},
                    "lemma": {"type": "text"},
                    "xpos": {"type": "categorical", "values": ["NN", "VB"]},
                    "ufeat": {"type": "dict"}
                }
            },
            "Segment": {"layerType": "span", "contains": "Token", "anchoring": {"stream": true}},
            "Document": {"layerType": "span", "contains": "Segment"},
            "Gesture": {
                "layerType": "span",
                "contains": "Token",
                "anchoring": {"time": true},
                "attributes": {"kind": {"type": "categorical"}}
            },
            "DepRel": {
                "layerType": "relation",
                "attributes": {
                    "source": {"type": "entity", "entity": "Token"},
                    "target": {"type": "entity", "entity": "Token"},
                    "udep": {"type": "categorical"}
                }
            }
        },
        "mapping": {
            "layer": {
                "Token": {
                    "relation": "token",
                    "partitioned": true,
                    "attributes": {
                        "form": {"lookup": "form", "key": "form_id"},
                        "lemma": {"lookup": "lemma"}
                    }
                },
                "Segment": {"relation": "segment", "partitioned": true},
                "DepRel": {"relation": "deprel", "partitioned": true, "idColumn": "deprel_id"}
            },
            "fts": {"relation": "fts_vector", "columns": ["form", "lemma", "xpos"]}
        },
        "tokenCounts": {"tokenrest": 42000}
    }))
    .unwrap()
}

#[test]
fn test_load_from_json() {
    let config = load();
    assert_eq!(config.schema, "bnc1");
    assert_eq!(config.frame_rate(), 50.0);
    assert_eq!(config.first_class.token, "Token");
    assert_eq!(config.layers.len(), 5);
    assert!(config.is_relation("DepRel"));
    assert!(config.is_time_anchored("Gesture"));
    assert!(!config.is_stream_anchored("Gesture"));
}

#[test]
fn test_layer_order_is_preserved() {
    let config = load();
    let names: Vec<&str> = config.layers.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["Token", "Segment", "Document", "Gesture", "DepRel"]);
}

#[test]
fn test_partitioned_tables() {
    let config = load();
    assert_eq!(config.qualified_table("Token"), "bnc1.tokenrest");
    assert_eq!(config.qualified_table("DepRel"), "bnc1.deprelrest");
    assert_eq!(config.qualified_table("Gesture"), "bnc1.gesture");
    assert_eq!(config.id_column("DepRel"), "deprel_id");
    assert_eq!(config.id_column("Segment"), "segment_id");
}

#[test]
fn test_fts_and_frequency_tables() {
    let config = load();
    assert_eq!(config.fts_table().as_deref(), Some("bnc1.fts_vectorrest"));
    assert_eq!(config.fts_index("form"), Some(1));
    assert_eq!(config.fts_index("xpos"), Some(3));
    assert_eq!(config.fts_index("ufeat"), None);
    assert_eq!(config.frequency_table("lemma"), "bnc1.freq_lemma_tokenrest");
    assert_eq!(config.batch_token_count(), Some(42000));
}

#[test]
fn test_lookup_key_defaults() {
    let config = load();
    let lemma = config.attribute_storage("Token", "lemma").unwrap();
    assert_eq!(lemma.column, "lemma_id");
    assert_eq!(lemma.lookup.unwrap().key, "lemma_id");
}

#[test]
fn test_unknown_layer() {
    let config = load();
    assert_eq!(
        config.layer("Sentence").unwrap_err(),
        CoreError::UnknownLayer("Sentence".to_string())
    );
}

#[test]
fn test_default_frame_rate() {
    let config = CorpusConfig::new("s", "0");
    assert_eq!(config.frame_rate(), DEFAULT_FRAME_RATE);
}

#[test]
fn test_mixed_case_names_are_quoted() -> anyhow::Result<()> {
    let mut config = load();
    config.schema = "BNC1".into();
    assert_eq!(config.qualified_table("Token"), "\"BNC1\".tokenrest");
    assert_eq!(config.fts_table().as_deref(), Some("\"BNC1\".fts_vectorrest"));

    let config: CorpusConfig = serde_json::from_value(json!({
        "schema": "my-corpus",
        "batch": "0",
        "layer": {
            "Token": {"layerType": "unit", "attributes": {"Form": {"type": "text"}}}
        },
        "mapping": {
            "layer": {"Token": {"relation": "Tok", "idColumn": "TokID"}}
        }
    }))?;
    assert_eq!(config.qualified_table("Token"), "\"my-corpus\".\"Tok\"");
    assert_eq!(config.id_column("Token"), "\"TokID\"");
    assert_eq!(config.attribute_storage("Token", "Form")?.column, "\"Form\"");
    Ok(())
}
