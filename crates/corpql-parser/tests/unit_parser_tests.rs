//! Unit tests for the query and configuration parsers

use corpql_core::ast::*;
use corpql_parser::*;
use std::io::Write;

// =============================================================================
// Query Parser Tests
// =============================================================================

#[test]
fn test_parse_token_in_segment() {
    let json = r#"{
        "query": [
            {"unit": {"layer": "Segment", "label": "s"}},
            {"unit": {
                "layer": "Token", "label": "t", "partOf": "s",
                "constraints": [
                    {"constraint": {"left": {"attribute": "form"}, "comparator": "=", "right": {"string": "dog"}}}
                ]
            }}
        ],
        "results": [
            {"resultsPlain": {"label": "kwic", "context": "s", "entities": ["t"]}}
        ]
    }"#;

    let query = QueryParser::parse(json).unwrap();
    assert_eq!(query.nodes.len(), 2);
    assert_eq!(query.results.len(), 1);

    match &query.nodes[1] {
        QueryNode::Unit(unit) => {
            assert_eq!(unit.layer, "Token");
            assert_eq!(unit.part_of.as_deref(), Some("s"));
            match &unit.constraints[0] {
                ConstraintItem::Constraint(c) => {
                    assert_eq!(c.left, Reference::attribute("form"));
                    assert_eq!(c.operator, Operator::Eq);
                    assert_eq!(c.right, Reference::string("dog"));
                }
                other => panic!("Expected constraint, got {:?}", other),
            }
        }
        other => panic!("Expected unit, got {:?}", other),
    }
}

#[test]
fn test_parse_flat_array_document() {
    let json = r#"[
        {"unit": {"layer": "Segment", "label": "s"}},
        {"resultsAnalysis": {"label": "freq", "attributes": ["t.lemma"], "functions": ["frequency"]}}
    ]"#;

    let query = QueryParser::parse(json).unwrap();
    assert_eq!(query.nodes.len(), 1);
    match &query.results[0] {
        ResultSpec::Analysis(spec) => {
            assert_eq!(spec.functions, vec![AnalysisFunction::Frequency]);
            assert!(spec.filter.is_none());
        }
        other => panic!("Expected analysis, got {:?}", other),
    }
}

#[test]
fn test_parse_sequence_with_gap() {
    let json = r#"{"query": [
        {"sequence": {"label": "seq", "partOf": "s", "members": [
            {"unit": {"layer": "Token", "label": "t1"}},
            {"sequence": {"repetition": {"min": "0", "max": "*"}, "members": [
                {"unit": {"layer": "Token"}}
            ]}},
            {"unit": {"layer": "Token", "label": "t2"}}
        ]}}
    ]}"#;

    let query = QueryParser::parse(json).unwrap();
    let QueryNode::Sequence(sequence) = &query.nodes[0] else {
        panic!("Expected sequence");
    };
    assert_eq!(sequence.members.len(), 3);
    assert!(sequence.repetition.is_once());
    let SequenceMember::Sequence(gap) = &sequence.members[1] else {
        panic!("Expected nested sequence");
    };
    assert_eq!(gap.repetition, Repetition::new(0, None));
}

#[test]
fn test_parse_quantified_group() {
    let json = r#"{"query": [
        {"unit": {"layer": "Segment", "label": "s", "constraints": [
            {"constraints": {"operator": "AND", "quantor": "NOT EXISTS", "args": [
                {"unit": {"layer": "Gesture", "label": "g", "partOf": "s"}}
            ]}}
        ]}}
    ]}"#;

    let query = QueryParser::parse(json).unwrap();
    let QueryNode::Unit(segment) = &query.nodes[0] else {
        panic!("Expected unit");
    };
    let ConstraintItem::Constraints(group) = &segment.constraints[0] else {
        panic!("Expected group");
    };
    assert_eq!(group.quantor, Some(Quantor::NotExists));
    assert!(matches!(group.args[0], ConstraintItem::Unit(_)));
}

#[test]
fn test_parse_references() {
    let json = r#"{"query": [
        {"constraint": {
            "left": {"math": {"operator": "-", "left": {"function": {"name": "position", "args": [{"entity": "t2"}]}}, "right": {"number": "1"}}},
            "comparator": ">=",
            "right": {"regex": "^a.*"},
            "modifiers": "i"
        }}
    ]}"#;

    let query = QueryParser::parse(json).unwrap();
    let QueryNode::Constraint(constraint) = &query.nodes[0] else {
        panic!("Expected constraint");
    };
    assert!(constraint.modifiers.case_insensitive);
    match &constraint.left {
        Reference::Math { operator, right, .. } => {
            assert_eq!(*operator, MathOperator::Sub);
            assert_eq!(**right, Reference::Number(1.0));
        }
        other => panic!("Expected math, got {:?}", other),
    }
}

#[test]
fn test_parse_time_constraint() {
    let json = r#"{"query": [
        {"timeConstraint": {"left": {"label": "g", "edge": "end"}, "comparator": "<",
                            "right": {"label": "t"}, "offset": "2s"}}
    ]}"#;

    let query = QueryParser::parse(json).unwrap();
    let QueryNode::TimeConstraint(constraint) = &query.nodes[0] else {
        panic!("Expected time constraint");
    };
    assert_eq!(constraint.left, TimeAnchor::end("g"));
    assert_eq!(constraint.right, TimeAnchor::start("t"));
    assert_eq!(constraint.offset.as_deref(), Some("2s"));
}

#[test]
fn test_parse_collocation_defaults() {
    let json = r#"{"query": [{"unit": {"layer": "Segment", "label": "s"}}], "results": [
        {"resultsCollocation": {"label": "coll", "center": "t", "window": {"leftSpan": -3, "rightSpan": 3}}}
    ]}"#;

    let query = QueryParser::parse(json).unwrap();
    let ResultSpec::Collocation(spec) = &query.results[0] else {
        panic!("Expected collocation");
    };
    assert_eq!(spec.attribute, "lemma");
    assert_eq!(spec.window, Some(Window { left: -3, right: 3 }));
}

#[test]
fn test_parse_errors() {
    assert!(matches!(
        QueryParser::parse(r#"{"query": [{"paragraph": {}}]}"#),
        Err(ParseError::UnknownNode { .. })
    ));
    assert!(matches!(
        QueryParser::parse(r#"{"query": [{"unit": {"label": "t"}}]}"#),
        Err(ParseError::MissingField { .. })
    ));
    assert!(matches!(
        QueryParser::parse(r#"{"query": []}"#),
        Err(ParseError::InvalidValue { .. })
    ));
    assert!(matches!(
        QueryParser::parse(r#"{"query": [{"constraint": {"left": {"attribute": "a"}, "comparator": "~~", "right": {"string": "b"}}}]}"#),
        Err(ParseError::InvalidOperator(_))
    ));
    assert!(matches!(QueryParser::parse("{not json"), Err(ParseError::JsonError(_))));
}

// =============================================================================
// Config Parser Tests
// =============================================================================

const CONFIG_YAML: &str = r#"
schema: bnc1
batch: "0"
layer:
  Token:
    layerType: unit
    attributes:
      form: {type: text}
      lemma: {type: text}
  Segment:
    layerType: span
    contains: Token
  Document:
    layerType: span
    contains: Segment
mapping:
  layer:
    Token:
      relation: token
      partitioned: true
  fts:
    relation: fts_vector
    columns: [form, lemma]
"#;

#[test]
fn test_config_from_yaml() {
    let config = ConfigParser::from_yaml_str(CONFIG_YAML).unwrap();
    assert_eq!(config.qualified_table("Token"), "bnc1.token0");
    assert_eq!(config.fts_index("lemma"), Some(2));
}

#[test]
fn test_config_from_path() -> anyhow::Result<()> {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
    file.write_all(CONFIG_YAML.as_bytes())?;

    let config = ConfigParser::from_path(file.path())?;
    assert_eq!(config.schema, "bnc1");
    Ok(())
}

#[test]
fn test_config_rejects_unknown_fts_column() {
    let yaml = CONFIG_YAML.replace("columns: [form, lemma]", "columns: [form, upos]");
    assert!(matches!(
        ConfigParser::from_yaml_str(&yaml),
        Err(ParseError::InvalidValue { .. })
    ));
}

#[test]
fn test_config_rejects_dangling_entity() {
    let yaml = CONFIG_YAML.replace(
        "      lemma: {type: text}",
        "      lemma: {type: text}\n      head: {type: entity, entity: Phrase}",
    );
    assert!(ConfigParser::from_yaml_str(&yaml).is_err());
}

#[test]
fn test_config_missing_file() {
    assert!(matches!(
        ConfigParser::from_path("/nonexistent/corpus.json"),
        Err(ParseError::IoError(_))
    ));
}
