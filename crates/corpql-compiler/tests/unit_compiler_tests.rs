//! Unit tests for the compiler building blocks

use corpql_compiler::codegen::sequence::automaton::Nfa;
use corpql_compiler::semantic::{LabelKind, Position};
use corpql_compiler::{
    Automaton, CompileError, Compiler, CompilerOptions, ErrorKind, LabelNormalizer, LabelTable,
    Pattern, Symbol,
};
use corpql_core::config::{Anchoring, AttributeConfig, AttributeType, LayerConfig, LayerType};
use corpql_core::CorpusConfig;
use corpql_parser::QueryParser;

fn corpus() -> CorpusConfig {
    let timed = Anchoring {
        stream: true,
        time: true,
        location: false,
    };
    CorpusConfig::new("corpus", "0")
        .with_layer(
            "Token",
            LayerConfig::new(LayerType::Unit)
                .with_attribute("form", AttributeConfig::new(AttributeType::Text))
                .with_attribute("upos", AttributeConfig::new(AttributeType::Categorical)),
        )
        .with_layer(
            "Segment",
            LayerConfig::new(LayerType::Span)
                .with_contains("Token")
                .with_anchoring(timed),
        )
        .with_layer(
            "Document",
            LayerConfig::new(LayerType::Span).with_contains("Segment"),
        )
        .with_layer(
            "Gesture",
            LayerConfig::new(LayerType::Span).with_anchoring(Anchoring {
                time: true,
                ..Anchoring::default()
            }),
        )
}

fn labels(json: &str) -> LabelTable {
    let query = LabelNormalizer::normalize(&QueryParser::parse(json).unwrap());
    LabelTable::build(&query, &corpus()).unwrap()
}

// =============================================================================
// Automaton
// =============================================================================

fn sym(label: &str) -> Pattern {
    Pattern::Symbol(Symbol::new(label, "seq"))
}

/// Every word over the alphabet up to a length, shortest first
fn words(alphabet: &[Symbol], max_len: usize) -> Vec<Vec<Symbol>> {
    let mut all = vec![Vec::new()];
    let mut frontier = vec![Vec::new()];
    for _ in 0..max_len {
        let mut next = Vec::new();
        for word in &frontier {
            for symbol in alphabet {
                let mut longer: Vec<Symbol> = word.clone();
                longer.push(symbol.clone());
                next.push(longer);
            }
        }
        all.extend(next.iter().cloned());
        frontier = next;
    }
    all
}

#[test]
fn test_minimal_automaton_matches_nfa() {
    let alphabet = [
        Symbol::new("a", "seq"),
        Symbol::new("b", "seq"),
        Symbol::new("c", "seq"),
    ];
    let words = words(&alphabet, 6);

    for min in 0..=3u32 {
        for max in [Some(min), Some(min + 1), Some(min + 2), None] {
            let patterns = [
                Pattern::repeat(sym("a"), min, max),
                Pattern::Concat(vec![Pattern::repeat(sym("a"), min, max), sym("b")]),
                Pattern::Concat(vec![
                    Pattern::repeat(
                        Pattern::Alt(vec![sym("a"), Pattern::Concat(vec![sym("b"), sym("c")])]),
                        min,
                        max,
                    ),
                    sym("c"),
                ]),
            ];
            for pattern in &patterns {
                let nfa = Nfa::from_pattern(pattern);
                let automaton = Automaton::build(pattern);
                for word in &words {
                    assert_eq!(
                        nfa.accepts(word),
                        automaton.accepts(word),
                        "{:?} on {:?}",
                        pattern,
                        word
                    );
                }
                assert_eq!(automaton.accepts_empty(), pattern.accepts_empty());
            }
        }
    }
}

#[test]
fn test_reversed_pattern_accepts_reversed_words() {
    let pattern = Pattern::Concat(vec![
        sym("a"),
        Pattern::repeat(sym("b"), 1, Some(2)),
        sym("c"),
    ]);
    let forward = Automaton::build(&pattern);
    let backward = Automaton::build(&pattern.reversed());
    let alphabet = [
        Symbol::new("a", "seq"),
        Symbol::new("b", "seq"),
        Symbol::new("c", "seq"),
    ];
    for word in words(&alphabet, 5) {
        let mut reversed = word.clone();
        reversed.reverse();
        assert_eq!(forward.accepts(&word), backward.accepts(&reversed));
    }
}

#[test]
fn test_automaton_is_minimal_for_bounded_repeat() {
    // a{0,2}: start, after one, after two
    let automaton = Automaton::build(&Pattern::repeat(sym("a"), 0, Some(2)));
    assert_eq!(automaton.state_count, 3);
    assert_eq!(automaton.accepting.len(), 3);
}

// =============================================================================
// Labels
// =============================================================================

#[test]
fn test_every_node_gets_a_label() {
    let table = labels(
        r#"{"query": [
            {"unit": {"layer": "Segment"}},
            {"sequence": {"partOf": "_segment0", "members": [
                {"unit": {"layer": "Token"}},
                {"sequence": {"repetition": {"min": 0, "max": 2}, "members": [
                    {"unit": {"layer": "Token"}}
                ]}},
                {"unit": {"layer": "Token"}}
            ]}}
        ]}"#,
    );
    let names: Vec<&str> = table.iter().map(|info| info.label.as_str()).collect();
    assert_eq!(
        names,
        vec!["_segment0", "_seq0", "_token0", "_seq1", "_token1", "_token2"]
    );
    assert_eq!(table.require("_seq0").unwrap().kind, LabelKind::Sequence);
    assert_eq!(
        table.require("_token1").unwrap().position,
        Position::Repeated {
            sequence: "_seq0".to_string()
        }
    );
}

#[test]
fn test_legal_references() {
    let table = labels(
        r#"{"query": [
            {"unit": {"layer": "Segment", "label": "s", "constraints": [
                {"unit": {"layer": "Gesture", "label": "g", "quantor": "EXISTS", "partOf": "s"}}
            ]}},
            {"sequence": {"label": "seq", "partOf": "s", "members": [
                {"unit": {"layer": "Token", "label": "t1"}},
                {"sequence": {"label": "gap", "repetition": {"min": 0, "max": "*"}, "members": [
                    {"unit": {"layer": "Token", "label": "x"}}
                ]}},
                {"unit": {"layer": "Token", "label": "t2"}}
            ]}}
        ]}"#,
    );
    let legal: Vec<&str> = table.legal_references().into_iter().collect();
    assert_eq!(legal, vec!["s", "seq", "t1", "t2"]);
    assert!(!table.is_legal("g"));
    assert!(!table.is_legal("x"));
    assert_eq!(table.sequence_width_for("s"), 2);
}

#[test]
fn test_aliases_are_sql_safe() {
    let table = labels(
        r#"{"query": [
            {"unit": {"layer": "Segment", "label": "Sentence 1"}},
            {"unit": {"layer": "Token", "label": "2nd", "partOf": "Sentence 1"}}
        ]}"#,
    );
    assert_eq!(table.alias("Sentence 1").unwrap(), "sentence_1");
    assert_eq!(table.alias("2nd").unwrap(), "_2nd");
}

#[test]
fn test_label_bound_to_two_layers() {
    let query = QueryParser::parse(
        r#"{"query": [
            {"unit": {"layer": "Segment", "label": "x"}},
            {"unit": {"layer": "Token", "label": "x"}}
        ]}"#,
    )
    .unwrap();
    let err = LabelTable::build(&query, &corpus()).unwrap_err();
    assert!(matches!(err, CompileError::SyntaxError(_)));
}

#[test]
fn test_unknown_part_of_target() {
    let query = QueryParser::parse(
        r#"{"query": [{"unit": {"layer": "Token", "label": "t", "partOf": "nowhere"}}]}"#,
    )
    .unwrap();
    let err = LabelTable::build(&query, &corpus()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Reference);
}

// =============================================================================
// Compiler options
// =============================================================================

const TIMED: &str = r#"{"query": [
    {"unit": {"layer": "Segment", "label": "s"}},
    {"unit": {"layer": "Gesture", "label": "g", "partOf": "s"}},
    {"timeConstraint": {"left": {"label": "g", "edge": "end"}, "comparator": "<",
                        "right": {"label": "s"}, "offset": "2s"}}
]}"#;

#[test]
fn test_time_offset_uses_corpus_frame_rate() -> anyhow::Result<()> {
    let compiler = Compiler::with_options(CompilerOptions {
        pretty: false,
        ..CompilerOptions::default()
    });
    let compiled = compiler.compile_document(TIMED, &corpus())?;
    assert!(compiled
        .sql
        .contains("upper(g.frame_range) < lower(s.frame_range) + 50"));
    assert!(compiled.sql.contains("s.frame_range @> g.frame_range"));
    Ok(())
}

#[test]
fn test_frame_rate_option_overrides_corpus() {
    let compiler = Compiler::with_options(CompilerOptions {
        pretty: false,
        frame_rate: Some(10.0),
        ..CompilerOptions::default()
    });
    let compiled = compiler.compile_document(TIMED, &corpus()).unwrap();
    assert!(compiled
        .sql
        .contains("upper(g.frame_range) < lower(s.frame_range) + 20"));
}

#[test]
fn test_time_constraint_on_untimed_layer() {
    let err = Compiler::new()
        .compile_document(
            r#"{"query": [
                {"unit": {"layer": "Segment", "label": "s"}},
                {"unit": {"layer": "Token", "label": "t", "partOf": "s"}},
                {"timeConstraint": {"left": {"label": "t"}, "comparator": "<",
                                    "right": {"label": "s"}}}
            ]}"#,
            &corpus(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
}

#[test]
fn test_reference_validation_can_be_skipped() {
    let document = r#"{
        "query": [{"unit": {"layer": "Segment", "label": "s"}}],
        "results": [{"resultsPlain": {"label": "kwic", "context": "s", "entities": ["nobody"]}}]
    }"#;
    let strict = Compiler::new().compile_document(document, &corpus());
    assert_eq!(strict.unwrap_err().kind(), ErrorKind::Reference);

    // the results compiler still refuses the unknown label
    let lenient = Compiler::with_options(CompilerOptions {
        validate_references: false,
        ..CompilerOptions::default()
    })
    .compile_document(document, &corpus());
    assert_eq!(lenient.unwrap_err().kind(), ErrorKind::Reference);
}
