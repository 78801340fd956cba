//! KWIC Report Example
//!
//! This example demonstrates:
//! - Building a query tree in code instead of loading a JSON document
//! - An unbounded gap between two tokens (compiled to a recursive traversal)
//! - Reading the result-set descriptors that tell a runner how to decode rows

use corpql_compiler::{Compiler, CompilerOptions};
use corpql_core::ast::{
    Constraint, Operator, PlainResult, Query, QueryNode, Reference, ResultSpec, Sequence,
    SequenceMember, Unit,
};
use corpql_core::output::AttributeDescriptor;
use corpql_parser::ConfigParser;

fn token(label: &str, lemma: &str) -> SequenceMember {
    SequenceMember::Unit(Unit::new("Token").with_label(label).with_constraint(
        Constraint::new(
            Reference::attribute("lemma"),
            Operator::Eq,
            Reference::string(lemma),
        ),
    ))
}

fn describe(attribute: &AttributeDescriptor, depth: usize) {
    println!("{}{} ({})", "  ".repeat(depth), attribute.name, attribute.kind);
    for nested in &attribute.nested {
        describe(nested, depth + 1);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== KWIC Report Example ===\n");

    let config = ConfigParser::from_path("demos/data/corpus.yaml")?;

    // "dog", any number of tokens, then "bark"
    let gap = SequenceMember::Sequence(
        Sequence::new(vec![SequenceMember::Unit(Unit::new("Token"))])
            .with_label("gap")
            .with_repetition(0, None),
    );
    let query = Query::new(vec![
        QueryNode::Unit(Unit::new("Segment").with_label("s")),
        QueryNode::Sequence(
            Sequence::new(vec![token("t1", "dog"), gap, token("t2", "bark")])
                .with_label("phrase")
                .part_of("s"),
        ),
    ])
    .with_result(ResultSpec::Plain(PlainResult {
        label: "kwic".to_string(),
        context: "s".to_string(),
        entities: vec!["*".to_string()],
    }));

    let compiler = Compiler::with_options(CompilerOptions {
        pretty: true,
        ..CompilerOptions::default()
    });
    let compiled = compiler.compile(&query, &config)?;

    println!("Generated SQL:\n{}\n", compiled.sql);

    println!("Result sets:");
    for (rstype, set) in compiled.metadata.result_sets.iter().enumerate() {
        println!("rstype {}: {} ({:?})", rstype, set.name, set.kind);
        for attribute in &set.attributes {
            describe(attribute, 1);
        }
    }

    Ok(())
}
