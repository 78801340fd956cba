//! Compile Query Example
//!
//! Compiles a JSON query document against a corpus configuration and prints
//! the generated SQL, the result-set metadata and the deferred filters.
//!
//! Usage: `cargo run --example compile_query [query.json] [corpus.yaml]`
//! Set `RUST_LOG=corpql_compiler=trace` to see the statement being logged.

use anyhow::Context;
use corpql_compiler::Compiler;
use corpql_parser::ConfigParser;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("corpql_compiler=debug".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let query_path = args
        .next()
        .unwrap_or_else(|| "demos/data/kwic_query.json".to_string());
    let config_path = args
        .next()
        .unwrap_or_else(|| "demos/data/corpus.yaml".to_string());

    let config = ConfigParser::from_path(&config_path)
        .with_context(|| format!("loading corpus configuration {}", config_path))?;
    let document = std::fs::read_to_string(&query_path)
        .with_context(|| format!("reading query document {}", query_path))?;

    let compiled = Compiler::new()
        .compile_document(&document, &config)
        .with_context(|| format!("compiling {}", query_path))?;

    println!("{}", "=".repeat(80));
    println!("SQL");
    println!("{}", "=".repeat(80));
    println!("{}", compiled.sql);
    println!();

    println!("{}", "-".repeat(80));
    println!("Result sets");
    println!("{}", "-".repeat(80));
    println!("{}", serde_json::to_string_pretty(&compiled.metadata)?);

    if !compiled.post_processes.is_empty() {
        println!();
        println!("Deferred filters:");
        for (set, filters) in &compiled.post_processes {
            for filter in filters {
                println!(
                    "  res{}: {} {} {}",
                    set,
                    filter.column,
                    filter.operator.symbol(),
                    filter.value
                );
            }
        }
    }

    Ok(())
}
