//! Result specification AST nodes
//!
//! Each specification becomes one `res{n}` result set in the compiled statement.

use super::operator::Operator;
use serde::{Deserialize, Serialize};

/// Requested result shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResultSpec {
    /// Key word in context
    Plain(PlainResult),
    /// Frequency analysis
    Analysis(AnalysisResult),
    /// Collocation counts
    Collocation(CollocationResult),
}

impl ResultSpec {
    pub fn label(&self) -> &str {
        match self {
            ResultSpec::Plain(spec) => &spec.label,
            ResultSpec::Analysis(spec) => &spec.label,
            ResultSpec::Collocation(spec) => &spec.label,
        }
    }

    /// Query labels this specification refers to
    pub fn referenced_labels(&self) -> Vec<&str> {
        match self {
            ResultSpec::Plain(spec) => {
                let mut labels = vec![spec.context.as_str()];
                labels.extend(
                    spec.entities
                        .iter()
                        .filter(|entity| entity.as_str() != "*")
                        .map(String::as_str),
                );
                labels
            }
            ResultSpec::Analysis(spec) => {
                let mut labels: Vec<&str> = spec
                    .attributes
                    .iter()
                    .map(|path| path.split('.').next().unwrap_or(path))
                    .collect();
                for function in &spec.functions {
                    if let AnalysisFunction::DistinctFrequency(label) = function {
                        labels.push(label);
                    }
                }
                labels
            }
            ResultSpec::Collocation(spec) => spec
                .center
                .iter()
                .chain(spec.space.iter())
                .map(String::as_str)
                .collect(),
        }
    }
}

/// KWIC listing of matched context with component entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlainResult {
    pub label: String,
    /// Label of the context unit (usually a segment)
    pub context: String,
    /// Entity labels; `*` means every token in the context
    pub entities: Vec<String>,
}

/// Aggregate computed per group of a frequency analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisFunction {
    /// `count(*)`
    Frequency,
    /// `count(DISTINCT label)`
    DistinctFrequency(String),
    /// Denominator: number of units of a layer in the matched contexts
    Total(String),
}

impl AnalysisFunction {
    /// Parse `frequency`, `frequency(label)` or `total(Layer)`
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("frequency") {
            return Some(AnalysisFunction::Frequency);
        }
        let (name, rest) = text.split_once('(')?;
        let argument = rest.strip_suffix(')')?.trim();
        if argument.is_empty() {
            return None;
        }
        match name.trim().to_ascii_lowercase().as_str() {
            "frequency" => Some(AnalysisFunction::DistinctFrequency(argument.to_string())),
            "total" => Some(AnalysisFunction::Total(argument.to_string())),
            _ => None,
        }
    }

    /// Column name of this aggregate in the result rows
    pub fn column_name(&self) -> String {
        match self {
            AnalysisFunction::Frequency => "frequency".to_string(),
            AnalysisFunction::DistinctFrequency(label) => format!("frequency_{}", label),
            AnalysisFunction::Total(layer) => format!("total_{}", layer.to_lowercase()),
        }
    }
}

/// Row filter applied downstream on raw result rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub column: String,
    pub operator: Operator,
    pub value: serde_json::Value,
}

/// Frequency analysis over attribute projections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub label: String,
    /// Attribute paths such as `t.lemma`
    pub attributes: Vec<String>,
    pub functions: Vec<AnalysisFunction>,
    #[serde(default)]
    pub filter: Option<FilterSpec>,
}

/// Token window around the collocation center
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub left: i64,
    pub right: i64,
}

/// Observed vs expected co-occurrence of an attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollocationResult {
    pub label: String,
    pub center: Option<String>,
    pub window: Option<Window>,
    pub space: Option<String>,
    pub attribute: String,
}

impl CollocationResult {
    pub const DEFAULT_ATTRIBUTE: &'static str = "lemma";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analysis_functions() {
        assert_eq!(AnalysisFunction::parse("frequency"), Some(AnalysisFunction::Frequency));
        assert_eq!(
            AnalysisFunction::parse("frequency(s)"),
            Some(AnalysisFunction::DistinctFrequency("s".to_string()))
        );
        assert_eq!(
            AnalysisFunction::parse("total(Token)"),
            Some(AnalysisFunction::Total("Token".to_string()))
        );
        assert_eq!(AnalysisFunction::parse("median(t)"), None);
        assert_eq!(AnalysisFunction::parse("total()"), None);
    }

    #[test]
    fn test_column_names() {
        assert_eq!(AnalysisFunction::Total("Token".into()).column_name(), "total_token");
        assert_eq!(
            AnalysisFunction::DistinctFrequency("s".into()).column_name(),
            "frequency_s"
        );
    }

    #[test]
    fn test_referenced_labels() {
        let plain = ResultSpec::Plain(PlainResult {
            label: "kwic".into(),
            context: "s".into(),
            entities: vec!["*".into(), "t".into()],
        });
        assert_eq!(plain.referenced_labels(), vec!["s", "t"]);

        let analysis = ResultSpec::Analysis(AnalysisResult {
            label: "freq".into(),
            attributes: vec!["t.lemma".into()],
            functions: vec![AnalysisFunction::DistinctFrequency("s".into())],
            filter: None,
        });
        assert_eq!(analysis.referenced_labels(), vec!["t", "s"]);
    }
}
