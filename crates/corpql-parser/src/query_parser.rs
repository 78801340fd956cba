//! Query parser
//!
//! Parses JSON query documents into Query AST nodes.
//!
//! A document is either `{"query": [...], "results": [...]}` or a flat array
//! mixing query nodes and `results*` entries. Every node is an object with
//! exactly one key naming its kind.

use crate::error::{ParseError, Result};
use crate::json_parser::JsonParser;
use corpql_core::ast::{
    AnalysisFunction, AnalysisResult, CollocationResult, Constraint, ConstraintItem, Constraints,
    Disjunction, Edge, FilterSpec, LogicalOperator, MathOperator, Modifiers, Operator,
    PlainResult, Quantor, Query, QueryNode, Reference, Repetition, ResultSpec, Sequence,
    SequenceMember, SetObject, TimeAnchor, TimeConstraint, Unit, Window,
};
use serde_json::Value as JsonValue;

/// Query parser
pub struct QueryParser;

impl QueryParser {
    /// Parse a query from a JSON string
    pub fn parse(json_str: &str) -> Result<Query> {
        let json = JsonParser::parse(json_str)?;
        Self::parse_from_json(&json)
    }

    /// Parse a query from a JSON value
    pub fn parse_from_json(json: &JsonValue) -> Result<Query> {
        let mut query = Query::default();

        let (nodes, results): (&[JsonValue], &[JsonValue]) = match json {
            JsonValue::Array(items) => (items.as_slice(), &[]),
            JsonValue::Object(_) => (
                JsonParser::get_array(json, "query")?,
                JsonParser::get_optional_array(json, "results")?,
            ),
            other => {
                return Err(ParseError::TypeMismatch {
                    field: "query".to_string(),
                    expected: "object or array".to_string(),
                    actual: JsonParser::type_name(other).to_string(),
                })
            }
        };

        for node in nodes {
            let (kind, _) = JsonParser::single_key(node, "query")?;
            if kind.starts_with("results") {
                query.results.push(Self::parse_result(node)?);
            } else {
                query.nodes.push(Self::parse_node(node)?);
            }
        }
        for result in results {
            query.results.push(Self::parse_result(result)?);
        }

        if query.nodes.is_empty() {
            return Err(ParseError::InvalidValue {
                field: "query".to_string(),
                message: "query has no nodes".to_string(),
            });
        }

        Ok(query)
    }

    /// Parse one top-level node
    pub fn parse_node(value: &JsonValue) -> Result<QueryNode> {
        let (kind, body) = JsonParser::single_key(value, "query")?;
        match kind {
            "unit" => Ok(QueryNode::Unit(Self::parse_unit(body)?)),
            "sequence" => Ok(QueryNode::Sequence(Self::parse_sequence(body)?)),
            "disjunction" => Ok(QueryNode::Disjunction(Self::parse_disjunction(body)?)),
            "set" => Ok(QueryNode::Set(Self::parse_set(body)?)),
            "constraint" => Ok(QueryNode::Constraint(Self::parse_constraint(body)?)),
            "constraints" => Ok(QueryNode::Constraints(Self::parse_constraints(body)?)),
            "timeConstraint" => Ok(QueryNode::TimeConstraint(Self::parse_time_constraint(
                body,
            )?)),
            other => Err(ParseError::UnknownNode {
                kind: other.to_string(),
                context: "query".to_string(),
            }),
        }
    }

    /// Parse a unit body
    pub fn parse_unit(body: &JsonValue) -> Result<Unit> {
        let layer = JsonParser::get_string(body, "layer")?;
        let quantor = JsonParser::get_optional_string(body, "quantor")
            .map(|q| Self::parse_quantor(&q))
            .transpose()?;

        let constraints = JsonParser::get_optional_array(body, "constraints")?
            .iter()
            .map(Self::parse_constraint_item)
            .collect::<Result<Vec<_>>>()?;

        Ok(Unit {
            layer,
            label: JsonParser::get_optional_string(body, "label"),
            part_of: JsonParser::get_optional_string(body, "partOf"),
            quantor,
            constraints,
        })
    }

    fn parse_sequence(body: &JsonValue) -> Result<Sequence> {
        let members = Self::parse_members(body, "sequence")?;
        let repetition = match body.get("repetition") {
            None | Some(JsonValue::Null) => Repetition::once(),
            Some(repetition) => Self::parse_repetition(repetition)?,
        };

        Ok(Sequence {
            label: JsonParser::get_optional_string(body, "label"),
            part_of: JsonParser::get_optional_string(body, "partOf"),
            members,
            repetition,
        })
    }

    fn parse_disjunction(body: &JsonValue) -> Result<Disjunction> {
        let members = Self::parse_members(body, "disjunction")?;
        if members.is_empty() {
            return Err(ParseError::InvalidValue {
                field: "disjunction".to_string(),
                message: "disjunction has no members".to_string(),
            });
        }
        Ok(Disjunction {
            label: JsonParser::get_optional_string(body, "label"),
            members,
        })
    }

    fn parse_set(body: &JsonValue) -> Result<SetObject> {
        let label = JsonParser::get_string(body, "label")?;
        let unit_value = JsonParser::get_field(body, "unit")?;
        // accept both `{"unit": {...}}` and a bare unit body
        let unit = match unit_value.get("unit") {
            Some(inner) => Self::parse_unit(inner)?,
            None => Self::parse_unit(unit_value)?,
        };
        Ok(SetObject { label, unit })
    }

    fn parse_members(body: &JsonValue, context: &str) -> Result<Vec<SequenceMember>> {
        JsonParser::get_array(body, "members")?
            .iter()
            .map(|member| {
                let (kind, inner) = JsonParser::single_key(member, context)?;
                match kind {
                    "unit" => Ok(SequenceMember::Unit(Self::parse_unit(inner)?)),
                    "sequence" => Ok(SequenceMember::Sequence(Self::parse_sequence(inner)?)),
                    "disjunction" => {
                        Ok(SequenceMember::Disjunction(Self::parse_disjunction(inner)?))
                    }
                    other => Err(ParseError::UnknownNode {
                        kind: other.to_string(),
                        context: context.to_string(),
                    }),
                }
            })
            .collect()
    }

    /// Parse `{"min": .., "max": ..}`; `max` of `-1` or `"*"` is unbounded
    pub fn parse_repetition(value: &JsonValue) -> Result<Repetition> {
        let min = JsonParser::get_optional_i64(value, "min")?.unwrap_or(1);
        if min < 0 {
            return Err(ParseError::InvalidValue {
                field: "repetition.min".to_string(),
                message: format!("negative minimum {}", min),
            });
        }

        let max = match value.get("max") {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(s)) if s.trim() == "*" => None,
            Some(other) => match JsonParser::to_i64(other, "repetition.max")? {
                -1 => None,
                n if n < min => {
                    return Err(ParseError::InvalidValue {
                        field: "repetition.max".to_string(),
                        message: format!("maximum {} is below minimum {}", n, min),
                    })
                }
                n => Some(n as u32),
            },
        };

        Ok(Repetition::new(min as u32, max))
    }

    fn parse_constraint_item(value: &JsonValue) -> Result<ConstraintItem> {
        let (kind, body) = JsonParser::single_key(value, "constraints")?;
        match kind {
            "constraint" => Ok(ConstraintItem::Constraint(Self::parse_constraint(body)?)),
            "constraints" => Ok(ConstraintItem::Constraints(Self::parse_constraints(body)?)),
            "timeConstraint" => Ok(ConstraintItem::Time(Self::parse_time_constraint(body)?)),
            "unit" => Ok(ConstraintItem::Unit(Self::parse_unit(body)?)),
            other => Err(ParseError::UnknownNode {
                kind: other.to_string(),
                context: "constraints".to_string(),
            }),
        }
    }

    /// Parse a binary comparison
    pub fn parse_constraint(body: &JsonValue) -> Result<Constraint> {
        let left = Self::parse_reference(JsonParser::get_field(body, "left")?)?;
        let right = Self::parse_reference(JsonParser::get_field(body, "right")?)?;
        let operator = Self::parse_operator(&JsonParser::get_string(body, "comparator")?)?;
        let modifiers = JsonParser::get_optional_string(body, "modifiers")
            .map(|flags| Self::parse_modifiers(&flags))
            .transpose()?
            .unwrap_or_default();

        Ok(Constraint {
            left,
            operator,
            right,
            modifiers,
        })
    }

    fn parse_constraints(body: &JsonValue) -> Result<Constraints> {
        let name = JsonParser::get_string(body, "operator")?;
        let operator = LogicalOperator::from_name(&name)
            .ok_or_else(|| ParseError::InvalidOperator(name.clone()))?;
        let args = JsonParser::get_array(body, "args")?
            .iter()
            .map(Self::parse_constraint_item)
            .collect::<Result<Vec<_>>>()?;

        if args.is_empty() {
            return Err(ParseError::InvalidValue {
                field: "constraints.args".to_string(),
                message: format!("{} group has no arguments", name),
            });
        }

        let quantor = JsonParser::get_optional_string(body, "quantor")
            .map(|q| Self::parse_quantor(&q))
            .transpose()?;

        Ok(Constraints {
            operator,
            args,
            quantor,
        })
    }

    fn parse_time_constraint(body: &JsonValue) -> Result<TimeConstraint> {
        let operator = Self::parse_operator(&JsonParser::get_string(body, "comparator")?)?;
        if operator.is_containment() {
            return Err(ParseError::InvalidOperator(operator.symbol().to_string()));
        }
        Ok(TimeConstraint {
            left: Self::parse_time_anchor(JsonParser::get_field(body, "left")?)?,
            operator,
            right: Self::parse_time_anchor(JsonParser::get_field(body, "right")?)?,
            offset: JsonParser::get_optional_string(body, "offset"),
        })
    }

    fn parse_time_anchor(value: &JsonValue) -> Result<TimeAnchor> {
        let label = JsonParser::get_string(value, "label")?;
        let edge = match JsonParser::get_optional_string(value, "edge").as_deref() {
            None | Some("start") => Edge::Start,
            Some("end") => Edge::End,
            Some(other) => {
                return Err(ParseError::InvalidValue {
                    field: "edge".to_string(),
                    message: format!("expected 'start' or 'end', got '{}'", other),
                })
            }
        };
        Ok(TimeAnchor { label, edge })
    }

    /// Parse a reference object such as `{"attribute": "lemma"}`
    pub fn parse_reference(value: &JsonValue) -> Result<Reference> {
        let (kind, body) = JsonParser::single_key(value, "reference")?;
        let text = |field: &str| -> Result<String> {
            body.as_str()
                .map(str::to_string)
                .ok_or_else(|| ParseError::TypeMismatch {
                    field: field.to_string(),
                    expected: "string".to_string(),
                    actual: JsonParser::type_name(body).to_string(),
                })
        };

        match kind {
            "string" => Ok(Reference::String(text("string")?)),
            "regex" => Ok(Reference::Regex(text("regex")?)),
            "attribute" => Ok(Reference::Attribute(text("attribute")?)),
            "entity" => Ok(Reference::Entity(text("entity")?)),
            "number" => {
                let number = match body {
                    JsonValue::Number(n) => n.as_f64(),
                    JsonValue::String(s) => s.trim().parse().ok(),
                    _ => None,
                };
                number
                    .map(Reference::Number)
                    .ok_or_else(|| ParseError::InvalidValue {
                        field: "number".to_string(),
                        message: body.to_string(),
                    })
            }
            "function" => {
                let name = JsonParser::get_string(body, "name")?;
                let args = JsonParser::get_optional_array(body, "args")?
                    .iter()
                    .map(Self::parse_reference)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Reference::Function { name, args })
            }
            "math" => {
                let symbol = JsonParser::get_string(body, "operator")?;
                let operator = MathOperator::from_symbol(&symbol)
                    .ok_or(ParseError::InvalidOperator(symbol))?;
                Ok(Reference::math(
                    operator,
                    Self::parse_reference(JsonParser::get_field(body, "left")?)?,
                    Self::parse_reference(JsonParser::get_field(body, "right")?)?,
                ))
            }
            other => Err(ParseError::UnknownNode {
                kind: other.to_string(),
                context: "reference".to_string(),
            }),
        }
    }

    fn parse_operator(symbol: &str) -> Result<Operator> {
        Operator::from_symbol(symbol).ok_or_else(|| ParseError::InvalidOperator(symbol.to_string()))
    }

    fn parse_quantor(name: &str) -> Result<Quantor> {
        Quantor::from_name(name).ok_or_else(|| ParseError::InvalidValue {
            field: "quantor".to_string(),
            message: format!("unknown quantor '{}'", name),
        })
    }

    fn parse_modifiers(flags: &str) -> Result<Modifiers> {
        if let Some(bad) = flags.chars().find(|c| !matches!(c, 'i' | 'd')) {
            return Err(ParseError::InvalidValue {
                field: "modifiers".to_string(),
                message: format!("unknown modifier '{}'", bad),
            });
        }
        Ok(Modifiers::from_flags(flags))
    }

    /// Parse one `results*` entry
    pub fn parse_result(value: &JsonValue) -> Result<ResultSpec> {
        let (kind, body) = JsonParser::single_key(value, "results")?;
        let label = JsonParser::get_string(body, "label")?;
        match kind {
            "resultsPlain" => Ok(ResultSpec::Plain(PlainResult {
                label,
                context: JsonParser::get_string(body, "context")?,
                entities: JsonParser::get_string_list(body, "entities")?,
            })),
            "resultsAnalysis" => {
                let functions = JsonParser::get_string_list(body, "functions")?
                    .iter()
                    .map(|f| {
                        AnalysisFunction::parse(f).ok_or_else(|| ParseError::InvalidValue {
                            field: "functions".to_string(),
                            message: format!("unknown analysis function '{}'", f),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                let filter = match body.get("filter") {
                    None | Some(JsonValue::Null) => None,
                    Some(filter) => Some(Self::parse_filter(filter)?),
                };
                Ok(ResultSpec::Analysis(AnalysisResult {
                    label,
                    attributes: JsonParser::get_string_list(body, "attributes")?,
                    functions,
                    filter,
                }))
            }
            "resultsCollocation" => {
                let window = match body.get("window") {
                    None | Some(JsonValue::Null) => None,
                    Some(window) => Some(Window {
                        left: JsonParser::get_optional_i64(window, "leftSpan")?.unwrap_or(0),
                        right: JsonParser::get_optional_i64(window, "rightSpan")?.unwrap_or(0),
                    }),
                };
                Ok(ResultSpec::Collocation(CollocationResult {
                    label,
                    center: JsonParser::get_optional_string(body, "center"),
                    window,
                    space: JsonParser::get_optional_string(body, "space"),
                    attribute: JsonParser::get_optional_string(body, "attribute")
                        .unwrap_or_else(|| CollocationResult::DEFAULT_ATTRIBUTE.to_string()),
                }))
            }
            other => Err(ParseError::UnknownNode {
                kind: other.to_string(),
                context: "results".to_string(),
            }),
        }
    }

    /// Parse a filter given as an object or as text (`"frequency > 10"`)
    fn parse_filter(value: &JsonValue) -> Result<FilterSpec> {
        if let Some(text) = value.as_str() {
            let mut parts = text.split_whitespace();
            let (Some(column), Some(symbol), Some(raw)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(ParseError::InvalidValue {
                    field: "filter".to_string(),
                    message: format!("expected '<column> <comparator> <value>', got '{}'", text),
                });
            };
            let value = raw
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(raw.trim_matches('\'').to_string()));
            return Ok(FilterSpec {
                column: column.to_string(),
                operator: Self::parse_operator(symbol)?,
                value,
            });
        }

        Ok(FilterSpec {
            column: JsonParser::get_string(value, "column")?,
            operator: Self::parse_operator(&JsonParser::get_string(value, "comparator")?)?,
            value: JsonParser::get_field(value, "value")?.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_minimal_query() {
        let query = QueryParser::parse_from_json(&json!({
            "query": [{"unit": {"layer": "Segment", "label": "s"}}]
        }))
        .unwrap();
        assert_eq!(query.nodes.len(), 1);
        assert!(query.results.is_empty());
    }

    #[test]
    fn test_parse_repetition_forms() {
        let star = QueryParser::parse_repetition(&json!({"min": "0", "max": "*"})).unwrap();
        assert_eq!(star, Repetition::new(0, None));

        let minus_one = QueryParser::parse_repetition(&json!({"min": 1, "max": -1})).unwrap();
        assert_eq!(minus_one, Repetition::new(1, None));

        let bounded = QueryParser::parse_repetition(&json!({"min": 2, "max": 4})).unwrap();
        assert_eq!(bounded, Repetition::new(2, Some(4)));

        assert!(QueryParser::parse_repetition(&json!({"min": 3, "max": 2})).is_err());
    }

    #[test]
    fn test_parse_text_filter() {
        let filter = QueryParser::parse_filter(&json!("frequency > 10")).unwrap();
        assert_eq!(filter.column, "frequency");
        assert_eq!(filter.operator, Operator::Gt);
        assert_eq!(filter.value, json!(10.0));
    }

    #[test]
    fn test_unknown_reference_kind() {
        let err = QueryParser::parse_reference(&json!({"variable": "x"})).unwrap_err();
        assert!(matches!(err, ParseError::UnknownNode { .. }));
    }
}
