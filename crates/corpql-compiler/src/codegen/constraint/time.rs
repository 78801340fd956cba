//! Time constraints between time-anchored layers

use super::{ConstraintCompiler, Fragment, Scope};
use crate::error::{CompileError, Result};
use crate::sql::Joins;
use corpql_core::ast::{Edge, TimeAnchor, TimeConstraint};
use regex::Regex;
use std::sync::LazyLock;

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(-?\d+(?:\.\d+)?)\s*(ms|s|m|h|d|w)\s*$").expect("valid duration pattern")
});

/// Parse a duration such as `"2s"`, `"-500ms"` or `"1.5m"` into seconds
pub fn parse_duration(text: &str) -> Result<f64> {
    let captures = DURATION
        .captures(text)
        .ok_or_else(|| CompileError::SyntaxError(format!("invalid duration '{}'", text)))?;
    let amount: f64 = captures[1]
        .parse()
        .map_err(|_| CompileError::SyntaxError(format!("invalid duration '{}'", text)))?;
    let unit = match &captures[2] {
        "ms" => 0.001,
        "s" => 1.0,
        "m" => 60.0,
        "h" => 3_600.0,
        "d" => 86_400.0,
        _ => 604_800.0,
    };
    Ok(amount * unit)
}

impl ConstraintCompiler<'_> {
    /// `lower|upper(a.frame_range) op lower|upper(b.frame_range) [+ frames]`
    pub fn compile_time(&self, scope: &Scope, constraint: &TimeConstraint) -> Result<Fragment> {
        let symbol = constraint.operator.sql().ok_or_else(|| {
            CompileError::SyntaxError(format!(
                "'{}' cannot compare time edges",
                constraint.operator.symbol()
            ))
        })?;

        let left = self.time_edge(scope, &constraint.left)?;
        let right = self.time_edge(scope, &constraint.right)?;

        let frames = match &constraint.offset {
            Some(offset) => (parse_duration(offset)? * self.frame_rate).round() as i64,
            None => 0,
        };
        let right = match frames {
            0 => right,
            f if f > 0 => format!("{} + {}", right, f),
            f => format!("{} - {}", right, -f),
        };

        Ok(Fragment::condition(
            format!("{} {} {}", left, symbol, right),
            Joins::new(),
        ))
    }

    fn time_edge(&self, scope: &Scope, anchor: &TimeAnchor) -> Result<String> {
        let alias = self.alias_in(scope, &anchor.label)?;
        let layer = self.layer_in(scope, &anchor.label)?;
        if !self.config.is_time_anchored(&layer) {
            return Err(CompileError::TypeError(format!(
                "'{}' ({}) is not time-anchored",
                anchor.label, layer
            )));
        }
        let function = match anchor.edge {
            Edge::Start => "lower",
            Edge::End => "upper",
        };
        Ok(format!("{}({}.frame_range)", function, alias))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("2s").unwrap(), 2.0);
        assert!((parse_duration("-500ms").unwrap() + 0.5).abs() < 1e-9);
        assert_eq!(parse_duration(" 1.5 m ").unwrap(), 90.0);
        assert_eq!(parse_duration("1w").unwrap(), 604_800.0);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("2 minutes").is_err());
        assert!(parse_duration("s").is_err());
    }
}
