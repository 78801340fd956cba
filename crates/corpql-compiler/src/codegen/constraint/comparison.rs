//! Binary comparisons

use super::reference::{Operand, OperandKind};
use super::{ConstraintCompiler, Fragment, Scope};
use crate::error::{CompileError, Result};
use crate::sql::{number_literal, quote_literal};
use chrono::{Datelike, Months, NaiveDate};
use corpql_core::ast::{Constraint, Modifiers, Operator};
use corpql_core::config::Lookup;

impl ConstraintCompiler<'_> {
    /// Compile one comparison
    pub fn compile_constraint(&self, scope: &Scope, constraint: &Constraint) -> Result<Fragment> {
        let mut left = self.resolve(scope, &constraint.left)?;
        let mut right = self.resolve(scope, &constraint.right)?;
        let mut operator = constraint.operator;

        if matches!(left.kind, OperandKind::Regex(_)) {
            return Err(CompileError::SyntaxError(
                "a regular expression can only appear on the right-hand side".to_string(),
            ));
        }
        // literal on the left: compare the other way round
        if left.kind.is_literal() && !right.kind.is_literal() {
            std::mem::swap(&mut left, &mut right);
            operator = mirror(operator);
        }

        let mut joins = std::mem::take(&mut left.joins);
        joins.merge(std::mem::take(&mut right.joins));
        let condition = comparison(&left, operator, &right, constraint.modifiers)?;
        Ok(Fragment::condition(condition, joins))
    }
}

fn comparison(
    left: &Operand,
    operator: Operator,
    right: &Operand,
    modifiers: Modifiers,
) -> Result<String> {
    if operator.is_containment() {
        return match (&left.kind, &right.kind) {
            (OperandKind::Labels { lookup }, OperandKind::StringLiteral(value)) => {
                Ok(bitmask(&left.sql, lookup, value, operator))
            }
            (OperandKind::Labels { .. }, other) => Err(CompileError::TypeError(format!(
                "'{}' needs a label name, got a {} value",
                operator.symbol(),
                other.name()
            ))),
            (other, _) => Err(CompileError::TypeError(format!(
                "'{}' applies to labels attributes, not {}",
                operator.symbol(),
                other.name()
            ))),
        };
    }

    let symbol = sql_operator(operator)?;
    match (&left.kind, &right.kind) {
        (OperandKind::Labels { .. }, _) => Err(CompileError::TypeError(format!(
            "labels attributes only support contain/!contain, not '{}'",
            operator.symbol()
        ))),

        (_, OperandKind::Regex(pattern)) => {
            if !operator.is_equality() {
                return Err(CompileError::SyntaxError(format!(
                    "regular expression used with '{}'",
                    operator.symbol()
                )));
            }
            if !left.kind.is_textual() {
                return Err(CompileError::TypeError(format!(
                    "regular expression on a {} value",
                    left.kind.name()
                )));
            }
            let mut matcher = String::from(if operator.is_negative() { "!~" } else { "~" });
            if modifiers.case_insensitive {
                matcher.push('*');
            }
            let pattern = quote_literal(pattern);
            if modifiers.accent_insensitive {
                Ok(format!("unaccent({}) {} unaccent({})", left.sql, matcher, pattern))
            } else {
                Ok(format!("{} {} {}", left.sql, matcher, pattern))
            }
        }

        (OperandKind::Date, OperandKind::StringLiteral(value)) => {
            date_comparison(&left.sql, operator, value)
        }

        (OperandKind::Entity { layer: a }, OperandKind::Entity { layer: b }) => {
            if a != b {
                return Err(CompileError::TypeError(format!(
                    "cannot compare an entity of {} with one of {}",
                    a, b
                )));
            }
            entity_comparison(left, operator, symbol, right)
        }
        (OperandKind::Entity { .. }, OperandKind::NumberLiteral) => {
            entity_comparison(left, operator, symbol, right)
        }
        (OperandKind::Entity { .. }, other) | (other, OperandKind::Entity { .. }) => {
            Err(CompileError::TypeError(format!(
                "cannot compare an entity with a {} value",
                other.name()
            )))
        }

        (l, r)
            if l.is_textual() && (r.is_textual() || matches!(r, OperandKind::StringLiteral(_))) =>
        {
            Ok(format!(
                "{} {} {}",
                text_side(&left.sql, modifiers),
                symbol,
                text_side(&right.sql, modifiers)
            ))
        }

        (l, r) if l.is_numeric() && r.is_numeric() => {
            Ok(format!("{} {} {}", left.sql, symbol, right.sql))
        }
        (l, OperandKind::StringLiteral(value)) if l.is_numeric() => {
            match value.trim().parse::<f64>() {
                Ok(number) => Ok(format!("{} {} {}", left.sql, symbol, number_literal(number))),
                Err(_) => Err(CompileError::TypeError(format!(
                    "cannot compare a number with '{}'",
                    value
                ))),
            }
        }

        (OperandKind::Date, OperandKind::Date) => {
            Ok(format!("{} {} {}", left.sql, symbol, right.sql))
        }

        (l, r) => Err(CompileError::TypeError(format!(
            "cannot compare a {} value with a {} value",
            l.name(),
            r.name()
        ))),
    }
}

fn sql_operator(operator: Operator) -> Result<&'static str> {
    operator.sql().ok_or_else(|| {
        CompileError::SyntaxError(format!("'{}' is not a comparison", operator.symbol()))
    })
}

fn mirror(operator: Operator) -> Operator {
    match operator {
        Operator::Lt => Operator::Gt,
        Operator::Le => Operator::Ge,
        Operator::Gt => Operator::Lt,
        Operator::Ge => Operator::Le,
        other => other,
    }
}

fn text_side(sql: &str, modifiers: Modifiers) -> String {
    let mut side = sql.to_string();
    if modifiers.accent_insensitive {
        side = format!("unaccent({})", side);
    }
    if modifiers.case_insensitive {
        side = format!("lower({})", side);
    }
    side
}

fn entity_comparison(
    left: &Operand,
    operator: Operator,
    symbol: &str,
    right: &Operand,
) -> Result<String> {
    if !operator.is_equality() {
        return Err(CompileError::TypeError(format!(
            "entities can only be compared with = or !=, not '{}'",
            operator.symbol()
        )));
    }
    Ok(format!("{} {} {}", left.sql, symbol, right.sql))
}

/// `contain`/`!contain` against a labels bitmask
fn bitmask(column: &str, lookup: &Lookup, label: &str, operator: Operator) -> String {
    let mask = format!(
        "(SELECT coalesce(bit_or(1::int8 << l.{key}), 0) FROM {table} l WHERE l.{value} = {label})",
        key = lookup.key,
        table = lookup.table,
        value = lookup.value,
        label = quote_literal(label)
    );
    let test = if operator.is_negative() { "= 0" } else { "> 0" };
    format!("({} & {}) {}", column, mask, test)
}

/// Half-open `[lower, upper)` day range of a possibly partial date
pub(crate) fn date_bounds(value: &str) -> Result<(NaiveDate, NaiveDate)> {
    let invalid = || CompileError::SyntaxError(format!("invalid date '{}'", value));
    let parts: Vec<&str> = value.trim().split('-').collect();
    let number = |text: &str| text.parse::<u32>().map_err(|_| invalid());

    let year = parts
        .first()
        .ok_or_else(invalid)?
        .parse::<i32>()
        .map_err(|_| invalid())?;

    match parts.as_slice() {
        [_] => {
            let lower = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)?;
            let upper = NaiveDate::from_ymd_opt(year + 1, 1, 1).ok_or_else(invalid)?;
            Ok((lower, upper))
        }
        [_, month] => {
            let lower = NaiveDate::from_ymd_opt(year, number(month)?, 1).ok_or_else(invalid)?;
            let upper = lower.checked_add_months(Months::new(1)).ok_or_else(invalid)?;
            Ok((lower, upper))
        }
        [_, month, day] => {
            let first = NaiveDate::from_ymd_opt(year, number(month)?, 1).ok_or_else(invalid)?;
            let last = first
                .checked_add_months(Months::new(1))
                .and_then(|next| next.pred_opt())
                .ok_or_else(invalid)?;
            let day = number(day)?.clamp(1, last.day());
            let lower = first.with_day(day).ok_or_else(invalid)?;
            let upper = lower.succ_opt().ok_or_else(invalid)?;
            Ok((lower, upper))
        }
        _ => Err(invalid()),
    }
}

fn date_comparison(column: &str, operator: Operator, value: &str) -> Result<String> {
    let (lower, upper) = date_bounds(value)?;
    let lo = format!("'{}'::date", lower.format("%Y-%m-%d"));
    let hi = format!("'{}'::date", upper.format("%Y-%m-%d"));
    let sql = match operator {
        Operator::Eq => format!("({c} >= {lo} AND {c} < {hi})", c = column, lo = lo, hi = hi),
        Operator::Ne => format!("({c} < {lo} OR {c} >= {hi})", c = column, lo = lo, hi = hi),
        Operator::Lt => format!("{} < {}", column, lo),
        Operator::Le => format!("{} < {}", column, hi),
        Operator::Gt => format!("{} >= {}", column, hi),
        Operator::Ge => format!("{} >= {}", column, lo),
        Operator::Contain | Operator::NotContain => {
            return Err(CompileError::TypeError(format!(
                "'{}' on a date",
                operator.symbol()
            )))
        }
    };
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_partial_dates() {
        assert_eq!(date_bounds("1990").unwrap(), (day(1990, 1, 1), day(1991, 1, 1)));
        assert_eq!(date_bounds("1990-02").unwrap(), (day(1990, 2, 1), day(1990, 3, 1)));
        assert_eq!(date_bounds("1990-12").unwrap(), (day(1990, 12, 1), day(1991, 1, 1)));
    }

    #[test]
    fn test_day_is_clamped_to_month() {
        assert_eq!(date_bounds("1990-02-31").unwrap(), (day(1990, 2, 28), day(1990, 3, 1)));
        assert_eq!(date_bounds("1992-02-30").unwrap().0, day(1992, 2, 29));
        assert_eq!(date_bounds("1990-04-31").unwrap().0, day(1990, 4, 30));
    }

    #[test]
    fn test_invalid_dates() {
        assert!(date_bounds("nineteen").is_err());
        assert!(date_bounds("1990-13").is_err());
        assert!(date_bounds("1990-01-01-01").is_err());
    }

    #[test]
    fn test_date_operators() {
        assert_eq!(
            date_comparison("d.date", Operator::Eq, "1990").unwrap(),
            "(d.date >= '1990-01-01'::date AND d.date < '1991-01-01'::date)"
        );
        assert_eq!(
            date_comparison("d.date", Operator::Le, "1990-05").unwrap(),
            "d.date < '1990-06-01'::date"
        );
        assert_eq!(
            date_comparison("d.date", Operator::Gt, "1990").unwrap(),
            "d.date >= '1991-01-01'::date"
        );
    }

    #[test]
    fn test_text_modifiers_nest_lower_outside() {
        let modifiers = Modifiers {
            case_insensitive: true,
            accent_insensitive: true,
        };
        assert_eq!(text_side("t.form", modifiers), "lower(unaccent(t.form))");
    }
}
