//! Operators for corpql comparisons and arithmetic

use serde::{Deserialize, Serialize};

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// Equal (=)
    Eq,
    /// Not equal (!=)
    Ne,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Le,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Ge,
    /// Bitmask membership (contain)
    Contain,
    /// Negated bitmask membership (!contain)
    NotContain,
}

impl Operator {
    /// Parse the comparator spelling used in query documents
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "=" | "==" => Some(Operator::Eq),
            "!=" | "<>" => Some(Operator::Ne),
            "<" => Some(Operator::Lt),
            "<=" => Some(Operator::Le),
            ">" => Some(Operator::Gt),
            ">=" => Some(Operator::Ge),
            "contain" | "contains" => Some(Operator::Contain),
            "!contain" | "!contains" | "not contain" => Some(Operator::NotContain),
            _ => None,
        }
    }

    /// The comparator as written in query documents
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Contain => "contain",
            Operator::NotContain => "!contain",
        }
    }

    /// The SQL comparison operator, if this operator maps to one directly
    pub fn sql(&self) -> Option<&'static str> {
        match self {
            Operator::Eq => Some("="),
            Operator::Ne => Some("<>"),
            Operator::Lt => Some("<"),
            Operator::Le => Some("<="),
            Operator::Gt => Some(">"),
            Operator::Ge => Some(">="),
            Operator::Contain | Operator::NotContain => None,
        }
    }

    /// Returns true for `=` and `!=`
    pub fn is_equality(&self) -> bool {
        matches!(self, Operator::Eq | Operator::Ne)
    }

    /// Returns true for `<`, `<=`, `>` and `>=`
    pub fn is_ordering(&self) -> bool {
        matches!(self, Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge)
    }

    /// Returns true for the bitmask operators
    pub fn is_containment(&self) -> bool {
        matches!(self, Operator::Contain | Operator::NotContain)
    }

    /// Returns true for the negative forms (`!=`, `!contain`)
    pub fn is_negative(&self) -> bool {
        matches!(self, Operator::Ne | Operator::NotContain)
    }
}

/// Arithmetic operators for math references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MathOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl MathOperator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "+" => Some(MathOperator::Add),
            "-" => Some(MathOperator::Sub),
            "*" => Some(MathOperator::Mul),
            "/" => Some(MathOperator::Div),
            "%" => Some(MathOperator::Mod),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            MathOperator::Add => "+",
            MathOperator::Sub => "-",
            MathOperator::Mul => "*",
            MathOperator::Div => "/",
            MathOperator::Mod => "%",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_round_trip_symbols() {
        for op in [
            Operator::Eq,
            Operator::Ne,
            Operator::Lt,
            Operator::Le,
            Operator::Gt,
            Operator::Ge,
            Operator::Contain,
            Operator::NotContain,
        ] {
            assert_eq!(Operator::from_symbol(op.symbol()), Some(op));
        }
    }

    #[test]
    fn test_operator_classes() {
        assert!(Operator::Eq.is_equality());
        assert!(Operator::Ge.is_ordering());
        assert!(!Operator::Ge.is_equality());
        assert!(Operator::NotContain.is_containment());
        assert!(Operator::NotContain.is_negative());
        assert!(Operator::Contain.sql().is_none());
        assert_eq!(Operator::Ne.sql(), Some("<>"));
    }

    #[test]
    fn test_math_operator() {
        assert_eq!(MathOperator::from_symbol("%"), Some(MathOperator::Mod));
        assert_eq!(MathOperator::Sub.symbol(), "-");
        assert!(MathOperator::from_symbol("^").is_none());
    }
}
