//! Literal quoting

/// Quote a string as a SQL literal (`it's` -> `'it''s'`)
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Render a number, dropping the fraction of integral values
pub fn number_literal(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("dog"), "'dog'");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn test_number_literal() {
        assert_eq!(number_literal(3.0), "3");
        assert_eq!(number_literal(-2.0), "-2");
        assert_eq!(number_literal(0.5), "0.5");
    }
}
