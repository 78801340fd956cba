//! SELECT / CTE / statement builders

const INDENT: &str = "    ";

/// A single SELECT
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectBuilder {
    distinct: bool,
    columns: Vec<String>,
    from: Option<String>,
    joins: Vec<String>,
    conditions: Vec<String>,
    group_by: Vec<String>,
    order_by: Vec<String>,
}

impl SelectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn join(mut self, join: impl Into<String>) -> Self {
        self.joins.push(join.into());
        self
    }

    pub fn joins<I, S>(mut self, joins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.joins.extend(joins.into_iter().map(Into::into));
        self
    }

    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    pub fn conditions<I, S>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conditions.extend(conditions.into_iter().map(Into::into));
        self
    }

    pub fn group_by<I, S>(mut self, expressions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(expressions.into_iter().map(Into::into));
        self
    }

    pub fn order_by(mut self, expression: impl Into<String>) -> Self {
        self.order_by.push(expression.into());
        self
    }

    fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let keyword = if self.distinct { "SELECT DISTINCT" } else { "SELECT" };
        let columns = if self.columns.is_empty() {
            vec!["1".to_string()]
        } else {
            self.columns.clone()
        };

        let pad = " ".repeat(keyword.len() + 1);
        for (i, column) in columns.iter().enumerate() {
            let last = i + 1 == columns.len();
            let sep = if last { "" } else { "," };
            if i == 0 {
                lines.push(format!("{} {}{}", keyword, column, sep));
            } else {
                lines.push(format!("{}{}{}", pad, column, sep));
            }
        }

        if let Some(from) = &self.from {
            lines.push(format!("FROM {}", from));
        }
        lines.extend(self.joins.iter().cloned());
        for (i, condition) in self.conditions.iter().enumerate() {
            if i == 0 {
                lines.push(format!("WHERE {}", condition));
            } else {
                lines.push(format!("  AND {}", condition));
            }
        }
        if !self.group_by.is_empty() {
            lines.push(format!("GROUP BY {}", self.group_by.join(", ")));
        }
        if !self.order_by.is_empty() {
            lines.push(format!("ORDER BY {}", self.order_by.join(", ")));
        }
        lines
    }

    /// Render on one line
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        let keyword = if self.distinct { "SELECT DISTINCT" } else { "SELECT" };
        if self.columns.is_empty() {
            parts.push(format!("{} 1", keyword));
        } else {
            parts.push(format!("{} {}", keyword, self.columns.join(", ")));
        }
        if let Some(from) = &self.from {
            parts.push(format!("FROM {}", from));
        }
        parts.extend(self.joins.iter().cloned());
        if !self.conditions.is_empty() {
            parts.push(format!("WHERE {}", self.conditions.join(" AND ")));
        }
        if !self.group_by.is_empty() {
            parts.push(format!("GROUP BY {}", self.group_by.join(", ")));
        }
        if !self.order_by.is_empty() {
            parts.push(format!("ORDER BY {}", self.order_by.join(", ")));
        }
        parts.join(" ")
    }

    /// Render compact or one clause per line
    pub fn render_with(&self, pretty: bool) -> String {
        if pretty {
            self.lines().join("\n")
        } else {
            self.render()
        }
    }
}

/// `SEARCH DEPTH FIRST BY {by} SET {set}`
#[derive(Debug, Clone, PartialEq)]
pub struct Search {
    pub by: String,
    pub set: String,
}

/// Body of a common table expression
#[derive(Debug, Clone, PartialEq)]
pub enum CteBody {
    Select(SelectBuilder),
    /// Rows of pre-rendered values
    Values(Vec<Vec<String>>),
    Recursive {
        anchor: SelectBuilder,
        step: SelectBuilder,
    },
}

/// One `name [(columns)] AS (...)` entry of a WITH clause
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    pub columns: Vec<String>,
    pub body: CteBody,
    pub search: Option<Search>,
}

impl Cte {
    pub fn select(name: impl Into<String>, select: SelectBuilder) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            body: CteBody::Select(select),
            search: None,
        }
    }

    pub fn values(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            columns,
            body: CteBody::Values(rows),
            search: None,
        }
    }

    pub fn recursive(
        name: impl Into<String>,
        columns: Vec<String>,
        anchor: SelectBuilder,
        step: SelectBuilder,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            body: CteBody::Recursive { anchor, step },
            search: None,
        }
    }

    pub fn with_search(mut self, by: impl Into<String>, set: impl Into<String>) -> Self {
        self.search = Some(Search {
            by: by.into(),
            set: set.into(),
        });
        self
    }

    fn body_lines(&self, pretty: bool) -> Vec<String> {
        match &self.body {
            CteBody::Select(select) => {
                if pretty {
                    select.lines()
                } else {
                    vec![select.render()]
                }
            }
            CteBody::Values(rows) => {
                let rendered: Vec<String> =
                    rows.iter().map(|row| format!("({})", row.join(", "))).collect();
                if pretty {
                    rendered
                        .iter()
                        .enumerate()
                        .map(|(i, row)| {
                            let sep = if i + 1 == rendered.len() { "" } else { "," };
                            if i == 0 {
                                format!("VALUES {}{}", row, sep)
                            } else {
                                format!("       {}{}", row, sep)
                            }
                        })
                        .collect()
                } else {
                    vec![format!("VALUES {}", rendered.join(", "))]
                }
            }
            CteBody::Recursive { anchor, step } => {
                if pretty {
                    let mut lines = anchor.lines();
                    lines.push("UNION ALL".to_string());
                    lines.extend(step.lines());
                    lines
                } else {
                    vec![format!("{} UNION ALL {}", anchor.render(), step.render())]
                }
            }
        }
    }

    fn render(&self, pretty: bool) -> String {
        let head = if self.columns.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.columns.join(", "))
        };
        let search = self
            .search
            .as_ref()
            .map(|s| format!(" SEARCH DEPTH FIRST BY {} SET {}", s.by, s.set))
            .unwrap_or_default();

        let body = self.body_lines(pretty);
        if pretty {
            let indented: Vec<String> = body.iter().map(|l| format!("{}{}", INDENT, l)).collect();
            format!("{} AS (\n{}\n){}", head, indented.join("\n"), search)
        } else {
            format!("{} AS ({}){}", head, body.join(" "), search)
        }
    }
}

/// `WITH RECURSIVE ... SELECT * FROM a UNION ALL SELECT * FROM b;`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    ctes: Vec<Cte>,
    union: Vec<String>,
}

impl Statement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cte(mut self, cte: Cte) -> Self {
        self.ctes.push(cte);
        self
    }

    pub fn ctes(mut self, ctes: impl IntoIterator<Item = Cte>) -> Self {
        self.ctes.extend(ctes);
        self
    }

    /// Add a CTE whose rows form part of the final `UNION ALL`
    pub fn union_member(mut self, name: impl Into<String>) -> Self {
        self.union.push(name.into());
        self
    }

    pub fn render(&self, pretty: bool) -> String {
        let separator = if pretty { ",\n" } else { ", " };
        let ctes: Vec<String> = self.ctes.iter().map(|c| c.render(pretty)).collect();
        let selects: Vec<String> = self
            .union
            .iter()
            .map(|name| format!("SELECT * FROM {}", name))
            .collect();

        if pretty {
            format!(
                "WITH RECURSIVE {}\n{};",
                ctes.join(separator),
                selects.join("\nUNION ALL\n")
            )
        } else {
            format!(
                "WITH RECURSIVE {} {};",
                ctes.join(separator),
                selects.join(" UNION ALL ")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_compact() {
        let select = SelectBuilder::new()
            .columns(["s.segment_id AS s", "t.token_id AS t"])
            .from("bnc1.segment0 s")
            .join("CROSS JOIN bnc1.token0 t")
            .condition("t.segment_id = s.segment_id")
            .condition("t.xpos = 'NN'");
        assert_eq!(
            select.render(),
            "SELECT s.segment_id AS s, t.token_id AS t FROM bnc1.segment0 s \
             CROSS JOIN bnc1.token0 t WHERE t.segment_id = s.segment_id AND t.xpos = 'NN'"
        );
    }

    #[test]
    fn test_select_pretty() {
        let select = SelectBuilder::new()
            .columns(["a", "b"])
            .from("x")
            .condition("a > 1")
            .condition("b < 2");
        assert_eq!(
            select.render_with(true),
            "SELECT a,\n       b\nFROM x\nWHERE a > 1\n  AND b < 2"
        );
    }

    #[test]
    fn test_empty_select_selects_one() {
        assert_eq!(SelectBuilder::new().from("x").render(), "SELECT 1 FROM x");
    }

    #[test]
    fn test_statement() {
        let statement = Statement::new()
            .cte(Cte::select("fixed_parts", SelectBuilder::new().column("1 AS x")))
            .cte(Cte::values(
                "transition0",
                vec!["source_state".into(), "dest_state".into()],
                vec![vec!["0".into(), "1".into()], vec!["1".into(), "NULL".into()]],
            ))
            .cte(Cte::select("res0", SelectBuilder::new().column("0").from("fixed_parts")))
            .union_member("res0");

        assert_eq!(
            statement.render(false),
            "WITH RECURSIVE fixed_parts AS (SELECT 1 AS x), \
             transition0 (source_state, dest_state) AS (VALUES (0, 1), (1, NULL)), \
             res0 AS (SELECT 0 FROM fixed_parts) SELECT * FROM res0;"
        );
        let pretty = statement.render(true);
        assert!(!pretty.contains("UNION ALL"));
        assert!(pretty.starts_with("WITH RECURSIVE fixed_parts AS (\n    SELECT 1 AS x\n)"));
    }

    #[test]
    fn test_recursive_search_clause() {
        let cte = Cte::recursive(
            "traversal0",
            vec!["pos".into()],
            SelectBuilder::new().column("1"),
            SelectBuilder::new().column("pos + 1").from("traversal0").condition("pos < 3"),
        )
        .with_search("pos", "traversal0_order");
        assert_eq!(
            cte.render(false),
            "traversal0 (pos) AS (SELECT 1 UNION ALL SELECT pos + 1 FROM traversal0 WHERE pos < 3) \
             SEARCH DEPTH FIRST BY pos SET traversal0_order"
        );
    }
}
