//! Ordered join set
//!
//! Joins are keyed by `(table expression, alias)` so that compiling the same
//! reference twice never joins a table twice. Iteration follows insertion
//! order, which keeps the rendered SQL deterministic.

use indexmap::{IndexMap, IndexSet};

/// How a join entry is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// `CROSS JOIN`, or `JOIN .. ON ..` once conditions are attached
    Cross,
    /// `JOIN .. ON ..` (lookup tables)
    Inner,
    /// `LEFT JOIN LATERAL (..) alias ON true`
    LeftLateral,
}

/// Join identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinKey {
    pub table: String,
    pub alias: String,
}

/// One joined table
#[derive(Debug, Clone, PartialEq)]
pub struct JoinEntry {
    pub kind: JoinKind,
    pub conditions: IndexSet<String>,
    /// Label whose compilation introduced this join
    pub owner: Option<String>,
    /// Entry is the table of a labelled unit (not a lookup helper)
    pub anchor: bool,
    /// Rendered after every other join
    pub deferred: bool,
}

impl JoinEntry {
    fn new(kind: JoinKind, owner: Option<String>) -> Self {
        Self {
            kind,
            conditions: IndexSet::new(),
            owner,
            anchor: false,
            deferred: false,
        }
    }

    /// Render priority: plain anchors, conditioned anchors, laterals, lookups, deferred
    fn rank(&self) -> u8 {
        match (self.deferred, self.kind, self.anchor) {
            (true, _, _) => 4,
            (false, JoinKind::LeftLateral, _) => 2,
            (false, _, true) if self.conditions.is_empty() => 0,
            (false, _, true) => 1,
            (false, _, false) => 3,
        }
    }
}

/// Insertion-ordered set of joins
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Joins {
    entries: IndexMap<JoinKey, JoinEntry>,
}

impl Joins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn key(table: &str, alias: &str) -> JoinKey {
        JoinKey {
            table: table.to_string(),
            alias: alias.to_string(),
        }
    }

    /// Join the table of a labelled unit
    pub fn add_anchor(&mut self, table: &str, alias: &str, owner: &str) {
        self.entries
            .entry(Self::key(table, alias))
            .or_insert_with(|| JoinEntry {
                anchor: true,
                ..JoinEntry::new(JoinKind::Cross, Some(owner.to_string()))
            });
    }

    /// Join a helper table with an `ON` condition
    pub fn add_inner(&mut self, table: &str, alias: &str, condition: String, owner: Option<&str>) {
        self.entries
            .entry(Self::key(table, alias))
            .or_insert_with(|| JoinEntry::new(JoinKind::Inner, owner.map(str::to_string)))
            .conditions
            .insert(condition);
    }

    /// Join a lateral subquery (`subquery` includes its parentheses)
    pub fn add_lateral(&mut self, subquery: String, alias: &str, owner: &str) {
        self.entries
            .entry(JoinKey {
                table: subquery,
                alias: alias.to_string(),
            })
            .or_insert_with(|| JoinEntry {
                anchor: true,
                ..JoinEntry::new(JoinKind::LeftLateral, Some(owner.to_string()))
            });
    }

    /// Join rendered after all others
    pub fn add_deferred(&mut self, table: String, alias: &str, condition: String) {
        let entry = self
            .entries
            .entry(JoinKey {
                table,
                alias: alias.to_string(),
            })
            .or_insert_with(|| JoinEntry {
                deferred: true,
                ..JoinEntry::new(JoinKind::Inner, None)
            });
        entry.conditions.insert(condition);
    }

    /// Attach an `ON` condition to the entry with the given alias
    ///
    /// Returns false if no such entry exists.
    pub fn add_on_condition(&mut self, alias: &str, condition: String) -> bool {
        match self.entries.iter_mut().find(|(k, _)| k.alias == alias) {
            Some((_, entry)) => {
                entry.conditions.insert(condition);
                true
            }
            None => false,
        }
    }

    pub fn contains_alias(&self, alias: &str) -> bool {
        self.entries.keys().any(|k| k.alias == alias)
    }

    /// Remove an entry, keeping the order of the others
    pub fn remove_alias(&mut self, alias: &str) -> Option<(JoinKey, JoinEntry)> {
        let index = self.entries.keys().position(|k| k.alias == alias)?;
        self.entries.shift_remove_index(index)
    }

    /// Union with another set; conditions of shared entries are merged
    pub fn merge(&mut self, other: Joins) {
        for (key, entry) in other.entries {
            match self.entries.get_mut(&key) {
                Some(existing) => existing.conditions.extend(entry.conditions),
                None => {
                    self.entries.insert(key, entry);
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&JoinKey, &JoinEntry)> {
        self.entries.iter()
    }

    /// Render every entry as a join clause
    pub fn render(&self) -> Vec<String> {
        let mut ordered: Vec<(&JoinKey, &JoinEntry)> = self.entries.iter().collect();
        // stable: insertion order is kept within a rank
        ordered.sort_by_key(|(_, entry)| entry.rank());

        ordered
            .into_iter()
            .map(|(key, entry)| match entry.kind {
                JoinKind::LeftLateral => {
                    format!("LEFT JOIN LATERAL {} {} ON true", key.table, key.alias)
                }
                _ if entry.conditions.is_empty() => {
                    format!("CROSS JOIN {} {}", key.table, key.alias)
                }
                _ => format!(
                    "JOIN {} {} ON {}",
                    key.table,
                    key.alias,
                    entry
                        .conditions
                        .iter()
                        .map(String::as_str)
                        .collect::<Vec<_>>()
                        .join(" AND ")
                ),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_deduplication() {
        let mut joins = Joins::new();
        joins.add_anchor("bnc1.token0", "t", "t");
        joins.add_anchor("bnc1.token0", "t", "t");
        assert_eq!(joins.len(), 1);
        assert_eq!(joins.render(), vec!["CROSS JOIN bnc1.token0 t"]);
    }

    #[test]
    fn test_render_order() {
        let mut joins = Joins::new();
        joins.add_inner(
            "bnc1.form",
            "t_form",
            "t_form.form_id = t.form_id".into(),
            Some("t"),
        );
        joins.add_deferred(
            "(SELECT vec.segment_id FROM bnc1.fts_vector0 vec)".into(),
            "fts_vector_d",
            "fts_vector_d.segment_id = d.segment_id".into(),
        );
        joins.add_anchor("bnc1.token0", "t", "t");

        let rendered = joins.render();
        assert_eq!(rendered[0], "CROSS JOIN bnc1.token0 t");
        assert_eq!(rendered[1], "JOIN bnc1.form t_form ON t_form.form_id = t.form_id");
        assert!(rendered[2].starts_with("JOIN (SELECT vec.segment_id"));
    }

    #[test]
    fn test_on_condition_turns_cross_into_join() {
        let mut joins = Joins::new();
        joins.add_anchor("bnc1.deprel0", "d", "d");
        assert!(joins.add_on_condition("d", "d.target = t.token_id".into()));
        assert!(!joins.add_on_condition("x", "x.a = 1".into()));
        assert_eq!(
            joins.render(),
            vec!["JOIN bnc1.deprel0 d ON d.target = t.token_id"]
        );
    }

    #[test]
    fn test_merge_and_remove() {
        let mut a = Joins::new();
        a.add_anchor("bnc1.segment0", "s", "s");
        let mut b = Joins::new();
        b.add_anchor("bnc1.token0", "t", "t");
        b.add_anchor("bnc1.segment0", "s", "s");
        a.merge(b);
        assert_eq!(a.len(), 2);

        let (key, entry) = a.remove_alias("s").unwrap();
        assert_eq!(key.table, "bnc1.segment0");
        assert!(entry.anchor);
        assert!(!a.contains_alias("s"));
    }
}
