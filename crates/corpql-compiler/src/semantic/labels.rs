//! Label table
//!
//! Built by one read-only walk over the normalized query before any SQL is
//! generated. Every later label lookup reads the finished table, so the order
//! in which nodes declare and reference labels does not matter.

use crate::error::{CompileError, Result};
use corpql_core::ast::{
    ConstraintItem, Constraints, Disjunction, Query, QueryNode, Sequence, SequenceMember, Unit,
};
use corpql_core::CorpusConfig;
use indexmap::{IndexMap, IndexSet};

/// What a label names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Unit,
    Sequence,
    Disjunction,
    Set,
}

/// Where a label occurs in the query tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    /// Direct child of the query
    TopLevel,
    /// Member of a top-level disjunction
    Alternative { disjunction: String },
    /// Unit at a statically known offset of a top-level sequence
    Fixed { sequence: String },
    /// Inside a repeated or alternative part of a top-level sequence
    Repeated { sequence: String },
    /// Inside an EXISTS / NOT EXISTS subtree
    Quantified,
    /// Unit collected by a set object
    SetMember { set: String },
}

/// Everything known about one label
#[derive(Debug, Clone, PartialEq)]
pub struct LabelInfo {
    pub label: String,
    /// SQL alias (label sanitized to a plain identifier)
    pub alias: String,
    pub kind: LabelKind,
    /// Layer of units and sets
    pub layer: Option<String>,
    pub part_of: Option<String>,
    pub nested_constraints: usize,
    pub position: Position,
    /// Member labels of sequences and disjunctions, in order
    pub members: Vec<String>,
    /// Smallest token width of sequences
    pub min_width: usize,
}

impl LabelInfo {
    fn new(label: &str, kind: LabelKind, position: Position) -> Self {
        Self {
            label: label.to_string(),
            alias: String::new(),
            kind,
            layer: None,
            part_of: None,
            nested_constraints: 0,
            position,
            members: Vec::new(),
            min_width: 0,
        }
    }

    /// Unit label that resolves to a row of its layer table
    pub fn is_unit(&self) -> bool {
        self.kind == LabelKind::Unit
    }
}

/// label -> layer binding table
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    labels: IndexMap<String, LabelInfo>,
}

impl LabelTable {
    /// Walk the (normalized) query and record every label
    pub fn build(query: &Query, config: &CorpusConfig) -> Result<Self> {
        let mut builder = TableBuilder {
            config,
            table: LabelTable::default(),
        };

        for node in &query.nodes {
            builder.node(node)?;
        }

        let mut table = builder.table;
        table.check_part_of()?;
        table.assign_aliases();
        Ok(table)
    }

    pub fn get(&self, label: &str) -> Option<&LabelInfo> {
        self.labels.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }

    /// Look up a label, failing with a reference error
    pub fn require(&self, label: &str) -> Result<&LabelInfo> {
        self.labels
            .get(label)
            .ok_or_else(|| CompileError::ReferenceError(format!("unknown label '{}'", label)))
    }

    /// SQL alias of a label
    pub fn alias(&self, label: &str) -> Result<&str> {
        Ok(self.require(label)?.alias.as_str())
    }

    /// Layer of a unit label
    pub fn layer_of(&self, label: &str) -> Result<&str> {
        let info = self.require(label)?;
        match (&info.kind, &info.layer) {
            (LabelKind::Unit, Some(layer)) => Ok(layer),
            _ => Err(CompileError::ReferenceError(format!(
                "label '{}' does not name a unit",
                label
            ))),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelInfo> {
        self.labels.values()
    }

    /// Labels that may be referenced from outside their own subtree
    pub fn is_legal(&self, label: &str) -> bool {
        self.labels.get(label).is_some_and(|info| {
            matches!(
                info.position,
                Position::TopLevel | Position::Fixed { .. } | Position::Alternative { .. }
            )
        })
    }

    /// Every legal reference, in declaration order
    pub fn legal_references(&self) -> IndexSet<&str> {
        self.labels
            .keys()
            .map(String::as_str)
            .filter(|label| self.is_legal(label))
            .collect()
    }

    /// Longest minimum width of the sequences scoped to a label
    pub fn sequence_width_for(&self, label: &str) -> usize {
        self.labels
            .values()
            .filter(|info| info.kind == LabelKind::Sequence)
            .filter(|info| info.part_of.as_deref() == Some(label))
            .map(|info| info.min_width)
            .max()
            .unwrap_or(0)
    }

    fn check_part_of(&self) -> Result<()> {
        for info in self.labels.values() {
            if let Some(parent) = &info.part_of {
                let target = self.require(parent).map_err(|_| {
                    CompileError::ReferenceError(format!(
                        "label '{}' is part of unknown label '{}'",
                        info.label, parent
                    ))
                })?;
                if !target.is_unit() {
                    return Err(CompileError::ReferenceError(format!(
                        "label '{}' is part of '{}', which is not a unit",
                        info.label, parent
                    )));
                }
            }
        }
        Ok(())
    }

    fn assign_aliases(&mut self) {
        let mut used: IndexSet<String> = IndexSet::new();
        for info in self.labels.values_mut() {
            let base = sanitize(&info.label);
            let mut alias = base.clone();
            let mut n = 1;
            while !used.insert(alias.clone()) {
                alias = format!("{}_{}", base, n);
                n += 1;
            }
            info.alias = alias;
        }
    }
}

/// Lower-case the label and replace anything that is not `[a-z0-9_]`
fn sanitize(label: &str) -> String {
    let mut alias: String = label
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if alias.is_empty() || alias.starts_with(|c: char| c.is_ascii_digit()) {
        alias.insert(0, '_');
    }
    alias
}

struct TableBuilder<'a> {
    config: &'a CorpusConfig,
    table: LabelTable,
}

impl TableBuilder<'_> {
    fn register(&mut self, info: LabelInfo) -> Result<()> {
        match self.table.labels.get(&info.label) {
            None => {
                self.table.labels.insert(info.label.clone(), info);
                Ok(())
            }
            Some(existing) if existing.kind == info.kind && existing.layer == info.layer => {
                // repeated declaration of the same entity
                Ok(())
            }
            Some(existing) => Err(CompileError::SyntaxError(format!(
                "label '{}' is bound to both {} and {}",
                info.label,
                describe(existing),
                describe(&info)
            ))),
        }
    }

    fn node(&mut self, node: &QueryNode) -> Result<()> {
        match node {
            QueryNode::Unit(unit) => {
                let position = if unit.quantor.is_some() {
                    Position::Quantified
                } else {
                    Position::TopLevel
                };
                self.unit(unit, position)
            }
            QueryNode::Sequence(sequence) => self.top_sequence(sequence),
            QueryNode::Disjunction(disjunction) => self.top_disjunction(disjunction),
            QueryNode::Set(set) => {
                self.config.layer(&set.unit.layer)?;
                let mut info = LabelInfo::new(&set.label, LabelKind::Set, Position::TopLevel);
                info.layer = Some(set.unit.layer.clone());
                info.part_of = set.unit.part_of.clone();
                info.nested_constraints = set.unit.nested_constraint_count();
                self.register(info)?;
                self.unit(
                    &set.unit,
                    Position::SetMember {
                        set: set.label.clone(),
                    },
                )
            }
            QueryNode::Constraints(group) => self.group(group),
            QueryNode::Constraint(_) | QueryNode::TimeConstraint(_) => Ok(()),
        }
    }

    fn unit(&mut self, unit: &Unit, position: Position) -> Result<()> {
        self.config.layer(&unit.layer).map_err(|_| {
            CompileError::ReferenceError(format!("unknown layer '{}'", unit.layer))
        })?;
        let label = required_label(unit.label.as_deref(), "unit")?;

        let mut info = LabelInfo::new(label, LabelKind::Unit, position);
        info.layer = Some(unit.layer.clone());
        info.part_of = unit.part_of.clone();
        info.nested_constraints = unit.nested_constraint_count();
        self.register(info)?;

        for item in &unit.constraints {
            self.item(item)?;
        }
        Ok(())
    }

    fn item(&mut self, item: &ConstraintItem) -> Result<()> {
        match item {
            ConstraintItem::Unit(unit) => self.unit(unit, Position::Quantified),
            ConstraintItem::Constraints(group) => self.group(group),
            ConstraintItem::Constraint(_) | ConstraintItem::Time(_) => Ok(()),
        }
    }

    fn group(&mut self, group: &Constraints) -> Result<()> {
        for item in &group.args {
            self.item(item)?;
        }
        Ok(())
    }

    fn top_sequence(&mut self, sequence: &Sequence) -> Result<()> {
        let label = required_label(sequence.label.as_deref(), "sequence")?;
        let mut info = LabelInfo::new(label, LabelKind::Sequence, Position::TopLevel);
        info.part_of = sequence.part_of.clone();
        info.members = sequence
            .members
            .iter()
            .filter_map(|m| m.label().map(str::to_string))
            .collect();
        info.min_width = sequence.min_width();
        self.register(info)?;

        self.members(&sequence.members, label, true)
    }

    fn members(&mut self, members: &[SequenceMember], sequence: &str, fixed: bool) -> Result<()> {
        for member in members {
            match member {
                SequenceMember::Unit(unit) => {
                    let position = if fixed {
                        Position::Fixed {
                            sequence: sequence.to_string(),
                        }
                    } else {
                        Position::Repeated {
                            sequence: sequence.to_string(),
                        }
                    };
                    self.unit(unit, position)?;
                }
                SequenceMember::Sequence(nested) => {
                    self.nested_sequence(nested, sequence)?;
                    let fixed = fixed && nested.repetition.is_once();
                    self.members(&nested.members, sequence, fixed)?;
                }
                SequenceMember::Disjunction(disjunction) => {
                    self.nested_disjunction(disjunction, sequence)?;
                    self.members(&disjunction.members, sequence, false)?;
                }
            }
        }
        Ok(())
    }

    fn nested_sequence(&mut self, nested: &Sequence, sequence: &str) -> Result<()> {
        let label = required_label(nested.label.as_deref(), "sequence")?;
        let mut info = LabelInfo::new(
            label,
            LabelKind::Sequence,
            Position::Repeated {
                sequence: sequence.to_string(),
            },
        );
        info.members = nested
            .members
            .iter()
            .filter_map(|m| m.label().map(str::to_string))
            .collect();
        info.min_width = nested.min_width();
        self.register(info)
    }

    fn nested_disjunction(&mut self, disjunction: &Disjunction, sequence: &str) -> Result<()> {
        let label = required_label(disjunction.label.as_deref(), "disjunction")?;
        let mut info = LabelInfo::new(
            label,
            LabelKind::Disjunction,
            Position::Repeated {
                sequence: sequence.to_string(),
            },
        );
        info.members = disjunction
            .members
            .iter()
            .filter_map(|m| m.label().map(str::to_string))
            .collect();
        self.register(info)
    }

    fn top_disjunction(&mut self, disjunction: &Disjunction) -> Result<()> {
        let label = required_label(disjunction.label.as_deref(), "disjunction")?;
        let mut info = LabelInfo::new(label, LabelKind::Disjunction, Position::TopLevel);
        info.members = disjunction
            .members
            .iter()
            .filter_map(|m| m.label().map(str::to_string))
            .collect();
        self.register(info)?;

        for member in &disjunction.members {
            match member {
                SequenceMember::Unit(unit) => self.unit(
                    unit,
                    Position::Alternative {
                        disjunction: label.to_string(),
                    },
                )?,
                SequenceMember::Sequence(_) | SequenceMember::Disjunction(_) => {
                    return Err(CompileError::NotImplemented(format!(
                        "top-level disjunction '{}' may only contain units",
                        label
                    )))
                }
            }
        }
        Ok(())
    }
}

fn required_label<'a>(label: Option<&'a str>, what: &str) -> Result<&'a str> {
    label.ok_or_else(|| {
        CompileError::Structural(format!("{} without a label reached the compiler", what))
    })
}

fn describe(info: &LabelInfo) -> String {
    match (&info.kind, &info.layer) {
        (LabelKind::Unit, Some(layer)) => format!("layer {}", layer),
        (LabelKind::Set, Some(layer)) => format!("a set of {}", layer),
        (LabelKind::Sequence, _) => "a sequence".to_string(),
        (LabelKind::Disjunction, _) => "a disjunction".to_string(),
        (_, None) => "an unlabelled node".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use corpql_core::config::{LayerConfig, LayerType};

    fn config() -> CorpusConfig {
        CorpusConfig::new("c", "0")
            .with_layer("Token", LayerConfig::new(LayerType::Unit))
            .with_layer("Segment", LayerConfig::new(LayerType::Span).with_contains("Token"))
            .with_layer("Document", LayerConfig::new(LayerType::Span).with_contains("Segment"))
    }

    #[test]
    fn test_part_of_declared_later() {
        let query = Query::new(vec![
            QueryNode::Unit(Unit::new("Token").with_label("t").part_of("s")),
            QueryNode::Unit(Unit::new("Segment").with_label("s")),
        ]);
        let table = LabelTable::build(&query, &config()).unwrap();
        assert_eq!(table.layer_of("t").unwrap(), "Token");
        assert!(table.is_legal("s"));
    }

    #[test]
    fn test_conflicting_layers() {
        let query = Query::new(vec![
            QueryNode::Unit(Unit::new("Token").with_label("x")),
            QueryNode::Unit(Unit::new("Segment").with_label("x")),
        ]);
        let err = LabelTable::build(&query, &config()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
    }

    #[test]
    fn test_unknown_layer_and_parent() {
        let query = Query::new(vec![QueryNode::Unit(Unit::new("Phrase").with_label("p"))]);
        assert_eq!(
            LabelTable::build(&query, &config()).unwrap_err().kind(),
            ErrorKind::Reference
        );

        let query = Query::new(vec![QueryNode::Unit(
            Unit::new("Token").with_label("t").part_of("nowhere"),
        )]);
        assert_eq!(
            LabelTable::build(&query, &config()).unwrap_err().kind(),
            ErrorKind::Reference
        );
    }

    #[test]
    fn test_sequence_positions() {
        let token = |l: &str| SequenceMember::Unit(Unit::new("Token").with_label(l));
        let query = Query::new(vec![QueryNode::Sequence(
            Sequence::new(vec![
                token("a"),
                SequenceMember::Sequence(
                    Sequence::new(vec![token("b")]).with_label("inner"),
                ),
                SequenceMember::Sequence(
                    Sequence::new(vec![token("c")])
                        .with_label("star")
                        .with_repetition(0, None),
                ),
                token("d"),
            ])
            .with_label("seq"),
        )]);

        let table = LabelTable::build(&query, &config()).unwrap();
        assert!(table.is_legal("a"));
        assert!(table.is_legal("b"));
        assert!(!table.is_legal("c"));
        assert!(!table.is_legal("star"));
        assert!(table.is_legal("seq"));
        assert_eq!(table.get("seq").unwrap().min_width, 3);
    }

    #[test]
    fn test_aliases_are_plain_identifiers() {
        let query = Query::new(vec![
            QueryNode::Unit(Unit::new("Token").with_label("T1")),
            QueryNode::Unit(Unit::new("Token").with_label("t1")),
        ]);
        let table = LabelTable::build(&query, &config()).unwrap();
        assert_eq!(table.alias("T1").unwrap(), "t1");
        assert_eq!(table.alias("t1").unwrap(), "t1_1");
    }
}
