//! Compilation context
//!
//! `QueryData` accumulates everything the assembler and its delegates produce
//! for one compilation. It is created per call and threaded by `&mut`.

use crate::codegen::constraint::{ConstraintCompiler, Fragment};
use crate::codegen::sequence::automaton::Automaton;
use crate::compiler::CompilerOptions;
use crate::semantic::LabelTable;
use crate::sql::Joins;
use corpql_core::ast::FilterSpec;
use corpql_core::CorpusConfig;
use indexmap::{IndexMap, IndexSet};
use std::collections::BTreeMap;

/// Direction a traversal walks the token stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Where a traversal starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Start {
    /// At a fixed token (column of the carried row)
    Anchor(String),
    /// Before every token of a segment (column of the carried row)
    Segment(String),
}

/// A gap of a sequence, compiled to a recursive walk over tokens
#[derive(Debug, Clone, PartialEq)]
pub struct Traversal {
    pub index: usize,
    /// Label of the sequence the gap belongs to
    pub sequence: String,
    pub automaton: Automaton,
    pub direction: Direction,
    pub start: Start,
    /// Fixed token closing the gap (its column on the carried row)
    pub bound: Option<String>,
    /// Per symbol label: the condition a token must satisfy
    pub steps: IndexMap<String, Option<String>>,
    /// Lookup joins the step conditions need
    pub joins: Joins,
}

impl Traversal {
    pub fn name(&self) -> String {
        format!("traversal{}", self.index)
    }

    pub fn transition_name(&self) -> String {
        format!("transition{}", self.index)
    }

    /// Column holding the visited `(token_id, label, sequence)` triples
    pub fn path_column(&self) -> String {
        format!("traversal{}_path", self.index)
    }

    /// Path expression as KWIC reports it: document order, without the
    /// closing fixed token a bridging walk appends last
    pub fn reported_path(&self, source: &str) -> String {
        let path = format!("{}.{}", source, self.path_column());
        let path = if self.bound.is_some() {
            format!("({} - -1)", path)
        } else {
            path
        };
        match self.direction {
            Direction::Forward => path,
            Direction::Backward => format!(
                "(SELECT coalesce(jsonb_agg(kwic_step ORDER BY kwic_ord DESC), '[]'::jsonb) \
                 FROM jsonb_array_elements({}) WITH ORDINALITY AS kwic_rev(kwic_step, kwic_ord))",
                path
            ),
        }
    }
}

/// One element of a sequence as reported by KWIC results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutItem {
    /// Fixed token label
    Anchor(String),
    /// Tokens strictly between two fixed tokens
    Span { prev: String, next: String },
    /// Path of the traversal at this index of `QueryData::traversals`
    Path(usize),
}

/// How a top-level sequence was compiled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceLayout {
    pub label: String,
    pub items: Vec<LayoutItem>,
}

/// Cross-cutting compilation state
pub struct QueryData<'a> {
    pub config: &'a CorpusConfig,
    pub options: &'a CompilerOptions,
    pub labels: &'a LabelTable,

    /// `fixed_parts` columns: alias -> expression
    pub selects: IndexMap<String, String>,
    pub joins: Joins,
    pub conditions: IndexSet<String>,

    /// Unit labels selected by `fixed_parts`
    pub entities: IndexSet<String>,
    pub sets: IndexSet<String>,
    /// Top-level disjunction label -> member labels
    pub disjunctions: IndexMap<String, Vec<String>>,
    pub sequences: IndexMap<String, SequenceLayout>,
    pub traversals: Vec<Traversal>,

    /// Segment label -> prefilter conditions on its vector table
    pub prefilters: IndexMap<String, Vec<String>>,
    pub post_processes: BTreeMap<usize, Vec<FilterSpec>>,

    /// Label of the unit `fixed_parts` selects from
    pub base: Option<String>,
}

impl<'a> QueryData<'a> {
    pub fn new(
        config: &'a CorpusConfig,
        options: &'a CompilerOptions,
        labels: &'a LabelTable,
    ) -> Self {
        Self {
            config,
            options,
            labels,
            selects: IndexMap::new(),
            joins: Joins::new(),
            conditions: IndexSet::new(),
            entities: IndexSet::new(),
            sets: IndexSet::new(),
            disjunctions: IndexMap::new(),
            sequences: IndexMap::new(),
            traversals: Vec::new(),
            prefilters: IndexMap::new(),
            post_processes: BTreeMap::new(),
            base: None,
        }
    }

    pub fn frame_rate(&self) -> f64 {
        self.options
            .frame_rate
            .unwrap_or_else(|| self.config.frame_rate())
    }

    pub fn constraints(&self) -> ConstraintCompiler<'a> {
        ConstraintCompiler::new(self.config, self.labels, self.frame_rate())
    }

    pub fn token_table(&self) -> String {
        self.config.qualified_table(self.config.token_layer())
    }

    pub fn token_id(&self) -> String {
        self.config.id_column(self.config.token_layer())
    }

    /// Column of the token table pointing at its segment
    pub fn segment_key(&self) -> String {
        self.config.id_column(self.config.segment_layer())
    }

    /// Select a unit's id under its alias
    pub fn declare_entity(&mut self, label: &str, alias: &str, layer: &str) {
        let id = self.config.id_column(layer);
        self.selects
            .insert(alias.to_string(), format!("{}.{}", alias, id));
        self.entities.insert(label.to_string());
    }

    /// Merge a compiled fragment into the global WHERE and join set
    pub fn add_fragment(&mut self, fragment: Fragment) {
        let (conditions, joins) = fragment.into_where();
        self.conditions.extend(conditions);
        self.joins.merge(joins);
    }

    pub fn next_traversal(&self) -> usize {
        self.traversals.len()
    }

    /// Columns of `match_list`: every fixed column, then every traversal path
    pub fn match_columns(&self) -> Vec<String> {
        self.carried_columns(self.traversals.len())
    }

    /// Columns a traversal receives from the relation before it
    pub fn carried_columns(&self, traversal: usize) -> Vec<String> {
        let mut columns: Vec<String> = self.selects.keys().cloned().collect();
        columns.extend(
            self.traversals
                .iter()
                .take(traversal)
                .map(Traversal::path_column),
        );
        columns
    }
}
