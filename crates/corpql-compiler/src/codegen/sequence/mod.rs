//! Sequence compilation
//!
//! A top-level sequence is split into fixed tokens and the gaps between
//! them. Fixed tokens are joined into `fixed_parts` and tied together by
//! token id arithmetic. A bounded repetition of plain tokens between two
//! fixed tokens is checked arithmetically as well. Every other gap is
//! matched by a recursive traversal driven by a minimal automaton.

pub mod automaton;
pub mod cte;
mod simple;

pub use automaton::{Automaton, Pattern, Symbol};

use crate::codegen::constraint::{Scope, Visibility};
use crate::codegen::prefilter::{Prefilter, Slot};
use crate::codegen::unit::compile_unit;
use crate::context::{Direction, LayoutItem, QueryData, SequenceLayout, Start, Traversal};
use crate::error::{CompileError, Result};
use crate::sql::Joins;
use corpql_core::ast::{Sequence, SequenceMember, Unit};
use indexmap::IndexMap;

/// Piece of a flattened top-level sequence
#[derive(Debug)]
enum Part {
    /// Token at a fixed offset
    Anchor(Unit),
    /// Bounded repetition of plain tokens between two anchors
    Simple(Sequence),
    /// Consecutive members of variable width
    Gap(Vec<SequenceMember>),
}

impl Part {
    fn anchor(&self) -> Option<&Unit> {
        match self {
            Part::Anchor(unit) => Some(unit),
            _ => None,
        }
    }
}

/// Compiles one top-level sequence into the query context
pub struct SequenceCompiler<'c, 'a> {
    ctx: &'c mut QueryData<'a>,
}

impl<'c, 'a> SequenceCompiler<'c, 'a> {
    pub fn new(ctx: &'c mut QueryData<'a>) -> Self {
        Self { ctx }
    }

    pub fn compile(&mut self, sequence: &Sequence) -> Result<()> {
        let label = sequence.label.clone().ok_or_else(|| {
            CompileError::Structural("sequence without a label reached the compiler".to_string())
        })?;
        let part_of = sequence.part_of.as_deref();

        let mut members = Vec::new();
        flatten(peel(sequence, &label)?, &mut members);
        let parts = partition(members);

        let anchors: Vec<&Unit> = parts.iter().filter_map(Part::anchor).collect();
        if anchors.is_empty() && part_of.is_none() {
            return Err(CompileError::Structural(format!(
                "sequence '{}' has no fixed token and is not part of a segment",
                label
            )));
        }
        self.compile_anchors(&anchors, part_of)?;

        let mut items = Vec::new();
        for (i, part) in parts.iter().enumerate() {
            let previous = i.checked_sub(1).and_then(|j| parts[j].anchor());
            let next = parts.get(i + 1).and_then(Part::anchor);
            match part {
                Part::Anchor(unit) => {
                    let alias = self.alias_of(unit)?;
                    if let Some(previous) = previous {
                        let previous = self.alias_of(previous)?;
                        let token_id = self.ctx.token_id();
                        self.ctx.conditions.insert(format!(
                            "{}.{} - {}.{} = 1",
                            alias, token_id, previous, token_id
                        ));
                    }
                    items.push(LayoutItem::Anchor(self.member_label(unit)?.to_string()));
                }
                Part::Simple(nested) => {
                    let (Some(previous), Some(next)) = (previous, next) else {
                        return Err(CompileError::Structural(
                            "simple gap without surrounding tokens".to_string(),
                        ));
                    };
                    let previous = self.member_label(previous)?;
                    let next = self.member_label(next)?;
                    let previous_alias = self.alias_of_label(previous)?;
                    let next_alias = self.alias_of_label(next)?;
                    self.compile_simple(&previous_alias, &next_alias, nested)?;
                    items.push(LayoutItem::Span {
                        prev: previous.to_string(),
                        next: next.to_string(),
                    });
                }
                Part::Gap(gap) => {
                    let index = self.compile_gap(&label, gap, previous, next, part_of)?;
                    items.push(LayoutItem::Path(index));
                }
            }
        }

        self.prefilter(sequence, &parts);
        tracing::debug!(
            sequence = %label,
            anchors = anchors.len(),
            traversals = items
                .iter()
                .filter(|item| matches!(item, LayoutItem::Path(_)))
                .count(),
            "compiled sequence"
        );
        self.ctx
            .sequences
            .insert(label.clone(), SequenceLayout { label, items });
        Ok(())
    }

    fn compile_anchors(&mut self, anchors: &[&Unit], part_of: Option<&str>) -> Result<()> {
        let segment_key = self.ctx.segment_key();
        let mut first: Option<String> = None;
        for unit in anchors {
            self.check_token(unit)?;
            let parent = unit.part_of.as_deref().or(part_of);
            compile_unit(self.ctx, unit, parent)?;

            let alias = self.alias_of(unit)?;
            match (&first, parent) {
                (None, _) => first = Some(alias),
                (Some(first), None) => {
                    self.ctx.conditions.insert(format!(
                        "{}.{} = {}.{}",
                        alias, segment_key, first, segment_key
                    ));
                }
                (Some(_), Some(_)) => {}
            }
        }
        Ok(())
    }

    /// Register a traversal for a gap and return its index
    fn compile_gap(
        &mut self,
        sequence: &str,
        members: &[SequenceMember],
        previous: Option<&Unit>,
        next: Option<&Unit>,
        part_of: Option<&str>,
    ) -> Result<usize> {
        let index = self.ctx.next_traversal();
        let name = format!("traversal{}", index);
        let step_alias = format!("{}_t", name);

        let mut patterns = members
            .iter()
            .map(|member| pattern(member, sequence))
            .collect::<Result<Vec<_>>>()?;

        let (direction, start, bound) = match (previous, next) {
            (Some(previous), Some(next)) => {
                patterns.push(Pattern::Symbol(Symbol::new(self.member_label(next)?, sequence)));
                let width: usize = members.iter().map(SequenceMember::min_width).sum();
                let token_id = self.ctx.token_id();
                let (previous, next) = (self.alias_of(previous)?, self.alias_of(next)?);
                self.ctx.conditions.insert(format!(
                    "{}.{} - {}.{} > {}",
                    next, token_id, previous, token_id, width
                ));
                (Direction::Forward, Start::Anchor(previous), Some(next))
            }
            (Some(previous), None) => (
                Direction::Forward,
                Start::Anchor(self.alias_of(previous)?),
                None,
            ),
            (None, Some(next)) => (Direction::Backward, Start::Anchor(self.alias_of(next)?), None),
            (None, None) => {
                let segment = part_of.ok_or_else(|| {
                    CompileError::Structural(format!(
                        "sequence '{}' needs partOf to be matched without fixed tokens",
                        sequence
                    ))
                })?;
                let layer = self.ctx.labels.layer_of(segment)?;
                if !self.ctx.config.is_segment(layer) {
                    return Err(CompileError::Structural(format!(
                        "sequence '{}' without fixed tokens must be part of a {} unit",
                        sequence,
                        self.ctx.config.segment_layer()
                    )));
                }
                (
                    Direction::Forward,
                    Start::Segment(self.alias_of_label(segment)?),
                    None,
                )
            }
        };

        let mut pattern = Pattern::Concat(patterns);
        if direction == Direction::Backward {
            pattern = pattern.reversed();
        }
        if matches!(start, Start::Segment(_)) && pattern.accepts_empty() {
            return Err(CompileError::Structural(format!(
                "sequence '{}' may match zero tokens",
                sequence
            )));
        }
        let automaton = Automaton::build(&pattern);

        let constraints = self.ctx.constraints();
        let mut steps = IndexMap::new();
        let mut joins = Joins::new();
        let mut units = Vec::new();
        gap_units(members, &mut units);
        for unit in units {
            self.check_token(unit)?;
            let label = self.member_label(unit)?;
            if steps.contains_key(label) {
                continue;
            }
            let scope = Scope::unit(label, &step_alias, &unit.layer, Visibility::local());
            let (conditions, unit_joins) = constraints
                .compile_unit_constraints(&scope, unit)?
                .into_where();
            joins.merge(unit_joins);
            let condition = (!conditions.is_empty()).then(|| conditions.join(" AND "));
            steps.insert(label.to_string(), condition);
        }
        if let (Some(next), Some(bound)) = (next, &bound) {
            let token_id = self.ctx.token_id();
            steps.insert(
                self.member_label(next)?.to_string(),
                Some(format!("{}.{} = {}.{}", step_alias, token_id, name, bound)),
            );
        }

        tracing::trace!(
            traversal = index,
            states = automaton.state_count,
            transitions = automaton.transitions.len(),
            "registered traversal"
        );
        self.ctx.traversals.push(Traversal {
            index,
            sequence: sequence.to_string(),
            automaton,
            direction,
            start,
            bound,
            steps,
            joins,
        });
        Ok(index)
    }

    /// Positional full-text prefilter over the sequence's segment
    fn prefilter(&mut self, sequence: &Sequence, parts: &[Part]) {
        if !self.ctx.options.enable_prefilter || !sequence.repetition.is_once() {
            return;
        }
        let Some(part_of) = sequence.part_of.as_deref() else {
            return;
        };
        let config = self.ctx.config;
        let on_segment = self
            .ctx
            .labels
            .layer_of(part_of)
            .is_ok_and(|layer| config.is_segment(layer));
        let prefilter = Prefilter::new(config);
        if !on_segment || !prefilter.is_available() {
            return;
        }

        let slots: Vec<Slot<'_>> = parts
            .iter()
            .map(|part| match part {
                Part::Anchor(unit)
                    if unit.part_of.as_deref().map_or(true, |parent| parent == part_of) =>
                {
                    Slot::Token(unit)
                }
                _ => Slot::Gap,
            })
            .collect();
        if let Some(tsquery) = prefilter.tsquery(&slots) {
            self.ctx
                .prefilters
                .entry(part_of.to_string())
                .or_default()
                .push(prefilter.condition(&tsquery));
        }
    }

    fn check_token(&self, unit: &Unit) -> Result<()> {
        if self.ctx.config.is_token(&unit.layer) {
            Ok(())
        } else {
            Err(CompileError::TypeError(format!(
                "sequence member '{}' is a {} unit, sequences are made of {} units",
                unit.label().unwrap_or("?"),
                unit.layer,
                self.ctx.config.token_layer()
            )))
        }
    }

    fn member_label<'u>(&self, unit: &'u Unit) -> Result<&'u str> {
        unit.label().ok_or_else(|| {
            CompileError::Structural(format!(
                "unlabelled {} unit in a sequence",
                unit.layer
            ))
        })
    }

    fn alias_of(&self, unit: &Unit) -> Result<String> {
        self.alias_of_label(self.member_label(unit)?)
    }

    fn alias_of_label(&self, label: &str) -> Result<String> {
        Ok(self.ctx.labels.alias(label)?.to_string())
    }
}

/// Unroll the first iteration of a repeated top-level sequence
fn peel(sequence: &Sequence, label: &str) -> Result<Vec<SequenceMember>> {
    let repetition = sequence.repetition;
    if repetition.is_once() {
        return Ok(sequence.members.clone());
    }
    if repetition.min == 0 {
        return Err(CompileError::SyntaxError(format!(
            "top-level sequence '{}' must match at least once",
            label
        )));
    }

    let mut members = sequence.members.clone();
    let remaining = repetition.max.map(|max| max.saturating_sub(1));
    if remaining != Some(0) {
        let mut rest = Sequence::new(sequence.members.clone())
            .with_repetition(repetition.min - 1, remaining);
        rest.label = Some(label.to_string());
        members.push(SequenceMember::Sequence(rest));
    }
    Ok(members)
}

/// Splice nested sequences that match exactly once
fn flatten(members: Vec<SequenceMember>, out: &mut Vec<SequenceMember>) {
    for member in members {
        match member {
            SequenceMember::Sequence(nested) if nested.repetition.is_once() => {
                flatten(nested.members, out)
            }
            other => out.push(other),
        }
    }
}

fn partition(members: Vec<SequenceMember>) -> Vec<Part> {
    let mut parts = Vec::new();
    let mut gap = Vec::new();
    for member in members {
        match member {
            SequenceMember::Unit(unit) => {
                if !gap.is_empty() {
                    parts.push(Part::Gap(std::mem::take(&mut gap)));
                }
                parts.push(Part::Anchor(unit));
            }
            other => gap.push(other),
        }
    }
    if !gap.is_empty() {
        parts.push(Part::Gap(gap));
    }

    let last = parts.len().saturating_sub(1);
    parts
        .into_iter()
        .enumerate()
        .map(|(i, part)| match part {
            Part::Gap(mut members) if i > 0 && i < last && is_simple_gap(&members) => {
                match members.pop() {
                    Some(SequenceMember::Sequence(nested)) => Part::Simple(nested),
                    _ => Part::Gap(members),
                }
            }
            other => other,
        })
        .collect()
}

fn is_simple_gap(members: &[SequenceMember]) -> bool {
    match members {
        [SequenceMember::Sequence(nested)] => {
            !nested.members.is_empty() && nested.is_simple() && nested.repetition.is_bounded()
        }
        _ => false,
    }
}

/// Regular pattern of a gap member; symbols carry their innermost container
fn pattern(member: &SequenceMember, container: &str) -> Result<Pattern> {
    match member {
        SequenceMember::Unit(unit) => {
            let label = unit.label().ok_or_else(|| {
                CompileError::Structural(format!("unlabelled {} unit in a sequence", unit.layer))
            })?;
            Ok(Pattern::Symbol(Symbol::new(label, container)))
        }
        SequenceMember::Sequence(nested) => {
            let label = nested.label.as_deref().unwrap_or(container);
            let inner = Pattern::Concat(
                nested
                    .members
                    .iter()
                    .map(|m| pattern(m, label))
                    .collect::<Result<_>>()?,
            );
            if nested.repetition.is_once() {
                Ok(inner)
            } else {
                Ok(Pattern::repeat(
                    inner,
                    nested.repetition.min,
                    nested.repetition.max,
                ))
            }
        }
        SequenceMember::Disjunction(disjunction) => {
            let label = disjunction.label.as_deref().unwrap_or(container);
            Ok(Pattern::Alt(
                disjunction
                    .members
                    .iter()
                    .map(|m| pattern(m, label))
                    .collect::<Result<_>>()?,
            ))
        }
    }
}

fn gap_units<'m>(members: &'m [SequenceMember], out: &mut Vec<&'m Unit>) {
    for member in members {
        match member {
            SequenceMember::Unit(unit) => out.push(unit),
            SequenceMember::Sequence(nested) => gap_units(&nested.members, out),
            SequenceMember::Disjunction(disjunction) => gap_units(&disjunction.members, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(label: &str) -> SequenceMember {
        SequenceMember::Unit(Unit::new("Token").with_label(label))
    }

    fn kinds(parts: &[Part]) -> Vec<&'static str> {
        parts
            .iter()
            .map(|part| match part {
                Part::Anchor(_) => "anchor",
                Part::Simple(_) => "simple",
                Part::Gap(_) => "gap",
            })
            .collect()
    }

    #[test]
    fn test_partition_simple_and_gaps() {
        let mut members = Vec::new();
        flatten(
            vec![
                token("a"),
                SequenceMember::Sequence(
                    Sequence::new(vec![token("b")])
                        .with_label("bounded")
                        .with_repetition(1, Some(3)),
                ),
                token("c"),
                SequenceMember::Sequence(
                    Sequence::new(vec![token("d")])
                        .with_label("star")
                        .with_repetition(0, None),
                ),
            ],
            &mut members,
        );
        assert_eq!(kinds(&partition(members)), vec!["anchor", "simple", "anchor", "gap"]);
    }

    #[test]
    fn test_flatten_once_sequences() {
        let mut members = Vec::new();
        flatten(
            vec![
                token("a"),
                SequenceMember::Sequence(Sequence::new(vec![token("b"), token("c")]).with_label("n")),
            ],
            &mut members,
        );
        assert_eq!(kinds(&partition(members)), vec!["anchor", "anchor", "anchor"]);
    }

    #[test]
    fn test_peel_repeated_sequence() {
        let sequence = Sequence::new(vec![token("a")])
            .with_label("s")
            .with_repetition(2, Some(4));
        let members = peel(&sequence, "s").unwrap();
        assert_eq!(members.len(), 2);
        match &members[1] {
            SequenceMember::Sequence(rest) => {
                assert_eq!(rest.repetition.min, 1);
                assert_eq!(rest.repetition.max, Some(3));
            }
            other => panic!("unexpected member {:?}", other),
        }

        let optional = Sequence::new(vec![token("a")]).with_repetition(0, Some(2));
        assert!(peel(&optional, "s").is_err());
    }

    #[test]
    fn test_gap_pattern_labels_innermost_container() {
        let member = SequenceMember::Sequence(
            Sequence::new(vec![SequenceMember::Disjunction(
                corpql_core::ast::Disjunction::new(vec![token("x"), token("y")]).with_label("alt"),
            )])
            .with_label("rep")
            .with_repetition(0, None),
        );
        let pattern = pattern(&member, "top").unwrap();
        let automaton = Automaton::build(&pattern);
        assert!(automaton.accepts(&[Symbol::new("x", "alt"), Symbol::new("y", "alt")]));
        assert!(automaton.accepts_empty());
    }
}
