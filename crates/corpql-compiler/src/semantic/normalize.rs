//! Label normalization
//!
//! Gives every unit, sequence and disjunction a label so later passes can
//! address all of them uniformly. Generated labels are `_{prefix}{n}`,
//! numbered per prefix in document order, and never collide with a label
//! written by the user.

use corpql_core::ast::{
    ConstraintItem, Constraints, Disjunction, Query, QueryNode, Sequence, SequenceMember, Unit,
};
use indexmap::{IndexMap, IndexSet};

/// Assigns generated labels to unlabelled nodes
pub struct LabelNormalizer {
    taken: IndexSet<String>,
    counters: IndexMap<String, usize>,
}

impl LabelNormalizer {
    /// Return a copy of the query in which every node carries a label
    pub fn normalize(query: &Query) -> Query {
        let mut normalizer = Self {
            taken: IndexSet::new(),
            counters: IndexMap::new(),
        };
        for node in &query.nodes {
            normalizer.collect_node(node);
        }

        let mut normalized = query.clone();
        for node in &mut normalized.nodes {
            normalizer.label_node(node);
        }
        normalized
    }

    fn collect_node(&mut self, node: &QueryNode) {
        match node {
            QueryNode::Unit(unit) => self.collect_unit(unit),
            QueryNode::Sequence(sequence) => self.collect_sequence(sequence),
            QueryNode::Disjunction(disjunction) => self.collect_disjunction(disjunction),
            QueryNode::Set(set) => {
                self.taken.insert(set.label.clone());
                self.collect_unit(&set.unit);
            }
            QueryNode::Constraints(group) => self.collect_group(group),
            QueryNode::Constraint(_) | QueryNode::TimeConstraint(_) => {}
        }
    }

    fn collect_unit(&mut self, unit: &Unit) {
        if let Some(label) = &unit.label {
            self.taken.insert(label.clone());
        }
        for item in &unit.constraints {
            self.collect_item(item);
        }
    }

    fn collect_item(&mut self, item: &ConstraintItem) {
        match item {
            ConstraintItem::Unit(unit) => self.collect_unit(unit),
            ConstraintItem::Constraints(group) => self.collect_group(group),
            ConstraintItem::Constraint(_) | ConstraintItem::Time(_) => {}
        }
    }

    fn collect_group(&mut self, group: &Constraints) {
        for item in &group.args {
            self.collect_item(item);
        }
    }

    fn collect_sequence(&mut self, sequence: &Sequence) {
        if let Some(label) = &sequence.label {
            self.taken.insert(label.clone());
        }
        for member in &sequence.members {
            self.collect_member(member);
        }
    }

    fn collect_disjunction(&mut self, disjunction: &Disjunction) {
        if let Some(label) = &disjunction.label {
            self.taken.insert(label.clone());
        }
        for member in &disjunction.members {
            self.collect_member(member);
        }
    }

    fn collect_member(&mut self, member: &SequenceMember) {
        match member {
            SequenceMember::Unit(unit) => self.collect_unit(unit),
            SequenceMember::Sequence(sequence) => self.collect_sequence(sequence),
            SequenceMember::Disjunction(disjunction) => self.collect_disjunction(disjunction),
        }
    }

    fn generate(&mut self, prefix: &str) -> String {
        loop {
            let counter = self.counters.entry(prefix.to_string()).or_insert(0);
            let candidate = format!("_{}{}", prefix, counter);
            *counter += 1;
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    fn label_node(&mut self, node: &mut QueryNode) {
        match node {
            QueryNode::Unit(unit) => self.label_unit(unit),
            QueryNode::Sequence(sequence) => self.label_sequence(sequence),
            QueryNode::Disjunction(disjunction) => self.label_disjunction(disjunction),
            QueryNode::Set(set) => self.label_unit(&mut set.unit),
            QueryNode::Constraints(group) => self.label_group(group),
            QueryNode::Constraint(_) | QueryNode::TimeConstraint(_) => {}
        }
    }

    fn label_unit(&mut self, unit: &mut Unit) {
        if unit.label.is_none() {
            unit.label = Some(self.generate(&unit.layer.to_lowercase()));
        }
        for item in &mut unit.constraints {
            self.label_item(item);
        }
    }

    fn label_item(&mut self, item: &mut ConstraintItem) {
        match item {
            ConstraintItem::Unit(unit) => self.label_unit(unit),
            ConstraintItem::Constraints(group) => self.label_group(group),
            ConstraintItem::Constraint(_) | ConstraintItem::Time(_) => {}
        }
    }

    fn label_group(&mut self, group: &mut Constraints) {
        for item in &mut group.args {
            self.label_item(item);
        }
    }

    fn label_sequence(&mut self, sequence: &mut Sequence) {
        if sequence.label.is_none() {
            sequence.label = Some(self.generate("seq"));
        }
        for member in &mut sequence.members {
            self.label_member(member);
        }
    }

    fn label_disjunction(&mut self, disjunction: &mut Disjunction) {
        if disjunction.label.is_none() {
            disjunction.label = Some(self.generate("disj"));
        }
        for member in &mut disjunction.members {
            self.label_member(member);
        }
    }

    fn label_member(&mut self, member: &mut SequenceMember) {
        match member {
            SequenceMember::Unit(unit) => self.label_unit(unit),
            SequenceMember::Sequence(sequence) => self.label_sequence(sequence),
            SequenceMember::Disjunction(disjunction) => self.label_disjunction(disjunction),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_labels_in_document_order() {
        let query = Query::new(vec![
            QueryNode::Unit(Unit::new("Segment").with_label("s")),
            QueryNode::Sequence(Sequence::new(vec![
                SequenceMember::Unit(Unit::new("Token")),
                SequenceMember::Unit(Unit::new("Token").with_label("t")),
                SequenceMember::Unit(Unit::new("Token")),
            ])),
        ]);

        let normalized = LabelNormalizer::normalize(&query);
        let QueryNode::Sequence(sequence) = &normalized.nodes[1] else {
            panic!("Expected sequence");
        };
        assert_eq!(sequence.label.as_deref(), Some("_seq0"));
        let labels: Vec<_> = sequence.members.iter().filter_map(|m| m.label()).collect();
        assert_eq!(labels, vec!["_token0", "t", "_token1"]);
    }

    #[test]
    fn test_generated_labels_avoid_user_labels() {
        let query = Query::new(vec![
            QueryNode::Unit(Unit::new("Token")),
            QueryNode::Unit(Unit::new("Token").with_label("_token0")),
        ]);
        let normalized = LabelNormalizer::normalize(&query);
        let QueryNode::Unit(first) = &normalized.nodes[0] else {
            panic!("Expected unit");
        };
        assert_eq!(first.label(), Some("_token1"));
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let query = Query::new(vec![QueryNode::Unit(
            Unit::new("Segment").with_item(ConstraintItem::Unit(Unit::new("Gesture"))),
        )]);
        assert_eq!(
            LabelNormalizer::normalize(&query),
            LabelNormalizer::normalize(&query)
        );
    }
}
