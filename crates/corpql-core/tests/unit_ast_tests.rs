//! Unit tests for query AST types

use corpql_core::ast::*;

// =============================================================================
// Reference Tests
// =============================================================================

#[test]
fn test_reference_constructors() {
    match Reference::attribute("t2.lemma") {
        Reference::Attribute(path) => assert_eq!(path, "t2.lemma"),
        _ => panic!("Expected attribute reference"),
    }
    match Reference::function("year", vec![Reference::attribute("date")]) {
        Reference::Function { name, args } => {
            assert_eq!(name, "year");
            assert_eq!(args.len(), 1);
        }
        _ => panic!("Expected function reference"),
    }
}

#[test]
fn test_entity_reference_labels() {
    let mut labels = Vec::new();
    let entity = Reference::entity("head");
    let string = Reference::string("dog");
    let attribute = Reference::attribute("lemma");
    entity.collect_labels(&mut labels);
    string.collect_labels(&mut labels);
    attribute.collect_labels(&mut labels);
    assert_eq!(labels, vec!["head"]);
}

// =============================================================================
// Unit / Sequence Tests
// =============================================================================

#[test]
fn test_unit_builder() {
    let unit = Unit::new("Token")
        .with_label("t")
        .part_of("s")
        .with_constraint(Constraint::new(
            Reference::attribute("form"),
            Operator::Eq,
            Reference::string("dog"),
        ));

    assert_eq!(unit.label(), Some("t"));
    assert_eq!(unit.part_of.as_deref(), Some("s"));
    assert_eq!(unit.nested_constraint_count(), 1);
}

#[test]
fn test_nested_constraint_count_includes_sub_units() {
    let gesture = Unit::new("Gesture").with_constraint(Constraint::new(
        Reference::attribute("kind"),
        Operator::Eq,
        Reference::string("point"),
    ));
    let group = Constraints::new(LogicalOperator::Not, vec![ConstraintItem::Unit(gesture)])
        .with_quantor(Quantor::Exists);
    let unit = Unit::new("Segment").with_group(group);

    // group + sub-unit + its constraint
    assert_eq!(unit.nested_constraint_count(), 3);
}

#[test]
fn test_sequence_min_width() {
    let token = || SequenceMember::Unit(Unit::new("Token"));
    let gap = SequenceMember::Sequence(Sequence::new(vec![token()]).with_repetition(0, None));
    let sequence = Sequence::new(vec![token(), gap, token()]);

    assert_eq!(sequence.min_width(), 2);
    assert!(!sequence.is_simple());

    let repeated = Sequence::new(vec![token(), token()]).with_repetition(3, Some(3));
    assert_eq!(repeated.min_width(), 6);
}

#[test]
fn test_disjunction_width_is_smallest_member() {
    let token = || SequenceMember::Unit(Unit::new("Token"));
    let pair = SequenceMember::Sequence(Sequence::new(vec![token(), token()]));
    let disjunction = SequenceMember::Disjunction(Disjunction::new(vec![pair, token()]));
    assert_eq!(disjunction.min_width(), 1);
    assert!(!disjunction.is_optional());
}

// =============================================================================
// Result Spec Tests
// =============================================================================

#[test]
fn test_collocation_referenced_labels() {
    let spec = ResultSpec::Collocation(CollocationResult {
        label: "coll".into(),
        center: Some("t".into()),
        window: Some(Window { left: -2, right: 2 }),
        space: None,
        attribute: CollocationResult::DEFAULT_ATTRIBUTE.into(),
    });
    assert_eq!(spec.label(), "coll");
    assert_eq!(spec.referenced_labels(), vec!["t"]);
}

#[test]
fn test_query_serializes() {
    let query = Query::new(vec![QueryNode::Unit(Unit::new("Segment").with_label("s"))])
        .with_result(ResultSpec::Plain(PlainResult {
            label: "kwic".into(),
            context: "s".into(),
            entities: vec!["*".into()],
        }));

    let json = serde_json::to_string(&query).unwrap();
    let back: Query = serde_json::from_str(&json).unwrap();
    assert_eq!(back, query);
}
