//! End-to-end behavior of the integration engine.
//!
//! Each test builds its schema in a fresh in-memory session.

#![allow(clippy::panic)]

use tessera_core::{
    AssocDef, Cardinality, DataKind, DirectiveKind, Edge, EdgeModel, MemoryStorage, Node, NodeId,
    NodeModel, Outcome, Player, RelatedModel, Session, SimpleValue, SlotModel, Subject,
    TesseraError, TypeSchema, UpdateModel,
};
use tessera_core::GraphStorage;

// =============================================================================
// HELPERS
// =============================================================================

fn simple(session: &mut Session<MemoryStorage>, uri: &str, kind: DataKind) {
    session
        .install_type(TypeSchema::new(uri, kind))
        .expect("simple type");
}

/// `person`: identity by `email`; slots `name`, `email`, `phone` (many).
fn people() -> Session<MemoryStorage> {
    let mut session = Session::in_memory();
    for uri in ["name", "email", "phone"] {
        simple(&mut session, uri, DataKind::Text);
    }
    session
        .install_type(
            TypeSchema::new("person", DataKind::Identity)
                .with_child("name", Cardinality::One)
                .and_then(|t| t.with_child("email", Cardinality::One))
                .and_then(|t| t.with_child("phone", Cardinality::Many))
                .expect("person")
                .with_identity(&["email"]),
        )
        .expect("person");
    session
}

fn integrate(
    session: &mut Session<MemoryStorage>,
    model: NodeModel,
    reference: Option<NodeId>,
) -> Outcome {
    let mut model = UpdateModel::from(model);
    session.integrate(&mut model, reference).expect("integrate")
}

fn integrated_node(outcome: &Outcome) -> Node {
    outcome.value.node.clone().expect("a node")
}

fn person(name: &str, email: &str) -> NodeModel {
    NodeModel::new("person")
        .with_child("name", NodeModel::untyped(name))
        .with_child("email", NodeModel::untyped(email))
}

fn child_of(node: &Node, slot: &str) -> Option<NodeId> {
    node.children
        .one(slot)
        .expect("single-valued slot")
        .map(|related| related.node.id)
}

fn values_of(node: &Node, slot: &str) -> Vec<SimpleValue> {
    node.children
        .many(slot)
        .expect("multi-valued slot")
        .iter()
        .map(|related| related.node.value.clone())
        .collect()
}

fn element_with(node: &Node, slot: &str, value: &str) -> NodeId {
    node.children
        .many(slot)
        .expect("multi-valued slot")
        .iter()
        .find(|related| related.node.value == SimpleValue::text(value))
        .map(|related| related.node.id)
        .expect("element present")
}

fn created_nodes(outcome: &Outcome) -> usize {
    outcome
        .directives
        .of_kind(DirectiveKind::NodeCreated)
        .count()
}

// =============================================================================
// 1. VALUE-TYPE UNIFICATION IS IDEMPOTENT
// =============================================================================

fn addresses() -> Session<MemoryStorage> {
    let mut session = Session::in_memory();
    simple(&mut session, "street", DataKind::Text);
    simple(&mut session, "city", DataKind::Text);
    session
        .install_type(
            TypeSchema::new("address", DataKind::Value)
                .with_child("street", Cardinality::One)
                .and_then(|t| t.with_child("city", Cardinality::One))
                .expect("address")
                .with_label(&["street", "city"]),
        )
        .expect("address");
    session
}

fn address(street: &str, city: &str) -> NodeModel {
    NodeModel::new("address")
        .with_child("street", NodeModel::untyped(street))
        .with_child("city", NodeModel::untyped(city))
}

#[test]
fn value_type_integrated_twice_is_one_node() {
    let mut session = addresses();
    let first = integrate(&mut session, address("Main St 1", "Springfield"), None);
    let second = integrate(&mut session, address("Main St 1", "Springfield"), None);

    let first_node = integrated_node(&first);
    assert_eq!(first_node.id, integrated_node(&second).id);
    assert_eq!(first_node.value, SimpleValue::text("Main St 1 Springfield"));
    assert_eq!(created_nodes(&first), 3);
    assert!(second.directives.is_empty());
}

#[test]
fn value_type_with_other_children_is_a_new_node() {
    let mut session = addresses();
    let first = integrate(&mut session, address("Main St 1", "Springfield"), None);
    let other = integrate(&mut session, address("Main St 1", "Shelbyville"), None);
    assert_ne!(integrated_node(&first).id, integrated_node(&other).id);
    // The street is shared by both addresses.
    assert_eq!(created_nodes(&other), 2);
}

#[test]
fn value_type_without_children_is_no_value() {
    let mut session = addresses();
    let outcome = integrate(&mut session, NodeModel::new("address"), Some(NodeId(1)));
    assert!(outcome.value.node.is_none());
}

// =============================================================================
// 2. SIMPLE VALUES ARE DEDUPLICATED, EDGES ARE NOT
// =============================================================================

#[test]
fn equal_simple_values_share_one_node() {
    let mut session = people();
    let first = integrate(&mut session, NodeModel::simple("name", "Ann"), None);
    let second = integrate(&mut session, NodeModel::simple("name", "Ann"), None);
    let id = integrated_node(&first).id;
    assert_eq!(id, integrated_node(&second).id);

    let found = session
        .storage()
        .fetch_node_by_value("name", &SimpleValue::text("Ann"))
        .expect("lookup")
        .expect("node");
    assert_eq!(found.id, id);
}

#[test]
fn equal_edges_between_different_players_stay_apart() {
    let mut session = people();
    let relating = || EdgeModel::new().with_value("nickname");
    let ann = NodeModel::new("person")
        .with_child(
            "name",
            RelatedModel::from(NodeModel::untyped("Ann")).with_relating(relating()),
        )
        .with_child("email", NodeModel::untyped("ann@x.org"));
    let other = NodeModel::new("person")
        .with_child(
            "name",
            RelatedModel::from(NodeModel::untyped("Ann")).with_relating(relating()),
        )
        .with_child("email", NodeModel::untyped("other@x.org"));

    let ann = integrated_node(&integrate(&mut session, ann, None));
    let other = integrated_node(&integrate(&mut session, other, None));
    let ann = session.fetch(ann.id).expect("ann");
    let other = session.fetch(other.id).expect("other");

    let ann_edge = &ann.children.one("name").expect("slot").expect("name").edge;
    let other_edge = &other.children.one("name").expect("slot").expect("name").edge;
    assert_eq!(child_of(&ann, "name"), child_of(&other, "name"));
    assert_ne!(ann_edge.id, other_edge.id);
    assert_eq!(ann_edge.value, SimpleValue::text("nickname"));
    assert_eq!(other_edge.value, SimpleValue::text("nickname"));
}

#[test]
fn empty_string_is_nothing_to_update() {
    let mut session = people();
    let outcome = integrate(&mut session, NodeModel::simple("name", ""), None);
    assert!(outcome.value.node.is_none());
    assert!(outcome.directives.is_empty());
}

// =============================================================================
// 3. PARTIAL UPDATES
// =============================================================================

#[test]
fn unmentioned_slots_are_preserved() {
    let mut session = people();
    let model = person("Ann", "ann@x.org").with_children(
        "phone",
        [NodeModel::untyped("555-1"), NodeModel::untyped("555-2")],
    );
    let ann = integrated_node(&integrate(&mut session, model, None));
    let before = session.fetch(ann.id).expect("before");

    let update = NodeModel::new("person").with_child("name", NodeModel::untyped("Ann Lee"));
    let outcome = integrate(&mut session, update, Some(ann.id));
    assert_eq!(integrated_node(&outcome).id, ann.id);

    let after = session.fetch(ann.id).expect("after");
    assert_eq!(
        after.children.one("email").expect("slot"),
        before.children.one("email").expect("slot")
    );
    assert_eq!(
        after.children.many("phone").expect("slot"),
        before.children.many("phone").expect("slot")
    );
    assert_ne!(child_of(&after, "name"), child_of(&before, "name"));
    assert_eq!(after.value, SimpleValue::text("Ann Lee"));
}

// =============================================================================
// 4. EXPLICIT EMPTY VERSUS ABSENT
// =============================================================================

#[test]
fn empty_list_clears_and_absent_slot_keeps_many() {
    let mut session = people();
    let model = person("Ann", "ann@x.org").with_children(
        "phone",
        [NodeModel::untyped("555-1"), NodeModel::untyped("555-2")],
    );
    let ann = integrated_node(&integrate(&mut session, model, None));

    integrate(
        &mut session,
        NodeModel::new("person").with_child("name", NodeModel::untyped("Ann")),
        Some(ann.id),
    );
    assert_eq!(values_of(&session.fetch(ann.id).expect("ann"), "phone").len(), 2);

    let outcome = integrate(
        &mut session,
        NodeModel::new("person").with_children("phone", Vec::<NodeModel>::new()),
        Some(ann.id),
    );
    assert_eq!(
        outcome
            .directives
            .of_kind(DirectiveKind::EdgeDeleted)
            .count(),
        2
    );
    assert!(values_of(&session.fetch(ann.id).expect("ann"), "phone").is_empty());
    // The phone numbers themselves remain.
    assert!(
        session
            .storage()
            .fetch_node_by_value("phone", &SimpleValue::text("555-1"))
            .expect("lookup")
            .is_some()
    );
}

#[test]
fn deletion_marker_clears_and_absent_slot_keeps_one() {
    let mut session = people();
    let ann = integrated_node(&integrate(&mut session, person("Ann", "ann@x.org"), None));
    let name = child_of(&session.fetch(ann.id).expect("ann"), "name").expect("name");

    integrate(
        &mut session,
        NodeModel::new("person").with_children("phone", [NodeModel::untyped("555-1")]),
        Some(ann.id),
    );
    assert_eq!(child_of(&session.fetch(ann.id).expect("ann"), "name"), Some(name));

    let outcome = integrate(
        &mut session,
        NodeModel::new("person").with_child("name", UpdateModel::delete_id(name)),
        Some(ann.id),
    );
    let after = session.fetch(ann.id).expect("ann");
    assert_eq!(child_of(&after, "name"), None);
    assert_eq!(after.value, SimpleValue::text(""));
    assert!(outcome.directives.contains(DirectiveKind::NodeUpdated, Subject::Node(ann.id)));
}

#[test]
fn deleting_a_child_the_slot_does_not_hold_is_rejected() {
    let mut session = people();
    let ann = integrated_node(&integrate(&mut session, person("Ann", "ann@x.org"), None));
    let mut model = UpdateModel::from(
        NodeModel::new("person").with_child("name", UpdateModel::delete_id(NodeId(999))),
    );
    let err = session.integrate(&mut model, Some(ann.id)).expect_err("wrong child");
    assert!(matches!(err.root(), TesseraError::Precondition(_)));
    assert!(err.to_string().contains("slot 'name'"));
}

#[test]
fn deletion_marker_removes_one_element_of_many() {
    let mut session = people();
    let model = person("Ann", "ann@x.org").with_children(
        "phone",
        [NodeModel::untyped("555-1"), NodeModel::untyped("555-2")],
    );
    let ann = integrated_node(&integrate(&mut session, model, None));
    let first = element_with(&session.fetch(ann.id).expect("ann"), "phone", "555-1");

    let update = NodeModel::new("person").with_children(
        "phone",
        [
            RelatedModel::from(UpdateModel::delete_id(first)),
            RelatedModel::from(NodeModel::untyped("555-2")),
        ],
    );
    integrate(&mut session, update, Some(ann.id));
    assert_eq!(
        values_of(&session.fetch(ann.id).expect("ann"), "phone"),
        vec![SimpleValue::text("555-2")]
    );
}

#[test]
fn many_element_is_replaced_by_original_id() {
    let mut session = people();
    let model = person("Ann", "ann@x.org").with_children(
        "phone",
        [NodeModel::untyped("555-1"), NodeModel::untyped("555-2")],
    );
    let ann = integrated_node(&integrate(&mut session, model, None));
    let stored = session.fetch(ann.id).expect("ann");
    let first = element_with(&stored, "phone", "555-1");
    let second = element_with(&stored, "phone", "555-2");

    let update = NodeModel::new("person").with_children(
        "phone",
        [
            NodeModel::untyped("555-9").with_id(first),
            NodeModel::untyped("555-2").with_id(second),
        ],
    );
    let outcome = integrate(&mut session, update, Some(ann.id));
    assert_eq!(
        outcome
            .directives
            .of_kind(DirectiveKind::EdgeDeleted)
            .count(),
        1
    );
    let mut phones = values_of(&session.fetch(ann.id).expect("ann"), "phone");
    phones.sort();
    assert_eq!(phones, vec![SimpleValue::text("555-2"), SimpleValue::text("555-9")]);
}

// =============================================================================
// 5. REFERENCES
// =============================================================================

#[test]
fn reference_is_equivalent_to_the_full_value() {
    let mut session = people();
    let ann = integrated_node(&integrate(&mut session, person("Ann", "ann@x.org"), None));
    let name = child_of(&session.fetch(ann.id).expect("ann"), "name").expect("name");

    let by_reference = NodeModel::new("person")
        .with_child("name", UpdateModel::reference_id(name))
        .with_child("email", NodeModel::untyped("b@x.org"));
    let by_value = person("Ann", "c@x.org");
    let b = integrated_node(&integrate(&mut session, by_reference, None));
    let c = integrated_node(&integrate(&mut session, by_value, None));

    let b = session.fetch(b.id).expect("b");
    let c = session.fetch(c.id).expect("c");
    assert_eq!(child_of(&b, "name"), Some(name));
    assert_eq!(child_of(&c, "name"), Some(name));
    assert_eq!(b.value, c.value);
    let edge_type = |n: &Node| {
        n.children
            .one("name")
            .expect("slot")
            .map(|r| r.edge.type_uri.clone())
    };
    assert_eq!(edge_type(&b), edge_type(&c));
}

#[test]
fn reference_by_uri_and_missing_targets() {
    let mut session = people();
    let named = NodeModel::simple("name", "Ann").with_uri("names.ann");
    let name = integrated_node(&integrate(&mut session, named, None));

    let model = NodeModel::new("person")
        .with_child("name", UpdateModel::reference_uri("names.ann"))
        .with_child("email", NodeModel::untyped("ann@x.org"));
    let ann = integrated_node(&integrate(&mut session, model, None));
    assert_eq!(child_of(&session.fetch(ann.id).expect("ann"), "name"), Some(name.id));

    let mut missing = UpdateModel::from(
        NodeModel::new("person").with_child("name", UpdateModel::reference_uri("names.bob")),
    );
    let err = session.integrate(&mut missing, None).expect_err("missing");
    assert!(matches!(err.root(), TesseraError::NotFound(_)));
}

#[test]
fn reference_of_the_wrong_type_is_rejected() {
    let mut session = people();
    let email = integrated_node(&integrate(&mut session, NodeModel::simple("email", "a@x"), None));
    let mut model = UpdateModel::from(
        NodeModel::new("person").with_child("name", UpdateModel::reference_id(email.id)),
    );
    let err = session.integrate(&mut model, None).expect_err("wrong type");
    assert!(matches!(err.root(), TesseraError::Precondition(_)));
}

#[test]
fn empty_reference_clears_a_single_slot() {
    let mut session = people();
    let ann = integrated_node(&integrate(&mut session, person("Ann", "ann@x.org"), None));
    integrate(
        &mut session,
        NodeModel::new("person").with_child("name", UpdateModel::empty_reference()),
        Some(ann.id),
    );
    assert_eq!(child_of(&session.fetch(ann.id).expect("ann"), "name"), None);
}

#[test]
fn resolved_references_name_their_node_by_id() {
    let mut session = people();
    let ann = integrated_node(&integrate(
        &mut session,
        person("Ann", "ann@x.org").with_uri("people.ann"),
        None,
    ));
    let mut top = UpdateModel::reference_uri("people.ann");
    let outcome = session.integrate(&mut top, None).expect("resolve");
    assert_eq!(top, UpdateModel::reference_id(ann.id));
    assert_eq!(outcome.value.original_id, None);

    let name = integrated_node(&integrate(
        &mut session,
        NodeModel::simple("name", "Bob").with_uri("names.bob"),
        None,
    ));
    let mut nested = UpdateModel::from(
        NodeModel::new("person")
            .with_child("name", UpdateModel::reference_uri("names.bob"))
            .with_child("email", NodeModel::untyped("bob@x.org")),
    );
    session.integrate(&mut nested, None).expect("integrate");
    let UpdateModel::Value(bob) = &nested else {
        panic!("value model expected");
    };
    let Some(SlotModel::One(slot)) = bob.children.get("name") else {
        panic!("name slot expected");
    };
    assert_eq!(slot.model, UpdateModel::reference_id(name.id));
}

#[test]
fn type_uris_stay_free_for_instances() {
    let mut session = people();
    let mut by_type = UpdateModel::reference_uri("person");
    let err = session
        .integrate(&mut by_type, None)
        .expect_err("no instance is named 'person'");
    assert!(matches!(err.root(), TesseraError::NotFound(_)));

    let ann = integrated_node(&integrate(
        &mut session,
        person("Ann", "ann@x.org").with_uri("one"),
        None,
    ));
    assert_eq!(ann.uri, "one");

    let mut reserved = UpdateModel::from(
        person("Bob", "bob@x.org").with_uri("tessera.meta.person"),
    );
    let err = session
        .integrate(&mut reserved, None)
        .expect_err("schema namespace");
    assert!(matches!(err.root(), TesseraError::Precondition(_)));
}

// =============================================================================
// 6. AMBIGUITY
// =============================================================================

fn points() -> Session<MemoryStorage> {
    let mut session = Session::in_memory();
    for uri in ["x", "y", "z"] {
        simple(&mut session, uri, DataKind::Number);
    }
    session
        .install_type(
            TypeSchema::new("point", DataKind::Value)
                .with_child("x", Cardinality::One)
                .and_then(|t| t.with_child("y", Cardinality::One))
                .and_then(|t| t.with_child("z", Cardinality::One))
                .expect("point")
                .with_label(&["x", "y", "z"]),
        )
        .expect("point");
    session
}

fn point(coords: &[(&str, i64)]) -> NodeModel {
    coords.iter().fold(NodeModel::new("point"), |model, (slot, v)| {
        model.with_child(slot, NodeModel::untyped(*v))
    })
}

#[test]
fn third_slot_disambiguates_value_candidates() {
    let mut session = points();
    let a = integrated_node(&integrate(&mut session, point(&[("x", 1), ("y", 2), ("z", 3)]), None));
    let b = integrated_node(&integrate(&mut session, point(&[("x", 1), ("y", 2), ("z", 4)]), None));
    assert_ne!(a.id, b.id);

    let mut partial = UpdateModel::from(point(&[("x", 1), ("y", 2)]));
    let err = session.integrate(&mut partial, None).expect_err("ambiguous");
    assert!(matches!(err.root(), TesseraError::Ambiguity(_)));
    let message = err.to_string();
    assert!(message.contains(&a.id.to_string()));
    assert!(message.contains(&b.id.to_string()));

    let narrowed = integrate(&mut session, point(&[("x", 1), ("y", 2), ("z", 3)]), None);
    assert_eq!(integrated_node(&narrowed).id, a.id);
}

#[test]
fn ambiguous_identity_is_reported() {
    let mut session = people();
    let ann = integrated_node(&integrate(&mut session, person("Ann", "ann@x.org"), None));
    // A second person holding the same email, written behind the engine's back.
    let twin = integrated_node(&integrate(
        &mut session,
        NodeModel::new("person").with_child("name", NodeModel::untyped("Twin")),
        None,
    ));
    let email = child_of(&session.fetch(ann.id).expect("ann"), "email").expect("email");
    integrate(
        &mut session,
        NodeModel::new("person").with_child("email", UpdateModel::reference_id(email)),
        Some(twin.id),
    );

    let mut model = UpdateModel::from(person("Ann", "ann@x.org"));
    let err = session.integrate(&mut model, None).expect_err("ambiguous");
    assert!(matches!(err.root(), TesseraError::Ambiguity(_)));
}

// =============================================================================
// 7. LABELS
// =============================================================================

#[test]
fn labels_recurse_through_composites() {
    let mut session = Session::in_memory();
    for uri in ["first", "last", "tag"] {
        simple(&mut session, uri, DataKind::Text);
    }
    session
        .install_type(
            TypeSchema::new("full_name", DataKind::Value)
                .with_child("first", Cardinality::One)
                .and_then(|t| t.with_child("last", Cardinality::One))
                .expect("full_name")
                .with_label(&["first", "last"]),
        )
        .expect("full_name");
    session
        .install_type(
            TypeSchema::new("member", DataKind::Identity)
                .with_child("full_name", Cardinality::One)
                .and_then(|t| t.with_child("tag", Cardinality::Many))
                .expect("member")
                .with_label(&["full_name", "tag"]),
        )
        .expect("member");

    let model = NodeModel::new("member")
        .with_child(
            "full_name",
            NodeModel::new("full_name")
                .with_child("first", NodeModel::untyped("Ann"))
                .with_child("last", NodeModel::untyped("Lee")),
        )
        .with_children("tag", [NodeModel::untyped("a"), NodeModel::untyped("b")]);
    let member = integrated_node(&integrate(&mut session, model, None));
    assert_eq!(member.value, SimpleValue::text("Ann Lee a, b"));

    let stored = session.fetch(member.id).expect("member");
    let full_name = stored
        .children
        .one("full_name")
        .expect("slot")
        .expect("full name");
    assert_eq!(full_name.node.value, SimpleValue::text("Ann Lee"));

    assert_eq!(
        session.label(Player::Node(member.id)).expect("label"),
        "Ann Lee a, b"
    );
}

// =============================================================================
// 8. END-TO-END: PERSON UNIFIED BY EMAIL
// =============================================================================

#[test]
fn person_is_unified_by_email() {
    let mut session = people();

    let first = integrate(&mut session, person("Ann", "a@x.com"), None);
    let p1 = integrated_node(&first);
    assert_eq!(created_nodes(&first), 3);
    assert_eq!(
        first
            .directives
            .of_kind(DirectiveKind::EdgeCreated)
            .count(),
        2
    );
    assert_eq!(p1.value, SimpleValue::text("Ann"));
    let ann = child_of(&session.fetch(p1.id).expect("p1"), "name").expect("name");

    let second = integrate(&mut session, person("Ann2", "a@x.com"), None);
    let unified = integrated_node(&second);
    assert_eq!(unified.id, p1.id);
    assert_eq!(unified.value, SimpleValue::text("Ann2"));
    assert_eq!(created_nodes(&second), 1);
    assert_eq!(
        second
            .directives
            .of_kind(DirectiveKind::EdgeDeleted)
            .count(),
        1
    );

    let stored = session.fetch(p1.id).expect("p1");
    let name = stored.children.one("name").expect("slot").expect("name");
    assert_eq!(name.node.value, SimpleValue::text("Ann2"));
    assert_ne!(name.node.id, ann);
    // The old name stays; only its edge was removed.
    assert!(session.storage().fetch_node(ann).expect("fetch").is_some());
}

// =============================================================================
// ERRORS & EDGE CASES
// =============================================================================

#[test]
fn missing_type_uri_is_a_precondition_error() {
    let mut session = people();
    let mut model = UpdateModel::from(NodeModel::untyped("Ann"));
    let err = session.integrate(&mut model, None).expect_err("no type");
    assert!(matches!(err, TesseraError::Precondition(_)));
}

#[test]
fn slot_shape_must_match_cardinality() {
    let mut session = people();
    let mut model = UpdateModel::from(
        NodeModel::new("person").with_children("name", [NodeModel::untyped("Ann")]),
    );
    let err = session.integrate(&mut model, None).expect_err("list for one");
    assert!(matches!(err.root(), TesseraError::Precondition(_)));

    let mut model = UpdateModel::from(
        NodeModel::new("person").with_child("phone", NodeModel::untyped("555")),
    );
    let err = session.integrate(&mut model, None).expect_err("one for list");
    assert!(matches!(err.root(), TesseraError::Precondition(_)));
}

#[test]
fn value_of_the_wrong_kind_is_rejected() {
    let mut session = points();
    let mut model = UpdateModel::from(
        NodeModel::new("point").with_child("x", NodeModel::untyped("one")),
    );
    let err = session.integrate(&mut model, None).expect_err("text for number");
    assert!(matches!(err.root(), TesseraError::Precondition(_)));
}

#[test]
fn relating_edge_value_is_updated_in_place() {
    let mut session = people();
    let model = person("Ann", "ann@x.org").with_children(
        "phone",
        [RelatedModel::from(NodeModel::untyped("555-1"))
            .with_relating(EdgeModel::new().with_value("home"))],
    );
    let ann = integrated_node(&integrate(&mut session, model, None));
    let before = session.fetch(ann.id).expect("ann");
    let edge = before.children.many("phone").expect("phones")[0].edge.clone();
    assert_eq!(edge.value, SimpleValue::text("home"));

    let update = NodeModel::new("person").with_children(
        "phone",
        [RelatedModel::from(NodeModel::untyped("555-1"))
            .with_relating(EdgeModel::new().with_value("work"))],
    );
    let outcome = integrate(&mut session, update, Some(ann.id));
    assert!(outcome.directives.contains(DirectiveKind::EdgeUpdated, Subject::Edge(edge.id)));

    let after = session.fetch(ann.id).expect("ann");
    let updated = &after.children.many("phone").expect("phones")[0].edge;
    assert_eq!(updated.id, edge.id);
    assert_eq!(updated.value, SimpleValue::text("work"));
}

#[test]
fn deleting_a_person_keeps_shared_children() {
    let mut session = people();
    let ann = integrated_node(&integrate(&mut session, person("Ann", "ann@x.org"), None));
    let other = integrated_node(&integrate(&mut session, person("Ann", "other@x.org"), None));
    let stored = session.fetch(ann.id).expect("ann");
    let name = child_of(&stored, "name").expect("name");
    let email = child_of(&stored, "email").expect("email");

    let directives = session.delete_node(ann.id).expect("delete");
    assert!(directives.contains(DirectiveKind::NodeDeleted, Subject::Node(ann.id)));
    assert!(directives.contains(DirectiveKind::NodeDeleted, Subject::Node(email)));

    let storage = session.storage();
    assert!(storage.fetch_node(ann.id).expect("fetch").is_none());
    assert!(storage.fetch_node(email).expect("fetch").is_none());
    // "Ann" is still the name of the other person.
    assert!(storage.fetch_node(name).expect("fetch").is_some());
    assert_eq!(
        child_of(&session.fetch(other.id).expect("other"), "name"),
        Some(name)
    );
}

#[test]
fn unknown_slot_names_the_type_in_the_error() {
    let mut session = people();
    let mut model = UpdateModel::from(
        NodeModel::new("person").with_child("nickname", NodeModel::untyped("A")),
    );
    let err = session.integrate(&mut model, None).expect_err("unknown slot");
    assert!(matches!(err.root(), TesseraError::Precondition(_)));
    assert!(err.to_string().contains("nickname"));
}

// =============================================================================
// COMPOSITE RELATING EDGES
// =============================================================================

/// `member` (identity: `email`) joins a `team` (identity: `name`) through a
/// `membership` edge that holds a `role`.
fn teams() -> Session<MemoryStorage> {
    let mut session = Session::in_memory();
    for uri in ["name", "email", "role"] {
        simple(&mut session, uri, DataKind::Text);
    }
    session
        .install_type(
            TypeSchema::new("team", DataKind::Identity)
                .with_child("name", Cardinality::One)
                .expect("team")
                .with_identity(&["name"]),
        )
        .expect("team");
    session
        .install_type(
            TypeSchema::new("membership", DataKind::Value)
                .with_child("role", Cardinality::One)
                .expect("membership"),
        )
        .expect("membership");
    session
        .install_type(
            TypeSchema::new("member", DataKind::Identity)
                .with_child("email", Cardinality::One)
                .and_then(|t| {
                    t.with_assoc_def(
                        AssocDef::aggregation("member", "team", Cardinality::One)
                            .with_custom_type("membership"),
                    )
                })
                .expect("member")
                .with_identity(&["email"]),
        )
        .expect("member");
    session
}

fn join_as(role: &str) -> NodeModel {
    NodeModel::new("member")
        .with_child("email", NodeModel::untyped("ann@x.org"))
        .with_child(
            "team#membership",
            RelatedModel::from(NodeModel::new("team").with_child("name", NodeModel::untyped("Core")))
                .with_relating(EdgeModel::new().with_child("role", NodeModel::untyped(role))),
        )
}

fn membership_of(session: &Session<MemoryStorage>, member: NodeId) -> Edge {
    session
        .fetch_tree(member, 2)
        .expect("tree")
        .children
        .one("team#membership")
        .expect("slot")
        .expect("team")
        .edge
        .clone()
}

#[test]
fn composite_relating_edge_reconciles_its_children() {
    let mut session = teams();
    let ann = integrated_node(&integrate(&mut session, join_as("admin"), None));
    let before = membership_of(&session, ann.id);
    assert_eq!(before.value, SimpleValue::text("admin"));
    let admin = before.children.one("role").expect("slot").expect("role").node.clone();
    assert_eq!(admin.value, SimpleValue::text("admin"));

    let outcome = integrate(&mut session, join_as("owner"), None);
    assert_eq!(integrated_node(&outcome).id, ann.id);
    assert!(outcome
        .directives
        .contains(DirectiveKind::EdgeUpdated, Subject::Edge(before.id)));

    let after = membership_of(&session, ann.id);
    assert_eq!(after.id, before.id);
    assert_eq!(after.value, SimpleValue::text("owner"));
    let role = after.children.one("role").expect("slot").expect("role");
    assert_eq!(role.node.value, SimpleValue::text("owner"));
    assert_ne!(role.node.id, admin.id);
    assert_eq!(
        session.label(Player::Edge(after.id)).expect("label"),
        "owner"
    );
}
