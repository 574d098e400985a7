//! # Schema Persistence
//!
//! Type definitions are stored in the graph they describe.
//!
//! ```text
//!   [meta_type "person"] --composition_def--> [meta_type "email"]
//!        |  parent_type            child_type
//!        |                  ^
//!   sequence_start          | assoc_def (the def edge plays a role)
//!        v                  |
//!   (first def edge) --parent_cardinality / child_cardinality--> [cardinality "one"]
//!        |
//!     sequence (predecessor -> successor)
//!        v
//!   (next def edge) ...
//! ```
//!
//! A type node holds the type's name as its value and the data kind,
//! identity attributes and label configuration as properties. Each slot is a
//! `composition_def` or `aggregation_def` edge from the type node to the
//! child type node. Cardinalities are edges from the def *edge* to the
//! shared `one` / `many` nodes. The slot order is a linked sequence.
//!
//! Type and cardinality nodes carry their URI under [`META_URI_PREFIX`], so
//! they never collide with instance URIs.

use super::{AssocDef, AssocDefKind, Cardinality, DataKind, TypeSchema};
use crate::primitives::{
    AGGREGATION_DEF, CARDINALITY_TYPE, CHILD_CARDINALITY, COMPOSITION_DEF, LIST_SEPARATOR,
    META_TYPE, PARENT_CARDINALITY, PROP_CUSTOM_ASSOC_TYPE, PROP_DATA_KIND, PROP_IDENTITY_ATTRS,
    PROP_LABEL_CONFIG, ROLE_ASSOC_DEF, ROLE_CARDINALITY, ROLE_CHILD_TYPE, ROLE_PARENT_TYPE,
    META_URI_PREFIX, ROLE_PREDECESSOR, ROLE_SUCCESSOR, SEQUENCE, SEQUENCE_START,
};
use crate::storage::{at_most_one, GraphStorage};
use crate::{Edge, EdgeDraft, EdgeId, Node, NodeDraft, NodeId, Player, Role, SimpleValue, TesseraError};
use std::collections::BTreeSet;

// =============================================================================
// INSTALL
// =============================================================================

/// Persist a type definition, replacing the stored slots of an earlier
/// installation of the same type.
///
/// Child types must be installed first.
pub fn install_type<S: GraphStorage>(
    storage: &mut S,
    schema: &TypeSchema,
) -> Result<NodeId, TesseraError> {
    let type_node = match storage.fetch_node_by_uri(&meta_uri(&schema.uri))? {
        Some(node) => {
            if node.type_uri != META_TYPE {
                return Err(TesseraError::Precondition(format!(
                    "URI '{}' names a '{}' node, not a type",
                    schema.uri, node.type_uri
                )));
            }
            let name = SimpleValue::text(&schema.name);
            if node.value != name {
                storage.set_node_value(node.id, name)?;
            }
            remove_stored_slots(storage, node.id)?;
            node.id
        }
        None => {
            storage
                .create_node(
                    NodeDraft::new(META_TYPE, SimpleValue::text(&schema.name))
                        .with_uri(meta_uri(&schema.uri)),
                )?
                .id
        }
    };
    let type_player = Player::Node(type_node);

    storage.set_property(
        type_player,
        PROP_DATA_KIND,
        SimpleValue::text(schema.data_kind.uri()),
    )?;
    storage.set_property(
        type_player,
        PROP_IDENTITY_ATTRS,
        SimpleValue::text(join_list(&schema.identity_attrs)),
    )?;
    storage.set_property(
        type_player,
        PROP_LABEL_CONFIG,
        SimpleValue::text(join_list(&schema.label_config)),
    )?;

    let mut previous: Option<EdgeId> = None;
    for def in schema.assoc_defs.iter() {
        let def_edge = install_assoc_def(storage, type_node, def)?;
        let link = match previous {
            None => EdgeDraft::new(
                SEQUENCE_START,
                Role::new(ROLE_PARENT_TYPE, type_player),
                Role::new(ROLE_SUCCESSOR, Player::Edge(def_edge)),
            ),
            Some(prev) => EdgeDraft::new(
                SEQUENCE,
                Role::new(ROLE_PREDECESSOR, Player::Edge(prev)),
                Role::new(ROLE_SUCCESSOR, Player::Edge(def_edge)),
            ),
        };
        storage.create_edge(link)?;
        previous = Some(def_edge);
    }

    tracing::debug!(
        type_uri = %schema.uri,
        slots = schema.assoc_defs.len(),
        "installed type"
    );
    Ok(type_node)
}

fn install_assoc_def<S: GraphStorage>(
    storage: &mut S,
    type_node: NodeId,
    def: &AssocDef,
) -> Result<EdgeId, TesseraError> {
    let child = type_node_of(storage, &def.child_type_uri)?;
    let edge_type = match def.kind {
        AssocDefKind::Composition => COMPOSITION_DEF,
        AssocDefKind::Aggregation => AGGREGATION_DEF,
    };
    let def_edge = storage
        .create_edge(EdgeDraft::new(
            edge_type,
            Role::new(ROLE_PARENT_TYPE, Player::Node(type_node)),
            Role::new(ROLE_CHILD_TYPE, Player::Node(child.id)),
        ))?
        .id;

    if let Some(custom) = &def.custom_assoc_type_uri {
        storage.set_property(
            Player::Edge(def_edge),
            PROP_CUSTOM_ASSOC_TYPE,
            SimpleValue::text(custom),
        )?;
    }

    for (edge_type, cardinality) in [
        (PARENT_CARDINALITY, def.parent_cardinality),
        (CHILD_CARDINALITY, def.child_cardinality),
    ] {
        let card_node = cardinality_node(storage, cardinality)?;
        storage.create_edge(EdgeDraft::new(
            edge_type,
            Role::new(ROLE_ASSOC_DEF, Player::Edge(def_edge)),
            Role::new(ROLE_CARDINALITY, Player::Node(card_node)),
        ))?;
    }
    Ok(def_edge)
}

/// Delete the def edges and the sequence start of a type node. Cardinality
/// and sequence edges go with them, since they play roles in the def edges.
fn remove_stored_slots<S: GraphStorage>(
    storage: &mut S,
    type_node: NodeId,
) -> Result<(), TesseraError> {
    let player = Player::Node(type_node);
    for edge in storage.fetch_edges(player)? {
        let owned = matches!(
            edge.type_uri.as_str(),
            COMPOSITION_DEF | AGGREGATION_DEF | SEQUENCE_START
        ) && edge.find_role(ROLE_PARENT_TYPE)?.map(|r| r.player) == Some(player);
        if owned && storage.fetch_edge(edge.id)?.is_some() {
            storage.delete_edge(edge.id)?;
        }
    }
    Ok(())
}

/// The shared node standing for a cardinality, created on first use.
fn cardinality_node<S: GraphStorage>(
    storage: &mut S,
    cardinality: Cardinality,
) -> Result<NodeId, TesseraError> {
    let uri = meta_uri(cardinality.uri());
    if let Some(node) = storage.fetch_node_by_uri(&uri)? {
        return Ok(node.id);
    }
    let node = storage.create_node(
        NodeDraft::new(CARDINALITY_TYPE, SimpleValue::text(cardinality.uri())).with_uri(uri),
    )?;
    Ok(node.id)
}

/// The stored URI of a type or cardinality node.
fn meta_uri(uri: &str) -> String {
    format!("{}{}", META_URI_PREFIX, uri)
}

/// The type or cardinality URI a schema node stands for.
fn schema_uri(node: &Node) -> Result<&str, TesseraError> {
    node.uri.strip_prefix(META_URI_PREFIX).ok_or_else(|| {
        TesseraError::Precondition(format!(
            "schema node {} has URI '{}' outside the schema namespace",
            node.id, node.uri
        ))
    })
}

fn type_node_of<S: GraphStorage>(storage: &S, uri: &str) -> Result<Node, TesseraError> {
    storage
        .fetch_node_by_uri(&meta_uri(uri))?
        .filter(|node| node.type_uri == META_TYPE)
        .ok_or_else(|| TesseraError::NotFound(format!("type '{}' is not installed", uri)))
}

fn join_list(items: &[String]) -> String {
    items.join(&LIST_SEPARATOR.to_string())
}

fn split_list(value: Option<SimpleValue>) -> Vec<String> {
    value
        .as_ref()
        .and_then(SimpleValue::as_text)
        .map(|s| {
            s.split(LIST_SEPARATOR)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// =============================================================================
// LOAD
// =============================================================================

/// Load a type and every type it depends on, dependencies first.
pub fn load_type<S: GraphStorage>(storage: &S, uri: &str) -> Result<Vec<TypeSchema>, TesseraError> {
    let mut loader = Loader::new(storage);
    loader.visit(uri)?;
    Ok(loader.loaded)
}

/// Load every installed type, dependencies first.
pub fn load_installed_types<S: GraphStorage>(storage: &S) -> Result<Vec<TypeSchema>, TesseraError> {
    let mut loader = Loader::new(storage);
    for node in storage.fetch_nodes_by_type(META_TYPE)? {
        loader.visit(schema_uri(&node)?)?;
    }
    Ok(loader.loaded)
}

struct Loader<'a, S> {
    storage: &'a S,
    /// Types whose loading has started but not finished.
    in_progress: BTreeSet<String>,
    done: BTreeSet<String>,
    loaded: Vec<TypeSchema>,
}

impl<'a, S: GraphStorage> Loader<'a, S> {
    fn new(storage: &'a S) -> Self {
        Self {
            storage,
            in_progress: BTreeSet::new(),
            done: BTreeSet::new(),
            loaded: Vec::new(),
        }
    }

    fn visit(&mut self, uri: &str) -> Result<(), TesseraError> {
        if self.done.contains(uri) {
            return Ok(());
        }
        if !self.in_progress.insert(uri.to_string()) {
            return Err(TesseraError::Precondition(format!(
                "type '{}' contains itself",
                uri
            )));
        }

        let schema = read_type(self.storage, uri)?;
        for def in schema.assoc_defs.iter() {
            self.visit(&def.child_type_uri)?;
            if let Some(custom) = &def.custom_assoc_type_uri {
                if self.storage.fetch_node_by_uri(&meta_uri(custom))?.is_some() {
                    self.visit(custom)?;
                }
            }
        }

        self.in_progress.remove(uri);
        self.done.insert(uri.to_string());
        self.loaded.push(schema);
        Ok(())
    }
}

fn read_type<S: GraphStorage>(storage: &S, uri: &str) -> Result<TypeSchema, TesseraError> {
    let node = type_node_of(storage, uri)?;
    let player = Player::Node(node.id);

    let data_kind = storage
        .property(player, PROP_DATA_KIND)?
        .and_then(|v| v.as_text().map(str::to_string))
        .ok_or_else(|| TesseraError::NotFound(format!("data kind of type '{}'", uri)))?;

    let mut schema = TypeSchema::new(uri, DataKind::from_uri(&data_kind)?).named(node.value.to_string());
    schema.identity_attrs = split_list(storage.property(player, PROP_IDENTITY_ATTRS)?);
    schema.label_config = split_list(storage.property(player, PROP_LABEL_CONFIG)?);

    let mut visited = BTreeSet::new();
    let mut cursor = follow(storage, player, SEQUENCE_START, ROLE_PARENT_TYPE, ROLE_SUCCESSOR)?;
    while let Some(def_edge) = cursor {
        if !visited.insert(def_edge) {
            return Err(TesseraError::Precondition(format!(
                "slot sequence of type '{}' is cyclic",
                uri
            )));
        }
        let def = read_assoc_def(storage, uri, node.id, def_edge)?;
        schema.assoc_defs.push_back(def)?;
        cursor = follow(
            storage,
            Player::Edge(def_edge),
            SEQUENCE,
            ROLE_PREDECESSOR,
            ROLE_SUCCESSOR,
        )?;
    }
    Ok(schema)
}

/// The edge reached from `from` through a single sequence link.
fn follow<S: GraphStorage>(
    storage: &S,
    from: Player,
    edge_type: &str,
    my_role: &str,
    next_role: &str,
) -> Result<Option<EdgeId>, TesseraError> {
    let mut next = Vec::new();
    for edge in storage.fetch_edges(from)? {
        if edge.type_uri != edge_type {
            continue;
        }
        if edge.find_role(my_role)?.map(|r| r.player) != Some(from) {
            continue;
        }
        match edge.role(next_role)?.player {
            Player::Edge(id) => next.push(id),
            Player::Node(id) => {
                return Err(TesseraError::Precondition(format!(
                    "'{}' edge {} points at node {} instead of a slot",
                    edge_type, edge.id, id
                )));
            }
        }
    }
    at_most_one(next, || format!("{} has more than one '{}' link", from, edge_type))
}

fn read_assoc_def<S: GraphStorage>(
    storage: &S,
    type_uri: &str,
    type_node: NodeId,
    def_edge: EdgeId,
) -> Result<AssocDef, TesseraError> {
    let edge = storage
        .fetch_edge(def_edge)?
        .ok_or_else(|| TesseraError::NotFound(format!("slot edge {}", def_edge)))?;
    let kind = match edge.type_uri.as_str() {
        COMPOSITION_DEF => AssocDefKind::Composition,
        AGGREGATION_DEF => AssocDefKind::Aggregation,
        other => {
            return Err(TesseraError::Precondition(format!(
                "edge {} of type '{}' is not a slot definition",
                def_edge, other
            )));
        }
    };
    if edge.role(ROLE_PARENT_TYPE)?.player != Player::Node(type_node) {
        return Err(TesseraError::Precondition(format!(
            "slot edge {} in the sequence of '{}' belongs to another type",
            def_edge, type_uri
        )));
    }
    let child_type_uri = match edge.role(ROLE_CHILD_TYPE)?.player {
        Player::Node(id) => {
            let child = storage
                .fetch_node(id)?
                .ok_or_else(|| TesseraError::NotFound(format!("child type node {}", id)))?;
            schema_uri(&child)?.to_string()
        }
        Player::Edge(id) => {
            return Err(TesseraError::Precondition(format!(
                "slot edge {} has edge {} as child type",
                def_edge, id
            )));
        }
    };

    Ok(AssocDef {
        parent_type_uri: type_uri.to_string(),
        child_type_uri,
        kind,
        parent_cardinality: read_cardinality(storage, &edge, PARENT_CARDINALITY)?,
        child_cardinality: read_cardinality(storage, &edge, CHILD_CARDINALITY)?,
        custom_assoc_type_uri: storage
            .property(Player::Edge(def_edge), PROP_CUSTOM_ASSOC_TYPE)?
            .and_then(|v| v.as_text().map(str::to_string)),
    })
}

fn read_cardinality<S: GraphStorage>(
    storage: &S,
    def_edge: &Edge,
    edge_type: &str,
) -> Result<Cardinality, TesseraError> {
    let related = storage
        .fetch_related_node(
            Player::Edge(def_edge.id),
            edge_type,
            ROLE_ASSOC_DEF,
            ROLE_CARDINALITY,
            None,
        )?
        .ok_or_else(|| {
            TesseraError::NotFound(format!(
                "'{}' assignment of slot edge {}",
                edge_type, def_edge.id
            ))
        })?;
    Cardinality::from_uri(schema_uri(&related.node)?)
}
