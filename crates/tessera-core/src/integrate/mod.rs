//! # Integration Engine
//!
//! Turns update models into a canonical, deduplicated graph.
//!
//! ## Flow
//!
//! 1. Children are integrated first, in the order of the type's association
//!    definitions (bottom-up value construction).
//! 2. The parent is located or created:
//!    - simple types unify by `(type URI, value)`
//!    - value types unify by their set of children
//!    - identity types reuse the reference node, the node named by the
//!      model's id, or the node with the same identity children
//! 3. Parent/child edges are reconciled against what is stored.
//! 4. The label of a composite is recalculated and persisted.
//!
//! Every change is reported to the caller's [`Directives`]. The engine never
//! opens a transaction; [`crate::Session`] wraps each call in one.

mod delete;
mod integrator;
mod label;
mod loader;
mod reconcile;
mod resolver;
mod unifier;

pub use label::calculate_label;
pub use loader::{ensure_loaded, load_node, load_tree};
pub use resolver::resolve;

use crate::children::ChildTopics;
use crate::directives::Directives;
use crate::model::EdgeModel;
use crate::schema::{AssocDef, TypeSchemaProvider};
use crate::storage::GraphStorage;
use crate::{Edge, Entity, Node, NodeId, Player, SimpleValue, TesseraError};
use serde::Serialize;

// =============================================================================
// RESULTS
// =============================================================================

/// The outcome of integrating one update model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnifiedValue {
    /// The canonical node, or `None` when there was nothing to integrate.
    pub node: Option<Node>,
    /// The id the model carried before integration.
    pub original_id: Option<NodeId>,
}

/// A child model after integration.
#[derive(Debug)]
pub(crate) struct Unified {
    node: Node,
    original_id: Option<NodeId>,
}

#[derive(Debug)]
pub(crate) enum ChildResult {
    Value(Unified),
    /// Empty value or empty reference: clears a single-valued slot.
    Empty,
    /// Deletion marker, mapped to the id it names.
    Deleted(NodeId),
}

impl ChildResult {
    fn node(&self) -> Option<&Node> {
        match self {
            Self::Value(unified) => Some(&unified.node),
            Self::Empty | Self::Deleted(_) => None,
        }
    }
}

/// One integrated child plus the model of its relating edge.
#[derive(Debug)]
pub(crate) struct SlotChild {
    result: ChildResult,
    relating: Option<EdgeModel>,
}

#[derive(Debug)]
pub(crate) enum SlotResult {
    One(SlotChild),
    Many(Vec<SlotChild>),
}

/// A slot that was mentioned by the update model.
#[derive(Debug)]
pub(crate) struct IntegratedSlot {
    def: AssocDef,
    result: SlotResult,
}

// =============================================================================
// INTEGRATOR
// =============================================================================

/// Integration context for one call.
///
/// Holds the storage to write to, the schemas to integrate against and the
/// accumulator every change is reported to.
pub struct Integrator<'a, S: GraphStorage, P: TypeSchemaProvider + ?Sized> {
    storage: &'a mut S,
    types: &'a P,
    directives: &'a mut Directives,
}

impl<'a, S: GraphStorage, P: TypeSchemaProvider + ?Sized> Integrator<'a, S, P> {
    pub fn new(storage: &'a mut S, types: &'a P, directives: &'a mut Directives) -> Self {
        Self {
            storage,
            types,
            directives,
        }
    }
}

// =============================================================================
// PARENT VIEW
// =============================================================================

/// Mutable view of the node or edge whose children are being reconciled.
struct Parent<'p> {
    player: Player,
    type_uri: &'p str,
    value: &'p mut SimpleValue,
    children: &'p mut ChildTopics,
}

impl<'p> Parent<'p> {
    fn node(node: &'p mut Node) -> Self {
        Self {
            player: Player::Node(node.id),
            type_uri: &node.type_uri,
            value: &mut node.value,
            children: &mut node.children,
        }
    }

    fn edge(edge: &'p mut Edge) -> Self {
        Self {
            player: Player::Edge(edge.id),
            type_uri: &edge.type_uri,
            value: &mut edge.value,
            children: &mut edge.children,
        }
    }

    fn entity(entity: &'p mut Entity) -> Self {
        match entity {
            Entity::Node(node) => Self::node(node),
            Entity::Edge(edge) => Self::edge(edge),
        }
    }

    fn is_edge(&self) -> bool {
        matches!(self.player, Player::Edge(_))
    }

    fn node_id(&self) -> Option<NodeId> {
        match self.player {
            Player::Node(id) => Some(id),
            Player::Edge(_) => None,
        }
    }
}

/// Fail unless `actual` is the type the slot or caller expects.
fn check_type(expected: Option<&str>, actual: &str) -> Result<(), TesseraError> {
    match expected {
        Some(expected) if expected != actual => Err(TesseraError::Precondition(format!(
            "expected a node of type '{}', got one of type '{}'",
            expected, actual
        ))),
        _ => Ok(()),
    }
}
