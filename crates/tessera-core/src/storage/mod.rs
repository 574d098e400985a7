//! # Graph Storage
//!
//! The storage contract of the engine and its two backends.
//!
//! - `MemoryStorage`: BTreeMap-backed, snapshot transactions
//! - `RedbStorage`: disk-backed through redb
//!
//! The trait exposes the primitives a backend must provide (CRUD on nodes,
//! edges and properties, plus transactions). The traversals the engine
//! actually uses are default methods built on those primitives, so every
//! backend answers them identically.

mod memory;
mod redb_storage;

pub use self::memory::MemoryStorage;
pub use self::redb_storage::RedbStorage;

use crate::children::RelatedNode;
use crate::{Edge, EdgeDraft, EdgeId, Node, NodeDraft, NodeId, Player, SimpleValue, TesseraError};

// =============================================================================
// GRAPH STORAGE TRAIT
// =============================================================================

/// Typed graph storage.
///
/// Ids of nodes and edges are allocated from one counter, so the raw value of
/// a [`Player`] is unique. Edge lists are returned in ascending id order,
/// which is creation order.
///
/// Transactions are flat: `begin` while a transaction is open fails with
/// `Precondition`. Without an open transaction every write commits on its own.
pub trait GraphStorage {
    /// Get a node by id. Returned nodes have no children loaded.
    fn fetch_node(&self, id: NodeId) -> Result<Option<Node>, TesseraError>;

    /// Get an edge by id.
    fn fetch_edge(&self, id: EdgeId) -> Result<Option<Edge>, TesseraError>;

    /// Get the node carrying the given (non-empty) URI.
    fn fetch_node_by_uri(&self, uri: &str) -> Result<Option<Node>, TesseraError>;

    /// All nodes of a type holding exactly `value`.
    fn fetch_nodes_by_value(
        &self,
        type_uri: &str,
        value: &SimpleValue,
    ) -> Result<Vec<Node>, TesseraError>;

    /// All nodes of a type, in id order.
    fn fetch_nodes_by_type(&self, type_uri: &str) -> Result<Vec<Node>, TesseraError>;

    /// All edges in which `player` plays a role.
    fn fetch_edges(&self, player: Player) -> Result<Vec<Edge>, TesseraError>;

    /// Create a node. A non-empty URI must not be in use yet.
    fn create_node(&mut self, draft: NodeDraft) -> Result<Node, TesseraError>;

    fn set_node_value(&mut self, id: NodeId, value: SimpleValue) -> Result<(), TesseraError>;

    /// Delete a node with all edges it plays a role in, recursively.
    ///
    /// Returns every edge removed by the cascade.
    fn delete_node(&mut self, id: NodeId) -> Result<Vec<EdgeId>, TesseraError>;

    /// Create an edge. Both players must exist.
    fn create_edge(&mut self, draft: EdgeDraft) -> Result<Edge, TesseraError>;

    fn set_edge_value(&mut self, id: EdgeId, value: SimpleValue) -> Result<(), TesseraError>;

    /// Delete an edge with all edges it plays a role in, recursively.
    ///
    /// Returns every edge removed, `id` included.
    fn delete_edge(&mut self, id: EdgeId) -> Result<Vec<EdgeId>, TesseraError>;

    /// Read a property of a node or edge.
    fn property(&self, player: Player, key: &str) -> Result<Option<SimpleValue>, TesseraError>;

    /// Write a property of a node or edge.
    fn set_property(
        &mut self,
        player: Player,
        key: &str,
        value: SimpleValue,
    ) -> Result<(), TesseraError>;

    fn node_count(&self) -> Result<usize, TesseraError>;

    fn edge_count(&self) -> Result<usize, TesseraError>;

    /// Open a transaction.
    fn begin(&mut self) -> Result<(), TesseraError>;

    /// Make the open transaction durable.
    fn commit(&mut self) -> Result<(), TesseraError>;

    /// Discard everything written since `begin`.
    fn rollback(&mut self) -> Result<(), TesseraError>;

    // =========================================================================
    // PROVIDED TRAVERSALS
    // =========================================================================

    /// The single node of a type holding `value`.
    ///
    /// # Errors
    ///
    /// `Ambiguity` if more than one node matches.
    fn fetch_node_by_value(
        &self,
        type_uri: &str,
        value: &SimpleValue,
    ) -> Result<Option<Node>, TesseraError> {
        let nodes = self.fetch_nodes_by_value(type_uri, value)?;
        at_most_one(nodes, || {
            format!("more than one '{}' node holds value '{}'", type_uri, value)
        })
    }

    /// Nodes related to `player` through edges of `edge_type` in which
    /// `player` plays `my_role` and the node plays `others_role`.
    ///
    /// Results are ordered by edge id.
    fn fetch_related_nodes(
        &self,
        player: Player,
        edge_type: &str,
        my_role: &str,
        others_role: &str,
        others_type: Option<&str>,
    ) -> Result<Vec<RelatedNode>, TesseraError> {
        let mut related = Vec::new();
        for edge in self.fetch_edges(player)? {
            if edge.type_uri != edge_type {
                continue;
            }
            let other = if edge.role1.player == player
                && edge.role1.role_type_uri == my_role
                && edge.role2.role_type_uri == others_role
            {
                edge.role2.player
            } else if edge.role2.player == player
                && edge.role2.role_type_uri == my_role
                && edge.role1.role_type_uri == others_role
            {
                edge.role1.player
            } else {
                continue;
            };
            let Player::Node(node_id) = other else {
                continue;
            };
            let node = self.fetch_node(node_id)?.ok_or_else(|| {
                TesseraError::NotFound(format!("node {} of edge {}", node_id, edge.id))
            })?;
            if others_type.is_some_and(|t| t != node.type_uri) {
                continue;
            }
            related.push(RelatedNode::new(node, edge));
        }
        Ok(related)
    }

    /// The single node related to `player` as in [`fetch_related_nodes`].
    ///
    /// [`fetch_related_nodes`]: GraphStorage::fetch_related_nodes
    fn fetch_related_node(
        &self,
        player: Player,
        edge_type: &str,
        my_role: &str,
        others_role: &str,
        others_type: Option<&str>,
    ) -> Result<Option<RelatedNode>, TesseraError> {
        let related =
            self.fetch_related_nodes(player, edge_type, my_role, others_role, others_type)?;
        at_most_one(related, || {
            format!(
                "{} has more than one '{}' relation as '{}'",
                player, edge_type, my_role
            )
        })
    }

    /// The single edge of `edge_type` between two players in the given roles.
    fn fetch_related_edge(
        &self,
        edge_type: &str,
        (player1, role1): (Player, &str),
        (player2, role2): (Player, &str),
    ) -> Result<Option<Edge>, TesseraError> {
        let plays = |edge: &Edge, player: Player, role: &str| {
            (edge.role1.player == player && edge.role1.role_type_uri == role)
                || (edge.role2.player == player && edge.role2.role_type_uri == role)
        };
        let edges: Vec<Edge> = self
            .fetch_edges(player1)?
            .into_iter()
            .filter(|e| e.type_uri == edge_type)
            .filter(|e| plays(e, player1, role1) && plays(e, player2, role2))
            .collect();
        at_most_one(edges, || {
            format!(
                "more than one '{}' edge between {} and {}",
                edge_type, player1, player2
            )
        })
    }
}

/// Reduce a result list that must hold zero or one element.
pub(crate) fn at_most_one<T>(
    mut items: Vec<T>,
    describe: impl FnOnce() -> String,
) -> Result<Option<T>, TesseraError> {
    match items.len() {
        0 => Ok(None),
        1 => Ok(items.pop()),
        _ => Err(TesseraError::Ambiguity(describe())),
    }
}

/// Key of the per-type value index.
pub(crate) fn value_index_key(type_uri: &str, value: &SimpleValue) -> String {
    format!("{}\u{1f}{}", type_uri, value.index_key())
}
