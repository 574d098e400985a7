//! # In-memory Graph Storage
//!
//! `MemoryStorage` keeps the whole graph in `BTreeMap`s for deterministic
//! ordering. A transaction is a snapshot of the state taken at `begin`;
//! rollback restores it.

use super::{value_index_key, GraphStorage};
use crate::{Edge, EdgeDraft, EdgeId, Node, NodeDraft, NodeId, Player, SimpleValue, TesseraError};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    /// Node storage: NodeId -> Node (children never cached here)
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeId, Edge>,
    uri_index: BTreeMap<String, NodeId>,
    /// "type \x1f value" -> nodes
    value_index: BTreeMap<String, BTreeSet<NodeId>>,
    type_index: BTreeMap<String, BTreeSet<NodeId>>,
    /// Raw player id -> edges the player takes part in
    incidence: BTreeMap<u64, BTreeSet<EdgeId>>,
    properties: BTreeMap<u64, BTreeMap<String, SimpleValue>>,
    /// Last allocated id; ids start at 1.
    last_id: u64,
}

/// A graph held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: MemoryState,
    snapshot: Option<Box<MemoryState>>,
}

impl MemoryStorage {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All nodes, in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.state.nodes.values()
    }

    /// All edges, in id order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.state.edges.values()
    }

    /// True while a transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }
}

impl MemoryState {
    fn next_id(&mut self) -> u64 {
        self.last_id = self.last_id.saturating_add(1);
        self.last_id
    }

    fn contains(&self, player: Player) -> bool {
        match player {
            Player::Node(id) => self.nodes.contains_key(&id),
            Player::Edge(id) => self.edges.contains_key(&id),
        }
    }

    fn unindex_value(&mut self, node: &Node) {
        let key = value_index_key(&node.type_uri, &node.value);
        if let Some(ids) = self.value_index.get_mut(&key) {
            ids.remove(&node.id);
            if ids.is_empty() {
                self.value_index.remove(&key);
            }
        }
    }

    fn index_value(&mut self, node: &Node) {
        self.value_index
            .entry(value_index_key(&node.type_uri, &node.value))
            .or_default()
            .insert(node.id);
    }

    fn remove_edge(&mut self, id: EdgeId, removed: &mut Vec<EdgeId>) {
        let Some(edge) = self.edges.remove(&id) else {
            return;
        };
        removed.push(id);

        // Edges this edge plays a role in go first.
        let dependents = self
            .incidence
            .remove(&id.0)
            .unwrap_or_default();
        for dependent in dependents {
            self.remove_edge(dependent, removed);
        }

        for player in edge.players() {
            if let Some(ids) = self.incidence.get_mut(&player.raw()) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.incidence.remove(&player.raw());
                }
            }
        }
        self.properties.remove(&id.0);
    }
}

impl GraphStorage for MemoryStorage {
    fn fetch_node(&self, id: NodeId) -> Result<Option<Node>, TesseraError> {
        Ok(self.state.nodes.get(&id).cloned())
    }

    fn fetch_edge(&self, id: EdgeId) -> Result<Option<Edge>, TesseraError> {
        Ok(self.state.edges.get(&id).cloned())
    }

    fn fetch_node_by_uri(&self, uri: &str) -> Result<Option<Node>, TesseraError> {
        Ok(self
            .state
            .uri_index
            .get(uri)
            .and_then(|id| self.state.nodes.get(id))
            .cloned())
    }

    fn fetch_nodes_by_value(
        &self,
        type_uri: &str,
        value: &SimpleValue,
    ) -> Result<Vec<Node>, TesseraError> {
        let key = value_index_key(type_uri, value);
        Ok(self
            .state
            .value_index
            .get(&key)
            .into_iter()
            .flatten()
            .filter_map(|id| self.state.nodes.get(id))
            .cloned()
            .collect())
    }

    fn fetch_nodes_by_type(&self, type_uri: &str) -> Result<Vec<Node>, TesseraError> {
        Ok(self
            .state
            .type_index
            .get(type_uri)
            .into_iter()
            .flatten()
            .filter_map(|id| self.state.nodes.get(id))
            .cloned()
            .collect())
    }

    fn fetch_edges(&self, player: Player) -> Result<Vec<Edge>, TesseraError> {
        Ok(self
            .state
            .incidence
            .get(&player.raw())
            .into_iter()
            .flatten()
            .filter_map(|id| self.state.edges.get(id))
            .cloned()
            .collect())
    }

    fn create_node(&mut self, draft: NodeDraft) -> Result<Node, TesseraError> {
        if !draft.uri.is_empty() && self.state.uri_index.contains_key(&draft.uri) {
            return Err(TesseraError::Precondition(format!(
                "URI '{}' is already in use",
                draft.uri
            )));
        }
        let id = NodeId(self.state.next_id());
        let node = Node::new(id, draft.uri, draft.type_uri, draft.value);

        if !node.uri.is_empty() {
            self.state.uri_index.insert(node.uri.clone(), id);
        }
        self.state
            .type_index
            .entry(node.type_uri.clone())
            .or_default()
            .insert(id);
        self.state.index_value(&node);
        self.state.nodes.insert(id, node.clone());
        Ok(node)
    }

    fn set_node_value(&mut self, id: NodeId, value: SimpleValue) -> Result<(), TesseraError> {
        let mut node = self
            .state
            .nodes
            .get(&id)
            .cloned()
            .ok_or_else(|| TesseraError::NotFound(format!("node {}", id)))?;
        self.state.unindex_value(&node);
        node.value = value;
        self.state.index_value(&node);
        self.state.nodes.insert(id, node);
        Ok(())
    }

    fn delete_node(&mut self, id: NodeId) -> Result<Vec<EdgeId>, TesseraError> {
        let node = self
            .state
            .nodes
            .remove(&id)
            .ok_or_else(|| TesseraError::NotFound(format!("node {}", id)))?;

        let mut removed = Vec::new();
        let incident = self.state.incidence.remove(&id.0).unwrap_or_default();
        for edge_id in incident {
            self.state.remove_edge(edge_id, &mut removed);
        }

        if !node.uri.is_empty() {
            self.state.uri_index.remove(&node.uri);
        }
        if let Some(ids) = self.state.type_index.get_mut(&node.type_uri) {
            ids.remove(&id);
        }
        self.state.unindex_value(&node);
        self.state.properties.remove(&id.0);
        Ok(removed)
    }

    fn create_edge(&mut self, draft: EdgeDraft) -> Result<Edge, TesseraError> {
        for player in [draft.role1.player, draft.role2.player] {
            if !self.state.contains(player) {
                return Err(TesseraError::NotFound(format!(
                    "{} cannot play a role in a '{}' edge: it does not exist",
                    player, draft.type_uri
                )));
            }
        }
        let id = EdgeId(self.state.next_id());
        let mut edge = Edge::new(id, draft.type_uri, draft.role1, draft.role2);
        edge.value = draft.value;

        for player in edge.players() {
            self.state
                .incidence
                .entry(player.raw())
                .or_default()
                .insert(id);
        }
        self.state.edges.insert(id, edge.clone());
        Ok(edge)
    }

    fn set_edge_value(&mut self, id: EdgeId, value: SimpleValue) -> Result<(), TesseraError> {
        let edge = self
            .state
            .edges
            .get_mut(&id)
            .ok_or_else(|| TesseraError::NotFound(format!("edge {}", id)))?;
        edge.value = value;
        Ok(())
    }

    fn delete_edge(&mut self, id: EdgeId) -> Result<Vec<EdgeId>, TesseraError> {
        if !self.state.edges.contains_key(&id) {
            return Err(TesseraError::NotFound(format!("edge {}", id)));
        }
        let mut removed = Vec::new();
        self.state.remove_edge(id, &mut removed);
        Ok(removed)
    }

    fn property(&self, player: Player, key: &str) -> Result<Option<SimpleValue>, TesseraError> {
        Ok(self
            .state
            .properties
            .get(&player.raw())
            .and_then(|props| props.get(key))
            .cloned())
    }

    fn set_property(
        &mut self,
        player: Player,
        key: &str,
        value: SimpleValue,
    ) -> Result<(), TesseraError> {
        if !self.state.contains(player) {
            return Err(TesseraError::NotFound(format!("{}", player)));
        }
        self.state
            .properties
            .entry(player.raw())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn node_count(&self) -> Result<usize, TesseraError> {
        Ok(self.state.nodes.len())
    }

    fn edge_count(&self) -> Result<usize, TesseraError> {
        Ok(self.state.edges.len())
    }

    fn begin(&mut self) -> Result<(), TesseraError> {
        if self.snapshot.is_some() {
            return Err(TesseraError::Precondition(
                "a transaction is already open".to_string(),
            ));
        }
        self.snapshot = Some(Box::new(self.state.clone()));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), TesseraError> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or_else(|| TesseraError::Precondition("no transaction is open".to_string()))
    }

    fn rollback(&mut self) -> Result<(), TesseraError> {
        let snapshot = self
            .snapshot
            .take()
            .ok_or_else(|| TesseraError::Precondition("no transaction is open".to_string()))?;
        self.state = *snapshot;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    fn text(s: &str) -> SimpleValue {
        SimpleValue::text(s)
    }

    #[test]
    fn ids_are_shared_between_nodes_and_edges() {
        let mut storage = MemoryStorage::new();
        let a = storage.create_node(NodeDraft::new("name", text("a"))).expect("a");
        let b = storage.create_node(NodeDraft::new("name", text("b"))).expect("b");
        let e = storage
            .create_edge(EdgeDraft::new(
                "composition",
                Role::new("parent", Player::Node(a.id)),
                Role::new("child", Player::Node(b.id)),
            ))
            .expect("edge");
        let c = storage.create_node(NodeDraft::new("name", text("c"))).expect("c");
        let raw = [a.id.0, b.id.0, e.id.0, c.id.0];
        assert_eq!(raw, [1, 2, 3, 4]);
    }

    #[test]
    fn value_index_follows_updates() {
        let mut storage = MemoryStorage::new();
        let node = storage.create_node(NodeDraft::new("name", text("Ann"))).expect("node");
        storage.set_node_value(node.id, text("Bob")).expect("update");
        assert!(storage
            .fetch_nodes_by_value("name", &text("Ann"))
            .expect("lookup")
            .is_empty());
        assert_eq!(
            storage.fetch_nodes_by_value("name", &text("Bob")).expect("lookup").len(),
            1
        );
    }

    #[test]
    fn rollback_restores_snapshot() {
        let mut storage = MemoryStorage::new();
        storage.create_node(NodeDraft::new("name", text("kept"))).expect("node");
        storage.begin().expect("begin");
        assert!(storage.in_transaction());
        storage.create_node(NodeDraft::new("name", text("dropped"))).expect("node");
        storage.rollback().expect("rollback");
        assert!(!storage.in_transaction());
        assert_eq!(storage.node_count().expect("count"), 1);
        assert_eq!(storage.nodes().count(), 1);
    }

    #[test]
    fn nested_begin_is_rejected() {
        let mut storage = MemoryStorage::new();
        storage.begin().expect("begin");
        assert!(matches!(storage.begin(), Err(TesseraError::Precondition(_))));
        storage.commit().expect("commit");
        assert!(matches!(storage.commit(), Err(TesseraError::Precondition(_))));
    }

    #[test]
    fn deleting_an_edge_cascades_to_edges_on_it() {
        let mut storage = MemoryStorage::new();
        let a = storage.create_node(NodeDraft::new("t", text("a"))).expect("a");
        let b = storage.create_node(NodeDraft::new("t", text("b"))).expect("b");
        let ab = storage
            .create_edge(EdgeDraft::new(
                "rel",
                Role::new("from", Player::Node(a.id)),
                Role::new("to", Player::Node(b.id)),
            ))
            .expect("ab");
        let meta = storage
            .create_edge(EdgeDraft::new(
                "about",
                Role::new("subject", Player::Edge(ab.id)),
                Role::new("object", Player::Node(b.id)),
            ))
            .expect("meta");

        let removed = storage.delete_node(a.id).expect("delete");
        assert_eq!(removed, vec![ab.id, meta.id]);
        assert_eq!(storage.edges().count(), 0);
        assert!(storage.fetch_edges(Player::Node(b.id)).expect("edges").is_empty());
    }
}
