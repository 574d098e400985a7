//! # Core Type Definitions
//!
//! This module contains the persisted vocabulary of the Tessera graph:
//! - Object identifiers (`NodeId`, `EdgeId`)
//! - Scalar payloads (`SimpleValue`)
//! - Graph objects (`Node`, `Edge`, `Role`, `Player`, `Entity`)
//! - Error types (`TesseraError`)
//!
//! ## Identity
//!
//! Node and edge ids are allocated from one shared counter by the storage
//! backend, so an id names exactly one object. A model that has not been
//! persisted yet carries `None` instead of an id.

use crate::children::ChildTopics;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// OBJECT IDENTIFIERS
// =============================================================================

/// Identifier of a persisted node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Identifier of a persisted edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// SIMPLE VALUE
// =============================================================================

/// The scalar payload of a node or edge.
///
/// Composite objects carry their calculated label here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SimpleValue {
    Boolean(bool),
    Number(i64),
    Text(String),
}

impl SimpleValue {
    /// Create a text value.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// An empty text value means "nothing to update" for simple types.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(s) if s.is_empty())
    }

    /// Get the text if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Stable key used by storage backends to index values per type.
    #[must_use]
    pub fn index_key(&self) -> String {
        match self {
            Self::Boolean(b) => format!("b:{b}"),
            Self::Number(n) => format!("n:{n}"),
            Self::Text(s) => format!("t:{s}"),
        }
    }
}

impl Default for SimpleValue {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl fmt::Display for SimpleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for SimpleValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for SimpleValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for SimpleValue {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for SimpleValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

// =============================================================================
// ROLES & PLAYERS
// =============================================================================

/// Something that can play a role in an edge.
///
/// Edges may play roles in other edges, so the graph is not bipartite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Player {
    Node(NodeId),
    Edge(EdgeId),
}

impl Player {
    /// The raw object id, unique across nodes and edges.
    #[must_use]
    pub fn raw(self) -> u64 {
        match self {
            Self::Node(id) => id.0,
            Self::Edge(id) => id.0,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(id) => write!(f, "node {id}"),
            Self::Edge(id) => write!(f, "edge {id}"),
        }
    }
}

/// A role binds a role type (e.g. "parent") to a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub role_type_uri: String,
    pub player: Player,
}

impl Role {
    #[must_use]
    pub fn new(role_type_uri: impl Into<String>, player: Player) -> Self {
        Self {
            role_type_uri: role_type_uri.into(),
            player,
        }
    }
}

// =============================================================================
// NODE
// =============================================================================

/// A typed, identified vertex of the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub id: NodeId,
    /// Unique when non-empty.
    pub uri: String,
    pub type_uri: String,
    pub value: SimpleValue,
    /// In-memory child cache; empty until slots are loaded.
    pub children: ChildTopics,
}

impl Node {
    #[must_use]
    pub fn new(
        id: NodeId,
        uri: impl Into<String>,
        type_uri: impl Into<String>,
        value: SimpleValue,
    ) -> Self {
        Self {
            id,
            uri: uri.into(),
            type_uri: type_uri.into(),
            value,
            children: ChildTopics::new(),
        }
    }
}

/// Data needed to create a node. The backend assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDraft {
    pub uri: String,
    pub type_uri: String,
    pub value: SimpleValue,
}

impl NodeDraft {
    #[must_use]
    pub fn new(type_uri: impl Into<String>, value: SimpleValue) -> Self {
        Self {
            uri: String::new(),
            type_uri: type_uri.into(),
            value,
        }
    }

    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }
}

// =============================================================================
// EDGE
// =============================================================================

/// A typed, identified relationship between exactly two players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub id: EdgeId,
    pub uri: String,
    pub type_uri: String,
    pub value: SimpleValue,
    pub role1: Role,
    pub role2: Role,
    /// Edges can carry composite structure of their own.
    pub children: ChildTopics,
}

impl Edge {
    #[must_use]
    pub fn new(id: EdgeId, type_uri: impl Into<String>, role1: Role, role2: Role) -> Self {
        Self {
            id,
            uri: String::new(),
            type_uri: type_uri.into(),
            value: SimpleValue::default(),
            role1,
            role2,
            children: ChildTopics::new(),
        }
    }

    /// Look up the role with the given role type.
    ///
    /// Fails with `Ambiguity` if both roles carry that role type, so callers
    /// can never silently pick the wrong end.
    pub fn role(&self, role_type_uri: &str) -> Result<&Role, TesseraError> {
        self.find_role(role_type_uri)?.ok_or_else(|| {
            TesseraError::NotFound(format!(
                "edge {} ('{}') has no role of type '{}'",
                self.id, self.type_uri, role_type_uri
            ))
        })
    }

    /// Like [`Edge::role`] but a missing role is not an error.
    pub fn find_role(&self, role_type_uri: &str) -> Result<Option<&Role>, TesseraError> {
        let first = self.role1.role_type_uri == role_type_uri;
        let second = self.role2.role_type_uri == role_type_uri;
        match (first, second) {
            (true, true) => Err(TesseraError::Ambiguity(format!(
                "edge {} ('{}') has two roles of type '{}'",
                self.id, self.type_uri, role_type_uri
            ))),
            (true, false) => Ok(Some(&self.role1)),
            (false, true) => Ok(Some(&self.role2)),
            (false, false) => Ok(None),
        }
    }

    /// The role not played by `player`, if `player` takes part in this edge.
    #[must_use]
    pub fn other_role(&self, player: Player) -> Option<&Role> {
        if self.role1.player == player {
            Some(&self.role2)
        } else if self.role2.player == player {
            Some(&self.role1)
        } else {
            None
        }
    }

    /// Both players, in role order.
    #[must_use]
    pub fn players(&self) -> [Player; 2] {
        [self.role1.player, self.role2.player]
    }
}

/// Data needed to create an edge. The backend assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeDraft {
    pub type_uri: String,
    pub value: SimpleValue,
    pub role1: Role,
    pub role2: Role,
}

impl EdgeDraft {
    #[must_use]
    pub fn new(type_uri: impl Into<String>, role1: Role, role2: Role) -> Self {
        Self {
            type_uri: type_uri.into(),
            value: SimpleValue::default(),
            role1,
            role2,
        }
    }
}

// =============================================================================
// ENTITY
// =============================================================================

/// Either a node or an edge.
///
/// The integration engine reconciles children of both, so the parts they
/// share are reachable without caring which one it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Entity {
    Node(Node),
    Edge(Edge),
}

impl Entity {
    #[must_use]
    pub fn player(&self) -> Player {
        match self {
            Self::Node(n) => Player::Node(n.id),
            Self::Edge(e) => Player::Edge(e.id),
        }
    }

    #[must_use]
    pub fn type_uri(&self) -> &str {
        match self {
            Self::Node(n) => &n.type_uri,
            Self::Edge(e) => &e.type_uri,
        }
    }

    #[must_use]
    pub fn value(&self) -> &SimpleValue {
        match self {
            Self::Node(n) => &n.value,
            Self::Edge(e) => &e.value,
        }
    }

    pub fn set_value(&mut self, value: SimpleValue) {
        match self {
            Self::Node(n) => n.value = value,
            Self::Edge(e) => e.value = value,
        }
    }

    #[must_use]
    pub fn children(&self) -> &ChildTopics {
        match self {
            Self::Node(n) => &n.children,
            Self::Edge(e) => &e.children,
        }
    }

    pub fn children_mut(&mut self) -> &mut ChildTopics {
        match self {
            Self::Node(n) => &mut n.children,
            Self::Edge(e) => &mut e.children,
        }
    }

    #[must_use]
    pub fn is_edge(&self) -> bool {
        matches!(self, Self::Edge(_))
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Tessera engine.
///
/// - No silent failures
/// - Every failure aborts the whole integration call; the session rolls
///   back the storage transaction
/// - Classify with [`TesseraError::root`], which looks through the
///   contextual `Integration` wrappers
#[derive(Debug, Error)]
pub enum TesseraError {
    /// The caller broke a contract (missing type URI, wrong slot shape, ...).
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// More than one object matched where zero or one was expected.
    #[error("Ambiguous: {0}")]
    Ambiguity(String),

    /// A referenced object or required schema assignment does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A known gap in the engine.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The storage backend failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Context added while recursing into a composite.
    #[error(
        "integrating type '{type_uri}'{}: {source}",
        integration_context(.assoc_def_uri, .node_id)
    )]
    Integration {
        type_uri: String,
        assoc_def_uri: Option<String>,
        node_id: Option<NodeId>,
        source: Box<TesseraError>,
    },
}

fn integration_context(assoc_def_uri: &Option<String>, node_id: &Option<NodeId>) -> String {
    let mut out = String::new();
    if let Some(uri) = assoc_def_uri {
        out.push_str(&format!(", slot '{uri}'"));
    }
    if let Some(id) = node_id {
        out.push_str(&format!(", node {id}"));
    }
    out
}

impl TesseraError {
    /// The innermost error, skipping `Integration` context wrappers.
    #[must_use]
    pub fn root(&self) -> &TesseraError {
        let mut current = self;
        while let Self::Integration { source, .. } = current {
            current = source;
        }
        current
    }

    /// Wrap this error with integration context.
    #[must_use]
    pub fn in_context(
        self,
        type_uri: &str,
        assoc_def_uri: Option<&str>,
        node_id: Option<NodeId>,
    ) -> Self {
        Self::Integration {
            type_uri: type_uri.to_string(),
            assoc_def_uri: assoc_def_uri.map(str::to_string),
            node_id,
            source: Box::new(self),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(role1: &str, role2: &str) -> Edge {
        Edge::new(
            EdgeId(10),
            "composition",
            Role::new(role1, Player::Node(NodeId(1))),
            Role::new(role2, Player::Node(NodeId(2))),
        )
    }

    #[test]
    fn role_lookup_by_type() {
        let e = edge("parent", "child");
        assert_eq!(e.role("parent").expect("role").player, Player::Node(NodeId(1)));
        assert_eq!(e.role("child").expect("role").player, Player::Node(NodeId(2)));
    }

    #[test]
    fn role_lookup_fails_loudly_when_ambiguous() {
        let e = edge("member", "member");
        assert!(matches!(e.role("member"), Err(TesseraError::Ambiguity(_))));
    }

    #[test]
    fn missing_role_is_not_found() {
        let e = edge("parent", "child");
        assert!(matches!(e.role("instance"), Err(TesseraError::NotFound(_))));
        assert!(e.find_role("instance").expect("lookup").is_none());
    }

    #[test]
    fn other_role_of_player() {
        let e = edge("parent", "child");
        let other = e.other_role(Player::Node(NodeId(1))).expect("other");
        assert_eq!(other.role_type_uri, "child");
        assert!(e.other_role(Player::Node(NodeId(3))).is_none());
    }

    #[test]
    fn simple_value_emptiness_and_display() {
        assert!(SimpleValue::text("").is_empty());
        assert!(!SimpleValue::Number(0).is_empty());
        assert_eq!(SimpleValue::Number(42).to_string(), "42");
        assert_eq!(SimpleValue::Boolean(true).to_string(), "true");
        assert_eq!(SimpleValue::text("Ann").to_string(), "Ann");
    }

    #[test]
    fn index_keys_distinguish_kinds() {
        assert_ne!(
            SimpleValue::text("1").index_key(),
            SimpleValue::Number(1).index_key()
        );
    }

    #[test]
    fn simple_value_json_is_untagged() {
        let v: SimpleValue = serde_json::from_str("\"a@x.com\"").expect("text");
        assert_eq!(v, SimpleValue::text("a@x.com"));
        let v: SimpleValue = serde_json::from_str("7").expect("number");
        assert_eq!(v, SimpleValue::Number(7));
        let v: SimpleValue = serde_json::from_str("false").expect("bool");
        assert_eq!(v, SimpleValue::Boolean(false));
    }

    #[test]
    fn root_skips_integration_context() {
        let err = TesseraError::Ambiguity("two candidates".to_string())
            .in_context("address", Some("street"), None)
            .in_context("person", Some("address"), Some(NodeId(4)));
        assert!(matches!(err.root(), TesseraError::Ambiguity(_)));
        let msg = err.to_string();
        assert!(msg.contains("person"));
        assert!(msg.contains("slot 'address'"));
        assert!(msg.contains("node 4"));
    }
}
