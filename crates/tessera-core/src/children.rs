//! # Child Topics
//!
//! The in-memory child cache of a persisted node or edge.
//!
//! A slot is keyed by its association-definition URI and is either absent
//! (not loaded yet) or holds a [`ChildValue`]. Reading never touches storage:
//! [`ChildTopics::get`] reports [`Loaded::NotLoaded`] and the loader's
//! `ensure_loaded` is the only place that fills a slot from the graph.

use crate::schema::Cardinality;
use crate::{Edge, Node, NodeId, TesseraError};
use serde::Serialize;
use std::collections::BTreeMap;

/// A child node together with the edge that relates it to its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedNode {
    pub node: Node,
    /// The relating edge; may carry a value or children of its own.
    pub edge: Edge,
}

impl RelatedNode {
    #[must_use]
    pub fn new(node: Node, edge: Edge) -> Self {
        Self { node, edge }
    }
}

/// The loaded content of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChildValue {
    One(Option<RelatedNode>),
    Many(Vec<RelatedNode>),
}

impl ChildValue {
    /// The empty value for a slot of the given cardinality.
    #[must_use]
    pub fn empty(cardinality: Cardinality) -> Self {
        match cardinality {
            Cardinality::One => Self::One(None),
            Cardinality::Many => Self::Many(Vec::new()),
        }
    }

    #[must_use]
    pub fn cardinality(&self) -> Cardinality {
        match self {
            Self::One(_) => Cardinality::One,
            Self::Many(_) => Cardinality::Many,
        }
    }

    /// True if the slot holds no child at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(child) => child.is_none(),
            Self::Many(children) => children.is_empty(),
        }
    }

    /// Every child of the slot, regardless of cardinality.
    pub fn iter(&self) -> impl Iterator<Item = &RelatedNode> {
        let (one, many): (Option<&RelatedNode>, &[RelatedNode]) = match self {
            Self::One(child) => (child.as_ref(), &[]),
            Self::Many(children) => (None, children.as_slice()),
        };
        one.into_iter().chain(many.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RelatedNode> {
        let (one, many): (Option<&mut RelatedNode>, &mut [RelatedNode]) = match self {
            Self::One(child) => (child.as_mut(), &mut []),
            Self::Many(children) => (None, children.as_mut_slice()),
        };
        one.into_iter().chain(many.iter_mut())
    }

    /// Ids of all children of the slot.
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.iter().map(|r| r.node.id).collect()
    }
}

/// Whether a slot has been loaded into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loaded<T> {
    NotLoaded,
    Loaded(T),
}

/// Cached children of one node or edge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChildTopics {
    slots: BTreeMap<String, ChildValue>,
}

impl ChildTopics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a slot without loading it.
    #[must_use]
    pub fn get(&self, assoc_def_uri: &str) -> Loaded<&ChildValue> {
        match self.slots.get(assoc_def_uri) {
            Some(value) => Loaded::Loaded(value),
            None => Loaded::NotLoaded,
        }
    }

    pub fn get_mut(&mut self, assoc_def_uri: &str) -> Loaded<&mut ChildValue> {
        match self.slots.get_mut(assoc_def_uri) {
            Some(value) => Loaded::Loaded(value),
            None => Loaded::NotLoaded,
        }
    }

    #[must_use]
    pub fn is_loaded(&self, assoc_def_uri: &str) -> bool {
        self.slots.contains_key(assoc_def_uri)
    }

    /// Replace the cached content of a slot.
    pub fn put(&mut self, assoc_def_uri: impl Into<String>, value: ChildValue) {
        self.slots.insert(assoc_def_uri.into(), value);
    }

    /// The single child of a ONE slot.
    ///
    /// Reading a MANY slot through this accessor, or a slot that was never
    /// loaded, is a programming error.
    pub fn one(&self, assoc_def_uri: &str) -> Result<Option<&RelatedNode>, TesseraError> {
        match self.slots.get(assoc_def_uri) {
            Some(ChildValue::One(child)) => Ok(child.as_ref()),
            Some(ChildValue::Many(_)) => Err(TesseraError::Precondition(format!(
                "slot '{}' is multi-valued but was accessed as single-valued",
                assoc_def_uri
            ))),
            None => Err(not_loaded(assoc_def_uri)),
        }
    }

    /// The children of a MANY slot.
    pub fn many(&self, assoc_def_uri: &str) -> Result<&[RelatedNode], TesseraError> {
        match self.slots.get(assoc_def_uri) {
            Some(ChildValue::Many(children)) => Ok(children),
            Some(ChildValue::One(_)) => Err(TesseraError::Precondition(format!(
                "slot '{}' is single-valued but was accessed as multi-valued",
                assoc_def_uri
            ))),
            None => Err(not_loaded(assoc_def_uri)),
        }
    }

    /// Iterate over loaded slots in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChildValue)> {
        self.slots.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn not_loaded(assoc_def_uri: &str) -> TesseraError {
    TesseraError::Precondition(format!("slot '{}' is not loaded", assoc_def_uri))
}

// =============================================================================
// TESTS
// =============================================================================
