//! # Directives
//!
//! Typed notifications describing what an integration or deletion changed.
//!
//! A `Directives` accumulator is passed explicitly by `&mut` through the call
//! chain. Duplicate `(kind, subject)` pairs are collapsed, and a node created
//! in the same call is never also reported as updated.

use crate::{EdgeId, NodeId};
use serde::Serialize;
use std::collections::BTreeSet;

/// What happened to the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    NodeCreated,
    NodeUpdated,
    NodeDeleted,
    EdgeCreated,
    EdgeUpdated,
    EdgeDeleted,
}

/// The object a directive is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Node(NodeId),
    Edge(EdgeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub subject: Subject,
}

/// Ordered, de-duplicated list of directives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Directives {
    list: Vec<Directive>,
    #[serde(skip)]
    seen: BTreeSet<(DirectiveKind, Subject)>,
}

impl Directives {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: DirectiveKind, subject: Subject) {
        if kind == DirectiveKind::NodeUpdated
            && self.seen.contains(&(DirectiveKind::NodeCreated, subject))
        {
            return;
        }
        if kind == DirectiveKind::EdgeUpdated
            && self.seen.contains(&(DirectiveKind::EdgeCreated, subject))
        {
            return;
        }
        if self.seen.insert((kind, subject)) {
            self.list.push(Directive { kind, subject });
        }
    }

    pub fn node_created(&mut self, id: NodeId) {
        self.push(DirectiveKind::NodeCreated, Subject::Node(id));
    }

    pub fn node_updated(&mut self, id: NodeId) {
        self.push(DirectiveKind::NodeUpdated, Subject::Node(id));
    }

    pub fn node_deleted(&mut self, id: NodeId) {
        self.push(DirectiveKind::NodeDeleted, Subject::Node(id));
    }

    pub fn edge_created(&mut self, id: EdgeId) {
        self.push(DirectiveKind::EdgeCreated, Subject::Edge(id));
    }

    pub fn edge_updated(&mut self, id: EdgeId) {
        self.push(DirectiveKind::EdgeUpdated, Subject::Edge(id));
    }

    pub fn edge_deleted(&mut self, id: EdgeId) {
        self.push(DirectiveKind::EdgeDeleted, Subject::Edge(id));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Directive> {
        self.list.iter()
    }

    /// Directives of one kind, in order.
    pub fn of_kind(&self, kind: DirectiveKind) -> impl Iterator<Item = &Subject> {
        self.list
            .iter()
            .filter(move |d| d.kind == kind)
            .map(|d| &d.subject)
    }

    #[must_use]
    pub fn contains(&self, kind: DirectiveKind, subject: Subject) -> bool {
        self.seen.contains(&(kind, subject))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_collapsed() {
        let mut directives = Directives::new();
        directives.edge_deleted(EdgeId(3));
        directives.edge_deleted(EdgeId(3));
        directives.node_updated(NodeId(1));
        directives.node_updated(NodeId(1));
        assert_eq!(directives.len(), 2);
    }

    #[test]
    fn update_after_create_is_suppressed() {
        let mut directives = Directives::new();
        directives.node_created(NodeId(1));
        directives.node_updated(NodeId(1));
        directives.node_updated(NodeId(2));
        let kinds: Vec<DirectiveKind> = directives.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DirectiveKind::NodeCreated, DirectiveKind::NodeUpdated]
        );
        assert!(directives.contains(DirectiveKind::NodeUpdated, Subject::Node(NodeId(2))));
    }

    #[test]
    fn serializes_as_a_list() {
        let mut directives = Directives::new();
        directives.edge_created(EdgeId(4));
        let json = serde_json::to_string(&directives).expect("json");
        assert_eq!(json, r#"[{"kind":"edge_created","subject":{"edge":4}}]"#);
    }
}
