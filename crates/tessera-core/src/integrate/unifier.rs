//! Candidate search.
//!
//! Finds the stored parent that already has a given set of children:
//! candidates are seeded from the parents of one child and then eliminated
//! slot by slot.
//!
//! - value types match on every supplied slot
//! - identity types match on their identity slots only
//!
//! Zero survivors means "create", one means "reuse", more is an `Ambiguity`.

use super::{ChildResult, IntegratedSlot, Integrator, Parent, SlotChild, SlotResult};
use crate::children::{ChildValue, RelatedNode};
use crate::primitives::{ROLE_CHILD, ROLE_PARENT};
use crate::schema::{AssocDef, Cardinality, TypeSchema, TypeSchemaProvider};
use crate::storage::GraphStorage;
use crate::{Node, NodeDraft, NodeId, Player, SimpleValue, TesseraError};
use std::collections::BTreeSet;

/// What a slot must hold for a candidate to survive.
enum Requirement {
    /// An edge of the slot's type to this child.
    One(NodeId),
    /// Exactly these children, compared as a set. An explicitly emptied
    /// single-valued slot is the empty set.
    Many(BTreeSet<NodeId>),
}

impl<S: GraphStorage, P: TypeSchemaProvider + ?Sized> Integrator<'_, S, P> {
    // =========================================================================
    // VALUE TYPES
    // =========================================================================

    /// Find or create the value-type node holding exactly the supplied
    /// children.
    ///
    /// Returns `None` when no slot supplied a child.
    pub(super) fn unify_by_children(
        &mut self,
        schema: &TypeSchema,
        slots: Vec<IntegratedSlot>,
        depth: usize,
    ) -> Result<Option<Node>, TesseraError> {
        let mut requirements = Vec::with_capacity(slots.len());
        for slot in &slots {
            requirements.push((slot.def.clone(), value_requirement(schema, slot)?));
        }

        let seed = requirements.iter().find_map(|(def, req)| match req {
            Requirement::One(id) => Some((def, *id)),
            Requirement::Many(ids) => ids.first().map(|id| (def, *id)),
        });
        let Some((seed_def, seed_child)) = seed else {
            tracing::debug!(type_uri = %schema.uri, "no children to unify");
            return Ok(None);
        };

        let mut candidates = self.parents_of(schema, seed_def, seed_child)?;
        for (def, requirement) in &requirements {
            candidates = self.eliminate(candidates, def, requirement)?;
        }

        match candidates.len() {
            0 => self.create_value_node(schema, slots, depth).map(Some),
            1 => {
                let node = candidates.pop();
                if let Some(node) = &node {
                    tracing::debug!(type_uri = %schema.uri, node = %node.id, "reused value");
                }
                Ok(node)
            }
            _ => Err(ambiguous(schema, &candidates)),
        }
    }

    fn create_value_node(
        &mut self,
        schema: &TypeSchema,
        slots: Vec<IntegratedSlot>,
        depth: usize,
    ) -> Result<Node, TesseraError> {
        let mut node = self.create_parent(schema, None)?;
        tracing::debug!(type_uri = %schema.uri, node = %node.id, "created value");
        let parent = Parent::node(&mut node);
        for slot in slots {
            let value = match slot.result {
                SlotResult::One(child) => {
                    ChildValue::One(self.assign_child(&parent, &slot.def, child, depth)?)
                }
                SlotResult::Many(children) => {
                    let mut related: Vec<RelatedNode> = Vec::with_capacity(children.len());
                    for child in children {
                        let duplicate = child
                            .result
                            .node()
                            .is_some_and(|n| related.iter().any(|r| r.node.id == n.id));
                        if !duplicate {
                            related.extend(self.assign_child(&parent, &slot.def, child, depth)?);
                        }
                    }
                    ChildValue::Many(related)
                }
            };
            parent.children.put(slot.def.uri(), value);
        }
        Ok(node)
    }

    fn assign_child(
        &mut self,
        parent: &Parent<'_>,
        def: &AssocDef,
        child: SlotChild,
        depth: usize,
    ) -> Result<Option<RelatedNode>, TesseraError> {
        match child.result {
            ChildResult::Value(unified) => self
                .assign(parent, def, unified.node, child.relating.as_ref(), depth)
                .map(Some),
            ChildResult::Empty | ChildResult::Deleted(_) => Ok(None),
        }
    }

    // =========================================================================
    // IDENTITY TYPES
    // =========================================================================

    /// Find the stored node with the same identity children.
    ///
    /// Returns `None` if the type has no identity attributes or the model did
    /// not supply all of them.
    pub(super) fn find_by_identity(
        &self,
        schema: &TypeSchema,
        slots: &[IntegratedSlot],
    ) -> Result<Option<Node>, TesseraError> {
        let mut keys: Vec<(&AssocDef, NodeId)> = Vec::with_capacity(schema.identity_attrs.len());
        for attr in &schema.identity_attrs {
            let def = schema.assoc_def(attr)?;
            if def.cardinality() == Cardinality::Many {
                return Err(TesseraError::Unsupported(format!(
                    "identity attribute '{}' of '{}' is multi-valued",
                    attr, schema.uri
                )));
            }
            let child = slots
                .iter()
                .find(|slot| slot.def.uri() == *attr)
                .and_then(|slot| match &slot.result {
                    SlotResult::One(child) => child.result.node(),
                    SlotResult::Many(_) => None,
                });
            match child {
                Some(node) => keys.push((def, node.id)),
                None => return Ok(None),
            }
        }
        let Some(&(first_def, first_child)) = keys.first() else {
            return Ok(None);
        };

        let mut candidates = self.parents_of(schema, first_def, first_child)?;
        for &(def, child) in &keys[1..] {
            candidates = self.eliminate(candidates, def, &Requirement::One(child))?;
        }

        match candidates.len() {
            0 => Ok(None),
            1 => Ok(candidates.pop()),
            _ => Err(ambiguous(schema, &candidates)),
        }
    }

    /// Create an instance of a composite type. All its slots start out
    /// loaded and empty.
    pub(super) fn create_parent(
        &mut self,
        schema: &TypeSchema,
        uri: Option<&str>,
    ) -> Result<Node, TesseraError> {
        let draft = NodeDraft::new(&schema.uri, SimpleValue::default())
            .with_uri(uri.unwrap_or_default());
        let mut node = self.storage.create_node(draft)?;
        self.directives.node_created(node.id);
        for def in &schema.assoc_defs {
            node.children
                .put(def.uri(), ChildValue::empty(def.cardinality()));
        }
        Ok(node)
    }

    // =========================================================================
    // CANDIDATES
    // =========================================================================

    /// Instances of `schema` holding `child` in the slot `def`.
    fn parents_of(
        &self,
        schema: &TypeSchema,
        def: &AssocDef,
        child: NodeId,
    ) -> Result<Vec<Node>, TesseraError> {
        let mut seen = BTreeSet::new();
        Ok(self
            .storage
            .fetch_related_nodes(
                Player::Node(child),
                def.instance_type_uri(),
                ROLE_CHILD,
                ROLE_PARENT,
                Some(&schema.uri),
            )?
            .into_iter()
            .map(|related| related.node)
            .filter(|node| seen.insert(node.id))
            .collect())
    }

    fn eliminate(
        &self,
        candidates: Vec<Node>,
        def: &AssocDef,
        requirement: &Requirement,
    ) -> Result<Vec<Node>, TesseraError> {
        let mut survivors = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if self.satisfies(&candidate, def, requirement)? {
                survivors.push(candidate);
            }
        }
        Ok(survivors)
    }

    fn satisfies(
        &self,
        candidate: &Node,
        def: &AssocDef,
        requirement: &Requirement,
    ) -> Result<bool, TesseraError> {
        match requirement {
            Requirement::One(child) => Ok(self
                .storage
                .fetch_related_edge(
                    def.instance_type_uri(),
                    (Player::Node(candidate.id), ROLE_PARENT),
                    (Player::Node(*child), ROLE_CHILD),
                )?
                .is_some()),
            Requirement::Many(children) => {
                let stored: BTreeSet<NodeId> = self
                    .storage
                    .fetch_related_nodes(
                        Player::Node(candidate.id),
                        def.instance_type_uri(),
                        ROLE_PARENT,
                        ROLE_CHILD,
                        Some(&def.child_type_uri),
                    )?
                    .into_iter()
                    .map(|related| related.node.id)
                    .collect();
                Ok(&stored == children)
            }
        }
    }
}

/// The requirement a supplied slot of a value type imposes on candidates.
fn value_requirement(
    schema: &TypeSchema,
    slot: &IntegratedSlot,
) -> Result<Requirement, TesseraError> {
    let deletion = |id: NodeId| {
        TesseraError::Precondition(format!(
            "value type '{}' cannot delete child {} from slot '{}'; supply the new value instead",
            schema.uri,
            id,
            slot.def.uri()
        ))
    };
    match &slot.result {
        SlotResult::One(child) => match &child.result {
            ChildResult::Value(unified) => Ok(Requirement::One(unified.node.id)),
            ChildResult::Empty => Ok(Requirement::Many(BTreeSet::new())),
            ChildResult::Deleted(id) => Err(deletion(*id)),
        },
        SlotResult::Many(children) => {
            let mut ids = BTreeSet::new();
            for child in children {
                match &child.result {
                    ChildResult::Value(unified) => {
                        ids.insert(unified.node.id);
                    }
                    ChildResult::Empty => {}
                    ChildResult::Deleted(id) => return Err(deletion(*id)),
                }
            }
            Ok(Requirement::Many(ids))
        }
    }
}

fn ambiguous(schema: &TypeSchema, candidates: &[Node]) -> TesseraError {
    let ids: Vec<String> = candidates.iter().map(|n| n.id.to_string()).collect();
    TesseraError::Ambiguity(format!(
        "{} stored '{}' nodes match the supplied children: [{}]",
        candidates.len(),
        schema.uri,
        ids.join(", ")
    ))
}
