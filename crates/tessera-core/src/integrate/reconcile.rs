//! Assignment reconciliation.
//!
//! Brings the stored parent/child edges of an identity-type node (or of a
//! composite edge) in line with the integrated children of an update model.
//! Only slots the model mentioned are touched. The parent's child cache is
//! written after the storage calls for a slot have returned.

use super::loader::{load_many, load_one};
use super::{ChildResult, IntegratedSlot, Integrator, Parent, SlotChild, SlotResult};
use crate::children::{ChildValue, RelatedNode};
use crate::model::EdgeModel;
use crate::primitives::{ROLE_CHILD, ROLE_PARENT};
use crate::schema::{AssocDef, TypeSchemaProvider};
use crate::storage::GraphStorage;
use crate::{Edge, EdgeDraft, Node, NodeId, Player, Role, TesseraError};

impl<S: GraphStorage, P: TypeSchemaProvider + ?Sized> Integrator<'_, S, P> {
    /// Reconcile every mentioned slot of `parent`.
    pub(super) fn reconcile(
        &mut self,
        parent: &mut Parent<'_>,
        slots: Vec<IntegratedSlot>,
        depth: usize,
    ) -> Result<(), TesseraError> {
        let mut changed = false;
        for slot in slots {
            let key = slot.def.uri();
            let result = match slot.result {
                SlotResult::One(child) => self.reconcile_one(parent, &slot.def, child, depth),
                SlotResult::Many(children) => {
                    self.reconcile_many(parent, &slot.def, children, depth)
                }
            };
            changed |= result
                .map_err(|e| e.in_context(parent.type_uri, Some(&key), parent.node_id()))?;
        }
        if changed {
            match parent.player {
                Player::Node(id) => self.directives.node_updated(id),
                Player::Edge(id) => self.directives.edge_updated(id),
            }
        }
        Ok(())
    }

    /// Returns whether an edge was created or deleted.
    fn reconcile_one(
        &mut self,
        parent: &mut Parent<'_>,
        def: &AssocDef,
        child: SlotChild,
        depth: usize,
    ) -> Result<bool, TesseraError> {
        let key = def.uri();
        let old = load_one(&*self.storage, parent.player, parent.children, def)?;

        let new = match child.result {
            ChildResult::Value(unified) => unified.node,
            ChildResult::Empty => {
                let Some(old) = old else {
                    return Ok(false);
                };
                self.unassign(&old)?;
                parent.children.put(key, ChildValue::One(None));
                return Ok(true);
            }
            ChildResult::Deleted(id) => {
                return match old {
                    Some(old) if old.node.id == id => {
                        self.unassign(&old)?;
                        parent.children.put(key, ChildValue::One(None));
                        Ok(true)
                    }
                    Some(old) => Err(TesseraError::Precondition(format!(
                        "cannot delete node {} from slot '{}', which holds node {}",
                        id, key, old.node.id
                    ))),
                    None => Err(TesseraError::Precondition(format!(
                        "cannot delete node {} from slot '{}', which is empty",
                        id, key
                    ))),
                };
            }
        };

        match old {
            Some(mut old) if old.node.id == new.id => {
                self.update_relating(parent, &mut old.edge, child.relating.as_ref(), depth)?;
                old.node = new;
                parent.children.put(key, ChildValue::One(Some(old)));
                Ok(false)
            }
            old => {
                if let Some(old) = old {
                    self.unassign(&old)?;
                }
                let related = self.assign(parent, def, new, child.relating.as_ref(), depth)?;
                parent.children.put(key, ChildValue::One(Some(related)));
                Ok(true)
            }
        }
    }

    /// Returns whether an edge was created or deleted.
    fn reconcile_many(
        &mut self,
        parent: &mut Parent<'_>,
        def: &AssocDef,
        children: Vec<SlotChild>,
        depth: usize,
    ) -> Result<bool, TesseraError> {
        let key = def.uri();
        let mut remaining: Vec<Option<RelatedNode>> =
            load_many(&*self.storage, parent.player, parent.children, def)?
                .into_iter()
                .map(Some)
                .collect();
        let mut kept: Vec<RelatedNode> = Vec::with_capacity(children.len());
        let mut changed = false;

        for child in children {
            match child.result {
                ChildResult::Empty => {}
                ChildResult::Deleted(id) => {
                    let Some(old) = take_child(&mut remaining, id) else {
                        return Err(TesseraError::Precondition(format!(
                            "cannot delete node {} from slot '{}', which does not hold it",
                            id, key
                        )));
                    };
                    self.unassign(&old)?;
                    changed = true;
                }
                ChildResult::Value(unified) => {
                    if kept.iter().any(|r| r.node.id == unified.node.id) {
                        continue;
                    }
                    if let Some(mut old) = take_child(&mut remaining, unified.node.id) {
                        self.update_relating(parent, &mut old.edge, child.relating.as_ref(), depth)?;
                        old.node = unified.node;
                        kept.push(old);
                        continue;
                    }
                    let replaced = unified
                        .original_id
                        .and_then(|id| take_child(&mut remaining, id));
                    if let Some(replaced) = replaced {
                        self.unassign(&replaced)?;
                    }
                    kept.push(self.assign(parent, def, unified.node, child.relating.as_ref(), depth)?);
                    changed = true;
                }
            }
        }

        for old in remaining.into_iter().flatten() {
            self.unassign(&old)?;
            changed = true;
        }
        parent.children.put(key, ChildValue::Many(kept));
        Ok(changed)
    }

    // =========================================================================
    // EDGES
    // =========================================================================

    /// Create the edge relating `child` to `parent` and apply the relating
    /// edge model to it.
    pub(super) fn assign(
        &mut self,
        parent: &Parent<'_>,
        def: &AssocDef,
        child: Node,
        relating: Option<&EdgeModel>,
        depth: usize,
    ) -> Result<RelatedNode, TesseraError> {
        let draft = EdgeDraft::new(
            def.instance_type_uri(),
            Role::new(ROLE_PARENT, parent.player),
            Role::new(ROLE_CHILD, Player::Node(child.id)),
        );
        let mut edge = self.storage.create_edge(draft)?;
        self.directives.edge_created(edge.id);
        tracing::debug!(
            parent = %parent.player,
            child = %child.id,
            edge = %edge.id,
            slot = %def.uri(),
            "assigned child"
        );
        self.update_relating(parent, &mut edge, relating, depth)?;
        Ok(RelatedNode::new(child, edge))
    }

    /// Delete the edge relating a child to its parent. The child stays.
    fn unassign(&mut self, old: &RelatedNode) -> Result<(), TesseraError> {
        for id in self.storage.delete_edge(old.edge.id)? {
            self.directives.edge_deleted(id);
        }
        tracing::debug!(child = %old.node.id, edge = %old.edge.id, "unassigned child");
        Ok(())
    }

    /// Apply a relating edge model. Edges relating children to an edge are
    /// not updated.
    fn update_relating(
        &mut self,
        parent: &Parent<'_>,
        edge: &mut Edge,
        relating: Option<&EdgeModel>,
        depth: usize,
    ) -> Result<(), TesseraError> {
        match relating {
            Some(model) if !parent.is_edge() => self.update_edge(edge, model, depth + 1),
            _ => Ok(()),
        }
    }
}

/// Take the element holding `id` out of the unmatched old children.
fn take_child(remaining: &mut [Option<RelatedNode>], id: NodeId) -> Option<RelatedNode> {
    remaining
        .iter_mut()
        .find(|slot| slot.as_ref().is_some_and(|r| r.node.id == id))
        .and_then(Option::take)
}
