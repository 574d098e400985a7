//! Composite deletion.
//!
//! Deleting a node deletes the children it owns through composition slots,
//! recursively. A composed child that another parent still holds is only
//! detached: simple values and value-type nodes are shared by every parent
//! that unified to them. Aggregated children are always only detached.
//!
//! The edges of a deleted node go with it, so the children composed onto a
//! composite relating edge are deleted the same way.

use super::Integrator;
use super::loader::ensure_loaded;
use crate::primitives::{MAX_COMPOSITE_DEPTH, ROLE_CHILD};
use crate::schema::{AssocDefKind, TypeSchemaProvider};
use crate::storage::GraphStorage;
use crate::{ChildTopics, NodeId, Player, TesseraError};

impl<S: GraphStorage, P: TypeSchemaProvider + ?Sized> Integrator<'_, S, P> {
    /// Delete a node, the edges it takes part in and the children it owns.
    ///
    /// # Errors
    ///
    /// `NotFound` if the node does not exist.
    pub fn delete_node(&mut self, id: NodeId) -> Result<(), TesseraError> {
        if self.storage.fetch_node(id)?.is_none() {
            return Err(TesseraError::NotFound(format!(
                "node {} to delete does not exist",
                id
            )));
        }
        self.delete_at(id, 0)
    }

    fn delete_at(&mut self, id: NodeId, depth: usize) -> Result<(), TesseraError> {
        if depth >= MAX_COMPOSITE_DEPTH {
            return Err(TesseraError::Precondition(format!(
                "node {} owns children deeper than {} levels",
                id, MAX_COMPOSITE_DEPTH
            )));
        }
        // Already removed by a sibling's cascade.
        let Some(mut node) = self.storage.fetch_node(id)? else {
            return Ok(());
        };

        let mut owned =
            self.composed_children(Player::Node(id), &node.type_uri, &mut node.children)?;
        for mut edge in self.storage.fetch_edges(Player::Node(id))? {
            owned.extend(self.composed_children(
                Player::Edge(edge.id),
                &edge.type_uri,
                &mut edge.children,
            )?);
        }
        for (child, parent) in owned {
            if child != id && !self.held_elsewhere(child, parent)? {
                self.delete_at(child, depth + 1)?;
            }
        }

        for edge in self.storage.delete_node(id)? {
            self.directives.edge_deleted(edge);
        }
        self.directives.node_deleted(id);
        tracing::debug!(node = %id, type_uri = %node.type_uri, "deleted node");
        Ok(())
    }

    /// The children `parent` holds through its composition slots, each paired
    /// with `parent`. Types without a schema hold none.
    fn composed_children(
        &self,
        parent: Player,
        type_uri: &str,
        children: &mut ChildTopics,
    ) -> Result<Vec<(NodeId, Player)>, TesseraError> {
        let mut owned = Vec::new();
        let Some(schema) = self.types.find_type(type_uri) else {
            return Ok(owned);
        };
        for def in &schema.assoc_defs {
            if def.kind != AssocDefKind::Composition {
                continue;
            }
            let slot = ensure_loaded(&*self.storage, parent, children, def)?;
            owned.extend(slot.node_ids().into_iter().map(|child| (child, parent)));
        }
        Ok(owned)
    }

    /// Whether `child` is a child of any parent other than `parent`.
    fn held_elsewhere(&self, child: NodeId, parent: Player) -> Result<bool, TesseraError> {
        let player = Player::Node(child);
        for edge in self.storage.fetch_edges(player)? {
            let plays_child = edge
                .find_role(ROLE_CHILD)?
                .is_some_and(|role| role.player == player);
            let other = edge.other_role(player).map(|role| role.player);
            if plays_child && other != Some(parent) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
