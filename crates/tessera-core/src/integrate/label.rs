//! Label calculation.
//!
//! The label of a simple object is its value. The label of a composite is
//! the labels of its label slots joined by [`LABEL_SLOT_SEPARATOR`]; the
//! elements of a multi-valued slot are joined by [`LABEL_ELEMENT_SEPARATOR`].
//! Slots without a value are skipped.

use super::loader::ensure_loaded;
use super::{Integrator, Parent};
use crate::children::ChildTopics;
use crate::primitives::{LABEL_ELEMENT_SEPARATOR, LABEL_SLOT_SEPARATOR, MAX_COMPOSITE_DEPTH};
use crate::schema::TypeSchemaProvider;
use crate::storage::GraphStorage;
use crate::{Entity, Node, Player, SimpleValue, TesseraError};

/// Calculate the label of a node or edge, loading children as needed.
///
/// Nothing is written to storage.
pub fn calculate_label<S: GraphStorage + ?Sized, P: TypeSchemaProvider + ?Sized>(
    storage: &S,
    types: &P,
    entity: &mut Entity,
) -> Result<String, TesseraError> {
    let parent = Parent::entity(entity);
    label_of(
        storage,
        types,
        parent.player,
        parent.type_uri,
        parent.value,
        parent.children,
        0,
    )
}

pub(super) fn label_of<S: GraphStorage + ?Sized, P: TypeSchemaProvider + ?Sized>(
    storage: &S,
    types: &P,
    player: Player,
    type_uri: &str,
    value: &SimpleValue,
    children: &mut ChildTopics,
    depth: usize,
) -> Result<String, TesseraError> {
    let schema = types.get_type(type_uri)?;
    if !schema.is_composite() {
        return Ok(value.to_string());
    }
    if depth >= MAX_COMPOSITE_DEPTH {
        return Err(TesseraError::Precondition(format!(
            "label of '{}' nests deeper than {} levels",
            type_uri, MAX_COMPOSITE_DEPTH
        )));
    }

    let mut parts = Vec::new();
    for slot in schema.label_slots() {
        let def = schema.assoc_def(&slot)?;
        let value = ensure_loaded(storage, player, children, def)?;
        let mut labels = Vec::new();
        for related in value.iter_mut() {
            let label = node_label(storage, types, &mut related.node, depth + 1)?;
            if !label.is_empty() {
                labels.push(label);
            }
        }
        if !labels.is_empty() {
            parts.push(labels.join(LABEL_ELEMENT_SEPARATOR));
        }
    }
    Ok(parts.join(LABEL_SLOT_SEPARATOR))
}

fn node_label<S: GraphStorage + ?Sized, P: TypeSchemaProvider + ?Sized>(
    storage: &S,
    types: &P,
    node: &mut Node,
    depth: usize,
) -> Result<String, TesseraError> {
    label_of(
        storage,
        types,
        Player::Node(node.id),
        &node.type_uri,
        &node.value,
        &mut node.children,
        depth,
    )
}

impl<S: GraphStorage, P: TypeSchemaProvider + ?Sized> Integrator<'_, S, P> {
    /// Recalculate the label of a composite and persist it if it changed.
    pub(super) fn update_label(
        &mut self,
        parent: &mut Parent<'_>,
        depth: usize,
    ) -> Result<(), TesseraError> {
        let label = label_of(
            &*self.storage,
            self.types,
            parent.player,
            parent.type_uri,
            parent.value,
            parent.children,
            depth,
        )?;
        let label = SimpleValue::Text(label);
        if *parent.value == label {
            return Ok(());
        }
        match parent.player {
            Player::Node(id) => {
                self.storage.set_node_value(id, label.clone())?;
                self.directives.node_updated(id);
            }
            Player::Edge(id) => {
                self.storage.set_edge_value(id, label.clone())?;
                self.directives.edge_updated(id);
            }
        }
        tracing::debug!(player = %parent.player, %label, "label updated");
        *parent.value = label;
        Ok(())
    }

    /// Recalculate and persist the label of a stored node or edge.
    ///
    /// Simple objects keep their value.
    pub fn refresh_label(&mut self, entity: &mut Entity) -> Result<String, TesseraError> {
        let mut parent = Parent::entity(entity);
        if self.types.get_type(parent.type_uri)?.is_composite() {
            self.update_label(&mut parent, 0)?;
        }
        Ok(parent.value.to_string())
    }
}
