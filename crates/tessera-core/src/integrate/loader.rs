//! Lazy loading of child slots.
//!
//! A slot is read from storage at most once per in-memory object. After
//! that, [`ChildTopics`] answers from its cache and the reconciler keeps the
//! cache in step with every edge it writes.

use crate::children::{ChildTopics, ChildValue, RelatedNode};
use crate::primitives::{ROLE_CHILD, ROLE_PARENT};
use crate::schema::{AssocDef, Cardinality, TypeSchemaProvider};
use crate::storage::{GraphStorage, at_most_one};
use crate::{Loaded, Node, Player, TesseraError};

/// Load one slot of `player` into `children` unless it is cached already.
///
/// # Errors
///
/// `Ambiguity` if a single-valued slot holds more than one child in storage.
pub fn ensure_loaded<'c, S: GraphStorage + ?Sized>(
    storage: &S,
    player: Player,
    children: &'c mut ChildTopics,
    def: &AssocDef,
) -> Result<&'c mut ChildValue, TesseraError> {
    let key = def.uri();
    if !children.is_loaded(&key) {
        let related = storage.fetch_related_nodes(
            player,
            def.instance_type_uri(),
            ROLE_PARENT,
            ROLE_CHILD,
            Some(&def.child_type_uri),
        )?;
        let value = match def.cardinality() {
            Cardinality::One => ChildValue::One(at_most_one(related, || {
                format!("{} holds more than one child in slot '{}'", player, key)
            })?),
            Cardinality::Many => ChildValue::Many(related),
        };
        tracing::trace!(%player, slot = %key, "loaded slot");
        children.put(key.clone(), value);
    }
    match children.get_mut(&key) {
        Loaded::Loaded(value) => Ok(value),
        Loaded::NotLoaded => Err(TesseraError::NotFound(format!(
            "slot '{}' of {} could not be loaded",
            key, player
        ))),
    }
}

/// The current child of a single-valued slot.
pub(crate) fn load_one<S: GraphStorage + ?Sized>(
    storage: &S,
    player: Player,
    children: &mut ChildTopics,
    def: &AssocDef,
) -> Result<Option<RelatedNode>, TesseraError> {
    ensure_loaded(storage, player, children, def)?;
    Ok(children.one(&def.uri())?.cloned())
}

/// The current children of a multi-valued slot.
pub(crate) fn load_many<S: GraphStorage + ?Sized>(
    storage: &S,
    player: Player,
    children: &mut ChildTopics,
    def: &AssocDef,
) -> Result<Vec<RelatedNode>, TesseraError> {
    ensure_loaded(storage, player, children, def)?;
    Ok(children.many(&def.uri())?.to_vec())
}

/// Load every declared slot of an object, `depth` levels deep.
///
/// Composite relating edges are loaded as well. Objects whose type is not
/// registered have no declared slots and are left as they are.
pub fn load_tree<S: GraphStorage + ?Sized, P: TypeSchemaProvider + ?Sized>(
    storage: &S,
    types: &P,
    player: Player,
    type_uri: &str,
    children: &mut ChildTopics,
    depth: usize,
) -> Result<(), TesseraError> {
    if depth == 0 {
        return Ok(());
    }
    let Some(schema) = types.find_type(type_uri) else {
        return Ok(());
    };
    for def in &schema.assoc_defs {
        let slot = ensure_loaded(storage, player, children, def)?;
        for related in slot.iter_mut() {
            let node = &mut related.node;
            load_tree(
                storage,
                types,
                Player::Node(node.id),
                &node.type_uri,
                &mut node.children,
                depth - 1,
            )?;
            let edge = &mut related.edge;
            load_tree(
                storage,
                types,
                Player::Edge(edge.id),
                &edge.type_uri,
                &mut edge.children,
                depth - 1,
            )?;
        }
    }
    Ok(())
}

/// Load the slots of a node, `depth` levels deep.
pub fn load_node<S: GraphStorage + ?Sized, P: TypeSchemaProvider + ?Sized>(
    storage: &S,
    types: &P,
    node: &mut Node,
    depth: usize,
) -> Result<(), TesseraError> {
    load_tree(
        storage,
        types,
        Player::Node(node.id),
        &node.type_uri,
        &mut node.children,
        depth,
    )
}
