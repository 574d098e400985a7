//! Reference resolution.

use super::loader::load_node;
use crate::model::TopicRef;
use crate::primitives::is_schema_node_type;
use crate::schema::TypeSchemaProvider;
use crate::storage::GraphStorage;
use crate::{Node, TesseraError};

/// Resolve a reference to the node it names, with its own slots loaded one
/// level deep.
///
/// # Errors
///
/// - `NotFound` if no node has the id or URI
/// - `Precondition` for an empty reference, which names nothing, and for a
///   reference to a type or cardinality node
pub fn resolve<S: GraphStorage + ?Sized, P: TypeSchemaProvider + ?Sized>(
    storage: &S,
    types: &P,
    reference: &TopicRef,
) -> Result<Node, TesseraError> {
    let mut node = match reference {
        TopicRef::Id(id) => storage.fetch_node(*id)?.ok_or_else(|| {
            TesseraError::NotFound(format!("referenced node {} does not exist", id))
        })?,
        TopicRef::Uri(uri) => storage.fetch_node_by_uri(uri)?.ok_or_else(|| {
            TesseraError::NotFound(format!("no node has the referenced URI '{}'", uri))
        })?,
        TopicRef::Empty => {
            return Err(TesseraError::Precondition(
                "an empty reference names no node".to_string(),
            ));
        }
    };
    if is_schema_node_type(&node.type_uri) {
        return Err(TesseraError::Precondition(format!(
            "node {} is a '{}' schema node, not an instance",
            node.id, node.type_uri
        )));
    }
    load_node(storage, types, &mut node, 1)?;
    Ok(node)
}
