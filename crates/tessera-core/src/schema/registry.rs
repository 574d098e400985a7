//! # Schema Registry
//!
//! The in-memory type cache consulted by the integration engine.
//!
//! Reads are concurrent, registration and removal are exclusive. Types are
//! handed out as `Arc<TypeSchema>` snapshots, so a reader holding a schema
//! never observes a later registration half-applied.

use super::{Cardinality, DataKind, TypeSchema, TypeSchemaProvider};
use crate::primitives::{AGGREGATION, COMPOSITION};
use crate::TesseraError;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Registered type definitions, keyed by type URI.
#[derive(Debug)]
pub struct SchemaRegistry {
    types: RwLock<BTreeMap<String, Arc<TypeSchema>>>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    /// Create a registry holding only the built-in edge types.
    #[must_use]
    pub fn new() -> Self {
        let mut types = BTreeMap::new();
        for uri in [COMPOSITION, AGGREGATION] {
            types.insert(
                uri.to_string(),
                Arc::new(TypeSchema::new(uri, DataKind::Text)),
            );
        }
        Self {
            types: RwLock::new(types),
        }
    }

    /// Validate and register a type, replacing any previous definition.
    ///
    /// # Errors
    ///
    /// - `NotFound` if a child type or custom edge type is not registered
    /// - `Precondition` if the type would contain itself, if a simple type
    ///   declares slots, or if identity or label slots are not declared
    /// - `Unsupported` if an identity attribute is a MANY slot
    pub fn register(&self, schema: TypeSchema) -> Result<Arc<TypeSchema>, TesseraError> {
        let mut types = self.types.write();
        validate(&types, &schema)?;
        let schema = Arc::new(schema);
        types.insert(schema.uri.clone(), Arc::clone(&schema));
        tracing::debug!(type_uri = %schema.uri, "registered type");
        Ok(schema)
    }

    /// Run the checks of [`SchemaRegistry::register`] without registering.
    pub fn check(&self, schema: &TypeSchema) -> Result<(), TesseraError> {
        validate(&self.types.read(), schema)
    }

    /// Unregister a type.
    pub fn remove(&self, uri: &str) -> Option<Arc<TypeSchema>> {
        self.types.write().remove(uri)
    }

    #[must_use]
    pub fn contains(&self, uri: &str) -> bool {
        self.types.read().contains_key(uri)
    }

    /// URIs of all registered types, in order.
    #[must_use]
    pub fn uris(&self) -> Vec<String> {
        self.types.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }
}

impl TypeSchemaProvider for SchemaRegistry {
    fn find_type(&self, uri: &str) -> Option<Arc<TypeSchema>> {
        self.types.read().get(uri).cloned()
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

fn validate(
    types: &BTreeMap<String, Arc<TypeSchema>>,
    schema: &TypeSchema,
) -> Result<(), TesseraError> {
    if !schema.is_composite() && !schema.assoc_defs.is_empty() {
        return Err(TesseraError::Precondition(format!(
            "simple type '{}' cannot declare association definitions",
            schema.uri
        )));
    }
    if schema.is_value_type() && !schema.identity_attrs.is_empty() {
        return Err(TesseraError::Precondition(format!(
            "value type '{}' cannot declare identity attributes",
            schema.uri
        )));
    }

    for def in schema.assoc_defs.iter() {
        if def.parent_type_uri != schema.uri {
            return Err(TesseraError::Precondition(format!(
                "association definition '{}' belongs to '{}', not '{}'",
                def.uri(),
                def.parent_type_uri,
                schema.uri
            )));
        }
        for dependency in dependencies_of_def(def) {
            if dependency != schema.uri && !types.contains_key(dependency) {
                return Err(TesseraError::NotFound(format!(
                    "type '{}' used by '{}' is not registered",
                    dependency, schema.uri
                )));
            }
        }
    }

    check_acyclic(types, schema)?;

    for attr in &schema.identity_attrs {
        let def = schema.assoc_defs.get(attr).ok_or_else(|| {
            TesseraError::Precondition(format!(
                "identity attribute '{}' is not a slot of '{}'",
                attr, schema.uri
            ))
        })?;
        if def.cardinality() == Cardinality::Many {
            return Err(TesseraError::Unsupported(format!(
                "multi-valued identity attribute '{}' of '{}'",
                attr, schema.uri
            )));
        }
    }

    for slot in &schema.label_config {
        if !schema.assoc_defs.contains(slot) {
            return Err(TesseraError::Precondition(format!(
                "label slot '{}' is not a slot of '{}'",
                slot, schema.uri
            )));
        }
    }
    Ok(())
}

fn dependencies_of_def(def: &super::AssocDef) -> impl Iterator<Item = &str> {
    std::iter::once(def.child_type_uri.as_str()).chain(def.custom_assoc_type_uri.as_deref())
}

/// Walk the types reachable from `schema` and fail if `schema` is among them.
fn check_acyclic(
    types: &BTreeMap<String, Arc<TypeSchema>>,
    schema: &TypeSchema,
) -> Result<(), TesseraError> {
    let mut visited = BTreeSet::new();
    let mut stack: Vec<&str> = schema
        .assoc_defs
        .iter()
        .flat_map(dependencies_of_def)
        .collect();

    while let Some(uri) = stack.pop() {
        if uri == schema.uri {
            return Err(TesseraError::Precondition(format!(
                "type '{}' contains itself",
                schema.uri
            )));
        }
        if !visited.insert(uri) {
            continue;
        }
        if let Some(child) = types.get(uri) {
            stack.extend(child.assoc_defs.iter().flat_map(dependencies_of_def));
        }
    }
    Ok(())
}
