//! # Session Module
//!
//! A session pairs a storage backend with the schema registry and runs every
//! mutating call in one storage transaction.
//!
//! ## Transactions
//!
//! `integrate`, `install_type`, `label` and `delete_node` call `begin`
//! first, `commit` on success and `rollback` on any error, so a failed call
//! leaves no partial change behind. The engine itself never opens a
//! transaction.
//!
//! ## Storage Backends
//!
//! - `Session::in_memory()`: `MemoryStorage` (fast, volatile)
//! - `Session::with_redb(path)`: `RedbStorage` (ACID, persistent); installed
//!   types are loaded into the registry on open

use crate::directives::Directives;
use crate::integrate::{Integrator, UnifiedValue, load_node, resolve};
use crate::model::{TopicRef, UpdateModel};
use crate::schema::{SchemaRegistry, TypeSchema, install_type, load_installed_types};
use crate::storage::{GraphStorage, MemoryStorage, RedbStorage};
use crate::{Entity, Node, NodeId, Player, TesseraError};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Result of a successful integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub value: UnifiedValue,
    pub directives: Directives,
}

/// Storage plus schemas; one writer at a time.
#[derive(Debug)]
pub struct Session<S: GraphStorage> {
    storage: S,
    schemas: SchemaRegistry,
}

impl Session<MemoryStorage> {
    /// Create a session over an empty in-memory graph.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }
}

impl Session<RedbStorage> {
    /// Open or create a redb database and load the types installed in it.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, TesseraError> {
        let mut session = Self::new(RedbStorage::open(path)?);
        session.load_installed_types()?;
        Ok(session)
    }
}

impl<S: GraphStorage> Session<S> {
    /// Create a session over existing storage. Installed types are not
    /// loaded; call [`Session::load_installed_types`] for that.
    #[must_use]
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            schemas: SchemaRegistry::new(),
        }
    }

    #[must_use]
    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Give up the session and return its storage.
    pub fn into_storage(self) -> S {
        self.storage
    }

    // =========================================================================
    // SCHEMA
    // =========================================================================

    /// Validate a type, store it in the graph and register it.
    pub fn install_type(&mut self, schema: TypeSchema) -> Result<Arc<TypeSchema>, TesseraError> {
        self.schemas.check(&schema)?;
        self.transaction("install_type", |storage, _| install_type(storage, &schema))?;
        self.schemas.register(schema)
    }

    /// Register every type stored in the graph. Returns how many were
    /// loaded.
    pub fn load_installed_types(&mut self) -> Result<usize, TesseraError> {
        let schemas = load_installed_types(&self.storage)?;
        let count = schemas.len();
        for schema in schemas {
            self.schemas.register(schema)?;
        }
        tracing::debug!(count, "loaded installed types");
        Ok(count)
    }

    // =========================================================================
    // INTEGRATION
    // =========================================================================

    /// Integrate an update model in one transaction.
    ///
    /// On success a value model's `id` holds the unified node's id and a
    /// reference names its node by id.
    pub fn integrate(
        &mut self,
        model: &mut UpdateModel,
        reference: Option<NodeId>,
    ) -> Result<Outcome, TesseraError> {
        let mut directives = Directives::new();
        let value = self.transaction("integrate", |storage, schemas| {
            Integrator::new(storage, schemas, &mut directives).integrate(model, reference)
        })?;
        tracing::info!(
            node = ?value.node.as_ref().map(|n| n.id),
            changes = directives.len(),
            "integrated"
        );
        Ok(Outcome { value, directives })
    }

    /// Delete a node and the children it owns through composition.
    pub fn delete_node(&mut self, id: NodeId) -> Result<Directives, TesseraError> {
        let mut directives = Directives::new();
        self.transaction("delete_node", |storage, schemas| {
            Integrator::new(storage, schemas, &mut directives).delete_node(id)
        })?;
        tracing::info!(node = %id, changes = directives.len(), "deleted");
        Ok(directives)
    }

    /// Recalculate and persist the label of a node or edge.
    pub fn label(&mut self, player: Player) -> Result<String, TesseraError> {
        let mut entity = self.fetch_entity(player)?;
        let mut directives = Directives::new();
        self.transaction("label", |storage, schemas| {
            Integrator::new(storage, schemas, &mut directives).refresh_label(&mut entity)
        })
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// A node with its slots loaded one level deep.
    pub fn fetch(&self, id: NodeId) -> Result<Node, TesseraError> {
        resolve(&self.storage, &self.schemas, &TopicRef::Id(id))
    }

    /// A node with its slots loaded `depth` levels deep.
    pub fn fetch_tree(&self, id: NodeId, depth: usize) -> Result<Node, TesseraError> {
        let mut node = self
            .storage
            .fetch_node(id)?
            .ok_or_else(|| TesseraError::NotFound(format!("node {} does not exist", id)))?;
        load_node(&self.storage, &self.schemas, &mut node, depth)?;
        Ok(node)
    }

    /// A stored node or edge, children not loaded.
    pub fn fetch_entity(&self, player: Player) -> Result<Entity, TesseraError> {
        let entity = match player {
            Player::Node(id) => self.storage.fetch_node(id)?.map(Entity::Node),
            Player::Edge(id) => self.storage.fetch_edge(id)?.map(Entity::Edge),
        };
        entity.ok_or_else(|| TesseraError::NotFound(format!("{} does not exist", player)))
    }

    // =========================================================================
    // TRANSACTIONS
    // =========================================================================

    fn transaction<T>(
        &mut self,
        operation: &str,
        f: impl FnOnce(&mut S, &SchemaRegistry) -> Result<T, TesseraError>,
    ) -> Result<T, TesseraError> {
        self.storage.begin()?;
        match f(&mut self.storage, &self.schemas) {
            Ok(value) => {
                self.storage.commit()?;
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(operation, error = %err, "rolling back");
                if let Err(rollback) = self.storage.rollback() {
                    tracing::warn!(operation, error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }
}
