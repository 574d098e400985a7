//! # tessera-core
//!
//! The value-integration engine of Tessera.
//!
//! Tessera stores typed nodes and typed two-role edges. Composite types are
//! described by schemas whose slots ("association definitions") relate a
//! parent to its children. This crate converts partial, possibly
//! reference-laden update models into one canonical, deduplicated graph:
//! equal simple values share one node, value-type composites are unified by
//! their children, identity types by their identity slots.
//!
//! ## Layout
//!
//! - `types`, `children`: the persisted vocabulary and the child cache
//! - `schema`: type schemas, the registry, schema persistence and documents
//! - `storage`: the storage trait with in-memory and redb backends
//! - `model`: update models (value, reference, deletion marker)
//! - `integrate`: integration, unification, reconciliation, labels
//! - `directives`: the change notifications an integration produces
//! - `session`: storage + registry with one transaction per call
//!
//! ## Architectural Constraints
//!
//! - Pure Rust: no async, no network dependencies
//! - Deterministic: BTreeMap/BTreeSet only, no HashMap, no floats
//! - The engine never opens transactions; the session does

// =============================================================================
// MODULES
// =============================================================================

pub mod children;
pub mod directives;
pub mod integrate;
pub mod model;
pub mod primitives;
pub mod schema;
pub mod session;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{
    Edge, EdgeDraft, EdgeId, Entity, Node, NodeDraft, NodeId, Player, Role, SimpleValue,
    TesseraError,
};

pub use children::{ChildTopics, ChildValue, Loaded, RelatedNode};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use directives::{Directive, DirectiveKind, Directives, Subject};
pub use integrate::{Integrator, UnifiedValue, calculate_label, resolve};
pub use model::{
    ChildTopicsModel, EdgeModel, NodeModel, RelatedModel, SlotModel, TopicRef, UpdateModel,
};
pub use schema::{
    AssocDef, AssocDefKind, Cardinality, DataKind, SchemaDocument, SchemaRegistry, TypeSchema,
    TypeSchemaProvider,
};
pub use session::{Outcome, Session};
pub use storage::{GraphStorage, MemoryStorage, RedbStorage};
