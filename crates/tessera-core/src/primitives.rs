//! # Built-in Vocabulary
//!
//! Hardcoded URIs and limits of the Tessera engine.
//!
//! These are compiled into the binary and are immutable at runtime. Types,
//! edges and roles created by the engine itself always use these URIs.

// =============================================================================
// ROLE TYPES
// =============================================================================

/// Role played by the composite in a parent/child edge.
pub const ROLE_PARENT: &str = "parent";

/// Role played by the child value in a parent/child edge.
pub const ROLE_CHILD: &str = "child";

/// Role played by a type node in schema edges.
pub const ROLE_PARENT_TYPE: &str = "parent_type";

/// Role played by a child type node in an association-definition edge.
pub const ROLE_CHILD_TYPE: &str = "child_type";

/// Role played by an association-definition edge in a cardinality edge.
pub const ROLE_ASSOC_DEF: &str = "assoc_def";

/// Role played by a cardinality node.
pub const ROLE_CARDINALITY: &str = "cardinality";

/// Roles of the linked sequence of association definitions.
pub const ROLE_PREDECESSOR: &str = "predecessor";
pub const ROLE_SUCCESSOR: &str = "successor";

// =============================================================================
// EDGE TYPES
// =============================================================================

/// Default instance-level edge type for composition slots.
pub const COMPOSITION: &str = "composition";

/// Default instance-level edge type for aggregation slots.
pub const AGGREGATION: &str = "aggregation";

/// Schema edge for a composition slot.
pub const COMPOSITION_DEF: &str = "composition_def";

/// Schema edge for an aggregation slot.
pub const AGGREGATION_DEF: &str = "aggregation_def";

/// Edges binding an association definition to its cardinality nodes.
pub const PARENT_CARDINALITY: &str = "parent_cardinality";
pub const CHILD_CARDINALITY: &str = "child_cardinality";

/// Edge from a type node to its first association definition.
pub const SEQUENCE_START: &str = "sequence_start";

/// Edge between two consecutive association definitions.
pub const SEQUENCE: &str = "sequence";

// =============================================================================
// NODE TYPES
// =============================================================================

/// Type of the nodes that represent type definitions.
pub const META_TYPE: &str = "meta_type";

/// Type of the shared `one` / `many` cardinality nodes.
pub const CARDINALITY_TYPE: &str = "cardinality_type";

/// Prefix of the URIs of type and cardinality nodes. Instance nodes may not
/// use it.
pub const META_URI_PREFIX: &str = "tessera.meta.";

/// Whether nodes of this type describe the schema rather than data.
pub fn is_schema_node_type(type_uri: &str) -> bool {
    type_uri == META_TYPE || type_uri == CARDINALITY_TYPE
}

// =============================================================================
// PROPERTIES
// =============================================================================

pub const PROP_DATA_KIND: &str = "data_kind";
pub const PROP_IDENTITY_ATTRS: &str = "identity_attrs";
pub const PROP_LABEL_CONFIG: &str = "label_config";
pub const PROP_CUSTOM_ASSOC_TYPE: &str = "custom_assoc_type";

/// Separator of list-valued properties.
pub const LIST_SEPARATOR: char = '\n';

// =============================================================================
// URIS & LABELS
// =============================================================================

/// Separates the child type URI from a custom edge type URI in an
/// association-definition URI.
pub const ASSOC_DEF_URI_SEPARATOR: char = '#';

/// Joins the labels of different slots.
pub const LABEL_SLOT_SEPARATOR: &str = " ";

/// Joins the labels of the elements of a multi-valued slot.
pub const LABEL_ELEMENT_SEPARATOR: &str = ", ";

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum composite nesting depth for integration, loading and labels.
///
/// Schema validation already rejects types that contain themselves; this is
/// the bound for everything that recurses over instances.
pub const MAX_COMPOSITE_DEPTH: usize = 32;
