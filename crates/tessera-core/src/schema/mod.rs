//! # Type Schemas
//!
//! Describes node and edge types: their data kind, their ordered child slots
//! ("association definitions"), their identity attributes and their label
//! configuration.
//!
//! - `sequence`: the linked order of association definitions
//! - `registry`: the in-memory type cache (`SchemaRegistry`)
//! - `store`: persisting type definitions as nodes and edges
//! - `document`: declarative type definitions read from configuration

mod document;
mod registry;
mod sequence;
mod store;

pub use document::{AssocDefSpec, SchemaDocument, TypeSpec};
pub use registry::SchemaRegistry;
pub use sequence::{AssocDefSequence, SequenceIter};
pub use store::{install_type, load_installed_types, load_type};

use crate::primitives::{AGGREGATION, ASSOC_DEF_URI_SEPARATOR, COMPOSITION};
use crate::{SimpleValue, TesseraError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// DATA KIND
// =============================================================================

/// What the instances of a type hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Text,
    Number,
    Boolean,
    /// Composite without identity: unified purely by its set of children.
    Value,
    /// Composite unified by its identity attributes.
    Identity,
}

impl DataKind {
    #[must_use]
    pub fn uri(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Value => "value",
            Self::Identity => "identity",
        }
    }

    pub fn from_uri(uri: &str) -> Result<Self, TesseraError> {
        match uri {
            "text" => Ok(Self::Text),
            "number" => Ok(Self::Number),
            "boolean" => Ok(Self::Boolean),
            "value" => Ok(Self::Value),
            "identity" => Ok(Self::Identity),
            other => Err(TesseraError::Precondition(format!(
                "unknown data kind '{}'",
                other
            ))),
        }
    }

    #[must_use]
    pub fn is_composite(self) -> bool {
        matches!(self, Self::Value | Self::Identity)
    }

    /// Whether a simple value may be stored in an instance of this kind.
    ///
    /// Composites hold their label, which is always text.
    #[must_use]
    pub fn accepts(self, value: &SimpleValue) -> bool {
        matches!(
            (self, value),
            (Self::Text | Self::Value | Self::Identity, SimpleValue::Text(_))
                | (Self::Number, SimpleValue::Number(_))
                | (Self::Boolean, SimpleValue::Boolean(_))
        )
    }
}

// =============================================================================
// CARDINALITY
// =============================================================================

/// How many children a slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}

impl Cardinality {
    #[must_use]
    pub fn uri(self) -> &'static str {
        match self {
            Self::One => "one",
            Self::Many => "many",
        }
    }

    pub fn from_uri(uri: &str) -> Result<Self, TesseraError> {
        match uri {
            "one" => Ok(Self::One),
            "many" => Ok(Self::Many),
            other => Err(TesseraError::Precondition(format!(
                "unknown cardinality URI '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri())
    }
}

// =============================================================================
// ASSOCIATION DEFINITION
// =============================================================================

/// Whether a slot owns its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssocDefKind {
    /// Children belong to the parent and are deleted with it.
    Composition,
    /// Children are shared and outlive the parent.
    Aggregation,
}

impl AssocDefKind {
    /// Instance-level edge type used when no custom type is set.
    #[must_use]
    pub fn default_instance_type(self) -> &'static str {
        match self {
            Self::Composition => COMPOSITION,
            Self::Aggregation => AGGREGATION,
        }
    }
}

/// One child slot of a composite type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssocDef {
    pub parent_type_uri: String,
    pub child_type_uri: String,
    pub kind: AssocDefKind,
    pub parent_cardinality: Cardinality,
    pub child_cardinality: Cardinality,
    /// Instance-level edge type overriding the kind's default.
    pub custom_assoc_type_uri: Option<String>,
}

impl AssocDef {
    #[must_use]
    pub fn composition(
        parent_type_uri: impl Into<String>,
        child_type_uri: impl Into<String>,
        child_cardinality: Cardinality,
    ) -> Self {
        Self {
            parent_type_uri: parent_type_uri.into(),
            child_type_uri: child_type_uri.into(),
            kind: AssocDefKind::Composition,
            parent_cardinality: Cardinality::One,
            child_cardinality,
            custom_assoc_type_uri: None,
        }
    }

    #[must_use]
    pub fn aggregation(
        parent_type_uri: impl Into<String>,
        child_type_uri: impl Into<String>,
        child_cardinality: Cardinality,
    ) -> Self {
        Self {
            parent_type_uri: parent_type_uri.into(),
            child_type_uri: child_type_uri.into(),
            kind: AssocDefKind::Aggregation,
            parent_cardinality: Cardinality::Many,
            child_cardinality,
            custom_assoc_type_uri: None,
        }
    }

    #[must_use]
    pub fn with_custom_type(mut self, assoc_type_uri: impl Into<String>) -> Self {
        self.custom_assoc_type_uri = Some(assoc_type_uri.into());
        self
    }

    /// Slot key: the child type URI, suffixed with `#<custom edge type>`.
    #[must_use]
    pub fn uri(&self) -> String {
        match &self.custom_assoc_type_uri {
            Some(custom) => format!(
                "{}{}{}",
                self.child_type_uri, ASSOC_DEF_URI_SEPARATOR, custom
            ),
            None => self.child_type_uri.clone(),
        }
    }

    /// The edge type connecting parent and child instances.
    #[must_use]
    pub fn instance_type_uri(&self) -> &str {
        self.custom_assoc_type_uri
            .as_deref()
            .unwrap_or_else(|| self.kind.default_instance_type())
    }

    #[must_use]
    pub fn cardinality(&self) -> Cardinality {
        self.child_cardinality
    }
}

// =============================================================================
// TYPE SCHEMA
// =============================================================================

/// The definition of a node or edge type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSchema {
    pub uri: String,
    /// Display name; stored as the value of the type's own node.
    pub name: String,
    pub data_kind: DataKind,
    pub assoc_defs: AssocDefSequence,
    /// Slots whose values identify an instance (identity types only).
    pub identity_attrs: Vec<String>,
    /// Slots contributing to the label; empty means "first slot".
    pub label_config: Vec<String>,
}

impl TypeSchema {
    #[must_use]
    pub fn new(uri: impl Into<String>, data_kind: DataKind) -> Self {
        let uri = uri.into();
        Self {
            name: uri.clone(),
            uri,
            data_kind,
            assoc_defs: AssocDefSequence::new(),
            identity_attrs: Vec::new(),
            label_config: Vec::new(),
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append a slot with the given child type. The parent URI is filled in.
    pub fn with_child(
        mut self,
        child_type_uri: &str,
        cardinality: Cardinality,
    ) -> Result<Self, TesseraError> {
        let def = AssocDef::composition(self.uri.clone(), child_type_uri, cardinality);
        self.assoc_defs.push_back(def)?;
        Ok(self)
    }

    /// Append a fully specified slot.
    pub fn with_assoc_def(mut self, mut def: AssocDef) -> Result<Self, TesseraError> {
        def.parent_type_uri = self.uri.clone();
        self.assoc_defs.push_back(def)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_identity(mut self, attrs: &[&str]) -> Self {
        self.identity_attrs = attrs.iter().map(|s| (*s).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_label(mut self, slots: &[&str]) -> Self {
        self.label_config = slots.iter().map(|s| (*s).to_string()).collect();
        self
    }

    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.data_kind.is_composite()
    }

    #[must_use]
    pub fn is_value_type(&self) -> bool {
        self.data_kind == DataKind::Value
    }

    /// Look up a slot by its association-definition URI.
    pub fn assoc_def(&self, assoc_def_uri: &str) -> Result<&AssocDef, TesseraError> {
        self.assoc_defs.get(assoc_def_uri).ok_or_else(|| {
            TesseraError::Precondition(format!(
                "type '{}' has no association definition '{}'",
                self.uri, assoc_def_uri
            ))
        })
    }

    /// Slots that make up the label, in label order.
    #[must_use]
    pub fn label_slots(&self) -> Vec<String> {
        if self.label_config.is_empty() {
            self.assoc_defs.uris().into_iter().take(1).collect()
        } else {
            self.label_config.clone()
        }
    }
}

// =============================================================================
// TYPE SCHEMA PROVIDER
// =============================================================================

/// Source of type definitions for the integration engine.
pub trait TypeSchemaProvider {
    /// Look up a type; `None` if it is unknown.
    fn find_type(&self, uri: &str) -> Option<Arc<TypeSchema>>;

    /// Look up a type that must exist.
    fn get_type(&self, uri: &str) -> Result<Arc<TypeSchema>, TesseraError> {
        self.find_type(uri)
            .ok_or_else(|| TesseraError::NotFound(format!("type '{}' is not defined", uri)))
    }
}

// =============================================================================
// TESTS
// =============================================================================
