//! Declarative type definitions.
//!
//! A `SchemaDocument` is the serde form of a set of types, as written in the
//! `[[types]]` tables of a configuration file:
//!
//! ```toml
//! [[types]]
//! uri = "person"
//! data_kind = "identity"
//! identity = ["email"]
//! label = ["name"]
//!
//! [[types.children]]
//! child_type = "name"
//!
//! [[types.children]]
//! child_type = "email"
//! ```

use super::{AssocDef, AssocDefKind, Cardinality, DataKind, TypeSchema};
use crate::TesseraError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A set of type definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub types: Vec<TypeSpec>,
}

/// One type definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSpec {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub data_kind: DataKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AssocDefSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identity: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub label: Vec<String>,
}

/// One slot of a composite type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssocDefSpec {
    pub child_type: String,
    #[serde(default = "default_kind")]
    pub kind: AssocDefKind,
    #[serde(default = "default_cardinality")]
    pub cardinality: Cardinality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assoc_type: Option<String>,
}

fn default_kind() -> AssocDefKind {
    AssocDefKind::Composition
}

fn default_cardinality() -> Cardinality {
    Cardinality::One
}

impl TypeSpec {
    /// Build the schema this entry describes.
    pub fn to_schema(&self) -> Result<TypeSchema, TesseraError> {
        let mut schema = TypeSchema::new(&self.uri, self.data_kind);
        if let Some(name) = &self.name {
            schema = schema.named(name);
        }
        for child in &self.children {
            let def = match child.kind {
                AssocDefKind::Composition => {
                    AssocDef::composition(&self.uri, &child.child_type, child.cardinality)
                }
                AssocDefKind::Aggregation => {
                    AssocDef::aggregation(&self.uri, &child.child_type, child.cardinality)
                }
            };
            let def = match &child.assoc_type {
                Some(custom) => def.with_custom_type(custom),
                None => def,
            };
            schema = schema.with_assoc_def(def)?;
        }
        schema.identity_attrs = self.identity.clone();
        schema.label_config = self.label.clone();
        Ok(schema)
    }

    /// Types this entry refers to.
    fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.children.iter().flat_map(|c| {
            std::iter::once(c.child_type.as_str()).chain(c.assoc_type.as_deref())
        })
    }
}

impl SchemaDocument {
    /// Build all schemas, ordered so every type follows the types of this
    /// document it depends on. Dependencies outside the document are left to
    /// the registry to check.
    ///
    /// # Errors
    ///
    /// `Precondition` if a URI is defined twice or the types form a cycle.
    pub fn into_ordered_schemas(self) -> Result<Vec<TypeSchema>, TesseraError> {
        let mut by_uri: BTreeMap<&str, &TypeSpec> = BTreeMap::new();
        for spec in &self.types {
            if by_uri.insert(spec.uri.as_str(), spec).is_some() {
                return Err(TesseraError::Precondition(format!(
                    "type '{}' is defined twice",
                    spec.uri
                )));
            }
        }

        let mut ordered = Vec::with_capacity(self.types.len());
        let mut done: BTreeSet<&str> = BTreeSet::new();
        for spec in &self.types {
            let mut in_progress = BTreeSet::new();
            order_spec(spec, &by_uri, &mut in_progress, &mut done, &mut ordered)?;
        }
        ordered.into_iter().map(TypeSpec::to_schema).collect()
    }
}

fn order_spec<'a>(
    spec: &'a TypeSpec,
    by_uri: &BTreeMap<&'a str, &'a TypeSpec>,
    in_progress: &mut BTreeSet<&'a str>,
    done: &mut BTreeSet<&'a str>,
    ordered: &mut Vec<&'a TypeSpec>,
) -> Result<(), TesseraError> {
    if done.contains(spec.uri.as_str()) {
        return Ok(());
    }
    if !in_progress.insert(spec.uri.as_str()) {
        return Err(TesseraError::Precondition(format!(
            "type '{}' contains itself",
            spec.uri
        )));
    }
    for dependency in spec.dependencies() {
        if let Some(child) = by_uri.get(dependency) {
            order_spec(child, by_uri, in_progress, done, ordered)?;
        }
    }
    in_progress.remove(spec.uri.as_str());
    done.insert(spec.uri.as_str());
    ordered.push(spec);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"
[[types]]
uri = "person"
name = "Person"
data_kind = "identity"
identity = ["email"]
label = ["name"]

[[types.children]]
child_type = "name"

[[types.children]]
child_type = "email"

[[types.children]]
child_type = "phone"
cardinality = "many"
kind = "aggregation"

[[types]]
uri = "name"
data_kind = "text"

[[types]]
uri = "email"
data_kind = "text"

[[types]]
uri = "phone"
data_kind = "text"
"#;

    #[test]
    fn parses_toml_and_orders_children_first() {
        let doc: SchemaDocument = toml::from_str(DOCUMENT).expect("parse");
        let schemas = doc.into_ordered_schemas().expect("order");
        let uris: Vec<&str> = schemas.iter().map(|s| s.uri.as_str()).collect();
        assert_eq!(uris, vec!["name", "email", "phone", "person"]);

        let person = &schemas[3];
        assert_eq!(person.name, "Person");
        assert_eq!(person.identity_attrs, vec!["email"]);
        let phone = person.assoc_def("phone").expect("slot");
        assert_eq!(phone.kind, AssocDefKind::Aggregation);
        assert_eq!(phone.cardinality(), Cardinality::Many);
        assert_eq!(person.assoc_def("name").expect("slot").cardinality(), Cardinality::One);
    }

    #[test]
    fn duplicate_definition_is_rejected() {
        let doc = SchemaDocument {
            types: vec![
                TypeSpec {
                    uri: "name".to_string(),
                    name: None,
                    data_kind: DataKind::Text,
                    children: Vec::new(),
                    identity: Vec::new(),
                    label: Vec::new(),
                };
                2
            ],
        };
        assert!(matches!(
            doc.into_ordered_schemas(),
            Err(TesseraError::Precondition(_))
        ));
    }

    #[test]
    fn cycle_is_rejected() {
        let doc: SchemaDocument = toml::from_str(
            r#"
[[types]]
uri = "a"
data_kind = "value"
[[types.children]]
child_type = "b"

[[types]]
uri = "b"
data_kind = "value"
[[types.children]]
child_type = "a"
"#,
        )
        .expect("parse");
        assert!(matches!(
            doc.into_ordered_schemas(),
            Err(TesseraError::Precondition(_))
        ));
    }
}
