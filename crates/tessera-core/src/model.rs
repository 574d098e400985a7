//! # Update Models
//!
//! The input side of integration: a possibly partial, possibly
//! reference-laden description of what a node should look like.
//!
//! An [`UpdateModel`] is exactly one of
//! - `Value`: a node described by value and children
//! - `Reference`: an existing node named by id or URI (or explicitly empty)
//! - `Deletion`: remove the named child from its slot
//!
//! ## JSON form
//!
//! | JSON                              | model                          |
//! |-----------------------------------|--------------------------------|
//! | `"a@x.org"`, `42`, `true`         | value model holding the scalar |
//! | `null`                            | empty reference                |
//! | `{"ref": {"id": 7}}`              | reference by id                |
//! | `{"ref": {"uri": "org.x"}}`       | reference by URI               |
//! | `{"del": {"id": 7}}`              | deletion marker                |
//! | `{"type_uri": .., "children": ..}`| value model                    |
//! | `[ .. ]` (slot content only)      | multi-valued slot              |
//!
//! A child object may carry an `"assoc"` object describing the edge that
//! relates it to its parent.

use crate::{NodeId, SimpleValue, TesseraError};
use serde::Deserialize;
use std::collections::BTreeMap;

// =============================================================================
// REFERENCES
// =============================================================================

/// How a reference or deletion marker names its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicRef {
    Id(NodeId),
    Uri(String),
    /// Names nothing; integrates to "no value".
    Empty,
}

impl TopicRef {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The id, if the reference is by id.
    #[must_use]
    pub fn id(&self) -> Option<NodeId> {
        match self {
            Self::Id(id) => Some(*id),
            _ => None,
        }
    }
}

// =============================================================================
// UPDATE MODEL
// =============================================================================

/// Input to integration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "ModelRepr")]
pub enum UpdateModel {
    Value(NodeModel),
    Reference(TopicRef),
    Deletion(TopicRef),
}

impl UpdateModel {
    #[must_use]
    pub fn reference_id(id: NodeId) -> Self {
        Self::Reference(TopicRef::Id(id))
    }

    #[must_use]
    pub fn reference_uri(uri: impl Into<String>) -> Self {
        Self::Reference(TopicRef::Uri(uri.into()))
    }

    #[must_use]
    pub fn empty_reference() -> Self {
        Self::Reference(TopicRef::Empty)
    }

    #[must_use]
    pub fn delete_id(id: NodeId) -> Self {
        Self::Deletion(TopicRef::Id(id))
    }

    #[must_use]
    pub fn delete_uri(uri: impl Into<String>) -> Self {
        Self::Deletion(TopicRef::Uri(uri.into()))
    }

    /// The id the caller supplied before integration, if any.
    #[must_use]
    pub fn original_id(&self) -> Option<NodeId> {
        match self {
            Self::Value(model) => model.id,
            Self::Reference(r) | Self::Deletion(r) => r.id(),
        }
    }
}

impl From<NodeModel> for UpdateModel {
    fn from(model: NodeModel) -> Self {
        Self::Value(model)
    }
}

/// A node described by value and children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeModel {
    /// Id of the node this model was read from; replaced by the unified
    /// node's id after integration.
    pub id: Option<NodeId>,
    /// URI given to the node when it is created.
    pub uri: Option<String>,
    /// May be omitted for children; the slot's child type is used then.
    pub type_uri: Option<String>,
    pub value: Option<SimpleValue>,
    pub children: ChildTopicsModel,
}

impl NodeModel {
    #[must_use]
    pub fn new(type_uri: impl Into<String>) -> Self {
        Self {
            type_uri: Some(type_uri.into()),
            ..Self::default()
        }
    }

    /// A model of a simple node holding `value`.
    #[must_use]
    pub fn simple(type_uri: impl Into<String>, value: impl Into<SimpleValue>) -> Self {
        Self::new(type_uri).with_value(value)
    }

    /// A model holding only a value; the type comes from the slot.
    #[must_use]
    pub fn untyped(value: impl Into<SimpleValue>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<SimpleValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set a single-valued slot.
    #[must_use]
    pub fn with_child(mut self, assoc_def_uri: &str, child: impl Into<RelatedModel>) -> Self {
        self.children
            .insert(assoc_def_uri, SlotModel::One(child.into()));
        self
    }

    /// Set a multi-valued slot.
    #[must_use]
    pub fn with_children<M: Into<RelatedModel>>(
        mut self,
        assoc_def_uri: &str,
        children: impl IntoIterator<Item = M>,
    ) -> Self {
        self.children.insert(
            assoc_def_uri,
            SlotModel::Many(children.into_iter().map(Into::into).collect()),
        );
        self
    }
}

/// A model of the edge relating a child to its parent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeModel {
    #[serde(default)]
    pub type_uri: Option<String>,
    #[serde(default)]
    pub value: Option<SimpleValue>,
    #[serde(default)]
    pub children: ChildTopicsModel,
}

impl EdgeModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<SimpleValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_child(mut self, assoc_def_uri: &str, child: impl Into<RelatedModel>) -> Self {
        self.children
            .insert(assoc_def_uri, SlotModel::One(child.into()));
        self
    }
}

// =============================================================================
// CHILD TOPICS MODEL
// =============================================================================

/// A child model together with the model of its relating edge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "ModelRepr")]
pub struct RelatedModel {
    pub model: UpdateModel,
    pub relating: Option<EdgeModel>,
}

impl RelatedModel {
    #[must_use]
    pub fn new(model: UpdateModel) -> Self {
        Self {
            model,
            relating: None,
        }
    }

    #[must_use]
    pub fn with_relating(mut self, relating: EdgeModel) -> Self {
        self.relating = Some(relating);
        self
    }
}

impl From<UpdateModel> for RelatedModel {
    fn from(model: UpdateModel) -> Self {
        Self::new(model)
    }
}

impl From<NodeModel> for RelatedModel {
    fn from(model: NodeModel) -> Self {
        Self::new(UpdateModel::Value(model))
    }
}

/// The content of one slot in an update model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "SlotRepr")]
pub enum SlotModel {
    One(RelatedModel),
    Many(Vec<RelatedModel>),
}

/// Slots of an update model, keyed by association-definition URI.
///
/// Slots are integrated in the order of the type's association definitions,
/// not in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ChildTopicsModel {
    slots: BTreeMap<String, SlotModel>,
}

impl ChildTopicsModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, assoc_def_uri: &str, slot: SlotModel) {
        self.slots.insert(assoc_def_uri.to_string(), slot);
    }

    #[must_use]
    pub fn get(&self, assoc_def_uri: &str) -> Option<&SlotModel> {
        self.slots.get(assoc_def_uri)
    }

    pub fn get_mut(&mut self, assoc_def_uri: &str) -> Option<&mut SlotModel> {
        self.slots.get_mut(assoc_def_uri)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

// =============================================================================
// JSON REPRESENTATION
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModelRepr {
    Null,
    Scalar(SimpleValue),
    Object(Box<ObjectRepr>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ObjectRepr {
    #[serde(default, rename = "ref")]
    reference: Option<RefRepr>,
    #[serde(default)]
    del: Option<RefRepr>,
    #[serde(default)]
    id: Option<NodeId>,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    type_uri: Option<String>,
    #[serde(default)]
    value: Option<SimpleValue>,
    #[serde(default)]
    children: ChildTopicsModel,
    #[serde(default)]
    assoc: Option<EdgeModel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RefRepr {
    #[serde(default)]
    id: Option<NodeId>,
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SlotRepr {
    Many(Vec<RelatedModel>),
    One(RelatedModel),
}

impl TryFrom<RefRepr> for TopicRef {
    type Error = TesseraError;

    fn try_from(repr: RefRepr) -> Result<Self, Self::Error> {
        match (repr.id, repr.uri) {
            (Some(id), None) => Ok(Self::Id(id)),
            (None, Some(uri)) => Ok(Self::Uri(uri)),
            (None, None) => Ok(Self::Empty),
            (Some(_), Some(_)) => Err(TesseraError::Precondition(
                "a reference names its target by id or by URI, not both".to_string(),
            )),
        }
    }
}

impl TryFrom<ModelRepr> for RelatedModel {
    type Error = TesseraError;

    fn try_from(repr: ModelRepr) -> Result<Self, Self::Error> {
        match repr {
            ModelRepr::Null => Ok(Self::new(UpdateModel::empty_reference())),
            ModelRepr::Scalar(value) => Ok(Self::new(NodeModel::untyped(value).into())),
            ModelRepr::Object(mut object) => {
                let relating = object.assoc.take();
                let model = object_to_model(*object)?;
                Ok(Self { model, relating })
            }
        }
    }
}

impl TryFrom<ModelRepr> for UpdateModel {
    type Error = TesseraError;

    fn try_from(repr: ModelRepr) -> Result<Self, Self::Error> {
        let related = RelatedModel::try_from(repr)?;
        if related.relating.is_some() {
            return Err(TesseraError::Precondition(
                "'assoc' is only allowed on child models".to_string(),
            ));
        }
        Ok(related.model)
    }
}

fn object_to_model(object: ObjectRepr) -> Result<UpdateModel, TesseraError> {
    let has_value_fields = object.id.is_some()
        || object.uri.is_some()
        || object.type_uri.is_some()
        || object.value.is_some()
        || !object.children.is_empty();

    match (object.reference, object.del) {
        (Some(_), Some(_)) => Err(TesseraError::Precondition(
            "a model cannot be both a reference and a deletion marker".to_string(),
        )),
        (Some(_), None) | (None, Some(_)) if has_value_fields => Err(TesseraError::Precondition(
            "references and deletion markers carry no value fields".to_string(),
        )),
        (Some(reference), None) => Ok(UpdateModel::Reference(reference.try_into()?)),
        (None, Some(del)) => Ok(UpdateModel::Deletion(del.try_into()?)),
        (None, None) => Ok(UpdateModel::Value(NodeModel {
            id: object.id,
            uri: object.uri,
            type_uri: object.type_uri,
            value: object.value,
            children: object.children,
        })),
    }
}

impl From<SlotRepr> for SlotModel {
    fn from(repr: SlotRepr) -> Self {
        match repr {
            SlotRepr::Many(children) => Self::Many(children),
            SlotRepr::One(child) => Self::One(child),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn parse(json: &str) -> UpdateModel {
        serde_json::from_str(json).expect("valid model")
    }

    #[test]
    fn scalar_children_become_value_models() {
        let model = parse(
            r#"{"type_uri": "person", "children": {"name": "Ann", "phone": ["1", "2"]}}"#,
        );
        let UpdateModel::Value(person) = model else {
            panic!("expected a value model");
        };
        assert_eq!(person.type_uri.as_deref(), Some("person"));
        match person.children.get("name") {
            Some(SlotModel::One(child)) => {
                assert_eq!(child.model, NodeModel::untyped("Ann").into());
            }
            other => panic!("unexpected slot {:?}", other),
        }
        match person.children.get("phone") {
            Some(SlotModel::Many(children)) => assert_eq!(children.len(), 2),
            other => panic!("unexpected slot {:?}", other),
        }
    }

    #[test]
    fn references_and_deletions() {
        assert_eq!(
            parse(r#"{"ref": {"id": 7}}"#),
            UpdateModel::reference_id(NodeId(7))
        );
        assert_eq!(
            parse(r#"{"ref": {"uri": "org.x"}}"#),
            UpdateModel::reference_uri("org.x")
        );
        assert_eq!(parse(r#"{"del": {"id": 3}}"#), UpdateModel::delete_id(NodeId(3)));
        assert_eq!(parse("null"), UpdateModel::empty_reference());
    }

    #[test]
    fn assoc_becomes_relating_model() {
        let model = parse(
            r#"{"type_uri": "person", "children": {"email": {"value": "a@x.org", "assoc": {"value": "work"}}}}"#,
        );
        let UpdateModel::Value(person) = model else {
            panic!("expected a value model");
        };
        let Some(SlotModel::One(email)) = person.children.get("email") else {
            panic!("expected a single email");
        };
        assert_eq!(
            email.relating,
            Some(EdgeModel::new().with_value("work"))
        );
    }

    #[test]
    fn contradictory_objects_are_rejected() {
        let both = serde_json::from_str::<UpdateModel>(r#"{"ref": {"id": 1}, "del": {"id": 1}}"#);
        assert!(both.is_err());
        let mixed = serde_json::from_str::<UpdateModel>(r#"{"ref": {"id": 1}, "value": "x"}"#);
        assert!(mixed.is_err());
        let top_assoc = serde_json::from_str::<UpdateModel>(r#"{"value": "x", "assoc": {}}"#);
        assert!(top_assoc.is_err());
    }

    #[test]
    fn original_id_reports_supplied_id() {
        let model = UpdateModel::from(NodeModel::new("person").with_id(NodeId(9)));
        assert_eq!(model.original_id(), Some(NodeId(9)));
        assert_eq!(UpdateModel::empty_reference().original_id(), None);
        assert_eq!(UpdateModel::delete_id(NodeId(2)).original_id(), Some(NodeId(2)));
    }
}
