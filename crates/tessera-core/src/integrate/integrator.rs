//! The integration entry point and its recursion over update models.

use super::{
    ChildResult, IntegratedSlot, Integrator, Parent, SlotChild, SlotResult, Unified,
    UnifiedValue, check_type, resolver,
};
use crate::model::{ChildTopicsModel, EdgeModel, NodeModel, RelatedModel, SlotModel, TopicRef, UpdateModel};
use crate::primitives::{MAX_COMPOSITE_DEPTH, META_URI_PREFIX};
use crate::schema::{AssocDef, Cardinality, DataKind, TypeSchema, TypeSchemaProvider};
use crate::storage::GraphStorage;
use crate::{Edge, Node, NodeDraft, NodeId, TesseraError};

impl<S: GraphStorage, P: TypeSchemaProvider + ?Sized> Integrator<'_, S, P> {
    /// Integrate an update model.
    ///
    /// `reference` names the stored node the model updates. It is used by
    /// identity types; simple and value types are unified by value and
    /// ignore it.
    ///
    /// On success a value model's `id` is replaced by the id of the unified
    /// node, and a reference by URI becomes a reference by the resolved id.
    ///
    /// # Errors
    ///
    /// - `Precondition` if a value model has no type URI, names a slot its
    ///   type does not declare, supplies the wrong shape for a slot, or holds
    ///   a value its type does not accept; also for a deletion marker outside
    ///   a slot
    /// - `NotFound` for references to missing nodes and unknown types
    /// - `Ambiguity` if more than one stored node matches
    pub fn integrate(
        &mut self,
        model: &mut UpdateModel,
        reference: Option<NodeId>,
    ) -> Result<UnifiedValue, TesseraError> {
        if matches!(model, UpdateModel::Value(value) if value.type_uri.is_none()) {
            return Err(TesseraError::Precondition(
                "update model has no type URI".to_string(),
            ));
        }
        let original_id = model.original_id();
        match self.integrate_model(model, None, reference, 0)? {
            ChildResult::Value(unified) => Ok(UnifiedValue {
                node: Some(unified.node),
                original_id,
            }),
            ChildResult::Empty => Ok(UnifiedValue {
                node: None,
                original_id,
            }),
            ChildResult::Deleted(id) => Err(TesseraError::Precondition(format!(
                "deletion marker for node {} outside a slot; delete the node instead",
                id
            ))),
        }
    }

    fn integrate_model(
        &mut self,
        model: &mut UpdateModel,
        expected_type: Option<&str>,
        reference: Option<NodeId>,
        depth: usize,
    ) -> Result<ChildResult, TesseraError> {
        match model {
            UpdateModel::Reference(target) => {
                let result = self.integrate_reference(target, expected_type)?;
                if let ChildResult::Value(unified) = &result {
                    *target = TopicRef::Id(unified.node.id);
                }
                Ok(result)
            }
            UpdateModel::Deletion(target) => self.deletion_target(target).map(ChildResult::Deleted),
            UpdateModel::Value(value) => self.integrate_value(value, expected_type, reference, depth),
        }
    }

    fn integrate_reference(
        &mut self,
        target: &TopicRef,
        expected_type: Option<&str>,
    ) -> Result<ChildResult, TesseraError> {
        if target.is_empty() {
            return Ok(ChildResult::Empty);
        }
        let node = resolver::resolve(&*self.storage, self.types, target)?;
        check_type(expected_type, &node.type_uri)?;
        tracing::trace!(node = %node.id, "resolved reference");
        Ok(ChildResult::Value(Unified {
            node,
            original_id: target.id(),
        }))
    }

    fn deletion_target(&self, target: &TopicRef) -> Result<NodeId, TesseraError> {
        match target {
            TopicRef::Id(id) => Ok(*id),
            TopicRef::Uri(uri) => self
                .storage
                .fetch_node_by_uri(uri)?
                .map(|node| node.id)
                .ok_or_else(|| {
                    TesseraError::NotFound(format!("no node to delete has the URI '{}'", uri))
                }),
            TopicRef::Empty => Err(TesseraError::Precondition(
                "deletion marker names no node".to_string(),
            )),
        }
    }

    fn integrate_value(
        &mut self,
        model: &mut NodeModel,
        expected_type: Option<&str>,
        reference: Option<NodeId>,
        depth: usize,
    ) -> Result<ChildResult, TesseraError> {
        let type_uri = match (model.type_uri.as_deref(), expected_type) {
            (Some(explicit), expected) => {
                check_type(expected, explicit)?;
                explicit.to_string()
            }
            (None, Some(expected)) => expected.to_string(),
            (None, None) => {
                return Err(TesseraError::Precondition(
                    "update model has no type URI".to_string(),
                ));
            }
        };
        if let Some(uri) = model.uri.as_deref().filter(|u| u.starts_with(META_URI_PREFIX)) {
            return Err(TesseraError::Precondition(format!(
                "URI '{}' is reserved for schema nodes",
                uri
            )));
        }
        let schema = self.types.get_type(&type_uri)?;
        let result = if schema.is_composite() {
            self.integrate_composite(model, &schema, reference, depth)?
        } else {
            self.integrate_simple(model, &schema)?
        };
        if let ChildResult::Value(unified) = &result {
            model.id = Some(unified.node.id);
        }
        Ok(result)
    }

    // =========================================================================
    // SIMPLE TYPES
    // =========================================================================

    fn integrate_simple(
        &mut self,
        model: &NodeModel,
        schema: &TypeSchema,
    ) -> Result<ChildResult, TesseraError> {
        if !model.children.is_empty() {
            return Err(TesseraError::Precondition(format!(
                "simple type '{}' has no slots",
                schema.uri
            )));
        }
        let Some(value) = model.value.as_ref().filter(|v| !v.is_empty()) else {
            return Ok(ChildResult::Empty);
        };
        if !schema.data_kind.accepts(value) {
            return Err(TesseraError::Precondition(format!(
                "'{}' holds {} values, got '{}'",
                schema.uri,
                schema.data_kind.uri(),
                value
            )));
        }

        let node = match self.storage.fetch_node_by_value(&schema.uri, value)? {
            Some(node) => {
                tracing::trace!(type_uri = %schema.uri, node = %node.id, "reused simple value");
                node
            }
            None => {
                let draft = NodeDraft::new(&schema.uri, value.clone())
                    .with_uri(model.uri.as_deref().unwrap_or_default());
                let node = self.storage.create_node(draft)?;
                self.directives.node_created(node.id);
                tracing::debug!(type_uri = %schema.uri, node = %node.id, "created simple value");
                node
            }
        };
        Ok(ChildResult::Value(Unified {
            node,
            original_id: model.id,
        }))
    }

    // =========================================================================
    // COMPOSITE TYPES
    // =========================================================================

    fn integrate_composite(
        &mut self,
        model: &mut NodeModel,
        schema: &TypeSchema,
        reference: Option<NodeId>,
        depth: usize,
    ) -> Result<ChildResult, TesseraError> {
        if depth >= MAX_COMPOSITE_DEPTH {
            return Err(TesseraError::Precondition(format!(
                "'{}' nests deeper than {} levels",
                schema.uri, MAX_COMPOSITE_DEPTH
            )));
        }
        let original_id = model.id;
        let slots = self.integrate_slots(schema, &mut model.children, depth)?;

        let mut node = match schema.data_kind {
            DataKind::Value => match self.unify_by_children(schema, slots, depth)? {
                Some(node) => node,
                None => return Ok(ChildResult::Empty),
            },
            _ => {
                let mut node = self.identity_parent(schema, model, reference, &slots)?;
                self.reconcile(&mut Parent::node(&mut node), slots, depth)?;
                node
            }
        };
        self.update_label(&mut Parent::node(&mut node), depth)?;
        Ok(ChildResult::Value(Unified { node, original_id }))
    }

    /// The node an identity-type model updates.
    fn identity_parent(
        &mut self,
        schema: &TypeSchema,
        model: &NodeModel,
        reference: Option<NodeId>,
        slots: &[IntegratedSlot],
    ) -> Result<Node, TesseraError> {
        if let Some(id) = reference.or(model.id) {
            let node = self.storage.fetch_node(id)?.ok_or_else(|| {
                TesseraError::NotFound(format!("node {} to update does not exist", id))
            })?;
            check_type(Some(&schema.uri), &node.type_uri)?;
            return Ok(node);
        }
        if let Some(node) = self.find_by_identity(schema, slots)? {
            tracing::debug!(type_uri = %schema.uri, node = %node.id, "unified by identity");
            return Ok(node);
        }
        let node = self.create_parent(schema, model.uri.as_deref())?;
        tracing::debug!(type_uri = %schema.uri, node = %node.id, "created instance");
        Ok(node)
    }

    /// Integrate the mentioned slots in schema order.
    fn integrate_slots(
        &mut self,
        schema: &TypeSchema,
        children: &mut ChildTopicsModel,
        depth: usize,
    ) -> Result<Vec<IntegratedSlot>, TesseraError> {
        for key in children.keys() {
            schema.assoc_def(key)?;
        }
        let mut slots = Vec::with_capacity(children.len());
        for def in &schema.assoc_defs {
            let key = def.uri();
            let Some(slot) = children.get_mut(&key) else {
                continue;
            };
            let result = self
                .integrate_slot(def, slot, depth)
                .map_err(|e| e.in_context(&schema.uri, Some(&key), None))?;
            slots.push(IntegratedSlot {
                def: def.clone(),
                result,
            });
        }
        Ok(slots)
    }

    fn integrate_slot(
        &mut self,
        def: &AssocDef,
        slot: &mut SlotModel,
        depth: usize,
    ) -> Result<SlotResult, TesseraError> {
        match (def.cardinality(), slot) {
            (Cardinality::One, SlotModel::One(related)) => {
                Ok(SlotResult::One(self.integrate_related(def, related, depth)?))
            }
            (Cardinality::Many, SlotModel::Many(list)) => {
                let mut children = Vec::with_capacity(list.len());
                for related in list {
                    children.push(self.integrate_related(def, related, depth)?);
                }
                Ok(SlotResult::Many(children))
            }
            (Cardinality::One, SlotModel::Many(_)) => Err(TesseraError::Precondition(format!(
                "slot '{}' is single-valued but a list was supplied",
                def.uri()
            ))),
            (Cardinality::Many, SlotModel::One(_)) => Err(TesseraError::Precondition(format!(
                "slot '{}' is multi-valued but a single value was supplied",
                def.uri()
            ))),
        }
    }

    fn integrate_related(
        &mut self,
        def: &AssocDef,
        related: &mut RelatedModel,
        depth: usize,
    ) -> Result<SlotChild, TesseraError> {
        let result =
            self.integrate_model(&mut related.model, Some(&def.child_type_uri), None, depth + 1)?;
        Ok(SlotChild {
            result,
            relating: related.relating.clone(),
        })
    }

    // =========================================================================
    // EDGES
    // =========================================================================

    /// Apply an edge model to a stored edge in place.
    ///
    /// Edges are never unified. A composite edge type reconciles the model's
    /// children against the edge and takes their label as value; otherwise
    /// the model's value is stored directly.
    pub(super) fn update_edge(
        &mut self,
        edge: &mut Edge,
        model: &EdgeModel,
        depth: usize,
    ) -> Result<(), TesseraError> {
        match &model.type_uri {
            Some(type_uri) if *type_uri != edge.type_uri => {
                return Err(TesseraError::Precondition(format!(
                    "edge {} has type '{}', the model describes '{}'",
                    edge.id, edge.type_uri, type_uri
                )));
            }
            _ => {}
        }
        let schema = self.types.get_type(&edge.type_uri)?;
        if schema.is_composite() && !model.children.is_empty() {
            if depth >= MAX_COMPOSITE_DEPTH {
                return Err(TesseraError::Precondition(format!(
                    "'{}' nests deeper than {} levels",
                    schema.uri, MAX_COMPOSITE_DEPTH
                )));
            }
            let mut children = model.children.clone();
            let slots = self.integrate_slots(&schema, &mut children, depth)?;
            let mut parent = Parent::edge(edge);
            self.reconcile(&mut parent, slots, depth)?;
            return self.update_label(&mut parent, depth);
        }

        let Some(value) = &model.value else {
            return Ok(());
        };
        if !schema.data_kind.accepts(value) {
            return Err(TesseraError::Precondition(format!(
                "'{}' holds {} values, got '{}'",
                schema.uri,
                schema.data_kind.uri(),
                value
            )));
        }
        if *value != edge.value {
            self.storage.set_edge_value(edge.id, value.clone())?;
            self.directives.edge_updated(edge.id);
            edge.value = value.clone();
        }
        Ok(())
    }
}
