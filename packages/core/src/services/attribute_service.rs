//! Attribute Service - Context Writes and Resolution
//!
//! Stores attribute values at their contexts and picks the winning value for a
//! read. Several values can exist for one coordinate: the schema default, one
//! per component, and branch versions of either. [`AttributeService::resolve`]
//! orders the visible candidates with [`resolution_order`] and returns the
//! first:
//!
//! 1. component-scoped before schema default
//! 2. change-set versions before head versions
//! 3. most recently written first
//!
//! All writes are copy-on-write through the scope, so a change set never
//! disturbs what head (or another change set) resolves to.

use crate::db::{AttributeValueWrite, ContextMatch, GraphStore};
use crate::models::{
    resolution_order, AttributeContext, AttributeValue, AttributeValueId, ComponentId,
    SchemaVariantId, Scope, StructuralCoordinate,
};
use crate::services::error::GraphError;
use crate::services::PropGraphService;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone)]
pub struct AttributeService {
    graph: PropGraphService,
}

impl AttributeService {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            graph: PropGraphService::new(store),
        }
    }

    fn store(&self) -> &Arc<dyn GraphStore> {
        self.graph.store()
    }

    /// Fail with `NotFound` unless the context's coordinate (and component, if
    /// any) is visible
    async fn ensure_context_visible(
        &self,
        scope: &Scope,
        context: &AttributeContext,
    ) -> Result<(), GraphError> {
        self.ensure_coordinate_visible(scope, &context.coordinate)
            .await?;
        if let Some(component_id) = context.component_id {
            if self
                .store()
                .get_component(scope, component_id)
                .await?
                .is_none()
            {
                return Err(GraphError::not_found("component", component_id));
            }
        }
        Ok(())
    }

    async fn ensure_coordinate_visible(
        &self,
        scope: &Scope,
        coordinate: &StructuralCoordinate,
    ) -> Result<(), GraphError> {
        if self.store().coordinate_exists(scope, coordinate).await? {
            Ok(())
        } else {
            Err(GraphError::not_found(
                coordinate.kind_name(),
                coordinate.id_string(),
            ))
        }
    }

    /// Store a new value at `context`
    pub async fn create(
        &self,
        scope: &Scope,
        context: AttributeContext,
        value: Value,
    ) -> Result<AttributeValue, GraphError> {
        self.graph.ensure_writable(scope).await?;
        self.ensure_context_visible(scope, &context).await?;

        Ok(self
            .store()
            .insert_attribute_value(scope, AttributeValueId::generate(), &context, &value)
            .await?)
    }

    pub async fn get(
        &self,
        scope: &Scope,
        id: AttributeValueId,
    ) -> Result<AttributeValue, GraphError> {
        self.store()
            .get_attribute_value(scope, id)
            .await?
            .ok_or_else(|| GraphError::not_found("attribute value", id))
    }

    /// Replace the value of `id`, branching it into the scope's change set first
    /// when needed
    pub async fn update(
        &self,
        scope: &Scope,
        id: AttributeValueId,
        value: Value,
    ) -> Result<AttributeValue, GraphError> {
        self.write(scope, id, AttributeValueWrite::Set(value)).await
    }

    /// Soft-delete `id` in the scope; head stays intact when the scope is a
    /// change set
    pub async fn delete(
        &self,
        scope: &Scope,
        id: AttributeValueId,
    ) -> Result<AttributeValue, GraphError> {
        self.write(scope, id, AttributeValueWrite::Delete).await
    }

    async fn write(
        &self,
        scope: &Scope,
        id: AttributeValueId,
        write: AttributeValueWrite,
    ) -> Result<AttributeValue, GraphError> {
        self.graph.ensure_writable(scope).await?;
        self.store()
            .write_attribute_value(scope, id, write)
            .await?
            .ok_or_else(|| GraphError::not_found("attribute value", id))
    }

    /// Set the value stored at exactly `context`, creating it if none is visible
    pub async fn set_value(
        &self,
        scope: &Scope,
        context: AttributeContext,
        value: Value,
    ) -> Result<AttributeValue, GraphError> {
        self.graph.ensure_writable(scope).await?;
        self.ensure_context_visible(scope, &context).await?;

        let mut existing = self
            .store()
            .attribute_values_for_context(scope, &context, ContextMatch::Exact)
            .await?;
        existing.sort_by(resolution_order);

        match existing.into_iter().next() {
            Some(current) => self.update(scope, current.id, value).await,
            None => {
                Ok(self
                    .store()
                    .insert_attribute_value(scope, AttributeValueId::generate(), &context, &value)
                    .await?)
            }
        }
    }

    /// The winning value for `coordinate` as seen by `component_id` (or by the
    /// schema when `None`)
    ///
    /// # Errors
    ///
    /// - `NotFound` if the prop or provider is not visible in the scope
    /// - `MissingDefault` if no value, not even a schema default, is visible
    pub async fn resolve(
        &self,
        scope: &Scope,
        coordinate: impl Into<StructuralCoordinate>,
        component_id: Option<ComponentId>,
    ) -> Result<AttributeValue, GraphError> {
        let coordinate = coordinate.into();
        self.ensure_coordinate_visible(scope, &coordinate).await?;

        let context = AttributeContext {
            coordinate,
            component_id,
        };
        let mut candidates = self
            .store()
            .attribute_values_for_context(scope, &context, ContextMatch::ResolutionCandidates)
            .await?;
        candidates.sort_by(resolution_order);

        let winner = candidates
            .into_iter()
            .next()
            .ok_or_else(|| GraphError::missing_default(coordinate))?;

        tracing::debug!(
            %coordinate,
            component_id = ?component_id,
            attribute_value_id = %winner.id,
            change_set_id = %winner.visibility.change_set_id,
            "resolved attribute value"
        );
        Ok(winner)
    }

    /// Resolve the prop at a tree position of a variant, e.g.
    /// `["domain", "GatewayId"]`
    pub async fn resolve_path<S: AsRef<str>>(
        &self,
        scope: &Scope,
        variant_id: SchemaVariantId,
        path: &[S],
        component_id: Option<ComponentId>,
    ) -> Result<AttributeValue, GraphError> {
        let prop = self
            .graph
            .find_prop_by_path(scope, variant_id, path)
            .await?;
        self.resolve(scope, prop.id, component_id).await
    }
}
