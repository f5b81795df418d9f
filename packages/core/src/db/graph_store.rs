//! GraphStore Trait - Versioned Graph Persistence
//!
//! This module defines the `GraphStore` trait that abstracts row-level access to
//! the versioned graph tables. Services hold an `Arc<dyn GraphStore>` and never
//! build SQL themselves.
//!
//! # Contract
//!
//! - Every method takes the [`Scope`] it reads or writes through. Reads only see
//!   rows visible to that scope; writes land in the scope's change set.
//! - Missing rows are reported as `None`/empty, never as errors. The service
//!   layer decides when absence means `NotFound`.
//! - Updates and deletes are copy-on-write: a head row is never modified from a
//!   change-set scope.
//!
//! # Examples
//!
//! ```rust,no_run
//! use propgraph_core::db::{DatabaseService, GraphStore, TursoStore};
//! use propgraph_core::models::{PropId, Scope, Tenancy, WorkspaceId};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new("./data/propgraph.db".into()).await?);
//!     let store: Arc<dyn GraphStore> = Arc::new(TursoStore::new(db));
//!
//!     let scope = Scope::head(Tenancy::new(WorkspaceId::generate()));
//!     let children = store.child_prop_ids(&scope, PropId::generate()).await?;
//!     assert!(children.is_empty());
//!     Ok(())
//! }
//! ```

use crate::db::DatabaseError;
use crate::models::{
    AttributeContext, AttributeValue, AttributeValueId, ChangeSet, ChangeSetId, Component,
    ComponentId, Prop, PropId, SchemaVariant, SchemaVariantId, Scope, Socket,
    StructuralCoordinate, Tenancy,
};
use async_trait::async_trait;

/// One row of a prop subtree closure
#[derive(Debug, Clone, PartialEq)]
pub struct PropClosureRow {
    pub prop: Prop,
    /// `None` for the subtree root
    pub parent_id: Option<PropId>,
    pub position: i64,
}

/// Which attribute values a context lookup returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMatch {
    /// Values stored for exactly this context
    Exact,
    /// Values for the coordinate scoped to the context's component or to no
    /// component (schema default)
    ResolutionCandidates,
}

/// Change applied to an existing attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValueWrite {
    Set(serde_json::Value),
    Delete,
}

/// Abstraction layer for versioned graph persistence
///
/// Implementations must be `Send + Sync` so services can be shared across tasks.
#[async_trait]
pub trait GraphStore: Send + Sync {
    //
    // CHANGE SETS
    //

    async fn create_change_set(
        &self,
        tenancy: Tenancy,
        change_set: &ChangeSet,
    ) -> Result<(), DatabaseError>;

    async fn get_change_set(
        &self,
        tenancy: Tenancy,
        id: ChangeSetId,
    ) -> Result<Option<ChangeSet>, DatabaseError>;

    //
    // PROPS
    //

    async fn insert_prop(&self, scope: &Scope, prop: &Prop) -> Result<(), DatabaseError>;

    async fn get_prop(&self, scope: &Scope, id: PropId) -> Result<Option<Prop>, DatabaseError>;

    /// Attach `child` under `parent` after its current last child
    async fn insert_prop_edge(
        &self,
        scope: &Scope,
        child: PropId,
        parent: PropId,
    ) -> Result<(), DatabaseError>;

    async fn parent_prop_id(
        &self,
        scope: &Scope,
        child: PropId,
    ) -> Result<Option<PropId>, DatabaseError>;

    /// Direct children in insertion order
    async fn child_prop_ids(
        &self,
        scope: &Scope,
        parent: PropId,
    ) -> Result<Vec<PropId>, DatabaseError>;

    /// `root` and every non-hidden descendant reachable through non-hidden
    /// props, fetched with a single recursive query
    async fn prop_closure(
        &self,
        scope: &Scope,
        root: PropId,
    ) -> Result<Vec<PropClosureRow>, DatabaseError>;

    //
    // SCHEMA VARIANTS
    //

    async fn insert_schema_variant(
        &self,
        scope: &Scope,
        variant: &SchemaVariant,
    ) -> Result<(), DatabaseError>;

    async fn get_schema_variant(
        &self,
        scope: &Scope,
        id: SchemaVariantId,
    ) -> Result<Option<SchemaVariant>, DatabaseError>;

    /// Record `prop_id` as a root prop of `variant_id`
    async fn attach_root_prop(
        &self,
        scope: &Scope,
        prop_id: PropId,
        variant_id: SchemaVariantId,
    ) -> Result<(), DatabaseError>;

    async fn root_prop_ids_for_variant(
        &self,
        scope: &Scope,
        variant_id: SchemaVariantId,
    ) -> Result<Vec<PropId>, DatabaseError>;

    //
    // SOCKETS
    //

    async fn insert_socket(&self, scope: &Scope, socket: &Socket) -> Result<(), DatabaseError>;

    /// Sockets of a variant in creation order
    async fn sockets_for_variant(
        &self,
        scope: &Scope,
        variant_id: SchemaVariantId,
    ) -> Result<Vec<Socket>, DatabaseError>;

    //
    // COMPONENTS
    //

    /// Insert a component and its membership in `variant_id`
    async fn insert_component(
        &self,
        scope: &Scope,
        component: &Component,
        variant_id: SchemaVariantId,
    ) -> Result<(), DatabaseError>;

    async fn get_component(
        &self,
        scope: &Scope,
        id: ComponentId,
    ) -> Result<Option<Component>, DatabaseError>;

    async fn schema_variant_id_for_component(
        &self,
        scope: &Scope,
        id: ComponentId,
    ) -> Result<Option<SchemaVariantId>, DatabaseError>;

    /// Root prop of the variant a component belongs to, joined in one query
    async fn provider_root_prop_id(
        &self,
        scope: &Scope,
        component_id: ComponentId,
    ) -> Result<Option<PropId>, DatabaseError>;

    /// Whether the prop or provider behind a coordinate is visible
    async fn coordinate_exists(
        &self,
        scope: &Scope,
        coordinate: &StructuralCoordinate,
    ) -> Result<bool, DatabaseError>;

    //
    // ATTRIBUTE VALUES
    //

    async fn insert_attribute_value(
        &self,
        scope: &Scope,
        id: AttributeValueId,
        context: &AttributeContext,
        value: &serde_json::Value,
    ) -> Result<AttributeValue, DatabaseError>;

    async fn get_attribute_value(
        &self,
        scope: &Scope,
        id: AttributeValueId,
    ) -> Result<Option<AttributeValue>, DatabaseError>;

    /// Copy-on-write update or soft delete; `None` when `id` is not visible
    async fn write_attribute_value(
        &self,
        scope: &Scope,
        id: AttributeValueId,
        write: AttributeValueWrite,
    ) -> Result<Option<AttributeValue>, DatabaseError>;

    async fn attribute_values_for_context(
        &self,
        scope: &Scope,
        context: &AttributeContext,
        mode: ContextMatch,
    ) -> Result<Vec<AttributeValue>, DatabaseError>;
}
