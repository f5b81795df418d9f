//! Data Models
//!
//! This module contains the data structures shared by the store, the resolution
//! engine and the schema pipeline:
//!
//! - Typed ids and the tenancy/visibility coordinate space
//! - Props, sockets, schema variants and components
//! - Attribute contexts and values
//! - Ingested schema definitions consumed by the override pipeline

mod attribute;
mod definition;
mod ids;
mod prop;
mod schema_variant;
mod socket;
mod tenancy;

pub use attribute::{
    resolution_order, AttributeContext, AttributeContextError, AttributeSpecificity,
    AttributeValue, StructuralCoordinate,
};
pub use definition::{IngestedSchema, PropSpec, PropUsageMap, SecretUsage, SocketSpec};
pub use ids::{
    AttributeValueId, ChangeSetId, ComponentId, InputProviderId, OutputProviderId, PropId,
    SchemaVariantId, SocketId, WorkspaceId,
};
pub use prop::{Prop, PropKind, PropTreeNode, Widget};
pub use schema_variant::{
    ChangeSet, ChangeSetStatus, Component, RootProp, SchemaVariant, DOMAIN_PROP_NAME,
    EXTRA_PROP_NAME, PROP_USAGE_MAP_PROP_NAME, RESOURCE_PROP_NAME, ROOT_PROP_NAME,
    SECRETS_PROP_NAME,
};
pub use socket::{Socket, SocketArity, SocketKind, SocketProvider};
pub use tenancy::{Scope, Tenancy, Visibility};
