//! Business Services
//!
//! This module contains the graph and schema pipeline services:
//!
//! - `PropGraphService` - Prop tree traversal, schema variant import, sockets
//! - `AttributeService` - Attribute value CRUD and default resolution
//! - `schema_transform` - Socket materialization and secret promotion over
//!   ingested schemas
//! - `override_registry` / `overrides` - Per-schema enrichment routines
//!
//! Services coordinate between the store layer and callers, enforcing the tree
//! and context rules before anything is written.

pub mod attribute_service;
pub mod error;
pub mod override_registry;
pub mod overrides;
pub mod prop_graph_service;
pub mod schema_transform;

pub use attribute_service::AttributeService;
pub use error::GraphError;
pub use override_registry::{
    apply_overrides, OverrideDiagnostic, OverrideError, OverrideOutcome, OverrideRegistry,
    OverrideRoutine,
};
pub use overrides::default_registry;
pub use prop_graph_service::{ImportedSchemaVariant, PropGraphService};
pub use schema_transform::{
    find_prop, materialize_socket, promote_to_secret, LookupMiss, SecretPromotion,
    SocketMaterialization,
};
