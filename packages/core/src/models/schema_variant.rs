//! Schema Variants, Root Props and Components
//!
//! A schema variant is the versioned definition of one resource kind. It owns a
//! single root prop whose fixed children partition the tree:
//!
//! - `domain`: the resource's configurable properties
//! - `secrets`: props promoted to secret handling
//! - `resource`: observed state reported back by executors
//! - `extra`: ingestion metadata such as the `PropUsageMap` manifest
//!
//! Components are live instances of a variant.

use crate::models::{ChangeSetId, ComponentId, PropId, SchemaVariantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ROOT_PROP_NAME: &str = "root";
pub const DOMAIN_PROP_NAME: &str = "domain";
pub const SECRETS_PROP_NAME: &str = "secrets";
pub const RESOURCE_PROP_NAME: &str = "resource";
pub const EXTRA_PROP_NAME: &str = "extra";
pub const PROP_USAGE_MAP_PROP_NAME: &str = "PropUsageMap";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVariant {
    pub id: SchemaVariantId,
    /// Stable identifier of the ingested schema (e.g. `AWS::EC2::Route`)
    pub schema_name: String,
    pub name: String,
}

/// Ids of the fixed props at the top of a variant's tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootProp {
    pub root: PropId,
    pub domain: PropId,
    pub secrets: PropId,
    pub resource: PropId,
    pub extra: PropId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeSetStatus {
    Open,
}

impl ChangeSetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeSetStatus::Open => "open",
        }
    }
}

/// A branch of copy-on-write edits over head
///
/// Merging and abandoning change sets is owned by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub id: ChangeSetId,
    pub name: String,
    pub status: ChangeSetStatus,
    pub created_at: DateTime<Utc>,
}
