//! Ingested Schema Definitions
//!
//! These are the in-memory structures handed over by the schema ingestion
//! collaborator: a prop tree split under the fixed root children plus an initial
//! socket list, keyed by a stable schema identifier. The override pipeline
//! transforms them; [`PropGraphService::import_schema`] materializes them.
//!
//! [`PropGraphService::import_schema`]: crate::services::PropGraphService::import_schema
//!
//! # JSON shape
//!
//! ```json
//! {
//!   "schemaId": "AWS::EC2::Route",
//!   "domain": {
//!     "name": "domain",
//!     "kind": "object",
//!     "children": [{ "name": "GatewayId", "kind": "string" }]
//!   },
//!   "sockets": []
//! }
//! ```

use crate::models::{
    PropKind, SocketArity, SocketKind, Widget, DOMAIN_PROP_NAME, EXTRA_PROP_NAME,
    PROP_USAGE_MAP_PROP_NAME, RESOURCE_PROP_NAME, ROOT_PROP_NAME, SECRETS_PROP_NAME,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Definition of one prop and its children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropSpec {
    pub name: String,
    pub kind: PropKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<Widget>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    /// Stored logical path metadata, e.g. `["root", "domain", "GatewayId"]`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PropSpec>,
}

impl PropSpec {
    pub fn new(name: impl Into<String>, kind: PropKind) -> Self {
        Self {
            name: name.into(),
            kind,
            widget: None,
            hidden: false,
            doc_link: None,
            default_value: None,
            path: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, PropKind::String)
    }

    pub fn object(name: impl Into<String>, children: Vec<PropSpec>) -> Self {
        Self {
            children,
            ..Self::new(name, PropKind::Object)
        }
    }

    pub fn array(name: impl Into<String>, entry: PropSpec) -> Self {
        Self {
            children: vec![entry],
            ..Self::new(name, PropKind::Array)
        }
    }

    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_widget(mut self, widget: Widget) -> Self {
        self.widget = Some(widget);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Widget declared by the definition, or the kind's default
    pub fn effective_widget(&self) -> Widget {
        self.widget
            .clone()
            .unwrap_or_else(|| Widget::default_for(self.kind))
    }

    pub fn child(&self, name: &str) -> Option<&PropSpec> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut PropSpec> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Fill in path metadata for this prop and its subtree, keeping paths the
    /// definition already carries
    pub fn assign_paths(&mut self, parent_path: &[String]) {
        if self.path.is_empty() {
            self.path = parent_path.to_vec();
            self.path.push(self.name.clone());
        }
        let own_path = self.path.clone();
        for child in &mut self.children {
            child.assign_paths(&own_path);
        }
    }

    /// Depth-first visit of this prop and its subtree
    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut PropSpec)) {
        visit(self);
        for child in &mut self.children {
            child.walk_mut(visit);
        }
    }
}

/// Definition of a socket to create on the variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketSpec {
    pub name: String,
    pub kind: SocketKind,
    #[serde(default)]
    pub arity: SocketArity,
    /// Tree position of the source prop, from the root's children
    /// (e.g. `["domain", "GatewayId"]`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prop_path: Option<Vec<String>>,
    #[serde(default)]
    pub annotations: BTreeSet<String>,
}

/// One ingested schema: prop tree plus default socket set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestedSchema {
    /// Stable schema identifier; overrides are keyed by it
    pub schema_id: String,
    #[serde(default = "default_variant_name")]
    pub variant_name: String,
    #[serde(default = "empty_domain")]
    pub domain: PropSpec,
    #[serde(default = "empty_secrets")]
    pub secrets: PropSpec,
    #[serde(default = "empty_resource")]
    pub resource: PropSpec,
    #[serde(default = "empty_extra")]
    pub extra: PropSpec,
    #[serde(default)]
    pub sockets: Vec<SocketSpec>,
}

fn default_variant_name() -> String {
    "v0".to_string()
}

fn empty_domain() -> PropSpec {
    PropSpec::object(DOMAIN_PROP_NAME, Vec::new())
}

fn empty_secrets() -> PropSpec {
    PropSpec::object(SECRETS_PROP_NAME, Vec::new())
}

fn empty_resource() -> PropSpec {
    PropSpec::object(RESOURCE_PROP_NAME, Vec::new())
}

fn empty_extra() -> PropSpec {
    PropSpec::object(EXTRA_PROP_NAME, Vec::new())
}

impl IngestedSchema {
    /// Empty schema with the fixed root children in place
    pub fn new(schema_id: impl Into<String>) -> Self {
        let mut schema = Self {
            schema_id: schema_id.into(),
            variant_name: default_variant_name(),
            domain: empty_domain(),
            secrets: empty_secrets(),
            resource: empty_resource(),
            extra: empty_extra(),
            sockets: Vec::new(),
        };
        schema.assign_paths();
        schema
    }

    pub fn with_domain_prop(mut self, prop: PropSpec) -> Self {
        self.domain.children.push(prop);
        self.assign_paths();
        self
    }

    /// Store `manifest` as the serialized payload of `extra.PropUsageMap`
    pub fn with_prop_usage_map(mut self, manifest: &PropUsageMap) -> Self {
        let payload = manifest.to_payload();
        match self.extra.child_mut(PROP_USAGE_MAP_PROP_NAME) {
            Some(existing) => existing.default_value = Some(payload),
            None => self
                .extra
                .children
                .push(PropSpec::string(PROP_USAGE_MAP_PROP_NAME).with_default(payload)),
        }
        self.assign_paths();
        self
    }

    /// Fill in missing path metadata below the root
    pub fn assign_paths(&mut self) {
        let root = vec![ROOT_PROP_NAME.to_string()];
        for top in self.top_level_mut() {
            top.assign_paths(&root);
        }
    }

    /// Fixed root child by name
    pub fn top_level(&self, name: &str) -> Option<&PropSpec> {
        match name {
            DOMAIN_PROP_NAME => Some(&self.domain),
            SECRETS_PROP_NAME => Some(&self.secrets),
            RESOURCE_PROP_NAME => Some(&self.resource),
            EXTRA_PROP_NAME => Some(&self.extra),
            _ => None,
        }
    }

    pub fn top_level_mut(&mut self) -> [&mut PropSpec; 4] {
        [
            &mut self.domain,
            &mut self.secrets,
            &mut self.resource,
            &mut self.extra,
        ]
    }

    pub fn socket(&self, name: &str) -> Option<&SocketSpec> {
        self.sockets.iter().find(|s| s.name == name)
    }
}

/// Where a promoted secret lives, recorded in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretUsage {
    pub secret_key: String,
    pub prop_path: Vec<String>,
}

/// Manifest of how props of a schema are used downstream
///
/// Stored as a serialized JSON string in `extra.PropUsageMap`. Keys this type
/// does not model are carried through unchanged when the manifest is rewritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropUsageMap {
    #[serde(default)]
    pub create_only: Vec<String>,
    #[serde(default)]
    pub updatable: Vec<String>,
    #[serde(default)]
    pub secrets: Vec<SecretUsage>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl PropUsageMap {
    /// Parse the manifest from the payload stored in the prop's default value
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, String> {
        match payload {
            serde_json::Value::String(raw) => {
                serde_json::from_str(raw).map_err(|e| format!("invalid manifest JSON: {}", e))
            }
            other => Err(format!("manifest payload is not a string: {}", other)),
        }
    }

    /// Serialized payload, written back as a whole
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::Value::String(
            serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string()),
        )
    }

    pub fn secret(&self, secret_key: &str) -> Option<&SecretUsage> {
        self.secrets.iter().find(|s| s.secret_key == secret_key)
    }
}
