//! Schema Transform Primitives
//!
//! Building blocks used by override routines to enrich an ingested schema
//! before it is materialized. All of them operate on the in-memory
//! [`IngestedSchema`]; none touch the store.
//!
//! - [`find_prop`]: typed path walk that reports why a lookup missed
//! - [`materialize_socket`]: derive a socket from a leaf prop and tag it
//! - [`promote_to_secret`]: move a prop from `domain` to `secrets` and record it
//!   in the `PropUsageMap` manifest

use crate::models::{
    IngestedSchema, PropKind, PropSpec, PropUsageMap, SecretUsage, SocketArity, SocketKind,
    SocketSpec, Widget, DOMAIN_PROP_NAME, PROP_USAGE_MAP_PROP_NAME, SECRETS_PROP_NAME,
};
use crate::services::override_registry::OverrideError;
use std::collections::BTreeSet;
use std::fmt;

/// Why a path lookup found nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupMiss {
    /// No child with this name at the given depth
    MissingSegment { segment: String, depth: usize },
    /// The walk reached a prop that is not an object before the path ended
    NotAnObject {
        segment: String,
        depth: usize,
        kind: PropKind,
    },
}

impl fmt::Display for LookupMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupMiss::MissingSegment { segment, depth } => {
                write!(f, "no prop named '{}' at depth {}", segment, depth)
            }
            LookupMiss::NotAnObject {
                segment,
                depth,
                kind,
            } => write!(
                f,
                "'{}' at depth {} is a {} prop, not an object",
                segment, depth, kind
            ),
        }
    }
}

/// Walk `path` from `root` through object props
///
/// An empty path yields `root` itself.
pub fn find_prop<'a, S: AsRef<str>>(
    root: &'a PropSpec,
    path: &[S],
) -> Result<&'a PropSpec, LookupMiss> {
    let mut current = root;
    for (depth, segment) in path.iter().enumerate() {
        let segment = segment.as_ref();
        if current.kind != PropKind::Object {
            return Err(LookupMiss::NotAnObject {
                segment: current.name.clone(),
                depth,
                kind: current.kind,
            });
        }
        current = current
            .child(segment)
            .ok_or_else(|| LookupMiss::MissingSegment {
                segment: segment.to_string(),
                depth,
            })?;
    }
    Ok(current)
}

/// Remove the prop at `path` below `root` from its parent and return it
fn detach_prop<S: AsRef<str>>(root: &mut PropSpec, path: &[S]) -> Result<PropSpec, LookupMiss> {
    let Some((last, parent_path)) = path.split_last() else {
        return Err(LookupMiss::MissingSegment {
            segment: String::new(),
            depth: 0,
        });
    };

    // validate the full walk first so the miss reason matches find_prop
    find_prop(root, path)?;

    let mut parent = root;
    for segment in parent_path {
        let segment = segment.as_ref();
        parent = parent
            .child_mut(segment)
            .ok_or_else(|| LookupMiss::MissingSegment {
                segment: segment.to_string(),
                depth: 0,
            })?;
    }

    let index = parent
        .children
        .iter()
        .position(|c| c.name == last.as_ref())
        .ok_or_else(|| LookupMiss::MissingSegment {
            segment: last.as_ref().to_string(),
            depth: parent_path.len(),
        })?;
    Ok(parent.children.remove(index))
}

/// Look up a prop by tree position from the root's children, e.g.
/// `["domain", "GatewayId"]`
fn find_in_schema<'a>(
    schema: &'a IngestedSchema,
    prop_path: &[String],
) -> Result<&'a PropSpec, OverrideError> {
    let target = prop_path.join(".");
    let (first, rest) = prop_path
        .split_first()
        .ok_or_else(|| OverrideError::invalid_target(&target, "empty path"))?;
    let top = schema
        .top_level(first)
        .ok_or_else(|| OverrideError::invalid_target(&target, "not a root child"))?;
    find_prop(top, rest).map_err(|miss| OverrideError::invalid_target(&target, miss.to_string()))
}

/// Socket derived from a prop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketMaterialization {
    /// Tree position of the source prop, e.g. `["domain", "GatewayId"]`
    pub prop_path: Vec<String>,
    pub kind: SocketKind,
    pub arity: SocketArity,
    pub annotations: BTreeSet<String>,
}

impl SocketMaterialization {
    /// Input socket (arity many) for the domain prop at a dot path
    pub fn input(domain_path: &str) -> Self {
        let mut prop_path = vec![DOMAIN_PROP_NAME.to_string()];
        prop_path.extend(domain_path.split('.').map(str::to_string));
        Self {
            prop_path,
            kind: SocketKind::Input,
            arity: SocketArity::Many,
            annotations: BTreeSet::new(),
        }
    }

    pub fn with_annotation(mut self, token: impl Into<String>) -> Self {
        self.annotations.insert(token.into());
        self
    }
}

/// Name for a new socket derived from `base` that no existing socket uses
fn unused_socket_name(schema: &IngestedSchema, base: &str, kind: SocketKind) -> String {
    if schema.socket(base).is_none() {
        return base.to_string();
    }
    let with_kind = format!("{} ({})", base, kind);
    if schema.socket(&with_kind).is_none() {
        return with_kind;
    }
    (2..)
        .map(|n| format!("{} ({} {})", base, kind, n))
        .find(|name| schema.socket(name).is_none())
        .unwrap_or(with_kind)
}

/// Merge `annotations` into the socket with this kind and source prop, or
/// append a new socket named after `name` when there is none
fn attach_socket(
    schema: &mut IngestedSchema,
    name: &str,
    kind: SocketKind,
    arity: SocketArity,
    prop_path: &[String],
    annotations: &BTreeSet<String>,
) {
    let same_source =
        |s: &SocketSpec| s.kind == kind && s.prop_path.as_deref() == Some(prop_path);
    if let Some(existing) = schema.sockets.iter_mut().find(|s| same_source(s)) {
        existing.annotations.extend(annotations.iter().cloned());
        return;
    }

    let name = unused_socket_name(schema, name, kind);
    schema.sockets.push(SocketSpec {
        name,
        kind,
        arity,
        prop_path: Some(prop_path.to_vec()),
        annotations: annotations.clone(),
    });
}

/// Derive a socket from a leaf prop and attach annotation tokens
///
/// The socket is named after the prop. Tokens merge into an existing socket
/// only when it has the same kind and source prop. A same-named socket of
/// another kind or source is left alone and the new one gets a distinct name.
pub fn materialize_socket(
    schema: &mut IngestedSchema,
    materialization: &SocketMaterialization,
) -> Result<(), OverrideError> {
    schema.assign_paths();
    let prop = find_in_schema(schema, &materialization.prop_path)?;
    if prop.kind.is_container() || !prop.children.is_empty() {
        return Err(OverrideError::invalid_target(
            materialization.prop_path.join("."),
            format!("{} prop is not a leaf", prop.kind),
        ));
    }
    let name = prop.name.clone();

    attach_socket(
        schema,
        &name,
        materialization.kind,
        materialization.arity,
        &materialization.prop_path,
        &materialization.annotations,
    );
    Ok(())
}

/// Move a domain prop into the secrets tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretPromotion {
    /// Label carried by the secret widget and the socket token
    pub secret_kind: String,
    /// Key recorded in the manifest
    pub secret_key: String,
    /// Path below `domain`, e.g. `["Secret", "secretString"]`
    pub prop_path: Vec<String>,
}

impl SecretPromotion {
    /// `domain_path` is dot separated, e.g. `"Secret.secretString"`
    pub fn new(
        secret_kind: impl Into<String>,
        secret_key: impl Into<String>,
        domain_path: &str,
    ) -> Self {
        Self {
            secret_kind: secret_kind.into(),
            secret_key: secret_key.into(),
            prop_path: domain_path.split('.').map(str::to_string).collect(),
        }
    }
}

/// Promote a domain prop to a secret
///
/// The manifest is parsed before anything moves, so a missing or malformed
/// `extra.PropUsageMap` leaves the schema unchanged. On success the prop:
///
/// - is detached from its domain parent and appended under `secrets`
/// - carries a secret widget labelled with the secret kind
/// - has the second segment of its stored path (and its descendants') set to
///   `secrets`
/// - backs its own input socket named after, and tagged with, the secret kind
///
/// and the manifest gains one `{secretKey, propPath}` entry.
pub fn promote_to_secret(
    schema: &mut IngestedSchema,
    promotion: &SecretPromotion,
) -> Result<(), OverrideError> {
    schema.assign_paths();

    let manifest_prop = schema.extra.child(PROP_USAGE_MAP_PROP_NAME).ok_or_else(|| {
        OverrideError::MalformedUsageManifest(format!(
            "schema {} has no extra.{}",
            schema.schema_id, PROP_USAGE_MAP_PROP_NAME
        ))
    })?;
    let payload = manifest_prop.default_value.as_ref().ok_or_else(|| {
        OverrideError::MalformedUsageManifest(format!("{} has no payload", PROP_USAGE_MAP_PROP_NAME))
    })?;
    let mut manifest =
        PropUsageMap::from_payload(payload).map_err(OverrideError::MalformedUsageManifest)?;

    let target = format!("{}.{}", DOMAIN_PROP_NAME, promotion.prop_path.join("."));
    find_prop(&schema.domain, &promotion.prop_path)
        .map_err(|miss| OverrideError::invalid_target(&target, miss.to_string()))?;
    if let Some(name) = promotion.prop_path.last() {
        if schema.secrets.child(name).is_some() {
            return Err(OverrideError::invalid_target(
                &target,
                format!("secrets already has a prop named '{}'", name),
            ));
        }
    }

    let mut prop = detach_prop(&mut schema.domain, &promotion.prop_path)
        .map_err(|miss| OverrideError::invalid_target(&target, miss.to_string()))?;

    prop.widget = Some(Widget::Secret {
        secret_kind: promotion.secret_kind.clone(),
    });
    prop.walk_mut(&mut |p: &mut PropSpec| {
        if p.path.get(1).map(String::as_str) == Some(DOMAIN_PROP_NAME) {
            p.path[1] = SECRETS_PROP_NAME.to_string();
        }
    });

    let socket_path = vec![SECRETS_PROP_NAME.to_string(), prop.name.clone()];
    schema.secrets.children.push(prop);

    attach_socket(
        schema,
        &promotion.secret_kind,
        SocketKind::Input,
        SocketArity::One,
        &socket_path,
        &BTreeSet::from([promotion.secret_kind.clone()]),
    );

    manifest.secrets.push(SecretUsage {
        secret_key: promotion.secret_key.clone(),
        prop_path: promotion.prop_path.clone(),
    });
    if let Some(manifest_prop) = schema.extra.child_mut(PROP_USAGE_MAP_PROP_NAME) {
        manifest_prop.default_value = Some(manifest.to_payload());
    }

    Ok(())
}

#[cfg(test)]
#[path = "schema_transform_test.rs"]
mod schema_transform_test;
