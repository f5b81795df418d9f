//! Prop Graph Service - Structural Graph Operations
//!
//! This module provides the structural side of the graph: prop trees, schema
//! variants, sockets and components. It enforces the tree rules on every write:
//!
//! - A prop has at most one parent; props are only ever appended under an
//!   already-persisted parent, so no write can introduce a cycle
//! - Only object, array and map props take children; arrays and maps take
//!   exactly one
//! - Sockets derived from a prop must point into their own variant's tree
//!
//! Every prop and every socket provider is seeded with a schema-default
//! attribute value when it is created, so resolution always has a fallback.
//!
//! Writes through a change-set scope require that change set to exist and be
//! open.

use crate::db::GraphStore;
use crate::models::{
    AttributeContext, AttributeValueId, ChangeSet, ChangeSetId, ChangeSetStatus, Component,
    ComponentId, IngestedSchema, Prop, PropId, PropKind, PropSpec, PropTreeNode, RootProp,
    SchemaVariant, SchemaVariantId, Scope, Socket, SocketId, SocketProvider, SocketSpec, Tenancy,
    Widget, DOMAIN_PROP_NAME, EXTRA_PROP_NAME, RESOURCE_PROP_NAME, ROOT_PROP_NAME,
    SECRETS_PROP_NAME,
};
use crate::services::error::GraphError;
use crate::services::schema_transform::find_prop;
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Result of materializing an ingested schema
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedSchemaVariant {
    pub variant: SchemaVariant,
    pub root_prop: RootProp,
    pub sockets: Vec<Socket>,
}

/// Structural graph operations over a [`GraphStore`]
#[derive(Clone)]
pub struct PropGraphService {
    store: Arc<dyn GraphStore>,
}

impl PropGraphService {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Open a new change set in the tenancy
    pub async fn create_change_set(
        &self,
        tenancy: Tenancy,
        name: impl Into<String>,
    ) -> Result<ChangeSet, GraphError> {
        let change_set = ChangeSet {
            id: ChangeSetId::generate(),
            name: name.into(),
            status: ChangeSetStatus::Open,
            created_at: Utc::now(),
        };
        self.store.create_change_set(tenancy, &change_set).await?;
        tracing::info!(change_set_id = %change_set.id, name = %change_set.name, "opened change set");
        Ok(change_set)
    }

    /// Fail unless writes through `scope` may land
    ///
    /// Head is always writable; a change set must exist in the scope's tenancy
    /// and be open.
    pub(crate) async fn ensure_writable(&self, scope: &Scope) -> Result<(), GraphError> {
        if scope.is_head() {
            return Ok(());
        }
        match self
            .store
            .get_change_set(scope.tenancy(), scope.change_set_id())
            .await?
        {
            Some(change_set) if change_set.status == ChangeSetStatus::Open => Ok(()),
            _ => Err(GraphError::not_found("change set", scope.change_set_id())),
        }
    }

    pub async fn get_prop(&self, scope: &Scope, id: PropId) -> Result<Prop, GraphError> {
        self.store
            .get_prop(scope, id)
            .await?
            .ok_or_else(|| GraphError::not_found("prop", id))
    }

    /// Direct children of a prop, in insertion order
    pub async fn child_props(
        &self,
        scope: &Scope,
        prop_id: PropId,
    ) -> Result<Vec<PropId>, GraphError> {
        self.get_prop(scope, prop_id).await?;
        Ok(self.store.child_prop_ids(scope, prop_id).await?)
    }

    /// The subtree under `root_prop_id`, hidden props and their subtrees excluded
    ///
    /// The closure is fetched with a single recursive query; the nested tree is
    /// then assembled in memory from an adjacency list.
    pub async fn descendant_tree(
        &self,
        scope: &Scope,
        root_prop_id: PropId,
    ) -> Result<PropTreeNode, GraphError> {
        let closure = self.store.prop_closure(scope, root_prop_id).await?;

        let mut root = None;
        let mut adjacency_list: HashMap<PropId, Vec<(i64, Prop)>> = HashMap::new();
        for row in closure {
            match row.parent_id {
                None if row.prop.id == root_prop_id => root = Some(row.prop),
                None => {}
                Some(parent_id) => adjacency_list
                    .entry(parent_id)
                    .or_default()
                    .push((row.position, row.prop)),
            }
        }

        for children in adjacency_list.values_mut() {
            children.sort_by_key(|(position, _)| *position);
        }

        let root = root.ok_or_else(|| GraphError::not_found("prop", root_prop_id))?;
        let mut visited = HashSet::new();
        Ok(Self::build_tree(root, &adjacency_list, &mut visited))
    }

    /// Recursively attach children; a prop already placed is never placed twice
    fn build_tree(
        prop: Prop,
        adjacency_list: &HashMap<PropId, Vec<(i64, Prop)>>,
        visited: &mut HashSet<PropId>,
    ) -> PropTreeNode {
        visited.insert(prop.id);
        let children = adjacency_list
            .get(&prop.id)
            .map(|children| {
                children
                    .iter()
                    .filter_map(|(_, child)| {
                        if visited.contains(&child.id) {
                            return None;
                        }
                        Some(Self::build_tree(child.clone(), adjacency_list, visited))
                    })
                    .collect()
            })
            .unwrap_or_default();

        PropTreeNode { prop, children }
    }

    /// Root prop of the schema variant a component belongs to
    pub async fn provider_root_for(
        &self,
        scope: &Scope,
        component_id: ComponentId,
    ) -> Result<PropId, GraphError> {
        if self.store.get_component(scope, component_id).await?.is_none() {
            return Err(GraphError::not_found("component", component_id));
        }
        self.store
            .provider_root_prop_id(scope, component_id)
            .await?
            .ok_or_else(|| GraphError::not_found("root prop for component", component_id))
    }

    pub async fn get_schema_variant(
        &self,
        scope: &Scope,
        id: SchemaVariantId,
    ) -> Result<SchemaVariant, GraphError> {
        self.store
            .get_schema_variant(scope, id)
            .await?
            .ok_or_else(|| GraphError::not_found("schema variant", id))
    }

    /// Ids of the fixed props at the top of a variant's tree
    pub async fn root_prop_for_variant(
        &self,
        scope: &Scope,
        variant_id: SchemaVariantId,
    ) -> Result<RootProp, GraphError> {
        self.get_schema_variant(scope, variant_id).await?;

        let mut root = None;
        for id in self.store.root_prop_ids_for_variant(scope, variant_id).await? {
            let prop = self.get_prop(scope, id).await?;
            if prop.name == ROOT_PROP_NAME {
                root = Some(prop);
                break;
            }
        }
        let root = root.ok_or_else(|| GraphError::not_found("root prop", variant_id))?;

        let mut by_name = HashMap::new();
        for id in self.store.child_prop_ids(scope, root.id).await? {
            let child = self.get_prop(scope, id).await?;
            by_name.entry(child.name).or_insert(child.id);
        }
        let fixed = |name: &str| {
            by_name.get(name).copied().ok_or_else(|| {
                GraphError::invalid_prop_tree(
                    format!("{}/{}", ROOT_PROP_NAME, name),
                    "missing fixed root child",
                )
            })
        };

        Ok(RootProp {
            root: root.id,
            domain: fixed(DOMAIN_PROP_NAME)?,
            secrets: fixed(SECRETS_PROP_NAME)?,
            resource: fixed(RESOURCE_PROP_NAME)?,
            extra: fixed(EXTRA_PROP_NAME)?,
        })
    }

    /// Prop at a tree position below the variant's root, e.g. `["domain", "Foo"]`
    ///
    /// Walks the live tree, so a prop moved to `secrets` is no longer found
    /// under its old `domain` position.
    pub async fn find_prop_by_path<S: AsRef<str>>(
        &self,
        scope: &Scope,
        variant_id: SchemaVariantId,
        path: &[S],
    ) -> Result<Prop, GraphError> {
        let root_prop = self.root_prop_for_variant(scope, variant_id).await?;
        let mut current = self.get_prop(scope, root_prop.root).await?;

        for segment in path {
            let mut next = None;
            for id in self.store.child_prop_ids(scope, current.id).await? {
                let child = self.get_prop(scope, id).await?;
                if child.name == segment.as_ref() {
                    next = Some(child);
                    break;
                }
            }
            current = next.ok_or_else(|| {
                let joined: Vec<&str> = path.iter().map(|s| s.as_ref()).collect();
                GraphError::not_found("prop", joined.join("/"))
            })?;
        }

        Ok(current)
    }

    /// Create `spec` (and its children) as the last child of `parent_id`
    pub async fn create_child_prop(
        &self,
        scope: &Scope,
        parent_id: PropId,
        spec: &PropSpec,
    ) -> Result<Prop, GraphError> {
        self.ensure_writable(scope).await?;

        let parent = self.get_prop(scope, parent_id).await?;
        if !parent.kind.is_container() {
            return Err(GraphError::invalid_parent(
                parent_id,
                format!("{} props cannot have children", parent.kind),
            ));
        }

        let siblings = self.store.child_prop_ids(scope, parent_id).await?;
        if parent.kind.has_single_entry() && !siblings.is_empty() {
            return Err(GraphError::invalid_parent(
                parent_id,
                format!("{} props hold exactly one entry", parent.kind),
            ));
        }
        for sibling in siblings {
            if self.get_prop(scope, sibling).await?.name == spec.name {
                return Err(GraphError::invalid_parent(
                    parent_id,
                    format!("already has a child named {}", spec.name),
                ));
            }
        }

        let child_path = format!("{}/{}", parent.path_string(), spec.name);
        validate_prop_tree(spec, &child_path)?;

        let (created, _) = self.materialize_subtree(scope, spec, &parent).await?;
        Ok(created)
    }

    /// Persist `spec` and its descendants under `parent`, breadth first
    ///
    /// Returns the created top prop and the number of props written.
    async fn materialize_subtree(
        &self,
        scope: &Scope,
        spec: &PropSpec,
        parent: &Prop,
    ) -> Result<(Prop, usize), GraphError> {
        let mut queue: VecDeque<(&PropSpec, Prop)> = VecDeque::new();
        queue.push_back((spec, parent.clone()));

        let mut top = None;
        let mut count = 0;
        while let Some((spec, parent)) = queue.pop_front() {
            let prop = self.insert_prop_with_default(scope, spec, Some(&parent)).await?;
            count += 1;
            for child in &spec.children {
                queue.push_back((child, prop.clone()));
            }
            top.get_or_insert(prop);
        }

        let top = top.ok_or_else(|| GraphError::invalid_prop_tree(&spec.name, "empty subtree"))?;
        Ok((top, count))
    }

    /// Insert one prop, its parent edge and its schema-default value
    async fn insert_prop_with_default(
        &self,
        scope: &Scope,
        spec: &PropSpec,
        parent: Option<&Prop>,
    ) -> Result<Prop, GraphError> {
        let path = if spec.path.is_empty() {
            let mut path = parent.map(|p| p.path.clone()).unwrap_or_default();
            path.push(spec.name.clone());
            path
        } else {
            spec.path.clone()
        };

        let prop = Prop {
            id: PropId::generate(),
            name: spec.name.clone(),
            kind: spec.kind,
            widget: spec.effective_widget(),
            hidden: spec.hidden,
            doc_link: spec.doc_link.clone(),
            path,
        };
        self.store.insert_prop(scope, &prop).await?;
        if let Some(parent) = parent {
            self.store.insert_prop_edge(scope, prop.id, parent.id).await?;
        }

        let default_value = spec
            .default_value
            .clone()
            .unwrap_or_else(|| spec.kind.empty_value());
        self.store
            .insert_attribute_value(
                scope,
                AttributeValueId::generate(),
                &AttributeContext::default_for(prop.id),
                &default_value,
            )
            .await?;

        Ok(prop)
    }

    /// Sockets of a variant in creation order
    pub async fn sockets_for_variant(
        &self,
        scope: &Scope,
        variant_id: SchemaVariantId,
    ) -> Result<Vec<Socket>, GraphError> {
        self.get_schema_variant(scope, variant_id).await?;
        Ok(self.store.sockets_for_variant(scope, variant_id).await?)
    }

    /// Create a socket on a variant, with a fresh provider and its default value
    pub async fn create_socket(
        &self,
        scope: &Scope,
        variant_id: SchemaVariantId,
        spec: &SocketSpec,
    ) -> Result<Socket, GraphError> {
        self.ensure_writable(scope).await?;
        self.get_schema_variant(scope, variant_id).await?;
        self.insert_socket(scope, variant_id, spec).await
    }

    async fn insert_socket(
        &self,
        scope: &Scope,
        variant_id: SchemaVariantId,
        spec: &SocketSpec,
    ) -> Result<Socket, GraphError> {
        let prop_id = match &spec.prop_path {
            Some(path) => {
                let prop = self
                    .find_prop_by_path(scope, variant_id, path)
                    .await
                    .map_err(|e| match e {
                        GraphError::NotFound { .. } => GraphError::invalid_socket_source(
                            &spec.name,
                            format!("no prop at {} in this variant", path.join("/")),
                        ),
                        other => other,
                    })?;
                Some(prop.id)
            }
            None => None,
        };

        let socket = Socket {
            id: SocketId::generate(),
            schema_variant_id: variant_id,
            name: spec.name.clone(),
            kind: spec.kind,
            arity: spec.arity,
            prop_id,
            provider: SocketProvider::generate(spec.kind),
            annotations: spec.annotations.clone(),
        };
        self.store.insert_socket(scope, &socket).await?;
        self.store
            .insert_attribute_value(
                scope,
                AttributeValueId::generate(),
                &AttributeContext::default_for(socket.provider),
                &serde_json::Value::Null,
            )
            .await?;

        Ok(socket)
    }

    /// Create a component of a schema variant
    pub async fn create_component(
        &self,
        scope: &Scope,
        name: impl Into<String>,
        variant_id: SchemaVariantId,
    ) -> Result<Component, GraphError> {
        self.ensure_writable(scope).await?;
        self.get_schema_variant(scope, variant_id).await?;

        let component = Component {
            id: ComponentId::generate(),
            name: name.into(),
        };
        self.store
            .insert_component(scope, &component, variant_id)
            .await?;
        Ok(component)
    }

    /// Materialize an ingested (and already overridden) schema as a new variant
    ///
    /// The prop trees and socket sources are validated before anything is
    /// written.
    pub async fn import_schema(
        &self,
        scope: &Scope,
        schema: &IngestedSchema,
    ) -> Result<ImportedSchemaVariant, GraphError> {
        let mut schema = schema.clone();
        schema.assign_paths();
        validate_schema(&schema)?;
        self.ensure_writable(scope).await?;

        let variant = SchemaVariant {
            id: SchemaVariantId::generate(),
            schema_name: schema.schema_id.clone(),
            name: schema.variant_name.clone(),
        };
        self.store.insert_schema_variant(scope, &variant).await?;

        let root_spec = PropSpec::new(ROOT_PROP_NAME, PropKind::Object).with_widget(Widget::Header);
        let root = self.insert_prop_with_default(scope, &root_spec, None).await?;
        self.store.attach_root_prop(scope, root.id, variant.id).await?;

        let mut prop_count = 1;
        for top in [&schema.domain, &schema.secrets, &schema.resource, &schema.extra] {
            let (_, count) = self.materialize_subtree(scope, top, &root).await?;
            prop_count += count;
        }

        let mut sockets = Vec::with_capacity(schema.sockets.len());
        for spec in &schema.sockets {
            sockets.push(self.insert_socket(scope, variant.id, spec).await?);
        }

        let root_prop = self.root_prop_for_variant(scope, variant.id).await?;

        tracing::info!(
            schema_id = %variant.schema_name,
            variant_id = %variant.id,
            props = prop_count,
            sockets = sockets.len(),
            change_set_id = %scope.change_set_id(),
            "imported schema variant"
        );

        Ok(ImportedSchemaVariant {
            variant,
            root_prop,
            sockets,
        })
    }
}

/// Check the structural rules on a definition subtree
pub(crate) fn validate_prop_tree(spec: &PropSpec, path: &str) -> Result<(), GraphError> {
    if !spec.kind.is_container() && !spec.children.is_empty() {
        return Err(GraphError::invalid_prop_tree(
            path,
            format!("{} props cannot have children", spec.kind),
        ));
    }
    if spec.kind.has_single_entry() && spec.children.len() != 1 {
        return Err(GraphError::invalid_prop_tree(
            path,
            format!(
                "{} props need exactly one entry, found {}",
                spec.kind,
                spec.children.len()
            ),
        ));
    }

    let mut names = HashSet::new();
    for child in &spec.children {
        let child_path = format!("{}/{}", path, child.name);
        if !names.insert(child.name.as_str()) {
            return Err(GraphError::invalid_prop_tree(child_path, "duplicate sibling name"));
        }
        validate_prop_tree(child, &child_path)?;
    }
    Ok(())
}

fn validate_schema(schema: &IngestedSchema) -> Result<(), GraphError> {
    for (expected, top) in [
        (DOMAIN_PROP_NAME, &schema.domain),
        (SECRETS_PROP_NAME, &schema.secrets),
        (RESOURCE_PROP_NAME, &schema.resource),
        (EXTRA_PROP_NAME, &schema.extra),
    ] {
        let path = format!("{}/{}", ROOT_PROP_NAME, expected);
        if top.name != expected || top.kind != PropKind::Object {
            return Err(GraphError::invalid_prop_tree(
                path,
                format!("expected object named {}", expected),
            ));
        }
        validate_prop_tree(top, &path)?;
    }

    for socket in &schema.sockets {
        let Some(prop_path) = &socket.prop_path else {
            continue;
        };
        let resolved = prop_path
            .split_first()
            .and_then(|(first, rest)| schema.top_level(first).map(|top| (top, rest)))
            .map(|(top, rest)| find_prop(top, rest));
        if !matches!(resolved, Some(Ok(_))) {
            return Err(GraphError::invalid_socket_source(
                &socket.name,
                format!("no prop at {} in schema {}", prop_path.join("/"), schema.schema_id),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "prop_graph_service_test.rs"]
mod prop_graph_service_test;
