//! Tests for prop tree writes, traversal and schema import
//!
//! Run against a real libsql store in a temp directory.

#[cfg(test)]
mod graph_tests {
    use crate::db::{DatabaseService, GraphStore, TursoStore};
    use crate::models::{
        IngestedSchema, PropKind, PropSpec, Scope, SocketArity, SocketKind, SocketSpec, Tenancy,
        WorkspaceId, Widget,
    };
    use crate::services::{GraphError, PropGraphService};
    use anyhow::Result;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Helper to create a service over a fresh store
    async fn create_test_service() -> Result<(PropGraphService, Arc<dyn GraphStore>, TempDir)> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(DatabaseService::new(db_path).await?);
        let store: Arc<dyn GraphStore> = Arc::new(TursoStore::new(db));
        Ok((PropGraphService::new(store.clone()), store, temp_dir))
    }

    fn head_scope() -> Scope {
        Scope::head(Tenancy::new(WorkspaceId::generate()))
    }

    fn route_schema() -> IngestedSchema {
        IngestedSchema::new("AWS::EC2::Route")
            .with_domain_prop(PropSpec::string("GatewayId"))
            .with_domain_prop(PropSpec::string("RouteTableId").with_default(json!("rtb-0")))
            .with_domain_prop(PropSpec::array(
                "Tags",
                PropSpec::object(
                    "Tag",
                    vec![PropSpec::string("Key"), PropSpec::string("Value")],
                ),
            ))
    }

    #[tokio::test]
    async fn test_import_builds_fixed_root_and_domain_tree() -> Result<()> {
        let (service, _store, _temp) = create_test_service().await?;
        let scope = head_scope();

        let imported = service.import_schema(&scope, &route_schema()).await?;
        assert_eq!(imported.variant.schema_name, "AWS::EC2::Route");

        let tree = service
            .descendant_tree(&scope, imported.root_prop.root)
            .await?;
        let top: Vec<&str> = tree.children.iter().map(|c| c.prop.name.as_str()).collect();
        assert_eq!(top, vec!["domain", "secrets", "resource", "extra"]);
        assert_eq!(tree.prop.widget, Widget::Header);

        let domain = tree.child("domain").unwrap();
        let names: Vec<&str> = domain.children.iter().map(|c| c.prop.name.as_str()).collect();
        assert_eq!(names, vec!["GatewayId", "RouteTableId", "Tags"]);

        let key = tree.descend(&["domain", "Tags", "Tag", "Key"]).unwrap();
        assert_eq!(key.prop.path, vec!["root", "domain", "Tags", "Tag", "Key"]);

        // root + 4 fixed + GatewayId, RouteTableId, Tags, Tag, Key, Value
        assert_eq!(tree.prop_count(), 11);
        Ok(())
    }

    #[tokio::test]
    async fn test_every_prop_has_a_parent_except_root() -> Result<()> {
        let (service, store, _temp) = create_test_service().await?;
        let scope = head_scope();
        let imported = service.import_schema(&scope, &route_schema()).await?;

        let tree = service
            .descendant_tree(&scope, imported.root_prop.root)
            .await?;
        for prop in tree.iter() {
            let parent = store.parent_prop_id(&scope, prop.id).await?;
            if prop.id == imported.root_prop.root {
                assert_eq!(parent, None);
            } else {
                assert!(parent.is_some(), "{} has no parent", prop.path_string());
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_hidden_props_are_left_out_of_the_tree() -> Result<()> {
        let (service, _store, _temp) = create_test_service().await?;
        let scope = head_scope();

        let schema = IngestedSchema::new("Acme::Thing")
            .with_domain_prop(PropSpec::string("Visible"))
            .with_domain_prop(
                PropSpec::object("Internal", vec![PropSpec::string("Nested")]).hidden(),
            );
        let imported = service.import_schema(&scope, &schema).await?;

        let domain = service
            .descendant_tree(&scope, imported.root_prop.domain)
            .await?;
        let names: Vec<&str> = domain.children.iter().map(|c| c.prop.name.as_str()).collect();
        assert_eq!(names, vec!["Visible"]);
        assert!(domain.iter().all(|p| p.name != "Nested"));

        // still reachable directly
        let internal = service
            .find_prop_by_path(&scope, imported.variant.id, &["domain", "Internal"])
            .await?;
        assert!(internal.hidden);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_child_prop_appends_in_order() -> Result<()> {
        let (service, _store, _temp) = create_test_service().await?;
        let scope = head_scope();
        let imported = service.import_schema(&scope, &route_schema()).await?;

        let created = service
            .create_child_prop(
                &scope,
                imported.root_prop.domain,
                &PropSpec::object("Spec", vec![PropSpec::string("Cidr")]),
            )
            .await?;
        assert_eq!(created.path, vec!["root", "domain", "Spec"]);

        let children = service
            .child_props(&scope, imported.root_prop.domain)
            .await?;
        assert_eq!(children.len(), 4);
        assert_eq!(children.last(), Some(&created.id));

        let cidr = service
            .find_prop_by_path(&scope, imported.variant.id, &["domain", "Spec", "Cidr"])
            .await?;
        assert_eq!(cidr.kind, PropKind::String);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_child_prop_rejects_bad_parents() -> Result<()> {
        let (service, _store, _temp) = create_test_service().await?;
        let scope = head_scope();
        let imported = service.import_schema(&scope, &route_schema()).await?;
        let variant_id = imported.variant.id;

        let gateway = service
            .find_prop_by_path(&scope, variant_id, &["domain", "GatewayId"])
            .await?;
        let err = service
            .create_child_prop(&scope, gateway.id, &PropSpec::string("Nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidParent { .. }));

        let tags = service
            .find_prop_by_path(&scope, variant_id, &["domain", "Tags"])
            .await?;
        let err = service
            .create_child_prop(&scope, tags.id, &PropSpec::string("Second"))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidParent { .. }));

        let err = service
            .create_child_prop(&scope, imported.root_prop.domain, &PropSpec::string("GatewayId"))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidParent { .. }));

        let bad_array = PropSpec::new("Empty", PropKind::Array);
        let err = service
            .create_child_prop(&scope, imported.root_prop.domain, &bad_array)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidPropTree { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_import_rejects_socket_outside_tree() -> Result<()> {
        let (service, _store, _temp) = create_test_service().await?;
        let scope = head_scope();

        let mut schema = route_schema();
        schema.sockets.push(SocketSpec {
            name: "VpcId".to_string(),
            kind: SocketKind::Input,
            arity: SocketArity::Many,
            prop_path: Some(vec!["domain".to_string(), "VpcId".to_string()]),
            annotations: BTreeSet::new(),
        });

        let err = service.import_schema(&scope, &schema).await.unwrap_err();
        assert!(matches!(err, GraphError::InvalidSocketSource { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_sockets_keep_annotations_and_source_prop() -> Result<()> {
        let (service, _store, _temp) = create_test_service().await?;
        let scope = head_scope();

        let mut schema = route_schema();
        schema.sockets.push(SocketSpec {
            name: "GatewayId".to_string(),
            kind: SocketKind::Input,
            arity: SocketArity::Many,
            prop_path: Some(vec!["domain".to_string(), "GatewayId".to_string()]),
            annotations: BTreeSet::from(["InternetGatewayId".to_string()]),
        });
        let imported = service.import_schema(&scope, &schema).await?;

        let sockets = service
            .sockets_for_variant(&scope, imported.variant.id)
            .await?;
        assert_eq!(sockets.len(), 1);
        assert!(sockets[0].has_annotation("InternetGatewayId"));
        assert!(!sockets[0].has_annotation("VPNGatewayId"));

        let gateway = service
            .find_prop_by_path(&scope, imported.variant.id, &["domain", "GatewayId"])
            .await?;
        assert_eq!(sockets[0].prop_id, Some(gateway.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_provider_root_for_component() -> Result<()> {
        let (service, _store, _temp) = create_test_service().await?;
        let scope = head_scope();
        let imported = service.import_schema(&scope, &route_schema()).await?;

        let component = service
            .create_component(&scope, "route-1", imported.variant.id)
            .await?;
        let root = service.provider_root_for(&scope, component.id).await?;
        assert_eq!(root, imported.root_prop.root);
        Ok(())
    }

    #[tokio::test]
    async fn test_writes_need_an_open_change_set() -> Result<()> {
        let (service, _store, _temp) = create_test_service().await?;
        let tenancy = Tenancy::new(WorkspaceId::generate());

        let unknown = Scope::for_change_set(tenancy, crate::models::ChangeSetId::generate());
        let err = service
            .import_schema(&unknown, &route_schema())
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let change_set = service.create_change_set(tenancy, "feature").await?;
        let scope = Scope::for_change_set(tenancy, change_set.id);
        service.import_schema(&scope, &route_schema()).await?;

        // a change set of another workspace is unknown here
        let foreign = Scope::for_change_set(Tenancy::new(WorkspaceId::generate()), change_set.id);
        let err = service
            .import_schema(&foreign, &route_schema())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_prop_is_not_found() -> Result<()> {
        let (service, _store, _temp) = create_test_service().await?;
        let scope = head_scope();
        let imported = service.import_schema(&scope, &route_schema()).await?;

        let err = service
            .find_prop_by_path(&scope, imported.variant.id, &["domain", "Missing"])
            .await
            .unwrap_err();
        match err {
            GraphError::NotFound { kind, id } => {
                assert_eq!(kind, "prop");
                assert_eq!(id, "domain/Missing");
            }
            other => panic!("unexpected error: {}", other),
        }
        Ok(())
    }
}
