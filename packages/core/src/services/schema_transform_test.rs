//! Tests for socket materialization and secret promotion

#[cfg(test)]
mod transform_tests {
    use crate::models::{
        IngestedSchema, PropKind, PropSpec, PropUsageMap, SocketArity, SocketKind, SocketSpec,
        Widget, PROP_USAGE_MAP_PROP_NAME,
    };
    use std::collections::BTreeSet;
    use crate::services::override_registry::OverrideError;
    use crate::services::schema_transform::*;
    use serde_json::json;

    fn secret_schema() -> IngestedSchema {
        let mut manifest = PropUsageMap::default();
        manifest.create_only.push("Name".to_string());
        manifest
            .other
            .insert("documentation".to_string(), json!("https://example.com"));

        IngestedSchema::new("AWS::SecretsManager::Secret")
            .with_domain_prop(PropSpec::string("Name"))
            .with_domain_prop(PropSpec::object(
                "Secret",
                vec![PropSpec::string("secretString"), PropSpec::string("KmsKeyId")],
            ))
            .with_prop_usage_map(&manifest)
    }

    fn manifest_of(schema: &IngestedSchema) -> PropUsageMap {
        let payload = schema
            .extra
            .child(PROP_USAGE_MAP_PROP_NAME)
            .and_then(|p| p.default_value.as_ref())
            .unwrap();
        PropUsageMap::from_payload(payload).unwrap()
    }

    #[test]
    fn test_find_prop_reports_why_it_missed() {
        let domain = secret_schema().domain;

        assert_eq!(find_prop::<&str>(&domain, &[]).unwrap().name, "domain");
        assert_eq!(
            find_prop(&domain, &["Secret", "KmsKeyId"]).unwrap().kind,
            PropKind::String
        );
        assert_eq!(
            find_prop(&domain, &["Secret", "Missing"]).unwrap_err(),
            LookupMiss::MissingSegment {
                segment: "Missing".to_string(),
                depth: 1
            }
        );
        assert!(matches!(
            find_prop(&domain, &["Name", "Deeper"]).unwrap_err(),
            LookupMiss::NotAnObject { depth: 1, .. }
        ));
    }

    #[test]
    fn test_materialize_socket_merges_annotations() {
        let mut schema = IngestedSchema::new("AWS::EC2::Route")
            .with_domain_prop(PropSpec::string("GatewayId"));

        materialize_socket(
            &mut schema,
            &SocketMaterialization::input("GatewayId").with_annotation("InternetGatewayId"),
        )
        .unwrap();
        materialize_socket(
            &mut schema,
            &SocketMaterialization::input("GatewayId").with_annotation("VPNGatewayId"),
        )
        .unwrap();

        assert_eq!(schema.sockets.len(), 1);
        let socket = &schema.sockets[0];
        assert_eq!(socket.kind, SocketKind::Input);
        assert_eq!(socket.arity, SocketArity::Many);
        let tokens: Vec<&str> = socket.annotations.iter().map(String::as_str).collect();
        assert_eq!(tokens, vec!["InternetGatewayId", "VPNGatewayId"]);
    }

    #[test]
    fn test_materialize_socket_needs_a_leaf() {
        let mut schema = secret_schema();
        let before = schema.clone();

        let err = materialize_socket(&mut schema, &SocketMaterialization::input("Secret"))
            .unwrap_err();
        assert!(matches!(err, OverrideError::InvalidOverrideTarget { .. }));

        let err = materialize_socket(&mut schema, &SocketMaterialization::input("Nope"))
            .unwrap_err();
        assert!(matches!(err, OverrideError::InvalidOverrideTarget { .. }));
        assert_eq!(schema, before);
    }

    #[test]
    fn test_promote_to_secret_moves_prop_and_records_it() {
        let mut schema = secret_schema();
        promote_to_secret(
            &mut schema,
            &SecretPromotion::new("Secret String", "secretString", "Secret.secretString"),
        )
        .unwrap();

        // gone from domain, sibling untouched
        let secret_obj = schema.domain.child("Secret").unwrap();
        assert!(secret_obj.child("secretString").is_none());
        assert!(secret_obj.child("KmsKeyId").is_some());

        // under secrets with a secret widget and rewritten path
        let promoted = schema.secrets.child("secretString").unwrap();
        assert_eq!(promoted.widget.as_ref().and_then(Widget::secret_kind), Some("Secret String"));
        assert_eq!(promoted.path[1], "secrets");

        // input socket tagged with the secret kind
        let socket = schema.socket("Secret String").unwrap();
        assert_eq!(socket.kind, SocketKind::Input);
        assert_eq!(socket.arity, SocketArity::One);
        assert!(socket.annotations.contains("Secret String"));
        assert_eq!(
            socket.prop_path,
            Some(vec!["secrets".to_string(), "secretString".to_string()])
        );

        // manifest gains the entry and keeps what it had
        let manifest = manifest_of(&schema);
        let usage = manifest.secret("secretString").unwrap();
        assert_eq!(usage.prop_path, vec!["Secret", "secretString"]);
        assert_eq!(manifest.create_only, vec!["Name"]);
        assert_eq!(manifest.other.get("documentation"), Some(&json!("https://example.com")));
    }

    #[test]
    fn test_promote_rewrites_descendant_paths() {
        let mut schema = IngestedSchema::new("Acme::Db")
            .with_domain_prop(PropSpec::object(
                "Credentials",
                vec![PropSpec::string("User"), PropSpec::string("Password")],
            ))
            .with_prop_usage_map(&PropUsageMap::default());

        promote_to_secret(
            &mut schema,
            &SecretPromotion::new("Credential", "credentials", "Credentials"),
        )
        .unwrap();

        let promoted = schema.secrets.child("Credentials").unwrap();
        assert_eq!(promoted.path, vec!["root", "secrets", "Credentials"]);
        assert_eq!(
            promoted.child("Password").unwrap().path,
            vec!["root", "secrets", "Credentials", "Password"]
        );
    }

    #[test]
    fn test_promote_leaves_schema_alone_on_failure() {
        // no manifest at all
        let mut schema = IngestedSchema::new("Acme::Db").with_domain_prop(PropSpec::string("Pw"));
        let before = schema.clone();
        let err = promote_to_secret(&mut schema, &SecretPromotion::new("Password", "pw", "Pw"))
            .unwrap_err();
        assert!(matches!(err, OverrideError::MalformedUsageManifest(_)));
        assert_eq!(schema, before);

        // manifest present but not JSON
        let mut schema = IngestedSchema::new("Acme::Db")
            .with_domain_prop(PropSpec::string("Pw"))
            .with_prop_usage_map(&PropUsageMap::default());
        if let Some(manifest) = schema.extra.child_mut(PROP_USAGE_MAP_PROP_NAME) {
            manifest.default_value = Some(json!("{not json"));
        }
        let before = schema.clone();
        let err = promote_to_secret(&mut schema, &SecretPromotion::new("Password", "pw", "Pw"))
            .unwrap_err();
        assert!(matches!(err, OverrideError::MalformedUsageManifest(_)));
        assert_eq!(schema, before);

        // target missing
        let mut schema = secret_schema();
        let before = schema.clone();
        let err = promote_to_secret(
            &mut schema,
            &SecretPromotion::new("Password", "pw", "Secret.Missing"),
        )
        .unwrap_err();
        assert_eq!(
            err,
            OverrideError::invalid_target(
                "domain.Secret.Missing",
                "no prop named 'Missing' at depth 1"
            )
        );
        assert_eq!(schema, before);
    }

    #[test]
    fn test_materialize_socket_keeps_other_kinds_apart() {
        let mut schema = IngestedSchema::new("AWS::EC2::Route")
            .with_domain_prop(PropSpec::string("GatewayId"));
        schema.sockets.push(SocketSpec {
            name: "GatewayId".to_string(),
            kind: SocketKind::Output,
            arity: SocketArity::Many,
            prop_path: Some(vec!["domain".to_string(), "GatewayId".to_string()]),
            annotations: BTreeSet::new(),
        });

        materialize_socket(
            &mut schema,
            &SocketMaterialization::input("GatewayId").with_annotation("InternetGatewayId"),
        )
        .unwrap();

        assert_eq!(schema.sockets.len(), 2);
        let output = schema.socket("GatewayId").unwrap();
        assert_eq!(output.kind, SocketKind::Output);
        assert!(output.annotations.is_empty());

        let input = schema
            .sockets
            .iter()
            .find(|s| s.kind == SocketKind::Input)
            .unwrap();
        assert_eq!(input.name, "GatewayId (input)");
        assert!(input.annotations.contains("InternetGatewayId"));

        // a second pass merges into the input socket it created
        materialize_socket(
            &mut schema,
            &SocketMaterialization::input("GatewayId").with_annotation("VPNGatewayId"),
        )
        .unwrap();
        assert_eq!(schema.sockets.len(), 2);
        let input = schema.socket("GatewayId (input)").unwrap();
        let tokens: Vec<&str> = input.annotations.iter().map(String::as_str).collect();
        assert_eq!(tokens, vec!["InternetGatewayId", "VPNGatewayId"]);
    }

    #[test]
    fn test_materialize_socket_ignores_same_name_from_other_prop() {
        let mut schema = IngestedSchema::new("Acme::Peering")
            .with_domain_prop(PropSpec::string("VpcId"))
            .with_domain_prop(PropSpec::object("Peer", vec![PropSpec::string("VpcId")]));

        materialize_socket(&mut schema, &SocketMaterialization::input("VpcId")).unwrap();
        materialize_socket(&mut schema, &SocketMaterialization::input("Peer.VpcId")).unwrap();

        let paths: Vec<Vec<String>> = schema
            .sockets
            .iter()
            .filter_map(|s| s.prop_path.clone())
            .collect();
        assert_eq!(
            paths,
            vec![
                vec!["domain".to_string(), "VpcId".to_string()],
                vec!["domain".to_string(), "Peer".to_string(), "VpcId".to_string()],
            ]
        );
        let names: BTreeSet<&str> = schema.sockets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_each_promoted_secret_gets_its_own_socket() {
        let mut schema = IngestedSchema::new("Acme::Db")
            .with_domain_prop(PropSpec::string("AdminPassword"))
            .with_domain_prop(PropSpec::string("ReplicaPassword"))
            .with_prop_usage_map(&PropUsageMap::default());

        promote_to_secret(
            &mut schema,
            &SecretPromotion::new("Password", "adminPassword", "AdminPassword"),
        )
        .unwrap();
        promote_to_secret(
            &mut schema,
            &SecretPromotion::new("Password", "replicaPassword", "ReplicaPassword"),
        )
        .unwrap();

        assert_eq!(schema.sockets.len(), 2);
        for (socket, prop) in schema.sockets.iter().zip(["AdminPassword", "ReplicaPassword"]) {
            assert_eq!(socket.kind, SocketKind::Input);
            assert!(socket.annotations.contains("Password"));
            assert_eq!(
                socket.prop_path,
                Some(vec!["secrets".to_string(), prop.to_string()])
            );
        }
        assert_ne!(schema.sockets[0].name, schema.sockets[1].name);
        assert_eq!(manifest_of(&schema).secrets.len(), 2);
    }

    #[test]
    fn test_promote_refuses_to_shadow_an_existing_secret() {
        let mut schema = secret_schema();
        schema.secrets.children.push(PropSpec::string("secretString"));
        let before = schema.clone();

        let err = promote_to_secret(
            &mut schema,
            &SecretPromotion::new("Secret String", "secretString", "Secret.secretString"),
        )
        .unwrap_err();
        assert_eq!(
            err,
            OverrideError::invalid_target(
                "domain.Secret.secretString",
                "secrets already has a prop named 'secretString'"
            )
        );
        assert_eq!(schema, before);
    }
}
