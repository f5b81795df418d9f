//! RDS Overrides

use crate::models::IngestedSchema;
use crate::services::override_registry::{OverrideError, OverrideRegistry};
use crate::services::schema_transform::{promote_to_secret, SecretPromotion};

pub const DB_INSTANCE_SCHEMA_ID: &str = "AWS::RDS::DBInstance";
pub const PASSWORD_KIND: &str = "Password";

pub fn register_overrides(registry: &mut OverrideRegistry) {
    registry.register(
        DB_INSTANCE_SCHEMA_ID,
        "promote_master_user_password",
        promote_master_user_password,
    );
}

/// The master password is supplied from a password secret
fn promote_master_user_password(
    schema: &IngestedSchema,
) -> Result<IngestedSchema, OverrideError> {
    let mut schema = schema.clone();
    promote_to_secret(
        &mut schema,
        &SecretPromotion::new(PASSWORD_KIND, "MasterUserPassword", "MasterUserPassword"),
    )?;
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PropSpec, PropUsageMap, Widget};

    #[test]
    fn test_master_password_moves_to_secrets() {
        let schema = IngestedSchema::new(DB_INSTANCE_SCHEMA_ID)
            .with_domain_prop(PropSpec::string("DBInstanceClass"))
            .with_domain_prop(PropSpec::string("MasterUserPassword"))
            .with_prop_usage_map(&PropUsageMap::default());

        let promoted = promote_master_user_password(&schema).unwrap();
        assert!(promoted.domain.child("MasterUserPassword").is_none());
        assert!(promoted.domain.child("DBInstanceClass").is_some());

        let secret = promoted.secrets.child("MasterUserPassword").unwrap();
        assert_eq!(
            secret.widget,
            Some(Widget::Secret {
                secret_kind: PASSWORD_KIND.to_string()
            })
        );
        assert_eq!(secret.path, vec!["root", "secrets", "MasterUserPassword"]);
    }

    #[test]
    fn test_missing_manifest_leaves_schema_alone() {
        let schema = IngestedSchema::new(DB_INSTANCE_SCHEMA_ID)
            .with_domain_prop(PropSpec::string("MasterUserPassword"));

        let err = promote_master_user_password(&schema).unwrap_err();
        assert!(matches!(err, OverrideError::MalformedUsageManifest(_)));
    }
}
