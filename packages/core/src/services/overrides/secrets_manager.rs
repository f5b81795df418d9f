//! Secrets Manager Overrides
//!
//! `AWS::SecretsManager::Secret` carries its payload in
//! `domain.Secret.secretString`; it is promoted to the secrets tree so it is
//! fed from a secret of kind "Secret String" instead of a plain field.

use crate::models::IngestedSchema;
use crate::services::override_registry::{OverrideError, OverrideRegistry};
use crate::services::schema_transform::{promote_to_secret, SecretPromotion};

pub const SECRET_SCHEMA_ID: &str = "AWS::SecretsManager::Secret";
pub const SECRET_STRING_KIND: &str = "Secret String";

pub fn register_overrides(registry: &mut OverrideRegistry) {
    registry.register(SECRET_SCHEMA_ID, "promote_secret_string", promote_secret_string);
}

fn promote_secret_string(schema: &IngestedSchema) -> Result<IngestedSchema, OverrideError> {
    let mut schema = schema.clone();
    promote_to_secret(
        &mut schema,
        &SecretPromotion::new(SECRET_STRING_KIND, "secretString", "Secret.secretString"),
    )?;
    Ok(schema)
}
