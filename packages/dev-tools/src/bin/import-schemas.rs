//! Import a schema catalog into a PropGraph database
//!
//! Reads a JSON array of ingested schemas, runs the built-in override routines
//! over it and materializes every schema as a schema variant at head.
//!
//! Usage: `import-schemas <catalog.json>`
//!
//! Environment:
//! - `PROPGRAPH_DB_PATH` / `PROPGRAPH_BUSY_TIMEOUT_MS`: store configuration
//! - `PROPGRAPH_WORKSPACE_ID`: target workspace (a fresh one when unset)
//! - `RUST_LOG`: log filter, `info` by default

use anyhow::{bail, Context, Result};
use propgraph_core::db::{DatabaseService, GraphStore, TursoStore};
use propgraph_core::models::{IngestedSchema, Scope, Tenancy, WorkspaceId};
use propgraph_core::services::{apply_overrides, default_registry, PropGraphService};
use propgraph_core::StoreConfig;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

fn workspace_from_env() -> Result<WorkspaceId> {
    match std::env::var("PROPGRAPH_WORKSPACE_ID") {
        Ok(raw) => {
            let uuid = Uuid::parse_str(raw.trim())
                .with_context(|| format!("PROPGRAPH_WORKSPACE_ID is not a UUID: {}", raw))?;
            Ok(WorkspaceId::from_uuid(uuid))
        }
        Err(_) => Ok(WorkspaceId::generate()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let Some(catalog_path) = std::env::args().nth(1) else {
        bail!("usage: import-schemas <catalog.json>");
    };

    let raw = std::fs::read_to_string(&catalog_path)
        .with_context(|| format!("failed to read {}", catalog_path))?;
    let schemas: Vec<IngestedSchema> =
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", catalog_path))?;
    tracing::info!(path = %catalog_path, schemas = schemas.len(), "loaded schema catalog");

    let outcome = apply_overrides(&default_registry(), schemas);
    for diagnostic in &outcome.diagnostics {
        tracing::warn!(
            schema_id = %diagnostic.schema_id,
            routine = diagnostic.routine,
            error = %diagnostic.error,
            "schema imported without override"
        );
    }

    let config = StoreConfig::from_env();
    let db = Arc::new(DatabaseService::with_config(&config).await?);
    let store: Arc<dyn GraphStore> = Arc::new(TursoStore::new(db));
    let graph = PropGraphService::new(store);

    let workspace_id = workspace_from_env()?;
    let scope = Scope::head(Tenancy::new(workspace_id));

    let mut imported = 0;
    for schema in &outcome.schemas {
        match graph.import_schema(&scope, schema).await {
            Ok(variant) => {
                imported += 1;
                tracing::debug!(
                    schema_id = %schema.schema_id,
                    variant_id = %variant.variant.id,
                    "imported"
                );
            }
            Err(e) => {
                tracing::error!(schema_id = %schema.schema_id, error = %e, "import failed");
            }
        }
    }

    tracing::info!(
        workspace_id = %workspace_id,
        imported,
        total = outcome.schemas.len(),
        skipped_overrides = outcome.diagnostics.len(),
        database = %config.database_path.display(),
        "schema import finished"
    );
    Ok(())
}
