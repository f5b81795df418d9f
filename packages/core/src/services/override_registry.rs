//! Schema Override Registry
//!
//! Per-schema enrichment routines applied to freshly ingested schemas before
//! they are materialized.
//!
//! ## Architecture
//!
//! - **Explicit registry**: built once at startup and passed to
//!   [`apply_overrides`]; there is no global lookup
//! - **Pure routines**: `fn(&IngestedSchema) -> Result<IngestedSchema, _>`, so a
//!   failing routine cannot leave a half-modified schema behind
//! - **Never abort ingestion**: a routine that fails is skipped, its error is
//!   logged and returned as an [`OverrideDiagnostic`], and the run continues
//!
//! ## Example Usage
//!
//! ```no_run
//! # use propgraph_core::services::override_registry::{apply_overrides, OverrideRegistry};
//! # use propgraph_core::models::IngestedSchema;
//! let mut registry = OverrideRegistry::new();
//! registry.register("AWS::EC2::Route", "noop", |schema| Ok(schema.clone()));
//!
//! let outcome = apply_overrides(&registry, vec![IngestedSchema::new("AWS::EC2::Route")]);
//! assert!(outcome.diagnostics.is_empty());
//! ```

use crate::models::IngestedSchema;
use std::collections::HashMap;
use thiserror::Error;

/// Why an override routine was skipped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OverrideError {
    /// The routine's target path does not resolve
    #[error("Invalid override target {path}: {reason}")]
    InvalidOverrideTarget { path: String, reason: String },

    /// `extra.PropUsageMap` is absent or cannot be parsed
    #[error("Malformed PropUsageMap: {0}")]
    MalformedUsageManifest(String),
}

impl OverrideError {
    /// Create an invalid override target error
    pub fn invalid_target(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOverrideTarget {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Type alias for override routines
///
/// Routines are pure: they take the schema and return the enriched copy.
pub type OverrideRoutine = fn(&IngestedSchema) -> Result<IngestedSchema, OverrideError>;

/// A skipped routine, reported back to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideDiagnostic {
    pub schema_id: String,
    pub routine: &'static str,
    pub error: OverrideError,
}

/// Schemas after overrides, plus every skip that happened on the way
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideOutcome {
    pub schemas: Vec<IngestedSchema>,
    pub diagnostics: Vec<OverrideDiagnostic>,
}

/// Registry of override routines keyed by schema identifier
///
/// Routines registered for the same schema run in registration order.
#[derive(Default)]
pub struct OverrideRegistry {
    routines: HashMap<String, Vec<(&'static str, OverrideRoutine)>>,
}

impl OverrideRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named routine for a schema identifier
    pub fn register(
        &mut self,
        schema_id: impl Into<String>,
        name: &'static str,
        routine: OverrideRoutine,
    ) {
        self.routines
            .entry(schema_id.into())
            .or_default()
            .push((name, routine));
    }

    /// Routines for a schema, in registration order
    pub fn routines_for(&self, schema_id: &str) -> &[(&'static str, OverrideRoutine)] {
        self.routines
            .get(schema_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Schema identifiers with at least one routine
    pub fn schema_ids(&self) -> impl Iterator<Item = &str> {
        self.routines.keys().map(String::as_str)
    }
}

/// Run every registered routine over `schemas`
///
/// Schemas without routines pass through untouched, path metadata included.
/// Output order matches input order.
pub fn apply_overrides(
    registry: &OverrideRegistry,
    schemas: Vec<IngestedSchema>,
) -> OverrideOutcome {
    let mut diagnostics = Vec::new();
    let mut applied = Vec::with_capacity(schemas.len());

    for mut schema in schemas {
        for &(name, routine) in registry.routines_for(&schema.schema_id) {
            match routine(&schema) {
                Ok(next) => {
                    tracing::debug!(
                        schema_id = %schema.schema_id,
                        routine = name,
                        "applied override"
                    );
                    schema = next;
                }
                Err(error) => {
                    tracing::warn!(
                        schema_id = %schema.schema_id,
                        routine = name,
                        error = %error,
                        "skipped override routine"
                    );
                    diagnostics.push(OverrideDiagnostic {
                        schema_id: schema.schema_id.clone(),
                        routine: name,
                        error,
                    });
                }
            }
        }

        applied.push(schema);
    }

    OverrideOutcome {
        schemas: applied,
        diagnostics,
    }
}
