//! Service Layer Error Types
//!
//! This module defines error types for service-layer operations, providing
//! detailed error handling for graph and resolution failures.

use crate::db::DatabaseError;
use crate::models::{AttributeContextError, StructuralCoordinate};
use thiserror::Error;

/// Graph service errors
///
/// Returned by `PropGraphService` and `AttributeService`. Storage failures are
/// chained from [`DatabaseError`]; an invalid stored context surfaces as
/// [`GraphError::InvalidContext`].
#[derive(Error, Debug)]
pub enum GraphError {
    /// Entity not visible in the requested scope
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Coordinate exists but has no value in any applicable context
    #[error("No value (not even a schema default) for {coordinate}")]
    MissingDefault { coordinate: StructuralCoordinate },

    /// Attribute context does not name exactly one structural coordinate
    #[error("Invalid attribute context: {0}")]
    InvalidContext(#[from] AttributeContextError),

    /// Parent prop cannot take the requested child
    #[error("Invalid parent prop {parent_id}: {reason}")]
    InvalidParent { parent_id: String, reason: String },

    /// A prop definition tree violates the structural rules
    #[error("Invalid prop tree at {path}: {reason}")]
    InvalidPropTree { path: String, reason: String },

    /// A socket references a prop outside its variant's tree
    #[error("Invalid source for socket {socket}: {reason}")]
    InvalidSocketSource { socket: String, reason: String },

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    Database(DatabaseError),
}

impl From<DatabaseError> for GraphError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::InvalidContext(inner) => Self::InvalidContext(inner),
            other => Self::Database(other),
        }
    }
}

impl GraphError {
    /// Create a not found error
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Create a missing default error
    pub fn missing_default(coordinate: StructuralCoordinate) -> Self {
        Self::MissingDefault { coordinate }
    }

    /// Create an invalid parent error
    pub fn invalid_parent(parent_id: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidParent {
            parent_id: parent_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an invalid prop tree error
    pub fn invalid_prop_tree(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPropTree {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid socket source error
    pub fn invalid_socket_source(socket: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSocketSource {
            socket: socket.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
