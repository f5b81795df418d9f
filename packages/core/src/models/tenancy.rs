//! Tenancy and Visibility Addressing
//!
//! Every stored row lives at a coordinate made of:
//!
//! - **Tenancy**: the workspace the row belongs to. Reads never cross it.
//! - **Visibility**: the change set the row version belongs to (or head), plus an
//!   optional soft-delete timestamp.
//!
//! A [`Scope`] bundles both and is the first argument of every store operation.
//! The SQL layer derives its tenancy predicate from the scope, so there is no way
//! to issue a query that forgets it.
//!
//! # Visibility rule
//!
//! A row is visible at change set `C` when either:
//!
//! 1. its own change set is `C` and it is not soft-deleted, or
//! 2. no row for the same logical id exists in `C`, and the head row is not
//!    soft-deleted.
//!
//! Edits inside `C` insert a new physical row sharing the logical id
//! (copy-on-write); head rows are never touched from a branch.

use crate::models::{ChangeSetId, WorkspaceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workspace isolation boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tenancy {
    workspace_id: WorkspaceId,
}

impl Tenancy {
    pub fn new(workspace_id: WorkspaceId) -> Self {
        Self { workspace_id }
    }

    pub fn workspace_id(&self) -> WorkspaceId {
        self.workspace_id
    }
}

/// Change-set and soft-delete coordinate of a row version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    pub change_set_id: ChangeSetId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Visibility {
    /// Visibility of head, not deleted
    pub fn new_head() -> Self {
        Self {
            change_set_id: ChangeSetId::HEAD,
            deleted_at: None,
        }
    }

    /// Visibility of a change set branch, not deleted
    pub fn new_change_set(change_set_id: ChangeSetId) -> Self {
        Self {
            change_set_id,
            deleted_at: None,
        }
    }

    pub fn is_head(&self) -> bool {
        self.change_set_id.is_head()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// The (tenancy, visibility) pair every read and write is addressed with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    tenancy: Tenancy,
    change_set_id: ChangeSetId,
}

impl Scope {
    /// Scope reading and writing head rows of a workspace
    pub fn head(tenancy: Tenancy) -> Self {
        Self {
            tenancy,
            change_set_id: ChangeSetId::HEAD,
        }
    }

    /// Scope reading through a change set onto head
    pub fn for_change_set(tenancy: Tenancy, change_set_id: ChangeSetId) -> Self {
        Self {
            tenancy,
            change_set_id,
        }
    }

    pub fn tenancy(&self) -> Tenancy {
        self.tenancy
    }

    pub fn change_set_id(&self) -> ChangeSetId {
        self.change_set_id
    }

    /// Visibility assigned to rows written through this scope
    pub fn visibility(&self) -> Visibility {
        Visibility::new_change_set(self.change_set_id)
    }

    pub fn is_head(&self) -> bool {
        self.change_set_id.is_head()
    }

    /// Same tenancy, head visibility
    pub fn to_head(&self) -> Self {
        Self::head(self.tenancy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_visibility_follows_change_set() {
        let tenancy = Tenancy::new(WorkspaceId::generate());
        let change_set_id = ChangeSetId::generate();

        let head = Scope::head(tenancy);
        assert!(head.is_head());
        assert!(head.visibility().is_head());

        let branch = Scope::for_change_set(tenancy, change_set_id);
        assert!(!branch.is_head());
        assert_eq!(branch.visibility().change_set_id, change_set_id);
        assert!(!branch.visibility().is_deleted());
        assert_eq!(branch.to_head(), head);
    }
}
