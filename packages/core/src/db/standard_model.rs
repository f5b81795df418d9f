//! Standard Versioned Table Helpers
//!
//! Every graph table shares the same row layout:
//!
//! | column                     | meaning                                   |
//! |----------------------------|-------------------------------------------|
//! | `physical_id`              | row number, unique per physical version   |
//! | `id`                       | logical id shared across versions         |
//! | `tenancy_workspace_id`     | owning workspace                          |
//! | `visibility_change_set_id` | change set of this version (nil = head)   |
//! | `visibility_deleted_at`    | soft-delete timestamp                     |
//! | `created_at`, `updated_at` | RFC3339 timestamps with microseconds      |
//!
//! Queries never read a table directly. They read the `{table}_v` common table
//! expression built by [`visible_cte`], which applies the tenancy predicate and the
//! change-set visibility rule. The first three positional parameters of every
//! statement are bound by [`scoped_params`]:
//!
//! - `?1` workspace id
//! - `?2` change set of the scope
//! - `?3` head sentinel
//!
//! Query-specific parameters start at `?4`.

use crate::db::error::DatabaseError;
use crate::models::{ChangeSetId, Scope};
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::params::Params;
use libsql::{Connection, Value};

/// A versioned table and its data columns (name, SQL type)
pub struct StandardTable {
    pub name: &'static str,
    pub columns: &'static [(&'static str, &'static str)],
}

impl StandardTable {
    /// Data column names joined for SELECT/INSERT lists
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub const PROPS: StandardTable = StandardTable {
    name: "props",
    columns: &[
        ("name", "TEXT NOT NULL"),
        ("kind", "TEXT NOT NULL"),
        ("widget", "TEXT NOT NULL"),
        ("hidden", "INTEGER NOT NULL DEFAULT 0"),
        ("doc_link", "TEXT"),
        ("path", "TEXT NOT NULL"),
    ],
};

pub const PROP_BELONGS_TO_PROP: StandardTable = StandardTable {
    name: "prop_belongs_to_prop",
    columns: &[
        ("object_id", "TEXT NOT NULL"),
        ("belongs_to_id", "TEXT NOT NULL"),
        ("position", "INTEGER NOT NULL"),
    ],
};

pub const PROP_MANY_TO_MANY_SCHEMA_VARIANTS: StandardTable = StandardTable {
    name: "prop_many_to_many_schema_variants",
    columns: &[
        ("left_object_id", "TEXT NOT NULL"),
        ("right_object_id", "TEXT NOT NULL"),
    ],
};

pub const SCHEMA_VARIANTS: StandardTable = StandardTable {
    name: "schema_variants",
    columns: &[("schema_name", "TEXT NOT NULL"), ("name", "TEXT NOT NULL")],
};

pub const SOCKETS: StandardTable = StandardTable {
    name: "sockets",
    columns: &[
        ("schema_variant_id", "TEXT NOT NULL"),
        ("name", "TEXT NOT NULL"),
        ("kind", "TEXT NOT NULL"),
        ("arity", "TEXT NOT NULL"),
        ("prop_id", "TEXT"),
        ("input_provider_id", "TEXT"),
        ("output_provider_id", "TEXT"),
        ("annotations", "TEXT NOT NULL DEFAULT '[]'"),
        ("position", "INTEGER NOT NULL"),
    ],
};

pub const COMPONENTS: StandardTable = StandardTable {
    name: "components",
    columns: &[("name", "TEXT NOT NULL")],
};

pub const COMPONENT_BELONGS_TO_SCHEMA_VARIANT: StandardTable = StandardTable {
    name: "component_belongs_to_schema_variant",
    columns: &[
        ("object_id", "TEXT NOT NULL"),
        ("belongs_to_id", "TEXT NOT NULL"),
    ],
};

pub const ATTRIBUTE_VALUES: StandardTable = StandardTable {
    name: "attribute_values",
    columns: &[
        ("attribute_context_prop_id", "TEXT"),
        ("attribute_context_input_provider_id", "TEXT"),
        ("attribute_context_output_provider_id", "TEXT"),
        ("attribute_context_component_id", "TEXT"),
        ("value", "TEXT NOT NULL"),
    ],
};

/// All versioned tables, in creation order
pub const VERSIONED_TABLES: [&StandardTable; 8] = [
    &PROPS,
    &PROP_BELONGS_TO_PROP,
    &PROP_MANY_TO_MANY_SCHEMA_VARIANTS,
    &SCHEMA_VARIANTS,
    &SOCKETS,
    &COMPONENTS,
    &COMPONENT_BELONGS_TO_SCHEMA_VARIANT,
    &ATTRIBUTE_VALUES,
];

/// CREATE TABLE statement with the standard columns followed by the data columns
pub fn standard_table_sql(table: &StandardTable) -> String {
    let data_columns = table
        .columns
        .iter()
        .map(|(name, ty)| format!("{} {}", name, ty))
        .collect::<Vec<_>>()
        .join(",\n                ");

    format!(
        "CREATE TABLE IF NOT EXISTS {} (
                physical_id INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL,
                tenancy_workspace_id TEXT NOT NULL,
                visibility_change_set_id TEXT NOT NULL,
                visibility_deleted_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                {}
            )",
        table.name, data_columns
    )
}

/// `{table}_v AS (...)`: rows of `table` visible to the scope bound at `?1..?3`
///
/// A row is visible when it belongs to the scope's change set and is not
/// deleted, or when it is the head row, is not deleted, and the change set has
/// no version of its own for the same logical id. A deleted branch version
/// therefore hides the head row for that change set only.
pub fn visible_cte(table: &StandardTable) -> String {
    format!(
        "{t}_v AS (
            SELECT * FROM {t} r
            WHERE r.tenancy_workspace_id = ?1
              AND r.visibility_deleted_at IS NULL
              AND (r.visibility_change_set_id = ?2
                   OR (r.visibility_change_set_id = ?3
                       AND NOT EXISTS (
                           SELECT 1 FROM {t} b
                           WHERE b.tenancy_workspace_id = ?1
                             AND b.id = r.id
                             AND b.visibility_change_set_id = ?2)))
        )",
        t = table.name
    )
}

/// `WITH` clause declaring the visible CTE of each table
pub fn with_visible(tables: &[&StandardTable]) -> String {
    let ctes: Vec<String> = tables.iter().map(|t| visible_cte(t)).collect();
    format!("WITH {}", ctes.join(",\n"))
}

/// The three scope parameters followed by the statement's own parameters
pub fn scoped_params(scope: &Scope, extra: Vec<Value>) -> Params {
    let mut values = Vec::with_capacity(extra.len() + 3);
    values.push(text(scope.tenancy().workspace_id()));
    values.push(text(scope.change_set_id()));
    values.push(text(ChangeSetId::HEAD));
    values.extend(extra);
    Params::Positional(values)
}

pub fn text(value: impl ToString) -> Value {
    Value::Text(value.to_string())
}

pub fn optional_text<T: ToString>(value: Option<T>) -> Value {
    match value {
        Some(v) => Value::Text(v.to_string()),
        None => Value::Null,
    }
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(table: &'static str, raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::row_decode(table, format!("bad timestamp '{}': {}", raw, e)))
}

/// Parse a stored id column
pub fn parse_id<T>(table: &'static str, raw: &str) -> Result<T, DatabaseError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| DatabaseError::row_decode(table, format!("bad id '{}': {}", raw, e)))
}

pub fn parse_optional_id<T>(table: &'static str, raw: Option<String>) -> Result<Option<T>, DatabaseError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.as_deref().map(|r| parse_id(table, r)).transpose()
}

/// Start a write transaction that takes the write lock immediately
pub async fn begin_immediate(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute("BEGIN IMMEDIATE", ())
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e)))?;
    Ok(())
}

/// Commit on success, roll back on failure
pub async fn finish_transaction<T>(
    conn: &Connection,
    result: Result<T, DatabaseError>,
) -> Result<T, DatabaseError> {
    match result {
        Ok(value) => {
            conn.execute("COMMIT", ()).await.map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to commit transaction: {}", e))
            })?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = conn.execute("ROLLBACK", ()).await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

/// Physical row a write through `scope` must modify, branching it first if needed
///
/// Returns `None` when no version of `id` is visible. When the visible version
/// belongs to the scope's change set it is returned as is; otherwise the head
/// version is copied into the change set (copy-on-write) and the copy is
/// returned. Must run inside a write transaction.
pub async fn writable_row(
    conn: &Connection,
    scope: &Scope,
    table: &StandardTable,
    id: &str,
    now: &str,
) -> Result<Option<i64>, DatabaseError> {
    let sql = format!(
        "{} SELECT physical_id, visibility_change_set_id FROM {}_v WHERE id = ?4",
        with_visible(&[table]),
        table.name
    );
    let mut rows = conn
        .query(&sql, scoped_params(scope, vec![text(id)]))
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to look up visible {} row {}: {}",
                table.name, id, e
            ))
        })?;

    let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
    else {
        return Ok(None);
    };

    let physical_id: i64 = row.get(0)?;
    let change_set_id: String = row.get(1)?;
    if change_set_id == scope.change_set_id().to_string() {
        return Ok(Some(physical_id));
    }

    let columns = table.column_list();
    let insert = format!(
        "INSERT INTO {t} (id, tenancy_workspace_id, visibility_change_set_id,
                          visibility_deleted_at, created_at, updated_at, {c})
         SELECT id, tenancy_workspace_id, ?2, NULL, created_at, ?5, {c}
         FROM {t} WHERE physical_id = ?4 AND tenancy_workspace_id = ?1",
        t = table.name,
        c = columns
    );
    conn.execute(
        &insert,
        scoped_params(scope, vec![Value::Integer(physical_id), text(now)]),
    )
    .await
    .map_err(|e| {
        DatabaseError::sql_execution(format!(
            "Failed to branch {} row {}: {}",
            table.name, id, e
        ))
    })?;

    tracing::debug!(
        table = table.name,
        id,
        change_set_id = %scope.change_set_id(),
        "copied head row into change set"
    );

    Ok(Some(conn.last_insert_rowid()))
}
