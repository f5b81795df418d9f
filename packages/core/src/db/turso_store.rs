//! TursoStore - libsql Implementation of GraphStore
//!
//! Implements [`GraphStore`] over the versioned tables created by
//! [`DatabaseService`]. Every read goes through the `{table}_v` visibility
//! expressions from [`standard_model`](crate::db::standard_model); writes that
//! touch more than one row run inside `BEGIN IMMEDIATE ... COMMIT` so concurrent
//! writers are serialized by SQLite rather than by in-process locks.
//!
//! # Examples
//!
//! ```rust,no_run
//! use propgraph_core::db::{DatabaseService, TursoStore};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Arc::new(DatabaseService::new("./data/propgraph.db".into()).await?);
//! let store = TursoStore::new(db);
//! # Ok(())
//! # }
//! ```

use crate::db::graph_store::{AttributeValueWrite, ContextMatch, GraphStore, PropClosureRow};
use crate::db::standard_model::{
    begin_immediate, finish_transaction, format_timestamp, optional_text, parse_id,
    parse_optional_id, parse_timestamp, scoped_params, text, visible_cte, with_visible,
    writable_row, StandardTable, ATTRIBUTE_VALUES, COMPONENTS,
    COMPONENT_BELONGS_TO_SCHEMA_VARIANT, PROPS, PROP_BELONGS_TO_PROP,
    PROP_MANY_TO_MANY_SCHEMA_VARIANTS, SCHEMA_VARIANTS, SOCKETS,
};
use crate::db::{DatabaseError, DatabaseService};
use crate::models::{
    AttributeContext, AttributeValue, AttributeValueId, ChangeSet, ChangeSetId, ChangeSetStatus,
    Component, ComponentId, Prop, PropId, PropKind, SchemaVariant, SchemaVariantId, Scope,
    Socket, SocketArity, SocketKind, SocketProvider, StructuralCoordinate, Tenancy, Visibility,
    Widget,
};
use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Row, Rows, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

const PROP_COLUMNS: &str = "p.id, p.name, p.kind, p.widget, p.hidden, p.doc_link, p.path";

const SOCKET_COLUMNS: &str = "s.id, s.schema_variant_id, s.name, s.kind, s.arity, s.prop_id,
     s.input_provider_id, s.output_provider_id, s.annotations";

const ATTRIBUTE_VALUE_COLUMNS: &str = "a.physical_id, a.id, a.visibility_change_set_id,
     a.visibility_deleted_at, a.created_at, a.updated_at, a.attribute_context_prop_id,
     a.attribute_context_input_provider_id, a.attribute_context_output_provider_id,
     a.attribute_context_component_id, a.value";

/// libsql-backed graph store
pub struct TursoStore {
    db: Arc<DatabaseService>,
}

impl TursoStore {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Run a scoped query and return its rows
    async fn query_scoped(
        conn: &Connection,
        scope: &Scope,
        sql: &str,
        extra: Vec<Value>,
        what: &str,
    ) -> Result<Rows, DatabaseError> {
        conn.query(sql, scoped_params(scope, extra))
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to query {}: {}", what, e)))
    }

    async fn next_row(rows: &mut Rows) -> Result<Option<Row>, DatabaseError> {
        rows.next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))
    }

    /// Insert a new version of `id` into `table` at the scope's visibility
    async fn insert_row(
        conn: &Connection,
        scope: &Scope,
        table: &StandardTable,
        id: &str,
        data: Vec<Value>,
    ) -> Result<i64, DatabaseError> {
        let placeholders = (0..data.len())
            .map(|i| format!("?{}", i + 6))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} (id, tenancy_workspace_id, visibility_change_set_id,
                             visibility_deleted_at, created_at, updated_at, {})
             VALUES (?4, ?1, ?2, NULL, ?5, ?5, {})",
            table.name,
            table.column_list(),
            placeholders
        );

        let mut extra = vec![text(id), text(format_timestamp(&Utc::now()))];
        extra.extend(data);

        conn.execute(&sql, scoped_params(scope, extra))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!(
                    "Failed to insert {} row {}: {}",
                    table.name, id, e
                ))
            })?;

        Ok(conn.last_insert_rowid())
    }

    /// Next sibling position among visible rows of `table` grouped by `column`
    async fn next_position(
        conn: &Connection,
        scope: &Scope,
        table: &StandardTable,
        column: &str,
        group: &str,
    ) -> Result<i64, DatabaseError> {
        let sql = format!(
            "{} SELECT COALESCE(MAX(position), -1) + 1 FROM {}_v WHERE {} = ?4",
            with_visible(&[table]),
            table.name,
            column
        );
        let mut rows =
            Self::query_scoped(conn, scope, &sql, vec![text(group)], "next position").await?;
        match Self::next_row(&mut rows).await? {
            Some(row) => Ok(row.get::<i64>(0)?),
            None => Ok(0),
        }
    }

    /// Collect the first column of every row as an id
    async fn collect_ids<T>(mut rows: Rows, table: &'static str) -> Result<Vec<T>, DatabaseError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let mut ids = Vec::new();
        while let Some(row) = Self::next_row(&mut rows).await? {
            let raw: String = row.get(0)?;
            ids.push(parse_id(table, &raw)?);
        }
        Ok(ids)
    }

    /// Convert a row selected with [`PROP_COLUMNS`] (starting at column 0)
    fn row_to_prop(row: &Row) -> Result<Prop, DatabaseError> {
        let id: String = row.get(0)?;
        let name: String = row.get(1)?;
        let kind: String = row.get(2)?;
        let widget: String = row.get(3)?;
        let hidden: i64 = row.get(4)?;
        let doc_link: Option<String> = row.get(5)?;
        let path: String = row.get(6)?;

        Ok(Prop {
            id: parse_id("props", &id)?,
            name,
            kind: kind
                .parse::<PropKind>()
                .map_err(|e| DatabaseError::row_decode("props", e))?,
            widget: serde_json::from_str::<Widget>(&widget)
                .map_err(|e| DatabaseError::row_decode("props", format!("widget: {}", e)))?,
            hidden: hidden != 0,
            doc_link,
            path: serde_json::from_str(&path)
                .map_err(|e| DatabaseError::row_decode("props", format!("path: {}", e)))?,
        })
    }

    fn row_to_socket(row: &Row) -> Result<Socket, DatabaseError> {
        let id: String = row.get(0)?;
        let schema_variant_id: String = row.get(1)?;
        let name: String = row.get(2)?;
        let kind: String = row.get(3)?;
        let arity: String = row.get(4)?;
        let prop_id: Option<String> = row.get(5)?;
        let input_provider_id: Option<String> = row.get(6)?;
        let output_provider_id: Option<String> = row.get(7)?;
        let annotations: String = row.get(8)?;

        let kind = kind
            .parse::<SocketKind>()
            .map_err(|e| DatabaseError::row_decode("sockets", e))?;
        let provider = match kind {
            SocketKind::Input => parse_optional_id("sockets", input_provider_id)?
                .map(SocketProvider::Input),
            SocketKind::Output => parse_optional_id("sockets", output_provider_id)?
                .map(SocketProvider::Output),
        }
        .ok_or_else(|| {
            DatabaseError::row_decode("sockets", format!("{} socket {} has no provider", kind, id))
        })?;

        Ok(Socket {
            id: parse_id("sockets", &id)?,
            schema_variant_id: parse_id("sockets", &schema_variant_id)?,
            name,
            kind,
            arity: arity
                .parse::<SocketArity>()
                .map_err(|e| DatabaseError::row_decode("sockets", e))?,
            prop_id: parse_optional_id("sockets", prop_id)?,
            provider,
            annotations: serde_json::from_str::<BTreeSet<String>>(&annotations).map_err(|e| {
                DatabaseError::row_decode("sockets", format!("annotations: {}", e))
            })?,
        })
    }

    fn row_to_attribute_value(row: &Row) -> Result<AttributeValue, DatabaseError> {
        const TABLE: &str = "attribute_values";

        let physical_id: i64 = row.get(0)?;
        let id: String = row.get(1)?;
        let change_set_id: String = row.get(2)?;
        let deleted_at: Option<String> = row.get(3)?;
        let created_at: String = row.get(4)?;
        let updated_at: String = row.get(5)?;
        let prop_id: Option<String> = row.get(6)?;
        let input_provider_id: Option<String> = row.get(7)?;
        let output_provider_id: Option<String> = row.get(8)?;
        let component_id: Option<String> = row.get(9)?;
        let value: String = row.get(10)?;

        let context = AttributeContext::from_parts(
            parse_optional_id(TABLE, prop_id)?,
            parse_optional_id(TABLE, input_provider_id)?,
            parse_optional_id(TABLE, output_provider_id)?,
            parse_optional_id(TABLE, component_id)?,
        )?;

        Ok(AttributeValue {
            id: parse_id(TABLE, &id)?,
            context,
            value: serde_json::from_str(&value)
                .map_err(|e| DatabaseError::row_decode(TABLE, format!("value: {}", e)))?,
            visibility: Visibility {
                change_set_id: parse_id::<ChangeSetId>(TABLE, &change_set_id)?,
                deleted_at: deleted_at
                    .as_deref()
                    .map(|raw| parse_timestamp(TABLE, raw))
                    .transpose()?,
            },
            created_at: parse_timestamp(TABLE, &created_at)?,
            updated_at: parse_timestamp(TABLE, &updated_at)?,
            physical_id,
        })
    }

    /// Read back one attribute value version by physical row
    async fn attribute_value_by_physical_id(
        conn: &Connection,
        tenancy: Tenancy,
        physical_id: i64,
    ) -> Result<AttributeValue, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM attribute_values a
             WHERE a.physical_id = ?1 AND a.tenancy_workspace_id = ?2",
            ATTRIBUTE_VALUE_COLUMNS
        );
        let mut rows = conn
            .query(
                &sql,
                libsql::params::Params::Positional(vec![
                    Value::Integer(physical_id),
                    text(tenancy.workspace_id()),
                ]),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to read attribute value: {}", e))
            })?;

        let row = Self::next_row(&mut rows).await?.ok_or_else(|| {
            DatabaseError::sql_execution(format!(
                "attribute value row {} vanished after write",
                physical_id
            ))
        })?;
        Self::row_to_attribute_value(&row)
    }
}

#[async_trait]
impl GraphStore for TursoStore {
    async fn create_change_set(
        &self,
        tenancy: Tenancy,
        change_set: &ChangeSet,
    ) -> Result<(), DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        conn.execute(
            "INSERT INTO change_sets (id, tenancy_workspace_id, name, status, created_at)
             VALUES (?, ?, ?, ?, ?)",
            (
                change_set.id.to_string(),
                tenancy.workspace_id().to_string(),
                change_set.name.as_str(),
                change_set.status.as_str(),
                format_timestamp(&change_set.created_at),
            ),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create change set {}: {}",
                change_set.id, e
            ))
        })?;
        Ok(())
    }

    async fn get_change_set(
        &self,
        tenancy: Tenancy,
        id: ChangeSetId,
    ) -> Result<Option<ChangeSet>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let mut rows = conn
            .query(
                "SELECT id, name, status, created_at FROM change_sets
                 WHERE id = ? AND tenancy_workspace_id = ?",
                (id.to_string(), tenancy.workspace_id().to_string()),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to query change set: {}", e))
            })?;

        let Some(row) = Self::next_row(&mut rows).await? else {
            return Ok(None);
        };

        let raw_id: String = row.get(0)?;
        let name: String = row.get(1)?;
        let status: String = row.get(2)?;
        let created_at: String = row.get(3)?;

        let status = match status.as_str() {
            "open" => ChangeSetStatus::Open,
            other => {
                return Err(DatabaseError::row_decode(
                    "change_sets",
                    format!("unknown status '{}'", other),
                ))
            }
        };

        Ok(Some(ChangeSet {
            id: parse_id("change_sets", &raw_id)?,
            name,
            status,
            created_at: parse_timestamp("change_sets", &created_at)?,
        }))
    }

    async fn insert_prop(&self, scope: &Scope, prop: &Prop) -> Result<(), DatabaseError> {
        let widget = serde_json::to_string(&prop.widget)
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to encode widget: {}", e)))?;
        let path = serde_json::to_string(&prop.path)
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to encode path: {}", e)))?;

        let conn = self.db.connect_with_timeout().await?;
        Self::insert_row(
            &conn,
            scope,
            &PROPS,
            &prop.id.to_string(),
            vec![
                text(&prop.name),
                text(prop.kind),
                Value::Text(widget),
                Value::Integer(prop.hidden as i64),
                optional_text(prop.doc_link.as_deref()),
                Value::Text(path),
            ],
        )
        .await?;
        Ok(())
    }

    async fn get_prop(&self, scope: &Scope, id: PropId) -> Result<Option<Prop>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "{} SELECT {} FROM props_v p WHERE p.id = ?4",
            with_visible(&[&PROPS]),
            PROP_COLUMNS
        );
        let mut rows = Self::query_scoped(&conn, scope, &sql, vec![text(id)], "prop").await?;
        match Self::next_row(&mut rows).await? {
            Some(row) => Ok(Some(Self::row_to_prop(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert_prop_edge(
        &self,
        scope: &Scope,
        child: PropId,
        parent: PropId,
    ) -> Result<(), DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        begin_immediate(&conn).await?;

        let result: Result<(), DatabaseError> = async {
            let parent_key = parent.to_string();
            let position = Self::next_position(
                &conn,
                scope,
                &PROP_BELONGS_TO_PROP,
                "belongs_to_id",
                &parent_key,
            )
            .await?;
            Self::insert_row(
                &conn,
                scope,
                &PROP_BELONGS_TO_PROP,
                &Uuid::new_v4().to_string(),
                vec![text(child), text(parent), Value::Integer(position)],
            )
            .await?;
            Ok(())
        }
        .await;

        finish_transaction(&conn, result).await
    }

    async fn parent_prop_id(
        &self,
        scope: &Scope,
        child: PropId,
    ) -> Result<Option<PropId>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "{} SELECT e.belongs_to_id FROM prop_belongs_to_prop_v e
             WHERE e.object_id = ?4 ORDER BY e.physical_id LIMIT 1",
            with_visible(&[&PROP_BELONGS_TO_PROP])
        );
        let rows = Self::query_scoped(&conn, scope, &sql, vec![text(child)], "parent prop").await?;
        Ok(Self::collect_ids(rows, "prop_belongs_to_prop")
            .await?
            .into_iter()
            .next())
    }

    async fn child_prop_ids(
        &self,
        scope: &Scope,
        parent: PropId,
    ) -> Result<Vec<PropId>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "{} SELECT e.object_id FROM prop_belongs_to_prop_v e
             JOIN props_v p ON p.id = e.object_id
             WHERE e.belongs_to_id = ?4
             ORDER BY e.position, e.physical_id",
            with_visible(&[&PROPS, &PROP_BELONGS_TO_PROP])
        );
        let rows =
            Self::query_scoped(&conn, scope, &sql, vec![text(parent)], "child props").await?;
        Self::collect_ids(rows, "prop_belongs_to_prop").await
    }

    async fn prop_closure(
        &self,
        scope: &Scope,
        root: PropId,
    ) -> Result<Vec<PropClosureRow>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;

        // UNION (not UNION ALL) stops the fixpoint if the edge data ever loops
        let sql = format!(
            "WITH RECURSIVE {props}, {edges},
             closure(prop_id, parent_id, position) AS (
                 SELECT p.id, NULL, 0 FROM props_v p WHERE p.id = ?4
                 UNION
                 SELECT e.object_id, e.belongs_to_id, e.position
                 FROM prop_belongs_to_prop_v e
                 JOIN closure c ON e.belongs_to_id = c.prop_id
                 JOIN props_v child ON child.id = e.object_id
                 WHERE child.hidden = 0
             )
             SELECT {columns}, c.parent_id, c.position
             FROM closure c JOIN props_v p ON p.id = c.prop_id
             ORDER BY c.position",
            props = visible_cte(&PROPS),
            edges = visible_cte(&PROP_BELONGS_TO_PROP),
            columns = PROP_COLUMNS
        );

        let mut rows =
            Self::query_scoped(&conn, scope, &sql, vec![text(root)], "prop closure").await?;

        let mut closure = Vec::new();
        while let Some(row) = Self::next_row(&mut rows).await? {
            let parent_id: Option<String> = row.get(7)?;
            closure.push(PropClosureRow {
                prop: Self::row_to_prop(&row)?,
                parent_id: parse_optional_id("prop_belongs_to_prop", parent_id)?,
                position: row.get(8)?,
            });
        }
        Ok(closure)
    }

    async fn insert_schema_variant(
        &self,
        scope: &Scope,
        variant: &SchemaVariant,
    ) -> Result<(), DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        Self::insert_row(
            &conn,
            scope,
            &SCHEMA_VARIANTS,
            &variant.id.to_string(),
            vec![text(&variant.schema_name), text(&variant.name)],
        )
        .await?;
        Ok(())
    }

    async fn get_schema_variant(
        &self,
        scope: &Scope,
        id: SchemaVariantId,
    ) -> Result<Option<SchemaVariant>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "{} SELECT v.id, v.schema_name, v.name FROM schema_variants_v v WHERE v.id = ?4",
            with_visible(&[&SCHEMA_VARIANTS])
        );
        let mut rows =
            Self::query_scoped(&conn, scope, &sql, vec![text(id)], "schema variant").await?;
        let Some(row) = Self::next_row(&mut rows).await? else {
            return Ok(None);
        };
        let raw_id: String = row.get(0)?;
        Ok(Some(SchemaVariant {
            id: parse_id("schema_variants", &raw_id)?,
            schema_name: row.get(1)?,
            name: row.get(2)?,
        }))
    }

    async fn attach_root_prop(
        &self,
        scope: &Scope,
        prop_id: PropId,
        variant_id: SchemaVariantId,
    ) -> Result<(), DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        Self::insert_row(
            &conn,
            scope,
            &PROP_MANY_TO_MANY_SCHEMA_VARIANTS,
            &Uuid::new_v4().to_string(),
            vec![text(prop_id), text(variant_id)],
        )
        .await?;
        Ok(())
    }

    async fn root_prop_ids_for_variant(
        &self,
        scope: &Scope,
        variant_id: SchemaVariantId,
    ) -> Result<Vec<PropId>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "{} SELECT m.left_object_id FROM prop_many_to_many_schema_variants_v m
             JOIN props_v p ON p.id = m.left_object_id
             WHERE m.right_object_id = ?4
             ORDER BY m.physical_id",
            with_visible(&[&PROPS, &PROP_MANY_TO_MANY_SCHEMA_VARIANTS])
        );
        let rows =
            Self::query_scoped(&conn, scope, &sql, vec![text(variant_id)], "root props").await?;
        Self::collect_ids(rows, "prop_many_to_many_schema_variants").await
    }

    async fn insert_socket(&self, scope: &Scope, socket: &Socket) -> Result<(), DatabaseError> {
        let annotations = serde_json::to_string(&socket.annotations).map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to encode annotations: {}", e))
        })?;
        let (input_provider_id, output_provider_id) = match socket.provider {
            SocketProvider::Input(id) => (text(id), Value::Null),
            SocketProvider::Output(id) => (Value::Null, text(id)),
        };

        let conn = self.db.connect_with_timeout().await?;
        begin_immediate(&conn).await?;

        let result: Result<(), DatabaseError> = async {
            let variant_key = socket.schema_variant_id.to_string();
            let position = Self::next_position(
                &conn,
                scope,
                &SOCKETS,
                "schema_variant_id",
                &variant_key,
            )
            .await?;
            Self::insert_row(
                &conn,
                scope,
                &SOCKETS,
                &socket.id.to_string(),
                vec![
                    text(socket.schema_variant_id),
                    text(&socket.name),
                    text(socket.kind.as_str()),
                    text(socket.arity.as_str()),
                    optional_text(socket.prop_id),
                    input_provider_id,
                    output_provider_id,
                    Value::Text(annotations),
                    Value::Integer(position),
                ],
            )
            .await?;
            Ok(())
        }
        .await;

        finish_transaction(&conn, result).await
    }

    async fn sockets_for_variant(
        &self,
        scope: &Scope,
        variant_id: SchemaVariantId,
    ) -> Result<Vec<Socket>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "{} SELECT {} FROM sockets_v s WHERE s.schema_variant_id = ?4
             ORDER BY s.position, s.physical_id",
            with_visible(&[&SOCKETS]),
            SOCKET_COLUMNS
        );
        let mut rows =
            Self::query_scoped(&conn, scope, &sql, vec![text(variant_id)], "sockets").await?;

        let mut sockets = Vec::new();
        while let Some(row) = Self::next_row(&mut rows).await? {
            sockets.push(Self::row_to_socket(&row)?);
        }
        Ok(sockets)
    }

    async fn insert_component(
        &self,
        scope: &Scope,
        component: &Component,
        variant_id: SchemaVariantId,
    ) -> Result<(), DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        begin_immediate(&conn).await?;

        let result: Result<(), DatabaseError> = async {
            Self::insert_row(
                &conn,
                scope,
                &COMPONENTS,
                &component.id.to_string(),
                vec![text(&component.name)],
            )
            .await?;
            Self::insert_row(
                &conn,
                scope,
                &COMPONENT_BELONGS_TO_SCHEMA_VARIANT,
                &Uuid::new_v4().to_string(),
                vec![text(component.id), text(variant_id)],
            )
            .await?;
            Ok(())
        }
        .await;

        finish_transaction(&conn, result).await
    }

    async fn get_component(
        &self,
        scope: &Scope,
        id: ComponentId,
    ) -> Result<Option<Component>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "{} SELECT c.id, c.name FROM components_v c WHERE c.id = ?4",
            with_visible(&[&COMPONENTS])
        );
        let mut rows = Self::query_scoped(&conn, scope, &sql, vec![text(id)], "component").await?;
        let Some(row) = Self::next_row(&mut rows).await? else {
            return Ok(None);
        };
        let raw_id: String = row.get(0)?;
        Ok(Some(Component {
            id: parse_id("components", &raw_id)?,
            name: row.get(1)?,
        }))
    }

    async fn schema_variant_id_for_component(
        &self,
        scope: &Scope,
        id: ComponentId,
    ) -> Result<Option<SchemaVariantId>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "{} SELECT b.belongs_to_id FROM component_belongs_to_schema_variant_v b
             WHERE b.object_id = ?4 ORDER BY b.physical_id LIMIT 1",
            with_visible(&[&COMPONENT_BELONGS_TO_SCHEMA_VARIANT])
        );
        let rows =
            Self::query_scoped(&conn, scope, &sql, vec![text(id)], "component variant").await?;
        Ok(Self::collect_ids(rows, "component_belongs_to_schema_variant")
            .await?
            .into_iter()
            .next())
    }

    async fn provider_root_prop_id(
        &self,
        scope: &Scope,
        component_id: ComponentId,
    ) -> Result<Option<PropId>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "{} SELECT m.left_object_id
             FROM component_belongs_to_schema_variant_v b
             JOIN schema_variants_v v ON v.id = b.belongs_to_id
             JOIN prop_many_to_many_schema_variants_v m ON m.right_object_id = v.id
             JOIN props_v p ON p.id = m.left_object_id
             WHERE b.object_id = ?4
             ORDER BY m.physical_id
             LIMIT 1",
            with_visible(&[
                &COMPONENT_BELONGS_TO_SCHEMA_VARIANT,
                &SCHEMA_VARIANTS,
                &PROP_MANY_TO_MANY_SCHEMA_VARIANTS,
                &PROPS,
            ])
        );
        let rows =
            Self::query_scoped(&conn, scope, &sql, vec![text(component_id)], "provider root")
                .await?;
        Ok(Self::collect_ids(rows, "prop_many_to_many_schema_variants")
            .await?
            .into_iter()
            .next())
    }

    async fn coordinate_exists(
        &self,
        scope: &Scope,
        coordinate: &StructuralCoordinate,
    ) -> Result<bool, DatabaseError> {
        let (table, column) = match coordinate {
            StructuralCoordinate::Prop(_) => (&PROPS, "id"),
            StructuralCoordinate::InputProvider(_) => (&SOCKETS, "input_provider_id"),
            StructuralCoordinate::OutputProvider(_) => (&SOCKETS, "output_provider_id"),
        };
        let id = coordinate.id_string();

        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "{} SELECT 1 FROM {}_v WHERE {} = ?4 LIMIT 1",
            with_visible(&[table]),
            table.name,
            column
        );
        let mut rows = Self::query_scoped(&conn, scope, &sql, vec![text(id)], "coordinate").await?;
        Ok(Self::next_row(&mut rows).await?.is_some())
    }

    async fn insert_attribute_value(
        &self,
        scope: &Scope,
        id: AttributeValueId,
        context: &AttributeContext,
        value: &serde_json::Value,
    ) -> Result<AttributeValue, DatabaseError> {
        let encoded = serde_json::to_string(value)
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to encode value: {}", e)))?;

        let conn = self.db.connect_with_timeout().await?;
        let physical_id = Self::insert_row(
            &conn,
            scope,
            &ATTRIBUTE_VALUES,
            &id.to_string(),
            vec![
                optional_text(context.prop_id()),
                optional_text(context.input_provider_id()),
                optional_text(context.output_provider_id()),
                optional_text(context.component_id),
                Value::Text(encoded),
            ],
        )
        .await?;

        Self::attribute_value_by_physical_id(&conn, scope.tenancy(), physical_id).await
    }

    async fn get_attribute_value(
        &self,
        scope: &Scope,
        id: AttributeValueId,
    ) -> Result<Option<AttributeValue>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "{} SELECT {} FROM attribute_values_v a WHERE a.id = ?4",
            with_visible(&[&ATTRIBUTE_VALUES]),
            ATTRIBUTE_VALUE_COLUMNS
        );
        let mut rows =
            Self::query_scoped(&conn, scope, &sql, vec![text(id)], "attribute value").await?;
        match Self::next_row(&mut rows).await? {
            Some(row) => Ok(Some(Self::row_to_attribute_value(&row)?)),
            None => Ok(None),
        }
    }

    async fn write_attribute_value(
        &self,
        scope: &Scope,
        id: AttributeValueId,
        write: AttributeValueWrite,
    ) -> Result<Option<AttributeValue>, DatabaseError> {
        let now = format_timestamp(&Utc::now());
        let conn = self.db.connect_with_timeout().await?;
        begin_immediate(&conn).await?;

        let result: Result<Option<AttributeValue>, DatabaseError> = async {
            let Some(physical_id) =
                writable_row(&conn, scope, &ATTRIBUTE_VALUES, &id.to_string(), &now).await?
            else {
                return Ok(None);
            };

            let (sql, params) = match &write {
                AttributeValueWrite::Set(value) => {
                    let encoded = serde_json::to_string(value).map_err(|e| {
                        DatabaseError::sql_execution(format!("Failed to encode value: {}", e))
                    })?;
                    (
                        "UPDATE attribute_values SET value = ?1, updated_at = ?2
                         WHERE physical_id = ?3",
                        vec![Value::Text(encoded), text(&now), Value::Integer(physical_id)],
                    )
                }
                AttributeValueWrite::Delete => (
                    "UPDATE attribute_values SET visibility_deleted_at = ?1, updated_at = ?2
                     WHERE physical_id = ?3",
                    vec![text(&now), text(&now), Value::Integer(physical_id)],
                ),
            };

            conn.execute(sql, libsql::params::Params::Positional(params))
                .await
                .map_err(|e| {
                    DatabaseError::sql_execution(format!(
                        "Failed to write attribute value {}: {}",
                        id, e
                    ))
                })?;

            Self::attribute_value_by_physical_id(&conn, scope.tenancy(), physical_id)
                .await
                .map(Some)
        }
        .await;

        finish_transaction(&conn, result).await
    }

    async fn attribute_values_for_context(
        &self,
        scope: &Scope,
        context: &AttributeContext,
        mode: ContextMatch,
    ) -> Result<Vec<AttributeValue>, DatabaseError> {
        let structural = match context.coordinate {
            StructuralCoordinate::Prop(_) => {
                "a.attribute_context_prop_id = ?4
                 AND a.attribute_context_input_provider_id IS NULL
                 AND a.attribute_context_output_provider_id IS NULL"
            }
            StructuralCoordinate::InputProvider(_) => {
                "a.attribute_context_input_provider_id = ?4
                 AND a.attribute_context_prop_id IS NULL
                 AND a.attribute_context_output_provider_id IS NULL"
            }
            StructuralCoordinate::OutputProvider(_) => {
                "a.attribute_context_output_provider_id = ?4
                 AND a.attribute_context_prop_id IS NULL
                 AND a.attribute_context_input_provider_id IS NULL"
            }
        };
        let component = match mode {
            ContextMatch::Exact => "a.attribute_context_component_id IS ?5",
            ContextMatch::ResolutionCandidates => {
                "(a.attribute_context_component_id IS NULL
                  OR a.attribute_context_component_id = ?5)"
            }
        };

        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "{} SELECT {} FROM attribute_values_v a
             WHERE {} AND {}
             ORDER BY a.physical_id",
            with_visible(&[&ATTRIBUTE_VALUES]),
            ATTRIBUTE_VALUE_COLUMNS,
            structural,
            component
        );
        let mut rows = Self::query_scoped(
            &conn,
            scope,
            &sql,
            vec![
                text(context.coordinate.id_string()),
                optional_text(context.component_id),
            ],
            "attribute values",
        )
        .await?;

        let mut values = Vec::new();
        while let Some(row) = Self::next_row(&mut rows).await? {
            values.push(Self::row_to_attribute_value(&row)?);
        }
        Ok(values)
    }
}
