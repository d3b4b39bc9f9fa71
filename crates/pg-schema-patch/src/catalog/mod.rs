//! Catalog introspection.
//!
//! All operations take `Option<&dyn SqlExecutor>`: a side without a handle
//! yields [`Fetched::Unavailable`] instead of failing, which lets a caller
//! run single-sided comparisons (e.g. a table that only exists on the
//! source). Real query errors still propagate.

mod types;

pub use types::*;

use tokio_postgres::Row;
use tracing::debug;

use crate::config::Conventions;
use crate::db::SqlExecutor;
use crate::error::Result;

/// Reads normalized metadata rows from one schema.
pub struct CatalogReader {
    schema: String,
    conventions: Conventions,
}

impl CatalogReader {
    /// Create a reader scoped to a schema with a convention policy.
    pub fn new(schema: impl Into<String>, conventions: Conventions) -> Self {
        Self {
            schema: schema.into(),
            conventions,
        }
    }

    /// Schema under comparison.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Convention policy in effect.
    pub fn conventions(&self) -> &Conventions {
        &self.conventions
    }

    /// Fetch column metadata for a table, in ordinal order.
    pub async fn columns(
        &self,
        exec: Option<&dyn SqlExecutor>,
        table: &str,
    ) -> Result<Fetched<ColumnMeta>> {
        let Some(exec) = exec else {
            return Ok(Fetched::Unavailable);
        };

        let query = r#"
            SELECT
                column_name::text,
                data_type::text,
                udt_name::text,
                character_maximum_length::int4,
                numeric_precision::int4,
                numeric_scale::int4,
                CASE WHEN is_nullable = 'YES' THEN true ELSE false END,
                column_default::text,
                pg_get_serial_sequence($3, column_name) AS serial_sequence
            FROM information_schema.columns
            WHERE table_name = $1 AND table_schema = $2
            ORDER BY ordinal_position
        "#;

        let qualified = format!("{}.{}", self.schema, table);
        let rows = exec
            .query(query, &[&table, &self.schema, &qualified])
            .await?;

        let columns = rows
            .iter()
            .map(|row| ColumnMeta {
                name: row.get(0),
                data_type: row.get(1),
                udt_name: row.get(2),
                char_max_length: row.get(3),
                numeric_precision: row.get(4),
                numeric_scale: row.get(5),
                is_nullable: row.get(6),
                default_expr: row.get(7),
                serial_sequence: row.get(8),
            })
            .collect::<Vec<_>>();

        debug!("Loaded {} columns for {}", columns.len(), qualified);
        Ok(Fetched::Rows(columns))
    }

    /// Fetch all constraints on a table, with structured key columns and
    /// the referenced table for foreign keys.
    pub async fn constraints(
        &self,
        exec: Option<&dyn SqlExecutor>,
        table: &str,
    ) -> Result<Fetched<ConstraintMeta>> {
        let Some(exec) = exec else {
            return Ok(Fetched::Unavailable);
        };

        let query = r#"
            SELECT
                c.conname::text AS constraint_name,
                c.contype::text AS constraint_type,
                pg_get_constraintdef(c.oid) AS constraint_definition,
                COALESCE(
                    (SELECT array_agg(a.attname::text ORDER BY array_position(c.conkey, a.attnum))
                     FROM pg_catalog.pg_attribute a
                     WHERE a.attrelid = t.oid AND a.attnum = ANY(c.conkey)),
                    '{}'
                ) AS columns,
                rt.relname::text AS ref_table
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            LEFT JOIN pg_catalog.pg_class rt ON rt.oid = c.confrelid
            WHERE t.relname = $1 AND n.nspname = $2
            ORDER BY c.conname
        "#;

        let rows = exec.query(query, &[&table, &self.schema]).await?;

        let mut constraints = Vec::with_capacity(rows.len());
        for row in &rows {
            let contype: String = row.get(1);
            let Some(kind) = ConstraintKind::from_contype(&contype) else {
                // Trigger constraints and future contypes are not managed.
                continue;
            };
            constraints.push(ConstraintMeta {
                name: row.get(0),
                kind,
                definition: row.get(2),
                columns: row.get(3),
                ref_table: row.get(4),
            });
        }

        debug!(
            "Loaded {} constraints for {}.{}",
            constraints.len(),
            self.schema,
            table
        );
        Ok(Fetched::Rows(constraints))
    }

    /// Fetch all indexes on a table.
    pub async fn indexes(
        &self,
        exec: Option<&dyn SqlExecutor>,
        table: &str,
    ) -> Result<Fetched<IndexMeta>> {
        let Some(exec) = exec else {
            return Ok(Fetched::Unavailable);
        };

        let query = r#"
            SELECT indexname::text AS index_name, indexdef AS index_definition
            FROM pg_indexes
            WHERE tablename = $1 AND schemaname = $2
            ORDER BY indexname
        "#;

        let rows = exec.query(query, &[&table, &self.schema]).await?;

        let indexes = rows
            .iter()
            .map(|row| IndexMeta {
                name: row.get(0),
                definition: row.get(1),
            })
            .collect::<Vec<_>>();

        debug!("Loaded {} indexes for {}.{}", indexes.len(), self.schema, table);
        Ok(Fetched::Rows(indexes))
    }

    /// List tables in the schema, filtered through the convention policy's
    /// scratch/backup deny-list.
    pub async fn tables(&self, exec: Option<&dyn SqlExecutor>) -> Result<Fetched<TableRef>> {
        let Some(exec) = exec else {
            return Ok(Fetched::Unavailable);
        };

        let query = r#"
            SELECT schemaname::text, tablename::text
            FROM pg_catalog.pg_tables
            WHERE schemaname = $1
            ORDER BY schemaname, tablename
        "#;

        let rows = exec.query(query, &[&self.schema]).await?;

        let tables = rows
            .iter()
            .map(|row| TableRef {
                schema: row.get(0),
                name: row.get(1),
            })
            .filter(|t| self.conventions.table_filter.accepts(&t.name))
            .collect::<Vec<_>>();

        debug!("Listed {} tables in schema '{}'", tables.len(), self.schema);
        Ok(Fetched::Rows(tables))
    }

    /// Fetch all views with their definitions.
    pub async fn views(&self, exec: Option<&dyn SqlExecutor>) -> Result<Fetched<ViewMeta>> {
        let Some(exec) = exec else {
            return Ok(Fetched::Unavailable);
        };

        let query = r#"
            SELECT
                table_name::text AS view_name,
                pg_get_viewdef(format('%I.%I', table_schema, table_name)::regclass, true)
                    AS view_definition
            FROM information_schema.views
            WHERE table_schema = $1
            ORDER BY table_name
        "#;

        let rows = exec.query(query, &[&self.schema]).await?;

        let views = rows
            .iter()
            .map(|row| ViewMeta {
                name: row.get(0),
                definition: row.get(1),
            })
            .collect::<Vec<_>>();

        debug!("Loaded {} views in schema '{}'", views.len(), self.schema);
        Ok(Fetched::Rows(views))
    }

    /// Look up a sequence by name.
    pub async fn sequence(
        &self,
        exec: Option<&dyn SqlExecutor>,
        sequence_name: &str,
    ) -> Result<Fetched<SequenceMeta>> {
        let Some(exec) = exec else {
            return Ok(Fetched::Unavailable);
        };

        let query = r#"
            SELECT
                schemaname::text,
                sequencename::text,
                data_type::text,
                start_value,
                min_value,
                max_value,
                increment_by,
                cycle,
                cache_size
            FROM pg_sequences
            WHERE schemaname = $1 AND sequencename = $2
        "#;

        let rows = exec.query(query, &[&self.schema, &sequence_name]).await?;

        let sequences = rows
            .iter()
            .map(|row| SequenceMeta {
                schema: row.get(0),
                name: row.get(1),
                data_type: row.get(2),
                start_value: row.get(3),
                min_value: row.get(4),
                max_value: row.get(5),
                increment_by: row.get(6),
                cycle: row.get(7),
                cache_size: row.get(8),
            })
            .collect::<Vec<_>>();

        Ok(Fetched::Rows(sequences))
    }

    /// Fetch all rows of a table as normalized [`DataRow`]s, optionally
    /// ordered by a raw ORDER BY clause from table metadata.
    pub async fn rows(
        &self,
        exec: Option<&dyn SqlExecutor>,
        table: &str,
        order_by: Option<&str>,
    ) -> Result<Fetched<DataRow>> {
        let Some(exec) = exec else {
            return Ok(Fetched::Unavailable);
        };

        let mut query = format!("SELECT * FROM {}.{}", self.schema, table);
        if let Some(order) = order_by {
            query.push_str(" ORDER BY ");
            query.push_str(order);
        }

        let rows = exec.query(&query, &[]).await?;
        let data = rows.iter().map(row_to_data_row).collect::<Vec<_>>();

        debug!("Fetched {} rows from {}.{}", data.len(), self.schema, table);
        Ok(Fetched::Rows(data))
    }
}

/// Convert one wire row into a [`DataRow`] by column type.
pub(crate) fn row_to_data_row(row: &Row) -> DataRow {
    let mut data = DataRow::new();
    for (idx, column) in row.columns().iter().enumerate() {
        data.insert(column.name().to_string(), convert_cell(row, idx));
    }
    data
}

/// Convert one cell based on its PostgreSQL type name.
fn convert_cell(row: &Row, idx: usize) -> CellValue {
    let type_name = row.columns()[idx].type_().name();

    match type_name {
        "bool" => row
            .try_get::<_, Option<bool>>(idx)
            .ok()
            .flatten()
            .map_or(CellValue::Null, CellValue::Bool),
        "int2" => row
            .try_get::<_, Option<i16>>(idx)
            .ok()
            .flatten()
            .map_or(CellValue::Null, |v| CellValue::Int(v as i64)),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)
            .ok()
            .flatten()
            .map_or(CellValue::Null, |v| CellValue::Int(v as i64)),
        "int8" => row
            .try_get::<_, Option<i64>>(idx)
            .ok()
            .flatten()
            .map_or(CellValue::Null, CellValue::Int),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)
            .ok()
            .flatten()
            .map_or(CellValue::Null, |v| CellValue::Float(v as f64)),
        "float8" => row
            .try_get::<_, Option<f64>>(idx)
            .ok()
            .flatten()
            .map_or(CellValue::Null, CellValue::Float),
        "numeric" => row
            .try_get::<_, Option<rust_decimal::Decimal>>(idx)
            .ok()
            .flatten()
            .map_or(CellValue::Null, CellValue::Decimal),
        "uuid" => row
            .try_get::<_, Option<uuid::Uuid>>(idx)
            .ok()
            .flatten()
            .map_or(CellValue::Null, CellValue::Uuid),
        "date" => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)
            .ok()
            .flatten()
            .map_or(CellValue::Null, CellValue::Date),
        "timestamp" => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)
            .ok()
            .flatten()
            .map_or(CellValue::Null, CellValue::Timestamp),
        "timestamptz" => row
            .try_get::<_, Option<chrono::DateTime<chrono::FixedOffset>>>(idx)
            .ok()
            .flatten()
            .map_or(CellValue::Null, CellValue::TimestampTz),
        // Object-typed cells are stringified at fetch time so diffing and
        // literal rendering see stable text.
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .ok()
            .flatten()
            .map_or(CellValue::Null, |v| CellValue::Json(v.to_string())),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map_or(CellValue::Null, CellValue::Text),
    }
}
