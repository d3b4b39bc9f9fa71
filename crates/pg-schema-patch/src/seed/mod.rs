//! Seed data synchronization: row diffing by compare-columns plus INSERT
//! script rendering.
//!
//! The diff is identity-only: rows present on both sides by their
//! compare-column projection are never touched, even if other columns
//! differ. Reference columns swap the fetched surrogate value for a
//! correlated subquery so the script resolves the right key in the target
//! environment.

pub mod value;

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::catalog::{row_to_data_row, CatalogReader, CellValue, ColumnMeta, DataRow};
use crate::config::{InsertFormat, ReferenceColumn, SeedOverrides, TableMetadata};
use crate::db::SqlExecutor;
use crate::diff::row_difference;
use crate::error::Result;
use value::{escape_string, sql_literal};

/// Resolves a reference column's value into a SQL expression valid on the
/// target side. Implementations may memoize per unique (table, column,
/// value) tuple; the engine calls this once per surviving row per
/// reference column.
#[async_trait]
pub trait ReferenceResolver: Send {
    /// Returns the replacement expression, or `None` to keep the plain
    /// literal (e.g. when no lookup row exists on the source side).
    async fn resolve(
        &mut self,
        reference: &ReferenceColumn,
        fetched: &CellValue,
    ) -> Result<Option<String>>;
}

/// Live resolver that probes the source connection per unique value.
///
/// The probe fetches the business-key columns for the fetched surrogate
/// value, then builds a correlated subquery over those keys so the target
/// database resolves its own surrogate. Results are memoized.
pub struct LiveReferenceResolver<'a> {
    source: &'a dyn SqlExecutor,
    memo: HashMap<String, Option<String>>,
}

impl<'a> LiveReferenceResolver<'a> {
    pub fn new(source: &'a dyn SqlExecutor) -> Self {
        Self {
            source,
            memo: HashMap::new(),
        }
    }
}

#[async_trait]
impl ReferenceResolver for LiveReferenceResolver<'_> {
    async fn resolve(
        &mut self,
        reference: &ReferenceColumn,
        fetched: &CellValue,
    ) -> Result<Option<String>> {
        let literal = sql_literal(fetched);
        let key = format!(
            "{}\x1f{}\x1f{}",
            reference.table,
            reference.source_column(),
            literal
        );
        if let Some(cached) = self.memo.get(&key) {
            return Ok(cached.clone());
        }

        let probe = format!(
            "SELECT {} FROM {} WHERE {} = {}",
            reference.compare_columns.join(", "),
            reference.table,
            reference.source_column(),
            literal
        );
        let rows = self.source.query(&probe, &[]).await?;

        let resolved = rows.first().map(row_to_data_row).and_then(|lookup| {
            let predicates = predicate_list(&lookup);
            if predicates.is_empty() {
                None
            } else {
                Some(format!(
                    "(SELECT {} FROM {} WHERE {} LIMIT 1)",
                    reference.source_column(),
                    reference.table,
                    predicates.join(" AND ")
                ))
            }
        });

        self.memo.insert(key, resolved.clone());
        Ok(resolved)
    }
}

/// Resolver that never rewrites; every reference column keeps its plain
/// literal. Used when no source connection is available.
pub struct PassthroughResolver;

#[async_trait]
impl ReferenceResolver for PassthroughResolver {
    async fn resolve(
        &mut self,
        _reference: &ReferenceColumn,
        _fetched: &CellValue,
    ) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Predicate fragments for a correlated lookup, one per business-key
/// column of the probe row.
fn predicate_list(lookup: &DataRow) -> Vec<String> {
    lookup
        .iter()
        .map(|(column, cell)| match cell {
            CellValue::Null => format!("{column} IS NULL"),
            CellValue::Bool(_)
            | CellValue::Int(_)
            | CellValue::Float(_)
            | CellValue::Decimal(_) => format!("{column} = {cell}"),
            other => format!("{column} = '{}'", escape_string(&other.to_string())),
        })
        .collect()
}

/// Per-table seed script generator.
pub struct SeedEngine<'a> {
    catalog: &'a CatalogReader,
    metadata: &'a TableMetadata,
    overrides: &'a SeedOverrides,
}

impl<'a> SeedEngine<'a> {
    pub fn new(
        catalog: &'a CatalogReader,
        metadata: &'a TableMetadata,
        overrides: &'a SeedOverrides,
    ) -> Self {
        Self {
            catalog,
            metadata,
            overrides,
        }
    }

    /// Generate the INSERT script bringing the target's rows up to the
    /// source's, or `None` when the table is already in sync.
    pub async fn generate(
        &self,
        source: Option<&dyn SqlExecutor>,
        target: Option<&dyn SqlExecutor>,
        resolver: &mut dyn ReferenceResolver,
    ) -> Result<Option<String>> {
        let table = &self.metadata.table_name;
        let order_by = self.metadata.order_by.as_deref();

        let columns = self.catalog.columns(source, table).await?.into_rows();
        let columns: Vec<&ColumnMeta> = columns
            .iter()
            .filter(|c| !self.is_ignored(&c.name))
            .collect();

        let source_rows = self.catalog.rows(source, table, order_by).await?.into_rows();
        let target_rows = self.catalog.rows(target, table, order_by).await?.into_rows();

        let missing = row_difference(&source_rows, &target_rows, &self.metadata.compare_columns);
        debug!(
            table = %table,
            source_rows = source_rows.len(),
            target_rows = target_rows.len(),
            missing = missing.len(),
            "seed diff computed"
        );
        if missing.is_empty() {
            return Ok(None);
        }

        let mut tuples = Vec::with_capacity(missing.len());
        for row in missing {
            tuples.push(self.render_tuple(row, &columns, resolver).await?);
        }

        Ok(Some(render_insert_script(
            table,
            &columns,
            &tuples,
            &self.metadata.insert_statement_format,
        )))
    }

    /// One VALUES tuple for a surviving row: literal encoding, reference
    /// resolution, then overrides, in that order.
    async fn render_tuple(
        &self,
        row: &DataRow,
        columns: &[&ColumnMeta],
        resolver: &mut dyn ReferenceResolver,
    ) -> Result<String> {
        let mut rendered = Vec::with_capacity(columns.len());
        for column in columns {
            let cell = row.get(&column.name).unwrap_or(&CellValue::Null);
            let mut expr = sql_literal(cell);

            if let Some(reference) = self
                .metadata
                .reference_columns
                .iter()
                .find(|r| r.column == column.name)
            {
                if let Some(subquery) = resolver.resolve(reference, cell).await? {
                    expr = subquery;
                }
            }

            if let Some(forced) = self.overrides.get(&column.name) {
                expr = forced.clone();
            }

            rendered.push(expr);
        }
        Ok(format!("({})", rendered.join(", ")))
    }

    fn is_ignored(&self, column: &str) -> bool {
        self.metadata
            .ignored_columns
            .iter()
            .any(|prefix| column.starts_with(prefix.as_str()))
    }
}

/// Render the final INSERT script per the configured format.
fn render_insert_script(
    table: &str,
    columns: &[&ColumnMeta],
    tuples: &[String],
    format: &InsertFormat,
) -> String {
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    let preamble = format!("INSERT INTO {} ({}) VALUES \n", table, names.join(", "));

    match format {
        InsertFormat::Batch => format!("{}{};", preamble, tuples.join(",\n")),
        InsertFormat::Split => tuples
            .iter()
            .map(|t| format!("{preamble}{t};\n"))
            .collect(),
        InsertFormat::Chunked(size) => tuples
            .chunks((*size).max(1))
            .map(|chunk| format!("{}{};\n", preamble, chunk.join(",\n")))
            .collect(),
    }
}
