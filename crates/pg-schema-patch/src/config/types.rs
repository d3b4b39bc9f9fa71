//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// Root configuration for a patch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database connection (desired state).
    pub source: DbConfig,

    /// Target database connection (state to be patched). Optional so a
    /// source-only run can render full CREATE scripts.
    #[serde(default)]
    pub target: Option<DbConfig>,

    /// Schema under comparison (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// Naming-convention policy driving table filtering, column ordering
    /// and tenant-view handling.
    #[serde(default)]
    pub conventions: Conventions,
}

/// PostgreSQL connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// SSL mode (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,

    /// Optional session timeout base in milliseconds. When set,
    /// `idle_in_transaction_session_timeout` uses the full value and
    /// `statement_timeout` half of it, matching session setup on begin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_timeout_ms: Option<u64>,
}

/// Naming-convention policy for a schema family.
///
/// The defaults encode the conventions the generator was written for
/// (tenant views suffixed `_tv`, `c_attr`/`n_attr`/`d_attr` flexfield
/// columns, a fixed audit block). All of it is overridable from config so
/// the core algorithms stay convention-agnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conventions {
    /// Suffix identifying tenant-scoped views.
    #[serde(default = "default_tenant_view_suffix")]
    pub tenant_view_suffix: String,

    /// Session setting holding the current tenant id.
    #[serde(default = "default_tenant_setting")]
    pub tenant_setting: String,

    /// Column a tenant view filters on.
    #[serde(default = "default_tenant_id_column")]
    pub tenant_id_column: String,

    /// Tenant column block, rendered after ordinary columns in CREATE DDL.
    #[serde(default = "default_tenant_columns")]
    pub tenant_columns: Vec<String>,

    /// Audit ("who") column block, rendered last in CREATE DDL.
    #[serde(default = "default_audit_columns")]
    pub audit_columns: Vec<String>,

    /// Substring marking attribute (flexfield) columns.
    #[serde(default = "default_attr_marker")]
    pub attr_marker: String,

    /// Attribute prefixes in rank order; columns sort by prefix rank then
    /// numeric suffix.
    #[serde(default = "default_attr_prefix_order")]
    pub attr_prefix_order: Vec<String>,

    /// Scratch/backup table exclusions applied when listing tables.
    #[serde(default)]
    pub table_filter: TableFilter,
}

impl Default for Conventions {
    fn default() -> Self {
        Self {
            tenant_view_suffix: default_tenant_view_suffix(),
            tenant_setting: default_tenant_setting(),
            tenant_id_column: default_tenant_id_column(),
            tenant_columns: default_tenant_columns(),
            audit_columns: default_audit_columns(),
            attr_marker: default_attr_marker(),
            attr_prefix_order: default_attr_prefix_order(),
            table_filter: TableFilter::default(),
        }
    }
}

impl Conventions {
    /// Whether a view name denotes a tenant-scoped view.
    pub fn is_tenant_view(&self, view_name: &str) -> bool {
        view_name.ends_with(&self.tenant_view_suffix)
    }

    /// Base table name for a tenant view (suffix stripped).
    pub fn tenant_view_base(&self, view_name: &str) -> String {
        view_name
            .strip_suffix(&self.tenant_view_suffix)
            .unwrap_or(view_name)
            .to_string()
    }
}

/// Deny-list for table enumeration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableFilter {
    /// Exact table names to skip.
    #[serde(default)]
    pub ignore_tables: Vec<String>,

    /// Name prefixes to skip.
    #[serde(default = "default_ignore_prefixes")]
    pub ignore_prefixes: Vec<String>,

    /// Name substrings to skip.
    #[serde(default = "default_ignore_substrings")]
    pub ignore_substrings: Vec<String>,

    /// Name suffixes to skip.
    #[serde(default = "default_ignore_suffixes")]
    pub ignore_suffixes: Vec<String>,
}

impl Default for TableFilter {
    fn default() -> Self {
        Self {
            ignore_tables: Vec::new(),
            ignore_prefixes: default_ignore_prefixes(),
            ignore_substrings: default_ignore_substrings(),
            ignore_suffixes: default_ignore_suffixes(),
        }
    }
}

impl TableFilter {
    /// Whether a table name passes the filter.
    pub fn accepts(&self, name: &str) -> bool {
        if self.ignore_tables.iter().any(|t| t == name) {
            return false;
        }
        if self.ignore_prefixes.iter().any(|p| name.starts_with(p.as_str())) {
            return false;
        }
        if self.ignore_substrings.iter().any(|s| name.contains(s.as_str())) {
            return false;
        }
        if self.ignore_suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            return false;
        }
        true
    }
}

/// Per-table metadata controlling the seed data pipeline. Loaded from a
/// JSON array of entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMetadata {
    /// Table the entry applies to.
    pub table_name: String,

    /// Column-name prefixes excluded from both INSERT columns and values.
    #[serde(default)]
    pub ignored_columns: Vec<String>,

    /// Columns defining row identity for data diffing.
    pub compare_columns: Vec<String>,

    /// Optional raw ORDER BY clause appended to the row fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,

    /// Cross-table lookups replacing surrogate key values.
    #[serde(default)]
    pub reference_columns: Vec<ReferenceColumn>,

    /// INSERT rendering format (default: batch).
    #[serde(default)]
    pub insert_statement_format: InsertFormat,
}

/// Cross-environment foreign key resolution for one column: the fetched
/// surrogate value is replaced by a correlated subquery built from the
/// referenced table's business-key columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceColumn {
    /// Column in the table being seeded.
    pub column: String,

    /// Referenced table.
    pub table: String,

    /// Business-key columns fetched from the referenced table to build the
    /// lookup predicate.
    pub compare_columns: Vec<String>,

    /// Column selected by the subquery; defaults to `column`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_column: Option<String>,
}

impl ReferenceColumn {
    /// Column the subquery selects and the lookup matches on.
    pub fn source_column(&self) -> &str {
        self.source_column.as_deref().unwrap_or(&self.column)
    }
}

/// INSERT statement rendering format.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InsertFormat {
    /// All value tuples in one statement.
    #[default]
    Batch,

    /// One full INSERT per row.
    Split,

    /// One INSERT per chunk of N rows.
    Chunked(usize),
}

impl InsertFormat {
    /// Parse the on-disk format string: "batch", "split" or "batch-N".
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "batch" => Some(InsertFormat::Batch),
            "split" => Some(InsertFormat::Split),
            other => {
                let n = other.strip_prefix("batch-")?.parse::<usize>().ok()?;
                if n == 0 {
                    return None;
                }
                Some(InsertFormat::Chunked(n))
            }
        }
    }
}

impl Serialize for InsertFormat {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            InsertFormat::Batch => serializer.serialize_str("batch"),
            InsertFormat::Split => serializer.serialize_str("split"),
            InsertFormat::Chunked(n) => serializer.serialize_str(&format!("batch-{}", n)),
        }
    }
}

impl<'de> Deserialize<'de> for InsertFormat {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        InsertFormat::parse(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid insertStatementFormat '{}': expected 'batch', 'split' or 'batch-N'",
                s
            ))
        })
    }
}

// Default value functions for serde

fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_require() -> String {
    "require".to_string()
}

fn default_tenant_view_suffix() -> String {
    "_tv".to_string()
}

fn default_tenant_setting() -> String {
    "app.tenant_id".to_string()
}

fn default_tenant_id_column() -> String {
    "tenant_id".to_string()
}

fn default_tenant_columns() -> Vec<String> {
    vec!["tenant_id".to_string(), "object_version_number".to_string()]
}

fn default_audit_columns() -> Vec<String> {
    vec![
        "user_id".to_string(),
        "creation_date".to_string(),
        "created_by".to_string(),
        "last_updated_by".to_string(),
        "last_update_date".to_string(),
        "last_login_id".to_string(),
    ]
}

fn default_attr_marker() -> String {
    "_attr_".to_string()
}

fn default_attr_prefix_order() -> Vec<String> {
    vec!["c_attr".to_string(), "n_attr".to_string(), "d_attr".to_string()]
}

fn default_ignore_prefixes() -> Vec<String> {
    vec![
        "tmp_".to_string(),
        "demo_".to_string(),
        "temp_".to_string(),
        "tenant_1".to_string(),
    ]
}

fn default_ignore_substrings() -> Vec<String> {
    vec!["_bkp_".to_string()]
}

fn default_ignore_suffixes() -> Vec<String> {
    vec!["_60".to_string()]
}
