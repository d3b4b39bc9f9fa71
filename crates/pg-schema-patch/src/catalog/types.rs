//! Catalog metadata and data-row types.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of a catalog fetch that distinguishes "no handle supplied" from
/// "queried and empty". Single-sided comparisons deliberately degrade the
/// unavailable side to an empty list via [`Fetched::into_rows`], but callers
/// that need to tell an unreachable database apart from an empty one can.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    /// Rows returned by the catalog query.
    Rows(Vec<T>),

    /// No executor was supplied for this side.
    Unavailable,
}

impl<T> Fetched<T> {
    /// Unwrap to rows, treating an unavailable side as empty.
    pub fn into_rows(self) -> Vec<T> {
        match self {
            Fetched::Rows(rows) => rows,
            Fetched::Unavailable => Vec::new(),
        }
    }

    /// Whether this side had no executor.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Fetched::Unavailable)
    }
}

/// Column metadata for one table, fetched fresh per comparison pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Column name.
    pub name: String,

    /// SQL standard data type (e.g. "character varying").
    pub data_type: String,

    /// Underlying type name used in rendered DDL (e.g. "varchar", "int4").
    pub udt_name: String,

    /// Maximum length for character types.
    pub char_max_length: Option<i32>,

    /// Numeric precision.
    pub numeric_precision: Option<i32>,

    /// Numeric scale.
    pub numeric_scale: Option<i32>,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Raw default expression, if any.
    pub default_expr: Option<String>,

    /// Owning sequence when the column is serial-backed.
    pub serial_sequence: Option<String>,
}

/// Constraint kind, decoded from `pg_constraint.contype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    Primary,
    Foreign,
    Unique,
    Check,
    Exclusion,
}

impl ConstraintKind {
    /// Decode a `contype` character.
    pub fn from_contype(c: &str) -> Option<Self> {
        match c {
            "p" => Some(ConstraintKind::Primary),
            "f" => Some(ConstraintKind::Foreign),
            "u" => Some(ConstraintKind::Unique),
            "c" => Some(ConstraintKind::Check),
            "x" => Some(ConstraintKind::Exclusion),
            _ => None,
        }
    }
}

/// Constraint metadata. `columns` and `ref_table` come from catalog joins
/// so primary-key and foreign-key handling never parse definition text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintMeta {
    /// Constraint name.
    pub name: String,

    /// Constraint kind.
    pub kind: ConstraintKind,

    /// Raw SQL definition fragment from `pg_get_constraintdef`.
    pub definition: String,

    /// Constrained column names, in key order.
    pub columns: Vec<String>,

    /// Referenced table for foreign keys.
    pub ref_table: Option<String>,
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Index name.
    pub name: String,

    /// Raw `CREATE [UNIQUE] INDEX` definition.
    pub definition: String,
}

/// A table reference from the catalog listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRef {
    /// Schema name.
    pub schema: String,

    /// Table name.
    pub name: String,
}

/// View metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewMeta {
    /// View name.
    pub name: String,

    /// Raw SELECT body from `pg_get_viewdef`.
    pub definition: String,
}

/// Sequence details from `pg_sequences`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceMeta {
    pub schema: String,
    pub name: String,
    pub data_type: String,
    pub start_value: i64,
    pub min_value: i64,
    pub max_value: i64,
    pub increment_by: i64,
    pub cycle: bool,
    pub cache_size: i64,
}

/// One cell of a fetched data row. JSON-typed cells are stringified at
/// fetch time, mirroring how seed rows are normalized before diffing.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Json(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
    Uuid(Uuid),
}

impl fmt::Display for CellValue {
    /// Stable stringification used for composite diff keys. Both sides of
    /// a comparison go through the same conversion, so any deterministic
    /// rendering works; this one is also readable in logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "null"),
            CellValue::Bool(v) => write!(f, "{}", v),
            CellValue::Int(v) => write!(f, "{}", v),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Decimal(v) => write!(f, "{}", v),
            CellValue::Text(v) => write!(f, "{}", v),
            CellValue::Json(v) => write!(f, "{}", v),
            CellValue::Date(v) => write!(f, "{}", v),
            CellValue::Timestamp(v) => write!(f, "{}", v),
            CellValue::TimestampTz(v) => write!(f, "{}", v),
            CellValue::Uuid(v) => write!(f, "{}", v),
        }
    }
}

/// A fetched data row, keyed by column name.
pub type DataRow = BTreeMap<String, CellValue>;
