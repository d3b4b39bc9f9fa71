//! # pg-schema-patch
//!
//! Compares two PostgreSQL databases and synthesizes the SQL scripts that
//! bring the target's schema and seed data into alignment with the source:
//!
//! - **Table DDL**: dependency-ordered `CREATE TABLE` scripts and ALTER
//!   scripts for columns, constraints and indexes
//! - **Views**: `CREATE OR REPLACE VIEW` scripts ordered by an external
//!   drop-views file, with tenant-scoped view synthesis
//! - **Seed data**: row-level diffing by configurable compare columns,
//!   value encoding, cross-environment reference resolution and batched
//!   INSERT rendering
//!
//! All generated SQL is idempotent and is returned as text artifacts; the
//! caller owns file writing.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pg_schema_patch::{Config, PatchRunner, RunOptions};
//!
//! #[tokio::main]
//! async fn main() -> pg_schema_patch::Result<()> {
//!     let config = Config::load("patch.yaml")?;
//!     let runner = PatchRunner::new(config);
//!     let options = RunOptions {
//!         patch_tables: true,
//!         ..Default::default()
//!     };
//!     let report = runner.run(&options).await?;
//!     for artifact in &report.artifacts {
//!         println!("{}: {} bytes", artifact.name, artifact.sql.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod db;
pub mod ddl;
pub mod diff;
pub mod error;
pub mod runner;
pub mod seed;
pub mod views;

// Re-exports for convenient access
pub use catalog::{CatalogReader, CellValue, ColumnMeta, ConstraintMeta, Fetched, ViewMeta};
pub use config::{Config, Conventions, DbConfig, SeedOverrides, TableMetadata};
pub use db::{PgHandle, SqlExecutor};
pub use ddl::{CatalogSequences, ConstraintClassification, DdlSynthesizer, SequenceLookup};
pub use error::{PatchError, Result};
pub use runner::{PatchReport, PatchRunner, RunOptions, ScriptArtifact, ScriptKind};
pub use seed::{LiveReferenceResolver, PassthroughResolver, ReferenceResolver, SeedEngine};
pub use views::{ViewScripts, ViewSynthesizer};
