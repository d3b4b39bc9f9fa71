//! Patch run orchestrator: connects both sides, walks tables and views
//! sequentially, and collects the generated SQL into artifacts.
//!
//! One table's failure never aborts the batch: the error is logged with
//! the table name, recorded in the report, and the loop moves on. The two
//! handles share one transaction scope for the whole run so every read
//! sees a consistent snapshot per side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::catalog::CatalogReader;
use crate::config::{Config, SeedOverrides, TableMetadata};
use crate::db::{PgHandle, SqlExecutor};
use crate::ddl::{depgraph, CatalogSequences, DdlSynthesizer};
use crate::diff::keyed_difference;
use crate::error::Result;
use crate::seed::{LiveReferenceResolver, PassthroughResolver, SeedEngine};
use crate::views::ViewSynthesizer;

/// What a run should produce.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Generate CREATE/ALTER scripts for tables.
    pub patch_tables: bool,

    /// Generate CREATE OR REPLACE VIEW scripts.
    pub patch_views: bool,

    /// Generate seed INSERT scripts.
    pub seed_data: bool,

    /// Restrict seeding to these tables; `None` seeds every table with a
    /// metadata entry.
    pub seed_tables: Option<Vec<String>>,

    /// Raw text of the drop-views ordering file.
    pub view_order_file: Option<String>,

    /// Per-table seed metadata entries.
    pub table_metadata: Vec<TableMetadata>,

    /// Column overrides applied to every rendered seed value.
    pub seed_overrides: SeedOverrides,
}

/// Kind of generated script, one per output file family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptKind {
    CreateTables,
    AlterTable,
    TenantViews,
    Views,
    UnorderedViews,
    SeedData,
}

/// One generated SQL script. The caller owns file writing and any
/// merge-vs-split policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptArtifact {
    /// Suggested file name.
    pub name: String,

    /// Script family.
    pub kind: ScriptKind,

    /// The SQL text.
    pub sql: String,
}

/// Outcome of processing one table or view set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    Created,
    Altered,
    InSync,
    Seeded,
    Failed,
}

/// Per-item result line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Table or view name.
    pub name: String,

    /// What happened.
    pub status: ItemStatus,

    /// Failure detail, when status is `Failed`.
    pub message: Option<String>,
}

/// Result of one full patch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchReport {
    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Per-table/view outcomes, in processing order.
    pub outcomes: Vec<ItemOutcome>,

    /// Generated scripts.
    pub artifacts: Vec<ScriptArtifact>,

    /// Tables whose foreign keys form a cycle; their CREATE statements are
    /// at the end of the ordered script but may not be executable as-is.
    pub unresolved_tables: Vec<String>,
}

impl PatchReport {
    /// Names of items that failed.
    pub fn failed_items(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status == ItemStatus::Failed)
            .map(|o| o.name.as_str())
            .collect()
    }
}

/// Drives a full comparison run between the configured source and target.
pub struct PatchRunner {
    config: Config,
    catalog: CatalogReader,
}

impl PatchRunner {
    pub fn new(config: Config) -> Self {
        let catalog = CatalogReader::new(config.schema.clone(), config.conventions.clone());
        Self { config, catalog }
    }

    /// Connect both sides and run the requested phases inside one
    /// transaction scope per handle. Setup failures roll back everything;
    /// per-table failures are contained and reported.
    pub async fn run(&self, options: &RunOptions) -> Result<PatchReport> {
        let source = PgHandle::connect(&self.config.source).await?;
        let target = match &self.config.target {
            Some(cfg) => Some(PgHandle::connect(cfg).await?),
            None => None,
        };

        source.begin().await?;
        let target_begin_err = match &target {
            Some(target) => target.begin().await.err(),
            None => None,
        };
        if let Some(e) = target_begin_err {
            source.rollback().await.ok();
            source.close().await;
            if let Some(target) = target {
                target.close().await;
            }
            return Err(e);
        }

        let result = self
            .run_phases(
                options,
                Some(&source as &dyn SqlExecutor),
                target.as_ref().map(|t| t as &dyn SqlExecutor),
            )
            .await;

        let result = match result {
            Ok(report) => {
                info!(
                    outcomes = report.outcomes.len(),
                    artifacts = report.artifacts.len(),
                    failed = report.failed_items().len(),
                    "patch run completed in {:.1}s",
                    report.duration_seconds
                );
                commit_scope(&source, target.as_ref().map(|t| t as &dyn SqlExecutor))
                    .await
                    .map(|()| report)
            }
            Err(e) => {
                error!("patch run failed: {}", e.format_detailed());
                source.rollback().await.ok();
                if let Some(target) = &target {
                    target.rollback().await.ok();
                }
                Err(e)
            }
        };

        source.close().await;
        if let Some(target) = target {
            target.close().await;
        }
        result
    }

    /// Run the requested phases against already-prepared executors.
    /// Exposed separately so callers can manage their own connections.
    pub async fn run_phases(
        &self,
        options: &RunOptions,
        source: Option<&dyn SqlExecutor>,
        target: Option<&dyn SqlExecutor>,
    ) -> Result<PatchReport> {
        let started_at = Utc::now();
        let mut outcomes = Vec::new();
        let mut artifacts = Vec::new();
        let mut unresolved_tables = Vec::new();

        if options.patch_tables {
            info!("phase: table schema comparison");
            let phase = self.patch_tables(source, target).await?;
            outcomes.extend(phase.outcomes);
            artifacts.extend(phase.artifacts);
            unresolved_tables = phase.unresolved_tables;
        }

        if options.patch_views {
            info!("phase: view comparison");
            artifacts.extend(
                self.patch_views(source, target, options.view_order_file.as_deref())
                    .await?,
            );
        }

        if options.seed_data {
            info!("phase: seed data comparison");
            let phase = self
                .seed_data(
                    source,
                    target,
                    &options.table_metadata,
                    &options.seed_overrides,
                    options.seed_tables.as_deref(),
                )
                .await?;
            outcomes.extend(phase.outcomes);
            artifacts.extend(phase.artifacts);
        }

        let completed_at = Utc::now();
        Ok(PatchReport {
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            outcomes,
            artifacts,
            unresolved_tables,
        })
    }

    /// Compare every source table: CREATE scripts for tables missing on
    /// the target (emitted as one dependency-ordered artifact), ALTER
    /// scripts for tables present on both sides.
    pub async fn patch_tables(
        &self,
        source: Option<&dyn SqlExecutor>,
        target: Option<&dyn SqlExecutor>,
    ) -> Result<PhaseOutput> {
        let source_tables = self.catalog.tables(source).await?.into_rows();
        let target_tables = self.catalog.tables(target).await?.into_rows();
        let missing: Vec<String> = keyed_difference(&source_tables, &target_tables, |t| {
            t.name.clone()
        })
        .into_iter()
        .map(|t| t.name.clone())
        .collect();

        info!(
            source_tables = source_tables.len(),
            target_tables = target_tables.len(),
            missing = missing.len(),
            "table listings fetched"
        );

        let mut phase = PhaseOutput::default();
        let mut creates: Vec<(String, Vec<String>, String)> = Vec::new();

        for table in &source_tables {
            let name = table.name.clone();
            let result = self
                .patch_one_table(&name, missing.contains(&name), source, target, &mut creates)
                .await;
            match result {
                Ok(outcome) => {
                    if let Some(sql) = outcome.alter_sql {
                        phase.artifacts.push(ScriptArtifact {
                            name: format!("{name}_alter_script.sql"),
                            kind: ScriptKind::AlterTable,
                            sql,
                        });
                    }
                    phase.outcomes.push(ItemOutcome {
                        name,
                        status: outcome.status,
                        message: None,
                    });
                }
                Err(e) => {
                    error!(table = %name, "table comparison failed: {}", e.format_detailed());
                    phase.outcomes.push(ItemOutcome {
                        name,
                        status: ItemStatus::Failed,
                        message: Some(e.to_string()),
                    });
                }
            }
        }

        if !creates.is_empty() {
            let deps: Vec<(String, Vec<String>)> = creates
                .iter()
                .map(|(name, refs, _)| (name.clone(), refs.clone()))
                .collect();
            let order = depgraph::order_tables(&deps);
            phase.unresolved_tables = order.unresolved;

            let mut sql = String::new();
            for name in &order.ordered {
                if let Some((_, _, script)) = creates.iter().find(|(n, _, _)| n == name) {
                    sql.push_str(&format!("-- {name}\n{script}\n\n"));
                }
            }
            phase.artifacts.push(ScriptArtifact {
                name: "tables_ordered.sql".to_string(),
                kind: ScriptKind::CreateTables,
                sql,
            });
        }

        Ok(phase)
    }

    /// Process one table; create entries accumulate for later ordering.
    async fn patch_one_table(
        &self,
        table: &str,
        create: bool,
        source: Option<&dyn SqlExecutor>,
        target: Option<&dyn SqlExecutor>,
        creates: &mut Vec<(String, Vec<String>, String)>,
    ) -> Result<TableResult> {
        let synth = DdlSynthesizer::new(table, self.catalog.schema(), self.catalog.conventions());

        let source_columns = self.catalog.columns(source, table).await?.into_rows();
        let source_constraints = self.catalog.constraints(source, table).await?.into_rows();
        let source_indexes = self.catalog.indexes(source, table).await?.into_rows();

        if create {
            debug!(table = %table, "generating create table script");
            let (script, _) =
                synth.create_table_script(&source_columns, &source_constraints, &source_indexes);
            let refs = depgraph::foreign_key_tables(&source_constraints);
            creates.push((table.to_string(), refs, script));
            return Ok(TableResult {
                status: ItemStatus::Created,
                alter_sql: None,
            });
        }

        debug!(table = %table, "generating alter script");
        let target_columns = self.catalog.columns(target, table).await?.into_rows();
        let target_constraints = self.catalog.constraints(target, table).await?.into_rows();
        let target_indexes = self.catalog.indexes(target, table).await?.into_rows();

        let source_sequences = CatalogSequences::new(&self.catalog, source);
        let target_sequences = CatalogSequences::new(&self.catalog, target);

        let mut sections = Vec::new();
        if let Some(sql) = synth
            .compare_columns(
                &source_columns,
                &target_columns,
                &source_sequences,
                &target_sequences,
            )
            .await?
        {
            sections.push(sql);
        }
        let (constraint_sql, classification) =
            synth.compare_constraints(&source_constraints, &target_constraints);
        if let Some(sql) = constraint_sql {
            sections.push(sql);
        }
        if let Some(sql) =
            synth.compare_indexes(&source_indexes, &target_indexes, &classification)
        {
            sections.push(sql);
        }

        if sections.is_empty() {
            Ok(TableResult {
                status: ItemStatus::InSync,
                alter_sql: None,
            })
        } else {
            Ok(TableResult {
                status: ItemStatus::Altered,
                alter_sql: Some(sections.join("\n\n")),
            })
        }
    }

    /// Compare views and render the three script buckets. A view counts as
    /// changed when the target lacks a view with the same name and
    /// definition.
    pub async fn patch_views(
        &self,
        source: Option<&dyn SqlExecutor>,
        target: Option<&dyn SqlExecutor>,
        order_file: Option<&str>,
    ) -> Result<Vec<ScriptArtifact>> {
        let source_views = self.catalog.views(source).await?.into_rows();
        let target_views = self.catalog.views(target).await?.into_rows();

        let diff: Vec<String> = keyed_difference(&source_views, &target_views, |v| {
            (v.name.clone(), v.definition.clone())
        })
        .into_iter()
        .map(|v| v.name.clone())
        .collect();

        info!(
            source_views = source_views.len(),
            changed = diff.len(),
            "view diff computed"
        );

        let synth = ViewSynthesizer::new(self.catalog.conventions());
        let scripts = synth.render(&source_views, &diff, order_file);

        let mut artifacts = Vec::new();
        let buckets = [
            (scripts.tenant_views, ScriptKind::TenantViews, "tenant_views.sql"),
            (scripts.views, ScriptKind::Views, "views.sql"),
            (
                scripts.unordered_views,
                ScriptKind::UnorderedViews,
                "unordered_views.sql",
            ),
        ];
        for (sql, kind, name) in buckets {
            if let Some(sql) = sql {
                artifacts.push(ScriptArtifact {
                    name: name.to_string(),
                    kind,
                    sql,
                });
            }
        }
        Ok(artifacts)
    }

    /// Seed every requested table. A table without a metadata entry fails
    /// that table only.
    pub async fn seed_data(
        &self,
        source: Option<&dyn SqlExecutor>,
        target: Option<&dyn SqlExecutor>,
        metadata: &[TableMetadata],
        overrides: &SeedOverrides,
        tables: Option<&[String]>,
    ) -> Result<PhaseOutput> {
        let table_names: Vec<String> = match tables {
            Some(names) => names.to_vec(),
            None => metadata.iter().map(|m| m.table_name.clone()).collect(),
        };

        let mut phase = PhaseOutput::default();
        for table in &table_names {
            match self
                .seed_one_table(table, source, target, metadata, overrides)
                .await
            {
                Ok(Some(sql)) => {
                    phase.artifacts.push(ScriptArtifact {
                        name: format!("{table}_seed_data.sql"),
                        kind: ScriptKind::SeedData,
                        sql,
                    });
                    phase.outcomes.push(ItemOutcome {
                        name: table.clone(),
                        status: ItemStatus::Seeded,
                        message: None,
                    });
                }
                Ok(None) => {
                    debug!(table = %table, "seed data already in sync");
                    phase.outcomes.push(ItemOutcome {
                        name: table.clone(),
                        status: ItemStatus::InSync,
                        message: None,
                    });
                }
                Err(e) => {
                    error!(table = %table, "seed generation failed: {}", e.format_detailed());
                    phase.outcomes.push(ItemOutcome {
                        name: table.clone(),
                        status: ItemStatus::Failed,
                        message: Some(e.to_string()),
                    });
                }
            }
        }
        Ok(phase)
    }

    async fn seed_one_table(
        &self,
        table: &str,
        source: Option<&dyn SqlExecutor>,
        target: Option<&dyn SqlExecutor>,
        metadata: &[TableMetadata],
        overrides: &SeedOverrides,
    ) -> Result<Option<String>> {
        let entry = crate::config::metadata_for(metadata, table)?;

        let engine = SeedEngine::new(&self.catalog, entry, overrides);
        match source {
            Some(exec) => {
                let mut resolver = LiveReferenceResolver::new(exec);
                engine.generate(source, target, &mut resolver).await
            }
            None => {
                let mut resolver = PassthroughResolver;
                engine.generate(source, target, &mut resolver).await
            }
        }
    }
}

/// Commit both sides of a run. A failed source commit rolls back the
/// target so the scopes never land half-applied; the error is returned
/// either way and the caller still owns closing the handles.
async fn commit_scope(source: &dyn SqlExecutor, target: Option<&dyn SqlExecutor>) -> Result<()> {
    if let Err(e) = source.commit().await {
        error!("source commit failed: {}", e.format_detailed());
        if let Some(target) = target {
            target.rollback().await.ok();
        }
        return Err(e);
    }
    if let Some(target) = target {
        target.commit().await?;
    }
    Ok(())
}

/// Artifacts and outcomes collected by one phase.
#[derive(Debug, Clone, Default)]
pub struct PhaseOutput {
    pub outcomes: Vec<ItemOutcome>,
    pub artifacts: Vec<ScriptArtifact>,
    pub unresolved_tables: Vec<String>,
}

struct TableResult {
    status: ItemStatus,
    alter_sql: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DbConfig};
    use crate::error::PatchError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio_postgres::types::ToSql;
    use tokio_postgres::Row;

    struct ScriptedSession {
        commit_fails: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedSession {
        fn new(commit_fails: bool) -> Self {
            Self {
                commit_fails,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl SqlExecutor for ScriptedSession {
        async fn query(&self, _sql: &str, _params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>> {
            Ok(Vec::new())
        }

        async fn begin(&self) -> Result<()> {
            self.record("begin");
            Ok(())
        }

        async fn commit(&self) -> Result<()> {
            self.record("commit");
            if self.commit_fails {
                Err(PatchError::transaction("commit", "simulated failure"))
            } else {
                Ok(())
            }
        }

        async fn rollback(&self) -> Result<()> {
            self.record("rollback");
            Ok(())
        }
    }

    fn config() -> Config {
        Config {
            source: DbConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "qa".to_string(),
                user: "app".to_string(),
                password: "secret".to_string(),
                ssl_mode: "disable".to_string(),
                session_timeout_ms: None,
            },
            target: None,
            schema: "public".to_string(),
            conventions: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_phases_with_no_handles_produce_empty_report() {
        let runner = PatchRunner::new(config());
        let options = RunOptions {
            patch_tables: true,
            patch_views: true,
            ..Default::default()
        };
        let report = runner.run_phases(&options, None, None).await.unwrap();
        assert!(report.artifacts.is_empty());
        assert!(report.outcomes.is_empty());
        assert!(report.unresolved_tables.is_empty());
    }

    #[tokio::test]
    async fn test_seed_without_metadata_fails_per_table_only() {
        let runner = PatchRunner::new(config());
        let options = RunOptions {
            seed_data: true,
            seed_tables: Some(vec!["unknown_table".to_string()]),
            ..Default::default()
        };
        let report = runner.run_phases(&options, None, None).await.unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].status, ItemStatus::Failed);
        assert_eq!(report.failed_items(), vec!["unknown_table"]);
    }

    #[tokio::test]
    async fn test_commit_scope_commits_both_sides() {
        let source = ScriptedSession::new(false);
        let target = ScriptedSession::new(false);
        let result = commit_scope(&source, Some(&target as &dyn SqlExecutor)).await;
        assert!(result.is_ok());
        assert_eq!(*source.calls.lock().unwrap(), vec!["commit"]);
        assert_eq!(*target.calls.lock().unwrap(), vec!["commit"]);
    }

    #[tokio::test]
    async fn test_failed_source_commit_rolls_back_target() {
        let source = ScriptedSession::new(true);
        let target = ScriptedSession::new(false);
        let result = commit_scope(&source, Some(&target as &dyn SqlExecutor)).await;
        assert!(matches!(result, Err(PatchError::Transaction { .. })));
        assert_eq!(*source.calls.lock().unwrap(), vec!["commit"]);
        assert_eq!(*target.calls.lock().unwrap(), vec!["rollback"]);
    }

    #[test]
    fn test_report_failed_items() {
        let report = PatchReport {
            started_at: Utc::now(),
            completed_at: Utc::now(),
            duration_seconds: 0.0,
            outcomes: vec![
                ItemOutcome {
                    name: "a".to_string(),
                    status: ItemStatus::InSync,
                    message: None,
                },
                ItemOutcome {
                    name: "b".to_string(),
                    status: ItemStatus::Failed,
                    message: Some("boom".to_string()),
                },
            ],
            artifacts: Vec::new(),
            unresolved_tables: Vec::new(),
        };
        assert_eq!(report.failed_items(), vec!["b"]);
    }
}
