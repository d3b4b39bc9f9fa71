//! DDL synthesis: CREATE TABLE scripts and ALTER scripts for columns,
//! constraints and indexes.
//!
//! All comparisons are directional: `desired` is the source-side state the
//! script converges toward, `current` is the target-side state being
//! patched. Generated statements are idempotent (`IF NOT EXISTS` /
//! `IF EXISTS`) so re-running a script against an already-patched target
//! is harmless.

pub mod depgraph;
pub mod order;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::catalog::{
    CatalogReader, ColumnMeta, ConstraintKind, ConstraintMeta, Fetched, IndexMeta, SequenceMeta,
};
use crate::config::Conventions;
use crate::db::SqlExecutor;
use crate::error::Result;

/// Matches the quoted sequence name inside a `nextval('...')` default.
static SEQUENCE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"'([^']+)'").unwrap_or_else(|e| panic!("invalid sequence regex: {e}"))
});

/// Primary/unique constraint names recorded while comparing or rendering
/// constraints. Index comparison consults this to skip constraint-backed
/// indexes, which postgres manages through the constraint itself.
///
/// Scoped to one table comparison; callers thread it from the constraint
/// step into the index step explicitly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintClassification {
    /// Names of primary-key constraints.
    pub primary: Vec<String>,

    /// Names of unique constraints.
    pub unique: Vec<String>,
}

impl ConstraintClassification {
    /// Classify every primary/unique constraint in the slice.
    pub fn classify(constraints: &[ConstraintMeta]) -> Self {
        let mut classification = Self::default();
        for constraint in constraints {
            classification.record(constraint);
        }
        classification
    }

    /// Record one constraint if it is primary or unique.
    pub fn record(&mut self, constraint: &ConstraintMeta) {
        match constraint.kind {
            ConstraintKind::Primary => self.primary.push(constraint.name.clone()),
            ConstraintKind::Unique => self.unique.push(constraint.name.clone()),
            _ => {}
        }
    }

    /// Whether an index of this name is backed by a recorded constraint.
    pub fn covers(&self, index_name: &str) -> bool {
        self.primary.iter().any(|n| n == index_name) || self.unique.iter().any(|n| n == index_name)
    }
}

/// Looks up sequence details by name on one side of the comparison.
#[async_trait]
pub trait SequenceLookup: Send + Sync {
    async fn sequence(&self, name: &str) -> Result<Fetched<SequenceMeta>>;
}

/// Live lookup through catalog introspection over an optional session.
pub struct CatalogSequences<'a> {
    catalog: &'a CatalogReader,
    session: Option<&'a dyn SqlExecutor>,
}

impl<'a> CatalogSequences<'a> {
    pub fn new(catalog: &'a CatalogReader, session: Option<&'a dyn SqlExecutor>) -> Self {
        Self { catalog, session }
    }
}

#[async_trait]
impl SequenceLookup for CatalogSequences<'_> {
    async fn sequence(&self, name: &str) -> Result<Fetched<SequenceMeta>> {
        self.catalog.sequence(self.session, name).await
    }
}

/// Synthesizes DDL for one table.
pub struct DdlSynthesizer<'a> {
    table: &'a str,
    schema: &'a str,
    conventions: &'a Conventions,
}

impl<'a> DdlSynthesizer<'a> {
    pub fn new(table: &'a str, schema: &'a str, conventions: &'a Conventions) -> Self {
        Self {
            table,
            schema,
            conventions,
        }
    }

    /// Render the type/nullability/default portion of a column definition.
    ///
    /// Serial-backed int4/int8 columns are rewritten to `serial4`/`serial8`
    /// so the sequence is created with the table; their `nextval` default
    /// is then omitted since the serial form implies it.
    pub fn column_definition(&self, col: &ColumnMeta) -> String {
        let serial_expr = col
            .serial_sequence
            .as_deref()
            .or(col.default_expr.as_deref());
        let sequence_backed = serial_expr.is_some_and(|e| e.contains("_seq"));

        let mut definition = match (col.udt_name.as_str(), sequence_backed) {
            ("int4", true) => "serial4".to_string(),
            ("int8", true) => "serial8".to_string(),
            _ => col.udt_name.clone(),
        };

        if let Some(len) = col.char_max_length {
            definition.push_str(&format!("({len})"));
        }

        if !col.is_nullable {
            definition.push_str(" NOT NULL");
        }

        if let Some(default) = &col.default_expr {
            if !default.contains("_seq") && col.serial_sequence.is_none() {
                definition.push_str(&format!(" DEFAULT {default}"));
            }
        }

        definition
    }

    /// Compare column sets and render an ALTER script, or `None` when the
    /// sides already agree. Statement groups are ordered drops, then adds,
    /// then modifications.
    ///
    /// Sequence-backed defaults trigger a lookup on both sides: when the
    /// desired default references a sequence the target lacks, a
    /// `CREATE SEQUENCE` statement is emitted ahead of the `SET DEFAULT`.
    pub async fn compare_columns(
        &self,
        desired: &[ColumnMeta],
        current: &[ColumnMeta],
        source_sequences: &dyn SequenceLookup,
        target_sequences: &dyn SequenceLookup,
    ) -> Result<Option<String>> {
        let mut adds = Vec::new();
        let mut drops = Vec::new();
        let mut modifies = Vec::new();

        for col in desired {
            match current.iter().find(|c| c.name == col.name) {
                None => adds.push(format!(
                    "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {};",
                    self.table,
                    col.name,
                    self.column_definition(col)
                )),
                Some(existing) => {
                    if let Some(stmt) = self
                        .modify_statements(col, existing, source_sequences, target_sequences)
                        .await?
                    {
                        modifies.push(stmt);
                    }
                }
            }
        }

        for col in current {
            if !desired.iter().any(|c| c.name == col.name) {
                drops.push(format!(
                    "ALTER TABLE {} DROP COLUMN IF EXISTS {} CASCADE;",
                    self.table, col.name
                ));
            }
        }

        Ok(join_groups(&[drops, adds, modifies]))
    }

    /// ALTER statements reconciling one column present on both sides.
    async fn modify_statements(
        &self,
        desired: &ColumnMeta,
        current: &ColumnMeta,
        source_sequences: &dyn SequenceLookup,
        target_sequences: &dyn SequenceLookup,
    ) -> Result<Option<String>> {
        let mut statements = Vec::new();

        if desired.data_type != current.data_type
            || desired.char_max_length != current.char_max_length
        {
            let mut stmt = format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {}",
                self.table, desired.name, desired.udt_name
            );
            if let Some(len) = desired.char_max_length {
                stmt.push_str(&format!("({len})"));
            }
            stmt.push(';');
            statements.push(stmt);
        }

        if desired.is_nullable != current.is_nullable {
            let action = if desired.is_nullable {
                "DROP NOT NULL"
            } else {
                "SET NOT NULL"
            };
            statements.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} {};",
                self.table, desired.name, action
            ));
        }

        if let Some(default) = &desired.default_expr {
            if default.contains("_seq") {
                if let Some(sequence_name) = extract_sequence_name(default) {
                    let on_source = source_sequences.sequence(&sequence_name).await?;
                    let on_target = target_sequences.sequence(&sequence_name).await?;
                    if let (Fetched::Rows(found), Fetched::Rows(missing)) = (on_source, on_target) {
                        if let (Some(seq), true) = (found.first(), missing.is_empty()) {
                            statements.push(render_create_sequence(seq));
                        }
                    }
                }
            }
        }

        if desired.default_expr != current.default_expr {
            match &desired.default_expr {
                Some(default) => statements.push(format!(
                    "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
                    self.table, desired.name, default
                )),
                None => statements.push(format!(
                    "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;",
                    self.table, desired.name
                )),
            }
        }

        if statements.is_empty() {
            Ok(None)
        } else {
            Ok(Some(statements.join("\n")))
        }
    }

    /// Compare constraint sets. Change detection is by definition text, not
    /// name alone, so a redefined constraint is dropped and re-added. Drops
    /// precede adds, which permits rename-by-replacement without collision.
    ///
    /// Returns the script (or `None`) plus the classification of desired
    /// primary/unique names for the subsequent index comparison.
    pub fn compare_constraints(
        &self,
        desired: &[ConstraintMeta],
        current: &[ConstraintMeta],
    ) -> (Option<String>, ConstraintClassification) {
        let mut classification = ConstraintClassification::default();
        let mut drops = Vec::new();
        let mut adds = Vec::new();

        for constraint in current {
            let unchanged = desired
                .iter()
                .any(|c| c.name == constraint.name && c.definition == constraint.definition);
            if !unchanged {
                drops.push(format!(
                    "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {} CASCADE;",
                    self.table, constraint.name
                ));
            }
        }

        for constraint in desired {
            let unchanged = current
                .iter()
                .any(|c| c.name == constraint.name && c.definition == constraint.definition);
            if !unchanged {
                classification.record(constraint);
                adds.push(format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} {};",
                    self.table, constraint.name, constraint.definition
                ));
            }
        }

        (join_groups(&[drops, adds]), classification)
    }

    /// Compare index sets, skipping any index whose name the classification
    /// marks as constraint-backed. Created definitions are rewritten to be
    /// idempotent and schema-unqualified.
    pub fn compare_indexes(
        &self,
        desired: &[IndexMeta],
        current: &[IndexMeta],
        classification: &ConstraintClassification,
    ) -> Option<String> {
        let mut drops = Vec::new();
        let mut creates = Vec::new();

        for index in current {
            if classification.covers(&index.name) {
                continue;
            }
            let unchanged = desired
                .iter()
                .any(|i| i.name == index.name && i.definition == index.definition);
            if !unchanged {
                drops.push(format!("DROP INDEX IF EXISTS {};", index.name));
            }
        }

        for index in desired {
            if classification.covers(&index.name) {
                continue;
            }
            let unchanged = current
                .iter()
                .any(|i| i.name == index.name && i.definition == index.definition);
            if !unchanged {
                creates.push(format!("{};", self.resolve_index_definition(&index.definition)));
            }
        }

        join_groups(&[drops, creates])
    }

    /// Render a full `CREATE TABLE IF NOT EXISTS` script: reordered column
    /// lines, one `CONSTRAINT` line per constraint, then non-constraint
    /// index statements after the closing paren.
    pub fn create_table_script(
        &self,
        columns: &[ColumnMeta],
        constraints: &[ConstraintMeta],
        indexes: &[IndexMeta],
    ) -> (String, ConstraintClassification) {
        let classification = ConstraintClassification::classify(constraints);
        let ordered = order::arrange_columns(columns, constraints, self.conventions);

        let mut lines: Vec<String> = ordered
            .iter()
            .map(|col| format!("  {} {}", col.name, self.column_definition(col)))
            .collect();

        for constraint in constraints {
            lines.push(format!(
                "  CONSTRAINT {} {}",
                constraint.name, constraint.definition
            ));
        }

        let mut script = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
            self.table,
            lines.join(",\n")
        );

        for index in indexes {
            if !classification.covers(&index.name) {
                script.push('\n');
                script.push_str(&self.resolve_index_definition(&index.definition));
                script.push(';');
            }
        }

        (script, classification)
    }

    /// Make a fetched index definition idempotent and schema-relative:
    /// strip the explicit schema qualifier and insert `IF NOT EXISTS`.
    fn resolve_index_definition(&self, definition: &str) -> String {
        let qualifier = format!("{}.", self.schema);
        let stripped = definition.replace(&qualifier, "");
        if stripped.contains("CREATE UNIQUE INDEX") {
            stripped.replacen("CREATE UNIQUE INDEX", "CREATE UNIQUE INDEX IF NOT EXISTS", 1)
        } else {
            stripped.replacen("CREATE INDEX", "CREATE INDEX IF NOT EXISTS", 1)
        }
    }
}

/// Render a `CREATE SEQUENCE` statement from fetched sequence details.
pub fn render_create_sequence(seq: &SequenceMeta) -> String {
    let cycle = if seq.cycle { "CYCLE" } else { "NO CYCLE" };
    format!(
        "CREATE SEQUENCE {}.{}\n  AS {}\n  START WITH {}\n  INCREMENT BY {}\n  MINVALUE {}\n  MAXVALUE {}\n  CACHE {}\n  {};",
        seq.schema,
        seq.name,
        seq.data_type,
        seq.start_value,
        seq.increment_by,
        seq.min_value,
        seq.max_value,
        seq.cache_size,
        cycle
    )
}

/// Pull the sequence name out of a `nextval('<name>'::regclass)` default.
pub fn extract_sequence_name(default_expr: &str) -> Option<String> {
    SEQUENCE_NAME_RE
        .captures(default_expr)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Join non-empty statement groups with newlines; `None` when all empty.
fn join_groups(groups: &[Vec<String>]) -> Option<String> {
    let blocks: Vec<String> = groups
        .iter()
        .filter(|g| !g.is_empty())
        .map(|g| g.join("\n"))
        .collect();
    if blocks.is_empty() {
        None
    } else {
        Some(blocks.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conventions() -> Conventions {
        Conventions::default()
    }

    struct FixedSequences(Fetched<SequenceMeta>);

    #[async_trait]
    impl SequenceLookup for FixedSequences {
        async fn sequence(&self, _name: &str) -> Result<Fetched<SequenceMeta>> {
            Ok(self.0.clone())
        }
    }

    fn no_sequences() -> FixedSequences {
        FixedSequences(Fetched::Unavailable)
    }

    fn sequence_meta(name: &str) -> SequenceMeta {
        SequenceMeta {
            schema: "public".to_string(),
            name: name.to_string(),
            data_type: "integer".to_string(),
            start_value: 1,
            min_value: 1,
            max_value: 2147483647,
            increment_by: 1,
            cycle: false,
            cache_size: 1,
        }
    }

    fn col(name: &str, udt: &str) -> ColumnMeta {
        ColumnMeta {
            name: name.to_string(),
            data_type: udt.to_string(),
            udt_name: udt.to_string(),
            char_max_length: None,
            numeric_precision: None,
            numeric_scale: None,
            is_nullable: true,
            default_expr: None,
            serial_sequence: None,
        }
    }

    fn constraint(name: &str, kind: ConstraintKind, definition: &str) -> ConstraintMeta {
        ConstraintMeta {
            name: name.to_string(),
            kind,
            definition: definition.to_string(),
            columns: Vec::new(),
            ref_table: None,
        }
    }

    #[test]
    fn test_column_definition_varchar_not_null_default() {
        let conv = conventions();
        let synth = DdlSynthesizer::new("users", "public", &conv);
        let mut c = col("status", "varchar");
        c.char_max_length = Some(20);
        c.is_nullable = false;
        c.default_expr = Some("'active'::character varying".to_string());
        assert_eq!(
            synth.column_definition(&c),
            "varchar(20) NOT NULL DEFAULT 'active'::character varying"
        );
    }

    #[test]
    fn test_column_definition_serial_rewrite() {
        let conv = conventions();
        let synth = DdlSynthesizer::new("users", "public", &conv);

        let mut id = col("id", "int4");
        id.is_nullable = false;
        id.default_expr = Some("nextval('users_id_seq'::regclass)".to_string());
        id.serial_sequence = Some("public.users_id_seq".to_string());
        assert_eq!(synth.column_definition(&id), "serial4 NOT NULL");

        let mut big = col("id", "int8");
        big.default_expr = Some("nextval('events_id_seq'::regclass)".to_string());
        assert_eq!(synth.column_definition(&big), "serial8");
    }

    #[test]
    fn test_column_definition_sequence_default_not_repeated() {
        // The nextval default is implied by the serial form and must not
        // also appear as DEFAULT.
        let conv = conventions();
        let synth = DdlSynthesizer::new("users", "public", &conv);
        let mut c = col("id", "int4");
        c.default_expr = Some("nextval('users_id_seq'::regclass)".to_string());
        assert!(!synth.column_definition(&c).contains("DEFAULT"));
    }

    #[tokio::test]
    async fn test_compare_columns_add_and_drop() {
        let conv = conventions();
        let synth = DdlSynthesizer::new("users", "public", &conv);

        let mut email = col("email", "varchar");
        email.char_max_length = Some(255);
        let desired = vec![col("id", "int4"), email];
        let current = vec![col("id", "int4"), col("legacy_flag", "bool")];

        let script = synth
            .compare_columns(&desired, &current, &no_sequences(), &no_sequences())
            .await
            .ok()
            .flatten()
            .unwrap_or_default();

        let expected = "ALTER TABLE users DROP COLUMN IF EXISTS legacy_flag CASCADE;\n\
                        ALTER TABLE users ADD COLUMN IF NOT EXISTS email varchar(255);";
        assert_eq!(script, expected);
    }

    #[tokio::test]
    async fn test_compare_columns_no_changes_is_none() {
        let conv = conventions();
        let synth = DdlSynthesizer::new("users", "public", &conv);
        let cols = vec![col("id", "int4")];
        let script = synth
            .compare_columns(&cols, &cols, &no_sequences(), &no_sequences())
            .await
            .ok()
            .flatten();
        assert!(script.is_none());
    }

    #[tokio::test]
    async fn test_compare_columns_converges_after_patch() {
        // Re-running the comparison after the generated script has taken
        // effect on the target must produce nothing.
        let conv = conventions();
        let synth = DdlSynthesizer::new("users", "public", &conv);

        let mut name = col("name", "text");
        name.is_nullable = false;
        let mut email = col("email", "varchar");
        email.char_max_length = Some(255);
        let desired = vec![col("id", "int4"), name, email];
        let current = vec![col("id", "int4"), col("name", "text"), col("stale", "bool")];

        let first = synth
            .compare_columns(&desired, &current, &no_sequences(), &no_sequences())
            .await
            .ok()
            .flatten();
        assert!(first.is_some());

        // The script drops `stale`, adds `email` and sets `name` NOT NULL,
        // leaving the target's column set equal to the desired one.
        let patched = desired.clone();
        let second = synth
            .compare_columns(&desired, &patched, &no_sequences(), &no_sequences())
            .await
            .ok()
            .flatten();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_sequence_default_absent_on_target_creates_sequence() {
        let conv = conventions();
        let synth = DdlSynthesizer::new("orders", "public", &conv);

        let mut desired = col("id", "int4");
        desired.default_expr = Some("nextval('orders_id_seq'::regclass)".to_string());
        let current = col("id", "int4");

        let on_source = FixedSequences(Fetched::Rows(vec![sequence_meta("orders_id_seq")]));
        let on_target = FixedSequences(Fetched::Rows(Vec::new()));

        let script = synth
            .compare_columns(&[desired], &[current], &on_source, &on_target)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();

        let create = script
            .find("CREATE SEQUENCE public.orders_id_seq")
            .unwrap_or(usize::MAX);
        let set_default = script
            .find("SET DEFAULT nextval('orders_id_seq'::regclass);")
            .unwrap_or(0);
        assert!(create < set_default, "unexpected script: {script}");
    }

    #[tokio::test]
    async fn test_sequence_default_present_on_target_skips_create() {
        let conv = conventions();
        let synth = DdlSynthesizer::new("orders", "public", &conv);

        let mut desired = col("id", "int4");
        desired.default_expr = Some("nextval('orders_id_seq'::regclass)".to_string());
        let current = col("id", "int4");

        let on_source = FixedSequences(Fetched::Rows(vec![sequence_meta("orders_id_seq")]));
        let on_target = FixedSequences(Fetched::Rows(vec![sequence_meta("orders_id_seq")]));

        let script = synth
            .compare_columns(&[desired], &[current], &on_source, &on_target)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();

        assert!(!script.contains("CREATE SEQUENCE"));
        assert_eq!(
            script,
            "ALTER TABLE orders ALTER COLUMN id SET DEFAULT nextval('orders_id_seq'::regclass);"
        );
    }

    #[tokio::test]
    async fn test_compare_columns_nullability_and_default() {
        let conv = conventions();
        let synth = DdlSynthesizer::new("users", "public", &conv);

        let mut desired = col("name", "text");
        desired.is_nullable = false;
        desired.default_expr = Some("'unknown'::text".to_string());
        let current = col("name", "text");

        let script = synth
            .compare_columns(&[desired], &[current], &no_sequences(), &no_sequences())
            .await
            .ok()
            .flatten()
            .unwrap_or_default();

        let expected = "ALTER TABLE users ALTER COLUMN name SET NOT NULL;\n\
                        ALTER TABLE users ALTER COLUMN name SET DEFAULT 'unknown'::text;";
        assert_eq!(script, expected);
    }

    #[test]
    fn test_compare_constraints_drop_before_add() {
        let conv = conventions();
        let synth = DdlSynthesizer::new("orders", "public", &conv);

        let desired = vec![constraint(
            "orders_user_fk",
            ConstraintKind::Foreign,
            "FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE",
        )];
        let current = vec![constraint(
            "orders_user_fk",
            ConstraintKind::Foreign,
            "FOREIGN KEY (user_id) REFERENCES users(id)",
        )];

        let (script, classification) = synth.compare_constraints(&desired, &current);
        let expected = "ALTER TABLE orders DROP CONSTRAINT IF EXISTS orders_user_fk CASCADE;\n\
                        ALTER TABLE orders ADD CONSTRAINT orders_user_fk FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE;";
        assert_eq!(script.as_deref(), Some(expected));
        assert!(classification.primary.is_empty());
        assert!(classification.unique.is_empty());
    }

    #[test]
    fn test_compare_constraints_classifies_added_keys() {
        let conv = conventions();
        let synth = DdlSynthesizer::new("users", "public", &conv);

        let desired = vec![
            constraint("users_pkey", ConstraintKind::Primary, "PRIMARY KEY (id)"),
            constraint("users_email_key", ConstraintKind::Unique, "UNIQUE (email)"),
        ];
        let (script, classification) = synth.compare_constraints(&desired, &[]);

        assert!(script.is_some());
        assert_eq!(classification.primary, vec!["users_pkey"]);
        assert_eq!(classification.unique, vec!["users_email_key"]);
    }

    #[test]
    fn test_compare_indexes_skips_constraint_backed() {
        let conv = conventions();
        let synth = DdlSynthesizer::new("users", "public", &conv);

        let mut classification = ConstraintClassification::default();
        classification.primary.push("users_pkey".to_string());

        let desired = vec![
            IndexMeta {
                name: "users_pkey".to_string(),
                definition: "CREATE UNIQUE INDEX users_pkey ON public.users USING btree (id)"
                    .to_string(),
            },
            IndexMeta {
                name: "users_email_idx".to_string(),
                definition: "CREATE INDEX users_email_idx ON public.users USING btree (email)"
                    .to_string(),
            },
        ];

        // users_pkey differs between sides but is constraint-backed, so it
        // must never surface in DROP INDEX / CREATE INDEX output.
        let current = vec![IndexMeta {
            name: "users_pkey".to_string(),
            definition: "CREATE UNIQUE INDEX users_pkey ON public.users USING btree (id, tenant_id)"
                .to_string(),
        }];

        let script = synth.compare_indexes(&desired, &current, &classification);
        assert_eq!(
            script.as_deref(),
            Some("CREATE INDEX IF NOT EXISTS users_email_idx ON users USING btree (email);")
        );
    }

    #[test]
    fn test_compare_indexes_changed_definition_recreated() {
        let conv = conventions();
        let synth = DdlSynthesizer::new("users", "public", &conv);
        let classification = ConstraintClassification::default();

        let desired = vec![IndexMeta {
            name: "users_email_idx".to_string(),
            definition: "CREATE UNIQUE INDEX users_email_idx ON public.users USING btree (lower(email))".to_string(),
        }];
        let current = vec![IndexMeta {
            name: "users_email_idx".to_string(),
            definition: "CREATE INDEX users_email_idx ON public.users USING btree (email)"
                .to_string(),
        }];

        let script = synth
            .compare_indexes(&desired, &current, &classification)
            .unwrap_or_default();
        let expected = "DROP INDEX IF EXISTS users_email_idx;\n\
                        CREATE UNIQUE INDEX IF NOT EXISTS users_email_idx ON users USING btree (lower(email));";
        assert_eq!(script, expected);
    }

    #[test]
    fn test_create_table_script_shape() {
        let conv = conventions();
        let synth = DdlSynthesizer::new("users", "public", &conv);

        let mut id = col("id", "int4");
        id.is_nullable = false;
        id.serial_sequence = Some("public.users_id_seq".to_string());
        id.default_expr = Some("nextval('users_id_seq'::regclass)".to_string());
        let mut email = col("email", "varchar");
        email.char_max_length = Some(255);

        let constraints = vec![ConstraintMeta {
            name: "users_pkey".to_string(),
            kind: ConstraintKind::Primary,
            definition: "PRIMARY KEY (id)".to_string(),
            columns: vec!["id".to_string()],
            ref_table: None,
        }];
        let indexes = vec![
            IndexMeta {
                name: "users_pkey".to_string(),
                definition: "CREATE UNIQUE INDEX users_pkey ON public.users USING btree (id)"
                    .to_string(),
            },
            IndexMeta {
                name: "users_email_idx".to_string(),
                definition: "CREATE INDEX users_email_idx ON public.users USING btree (email)"
                    .to_string(),
            },
        ];

        let (script, classification) =
            synth.create_table_script(&[email, id], &constraints, &indexes);

        let expected = "CREATE TABLE IF NOT EXISTS users (\n  \
                        id serial4 NOT NULL,\n  \
                        email varchar(255),\n  \
                        CONSTRAINT users_pkey PRIMARY KEY (id)\n);\n\
                        CREATE INDEX IF NOT EXISTS users_email_idx ON users USING btree (email);";
        assert_eq!(script, expected);
        assert!(classification.covers("users_pkey"));
    }

    #[test]
    fn test_extract_sequence_name() {
        assert_eq!(
            extract_sequence_name("nextval('users_id_seq'::regclass)").as_deref(),
            Some("users_id_seq")
        );
        assert_eq!(extract_sequence_name("42"), None);
    }

    #[test]
    fn test_render_create_sequence() {
        let seq = SequenceMeta {
            schema: "public".to_string(),
            name: "users_id_seq".to_string(),
            data_type: "integer".to_string(),
            start_value: 1,
            min_value: 1,
            max_value: 2147483647,
            increment_by: 1,
            cycle: false,
            cache_size: 1,
        };
        let sql = render_create_sequence(&seq);
        assert!(sql.starts_with("CREATE SEQUENCE public.users_id_seq"));
        assert!(sql.contains("START WITH 1"));
        assert!(sql.ends_with("NO CYCLE;"));
    }
}
