//! Column ordering for rendered CREATE TABLE statements.
//!
//! Generated DDL lists primary-key columns first, then ordinary columns in
//! catalog order, then attribute (flexfield) columns sorted by prefix rank
//! and numeric suffix, then the tenant block, then the audit block.

use crate::catalog::{ColumnMeta, ConstraintKind, ConstraintMeta};
use crate::config::Conventions;

/// Reorder `columns` for CREATE TABLE rendering. Primary-key membership
/// comes from the constraint's structured column list, never from its
/// definition text.
pub fn arrange_columns<'a>(
    columns: &'a [ColumnMeta],
    constraints: &[ConstraintMeta],
    conventions: &Conventions,
) -> Vec<&'a ColumnMeta> {
    let pk_columns: &[String] = constraints
        .iter()
        .find(|c| c.kind == ConstraintKind::Primary)
        .map(|c| c.columns.as_slice())
        .unwrap_or(&[]);

    let mut leading: Vec<&ColumnMeta> = Vec::new();
    let mut plain: Vec<&ColumnMeta> = Vec::new();
    let mut attrs: Vec<&ColumnMeta> = Vec::new();
    let mut tenant: Vec<Option<&ColumnMeta>> = vec![None; conventions.tenant_columns.len()];
    let mut audit: Vec<Option<&ColumnMeta>> = vec![None; conventions.audit_columns.len()];

    for column in columns {
        if pk_columns.contains(&column.name) {
            leading.push(column);
        } else if column.name.contains(&conventions.attr_marker) {
            attrs.push(column);
        } else if let Some(pos) = conventions.tenant_columns.iter().position(|t| *t == column.name) {
            tenant[pos] = Some(column);
        } else if let Some(pos) = conventions.audit_columns.iter().position(|a| *a == column.name) {
            audit[pos] = Some(column);
        } else {
            plain.push(column);
        }
    }

    attrs.sort_by_key(|c| attr_rank(&c.name, &conventions.attr_prefix_order));

    leading.extend(plain);
    leading.extend(attrs);
    leading.extend(tenant.into_iter().flatten());
    leading.extend(audit.into_iter().flatten());
    leading
}

/// Sort key for an attribute column: (prefix rank, numeric suffix, name).
/// Columns that match no configured prefix sort after all that do.
fn attr_rank(name: &str, prefix_order: &[String]) -> (usize, u32, String) {
    for (rank, prefix) in prefix_order.iter().enumerate() {
        if let Some(rest) = name.strip_prefix(prefix.as_str()) {
            if let Some(digits) = rest.strip_prefix('_') {
                if let Ok(n) = digits.parse::<u32>() {
                    return (rank, n, name.to_string());
                }
            }
        }
    }
    (prefix_order.len(), 0, name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> ColumnMeta {
        ColumnMeta {
            name: name.to_string(),
            data_type: "integer".to_string(),
            udt_name: "int4".to_string(),
            char_max_length: None,
            numeric_precision: Some(32),
            numeric_scale: Some(0),
            is_nullable: true,
            default_expr: None,
            serial_sequence: None,
        }
    }

    fn pk(columns: &[&str]) -> ConstraintMeta {
        ConstraintMeta {
            name: "t_pkey".to_string(),
            kind: ConstraintKind::Primary,
            definition: format!("PRIMARY KEY ({})", columns.join(", ")),
            columns: columns.iter().map(|s| s.to_string()).collect(),
            ref_table: None,
        }
    }

    fn names(ordered: &[&ColumnMeta]) -> Vec<String> {
        ordered.iter().map(|c| c.name.clone()).collect()
    }

    #[test]
    fn test_primary_key_columns_lead() {
        let columns = vec![col("name"), col("user_id"), col("id"), col("email")];
        let constraints = vec![pk(&["id"])];
        let ordered = arrange_columns(&columns, &constraints, &Conventions::default());
        assert_eq!(names(&ordered), vec!["id", "name", "email", "user_id"]);
    }

    #[test]
    fn test_attr_columns_sorted_by_prefix_and_number() {
        let columns = vec![
            col("n_attr_2"),
            col("c_attr_10"),
            col("d_attr_1"),
            col("c_attr_2"),
            col("id"),
        ];
        let constraints = vec![pk(&["id"])];
        let ordered = arrange_columns(&columns, &constraints, &Conventions::default());
        assert_eq!(
            names(&ordered),
            vec!["id", "c_attr_2", "c_attr_10", "n_attr_2", "d_attr_1"]
        );
    }

    #[test]
    fn test_tenant_and_audit_blocks_trail_in_configured_order() {
        let columns = vec![
            col("creation_date"),
            col("tenant_id"),
            col("code"),
            col("object_version_number"),
            col("user_id"),
        ];
        let ordered = arrange_columns(&columns, &[], &Conventions::default());
        assert_eq!(
            names(&ordered),
            vec![
                "code",
                "tenant_id",
                "object_version_number",
                "user_id",
                "creation_date"
            ]
        );
    }

    #[test]
    fn test_absent_blocks_are_skipped() {
        let columns = vec![col("id"), col("code")];
        let ordered = arrange_columns(&columns, &[pk(&["id"])], &Conventions::default());
        assert_eq!(names(&ordered), vec!["id", "code"]);
    }

    #[test]
    fn test_unranked_attr_sorts_last() {
        let columns = vec![col("x_attr_1"), col("c_attr_1")];
        let ordered = arrange_columns(&columns, &[], &Conventions::default());
        assert_eq!(names(&ordered), vec!["c_attr_1", "x_attr_1"]);
    }
}
