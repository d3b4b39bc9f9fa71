//! Table dependency ordering for multi-table CREATE output.
//!
//! Each table node carries the list of tables its foreign keys reference.
//! Kahn's algorithm emits referenced tables before their dependents; the
//! walk is seeded in input order so the result is deterministic across
//! runs. Cycle members never reach zero in-degree and are appended at the
//! end, still in input order, and reported through `unresolved` so callers
//! needing strict ordering can fail or review.

use std::collections::{HashMap, VecDeque};

use crate::catalog::{ConstraintKind, ConstraintMeta};

/// A topological ordering result.
#[derive(Debug, Clone, PartialEq)]
pub struct TableOrder {
    /// Table names, referenced tables first. Always contains every input
    /// node, including cycle members.
    pub ordered: Vec<String>,

    /// Nodes that were part of a reference cycle. The ordered output
    /// includes them, but statements for them may not be executable as-is.
    pub unresolved: Vec<String>,
}

/// Names of tables referenced by the foreign keys in `constraints`,
/// taken from the structured catalog join rather than definition text.
pub fn foreign_key_tables(constraints: &[ConstraintMeta]) -> Vec<String> {
    constraints
        .iter()
        .filter(|c| c.kind == ConstraintKind::Foreign)
        .filter_map(|c| c.ref_table.clone())
        .collect()
}

/// Topologically sort tables by their references. `tables` pairs each
/// table name with the tables it references; references to tables outside
/// the input set are added as standalone nodes so they still sort first.
pub fn order_tables(tables: &[(String, Vec<String>)]) -> TableOrder {
    let mut nodes: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let add_node = |name: &str, nodes: &mut Vec<String>, index: &mut HashMap<String, usize>| {
        if !index.contains_key(name) {
            index.insert(name.to_string(), nodes.len());
            nodes.push(name.to_string());
        }
    };

    for (table, refs) in tables {
        add_node(table, &mut nodes, &mut index);
        for referenced in refs {
            add_node(referenced, &mut nodes, &mut index);
        }
    }

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut in_degree: Vec<usize> = vec![0; nodes.len()];

    for (table, refs) in tables {
        let table_idx = index[table.as_str()];
        for referenced in refs {
            let ref_idx = index[referenced.as_str()];
            if ref_idx == table_idx {
                // A self-reference can never be satisfied by ordering.
                continue;
            }
            dependents[ref_idx].push(table_idx);
            in_degree[table_idx] += 1;
        }
    }

    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut emitted = vec![false; nodes.len()];
    let mut ordered: Vec<String> = Vec::with_capacity(nodes.len());

    while let Some(node) = queue.pop_front() {
        emitted[node] = true;
        ordered.push(nodes[node].clone());
        for &dependent in &dependents[node] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    let unresolved: Vec<String> = (0..nodes.len())
        .filter(|&i| !emitted[i])
        .map(|i| nodes[i].clone())
        .collect();
    ordered.extend(unresolved.iter().cloned());

    TableOrder { ordered, unresolved }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(pairs: &[(&str, &[&str])]) -> Vec<(String, Vec<String>)> {
        pairs
            .iter()
            .map(|(t, refs)| {
                (
                    t.to_string(),
                    refs.iter().map(|r| r.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_referenced_tables_come_first() {
        let order = order_tables(&deps(&[
            ("orders", &["users"]),
            ("users", &[]),
            ("order_lines", &["orders"]),
        ]));
        let pos = |name: &str| order.ordered.iter().position(|t| t == name);
        assert!(pos("users") < pos("orders"));
        assert!(pos("orders") < pos("order_lines"));
        assert!(order.unresolved.is_empty());
    }

    #[test]
    fn test_deterministic_for_independent_tables() {
        let input = deps(&[("c", &[]), ("a", &[]), ("b", &[])]);
        let order = order_tables(&input);
        assert_eq!(order.ordered, vec!["c", "a", "b"]);
        assert_eq!(order_tables(&input).ordered, order.ordered);
    }

    #[test]
    fn test_cycle_members_appended_and_reported() {
        let order = order_tables(&deps(&[
            ("a", &["b"]),
            ("b", &["a"]),
            ("standalone", &[]),
        ]));
        assert_eq!(order.ordered, vec!["standalone", "a", "b"]);
        assert_eq!(order.unresolved, vec!["a", "b"]);
    }

    #[test]
    fn test_self_reference_does_not_block() {
        let order = order_tables(&deps(&[("nodes", &["nodes"])]));
        assert_eq!(order.ordered, vec!["nodes"]);
        assert!(order.unresolved.is_empty());
    }

    #[test]
    fn test_external_reference_becomes_node() {
        let order = order_tables(&deps(&[("orders", &["users"])]));
        assert_eq!(order.ordered, vec!["users", "orders"]);
        assert!(order.unresolved.is_empty());
    }

    #[test]
    fn test_foreign_key_tables_extraction() {
        let constraints = vec![
            ConstraintMeta {
                name: "orders_user_fk".to_string(),
                kind: ConstraintKind::Foreign,
                definition: "FOREIGN KEY (user_id) REFERENCES users(id)".to_string(),
                columns: vec!["user_id".to_string()],
                ref_table: Some("users".to_string()),
            },
            ConstraintMeta {
                name: "orders_pkey".to_string(),
                kind: ConstraintKind::Primary,
                definition: "PRIMARY KEY (id)".to_string(),
                columns: vec!["id".to_string()],
                ref_table: None,
            },
        ];
        assert_eq!(foreign_key_tables(&constraints), vec!["users"]);
    }
}
