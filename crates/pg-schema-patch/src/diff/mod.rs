//! Set-difference utilities used by every comparison operation.
//!
//! Diffs are directional: the first collection is the desired/source state,
//! the second the current/target state. Additions come from entries unique
//! to the first, drops from entries unique to the second (callers swap the
//! arguments for the drop pass).

use std::collections::HashMap;

use crate::catalog::DataRow;

/// Delimiter between compare-column values in a composite row key. A
/// non-printing separator avoids collisions between adjacent values.
const KEY_DELIMITER: char = '\x1f';

/// Elements of `a` whose key is absent from `b`.
pub fn keyed_difference<'a, T, K, F>(a: &'a [T], b: &[T], key_fn: F) -> Vec<&'a T>
where
    K: std::hash::Hash + Eq,
    F: Fn(&T) -> K,
{
    let known: HashMap<K, ()> = b.iter().map(|item| (key_fn(item), ())).collect();
    a.iter().filter(|item| !known.contains_key(&key_fn(item))).collect()
}

/// Rows of `a` whose compare-column projection has no counterpart in `b`.
///
/// This is an identity diff, not a structural one: a row present on both
/// sides with differing non-key columns is not reported. Seed sync is
/// insert-missing, never update-existing.
pub fn row_difference<'a>(
    a: &'a [DataRow],
    b: &[DataRow],
    compare_columns: &[String],
) -> Vec<&'a DataRow> {
    let known: HashMap<String, ()> = b
        .iter()
        .map(|row| (composite_key(row, compare_columns), ()))
        .collect();

    a.iter()
        .filter(|row| !known.contains_key(&composite_key(row, compare_columns)))
        .collect()
}

/// Build the composite identity key for one row.
fn composite_key(row: &DataRow, compare_columns: &[String]) -> String {
    let mut key = String::new();
    for col in compare_columns {
        match row.get(col) {
            Some(value) => key.push_str(&value.to_string()),
            None => key.push_str("null"),
        }
        key.push(KEY_DELIMITER);
    }
    key
}
