//! SQL literal encoding for seed row values.

use crate::catalog::CellValue;

/// Render one fetched cell as a SQL literal ready for a VALUES tuple.
///
/// Strings are escaped and single-quoted; JSON payloads are quoted and
/// cast `::json`; date-like values are truncated to `'YYYY-MM-DD'`.
pub fn sql_literal(value: &CellValue) -> String {
    match value {
        CellValue::Null => "NULL".to_string(),
        CellValue::Bool(v) => v.to_string(),
        CellValue::Int(v) => v.to_string(),
        CellValue::Float(v) => v.to_string(),
        CellValue::Decimal(v) => v.to_string(),
        CellValue::Text(v) => format!("'{}'", escape_string(v)),
        CellValue::Json(v) => format!("'{}'::json", escape_string(v)),
        CellValue::Date(v) => format!("'{}'", v.format("%Y-%m-%d")),
        CellValue::Timestamp(v) => format!("'{}'", v.date().format("%Y-%m-%d")),
        CellValue::TimestampTz(v) => format!("'{}'", v.date_naive().format("%Y-%m-%d")),
        CellValue::Uuid(v) => format!("'{v}'"),
    }
}

/// Escape a string for embedding in a single-quoted SQL literal.
/// Handles the quote itself, backslash, newline, carriage return and NUL.
pub fn escape_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    #[test]
    fn test_escape_quote_backslash_newline() {
        assert_eq!(escape_string("it's"), "it''s");
        assert_eq!(escape_string(r"a\b"), r"a\\b");
        assert_eq!(escape_string("line1\nline2"), r"line1\nline2");
        assert_eq!(escape_string("a\rb"), r"a\rb");
        assert_eq!(escape_string("a\0b"), r"a\0b");
    }

    #[test]
    fn test_escape_reversible_by_sql_grammar() {
        // Undoing the escapes must reconstruct the original bytes.
        let original = "it's a \\ path\nwith lines";
        let escaped = escape_string(original);
        let unescaped = escaped
            .replace(r"\n", "\n")
            .replace(r"\r", "\r")
            .replace(r"\0", "\0")
            .replace(r"\\", "\\")
            .replace("''", "'");
        assert_eq!(unescaped, original);
    }

    #[test]
    fn test_text_literal_quoted() {
        assert_eq!(
            sql_literal(&CellValue::Text("o'brien".to_string())),
            "'o''brien'"
        );
    }

    #[test]
    fn test_json_literal_cast() {
        assert_eq!(
            sql_literal(&CellValue::Json(r#"{"k":"v"}"#.to_string())),
            r#"'{"k":"v"}'::json"#
        );
    }

    #[test]
    fn test_date_like_values_truncate_to_day() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(sql_literal(&CellValue::Date(date)), "'2024-03-09'");

        let ts = NaiveDateTime::new(date, NaiveTime::from_hms_opt(13, 45, 7).unwrap());
        assert_eq!(sql_literal(&CellValue::Timestamp(ts)), "'2024-03-09'");
    }

    #[test]
    fn test_scalar_literals() {
        assert_eq!(sql_literal(&CellValue::Null), "NULL");
        assert_eq!(sql_literal(&CellValue::Bool(true)), "true");
        assert_eq!(sql_literal(&CellValue::Int(42)), "42");
    }
}
