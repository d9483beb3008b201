//! SQL literal and identifier quoting

/// Single-quoted SQL string literal with embedded quotes doubled
///
/// # Examples
///
/// ```
/// use hrsn_orch::core::sql::quoted_literal;
///
/// assert_eq!(quoted_literal("O'Brien"), "'O''Brien'");
/// ```
pub fn quoted_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quoted literal, or `NULL` when absent
pub fn optional_literal(value: Option<&str>) -> String {
    value.map(quoted_literal).unwrap_or_else(|| "NULL".to_string())
}

/// Lowercase `[a-z0-9_]` table name derived from free text
///
/// Leading digits get a `t_` prefix so the result is always a bare identifier.
pub fn table_name_from(text: &str) -> String {
    let mut name: String = text
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    while name.contains("__") {
        name = name.replace("__", "_");
    }
    let name = name.trim_matches('_').to_string();
    match name.chars().next() {
        None => "unnamed".to_string(),
        Some(c) if c.is_ascii_digit() => format!("t_{name}"),
        Some(_) => name,
    }
}
