//! Value parsers for CLI arguments.
//!
//! Each returns `Result<T, String>` so clap can show the message verbatim.

use mvgraph::TableRef;

/// Parse a `database.name` reference.
pub fn validate_table_ref(s: &str) -> Result<TableRef, String> {
    s.parse::<TableRef>().map_err(|e| e.to_string())
}

/// Parse a strictly positive count.
pub fn validate_positive(s: &str) -> Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(format!("'{s}' is not a number: {e}")),
    }
}

/// Parse a database name: non-empty, no dots or whitespace.
pub fn validate_database(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("database name cannot be empty".to_string());
    }
    if trimmed.contains('.') || trimmed.chars().any(char::is_whitespace) {
        return Err(format!("'{trimmed}' is not a database name"));
    }
    Ok(trimmed.to_string())
}
