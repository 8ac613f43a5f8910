///
/// sanitize_identifier
///
/// Reduce an arbitrary caller-supplied name (group, rank, or aggregate name)
/// to a safe SQL identifier fragment: every character outside
/// `[0-9A-Za-z_]` becomes `_`, and spaces are dropped entirely rather than
/// replaced, so `"per hour"` becomes `"perhour"` and `"spend$"` becomes
/// `"spend_"`.
///
/// Every identifier that ends up in adapter-generated DDL/DML (table names,
/// aggregate column prefixes) must pass through this function, and the
/// sanitized form (not the original) is the canonical name used on both the
/// write and read paths.
///
#[must_use]
pub fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Derive the deterministic table identifier for one `(group, rank, n)`.
#[must_use]
pub fn table_name(group: &str, rank: i64, rank_count: i64) -> String {
    format!(
        "{}_{}_of_{}",
        sanitize_identifier(group),
        rank,
        rank_count
    )
}

/// Derive the `<agg>_count` / `<agg>_value` column pair name for one
/// aggregate, already sanitized.
#[must_use]
pub fn aggregate_column_names(aggregate_name: &str) -> (String, String) {
    let base = sanitize_identifier(aggregate_name).to_lowercase();
    (format!("{base}_count"), format!("{base}_value"))
}
