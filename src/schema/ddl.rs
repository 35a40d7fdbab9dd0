//! DDL generation and the identifier-quoting helper the whole DAO leans on.
//!
//! Table (and, for `run()`-adjacent callers, column) names are never known at
//! compile time — they come from the service name or from an allowlisted
//! query parameter — so they can never be SQL bind parameters. Every place
//! that interpolates one goes through [`quote_ident`] first.

use super::record::FIELDS;

/// Quote a SQL identifier for SQLite, doubling any embedded `"` the way
/// standard SQL escaping requires. Callers are expected to have already
/// validated the identifier (service name regex, or the field/group
/// allowlist in `schema::record`) — this only prevents a stray quote in an
/// otherwise-valid name from breaking out of the identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `CREATE TABLE IF NOT EXISTS <service> (...)` for the declared Record
/// schema. `IF NOT EXISTS` makes table creation idempotent by construction,
/// satisfying the DDL-idempotence testable property without a separate
/// existence check in the caller.
pub fn create_table_sql(service: &str) -> String {
    let columns: Vec<String> = FIELDS
        .iter()
        .map(|f| {
            let suffix = if f.nullable { "" } else { " NOT NULL" };
            format!("{} {}{}", quote_ident(f.name), f.sql_type, suffix)
        })
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(service),
        columns.join(", ")
    )
}

/// `INSERT INTO <service> (...) VALUES (?, ?, ...)`, in `FIELDS` order so it
/// lines up with `Record::bind_into`.
pub fn insert_sql(service: &str) -> String {
    let columns: Vec<&str> = FIELDS.iter().map(|f| f.name).collect();
    let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders = vec!["?"; FIELDS.len()].join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(service),
        quoted.join(", "),
        placeholders
    )
}
