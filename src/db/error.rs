//! DAO error type.
//!
//! Per spec §7, SQL execution failure — including querying a service whose
//! table does not exist — surfaces as a single categorical error; there is
//! no separate "table not found" variant, since SQLite already reports that
//! as a query error. `InvalidIdentifier` is the one addition: it catches a
//! caller passing an unknown field/group name *before* it would otherwise be
//! interpolated into SQL, since those names can never be bind parameters.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    #[error("unknown column: {0}")]
    InvalidIdentifier(String),
}

impl DbError {
    /// True if this looks like "no such table" — lets callers distinguish an
    /// invalid/absent service from a genuine DB outage.
    #[must_use]
    pub fn is_missing_table(&self) -> bool {
        matches!(self, Self::Sql(sqlx::Error::Database(e)) if e.message().contains("no such table"))
    }
}
