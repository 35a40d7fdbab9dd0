//! The Record type and its declarative field list.
//!
//! `FIELDS` is the single source of truth for column order, SQL type, and
//! nullability. DDL generation, row encoding, and row decoding all walk this
//! list instead of hand-duplicating it — see `schema::ddl` and the
//! `Record::from_row` / `Record::bind_into` pair below.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// A single enriched HTTP-access entry, ready to be staged or persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub datetime: DateTime<Utc>,
    pub date: NaiveDate,
    pub host: String,
    pub path: String,
    pub status: i16,
    pub length: i64,
    pub generation_time: f64,
    pub referer: Option<String>,
    pub ip: IpAddr,
    pub country_iso_code: Option<String>,
    pub platform_name: Option<String>,
    pub platform_version: Option<String>,
    pub browser_name: Option<String>,
    pub browser_version: Option<String>,
    pub is_robot: Option<bool>,
}

/// SQL type a declared Rust type maps to, keyed by dialect-neutral name from
/// spec.md §4.1. The DDL generator turns this into the concrete SQLite
/// column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Timestamp,
    Date,
    Varchar,
    SmallInt,
    Integer,
    Double,
    Boolean,
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sqlite_type = match self {
            Self::Timestamp | Self::Date | Self::Varchar => "TEXT",
            Self::SmallInt | Self::Integer | Self::Boolean => "INTEGER",
            Self::Double => "REAL",
        };
        f.write_str(sqlite_type)
    }
}

/// One declared column of the Record schema.
pub struct FieldSpec {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub nullable: bool,
}

/// The Record schema, in column order. Table DDL, inserts, and `run()`-free
/// decoding all iterate this list rather than the struct fields directly, so
/// adding a field means touching this list and the two conversion functions
/// below — nothing else.
pub const FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "datetime", sql_type: SqlType::Timestamp, nullable: false },
    FieldSpec { name: "date", sql_type: SqlType::Date, nullable: false },
    FieldSpec { name: "host", sql_type: SqlType::Varchar, nullable: false },
    FieldSpec { name: "path", sql_type: SqlType::Varchar, nullable: false },
    FieldSpec { name: "status", sql_type: SqlType::SmallInt, nullable: false },
    FieldSpec { name: "length", sql_type: SqlType::Integer, nullable: false },
    FieldSpec { name: "generation_time", sql_type: SqlType::Double, nullable: false },
    FieldSpec { name: "referer", sql_type: SqlType::Varchar, nullable: true },
    FieldSpec { name: "ip", sql_type: SqlType::Varchar, nullable: false },
    FieldSpec { name: "country_iso_code", sql_type: SqlType::Varchar, nullable: true },
    FieldSpec { name: "platform_name", sql_type: SqlType::Varchar, nullable: true },
    FieldSpec { name: "platform_version", sql_type: SqlType::Varchar, nullable: true },
    FieldSpec { name: "browser_name", sql_type: SqlType::Varchar, nullable: true },
    FieldSpec { name: "browser_version", sql_type: SqlType::Varchar, nullable: true },
    FieldSpec { name: "is_robot", sql_type: SqlType::Boolean, nullable: true },
];

/// Is `name` a real, ingestible Record column? Used to allowlist the `field`
/// and `group` query parameters before they are interpolated into SQL —
/// column identifiers cannot be bind parameters, so this allowlist is the
/// substitute for parameter binding.
pub fn is_known_field(name: &str) -> bool {
    FIELDS.iter().any(|f| f.name == name)
}

/// Is `name` numeric (usable with `selectAverage`)?
pub fn is_numeric_field(name: &str) -> bool {
    matches!(
        FIELDS.iter().find(|f| f.name == name).map(|f| f.sql_type),
        Some(SqlType::SmallInt | SqlType::Integer | SqlType::Double)
    )
}

impl Record {
    /// Bind this record's values, in `FIELDS` order, onto a prepared INSERT.
    pub fn bind_into<'q>(
        &'q self,
        mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        query = query
            .bind(self.datetime.to_rfc3339())
            .bind(self.date.to_string())
            .bind(&self.host)
            .bind(&self.path)
            .bind(self.status)
            .bind(self.length)
            .bind(self.generation_time)
            .bind(self.referer.as_deref())
            .bind(self.ip.to_string())
            .bind(self.country_iso_code.as_deref())
            .bind(self.platform_name.as_deref())
            .bind(self.platform_version.as_deref())
            .bind(self.browser_name.as_deref())
            .bind(self.browser_version.as_deref())
            .bind(self.is_robot.map(|b| i64::from(b)));
        query
    }

    /// Decode a row selected with `SELECT *` (column order matching `FIELDS`)
    /// back into a `Record`. The inverse of `bind_into`.
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let datetime_text: String = row.try_get("datetime")?;
        let date_text: String = row.try_get("date")?;
        let ip_text: String = row.try_get("ip")?;
        let is_robot: Option<i64> = row.try_get("is_robot")?;

        let datetime = DateTime::parse_from_rfc3339(&datetime_text)
            .map_err(|e| sqlx::Error::ColumnDecode { index: "datetime".into(), source: Box::new(e) })?
            .with_timezone(&Utc);
        let date = NaiveDate::parse_from_str(&date_text, "%Y-%m-%d")
            .map_err(|e| sqlx::Error::ColumnDecode { index: "date".into(), source: Box::new(e) })?;
        let ip = ip_text
            .parse::<IpAddr>()
            .map_err(|e| sqlx::Error::ColumnDecode { index: "ip".into(), source: Box::new(e) })?;

        Ok(Self {
            datetime,
            date,
            host: row.try_get("host")?,
            path: row.try_get("path")?,
            status: row.try_get("status")?,
            length: row.try_get("length")?,
            generation_time: row.try_get("generation_time")?,
            referer: row.try_get("referer")?,
            ip,
            country_iso_code: row.try_get("country_iso_code")?,
            platform_name: row.try_get("platform_name")?,
            platform_version: row.try_get("platform_version")?,
            browser_name: row.try_get("browser_name")?,
            browser_version: row.try_get("browser_version")?,
            is_robot: is_robot.map(|v| v != 0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_cover_every_record_member() {
        // one entry per struct field, `method` intentionally absent (later schema variant)
        assert_eq!(FIELDS.len(), 15);
        assert!(!is_known_field("method"));
    }

    #[test]
    fn non_nullable_fields_have_no_null_column() {
        let nullable: Vec<_> = FIELDS.iter().filter(|f| f.nullable).map(|f| f.name).collect();
        assert_eq!(
            nullable,
            vec![
                "referer",
                "country_iso_code",
                "platform_name",
                "platform_version",
                "browser_name",
                "browser_version",
                "is_robot",
            ]
        );
    }

    #[test]
    fn numeric_fields_match_spec() {
        assert!(is_numeric_field("generation_time"));
        assert!(is_numeric_field("length"));
        assert!(is_numeric_field("status"));
        assert!(!is_numeric_field("host"));
        assert!(!is_numeric_field("ip"));
    }
}
