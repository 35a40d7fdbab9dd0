//! The DAO: every SQL statement Ballcone issues lives here, nowhere else.
//!
//! Each service gets its own table, created on first sight and named after
//! the service. Table and column names that come from the outside world
//! (service names, the `field`/`group` query parameters) are never bind
//! parameters — they're validated against an allowlist by the caller and
//! quote-escaped here before being spliced into SQL text.

use chrono::NaiveDate;
use sqlx::{Column, QueryBuilder, Row, Sqlite, SqlitePool};

use crate::schema::{self, quote_ident, Record};

use super::error::DbError;
use super::results::{Average, AverageResult, Count, CountResult};

/// Handle onto the analytical store. Cheap to clone — `SqlitePool` is itself
/// a handle around a pool of connections.
#[derive(Clone)]
pub struct Dao {
    pool: SqlitePool,
}

fn push_date_range(qb: &mut QueryBuilder<'_, Sqlite>, start: Option<NaiveDate>, stop: Option<NaiveDate>) {
    match (start, stop) {
        (Some(s), Some(e)) if s == e => {
            qb.push(" WHERE \"date\" = ");
            qb.push_bind(s.to_string());
        }
        (Some(s), Some(e)) => {
            qb.push(" WHERE \"date\" BETWEEN ");
            qb.push_bind(s.to_string());
            qb.push(" AND ");
            qb.push_bind(e.to_string());
        }
        (Some(s), None) => {
            qb.push(" WHERE \"date\" >= ");
            qb.push_bind(s.to_string());
        }
        (None, Some(e)) => {
            qb.push(" WHERE \"date\" <= ");
            qb.push_bind(e.to_string());
        }
        (None, None) => {}
    }
}

fn require_known_field(field: &str) -> Result<(), DbError> {
    if schema::is_known_field(field) {
        Ok(())
    } else {
        Err(DbError::InvalidIdentifier(field.to_string()))
    }
}

impl Dao {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Names of every service table currently known to the store, sorted.
    pub async fn tables(&self) -> Result<Vec<String>, DbError> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| r.get::<String, _>("name")).collect())
    }

    pub async fn table_exists(&self, service: &str) -> Result<bool, DbError> {
        let row = sqlx::query("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(service)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// `CREATE TABLE IF NOT EXISTS` for `service` — idempotent by construction.
    pub async fn create_table(&self, service: &str) -> Result<(), DbError> {
        sqlx::query(&schema::create_table_sql(service)).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert `records` into `service`'s table inside a single transaction.
    /// Any failure rolls the whole batch back — nothing is partially visible.
    pub async fn insert_batch(&self, service: &str, records: &[Record]) -> Result<usize, DbError> {
        if records.is_empty() {
            return Ok(0);
        }

        let sql = schema::insert_sql(service);
        let mut tx = self.pool.begin().await?;
        for record in records {
            let query = record.bind_into(sqlx::query(&sql));
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(records.len())
    }

    /// Raw row dump for a service, newest first, for round-tripping and for
    /// the dashboard's "recent entries" view.
    pub async fn select(
        &self,
        service: &str,
        start: Option<NaiveDate>,
        stop: Option<NaiveDate>,
        limit: i64,
    ) -> Result<Vec<Record>, DbError> {
        let mut qb = QueryBuilder::new(format!("SELECT * FROM {}", quote_ident(service)));
        push_date_range(&mut qb, start, stop);
        qb.push(" ORDER BY \"datetime\" DESC LIMIT ");
        qb.push_bind(limit);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(|r| Record::from_row(r).map_err(DbError::from)).collect()
    }

    /// Per-day average, sum, and count of a numeric field.
    pub async fn select_average(
        &self,
        service: &str,
        field: &str,
        start: Option<NaiveDate>,
        stop: Option<NaiveDate>,
    ) -> Result<AverageResult, DbError> {
        require_known_field(field)?;
        if !schema::is_numeric_field(field) {
            return Err(DbError::InvalidIdentifier(field.to_string()));
        }

        let mut qb = QueryBuilder::new(format!(
            "SELECT \"date\", AVG({field}) AS avg, SUM({field}) AS sum, COUNT(*) AS count FROM {table}",
            field = quote_ident(field),
            table = quote_ident(service),
        ));
        push_date_range(&mut qb, start, stop);
        qb.push(" GROUP BY \"date\" ORDER BY \"date\"");

        let rows = qb.build().fetch_all(&self.pool).await?;
        let elements = rows
            .iter()
            .map(|r| {
                let date_text: String = r.get("date");
                Ok(Average {
                    date: NaiveDate::parse_from_str(&date_text, "%Y-%m-%d")
                        .map_err(|e| sqlx::Error::ColumnDecode { index: "date".into(), source: Box::new(e) })?,
                    avg: r.get("avg"),
                    sum: r.get("sum"),
                    count: r.get("count"),
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(AverageResult { table: service.to_string(), field: field.to_string(), elements })
    }

    /// Per-day count, optionally of distinct values of `field`.
    pub async fn select_count(
        &self,
        service: &str,
        field: Option<&str>,
        distinct: bool,
        start: Option<NaiveDate>,
        stop: Option<NaiveDate>,
    ) -> Result<CountResult, DbError> {
        if let Some(f) = field {
            require_known_field(f)?;
        }

        let count_expr = match (field, distinct) {
            (Some(f), true) => format!("COUNT(DISTINCT {})", quote_ident(f)),
            _ => "COUNT(*)".to_string(),
        };

        let mut qb = QueryBuilder::new(format!(
            "SELECT \"date\", {count_expr} AS count FROM {table}",
            table = quote_ident(service),
        ));
        push_date_range(&mut qb, start, stop);
        qb.push(" GROUP BY \"date\" ORDER BY \"date\"");

        let rows = qb.build().fetch_all(&self.pool).await?;
        let elements = rows
            .iter()
            .map(|r| {
                let date_text: String = r.get("date");
                Ok(Count {
                    date: NaiveDate::parse_from_str(&date_text, "%Y-%m-%d")
                        .map_err(|e| sqlx::Error::ColumnDecode { index: "date".into(), source: Box::new(e) })?,
                    group: None,
                    count: r.get("count"),
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(CountResult {
            table: service.to_string(),
            field: field.map(str::to_string),
            distinct,
            group: None,
            ascending: None,
            elements,
        })
    }

    /// Per-day top-`limit` groups of `group`, ranked by the count of `field`
    /// within each day via `ROW_NUMBER() OVER (PARTITION BY date ORDER BY
    /// count <dir>, group)` — the `group` tie-break inside the window is what
    /// makes the `rn <= limit` cut deterministic at a tied boundary, not just
    /// the display order — then re-sorted on the Rust side by (date, count
    /// order, group) so the final row order matches regardless of SQLite's
    /// internal row order.
    #[allow(clippy::too_many_arguments)]
    pub async fn select_count_group(
        &self,
        service: &str,
        field: &str,
        distinct: bool,
        group: &str,
        ascending: bool,
        limit: i64,
        start: Option<NaiveDate>,
        stop: Option<NaiveDate>,
    ) -> Result<CountResult, DbError> {
        require_known_field(field)?;
        require_known_field(group)?;

        let order_dir = if ascending { "ASC" } else { "DESC" };
        let group_col = quote_ident(group);
        let table = quote_ident(service);
        let count_expr = if distinct {
            format!("COUNT(DISTINCT {})", quote_ident(field))
        } else {
            format!("COUNT({})", quote_ident(field))
        };

        let mut qb = QueryBuilder::new(format!(
            "SELECT date, grp, count FROM (\
                 SELECT *, ROW_NUMBER() OVER (PARTITION BY date ORDER BY count {order_dir}, grp) AS rn FROM (\
                     SELECT \"date\", {group_col} AS grp, {count_expr} AS count FROM {table}",
        ));
        push_date_range(&mut qb, start, stop);
        qb.push(format!(" GROUP BY \"date\", {group_col}\
                 )\
             ) WHERE rn <= "));
        qb.push_bind(limit);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut elements = rows
            .iter()
            .map(|r| {
                let date_text: String = r.get("date");
                let grp: Option<String> = r.get("grp");
                Ok(Count {
                    date: NaiveDate::parse_from_str(&date_text, "%Y-%m-%d")
                        .map_err(|e| sqlx::Error::ColumnDecode { index: "date".into(), source: Box::new(e) })?,
                    group: grp,
                    count: r.get("count"),
                })
            })
            .collect::<Result<Vec<Count>, sqlx::Error>>()?;

        elements.sort_by(|a, b| {
            a.date.cmp(&b.date).then_with(|| {
                if ascending { a.count.cmp(&b.count) } else { b.count.cmp(&a.count) }
            }).then_with(|| a.group.cmp(&b.group))
        });

        Ok(CountResult {
            table: service.to_string(),
            field: Some(field.to_string()),
            distinct,
            group: Some(group.to_string()),
            ascending: Some(ascending),
            elements,
        })
    }

    /// Raw SQL escape hatch for the debug TCP port and the `/sql` HTTP
    /// endpoint. Returns column names and stringified rows — good enough for
    /// a console, not for anything that needs typed results.
    pub async fn run(&self, sql: &str) -> Result<(Vec<String>, Vec<Vec<String>>), DbError> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        let columns = rows
            .first()
            .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let body = rows
            .iter()
            .map(|row| {
                (0..row.len())
                    .map(|i| stringify_column(row, i))
                    .collect::<Vec<_>>()
            })
            .collect();

        Ok((columns, body))
    }
}

fn stringify_column(row: &sqlx::sqlite::SqliteRow, index: usize) -> String {
    use sqlx::ValueRef;

    let raw = match row.try_get_raw(index) {
        Ok(v) => v,
        Err(_) => return String::new(),
    };
    if raw.is_null() {
        return String::new();
    }
    if let Ok(v) = row.try_get::<i64, _>(index) {
        return v.to_string();
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return v.to_string();
    }
    row.try_get::<String, _>(index).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;

    use chrono::{TimeZone, Utc};
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, s).unwrap()
    }

    fn entries_20200101() -> Vec<Record> {
        vec![
            Record {
                datetime: dt(2020, 1, 1, 12, 0, 0),
                date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                host: "example.com".into(),
                path: "/".into(),
                status: 200,
                length: 1024,
                generation_time: 0.1,
                referer: None,
                ip: "192.168.1.1".parse::<IpAddr>().unwrap(),
                country_iso_code: None,
                platform_name: Some("Mac OS".into()),
                platform_version: Some("X 10.15".into()),
                browser_name: Some("Firefox".into()),
                browser_version: Some("75.0".into()),
                is_robot: Some(false),
            },
            Record {
                datetime: dt(2020, 1, 1, 12, 15, 0),
                date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                host: "example.com".into(),
                path: "/robots.txt".into(),
                status: 404,
                length: 0,
                generation_time: 0.01,
                referer: None,
                ip: "192.168.1.1".parse::<IpAddr>().unwrap(),
                country_iso_code: None,
                platform_name: Some("Linux".into()),
                platform_version: None,
                browser_name: None,
                browser_version: None,
                is_robot: Some(true),
            },
        ]
    }

    fn entries_20200102() -> Vec<Record> {
        vec![
            Record {
                datetime: dt(2020, 1, 2, 23, 59, 0),
                date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
                host: "example.com".into(),
                path: "/".into(),
                status: 200,
                length: 256,
                generation_time: 0.01,
                referer: Some("https://github.com/dustalov".into()),
                ip: "192.168.1.2".parse::<IpAddr>().unwrap(),
                country_iso_code: None,
                platform_name: Some("iOS".into()),
                platform_version: Some("13.3.1".into()),
                browser_name: Some("Safari".into()),
                browser_version: Some("13.0.5".into()),
                is_robot: Some(false),
            },
            Record {
                datetime: dt(2020, 1, 2, 23, 59, 59),
                date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
                host: "example.com".into(),
                path: "/post".into(),
                status: 200,
                length: 512,
                generation_time: 1.0,
                referer: None,
                ip: "192.168.1.2".parse::<IpAddr>().unwrap(),
                country_iso_code: None,
                platform_name: Some("iOS".into()),
                platform_version: Some("13.3.1".into()),
                browser_name: Some("Safari".into()),
                browser_version: Some("13.0.5".into()),
                is_robot: Some(false),
            },
        ]
    }

    async fn memory_dao() -> Dao {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        Dao::new(pool)
    }

    async fn seeded(service: &str) -> Dao {
        let dao = memory_dao().await;
        dao.create_table(service).await.unwrap();
        let mut all = entries_20200101();
        all.extend(entries_20200102());
        dao.insert_batch(service, &all).await.unwrap();
        dao
    }

    #[tokio::test]
    async fn create_table_is_idempotent() {
        let dao = memory_dao().await;
        assert!(!dao.table_exists("example").await.unwrap());
        dao.create_table("example").await.unwrap();
        dao.create_table("example").await.unwrap();
        assert!(dao.table_exists("example").await.unwrap());
        assert_eq!(dao.tables().await.unwrap(), vec!["example".to_string()]);
    }

    #[tokio::test]
    async fn insert_batch_round_trips_through_select() {
        let dao = memory_dao().await;
        dao.create_table("example").await.unwrap();
        let entries = entries_20200101();

        let inserted = dao.insert_batch("example", &entries).await.unwrap();
        assert_eq!(inserted, 2);

        let mut rows = dao.select("example", None, None, 100).await.unwrap();
        rows.sort_by_key(|r| r.datetime);
        assert_eq!(rows, entries);
    }

    #[tokio::test]
    async fn select_respects_inclusive_date_range() {
        let dao = seeded("example").await;
        let d1 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();

        let before = dao.select("example", None, Some(NaiveDate::from_ymd_opt(2019, 12, 31).unwrap()), 100).await.unwrap();
        assert!(before.is_empty());

        let exact = dao.select("example", Some(d1), Some(d1), 100).await.unwrap();
        assert_eq!(exact.len(), 2);

        let after = dao.select("example", Some(d2), None, 100).await.unwrap();
        assert_eq!(after.len(), 2);
    }

    #[tokio::test]
    async fn select_average_matches_fixture() {
        let dao = seeded("example").await;
        let d1 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();

        let result = dao.select_average("example", "generation_time", None, None).await.unwrap();
        assert_eq!(result.table, "example");
        assert_eq!(result.field, "generation_time");
        assert_eq!(result.elements.len(), 2);
        assert_eq!(result.elements[0].date, d1);
        assert!((result.elements[0].avg - 0.055).abs() < 1e-9);
        assert_eq!(result.elements[0].count, 2);
        assert_eq!(result.elements[1].date, d2);
        assert!((result.elements[1].avg - 0.505).abs() < 1e-9);
        assert_eq!(result.elements[1].count, 2);
    }

    #[tokio::test]
    async fn select_average_rejects_non_numeric_field() {
        let dao = seeded("example").await;
        let err = dao.select_average("example", "host", None, None).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidIdentifier(_)));
    }

    #[tokio::test]
    async fn select_count_matches_fixture() {
        let dao = seeded("example").await;
        let result = dao.select_count("example", None, false, None, None).await.unwrap();
        assert_eq!(result.elements.len(), 2);
        assert_eq!(result.elements[0].count, 2);
        assert_eq!(result.elements[1].count, 2);
    }

    #[tokio::test]
    async fn select_count_group_matches_fixture() {
        let dao = seeded("example").await;
        let result = dao
            .select_count_group("example", "ip", false, "platform_name", true, 10, None, None)
            .await
            .unwrap();

        assert_eq!(result.field.as_deref(), Some("ip"));
        assert_eq!(result.group.as_deref(), Some("platform_name"));
        assert_eq!(result.ascending, Some(true));
        assert_eq!(result.elements.len(), 3);
        assert_eq!(result.elements[0].date, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(result.elements[0].count, 1);
        assert_eq!(result.elements[2].date, NaiveDate::from_ymd_opt(2020, 1, 2).unwrap());
        assert_eq!(result.elements[2].count, 2);
    }

    #[tokio::test]
    async fn select_count_group_breaks_ties_by_group_inside_the_window() {
        // One date, groups A=3, B=2, C=2 by status count, descending, limit=2.
        // The window's ORDER BY count DESC, grp must keep {A, B} (B < C breaks
        // the tie), not let SQLite's internal row order decide which of B/C
        // survives the rn <= limit cut.
        let dao = memory_dao().await;
        dao.create_table("example").await.unwrap();

        let mut entries = Vec::new();
        for (browser, n) in [("A", 3), ("B", 2), ("C", 2)] {
            for i in 0..n {
                entries.push(Record {
                    datetime: dt(2020, 1, 1, 12, i, 0),
                    date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                    host: "example.com".into(),
                    path: "/".into(),
                    status: 200,
                    length: 10,
                    generation_time: 0.1,
                    referer: None,
                    ip: "192.168.1.1".parse::<IpAddr>().unwrap(),
                    country_iso_code: None,
                    platform_name: None,
                    platform_version: None,
                    browser_name: Some(browser.to_string()),
                    browser_version: None,
                    is_robot: Some(false),
                });
            }
        }
        dao.insert_batch("example", &entries).await.unwrap();

        let result = dao
            .select_count_group("example", "status", false, "browser_name", false, 2, None, None)
            .await
            .unwrap();

        assert_eq!(result.elements.len(), 2);
        let groups: Vec<_> = result.elements.iter().map(|e| e.group.clone()).collect();
        assert_eq!(groups, vec![Some("A".to_string()), Some("B".to_string())]);
    }

    #[tokio::test]
    async fn unknown_field_is_rejected_before_it_reaches_sql() {
        let dao = seeded("example").await;
        let err = dao.select_count("example", Some("DROP TABLE example; --"), false, None, None).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidIdentifier(_)));
    }

    #[tokio::test]
    async fn insert_batch_is_transactional() {
        let dao = memory_dao().await;
        dao.create_table("example").await.unwrap();
        assert_eq!(dao.insert_batch("example", &[]).await.unwrap(), 0);
    }
}
