//! Result types returned by the aggregate DAO operations.

use chrono::NaiveDate;
use serde::Serialize;

/// One day's average/sum/count for a numeric field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Average {
    pub date: NaiveDate,
    pub avg: f64,
    pub sum: f64,
    pub count: i64,
}

/// The full response of `selectAverage`.
#[derive(Debug, Clone, Serialize)]
pub struct AverageResult {
    pub table: String,
    pub field: String,
    pub elements: Vec<Average>,
}

/// One day's count, optionally attributed to a group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Count {
    pub date: NaiveDate,
    pub group: Option<String>,
    pub count: i64,
}

/// The full response of `selectCount` / `selectCountGroup`.
#[derive(Debug, Clone, Serialize)]
pub struct CountResult {
    pub table: String,
    pub field: Option<String>,
    pub distinct: bool,
    pub group: Option<String>,
    pub ascending: Option<bool>,
    pub elements: Vec<Count>,
}
