//! The query facade: named aggregate operations shared by the debug TCP
//! port and the HTTP JSON endpoints, plus the command dispatcher both of
//! them delegate to.

use chrono::NaiveDate;

use crate::core::Ballcone;
use crate::db::{AverageResult, CountResult, DbError};

pub async fn time(ballcone: &Ballcone, service: &str, start: Option<NaiveDate>, stop: Option<NaiveDate>) -> Result<AverageResult, DbError> {
    ballcone.dao().select_average(service, "generation_time", start, stop).await
}

pub async fn bytes(ballcone: &Ballcone, service: &str, start: Option<NaiveDate>, stop: Option<NaiveDate>) -> Result<AverageResult, DbError> {
    ballcone.dao().select_average(service, "length", start, stop).await
}

pub async fn os(ballcone: &Ballcone, service: &str, start: Option<NaiveDate>, stop: Option<NaiveDate>, distinct: bool, limit: i64) -> Result<CountResult, DbError> {
    ballcone.dao().select_count_group(service, "ip", distinct, "platform_name", false, limit, start, stop).await
}

pub async fn browser(ballcone: &Ballcone, service: &str, start: Option<NaiveDate>, stop: Option<NaiveDate>, distinct: bool, limit: i64) -> Result<CountResult, DbError> {
    ballcone.dao().select_count_group(service, "ip", distinct, "browser_name", false, limit, start, stop).await
}

pub async fn uri(ballcone: &Ballcone, service: &str, start: Option<NaiveDate>, stop: Option<NaiveDate>, distinct: bool, limit: i64) -> Result<CountResult, DbError> {
    ballcone.dao().select_count_group(service, "ip", distinct, "path", false, limit, start, stop).await
}

pub async fn ip(ballcone: &Ballcone, service: &str, start: Option<NaiveDate>, stop: Option<NaiveDate>, distinct: bool, limit: i64) -> Result<CountResult, DbError> {
    ballcone.dao().select_count_group(service, "status", distinct, "ip", false, limit, start, stop).await
}

pub async fn country(ballcone: &Ballcone, service: &str, start: Option<NaiveDate>, stop: Option<NaiveDate>, distinct: bool, limit: i64) -> Result<CountResult, DbError> {
    ballcone.dao().select_count_group(service, "ip", distinct, "country_iso_code", false, limit, start, stop).await
}

pub async fn visits(ballcone: &Ballcone, service: &str, start: Option<NaiveDate>, stop: Option<NaiveDate>) -> Result<CountResult, DbError> {
    ballcone.dao().select_count(service, None, false, start, stop).await
}

pub async fn unique(ballcone: &Ballcone, service: &str, start: Option<NaiveDate>, stop: Option<NaiveDate>) -> Result<CountResult, DbError> {
    ballcone.dao().select_count(service, Some("ip"), true, start, stop).await
}

/// The result of dispatching a named command through [`handle_command`].
pub enum CommandResult {
    Average(AverageResult),
    Count(CountResult),
}

/// Parse a command's optional string `parameter` into a positive top-N
/// override, falling back to `ballcone.top_limit` (itself defaulting to 5
/// in `original_source`'s `Ballcone.N`/`top_limit`).
fn resolve_limit(ballcone: &Ballcone, parameter: Option<&str>) -> i64 {
    parameter
        .and_then(|p| p.parse::<i64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(ballcone.top_limit)
}

/// Dispatch one of the named facade commands by name. Returns `None` for an
/// unrecognised command name, letting the caller turn that into its own 404
/// or error response.
pub async fn handle_command(
    ballcone: &Ballcone,
    service: &str,
    command: &str,
    parameter: Option<&str>,
    distinct: bool,
    start: Option<NaiveDate>,
    stop: Option<NaiveDate>,
) -> Option<Result<CommandResult, DbError>> {
    match command {
        "time" => Some(time(ballcone, service, start, stop).await.map(CommandResult::Average)),
        "bytes" => Some(bytes(ballcone, service, start, stop).await.map(CommandResult::Average)),
        "os" => {
            let limit = resolve_limit(ballcone, parameter);
            Some(os(ballcone, service, start, stop, distinct, limit).await.map(CommandResult::Count))
        }
        "browser" => {
            let limit = resolve_limit(ballcone, parameter);
            Some(browser(ballcone, service, start, stop, distinct, limit).await.map(CommandResult::Count))
        }
        "uri" => {
            let limit = resolve_limit(ballcone, parameter);
            Some(uri(ballcone, service, start, stop, distinct, limit).await.map(CommandResult::Count))
        }
        "ip" => {
            let limit = resolve_limit(ballcone, parameter);
            Some(ip(ballcone, service, start, stop, distinct, limit).await.map(CommandResult::Count))
        }
        "country" => {
            let limit = resolve_limit(ballcone, parameter);
            Some(country(ballcone, service, start, stop, distinct, limit).await.map(CommandResult::Count))
        }
        "visits" => Some(visits(ballcone, service, start, stop).await.map(CommandResult::Count)),
        "unique" => Some(unique(ballcone, service, start, stop).await.map(CommandResult::Count)),
        _ => None,
    }
}
