//! Route handlers.
//!
//! Dashboard and service-overview pages render a small amount of inline
//! HTML directly — there's no templating dependency here, so these stay
//! deliberately plain. The aggregate routes (`average`, `count`,
//! `count_group`) and the SQL console return the real JSON/response the
//! facade computes.

use std::net::IpAddr;

use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::days_before;
use crate::query::{self, CommandResult};

use super::error::ApiError;
use super::AppState;

/// Path segment meaning "no field" for `/count/{field}` — `selectCount`
/// without a field counts every row rather than distinct values of one.
const NO_FIELD: &str = "_";

/// Escape the five HTML special characters. Every value interpolated into
/// the inline-HTML pages that did not come from a regex-validated service
/// name (group names, referers, raw SQL console output) goes through this
/// first — those values are ingest-controlled, not operator-controlled.
fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub start: Option<NaiveDate>,
    pub stop: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CountGroupQuery {
    #[serde(default = "default_group_field")]
    pub field: String,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default = "default_true")]
    pub ascending: bool,
    pub limit: Option<i64>,
    pub start: Option<NaiveDate>,
    pub stop: Option<NaiveDate>,
}

fn default_group_field() -> String {
    "ip".to_string()
}

const fn default_true() -> bool {
    true
}

async fn require_service(state: &AppState, service: &str) -> Result<(), ApiError> {
    if state.ballcone.check_service(service, true).await {
        Ok(())
    } else {
        Err(ApiError::UnknownService(service.to_string()))
    }
}

pub async fn dashboard(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let services = state.ballcone.dao().tables().await.map_err(ApiError::from)?;
    let today = chrono::Utc::now().date_naive();

    let mut rows = Vec::with_capacity(services.len());
    for service in &services {
        let result = query::unique(&state.ballcone, service, Some(today), Some(today)).await;
        let count = result.ok().and_then(|r| r.elements.first().map(|e| e.count)).unwrap_or(0);
        rows.push((service.clone(), count));
    }
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let body_rows: String = rows
        .iter()
        .map(|(service, count)| {
            format!("<tr><td><a href=\"/services/{service}\">{service}</a></td><td>{count}</td></tr>")
        })
        .collect();

    Ok(Html(format!(
        "<html><head><title>Ballcone</title></head><body><h1>Ballcone</h1>\
         <table><thead><tr><th>Service</th><th>Unique visitors today</th></tr></thead>\
         <tbody>{body_rows}</tbody></table></body></html>"
    )))
}

pub async fn service_overview(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Result<Html<String>, ApiError> {
    require_service(&state, &service).await?;

    let today = chrono::Utc::now().date_naive();
    let (start, stop) = days_before(today, 7);

    let visits = query::visits(&state.ballcone, &service, Some(start), Some(stop)).await?;
    let unique = query::unique(&state.ballcone, &service, Some(start), Some(stop)).await?;
    let time = query::time(&state.ballcone, &service, Some(start), Some(stop)).await?;
    let top_limit = state.ballcone.top_limit;
    let paths = query::uri(&state.ballcone, &service, Some(start), Some(stop), false, top_limit).await?;
    let browsers = query::browser(&state.ballcone, &service, Some(start), Some(stop), false, top_limit).await?;

    let visit_rows: String = visits
        .elements
        .iter()
        .map(|e| format!("<tr><td>{}</td><td>{}</td></tr>", e.date, e.count))
        .collect();
    let unique_rows: String = unique
        .elements
        .iter()
        .map(|e| format!("<tr><td>{}</td><td>{}</td></tr>", e.date, e.count))
        .collect();
    let path_rows: String = paths
        .elements
        .iter()
        .map(|e| format!("<tr><td>{}</td><td>{}</td></tr>", escape_html(e.group.as_deref().unwrap_or("")), e.count))
        .collect();
    let browser_rows: String = browsers
        .elements
        .iter()
        .map(|e| format!("<tr><td>{}</td><td>{}</td></tr>", escape_html(e.group.as_deref().unwrap_or("")), e.count))
        .collect();
    let time_rows: String = time
        .elements
        .iter()
        .map(|e| format!("<tr><td>{}</td><td>{:.3}</td></tr>", e.date, e.avg))
        .collect();

    Ok(Html(format!(
        "<html><head><title>{service} — Ballcone</title></head><body>\
         <h1>{service}</h1>\
         <h2>Visits</h2><table>{visit_rows}</table>\
         <h2>Unique visitors</h2><table>{unique_rows}</table>\
         <h2>Average response time (ms)</h2><table>{time_rows}</table>\
         <h2>Top paths</h2><table>{path_rows}</table>\
         <h2>Top browsers</h2><table>{browser_rows}</table>\
         </body></html>"
    )))
}

pub async fn average(
    State(state): State<AppState>,
    Path((service, field)): Path<(String, String)>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Response, ApiError> {
    require_service(&state, &service).await?;

    let result = state
        .ballcone
        .dao()
        .select_average(&service, &field, range.start, range.stop)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(result).into_response())
}

pub async fn count(
    State(state): State<AppState>,
    Path((service, field)): Path<(String, String)>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Response, ApiError> {
    require_service(&state, &service).await?;

    let field_opt = if field == NO_FIELD { None } else { Some(field.as_str()) };
    let distinct = field_opt.is_some();
    let result = state
        .ballcone
        .dao()
        .select_count(&service, field_opt, distinct, range.start, range.stop)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(result).into_response())
}

pub async fn count_group(
    State(state): State<AppState>,
    Path((service, group)): Path<(String, String)>,
    Query(params): Query<CountGroupQuery>,
) -> Result<Response, ApiError> {
    require_service(&state, &service).await?;

    let limit = params.limit.filter(|n| *n > 0).unwrap_or(state.ballcone.top_limit);
    let result = state
        .ballcone
        .dao()
        .select_count_group(
            &service,
            &params.field,
            params.distinct,
            &group,
            params.ascending,
            limit,
            params.start,
            params.stop,
        )
        .await
        .map_err(ApiError::from)?;
    Ok(Json(result).into_response())
}

/// Exposes the shared named-command facade (`time`, `bytes`, `os`,
/// `browser`, `uri`, `ip`, `country`, `visits`, `unique`) for callers that
/// want one dimension by name instead of composing `average`/`count_group`
/// themselves.
#[derive(Debug, Deserialize)]
pub struct CommandQuery {
    pub parameter: Option<String>,
    #[serde(default)]
    pub distinct: bool,
    pub start: Option<NaiveDate>,
    pub stop: Option<NaiveDate>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum CommandResponse {
    Average(crate::db::AverageResult),
    Count(crate::db::CountResult),
}

pub async fn command(
    State(state): State<AppState>,
    Path((service, command)): Path<(String, String)>,
    Query(params): Query<CommandQuery>,
) -> Result<Response, ApiError> {
    require_service(&state, &service).await?;

    let (default_start, default_stop) = days_before(chrono::Utc::now().date_naive(), state.ballcone.dashboard_days);
    let start = params.start.or(Some(default_start));
    let stop = params.stop.or(Some(default_stop));

    let outcome = query::handle_command(
        &state.ballcone,
        &service,
        &command,
        params.parameter.as_deref(),
        params.distinct,
        start,
        stop,
    )
    .await;

    match outcome {
        None => Ok((axum::http::StatusCode::NOT_FOUND, format!("unknown command: {command}")).into_response()),
        Some(Ok(CommandResult::Average(a))) => Ok(Json(CommandResponse::Average(a)).into_response()),
        Some(Ok(CommandResult::Count(c))) => Ok(Json(CommandResponse::Count(c)).into_response()),
        Some(Err(e)) => Err(ApiError::from(e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct SqlForm {
    #[serde(default)]
    pub sql: String,
}

pub async fn sql_get(State(state): State<AppState>) -> Html<String> {
    render_sql_console(&state, "", None, &[], &[]).await
}

pub async fn sql_post(State(state): State<AppState>, Form(form): Form<SqlForm>) -> Html<String> {
    let sql = form.sql.trim();
    if sql.is_empty() {
        return render_sql_console(&state, "", None, &[], &[]).await;
    }

    match state.ballcone.dao().run(sql).await {
        Ok((columns, rows)) => render_sql_console(&state, sql, None, &columns, &rows).await,
        Err(e) => render_sql_console(&state, sql, Some(e.to_string()), &[], &[]).await,
    }
}

async fn render_sql_console(
    state: &AppState,
    sql: &str,
    error: Option<String>,
    columns: &[String],
    rows: &[Vec<String>],
) -> Html<String> {
    let _ = state;
    let header = columns.iter().map(|c| format!("<th>{}</th>", escape_html(c))).collect::<String>();
    let body: String = rows
        .iter()
        .map(|row| {
            let cells: String = row.iter().map(|c| format!("<td>{}</td>", escape_html(c))).collect();
            format!("<tr>{cells}</tr>")
        })
        .collect();
    let error_html = error.map(|e| format!("<p class=\"error\">{}</p>", escape_html(&e))).unwrap_or_default();
    let sql_escaped = escape_html(sql);

    Html(format!(
        "<html><head><title>SQL console — Ballcone</title></head><body>\
         <h1>SQL console</h1>\
         <form method=\"post\" action=\"/sql\">\
         <textarea name=\"sql\" rows=\"4\" cols=\"80\">{sql_escaped}</textarea>\
         <button type=\"submit\">Run</button></form>\
         {error_html}\
         <table><thead><tr>{header}</tr></thead><tbody>{body}</tbody></table>\
         </body></html>"
    ))
}

#[derive(Debug, Deserialize)]
pub struct NginxQuery {
    pub service: Option<String>,
    pub ip: Option<String>,
}

pub async fn nginx_config(Query(params): Query<NginxQuery>) -> impl IntoResponse {
    let service = params.service.unwrap_or_else(|| "example".to_string());
    let ip_text = params.ip.unwrap_or_else(|| "127.0.0.1".to_string());

    let mut errors = Vec::new();
    if !crate::core::is_valid_service_name(&service) {
        errors.push(format!("invalid service name: {service}"));
    }
    if ip_text.parse::<IpAddr>().is_err() {
        errors.push(format!("invalid ballcone IP address: {ip_text}"));
    }

    if !errors.is_empty() {
        return (axum::http::StatusCode::BAD_REQUEST, errors.join("; ")).into_response();
    }

    let snippet = format!(
        "log_format ballcone escape=json '{{\"service\":\"{service}\",\"host\":\"$host\",\
         \"path\":\"$uri\",\"status\":$status,\"length\":$body_bytes_sent,\
         \"generation_time_milli\":$request_time,\"referrer\":\"$http_referer\",\
         \"ip\":\"$remote_addr\",\"user_agent\":\"$http_user_agent\",\"date\":\"$time_iso8601\"}}';\n\
         access_log syslog:server={ip_text}:65140,facility=local7,tag=nginx,severity=info ballcone;\n"
    );

    ([(axum::http::header::CONTENT_TYPE, "text/plain")], snippet).into_response()
}
