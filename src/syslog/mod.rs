//! UDP syslog listener.
//!
//! NGINX is configured to ship each access log line as a syslog datagram
//! whose payload is a JSON object. This module frames the datagram, decodes
//! the JSON, validates and enriches it, and stages the resulting [`Record`]
//! on the shared [`Ballcone`] buffer.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tokio::net::UdpSocket;

use crate::core::{ua, Ballcone};
use crate::schema::Record;

lazy_static! {
    /// NGINX's syslog framing can't be parsed by a general syslog parser —
    /// the priority tag and tag/hostname prefix vary by platform, so this
    /// only peels off the `<PRI>...: ` prefix and keeps everything after it.
    static ref NGINX_SYSLOG: Regex = Regex::new(r"\A<[0-9]{1,3}>.*?: (?P<message>.+)\z").unwrap();
}

/// The JSON payload NGINX's log_format emits, one object per request.
#[derive(Debug, Deserialize)]
struct IngressPayload {
    service: String,
    host: String,
    path: String,
    status: i16,
    length: i64,
    generation_time_milli: f64,
    referrer: Option<String>,
    ip: String,
    user_agent: String,
    date: DateTime<Utc>,
}

/// Bind the syslog UDP socket and run the receive loop until the socket
/// errors out or the process is asked to shut down.
pub async fn run(addr: SocketAddr, ballcone: Arc<Ballcone>) -> std::io::Result<()> {
    let socket = UdpSocket::bind(addr).await?;
    tracing::info!(%addr, "syslog listener bound");

    let mut buf = vec![0u8; 65536];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "syslog socket read failed");
                continue;
            }
        };
        handle_datagram(&ballcone, &buf[..len], peer).await;
    }
}

async fn handle_datagram(ballcone: &Ballcone, data: &[u8], peer: SocketAddr) {
    let message = match std::str::from_utf8(data) {
        Ok(s) => s,
        Err(_) => {
            tracing::info!(%peer, "malformed UTF-8 received");
            return;
        }
    };

    let Some(captures) = NGINX_SYSLOG.captures(message) else {
        tracing::info!(%peer, %message, "missing syslog payload");
        return;
    };
    let payload_text = &captures["message"];

    let payload: IngressPayload = match serde_json::from_str(payload_text) {
        Ok(p) => p,
        Err(e) => {
            tracing::info!(%peer, error = %e, "malformed JSON payload");
            return;
        }
    };

    let service = payload.service.trim().to_lowercase();
    if service.is_empty() || !ballcone.check_service(&service, false).await {
        tracing::info!(%peer, %service, "malformed service field");
        return;
    }

    if !ballcone.check_service(&service, true).await {
        if let Err(e) = ballcone.dao().create_table(&service).await {
            tracing::warn!(%service, error = %e, "failed to create table for new service");
            return;
        }
    }

    let ip: std::net::IpAddr = match payload.ip.parse() {
        Ok(ip) => ip,
        Err(_) => {
            tracing::info!(%peer, ip = %payload.ip, "malformed IP field");
            return;
        }
    };

    let path = urlencoding::decode(&payload.path).map_or_else(|_| payload.path.clone(), |s| s.into_owned());
    let user_agent = ua::parse(&payload.user_agent);
    let country_iso_code = ballcone.geoip().country_iso_code(ip);

    let record = Record {
        datetime: payload.date,
        date: payload.date.date_naive(),
        host: payload.host,
        path,
        status: payload.status,
        length: payload.length,
        generation_time: payload.generation_time_milli,
        referer: payload.referrer.filter(|r| !r.is_empty()),
        ip,
        country_iso_code,
        platform_name: user_agent.platform_name,
        platform_version: user_agent.platform_version,
        browser_name: user_agent.browser_name,
        browser_version: user_agent.browser_version,
        is_robot: Some(user_agent.is_robot),
    };

    ballcone.enqueue(&service, record);
}
