//! The ingest buffer: staging, batching, and periodic persistence.
//!
//! One `Ballcone` instance is shared across the whole process. Incoming
//! records are staged per service in memory; a background timer snapshots
//! and drains the staging map into the database on a fixed period. The lock
//! around the staging map is only ever held for the synchronous
//! snapshot-and-drain — never across an `.await` — so ingestion never blocks
//! on a slow persist.

pub mod geoip;
pub mod ua;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Days, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;

use crate::db::Dao;
use crate::schema::Record;

pub use geoip::GeoIp;

lazy_static! {
    /// A service name is one or more word characters — no whitespace, no
    /// punctuation — matching the original ingest-time validation.
    static ref SERVICE_NAME: Regex = Regex::new(r"^\w+$").unwrap();
}

/// Is `name` a syntactically valid service name? Does not check whether a
/// table for it actually exists — see [`Ballcone::check_service`].
pub fn is_valid_service_name(name: &str) -> bool {
    SERVICE_NAME.is_match(name)
}

/// `(stop - (days - 1), stop)`, the default date window used when a query
/// omits `start`/`stop`. `stop` defaults to today in UTC when not given.
pub fn days_before(stop: NaiveDate, days: u64) -> (NaiveDate, NaiveDate) {
    let back = days.saturating_sub(1);
    let start = stop.checked_sub_days(Days::new(back)).unwrap_or(stop);
    (start, stop)
}

/// The shared ingest state: one staging queue per service.
pub struct Ballcone {
    dao: Dao,
    geoip: Arc<dyn GeoIp>,
    queues: Mutex<HashMap<String, VecDeque<Record>>>,
    pub top_limit: i64,
    pub dashboard_days: u64,
}

impl Ballcone {
    pub fn new(dao: Dao, geoip: Arc<dyn GeoIp>, top_limit: i64, dashboard_days: u64) -> Self {
        Self { dao, geoip, queues: Mutex::new(HashMap::new()), top_limit, dashboard_days }
    }

    pub fn dao(&self) -> &Dao {
        &self.dao
    }

    pub fn geoip(&self) -> &dyn GeoIp {
        self.geoip.as_ref()
    }

    /// Does `service` name a table that already exists? When `must_exist` is
    /// false, a syntactically valid but unseen service name passes too (the
    /// syslog listener uses this to decide whether to create the table).
    pub async fn check_service(&self, service: &str, must_exist: bool) -> bool {
        if !is_valid_service_name(service) {
            return false;
        }
        if !must_exist {
            return true;
        }
        self.dao.table_exists(service).await.unwrap_or(false)
    }

    /// Append `record` to `service`'s staging queue. Never touches the
    /// database — the record becomes durable at the next [`Self::persist`].
    pub fn enqueue(&self, service: &str, record: Record) {
        let mut queues = self.queues.lock().unwrap();
        queues.entry(service.to_string()).or_default().push_back(record);
    }

    /// Snapshot every non-empty staging queue, drain it, and write the
    /// snapshot to the database. The lock is released before any `.await`
    /// runs, so a slow write never stalls `enqueue`.
    #[tracing::instrument(skip(self))]
    pub async fn persist(&self) {
        let snapshot: Vec<(String, Vec<Record>)> = {
            let mut queues = self.queues.lock().unwrap();
            queues
                .iter_mut()
                .filter(|(_, q)| !q.is_empty())
                .map(|(service, q)| (service.clone(), std::mem::take(q).into_iter().collect()))
                .collect()
        };

        for (service, records) in snapshot {
            if let Err(e) = self.dao.create_table(&service).await {
                tracing::warn!(service = %service, error = %e, "failed to create table before persist");
                continue;
            }
            match self.dao.insert_batch(&service, &records).await {
                Ok(count) => {
                    tracing::debug!(service = %service, count, "persisted staged records");
                }
                Err(e) => {
                    tracing::warn!(service = %service, error = %e, "failed to persist staged records");
                }
            }
        }
    }

    /// Spawn the background task that calls [`Self::persist`] every `period`.
    /// The first tick is consumed immediately so the first real flush
    /// happens a full period after startup, not instantly.
    pub fn spawn_persist_timer(self: Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                self.persist().await;
            }
        })
    }
}
