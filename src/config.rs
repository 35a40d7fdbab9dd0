//! CLI configuration.
//!
//! Every option has an environment-variable fallback so the binary can be
//! driven purely by `.env` in a container, or by flags on a dev machine.

use clap::Parser;

/// Ballcone: lightweight, self-hosted web-analytics collector.
#[derive(Parser, Debug, Clone)]
#[command(name = "ballcone", version, about)]
pub struct Config {
    /// Host the syslog UDP listener binds to.
    #[arg(long, env = "BALLCONE_SYSLOG_HOST", default_value = "127.0.0.1")]
    pub syslog_host: String,

    /// Port the syslog UDP listener binds to.
    #[arg(long, env = "BALLCONE_SYSLOG_PORT", default_value_t = 65140)]
    pub syslog_port: u16,

    /// Host the debug TCP console binds to.
    #[arg(long, env = "BALLCONE_DEBUG_HOST", default_value = "127.0.0.1")]
    pub debug_host: String,

    /// Port the debug TCP console binds to.
    #[arg(long, env = "BALLCONE_DEBUG_PORT", default_value_t = 65141)]
    pub debug_port: u16,

    /// Host the HTTP interface binds to.
    #[arg(long, env = "BALLCONE_WEB_HOST", default_value = "127.0.0.1")]
    pub web_host: String,

    /// Port the HTTP interface binds to.
    #[arg(long, env = "BALLCONE_WEB_PORT", default_value_t = 8080)]
    pub web_port: u16,

    /// Path to the SQLite database file.
    #[arg(long, env = "BALLCONE_DATABASE", default_value = "ballcone.db")]
    pub database: String,

    /// Path to a MaxMind GeoLite2 Country database. GeoIP enrichment is
    /// skipped (country is always unknown) when unset.
    #[arg(long, env = "BALLCONE_GEOIP")]
    pub geoip: Option<String>,

    /// Seconds between staging-queue flushes to disk.
    #[arg(long, env = "BALLCONE_PERIOD", default_value_t = 5)]
    pub period: u64,

    /// Default top-N size for grouped queries when a request doesn't
    /// override it.
    #[arg(long, env = "BALLCONE_TOP_LIMIT", default_value_t = 5)]
    pub top_limit: i64,

    /// Default number of days a query's date range covers when `start` is
    /// omitted.
    #[arg(long, env = "BALLCONE_DAYS", default_value_t = 30)]
    pub days: u64,
}

impl Config {
    pub fn syslog_addr(&self) -> String {
        format!("{}:{}", self.syslog_host, self.syslog_port)
    }

    pub fn debug_addr(&self) -> String {
        format!("{}:{}", self.debug_host, self.debug_port)
    }

    pub fn web_addr(&self) -> String {
        format!("{}:{}", self.web_host, self.web_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_combine_host_and_port() {
        let config = Config::parse_from(["ballcone"]);
        assert_eq!(config.syslog_addr(), "127.0.0.1:65140");
        assert_eq!(config.debug_addr(), "127.0.0.1:65141");
        assert_eq!(config.web_addr(), "127.0.0.1:8080");
        assert_eq!(config.top_limit, 5);
        assert_eq!(config.days, 30);
    }
}
