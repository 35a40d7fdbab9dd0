//! GeoIP lookups, isolated behind a trait so the rest of the crate never
//! touches `maxminddb`'s API directly.

use std::net::IpAddr;

/// Resolve an IP address to an ISO 3166-1 alpha-2 country code.
pub trait GeoIp: Send + Sync {
    fn country_iso_code(&self, ip: IpAddr) -> Option<String>;
}

/// Reads a MaxMind GeoLite2 Country database, memory-mapped for the process
/// lifetime.
pub struct MaxMindGeoIp {
    reader: maxminddb::Reader<Vec<u8>>,
}

impl MaxMindGeoIp {
    pub fn open(path: &str) -> Result<Self, maxminddb::MaxMindDBError> {
        let reader = maxminddb::Reader::open_readfile(path)?;
        Ok(Self { reader })
    }
}

impl GeoIp for MaxMindGeoIp {
    fn country_iso_code(&self, ip: IpAddr) -> Option<String> {
        let country: maxminddb::geoip2::Country = self.reader.lookup(ip).ok()?;
        country.country?.iso_code.map(str::to_string)
    }
}

/// Used when no GeoIP database is configured. Every lookup returns `None`,
/// matching a record enriched with an unknown country.
pub struct NoGeoIp;

impl GeoIp for NoGeoIp {
    fn country_iso_code(&self, _ip: IpAddr) -> Option<String> {
        None
    }
}
