//! Agent geolocation.
//!
//! Lookups are synchronous and best-effort: a locator never fails, it
//! returns an empty [`Location`] instead.

use bytes::Bytes;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, warn};

/// Where an agent appears to be.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
}

impl Location {
    pub fn is_empty(&self) -> bool {
        self.parts().next().is_none()
    }

    fn parts(&self) -> impl Iterator<Item = &str> {
        [&self.city, &self.region, &self.country]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .map(str::trim)
            .filter(|part| !part.is_empty())
    }
}

/// `city, region, country`, skipping missing parts and their separators.
impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(part)?;
        }
        Ok(())
    }
}

/// Resolves an agent address to a location.
pub trait Locator: Send + Sync {
    fn locate(&self, addr: Ipv4Addr) -> Location;
}

/// Locator that knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLocator;

impl Locator for NullLocator {
    fn locate(&self, _addr: Ipv4Addr) -> Location {
        Location::default()
    }
}

pub const GEOPLUGIN_HOST: &str = "www.geoplugin.net";
pub const GEOPLUGIN_PORT: u16 = 80;
pub const GEOPLUGIN_PAGE: &str = "/json.gp";

/// Locator backed by the geoplugin.net JSON service.
#[derive(Debug, Clone)]
pub struct GeoPluginLocator {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl GeoPluginLocator {
    /// Locator against the public geoplugin.net service.
    pub fn new() -> reqwest::Result<Self> {
        let client = Client::builder().no_proxy().build()?;
        Ok(Self {
            client,
            endpoint: endpoint(GEOPLUGIN_HOST, GEOPLUGIN_PORT),
            timeout: Duration::from_secs(5),
        })
    }

    /// Point the locator at another server speaking the same protocol.
    #[must_use]
    pub fn with_server(mut self, host: &str, port: u16) -> Self {
        self.endpoint = endpoint(host, port);
        self
    }

    /// Bound on the whole lookup, connect included.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn query(&self, addr: Ipv4Addr) -> reqwest::Result<Bytes> {
        self.client
            .get(&self.endpoint)
            .query(&[("ip", addr.to_string())])
            .timeout(self.timeout)
            .send()?
            .error_for_status()?
            .bytes()
    }
}

fn endpoint(host: &str, port: u16) -> String {
    format!("http://{host}:{port}{GEOPLUGIN_PAGE}")
}

impl Locator for GeoPluginLocator {
    fn locate(&self, addr: Ipv4Addr) -> Location {
        let body = match self.query(addr) {
            Ok(body) => body,
            Err(e) => {
                warn!("[Locate] lookup of {} via {} failed: {}", addr, self.endpoint, e);
                return Location::default();
            }
        };

        match parse_geoplugin(&body) {
            Ok(location) => {
                debug!("[Locate] {} is in '{}'", addr, location);
                location
            }
            Err(e) => {
                warn!("[Locate] unreadable body from {} for {}: {}", self.endpoint, addr, e);
                Location::default()
            }
        }
    }
}

#[derive(Deserialize)]
struct GeoPluginResponse {
    #[serde(rename = "geoplugin_city", default)]
    city: Option<String>,
    #[serde(rename = "geoplugin_regionName", default)]
    region: Option<String>,
    #[serde(rename = "geoplugin_countryName", default)]
    country: Option<String>,
}

/// Parse a geoplugin JSON body. Empty fields count as missing.
pub fn parse_geoplugin(body: &[u8]) -> Result<Location, serde_json::Error> {
    let resp: GeoPluginResponse = serde_json::from_slice(body)?;
    let keep = |field: Option<String>| field.filter(|s| !s.trim().is_empty());

    Ok(Location {
        city: keep(resp.city),
        region: keep(resp.region),
        country: keep(resp.country),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    #[test]
    fn display_skips_missing_parts() {
        let full = Location {
            city: Some("Victoria".into()),
            region: Some("British Columbia".into()),
            country: Some("Canada".into()),
        };
        assert_eq!(full.to_string(), "Victoria, British Columbia, Canada");

        let no_city = Location {
            city: None,
            ..full.clone()
        };
        assert_eq!(no_city.to_string(), "British Columbia, Canada");

        let country_only = Location {
            country: Some("Argentina".into()),
            ..Location::default()
        };
        assert_eq!(country_only.to_string(), "Argentina");

        assert_eq!(Location::default().to_string(), "");
        assert!(Location::default().is_empty());
    }

    #[test]
    fn geoplugin_body() {
        let body = br#"{"geoplugin_request":"129.108.202.11","geoplugin_status":200,
            "geoplugin_city":"El Paso","geoplugin_regionName":"Texas",
            "geoplugin_countryName":"United States","geoplugin_latitude":"31.7"}"#;
        let loc = parse_geoplugin(body).unwrap();
        assert_eq!(loc.to_string(), "El Paso, Texas, United States");

        let sparse = br#"{"geoplugin_city":"","geoplugin_regionName":null,"geoplugin_countryName":"Peru"}"#;
        let loc = parse_geoplugin(sparse).unwrap();
        assert_eq!(loc.city, None);
        assert_eq!(loc.to_string(), "Peru");

        assert!(parse_geoplugin(b"<html>").is_err());
    }

    /// Answer one HTTP request with `response`, returning the request head.
    fn serve_once(response: &'static [u8]) -> (u16, std::thread::JoinHandle<String>) {
        let server = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();

        let handle = std::thread::spawn(move || {
            let (mut conn, _) = server.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 256];
            while !request.ends_with(b"\r\n\r\n") {
                let n = conn.read(&mut buf).unwrap();
                assert!(n > 0, "client hung up mid-request");
                request.extend_from_slice(&buf[..n]);
            }
            conn.write_all(response).unwrap();
            String::from_utf8(request).unwrap()
        });
        (port, handle)
    }

    #[test]
    fn queries_server_and_parses_reply() {
        let (port, handle) = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 69\r\n\
              Connection: close\r\n\r\n\
              {\"geoplugin_city\":\"Buenos Aires\",\"geoplugin_countryName\":\"Argentina\"}",
        );

        let locator = GeoPluginLocator::new()
            .unwrap()
            .with_server("127.0.0.1", port)
            .with_timeout(Duration::from_secs(2));
        let loc = locator.locate(Ipv4Addr::new(190, 227, 163, 141));
        assert_eq!(loc.to_string(), "Buenos Aires, Argentina");

        let request = handle.join().unwrap();
        assert!(request.starts_with("GET /json.gp?ip=190.227.163.141 HTTP/1.1\r\n"), "{request}");
    }

    #[test]
    fn error_status_yields_empty_location() {
        let (port, handle) = serve_once(
            b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}",
        );

        let locator = GeoPluginLocator::new()
            .unwrap()
            .with_server("127.0.0.1", port)
            .with_timeout(Duration::from_secs(2));
        assert!(locator.locate(Ipv4Addr::new(10, 0, 0, 2)).is_empty());
        handle.join().unwrap();
    }

    #[test]
    fn unreachable_server_yields_empty_location() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let locator = GeoPluginLocator::new()
            .unwrap()
            .with_server("127.0.0.1", port)
            .with_timeout(Duration::from_millis(500));
        assert!(locator.locate(Ipv4Addr::new(10, 0, 0, 1)).is_empty());
    }
}
