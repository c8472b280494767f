//! Geocoding providers.

use serde::Deserialize;
use std::time::Duration;

use crate::error::{Error, Result};

const GOOGLE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeResponse {
    Found { address: String, latitude: f64, longitude: f64 },
    NotFound,
    /// Transient: quota exhausted or service down.
    Unavailable,
}

pub trait Geocoder: Send + Sync {
    fn geocode(&self, query: &str, language: &str) -> Result<GeocodeResponse>;
}

/// Google Geocoding API.
pub struct GoogleGeocoder {
    agent: ureq::Agent,
    api_key: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct GoogleReply {
    status: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    formatted_address: String,
    geometry: GoogleGeometry,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: GoogleLatLng,
}

#[derive(Debug, Deserialize)]
struct GoogleLatLng {
    lat: f64,
    lng: f64,
}

impl GoogleGeocoder {
    pub fn new(api_key: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(Duration::from_secs(30)).build();
        Self { agent, api_key: api_key.into(), endpoint: GOOGLE_ENDPOINT.to_string() }
    }

    /// Read the key from `env_var`; `None` when it is unset or blank.
    pub fn from_env(env_var: &str) -> Option<Self> {
        let key = std::env::var(env_var).ok()?;
        let key = key.trim();
        (!key.is_empty()).then(|| Self::new(key))
    }
}

impl Geocoder for GoogleGeocoder {
    fn geocode(&self, query: &str, language: &str) -> Result<GeocodeResponse> {
        let response = self
            .agent
            .get(&self.endpoint)
            .query("address", query)
            .query("language", language)
            .query("key", &self.api_key)
            .call();
        let reply: GoogleReply = match response {
            Ok(resp) => resp.into_json()?,
            Err(ureq::Error::Status(code, _)) if code == 429 || code >= 500 => {
                return Ok(GeocodeResponse::Unavailable)
            }
            Err(ureq::Error::Status(code, _)) => {
                return Err(Error::Geocoder(format!("HTTP {code} for '{query}'")))
            }
            Err(ureq::Error::Transport(_)) => return Ok(GeocodeResponse::Unavailable),
        };
        interpret(reply)
    }
}

fn interpret(reply: GoogleReply) -> Result<GeocodeResponse> {
    match reply.status.as_str() {
        "OK" => match reply.results.into_iter().next() {
            Some(first) => Ok(GeocodeResponse::Found {
                address: first.formatted_address,
                latitude: first.geometry.location.lat,
                longitude: first.geometry.location.lng,
            }),
            None => Ok(GeocodeResponse::NotFound),
        },
        "ZERO_RESULTS" => Ok(GeocodeResponse::NotFound),
        "OVER_QUERY_LIMIT" | "UNKNOWN_ERROR" => Ok(GeocodeResponse::Unavailable),
        other => Err(Error::Geocoder(format!(
            "{other}: {}",
            reply.error_message.unwrap_or_default()
        ))),
    }
}
