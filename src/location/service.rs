//! Cached, coalesced geocoding shared by every worker of a run.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use super::cache::{Address, AddressCache};
use super::geo::round_coordinates;
use super::geocoder::{GeocodeResponse, Geocoder};
use crate::domain::LocationConfig;
use crate::error::Result;

const REJECTED_MARKERS: &[&str] = &["@", "http", "#"];

pub struct GeocodeService {
    cache: AddressCache,
    geocoder: Box<dyn Geocoder>,
    language: String,
    tolerance_m: f64,
    backoff: Duration,
    max_attempts: u32,
    interval: Duration,
    not_found: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl GeocodeService {
    pub fn new(cache: AddressCache, geocoder: Box<dyn Geocoder>, config: &LocationConfig) -> Self {
        Self {
            cache,
            geocoder,
            language: config.language.clone(),
            tolerance_m: config.rounding_tolerance_m,
            backoff: Duration::from_secs(config.backoff_secs),
            max_attempts: config.max_attempts.max(1),
            interval: Duration::from_millis(config.request_interval_ms),
            not_found: Mutex::new(HashSet::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `query`, consulting the durable cache and the run's
    /// failed-query memo before calling the provider.
    pub fn lookup(&self, query: &str) -> Result<Option<Address>> {
        if let Some(marker) = REJECTED_MARKERS.iter().find(|m| query.contains(**m)) {
            warn!("reject for 「{marker}」 in 「{query}」");
            return Ok(None);
        }
        if let Some(hit) = self.known(query)? {
            return Ok(hit);
        }

        // One provider call per distinct query; later callers wait and reuse it.
        let gate = self.gate(query);
        let answer = {
            let _guard = gate.lock().unwrap_or_else(PoisonError::into_inner);
            self.settle(query)
        };
        self.release(query, gate);
        answer
    }

    /// Called with the query's gate held.
    fn settle(&self, query: &str) -> Result<Option<Address>> {
        if let Some(hit) = self.known(query)? {
            return Ok(hit);
        }

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.geocoder.geocode(query, &self.language)? {
                GeocodeResponse::Found { address, latitude, longitude } => {
                    let ((lat, lng), _) = round_coordinates(latitude, longitude, self.tolerance_m);
                    let address =
                        Address { query: query.to_string(), address, latitude: lat, longitude: lng };
                    self.cache.put(&address)?;
                    info!("write geo_info: {query} => {}", address.address);
                    thread::sleep(self.interval);
                    return Ok(Some(address));
                }
                GeocodeResponse::NotFound => {
                    self.remember_failure(query);
                    thread::sleep(self.interval);
                    return Ok(None);
                }
                GeocodeResponse::Unavailable if attempts >= self.max_attempts => {
                    warn!("geocoder still unavailable after {attempts} attempts: {query}");
                    self.remember_failure(query);
                    return Ok(None);
                }
                GeocodeResponse::Unavailable => {
                    info!("geocoder unavailable, sleeping {:?}", self.backoff);
                    thread::sleep(self.backoff);
                }
            }
        }
    }

    /// `Some(answer)` when the cache or the memo already settles `query`.
    fn known(&self, query: &str) -> Result<Option<Option<Address>>> {
        if let Some(address) = self.cache.get(query)? {
            return Ok(Some(Some(address)));
        }
        let not_found = self.not_found.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(not_found.contains(query).then_some(None))
    }

    fn remember_failure(&self, query: &str) {
        self.not_found.lock().unwrap_or_else(PoisonError::into_inner).insert(query.to_string());
    }

    fn gate(&self, query: &str) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates.entry(query.to_string()).or_default().clone()
    }

    /// Drop the gate once no other caller holds or waits on it.
    fn release(&self, query: &str, gate: Arc<Mutex<()>>) {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one here.
        if Arc::strong_count(&gate) <= 2 {
            gates.remove(query);
        }
    }

    #[cfg(test)]
    fn open_gates(&self) -> usize {
        self.gates.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
