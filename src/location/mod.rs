//! Location reconciliation: place name → coordinates → geography fields.

pub mod cache;
pub mod geo;
pub mod geocoder;
pub mod service;

pub use cache::{Address, AddressCache};
pub use geocoder::{GeocodeResponse, Geocoder, GoogleGeocoder};
pub use service::GeocodeService;

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::domain::{MetadataRecord, Namespace, TagKey, TagValue};
use crate::error::Result;

static NO_LOCATION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^No[A-Za-z]+Location$").expect("valid regex"));

/// Location facts a supplier provider knows about a post.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderLocation {
    Coordinates(f64, f64),
    /// The post carries no location.
    Missing,
    /// The post's location could not be resolved by the supplier.
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationOutcome {
    NoQuery,
    Written { latitude: f64, longitude: f64 },
    Diverged { embedded: (f64, f64), proposed: (f64, f64), distance_km: f64 },
    Unresolved { query: String },
    MarkedMissing,
    Cleared,
}

pub struct LocationReconciler<'a> {
    service: Option<&'a GeocodeService>,
    max_divergence_km: f64,
}

impl<'a> LocationReconciler<'a> {
    pub fn new(service: Option<&'a GeocodeService>, max_divergence_km: f64) -> Self {
        Self { service, max_divergence_km }
    }

    pub fn reconcile(
        &self,
        record: &mut MetadataRecord,
        provided: Option<&ProviderLocation>,
        supplier: Option<&str>,
    ) -> Result<LocationOutcome> {
        let subject_key = TagKey::xmp("Subject");
        let mut subject: BTreeSet<String> = record.get(&subject_key).items().into_iter().collect();
        let had_markers = subject.iter().any(|s| NO_LOCATION_MARKER.is_match(s));
        if had_markers {
            subject.retain(|s| !NO_LOCATION_MARKER.is_match(s));
            record.set(subject_key.clone(), subject_value(&subject));
        }

        let location_key = TagKey::xmp("Location");
        let (lat, lng) = match provided {
            Some(ProviderLocation::NotFound) => {
                record.clear(&location_key);
                return Ok(LocationOutcome::Cleared);
            }
            Some(ProviderLocation::Missing) => {
                subject.insert(format!("No{}Location", capitalize(supplier.unwrap_or("Supplier"))));
                record.set(subject_key, subject_value(&subject));
                return Ok(LocationOutcome::MarkedMissing);
            }
            Some(ProviderLocation::Coordinates(lat, lng)) => (*lat, *lng),
            None => {
                let Some(query) = record.get_str(&location_key) else {
                    return Ok(LocationOutcome::NoQuery);
                };
                let Some(service) = self.service else {
                    debug!("{}: geocoding disabled, {query} left alone", record.source().display());
                    return Ok(LocationOutcome::NoQuery);
                };
                match self.geocode(service, &query)? {
                    Some(point) => point,
                    None => {
                        warn!("{}=>Cannot locate {query}", record.source().display());
                        return Ok(LocationOutcome::Unresolved { query });
                    }
                }
            }
        };

        if let Some(embedded) = geo::parse_pair(record.get(&TagKey::new(Namespace::Composite, "GPSPosition"))) {
            let distance_km = geo::distance_km(embedded, (lat, lng));
            if distance_km > self.max_divergence_km {
                warn!(
                    "{}: distance between {embedded:?} and {:?} is {distance_km:.3}km",
                    record.source().display(),
                    (lat, lng)
                );
                return Ok(LocationOutcome::Diverged { embedded, proposed: (lat, lng), distance_km });
            }
        }

        let geography_key = TagKey::xmp("Geography");
        let keys_coordinates = TagKey::new(Namespace::Keys, "GPSCoordinates");
        if record.contains(&keys_coordinates)
            && record.get(&keys_coordinates).agrees_with(record.get(&geography_key))
        {
            record.clear(&keys_coordinates);
        }
        record.set(TagKey::xmp("GPSLatitude"), TagValue::Number(lat));
        record.set(TagKey::xmp("GPSLongitude"), TagValue::Number(lng));
        record.set(geography_key, format!("{lat} {lng}"));
        Ok(LocationOutcome::Written { latitude: lat, longitude: lng })
    }

    /// Full query first, then the city part before `·`.
    fn geocode(&self, service: &GeocodeService, query: &str) -> Result<Option<(f64, f64)>> {
        if let Some(addr) = service.lookup(query)? {
            return Ok(Some((addr.latitude, addr.longitude)));
        }
        match query.split_once('·') {
            Some((city, _)) if !city.trim().is_empty() => {
                Ok(service.lookup(city.trim())?.map(|a| (a.latitude, a.longitude)))
            }
            _ => Ok(None),
        }
    }
}

fn subject_value(subject: &BTreeSet<String>) -> TagValue {
    if subject.is_empty() {
        TagValue::Empty
    } else {
        TagValue::List(subject.iter().cloned().collect())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
