use tracing::{debug, info, warn};

use crate::{
    client::WeatherApi,
    error::LookupError,
    model::{Location, Lookup},
    store::LocationStore,
};

/// Outcome of a lookup: the forecast plus resolved location, or the first
/// failure encountered.
pub type LookupResult = Result<Lookup, LookupError>;

/// Composes the API client and the location store.
///
/// A zip lookup resolves coordinates, fetches the forecast, then records
/// the location. Persistence happens only after a fully successful lookup:
/// a zip whose forecast could not be fetched is deliberately not cached.
/// Coordinate lookups skip resolution and are never persisted.
///
/// Failures pass through unchanged; there are no retries. The caller
/// decides whether to re-issue a request.
#[derive(Debug)]
pub struct WeatherLookup<A: WeatherApi> {
    api: A,
    store: LocationStore,
}

impl<A: WeatherApi> WeatherLookup<A> {
    /// Both collaborators are injected; the store is owned by the
    /// application root and shared by clone.
    pub fn new(api: A, store: LocationStore) -> Self {
        Self { api, store }
    }

    pub fn store(&self) -> &LocationStore {
        &self.store
    }

    /// Resolve a zip code, fetch its forecast, and record the location.
    pub async fn by_zip(&self, zip: &str, country: &str) -> LookupResult {
        let resolved = match self.api.resolve_zip(zip, country).await {
            Ok(location) => location,
            Err(e) => {
                warn!(zip, %e, "zip resolution failed");
                return Err(e);
            }
        };
        debug!(
            zip,
            name = %resolved.name,
            lat = resolved.lat,
            lon = resolved.lon,
            "zip resolved"
        );

        let snapshot = match self.api.fetch_weather(resolved.lat, resolved.lon).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Resolved but no confirmed weather data: do not cache.
                warn!(zip, %e, "forecast fetch failed");
                return Err(e);
            }
        };

        let location = self.store.save_or_update(&resolved).await?;
        info!(zip = %location.zip, name = %location.name, "lookup complete");

        Ok(Lookup { location, snapshot })
    }

    /// Fetch the forecast for raw coordinates. The returned location is
    /// synthetic (no zip code) and is not written to the store.
    pub async fn by_coordinates(&self, lat: f64, lon: f64, display_name: &str) -> LookupResult {
        let snapshot = self.api.fetch_weather(lat, lon).await?;
        info!(lat, lon, "coordinate lookup complete");

        Ok(Lookup {
            location: Location::unsaved(display_name, lat, lon),
            snapshot,
        })
    }
}
