use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use relay_core::cache::CacheStore;
use relay_core::location::LocationService;
use relay_core::repository::VehicleTypeRepository;
use relay_core::{CoreError, CoreResult};
use relay_shared::{AddressParts, GeoPoint, RouteEstimate};

use crate::pricing::PricingEngine;

/// How long a simulated price is served without recomputation
pub const SIMULATION_TTL_SECONDS: u64 = 60 * 60;

/// Priced route, as cached and as returned to callers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Simulation {
    pub location: RouteEstimate,
    pub price: Decimal,
}

/// Where a route starts
#[derive(Debug, Clone)]
pub enum RouteOrigin {
    /// Already geocoded, e.g. the company's registered address
    Point(GeoPoint),
    /// Still to be geocoded
    Address(AddressParts),
}

impl RouteOrigin {
    fn cache_fragment(&self) -> String {
        match self {
            RouteOrigin::Point(point) => format!("{}:{}", point.longitude, point.latitude),
            RouteOrigin::Address(parts) => parts.descriptor(),
        }
    }
}

/// Memoizes price simulations so repeated quotes for the same route skip
/// the geocoder. Entries go stale after the TTL; concurrent misses for the
/// same key may both recompute, which is harmless.
pub struct GeoPricingCache {
    cache: Arc<dyn CacheStore>,
    location: Arc<dyn LocationService>,
    vehicles: Arc<dyn VehicleTypeRepository>,
    engine: PricingEngine,
    ttl_seconds: u64,
}

impl GeoPricingCache {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        location: Arc<dyn LocationService>,
        vehicles: Arc<dyn VehicleTypeRepository>,
        engine: PricingEngine,
    ) -> Self {
        Self {
            cache,
            location,
            vehicles,
            engine,
            ttl_seconds: SIMULATION_TTL_SECONDS,
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    pub fn cache_key(vehicle_type: &str, origin: &RouteOrigin, destination: &AddressParts) -> String {
        format!(
            "simulate:{}:{}:{}",
            vehicle_type.trim().to_lowercase(),
            origin.cache_fragment(),
            destination.descriptor()
        )
    }

    pub async fn simulate(
        &self,
        vehicle_type: &str,
        origin: &RouteOrigin,
        destination: &AddressParts,
    ) -> CoreResult<Simulation> {
        let key = Self::cache_key(vehicle_type, origin, destination);

        if let Some(raw) = self.cache.get(&key).await? {
            match serde_json::from_str::<Simulation>(&raw) {
                Ok(hit) => {
                    debug!(key = %key, "Simulation cache hit");
                    return Ok(hit);
                }
                Err(e) => warn!(key = %key, error = %e, "Discarding unreadable simulation cache entry"),
            }
        }

        let vehicle = self
            .vehicles
            .find_vehicle_type(vehicle_type)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("vehicle type '{}' not found", vehicle_type)))?;

        let from = match origin {
            RouteOrigin::Point(point) => *point,
            RouteOrigin::Address(parts) => self.location.resolve(parts).await?,
        };
        let to = self.location.resolve(destination).await?;
        let route = self.location.distance(to, from).await?;

        let simulation = Simulation {
            location: route,
            price: self.engine.quote(&vehicle, &route),
        };

        let serialized = serde_json::to_string(&simulation)
            .map_err(|e| CoreError::Fatal(format!("cannot serialize simulation: {}", e)))?;
        self.cache.set(&key, &serialized, self.ttl_seconds).await?;

        info!(
            key = %key,
            distance_meters = route.distance_meters,
            price = %simulation.price,
            "Simulated delivery price"
        );
        Ok(simulation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_shared::VehicleType;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MapCache {
        entries: Mutex<HashMap<String, (String, u64)>>,
    }

    #[async_trait]
    impl CacheStore for MapCache {
        async fn get(&self, key: &str) -> CoreResult<Option<String>> {
            Ok(self.entries.lock().unwrap().get(key).map(|(v, _)| v.clone()))
        }

        async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> CoreResult<()> {
            self.entries.lock().unwrap().insert(key.to_string(), (value.to_string(), ttl_seconds));
            Ok(())
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl CacheStore for BrokenCache {
        async fn get(&self, _key: &str) -> CoreResult<Option<String>> {
            Err(CoreError::Unavailable("redis down".into()))
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: u64) -> CoreResult<()> {
            Err(CoreError::Unavailable("redis down".into()))
        }
    }

    #[derive(Default)]
    struct CountingLocator {
        resolves: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl LocationService for CountingLocator {
        async fn resolve(&self, _address: &AddressParts) -> CoreResult<GeoPoint> {
            self.resolves.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CoreError::Unavailable("geocoder timed out".into()));
            }
            Ok(GeoPoint::new(-34.9, -8.05))
        }

        async fn distance(&self, _from: GeoPoint, _to: GeoPoint) -> CoreResult<RouteEstimate> {
            Ok(RouteEstimate { distance_meters: 3000, duration_seconds: 600 })
        }
    }

    struct Vehicles;

    #[async_trait]
    impl VehicleTypeRepository for Vehicles {
        async fn find_vehicle_type(&self, name: &str) -> CoreResult<Option<VehicleType>> {
            Ok((name == "bike").then(|| VehicleType {
                name: "bike".to_string(),
                base_fare: dec!(5.00),
                per_km_rate: dec!(1.20),
                rounding_scale: 2,
                max_weight_kg: dec!(10),
                max_height_cm: dec!(50),
                max_width_cm: dec!(50),
                max_length_cm: dec!(50),
            }))
        }
    }

    fn destination() -> AddressParts {
        AddressParts {
            street: "Rua da Aurora".to_string(),
            number: "100".to_string(),
            city: "Recife".to_string(),
            state: "PE".to_string(),
            zip_code: "50050-000".to_string(),
            complement: None,
        }
    }

    fn pricing(cache: Arc<dyn CacheStore>, locator: Arc<CountingLocator>) -> GeoPricingCache {
        GeoPricingCache::new(cache, locator, Arc::new(Vehicles), PricingEngine::default())
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let cache = Arc::new(MapCache::default());
        let locator = Arc::new(CountingLocator::default());
        let sim = pricing(cache.clone(), locator.clone());
        let origin = RouteOrigin::Point(GeoPoint::new(-34.88, -8.06));

        let first = sim.simulate("bike", &origin, &destination()).await.unwrap();
        let second = sim.simulate("bike", &origin, &destination()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.price, dec!(8.60));
        assert_eq!(locator.resolves.load(Ordering::SeqCst), 1);

        let entries = cache.entries.lock().unwrap();
        let (_, ttl) = entries.values().next().unwrap();
        assert_eq!(*ttl, SIMULATION_TTL_SECONDS);
    }

    #[tokio::test]
    async fn test_unknown_vehicle_is_not_found() {
        let sim = pricing(Arc::new(MapCache::default()), Arc::new(CountingLocator::default()));
        let origin = RouteOrigin::Point(GeoPoint::new(0.0, 0.0));

        let err = sim.simulate("rocket", &origin, &destination()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_geocoding_failure_is_not_cached() {
        let cache = Arc::new(MapCache::default());
        let locator = Arc::new(CountingLocator { fail: true, ..Default::default() });
        let sim = pricing(cache.clone(), locator);
        let origin = RouteOrigin::Address(destination());

        let err = sim.simulate("bike", &origin, &destination()).await.unwrap_err();
        assert!(err.is_transient());
        assert!(cache.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_failure_propagates() {
        let sim = pricing(Arc::new(BrokenCache), Arc::new(CountingLocator::default()));
        let origin = RouteOrigin::Point(GeoPoint::new(0.0, 0.0));

        let err = sim.simulate("bike", &origin, &destination()).await.unwrap_err();
        assert_eq!(err, CoreError::Unavailable("redis down".into()));
    }

    #[test]
    fn test_textually_identical_addresses_share_a_key() {
        let mut shouty = destination();
        shouty.street = "RUA DA  AURORA".to_string();
        let origin = RouteOrigin::Address(destination());

        assert_eq!(
            GeoPricingCache::cache_key("bike", &origin, &destination()),
            GeoPricingCache::cache_key("Bike", &origin, &shouty),
        );
        assert_ne!(
            GeoPricingCache::cache_key("bike", &origin, &destination()),
            GeoPricingCache::cache_key("car", &origin, &destination()),
        );
    }
}
