use async_trait::async_trait;
use relay_shared::{AddressParts, GeoPoint, RouteEstimate};

use crate::CoreResult;

/// Geocoding and routing provider.
///
/// Implementations are expected to bound every call with a timeout and
/// report it as `CoreError::Unavailable`.
#[async_trait]
pub trait LocationService: Send + Sync {
    /// Resolve postal fields to a point
    async fn resolve(&self, address: &AddressParts) -> CoreResult<GeoPoint>;

    /// Road distance and duration between two points
    async fn distance(&self, from: GeoPoint, to: GeoPoint) -> CoreResult<RouteEstimate>;
}
