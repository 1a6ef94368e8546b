//! Reqwest-backed geocoding and routing.
//!
//! The geocoder answers `GET {geocoder_url}?street=&number=&city=&state=&postalcode=`
//! with `{"longitude": f64, "latitude": f64}`; the router answers
//! `GET {router_url}?from=lon,lat&to=lon,lat` with
//! `{"distance_meters": u64, "duration_seconds": u64}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use relay_core::location::LocationService;
use relay_core::{CoreError, CoreResult};
use relay_shared::{AddressParts, GeoPoint, RouteEstimate};

use crate::error::StoreError;

#[derive(Debug, Deserialize)]
struct GeocodeDto {
    longitude: f64,
    latitude: f64,
}

#[derive(Debug, Deserialize)]
struct RouteDto {
    distance_meters: u64,
    duration_seconds: u64,
}

pub struct HttpLocationService {
    client: Client,
    geocoder_url: String,
    router_url: String,
}

impl HttpLocationService {
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(geocoder_url: String, router_url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            geocoder_url,
            router_url,
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T, StoreError> {
        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Upstream { status: status.as_u16(), body });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl LocationService for HttpLocationService {
    async fn resolve(&self, address: &AddressParts) -> CoreResult<GeoPoint> {
        let query = [
            ("street", address.street.trim().to_string()),
            ("number", address.number.trim().to_string()),
            ("city", address.city.trim().to_string()),
            ("state", address.state.trim().to_string()),
            ("postalcode", address.zip_code.trim().to_string()),
        ];
        let dto: GeocodeDto = self.fetch(&self.geocoder_url, &query).await?;

        if !dto.longitude.is_finite() || !dto.latitude.is_finite() {
            return Err(CoreError::from(StoreError::Corrupt("geocoder returned non-finite coordinates".into())));
        }
        debug!(city = %address.city, longitude = dto.longitude, latitude = dto.latitude, "Geocoded address");
        Ok(GeoPoint::new(dto.longitude, dto.latitude))
    }

    async fn distance(&self, from: GeoPoint, to: GeoPoint) -> CoreResult<RouteEstimate> {
        let query = [
            ("from", format!("{},{}", from.longitude, from.latitude)),
            ("to", format!("{},{}", to.longitude, to.latitude)),
        ];
        let dto: RouteDto = self.fetch(&self.router_url, &query).await?;

        Ok(RouteEstimate {
            distance_meters: dto.distance_meters,
            duration_seconds: dto.duration_seconds,
        })
    }
}
