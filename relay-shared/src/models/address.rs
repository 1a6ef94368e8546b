use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// WGS84 point as returned by the geocoder
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self { longitude, latitude }
    }
}

/// Road distance and travel time between two points
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteEstimate {
    pub distance_meters: u64,
    pub duration_seconds: u64,
}

/// Postal fields of an address, before it has been geocoded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressParts {
    pub street: String,
    pub number: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    #[serde(default)]
    pub complement: Option<String>,
}

impl AddressParts {
    /// Normalized `street:number:city:state:zip` descriptor.
    ///
    /// Two addresses that differ only in case or surrounding/repeated
    /// whitespace produce the same descriptor. The complement is left out:
    /// it never changes where the package goes.
    pub fn descriptor(&self) -> String {
        [&self.street, &self.number, &self.city, &self.state, &self.zip_code]
            .iter()
            .map(|part| normalize(part))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Human readable single-line form, e.g. `Rua A, 10 - Recife, PE - 50000-000 (apto 2)`
    pub fn display_line(&self) -> String {
        let complement = self
            .complement
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| format!(" ({})", c))
            .unwrap_or_default();

        format!(
            "{}, {} - {}, {} - {}{}",
            self.street, self.number, self.city, self.state, self.zip_code, complement
        )
    }
}

fn normalize(part: &str) -> String {
    part.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A geocoded address row. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub id: Uuid,
    #[serde(flatten)]
    pub parts: AddressParts,
    pub point: GeoPoint,
    pub created_at: DateTime<Utc>,
}

impl Address {
    pub fn new(parts: AddressParts, point: GeoPoint) -> Self {
        Self {
            id: Uuid::new_v4(),
            parts,
            point,
            created_at: Utc::now(),
        }
    }
}
