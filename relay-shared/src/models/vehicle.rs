use serde::{Deserialize, Serialize};
use rust_decimal::Decimal;

/// Pricing parameters and capacity limits for one kind of vehicle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehicleType {
    /// Lookup key, e.g. `bike`, `motorcycle`, `car`
    pub name: String,
    pub base_fare: Decimal,
    pub per_km_rate: Decimal,
    /// Decimal places the final price is rounded to
    pub rounding_scale: u32,
    pub max_weight_kg: Decimal,
    pub max_height_cm: Decimal,
    pub max_width_cm: Decimal,
    pub max_length_cm: Decimal,
}
