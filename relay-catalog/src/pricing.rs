use rust_decimal::{Decimal, RoundingStrategy};
use relay_core::{CoreError, CoreResult};
use relay_shared::{PackageDetails, RouteEstimate, VehicleType};

const METERS_PER_KM: i64 = 1000;

/// A price landing between two steps of the vehicle's scale rounds half away from zero
const ROUNDING: RoundingStrategy = RoundingStrategy::MidpointAwayFromZero;

/// Distance-based pricing per vehicle type
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingEngine;

impl PricingEngine {
    /// `base_fare + distance_km * per_km_rate`, rounded to the vehicle's scale
    pub fn quote(&self, vehicle: &VehicleType, route: &RouteEstimate) -> Decimal {
        let distance_km = Decimal::from(route.distance_meters) / Decimal::from(METERS_PER_KM);
        let raw = vehicle.base_fare + distance_km * vehicle.per_km_rate;

        raw.round_dp_with_strategy(vehicle.rounding_scale, ROUNDING)
    }

    /// Reject packages the vehicle cannot carry
    pub fn check_capacity(&self, vehicle: &VehicleType, package: &PackageDetails) -> CoreResult<()> {
        let measures = [
            ("weight", package.weight_kg, vehicle.max_weight_kg),
            ("height", package.height_cm, vehicle.max_height_cm),
            ("width", package.width_cm, vehicle.max_width_cm),
            ("length", package.length_cm, vehicle.max_length_cm),
        ];

        for (attribute, value, limit) in measures {
            if value <= Decimal::ZERO {
                return Err(CoreError::invalid(format!("package {} must be positive", attribute)));
            }
            if value > limit {
                return Err(CoreError::invalid(format!(
                    "package {} {} exceeds the {} limit of {} for vehicle type '{}'",
                    attribute, value, attribute, limit, vehicle.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_shared::pii::Masked;
    use rust_decimal_macros::dec;

    fn bike() -> VehicleType {
        VehicleType {
            name: "bike".to_string(),
            base_fare: dec!(5.00),
            per_km_rate: dec!(1.20),
            rounding_scale: 2,
            max_weight_kg: dec!(10),
            max_height_cm: dec!(40),
            max_width_cm: dec!(40),
            max_length_cm: dec!(40),
        }
    }

    fn package(weight: Decimal) -> PackageDetails {
        PackageDetails {
            height_cm: dec!(10),
            width_cm: dec!(10),
            length_cm: dec!(10),
            weight_kg: weight,
            is_fragile: false,
            information: "books".to_string(),
            email: Masked("ana@example.com".to_string()),
            phone: Masked("81999990000".to_string()),
        }
    }

    #[test]
    fn test_bike_three_km() {
        let engine = PricingEngine::default();
        let route = RouteEstimate { distance_meters: 3000, duration_seconds: 900 };

        assert_eq!(engine.quote(&bike(), &route), dec!(8.60));
    }

    #[test]
    fn test_rounds_to_vehicle_scale() {
        let engine = PricingEngine::default();
        // 5.00 + 1.234 * 1.20 = 6.4808
        let route = RouteEstimate { distance_meters: 1234, duration_seconds: 300 };
        assert_eq!(engine.quote(&bike(), &route), dec!(6.48));

        let mut whole = bike();
        whole.rounding_scale = 0;
        // 5 + 1.25 * 1.20 = 6.50 -> 7 with midpoint away from zero
        let route = RouteEstimate { distance_meters: 1250, duration_seconds: 300 };
        assert_eq!(engine.quote(&whole, &route), dec!(7));
    }

    #[test]
    fn test_capacity_limits() {
        let engine = PricingEngine::default();

        assert!(engine.check_capacity(&bike(), &package(dec!(9.5))).is_ok());

        let err = engine.check_capacity(&bike(), &package(dec!(12))).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(ref msg) if msg.contains("weight")));

        let err = engine.check_capacity(&bike(), &package(dec!(0))).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }
}
